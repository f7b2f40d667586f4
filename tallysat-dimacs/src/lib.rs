//! DIMACS CNF and SDIMACS parser and writer for the tallysat model counter.
//!
//! SDIMACS extends DIMACS CNF with quantifier lines placed before the clauses:
//!
//! ```text
//! p cnf 3 2
//! r 0.5 1 2 0
//! e 3 0
//! 1 3 0
//! -2 -3 0
//! ```
//!
//! `r <prob> <vars> 0` binds random variables, `e <vars> 0` existential and `a <vars> 0` universal
//! ones. Plain DIMACS CNF input is SDIMACS without quantifier lines.

use std::{borrow::Borrow, io, mem::replace};

use tallysat_formula::{CnfFormula, Lit, Prefix, QuantifiedFormula, Quantifier, Var};

use anyhow::Error;
use thiserror::Error;

/// Possible errors while parsing DIMACS CNF or SDIMACS input.
#[derive(Debug, Error)]
pub enum ParserError {
    #[error("line {}: Unexpected character in DIMACS CNF input: '{}'", line, unexpected)]
    UnexpectedInput { line: usize, unexpected: char },
    #[error("line {}: Literal index is too large: {}{}...", line, index, final_digit)]
    LiteralTooLarge {
        line: usize,
        index: usize,
        final_digit: usize,
    },
    #[error("line {}: Invalid header syntax: {}", line, header)]
    InvalidHeader { line: usize, header: String },
    #[error("line {}: Invalid quantifier line: {}", line, quantifier)]
    InvalidQuantifier { line: usize, quantifier: String },
    #[error("line {}: Probability {} is outside of [0, 1]", line, probability)]
    InvalidProbability { line: usize, probability: f64 },
    #[error("line {}: Variable {} is quantified twice", line, var)]
    Requantified { line: usize, var: Var },
    #[error("line {}: Unterminated clause", line)]
    UnterminatedClause { line: usize },
    #[error(
        "Formula has {} variables while the header specifies {} variables",
        var_count,
        header_var_count
    )]
    VarCount {
        var_count: usize,
        header_var_count: usize,
    },
    #[error(
        "Formula has {} clauses while the header specifies {} clauses",
        clause_count,
        header_clause_count
    )]
    ClauseCount {
        clause_count: usize,
        header_clause_count: usize,
    },
    #[error("Parser invoked after a previous error")]
    PreviousError,
}

/// Variable and clause count present in a DIMACS CNF header.
#[derive(Copy, Clone, Debug)]
pub struct DimacsHeader {
    pub var_count: usize,
    pub clause_count: usize,
}

/// Kind of a line that is collected and parsed as a whole.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum LineKind {
    Comment,
    Header,
    Quantifier,
}

/// Parser for DIMACS CNF and SDIMACS input.
///
/// Consumes the input in chunks. Clauses can be taken out in chunks as well, the quantifier prefix
/// is accumulated until the end.
#[derive(Default)]
pub struct DimacsParser {
    formula: CnfFormula,
    prefix: Prefix,
    partial_clause: Vec<Lit>,
    header: Option<DimacsHeader>,

    line_number: usize,
    clause_count: usize,
    partial_lit: usize,
    negate_next_lit: bool,

    in_lit: bool,
    line_kind: Option<LineKind>,
    start_of_line: bool,
    error: bool,

    line_buffer: Vec<u8>,
}

impl DimacsParser {
    /// Create a new parser.
    pub fn new() -> DimacsParser {
        DimacsParser {
            line_number: 1,
            start_of_line: true,
            ..DimacsParser::default()
        }
    }

    /// Parse the whole input and check the header if present.
    pub fn parse(input: impl io::Read) -> Result<QuantifiedFormula, Error> {
        let mut parser = Self::parse_incremental(input, |_| Ok(()))?;
        let matrix = parser.take_formula();
        Ok(QuantifiedFormula::new(parser.take_prefix(), matrix))
    }

    /// Parse the given input incrementally and check the header if present.
    ///
    /// The callback is invoked after each chunk and can take the clauses parsed so far with
    /// [`take_formula`](DimacsParser::take_formula).
    pub fn parse_incremental(
        input: impl io::Read,
        mut callback: impl FnMut(&mut DimacsParser) -> Result<(), Error>,
    ) -> Result<DimacsParser, Error> {
        use io::BufRead;

        let mut buffer = io::BufReader::new(input);
        let mut parser = Self::new();

        loop {
            let data = buffer.fill_buf()?;
            if data.is_empty() {
                break;
            }
            parser.parse_chunk(data)?;
            let len = data.len();
            buffer.consume(len);

            callback(&mut parser)?;
        }
        parser.eof()?;
        callback(&mut parser)?;
        parser.check_header()?;

        Ok(parser)
    }

    /// Parse a chunk of input.
    ///
    /// After an error the parser refuses further input.
    pub fn parse_chunk(&mut self, chunk: &[u8]) -> Result<(), ParserError> {
        if self.error {
            return Err(ParserError::PreviousError);
        }
        for &byte in chunk.iter() {
            if byte == b'\n' {
                self.line_number += 1;
            }
            match byte {
                b'\n' | b'\r' if self.line_kind.is_some() => {
                    self.finish_line()?;
                    self.start_of_line = true
                }
                _ if self.line_kind.is_some() => {
                    if self.line_kind != Some(LineKind::Comment) {
                        self.line_buffer.push(byte);
                    }
                }
                b'0'..=b'9' => {
                    self.in_lit = true;
                    let digit = (byte - b'0') as usize;

                    const CAN_OVERFLOW: usize = Var::max_count() / 10;
                    const OVERFLOW_DIGIT: usize = Var::max_count() % 10;

                    if CAN_OVERFLOW <= self.partial_lit {
                        let carry = (digit <= OVERFLOW_DIGIT) as usize;

                        if CAN_OVERFLOW + carry <= self.partial_lit {
                            self.error = true;
                            return Err(ParserError::LiteralTooLarge {
                                line: self.line_number,
                                index: self.partial_lit,
                                final_digit: digit,
                            });
                        }
                    }

                    self.partial_lit = self.partial_lit * 10 + digit;

                    self.start_of_line = false
                }
                b'-' if !self.negate_next_lit && !self.in_lit => {
                    self.negate_next_lit = true;
                    self.start_of_line = false
                }
                b' ' | b'\t' | b'\n' | b'\r' if !self.negate_next_lit || self.in_lit => {
                    self.finish_literal();
                    self.negate_next_lit = false;
                    self.in_lit = false;
                    self.partial_lit = 0;
                    self.start_of_line = byte == b'\n' || byte == b'\r';
                }
                b'c' if self.start_of_line => {
                    self.line_kind = Some(LineKind::Comment);
                }
                b'p' if self.start_of_line && self.header.is_none() => {
                    self.line_kind = Some(LineKind::Header);
                    self.line_buffer.push(byte);
                }
                b'e' | b'a' | b'r' if self.start_of_line => {
                    self.line_kind = Some(LineKind::Quantifier);
                    self.line_buffer.push(byte);
                }
                _ => {
                    self.error = true;
                    return Err(ParserError::UnexpectedInput {
                        line: self.line_number,
                        unexpected: byte as char,
                    });
                }
            }
        }

        Ok(())
    }

    /// Finish parsing the input.
    ///
    /// This does not check the header, call [`check_header`](DimacsParser::check_header) for
    /// that.
    pub fn eof(&mut self) -> Result<(), ParserError> {
        if self.line_kind.is_some() {
            self.finish_line()?;
        }

        self.finish_literal();

        if !self.partial_clause.is_empty() {
            return Err(ParserError::UnterminatedClause {
                line: self.line_number,
            });
        }

        Ok(())
    }

    /// Verifies the header information when present.
    pub fn check_header(&self) -> Result<(), ParserError> {
        if let Some(header) = self.header {
            let var_count = self.var_count();
            if var_count != header.var_count {
                return Err(ParserError::VarCount {
                    var_count,
                    header_var_count: header.var_count,
                });
            }

            if self.clause_count != header.clause_count {
                return Err(ParserError::ClauseCount {
                    clause_count: self.clause_count,
                    header_clause_count: header.clause_count,
                });
            }
        }

        Ok(())
    }

    /// Returns the clauses parsed since the last call of this method.
    ///
    /// The variable count of the returned formula is the largest variable count seen so far,
    /// including the header's.
    pub fn take_formula(&mut self) -> CnfFormula {
        let mut new_formula = CnfFormula::new();
        new_formula.set_var_count(self.formula.var_count());
        replace(&mut self.formula, new_formula)
    }

    /// Returns the quantifier prefix parsed so far, leaving an empty prefix behind.
    pub fn take_prefix(&mut self) -> Prefix {
        replace(&mut self.prefix, Prefix::new())
    }

    /// Whether a quantifier line has been parsed.
    pub fn is_quantified(&self) -> bool {
        !self.prefix.is_empty()
    }

    /// Return the DIMACS CNF header data if present.
    pub fn header(&self) -> Option<DimacsHeader> {
        self.header
    }

    /// Number of clauses parsed.
    pub fn clause_count(&self) -> usize {
        self.clause_count
    }

    /// Number of variables seen in clauses, the prefix or the header.
    pub fn var_count(&self) -> usize {
        self.formula.var_count().max(self.prefix.var_count())
    }

    fn finish_literal(&mut self) {
        if self.in_lit {
            if self.partial_lit == 0 {
                self.formula.add_clause(&self.partial_clause);
                self.partial_clause.clear();
                self.clause_count += 1;
            } else {
                self.partial_clause
                    .push(Var::from_dimacs(self.partial_lit as isize).lit(!self.negate_next_lit));
            }
        }
    }

    fn finish_line(&mut self) -> Result<(), ParserError> {
        let result = match self.line_kind.take() {
            Some(LineKind::Header) => self.parse_header_line(),
            Some(LineKind::Quantifier) => self.parse_quantifier_line(),
            _ => Ok(()),
        };
        self.line_buffer.clear();
        result
    }

    fn parse_header_line(&mut self) -> Result<(), ParserError> {
        let header_line = String::from_utf8_lossy(&self.line_buffer).into_owned();

        if !header_line.starts_with("p ") {
            return self.invalid_header(header_line);
        }

        let mut header_values = header_line[2..].split_whitespace();

        if header_values.next() != Some("cnf") {
            return self.invalid_header(header_line);
        }

        let var_count: usize = match header_values
            .next()
            .and_then(|value| str::parse(value).ok())
        {
            None => return self.invalid_header(header_line),
            Some(value) => value,
        };

        if var_count > Var::max_count() {
            self.error = true;
            return Err(ParserError::LiteralTooLarge {
                line: self.line_number,
                index: var_count / 10,
                final_digit: var_count % 10,
            });
        }

        let clause_count: usize = match header_values
            .next()
            .and_then(|value| str::parse(value).ok())
        {
            None => return self.invalid_header(header_line),
            Some(value) => value,
        };

        if header_values.next().is_some() {
            return self.invalid_header(header_line);
        }

        self.header = Some(DimacsHeader {
            var_count,
            clause_count,
        });

        self.formula.set_var_count(var_count);

        Ok(())
    }

    fn parse_quantifier_line(&mut self) -> Result<(), ParserError> {
        let line = String::from_utf8_lossy(&self.line_buffer).into_owned();
        let mut values = line.split_whitespace();

        let quantifier = match values.next() {
            Some("e") => Quantifier::Exists,
            Some("a") => Quantifier::Forall,
            Some("r") => {
                let probability: f64 = match values.next().and_then(|value| str::parse(value).ok())
                {
                    None => return self.invalid_quantifier(line),
                    Some(value) => value,
                };
                if !(0.0..=1.0).contains(&probability) {
                    self.error = true;
                    return Err(ParserError::InvalidProbability {
                        line: self.line_number,
                        probability,
                    });
                }
                Quantifier::Random(probability)
            }
            _ => return self.invalid_quantifier(line),
        };

        let mut vars = vec![];
        let mut terminated = false;

        for value in values {
            if terminated {
                return self.invalid_quantifier(line);
            }
            let number: usize = match str::parse(value) {
                Ok(number) => number,
                Err(_) => return self.invalid_quantifier(line),
            };
            if number == 0 {
                terminated = true;
                continue;
            }
            if number > Var::max_count() {
                self.error = true;
                return Err(ParserError::LiteralTooLarge {
                    line: self.line_number,
                    index: number / 10,
                    final_digit: number % 10,
                });
            }
            let var = Var::from_dimacs(number as isize);
            if self.prefix.is_bound(var) || vars.contains(&var) {
                self.error = true;
                return Err(ParserError::Requantified {
                    line: self.line_number,
                    var,
                });
            }
            vars.push(var);
        }

        if !terminated {
            return self.invalid_quantifier(line);
        }

        self.prefix.add_block(quantifier, vars);

        Ok(())
    }

    fn invalid_header(&mut self, header_line: String) -> Result<(), ParserError> {
        self.error = true;
        Err(ParserError::InvalidHeader {
            line: self.line_number,
            header: header_line,
        })
    }

    fn invalid_quantifier(&mut self, line: String) -> Result<(), ParserError> {
        self.error = true;
        Err(ParserError::InvalidQuantifier {
            line: self.line_number,
            quantifier: line,
        })
    }
}

/// Write a DIMACS CNF header.
pub fn write_dimacs_header(target: &mut impl io::Write, header: DimacsHeader) -> io::Result<()> {
    writeln!(
        target,
        "p cnf {var_count} {clause_count}",
        var_count = header.var_count,
        clause_count = header.clause_count
    )
}

/// Write an iterator of clauses as headerless DIMACS CNF.
pub fn write_dimacs_clauses(
    target: &mut impl io::Write,
    clauses: impl IntoIterator<Item = impl IntoIterator<Item = impl Borrow<Lit>>>,
) -> io::Result<()> {
    for clause in clauses.into_iter() {
        for lit in clause.into_iter() {
            itoa::write(&mut *target, lit.borrow().to_dimacs())?;
            target.write_all(b" ")?;
        }
        target.write_all(b"0\n")?;
    }
    Ok(())
}

/// Write the quantifier lines of a prefix.
///
/// Random variables of a block are split into one line per run of equal probabilities.
pub fn write_prefix(target: &mut impl io::Write, prefix: &Prefix) -> io::Result<()> {
    for block in prefix.blocks() {
        let mut open_line: Option<Quantifier> = None;
        for &var in block.vars.iter() {
            let quantifier = prefix.quantifier(var);
            if open_line != Some(quantifier) {
                if open_line.is_some() {
                    target.write_all(b"0\n")?;
                }
                match quantifier {
                    Quantifier::Exists => target.write_all(b"e ")?,
                    Quantifier::Forall => target.write_all(b"a ")?,
                    Quantifier::Random(probability) => write!(target, "r {} ", probability)?,
                }
                open_line = Some(quantifier);
            }
            itoa::write(&mut *target, var.to_dimacs())?;
            target.write_all(b" ")?;
        }
        if open_line.is_some() {
            target.write_all(b"0\n")?;
        }
    }
    Ok(())
}

/// Write a formula as DIMACS CNF.
pub fn write_dimacs(target: &mut impl io::Write, formula: &CnfFormula) -> io::Result<()> {
    write_dimacs_header(
        &mut *target,
        DimacsHeader {
            var_count: formula.var_count(),
            clause_count: formula.len(),
        },
    )?;
    write_dimacs_clauses(&mut *target, formula.iter())
}

/// Write a quantified formula as SDIMACS.
pub fn write_sdimacs(target: &mut impl io::Write, formula: &QuantifiedFormula) -> io::Result<()> {
    write_dimacs_header(
        &mut *target,
        DimacsHeader {
            var_count: formula.var_count(),
            clause_count: formula.matrix.len(),
        },
    )?;
    write_prefix(&mut *target, &formula.prefix)?;
    write_dimacs_clauses(&mut *target, formula.matrix.iter())
}

#[cfg(test)]
mod tests {
    use super::*;

    use anyhow::Error;
    use proptest::{test_runner::TestCaseError, *};

    use tallysat_formula::{cnf::strategy::*, cnf_formula, prefix::strategy::*, var};

    #[test]
    fn odd_whitespace() -> Result<(), Error> {
        let parsed = DimacsParser::parse(
            b"p  cnf  4   3  \n  1  \n 2  3\n0 -4 0 2\nccomment  \n\n0\n\n" as &[_],
        )?;

        let expected = cnf_formula![
            1, 2, 3;
            -4;
            2;
        ];

        assert_eq!(parsed.matrix, expected);
        assert!(parsed.prefix.is_empty());

        Ok(())
    }

    #[test]
    fn quantifier_lines() -> Result<(), Error> {
        let parsed = DimacsParser::parse(
            b"c random then exists\np cnf 4 2\nr 0.3 1 2 0\ne 3 0\na  4 0\n1 -3 0\n2 4 0\n" as &[_],
        )?;

        assert_eq!(parsed.prefix.block_count(), 3);
        assert_eq!(parsed.prefix.quantifier(var!(2)), Quantifier::Random(0.3));
        assert_eq!(parsed.prefix.quantifier(var!(3)), Quantifier::Exists);
        assert_eq!(parsed.prefix.quantifier(var!(4)), Quantifier::Forall);
        assert_eq!(parsed.prefix.level(var!(4)), 3);
        assert_eq!(parsed.matrix.len(), 2);

        Ok(())
    }

    macro_rules! expect_error {
        ( $input:expr, $( $cases:tt )* ) => {
            match DimacsParser::parse($input as &[_]) {
                Ok(parsed) => panic!("Expected error but got {:?}", parsed),
                Err(err) => match err.downcast_ref() {
                    Some(casted_err) => match casted_err {
                        $( $cases )*,
                        _ => panic!("Unexpected error {:?}", casted_err),
                    },
                    None => panic!("Unexpected error type {:?}", err),
                }
            }
        };
    }

    #[test]
    fn invalid_headers() {
        expect_error!(b"pcnf 1 3", ParserError::InvalidHeader { .. } => ());
        expect_error!(b"p notcnf 1 3", ParserError::InvalidHeader { .. } => ());
        expect_error!(b"p cnf 1", ParserError::InvalidHeader { .. } => ());
        expect_error!(b"p cnf 1 2 3", ParserError::InvalidHeader { .. } => ());
        expect_error!(b"p cnf -3 -6", ParserError::InvalidHeader { .. } => ());

        expect_error!(
            format!("p cnf {} 4", Var::max_var().to_dimacs() + 1).as_bytes(),
            ParserError::LiteralTooLarge { .. } => ()
        );

        expect_error!(
            b"p cnf 1 2\np cnf 1 2\n",
            ParserError::UnexpectedInput { unexpected: 'p', .. } => ()
        );
    }

    #[test]
    fn invalid_quantifiers() {
        expect_error!(b"r half 1 2 0\n", ParserError::InvalidQuantifier { .. } => ());
        expect_error!(b"r\n", ParserError::InvalidQuantifier { .. } => ());
        expect_error!(b"r 1.5 1 2 0\n", ParserError::InvalidProbability { .. } => ());
        expect_error!(b"e 1 2\n", ParserError::InvalidQuantifier { .. } => ());
        expect_error!(b"e 1 0 2\n", ParserError::InvalidQuantifier { .. } => ());
        expect_error!(b"e 1 -2 0\n", ParserError::InvalidQuantifier { .. } => ());
        expect_error!(b"e 1 0\na 1 0\n", ParserError::Requantified { .. } => ());
        expect_error!(b"x 1 0\n", ParserError::UnexpectedInput { unexpected: 'x', .. } => ());
    }

    #[test]
    fn invalid_header_data() {
        expect_error!(
            b"p cnf 1 1\n 2 0",
            ParserError::VarCount { var_count: 2, header_var_count: 1 } => ()
        );

        expect_error!(
            b"p cnf 1 1\ne 3 0\n1 0",
            ParserError::VarCount { var_count: 3, header_var_count: 1 } => ()
        );

        expect_error!(
            b"p cnf 10 4\n 1 0",
            ParserError::ClauseCount { clause_count: 1, header_clause_count: 4 } => ()
        );
    }

    #[test]
    fn syntax_errors() {
        expect_error!(
            b"1 2 ?foo",
            ParserError::UnexpectedInput { unexpected: '?', .. } => ()
        );

        expect_error!(
            b"1 2 - 3 0",
            ParserError::UnexpectedInput { unexpected: ' ', .. } => ()
        );

        expect_error!(
            b"1 2 --3 0",
            ParserError::UnexpectedInput { unexpected: '-', .. } => ()
        );
    }

    #[test]
    fn unterminated_clause() {
        expect_error!(
            b"1 2 3",
            ParserError::UnterminatedClause { .. } => ()
        );
    }

    proptest! {
        #[test]
        fn roundtrip(input in cnf_formula(1..100usize, 0..500, 0..10)) {
            let mut buf = vec![];

            write_dimacs(&mut buf, &input)?;

            let parsed = DimacsParser::parse(&buf[..]).map_err(|e| TestCaseError::fail(e.to_string()))?;

            prop_assert_eq!(parsed.matrix, input);
        }

        #[test]
        fn quantified_roundtrip(input in quantified_formula(1..20usize, 0..30, 1..5)) {
            let mut buf = vec![];

            write_sdimacs(&mut buf, &input)?;

            let parsed = DimacsParser::parse(&buf[..]).map_err(|e| TestCaseError::fail(e.to_string()))?;

            prop_assert_eq!(&parsed.matrix, &input.matrix);
            for index in 0..input.var_count() {
                let var = Var::from_index(index);
                prop_assert_eq!(parsed.prefix.quantifier(var), input.prefix.quantifier(var));
                prop_assert_eq!(parsed.prefix.level(var), input.prefix.level(var));
            }
        }
    }
}
