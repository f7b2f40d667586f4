use std::env;
use std::fs;
use std::io::{self, Read, Write};

use anyhow::Error;
use clap::{values_t, App, AppSettings, Arg};
use env_logger::{fmt, Builder, Target};
use log::{error, info};
use log::{Level, LevelFilter, Record};

use tallysat::config::{SolverConfig, SolverConfigUpdate};
use tallysat::solver::{Answer, Solver, SolverError};

fn main() {
    let exit_code = match main_with_err() {
        Err(err) => {
            error!("{}", err);
            1
        }
        Ok(exit_code) => exit_code,
    };
    std::process::exit(exit_code);
}

fn init_logging() {
    let format = |buf: &mut fmt::Formatter, record: &Record| {
        if record.level() == Level::Info {
            writeln!(buf, "c {}", record.args())
        } else {
            writeln!(buf, "c {}: {}", record.level(), record.args())
        }
    };

    let mut builder = Builder::new();
    builder
        .target(Target::Stdout)
        .format(format)
        .filter(None, LevelFilter::Info);

    if let Ok(ref env_var) = env::var("TALLYSAT_LOG") {
        builder.parse_filters(env_var);
    }

    builder.init();
}

fn banner() {
    info!("This is tallysat {}", env!("TALLYSAT_VERSION"));
    info!(
        "  {} build - {}",
        env!("TALLYSAT_PROFILE"),
        env!("TALLYSAT_RUSTC_VERSION")
    );
}

fn main_with_err() -> Result<i32, Error> {
    let matches = App::new("tallysat")
        .version(env!("TALLYSAT_VERSION"))
        .about("Counts the models of a DIMACS CNF formula or computes the satisfaction probability of an SDIMACS formula")
        .setting(AppSettings::DisableHelpSubcommand)
        .arg_from_usage("[INPUT] 'The input file to use (stdin if omitted)'")
        .arg_from_usage("[config-file] --config=[FILE] 'Read parameters from configuration file'")
        .arg(
            Arg::from_usage("[config-option] -C --config-option")
                .value_name("OPTION>=<VALUE")
                .help(
                    "Specify a single config option, see 'tallysat -C help' for a list of options.",
                )
                .multiple(true)
                .number_of_values(1),
        )
        .arg_from_usage("--trace 'Record the trace DAG and report its size'")
        .get_matches();

    let config_options = values_t!(matches, "config-option", String).unwrap_or_default();

    if config_options.iter().any(|option| option == "help") {
        print!("{}", SolverConfig::help());
        return Ok(0);
    }

    init_logging();
    banner();

    let mut config_update = SolverConfigUpdate::new();

    if let Some(config_path) = matches.value_of("config-file") {
        let mut config_contents = String::new();
        fs::File::open(config_path)?.read_to_string(&mut config_contents)?;

        config_update.merge(toml::from_str(&config_contents)?);
    }

    for config_option in config_options {
        config_update.merge(toml::from_str(&config_option)?);
    }

    if matches.is_present("trace") {
        config_update.record_trace = Some(true);
    }

    let mut solver = Solver::new();

    solver.config(&config_update)?;

    let stdin = io::stdin();

    let mut locked_stdin;
    let mut opened_file;

    let file = match matches.value_of("INPUT") {
        Some(path) => {
            info!("Reading file '{}'", path);
            opened_file = fs::File::open(path)?;
            &mut opened_file as &mut dyn io::Read
        }
        None => {
            info!("Reading from stdin");
            locked_stdin = stdin.lock();
            &mut locked_stdin as &mut dyn io::Read
        }
    };

    solver.add_dimacs(file)?;

    let answer = match solver.solve() {
        Ok(answer) => answer,
        Err(SolverError::Timeout) => {
            error!("{}", SolverError::Timeout);
            println!("s UNKNOWN");
            return Ok(2);
        }
        Err(err) => return Err(err.into()),
    };

    if let Some(trace) = solver.trace() {
        info!(
            "Trace has {} nodes and {} edges",
            trace.num_nodes(),
            trace.num_edges()
        );
    }

    match answer {
        Answer::Count(count) => {
            if count == 0u32.into() {
                println!("s UNSATISFIABLE");
            } else {
                println!("s SATISFIABLE");
            }
            println!("c s exact arb int {}", count);
        }
        Answer::Probability(probability) => {
            println!("s SATISFIABLE");
            println!("c s exact double prob {}", probability);
        }
    }

    Ok(0)
}
