//! Derive macros for the solver configuration.
use proc_macro2::{Span, TokenStream};
use quote::quote;
use syn::{
    parse_quote, Attribute, Data, DeriveInput, Expr, Fields, Ident, Lit, LitStr, Meta,
    MetaNameValue,
};
use synstructure::decl_derive;

/// Concatenated doc comment lines of an item.
fn doc_string(attrs: &[Attribute]) -> Option<(String, Span)> {
    let mut lines = vec![];
    let mut span = None;
    for attr in attrs.iter() {
        if let Ok(Meta::NameValue(MetaNameValue {
            path,
            lit: Lit::Str(doc_str),
            ..
        })) = attr.parse_meta()
        {
            if !path.is_ident("doc") {
                continue;
            }
            span.get_or_insert(doc_str.span());
            lines.push(doc_str.value().trim().to_owned());
        }
    }
    span.map(|span| (lines.join(" "), span))
}

/// Derives a default instance from the documentation.
///
/// Each field's doc comment has to contain `(Default: <expr>)`, fields without it use
/// `Default::default()`.
fn derive_doc_default(s: synstructure::Structure) -> TokenStream {
    let variant = match s.variants() {
        [variant] => variant,
        _ => panic!("DocDefault requires a struct"),
    };

    let default_re = regex::Regex::new(r"\(Default: ([^)]*)\)").unwrap();

    let body = variant.construct(|field, _| {
        let mut default_value: Expr = parse_quote!(Default::default());
        if let Some((doc, span)) = doc_string(&field.attrs) {
            if let Some(default_str) = default_re.captures(&doc) {
                let default_str = LitStr::new(default_str.get(1).unwrap().as_str(), span);
                default_value = default_str
                    .parse()
                    .expect("error parsing default expression");
            }
        }
        default_value
    });

    s.gen_impl(quote! {
        gen impl Default for @Self {
            fn default() -> Self {
                #body
            }
        }
    })
}

decl_derive!([DocDefault] => derive_doc_default);

/// Derives an update struct and a help text for a configuration struct.
///
/// For `struct FooConfig` this generates `struct FooConfigUpdate` with all fields wrapped in
/// `Option`, deserializable with serde, plus `new`, `merge` and `apply` methods. It also adds a
/// `FooConfig::help()` listing all options with their documentation.
fn derive_config_update(s: synstructure::Structure) -> TokenStream {
    let ast: &DeriveInput = s.ast();
    let name = &ast.ident;
    let update_name = Ident::new(&format!("{}Update", name), name.span());

    let fields = match &ast.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => fields.named.iter().collect::<Vec<_>>(),
            _ => panic!("ConfigUpdate requires named fields"),
        },
        _ => panic!("ConfigUpdate requires a struct"),
    };

    let idents = fields
        .iter()
        .map(|field| field.ident.clone().unwrap())
        .collect::<Vec<_>>();
    let types = fields.iter().map(|field| &field.ty).collect::<Vec<_>>();

    let mut help = String::new();
    for (field, ident) in fields.iter().zip(idents.iter()) {
        help.push_str(&format!("{}:\n", ident));
        if let Some((doc, _)) = doc_string(&field.attrs) {
            for line in textwrap(&doc, 76) {
                help.push_str(&format!("    {}\n", line));
            }
        }
        help.push('\n');
    }

    let update_doc = format!("Partial update of a [`{}`].", name);

    quote! {
        #[doc = #update_doc]
        #[derive(Default, Clone, Debug, serde::Deserialize)]
        #[serde(deny_unknown_fields)]
        pub struct #update_name {
            #( pub #idents: Option<#types>, )*
        }

        impl #update_name {
            /// Create an update that changes nothing.
            pub fn new() -> #update_name {
                #update_name::default()
            }

            /// Combine two updates, values set in `other` take precedence.
            pub fn merge(&mut self, other: #update_name) {
                #(
                    if other.#idents.is_some() {
                        self.#idents = other.#idents;
                    }
                )*
            }

            /// Overwrite all values set in this update.
            pub fn apply(&self, config: &mut #name) {
                #(
                    if let Some(value) = &self.#idents {
                        config.#idents = value.clone();
                    }
                )*
            }
        }

        impl #name {
            /// Description of all configuration options.
            pub fn help() -> &'static str {
                #help
            }
        }
    }
}

/// Greedy word wrapping for the generated help text.
fn textwrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = vec![];
    let mut line = String::new();
    for word in text.split_whitespace() {
        if !line.is_empty() && line.len() + 1 + word.len() > width {
            lines.push(std::mem::take(&mut line));
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(word);
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

decl_derive!([ConfigUpdate] => derive_config_update);
