//! Runtime template substitution and directive processing
//!
//! A small templating language for client-side rendering over page-item and
//! model/record data: `#PLACEHOLDER#` tokens, `&SUBSTITUTION.` references
//! with escape filters, and `{directive/}` control flow.
//!
//! # Template syntax
//!
//! ## Placeholders
//! `#NAME#` is replaced from a caller-supplied map at tokenize time;
//! unresolved placeholders stay literal.
//!
//! ## Data substitutions
//! `&NAME.` resolves through a chain of sources (call arguments, message
//! keys, page items, model columns, built-ins, extra substitutions) and is
//! escaped with the default filter, or an explicit one: `&NAME!RAW.`.
//!
//! ## Directives
//! - `{if NAME/}...{elseif OTHER/}...{else/}...{endif/}`
//! - `{case NAME/}{when X/}...{otherwise/}...{endcase/}`
//! - `{loop NAME/}...{endloop/}` over a separated list or a data source
//! - `{with/}ARG:= value{apply TEMPLATE/}` named-template invocation
//! - `{!comment/}` and the literal-brace escape `{{/}`
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use brace_templates::{ApplyOptions, Engine};
//!
//! let engine = Engine::new();
//! let options = ApplyOptions {
//!     placeholders: Some(HashMap::from([("WHO".to_string(), "world".to_string())])),
//!     ..ApplyOptions::default()
//! };
//! let rendered = engine.apply_template("Hello #WHO#!", &options).unwrap();
//! assert_eq!(rendered.text, "Hello world!");
//! ```
//!
//! Malformed templates never panic and never fail the call: the engine
//! produces its best-effort output and reports what it recovered from in
//! [`Rendered::diagnostics`]. The only fatal conditions are an unknown
//! escape filter name and runaway `{apply/}` recursion.

mod data;
mod engine;
mod error;
mod escape;
mod interpreter;
mod options;
mod registry;
mod tokenizer;
mod value;

#[cfg(test)]
mod fixtures;

pub use data::{
    DefaultEnv, EnvSnapshot, EnvSource, FieldDef, ItemSource, ItemValue, MapItemSource,
    MessageCatalog, Model, ModelSource, NoItems, NoMessages, NoModels, PageItem,
};
pub use engine::{extract_dependencies, Engine, Rendered};
pub use error::{Diagnostic, Result, Severity, TemplateError};
pub use escape::{escape_html, strip_scripts, strip_tags, EscapeFilter};
pub use options::{default_false_values, ApplyOptions, DataSource};
