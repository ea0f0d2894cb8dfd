//! Per-call configuration for `apply_template`

use std::collections::{HashMap, HashSet};

use crate::escape::EscapeFilter;

/// An active (model, record) context for column substitutions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSource {
    /// Model name, resolved through the engine's [`ModelSource`](crate::ModelSource).
    pub model: String,
    pub record_id: String,
}

/// Options recognized by [`Engine::apply_template`](crate::Engine::apply_template).
pub struct ApplyOptions {
    /// Placeholder map for `#NAME#` tokens. `None` leaves placeholders as
    /// literal text.
    pub placeholders: Option<HashMap<String, String>>,
    /// When false, `{directive/}` sequences are not parsed at all.
    pub directives: bool,
    pub default_escape_filter: EscapeFilter,
    pub include_page_items: bool,
    pub data_source: Option<DataSource>,
    /// Caller-supplied substitutions, consulted after every other source.
    pub extra_substitutions: HashMap<String, String>,
    pub include_builtin_substitutions: bool,
    /// Trimmed values treated as false by `{if/}` conditions.
    pub false_values: HashSet<String>,
}

/// The default false-values set: `F`, `f`, `N`, `n`, `0`.
pub fn default_false_values() -> HashSet<String> {
    ["F", "f", "N", "n", "0"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            placeholders: None,
            directives: true,
            default_escape_filter: EscapeFilter::Html,
            include_page_items: true,
            data_source: None,
            extra_substitutions: HashMap::new(),
            include_builtin_substitutions: true,
            false_values: default_false_values(),
        }
    }
}
