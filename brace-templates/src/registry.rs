//! Named-template registry
//!
//! Templates are defined once under short names and invoked from other
//! templates via `{apply NAME/}`. Names are restricted to `[A-Z0-9_$]+`;
//! invalid names are rejected with a warning rather than an error so one bad
//! entry does not sink a batch definition.

use std::collections::HashMap;

pub(crate) struct TemplateRegistry {
    templates: HashMap<String, String>,
}

fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_' || c == '$')
}

impl TemplateRegistry {
    pub(crate) fn new() -> Self {
        Self {
            templates: HashMap::new(),
        }
    }

    pub(crate) fn define(&mut self, name: &str, text: &str) {
        if !valid_name(name) {
            tracing::warn!("invalid template name \"{name}\" rejected");
            return;
        }
        self.templates.insert(name.to_string(), text.to_string());
    }

    pub(crate) fn get(&self, name: &str) -> Option<&str> {
        self.templates.get(name).map(String::as_str)
    }

    pub(crate) fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.templates.keys().cloned().collect();
        names.sort();
        names
    }

    pub(crate) fn clear(&mut self) {
        self.templates.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_and_get() {
        let mut registry = TemplateRegistry::new();
        registry.define("ROW", "<li>&V.</li>");
        assert_eq!(registry.get("ROW"), Some("<li>&V.</li>"));
        assert_eq!(registry.get("MISSING"), None);
    }

    #[test]
    fn invalid_names_are_rejected() {
        let mut registry = TemplateRegistry::new();
        registry.define("lower", "x");
        registry.define("BAD NAME", "x");
        registry.define("", "x");
        assert!(registry.list().is_empty());
    }

    #[test]
    fn list_is_sorted() {
        let mut registry = TemplateRegistry::new();
        registry.define("B", "2");
        registry.define("A", "1");
        assert_eq!(registry.list(), vec!["A".to_string(), "B".to_string()]);
    }
}
