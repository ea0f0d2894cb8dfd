//! Collaborator interfaces
//!
//! The engine reads live values through these narrow traits at evaluation
//! time. Adapters in the hosting system implement them; the engine itself
//! never touches a DOM, a network, or storage. The `No*` types are inert
//! defaults so an [`Engine`](crate::Engine) works without any collaborator
//! wired in.

use std::collections::HashMap;

/// A value held by an item or column. Multi-select items carry arrays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemValue {
    Single(String),
    Multi(Vec<String>),
}

impl ItemValue {
    /// Coerces to a string, joining array values with `separator`.
    pub fn join(&self, separator: &str) -> String {
        match self {
            Self::Single(s) => s.clone(),
            Self::Multi(values) => values.join(separator),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Single(s) => s.is_empty(),
            Self::Multi(values) => values.is_empty(),
        }
    }
}

impl From<&str> for ItemValue {
    fn from(value: &str) -> Self {
        Self::Single(value.to_string())
    }
}

impl From<String> for ItemValue {
    fn from(value: String) -> Self {
        Self::Single(value)
    }
}

impl From<Vec<String>> for ItemValue {
    fn from(values: Vec<String>) -> Self {
        Self::Multi(values)
    }
}

/// A named, mutable value cell such as a form field.
pub trait PageItem {
    fn value(&self) -> ItemValue;

    fn is_empty(&self) -> bool {
        self.value().is_empty()
    }

    /// Separator configured for multi-value items, if any.
    fn separator(&self) -> Option<String> {
        None
    }

    /// Maps a stored value to its display form (e.g. a select list label).
    fn display_value_for(&self, value: &str) -> String {
        value.to_string()
    }

    /// Text of the associated label element, if one exists.
    fn label(&self) -> Option<String> {
        None
    }

    fn validity(&self) -> bool {
        true
    }

    fn validation_message(&self) -> String {
        String::new()
    }

    fn is_changed(&self) -> bool {
        false
    }

    fn is_disabled(&self) -> bool {
        false
    }
}

pub trait ItemSource {
    fn item(&self, name: &str) -> Option<&dyn PageItem>;
}

/// Declared properties of one column of a model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldDef {
    pub label: Option<String>,
    pub heading: Option<String>,
    pub heading_class: Option<String>,
    pub column_class: Option<String>,
    pub field_class: Option<String>,
    pub field_col_span: Option<u32>,
    pub width: Option<u32>,
    pub required: bool,
    pub readonly: bool,
    pub hidden: bool,
    /// Declared escape policy: `Some(true)` forces HTML escaping,
    /// `Some(false)` forces raw output, `None` defers to the caller.
    pub escape: Option<bool>,
    pub link: Option<String>,
    pub link_text: Option<String>,
    pub link_attrs: Option<String>,
}

/// A tabular data source addressed by record id and column name.
pub trait Model {
    fn value(&self, record_id: &str, column: &str) -> Option<ItemValue>;

    fn field(&self, column: &str) -> Option<FieldDef>;

    /// Display form of a column value, when the model maintains one.
    fn display_value(&self, _record_id: &str, _column: &str) -> Option<String> {
        None
    }

    /// Parent model name and record id for master/detail chaining.
    fn parent(&self) -> Option<(String, String)> {
        None
    }

    fn allow_edit(&self, _record_id: &str) -> bool {
        true
    }

    /// Iterates records in source order with their 0-based index and id.
    fn for_each(&self, f: &mut dyn FnMut(usize, &str));
}

pub trait ModelSource {
    fn model(&self, name: &str) -> Option<&dyn Model>;
}

/// Client message catalog for localizable text keys.
pub trait MessageCatalog {
    fn message(&self, key: &str) -> Option<String>;
}

/// Environment values behind the built-in substitutions, snapshotted once
/// per engine.
#[derive(Debug, Clone, Default)]
pub struct EnvSnapshot {
    pub app_id: String,
    pub page_id: String,
    pub session: String,
    pub request: String,
    pub debug: bool,
    pub image_prefix: String,
}

pub trait EnvSource {
    fn snapshot(&self) -> EnvSnapshot;
}

/// Item source with no items.
pub struct NoItems;

impl ItemSource for NoItems {
    fn item(&self, _name: &str) -> Option<&dyn PageItem> {
        None
    }
}

/// Model source with no models.
pub struct NoModels;

impl ModelSource for NoModels {
    fn model(&self, _name: &str) -> Option<&dyn Model> {
        None
    }
}

/// Catalog with no messages; every key falls back to itself.
pub struct NoMessages;

impl MessageCatalog for NoMessages {
    fn message(&self, _key: &str) -> Option<String> {
        None
    }
}

/// Environment with empty values and debug off.
pub struct DefaultEnv;

impl EnvSource for DefaultEnv {
    fn snapshot(&self) -> EnvSnapshot {
        EnvSnapshot::default()
    }
}

/// Convenience item source over a name/value map, for hosts whose items are
/// plain strings.
pub struct MapItemSource {
    items: HashMap<String, MapItem>,
}

pub struct MapItem {
    value: ItemValue,
}

impl PageItem for MapItem {
    fn value(&self) -> ItemValue {
        self.value.clone()
    }
}

impl MapItemSource {
    pub fn new(items: HashMap<String, ItemValue>) -> Self {
        Self {
            items: items
                .into_iter()
                .map(|(name, value)| (name, MapItem { value }))
                .collect(),
        }
    }
}

impl ItemSource for MapItemSource {
    fn item(&self, name: &str) -> Option<&dyn PageItem> {
        self.items.get(name).map(|item| item as &dyn PageItem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_uses_separator_for_arrays() {
        let v = ItemValue::from(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(v.join(":"), "a:b");
        assert_eq!(ItemValue::from("a").join(":"), "a");
    }

    #[test]
    fn emptiness() {
        assert!(ItemValue::from("").is_empty());
        assert!(ItemValue::Multi(vec![]).is_empty());
        assert!(!ItemValue::from("x").is_empty());
    }
}
