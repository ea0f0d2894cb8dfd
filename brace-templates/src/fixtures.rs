//! In-memory collaborator doubles for tests.

use std::collections::HashMap;

use crate::data::{
    EnvSnapshot, EnvSource, FieldDef, ItemSource, ItemValue, MessageCatalog, Model, ModelSource,
    PageItem,
};

#[derive(Default)]
pub(crate) struct TestItem {
    pub value: Option<ItemValue>,
    pub separator: Option<String>,
    pub label: Option<String>,
    pub display: Option<String>,
    pub invalid: bool,
    pub validation_message: String,
    pub changed: bool,
    pub disabled: bool,
}

impl TestItem {
    pub fn with_value(value: impl Into<ItemValue>) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::default()
        }
    }
}

impl PageItem for TestItem {
    fn value(&self) -> ItemValue {
        self.value
            .clone()
            .unwrap_or_else(|| ItemValue::Single(String::new()))
    }

    fn separator(&self) -> Option<String> {
        self.separator.clone()
    }

    fn display_value_for(&self, value: &str) -> String {
        self.display.clone().unwrap_or_else(|| value.to_string())
    }

    fn label(&self) -> Option<String> {
        self.label.clone()
    }

    fn validity(&self) -> bool {
        !self.invalid
    }

    fn validation_message(&self) -> String {
        self.validation_message.clone()
    }

    fn is_changed(&self) -> bool {
        self.changed
    }

    fn is_disabled(&self) -> bool {
        self.disabled
    }
}

#[derive(Default)]
pub(crate) struct MapItems(pub HashMap<String, TestItem>);

impl MapItems {
    pub fn one(name: &str, value: impl Into<ItemValue>) -> Self {
        let mut map = HashMap::new();
        map.insert(name.to_string(), TestItem::with_value(value));
        Self(map)
    }
}

impl ItemSource for MapItems {
    fn item(&self, name: &str) -> Option<&dyn PageItem> {
        self.0.get(name).map(|item| item as &dyn PageItem)
    }
}

#[derive(Default)]
pub(crate) struct TestModel {
    pub rows: Vec<(String, HashMap<String, ItemValue>)>,
    pub fields: HashMap<String, FieldDef>,
    pub parent: Option<(String, String)>,
    pub editable: bool,
}

impl Model for TestModel {
    fn value(&self, record_id: &str, column: &str) -> Option<ItemValue> {
        self.rows
            .iter()
            .find(|(id, _)| id == record_id)
            .and_then(|(_, columns)| columns.get(column).cloned())
    }

    fn field(&self, column: &str) -> Option<FieldDef> {
        self.fields.get(column).cloned()
    }

    fn parent(&self) -> Option<(String, String)> {
        self.parent.clone()
    }

    fn allow_edit(&self, _record_id: &str) -> bool {
        self.editable
    }

    fn for_each(&self, f: &mut dyn FnMut(usize, &str)) {
        for (index, (id, _)) in self.rows.iter().enumerate() {
            f(index, id);
        }
    }
}

#[derive(Default)]
pub(crate) struct MapModels(pub HashMap<String, TestModel>);

impl ModelSource for MapModels {
    fn model(&self, name: &str) -> Option<&dyn Model> {
        self.0.get(name).map(|model| model as &dyn Model)
    }
}

pub(crate) struct MapMessages(pub HashMap<String, String>);

impl MessageCatalog for MapMessages {
    fn message(&self, key: &str) -> Option<String> {
        self.0.get(key).cloned()
    }
}

pub(crate) struct StaticEnv(pub EnvSnapshot);

impl EnvSource for StaticEnv {
    fn snapshot(&self) -> EnvSnapshot {
        self.0.clone()
    }
}

pub(crate) fn row(id: &str, columns: &[(&str, &str)]) -> (String, HashMap<String, ItemValue>) {
    (
        id.to_string(),
        columns
            .iter()
            .map(|(name, value)| (name.to_string(), ItemValue::from(*value)))
            .collect(),
    )
}
