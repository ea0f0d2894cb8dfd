// MIT License
//
// Copyright (c) 2025 brace-templates contributors
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! Value resolution
//!
//! A bare name used in a substitution or a directive condition resolves
//! through a fixed chain of sources, first non-null wins:
//!
//! 1. call-time arguments bound by `{with/}`/`{apply/}`
//! 2. `APP_TEXT$` message keys
//! 3. page items, including `NAME%property` accessors
//! 4. model columns for the active (model, record) context, including
//!    `%property` accessors, the `<COLUMN>_LABEL` convention, the parent
//!    record chain, and any outer loop-pushed contexts
//! 5. built-in substitutions (`APP_ID`, `APP_PAGE_ID`, ...)
//! 6. extra substitutions, loop-local pseudo-variables first
//!
//! Anything still unresolved is the empty string.

use crate::data::{ItemValue, Model, PageItem};
use crate::escape::{apply_filter, EscapeFilter};
use crate::interpreter::Interpreter;
use crate::options::DataSource;

/// Prefix marking a localizable text key.
pub(crate) const MESSAGE_PREFIX: &str = "APP_TEXT$";

const DEFAULT_SEPARATOR: &str = ":";

/// Item property accessors reachable via `ITEM%property`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ItemProp {
    Label,
    Display,
    Valid,
    Message,
    Changed,
    Disabled,
}

impl ItemProp {
    pub(crate) fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "label" => Some(Self::Label),
            "display" => Some(Self::Display),
            "valid" => Some(Self::Valid),
            "message" => Some(Self::Message),
            "changed" => Some(Self::Changed),
            "disabled" => Some(Self::Disabled),
            _ => None,
        }
    }
}

/// Column property accessors reachable via `COLUMN%property`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ColumnProp {
    Display,
    Label,
    Heading,
    HeadingClass,
    ColumnClass,
    FieldClass,
    FieldColSpan,
    Width,
    Required,
    Readonly,
    Link,
    LinkText,
    LinkAttrs,
    Hidden,
}

impl ColumnProp {
    pub(crate) fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "display" => Some(Self::Display),
            "label" => Some(Self::Label),
            "heading" => Some(Self::Heading),
            "heading_class" => Some(Self::HeadingClass),
            "column_class" => Some(Self::ColumnClass),
            "field_class" => Some(Self::FieldClass),
            "field_col_span" => Some(Self::FieldColSpan),
            "width" => Some(Self::Width),
            "required" => Some(Self::Required),
            "readonly" => Some(Self::Readonly),
            "link" => Some(Self::Link),
            "link_text" => Some(Self::LinkText),
            "link_attrs" => Some(Self::LinkAttrs),
            "hidden" => Some(Self::Hidden),
            _ => None,
        }
    }
}

/// Outcome of a chain lookup, before coercion and escaping.
pub(crate) struct Lookup {
    pub(crate) value: Option<ItemValue>,
    /// Separator configured on the source item, used when joining arrays.
    pub(crate) separator: Option<String>,
    /// Escape policy declared on the source column, overriding the default
    /// filter (but not an explicit one).
    pub(crate) column_escape: Option<EscapeFilter>,
}

impl Lookup {
    fn single(value: String) -> Self {
        Self {
            value: Some(ItemValue::Single(value)),
            separator: None,
            column_escape: None,
        }
    }

    fn none() -> Self {
        Self {
            value: None,
            separator: None,
            column_escape: None,
        }
    }
}

fn yes_no(value: bool) -> String {
    if value { "Y" } else { "N" }.to_string()
}

fn item_prop_value(item: &dyn PageItem, prop: ItemProp) -> String {
    match prop {
        ItemProp::Label => item.label().unwrap_or_default(),
        ItemProp::Display => {
            let separator = item.separator().unwrap_or_else(|| DEFAULT_SEPARATOR.to_string());
            item.display_value_for(&item.value().join(&separator))
        }
        ItemProp::Valid => yes_no(item.validity()),
        ItemProp::Message => item.validation_message(),
        ItemProp::Changed => yes_no(item.is_changed()),
        ItemProp::Disabled => yes_no(item.is_disabled()),
    }
}

fn column_prop_value(
    model: &dyn Model,
    record_id: &str,
    column: &str,
    prop: ColumnProp,
) -> String {
    let field = model.field(column).unwrap_or_default();
    match prop {
        ColumnProp::Display => model
            .display_value(record_id, column)
            .or_else(|| {
                model
                    .value(record_id, column)
                    .map(|v| v.join(DEFAULT_SEPARATOR))
            })
            .unwrap_or_default(),
        ColumnProp::Label => field.label.or(field.heading).unwrap_or_default(),
        ColumnProp::Heading => field.heading.or(field.label).unwrap_or_default(),
        ColumnProp::HeadingClass => field.heading_class.unwrap_or_default(),
        ColumnProp::ColumnClass => field.column_class.unwrap_or_default(),
        ColumnProp::FieldClass => field.field_class.unwrap_or_default(),
        ColumnProp::FieldColSpan => field
            .field_col_span
            .map(|n| n.to_string())
            .unwrap_or_default(),
        ColumnProp::Width => field.width.map(|n| n.to_string()).unwrap_or_default(),
        ColumnProp::Required => yes_no(field.required),
        ColumnProp::Readonly => yes_no(field.readonly || !model.allow_edit(record_id)),
        ColumnProp::Link => field.link.unwrap_or_default(),
        ColumnProp::LinkText => field.link_text.unwrap_or_default(),
        ColumnProp::LinkAttrs => field.link_attrs.unwrap_or_default(),
        ColumnProp::Hidden => yes_no(field.hidden),
    }
}

impl<'e> Interpreter<'e> {
    /// Resolves `name` through the full chain, returning the raw value.
    pub(crate) fn lookup(&mut self, name: &str) -> Lookup {
        if let Some(value) = self.args.get(name) {
            return Lookup::single(value.clone());
        }

        if let Some(key) = name.strip_prefix(MESSAGE_PREFIX) {
            let key = match key.split_once('$') {
                Some((base, lang)) if !lang.is_empty() => {
                    self.warn(format!(
                        "language qualifier \"{lang}\" on message key {base} is ignored"
                    ));
                    base
                }
                _ => key,
            };
            let message = self
                .engine
                .messages()
                .message(key)
                .unwrap_or_else(|| key.to_string());
            return Lookup::single(message);
        }

        if self.opts.include_page_items {
            let items = self.engine.items();
            if let Some(item) = items.item(name) {
                return Lookup {
                    value: Some(item.value()),
                    separator: item.separator(),
                    column_escape: None,
                };
            }
            if let Some((base, prop)) = name.split_once('%') {
                if let Some(item) = items.item(base) {
                    if let Some(prop) = ItemProp::parse(prop) {
                        return Lookup::single(item_prop_value(item, prop));
                    }
                }
            }
        }

        if let Some(found) = self.model_lookup(name) {
            return found;
        }

        if self.opts.include_builtin_substitutions {
            if let Some(value) = self.engine.builtin(name) {
                return Lookup::single(value);
            }
        }

        for scope in self.scopes.iter().rev() {
            if let Some(value) = scope.get(name) {
                return Lookup::single(value.clone());
            }
        }
        if let Some(value) = self.opts.extra_substitutions.get(name) {
            return Lookup::single(value.clone());
        }

        Lookup::none()
    }

    /// Tries the active (model, record) contexts, innermost loop frame
    /// first, the per-call data source last.
    fn model_lookup(&mut self, name: &str) -> Option<Lookup> {
        let mut frames: Vec<DataSource> = self.model_frames.iter().rev().cloned().collect();
        if let Some(source) = &self.opts.data_source {
            frames.push(source.clone());
        }
        for frame in frames {
            if let Some(found) = self.resolve_in_model(&frame.model, &frame.record_id, name) {
                return Some(found);
            }
        }
        None
    }

    fn resolve_in_model(&mut self, model_name: &str, record_id: &str, name: &str) -> Option<Lookup> {
        let model = self.engine.models().model(model_name)?;

        if let Some(value) = model.value(record_id, name) {
            let column_escape = model
                .field(name)
                .and_then(|f| f.escape)
                .map(|escape| if escape { EscapeFilter::Html } else { EscapeFilter::Raw });
            return Some(Lookup {
                value: Some(value),
                separator: None,
                column_escape,
            });
        }

        // legacy <COLUMN>_LABEL convention
        if let Some(base) = name.strip_suffix("_LABEL") {
            if let Some(field) = model.field(base) {
                if let Some(label) = field.label.or(field.heading) {
                    return Some(Lookup::single(label));
                }
            }
        }

        if let Some((column, prop)) = name.split_once('%') {
            if model.field(column).is_some() {
                if let Some(prop) = ColumnProp::parse(prop) {
                    if prop == ColumnProp::LinkText {
                        return Some(self.link_text_value(model_name, record_id, column));
                    }
                    return Some(Lookup::single(column_prop_value(
                        model, record_id, column, prop,
                    )));
                }
            }
        }

        let (parent_model, parent_record) = model.parent()?;
        self.resolve_in_model(&parent_model, &parent_record, name)
    }

    /// Link text is template text in its own right, evaluated against the
    /// owning record. The result is markup, so it bypasses the default
    /// filter; a fatal error inside it degrades to a diagnostic and an
    /// empty value rather than aborting the outer call.
    fn link_text_value(&mut self, model_name: &str, record_id: &str, column: &str) -> Lookup {
        let text = self
            .engine
            .models()
            .model(model_name)
            .and_then(|m| m.field(column))
            .and_then(|f| f.link_text);
        let Some(text) = text else {
            return Lookup::single(String::new());
        };
        let mut frames = self.model_frames.clone();
        frames.push(DataSource {
            model: model_name.to_string(),
            record_id: record_id.to_string(),
        });
        match Interpreter::render_with_context(
            self.engine,
            &text,
            self.opts,
            self.args.clone(),
            self.scopes.clone(),
            frames,
            self.depth + 1,
            &mut *self.diags,
        ) {
            Ok(rendered) => Lookup {
                value: Some(ItemValue::Single(rendered)),
                separator: None,
                column_escape: Some(EscapeFilter::Raw),
            },
            Err(err) => {
                self.error(err.to_string());
                Lookup::single(String::new())
            }
        }
    }

    /// Resolved value coerced to a string, no escaping.
    pub(crate) fn raw_string_value(&mut self, name: &str) -> String {
        let lookup = self.lookup(name);
        let separator = lookup
            .separator
            .unwrap_or_else(|| DEFAULT_SEPARATOR.to_string());
        lookup
            .value
            .map(|v| v.join(&separator))
            .unwrap_or_default()
    }

    /// Resolved value coerced and escaped. Precedence: an explicit filter,
    /// then the column's declared policy, then the per-call default.
    pub(crate) fn string_value(&mut self, name: &str, explicit: Option<EscapeFilter>) -> String {
        let lookup = self.lookup(name);
        let separator = lookup
            .separator
            .unwrap_or_else(|| DEFAULT_SEPARATOR.to_string());
        let value = lookup
            .value
            .map(|v| v.join(&separator))
            .unwrap_or_default();
        let filter = explicit
            .or(lookup.column_escape)
            .unwrap_or(self.opts.default_escape_filter);
        apply_filter(&value, filter)
    }

    /// Truthiness of a directive condition: false when the trimmed value is
    /// empty, when the name is a page item reporting itself empty, or when
    /// the value is in the false-values set.
    pub(crate) fn is_truthy(&mut self, name: &str) -> bool {
        let value = self.raw_string_value(name);
        let value = value.trim();
        if value.is_empty() {
            return false;
        }
        if self.opts.include_page_items {
            if let Some(item) = self.engine.items().item(name) {
                if item.is_empty() {
                    return false;
                }
            }
        }
        !self.opts.false_values.contains(value)
    }
}
