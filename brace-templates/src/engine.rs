//! The engine context
//!
//! One [`Engine`] per application instance owns the named-template registry,
//! the built-in-substitutions cache, and the collaborator interfaces the
//! resolution chain reads from. Constructing a fresh engine per test gives
//! full isolation; `reset` drops registry and cache without rebuilding the
//! collaborators.

use std::cell::OnceCell;
use std::collections::{HashMap, HashSet};

use crate::data::{
    DefaultEnv, EnvSource, ItemSource, MessageCatalog, ModelSource, NoItems, NoMessages, NoModels,
};
use crate::error::{Diagnostic, Result};
use crate::escape::strip_scripts;
use crate::interpreter::Interpreter;
use crate::options::ApplyOptions;
use crate::registry::TemplateRegistry;
use crate::tokenizer::SUBST_RE;

/// Output of a template application: the final text plus every problem
/// recovered along the way.
#[derive(Debug)]
pub struct Rendered {
    pub text: String,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct Engine {
    items: Box<dyn ItemSource>,
    models: Box<dyn ModelSource>,
    messages: Box<dyn MessageCatalog>,
    env: Box<dyn EnvSource>,
    registry: TemplateRegistry,
    builtins: OnceCell<HashMap<String, String>>,
}

impl Engine {
    /// An engine with no collaborators wired in: no items, no models, no
    /// messages, empty environment.
    pub fn new() -> Self {
        Self {
            items: Box::new(NoItems),
            models: Box::new(NoModels),
            messages: Box::new(NoMessages),
            env: Box::new(DefaultEnv),
            registry: TemplateRegistry::new(),
            builtins: OnceCell::new(),
        }
    }

    pub fn with_items(mut self, items: Box<dyn ItemSource>) -> Self {
        self.items = items;
        self
    }

    pub fn with_models(mut self, models: Box<dyn ModelSource>) -> Self {
        self.models = models;
        self
    }

    pub fn with_messages(mut self, messages: Box<dyn MessageCatalog>) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_env(mut self, env: Box<dyn EnvSource>) -> Self {
        self.env = env;
        self
    }

    /// Registers named templates for `{apply NAME/}`. Invalid names are
    /// rejected with a warning; valid entries in the same batch still land.
    pub fn define_templates(&mut self, templates: &[(&str, &str)]) {
        for (name, text) in templates {
            self.registry.define(name, text);
        }
    }

    pub fn get_template(&self, name: &str) -> Option<&str> {
        self.registry.get(name)
    }

    pub fn list_templates(&self) -> Vec<String> {
        self.registry.list()
    }

    /// Drops all named templates and the cached built-in substitutions.
    pub fn reset(&mut self) {
        self.registry.clear();
        self.builtins = OnceCell::new();
    }

    /// Applies `template` with the given options.
    ///
    /// Always produces some output for arbitrary input text; malformed
    /// templates surface through [`Rendered::diagnostics`], and only an
    /// unknown escape filter or runaway recursion returns `Err`. The output
    /// has all `<script>` regions removed regardless of options.
    pub fn apply_template(&self, template: &str, options: &ApplyOptions) -> Result<Rendered> {
        let mut diagnostics = Vec::new();
        let text = Interpreter::render(self, template, options, HashMap::new(), 0, &mut diagnostics)?;
        Ok(Rendered {
            text: strip_scripts(&text),
            diagnostics,
        })
    }

    pub(crate) fn items(&self) -> &dyn ItemSource {
        self.items.as_ref()
    }

    pub(crate) fn models(&self) -> &dyn ModelSource {
        self.models.as_ref()
    }

    pub(crate) fn messages(&self) -> &dyn MessageCatalog {
        self.messages.as_ref()
    }

    /// Built-in substitutions, snapshotted from the environment on first use
    /// and cached for the life of the engine.
    pub(crate) fn builtin(&self, name: &str) -> Option<String> {
        let map = self.builtins.get_or_init(|| {
            let snapshot = self.env.snapshot();
            HashMap::from([
                ("APP_ID".to_string(), snapshot.app_id),
                ("APP_PAGE_ID".to_string(), snapshot.page_id),
                ("APP_SESSION".to_string(), snapshot.session),
                ("REQUEST".to_string(), snapshot.request),
                (
                    "DEBUG".to_string(),
                    if snapshot.debug { "YES" } else { "NO" }.to_string(),
                ),
                ("IMAGE_PREFIX".to_string(), snapshot.image_prefix),
            ])
        });
        map.get(name).cloned()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// Lists the item/column names a template references through `&NAME.` or
/// `&"quoted name".` data substitutions, in first-occurrence order, without
/// evaluating the template. Property accessors report their base name;
/// placeholders and directives are ignored.
pub fn extract_dependencies(template: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for caps in SUBST_RE.captures_iter(template) {
        let name = match caps.get(1) {
            Some(quoted) => quoted.as_str().to_string(),
            None => {
                let bare = caps.get(2).unwrap().as_str();
                bare.split('%').next().unwrap().to_string()
            }
        };
        if seen.insert(name.clone()) {
            out.push(name);
        }
    }
    out
}
