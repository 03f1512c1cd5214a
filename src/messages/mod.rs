//! # Message Registry
//!
//! Locale-aware storage for validation message templates.
//!
//! A single [`MessageRegistry`] is constructed at process start, wrapped in an
//! `Arc`, and handed to every [`ModelDefinition`](crate::model::ModelDefinition).
//! Switching locales is therefore global to everything sharing that instance.
//! Tests that need isolation build their own with [`MessageRegistry::new`] or
//! call [`MessageRegistry::reset`].
//!
//! ## Resolution Order
//!
//! [`MessageRegistry::get`] looks a name up in:
//! 1. the active locale (`fr-ca`),
//! 2. the active locale's base language (`fr`),
//! 3. the fallback locale (`en-us` unless changed),
//!
//! and renders an empty string when nothing matches. It never fails, so internal
//! names and values cannot leak into rendered output.

mod en_us;
mod template;

pub use template::{MessageContext, MessageFormat, Template};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Locale used when no other is configured.
pub const DEFAULT_LOCALE: &str = "en-us";

/// A set of message templates for one locale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundle {
    pub locale: String,
    pub messages: BTreeMap<String, String>,
}

impl Bundle {
    /// The built-in `en-us` messages.
    pub fn default_messages() -> Self {
        en_us::bundle()
    }
}

#[derive(Debug)]
struct Catalogs {
    locale: String,
    fallback: String,
    formats: HashMap<String, HashMap<String, MessageFormat>>,
}

impl Catalogs {
    fn empty() -> Self {
        Self {
            locale: DEFAULT_LOCALE.to_string(),
            fallback: DEFAULT_LOCALE.to_string(),
            formats: HashMap::new(),
        }
    }

    fn with_defaults() -> Self {
        let mut catalogs = Self::empty();
        catalogs.register(en_us::bundle());
        catalogs
    }

    fn register(&mut self, bundle: Bundle) {
        let catalog = self.formats.entry(normalize(&bundle.locale)).or_default();
        for (name, source) in bundle.messages {
            catalog.insert(name, MessageFormat::from(source));
        }
    }

    fn lookup(&self, locale: &str, name: &str) -> Option<&MessageFormat> {
        self.formats.get(locale).and_then(|catalog| catalog.get(name))
    }

    fn resolve(&self, name: &str) -> Option<MessageFormat> {
        let base = base_language(&self.locale);
        self.lookup(&self.locale, name)
            .or_else(|| base.and_then(|base| self.lookup(base, name)))
            .or_else(|| self.lookup(&self.fallback, name))
            .cloned()
    }
}

/// Process-wide message templates keyed by locale and name.
#[derive(Debug)]
pub struct MessageRegistry {
    catalogs: RwLock<Catalogs>,
}

impl Default for MessageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageRegistry {
    /// A registry preloaded with the default `en-us` bundle.
    pub fn new() -> Self {
        Self {
            catalogs: RwLock::new(Catalogs::with_defaults()),
        }
    }

    /// A registry with no messages at all.
    pub fn empty() -> Self {
        Self {
            catalogs: RwLock::new(Catalogs::empty()),
        }
    }

    /// Restores the state produced by [`MessageRegistry::new`].
    pub fn reset(&self) {
        *self.catalogs.write() = Catalogs::with_defaults();
    }

    /// Sets the active locale.
    pub fn locale(&self, code: &str) {
        let code = normalize(code);
        debug!(locale = %code, "Locale changed");
        self.catalogs.write().locale = code;
    }

    pub fn current_locale(&self) -> String {
        self.catalogs.read().locale.clone()
    }

    pub fn fallback_locale(&self) -> String {
        self.catalogs.read().fallback.clone()
    }

    pub fn set_fallback_locale(&self, code: &str) {
        self.catalogs.write().fallback = normalize(code);
    }

    /// Loads every message of `bundle` into its locale.
    pub fn register(&self, bundle: Bundle) {
        debug!(locale = %bundle.locale, count = bundle.messages.len(), "Registered bundle");
        self.catalogs.write().register(bundle);
    }

    /// Sets one message in `locale`, or in the active locale when `None`.
    pub fn set(&self, name: &str, format: impl Into<MessageFormat>, locale: Option<&str>) {
        let mut catalogs = self.catalogs.write();
        let locale = match locale {
            Some(code) => normalize(code),
            None if !catalogs.locale.is_empty() => catalogs.locale.clone(),
            None => catalogs.fallback.clone(),
        };
        catalogs
            .formats
            .entry(locale)
            .or_default()
            .insert(name.to_string(), format.into());
    }

    /// Renders `name` with `context`, or returns an empty string if it is unknown.
    pub fn get(&self, name: &str, context: &MessageContext) -> String {
        // Render outside the lock; custom formats may call back into the registry.
        let format = self.catalogs.read().resolve(name);
        format.map(|f| f.render(context)).unwrap_or_default()
    }

    pub fn has(&self, name: &str) -> bool {
        self.catalogs.read().resolve(name).is_some()
    }
}

fn normalize(code: &str) -> String {
    code.trim().to_ascii_lowercase().replace('_', "-")
}

fn base_language(locale: &str) -> Option<&str> {
    locale.split_once('-').map(|(base, _)| base)
}
