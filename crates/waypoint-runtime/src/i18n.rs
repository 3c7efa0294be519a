#![forbid(unsafe_code)]

//! Translation lookup.
//!
//! [`Translate`] is the contract the tour consumes: a pure key → string lookup
//! plus an identity that changes whenever the resolved strings may change.
//! [`StringCatalog`] is a simple in-memory implementation keyed by locale.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use crate::locale::{Locale, LocaleContext, language_of};

/// Identity of a translation set. Two equal ids resolve every key identically.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TranslationId {
    pub locale: Locale,
    pub revision: u64,
}

/// Key → display string lookup.
pub trait Translate {
    /// Resolve `key`; implementations fall back to the key itself when missing.
    fn translate(&self, key: &str) -> String;

    /// Identity of the strings currently being served.
    fn identity(&self) -> TranslationId;
}

/// Locale → key → string table, following a shared [`LocaleContext`].
///
/// Lookup order: exact locale, primary language subtag, fallback locale, key.
#[derive(Debug)]
pub struct StringCatalog {
    locale: LocaleContext,
    fallback: Locale,
    tables: RefCell<HashMap<Locale, HashMap<String, String>>>,
    revision: Cell<u64>,
}

impl StringCatalog {
    #[must_use]
    pub fn new(locale: LocaleContext) -> Self {
        Self {
            locale,
            fallback: "en".to_string(),
            tables: RefCell::new(HashMap::new()),
            revision: Cell::new(0),
        }
    }

    #[must_use]
    pub fn with_fallback(mut self, fallback: impl Into<Locale>) -> Self {
        self.fallback = fallback.into();
        self
    }

    /// Add (or replace) strings for `locale`. Bumps the revision.
    pub fn insert<I, K, V>(&self, locale: &str, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut tables = self.tables.borrow_mut();
        let table = tables.entry(locale.to_string()).or_default();
        for (k, v) in entries {
            table.insert(k.into(), v.into());
        }
        self.revision.set(self.revision.get().wrapping_add(1));
    }

    #[must_use]
    pub fn locale_context(&self) -> &LocaleContext {
        &self.locale
    }

    /// Locales with at least one string.
    #[must_use]
    pub fn locales(&self) -> Vec<Locale> {
        let mut locales: Vec<_> = self.tables.borrow().keys().cloned().collect();
        locales.sort();
        locales
    }

    fn lookup(&self, locale: &str, key: &str) -> Option<String> {
        let tables = self.tables.borrow();
        tables.get(locale).and_then(|t| t.get(key)).cloned()
    }
}

impl Translate for StringCatalog {
    fn translate(&self, key: &str) -> String {
        let locale = self.locale.current_locale();
        self.lookup(&locale, key)
            .or_else(|| self.lookup(language_of(&locale), key))
            .or_else(|| self.lookup(&self.fallback, key))
            .unwrap_or_else(|| {
                tracing::trace!(key, locale = %locale, "missing translation");
                key.to_string()
            })
    }

    fn identity(&self) -> TranslationId {
        TranslationId {
            locale: self.locale.current_locale(),
            // Locale switches and table edits both invalidate derived text.
            revision: self.revision.get().wrapping_add(self.locale.version() << 32),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> StringCatalog {
        let ctx = LocaleContext::new("en");
        let catalog = StringCatalog::new(ctx);
        catalog.insert("en", [("hello", "Hello"), ("bye", "Bye")]);
        catalog.insert("ru", [("hello", "Привет")]);
        catalog
    }

    #[test]
    fn translate_follows_locale() {
        let catalog = catalog();
        assert_eq!(catalog.translate("hello"), "Hello");
        catalog.locale_context().set_locale("ru");
        assert_eq!(catalog.translate("hello"), "Привет");
    }

    #[test]
    fn translate_falls_back_to_language_then_fallback_then_key() {
        let catalog = catalog();
        catalog.locale_context().set_locale("ru_RU");
        assert_eq!(catalog.translate("hello"), "Привет");
        assert_eq!(catalog.translate("bye"), "Bye");
        assert_eq!(catalog.translate("missing"), "missing");
    }

    #[test]
    fn identity_changes_on_locale_and_edits() {
        let catalog = catalog();
        let a = catalog.identity();
        assert_eq!(a, catalog.identity());

        catalog.locale_context().set_locale("ru");
        let b = catalog.identity();
        assert_ne!(a, b);

        catalog.insert("ru", [("bye", "Пока")]);
        assert_ne!(b, catalog.identity());
    }

    #[test]
    fn locales_sorted() {
        assert_eq!(catalog().locales(), vec!["en".to_string(), "ru".to_string()]);
    }
}
