#![forbid(unsafe_code)]

//! Locale context shared between the host and the tour.
//!
//! The [`LocaleContext`] owns the active locale. Changes are versioned so that
//! anything derived from locale-bound text (the step catalog) can tell when it
//! must be rebuilt.

use std::cell::RefCell;
use std::env;
use std::rc::Rc;

/// A normalized BCP-47-ish locale tag such as `"en"` or `"ru-RU"`.
pub type Locale = String;

#[derive(Debug)]
struct LocaleState {
    current: Locale,
    version: u64,
}

/// Shared, versioned locale. Clones observe the same state.
#[derive(Clone, Debug)]
pub struct LocaleContext {
    inner: Rc<RefCell<LocaleState>>,
}

impl LocaleContext {
    /// Create a new locale context with the provided locale.
    #[must_use]
    pub fn new(locale: impl Into<Locale>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(LocaleState {
                current: normalize_locale(locale.into()),
                version: 0,
            })),
        }
    }

    /// Create a locale context initialized from system locale detection.
    #[must_use]
    pub fn system() -> Self {
        Self::new(detect_system_locale())
    }

    #[must_use]
    pub fn current_locale(&self) -> Locale {
        self.inner.borrow().current.clone()
    }

    /// Set the locale. Returns `true` (and bumps the version) only on change.
    pub fn set_locale(&self, locale: impl Into<Locale>) -> bool {
        let locale = normalize_locale(locale.into());
        let mut state = self.inner.borrow_mut();
        if state.current == locale {
            return false;
        }
        tracing::debug!(from = %state.current, to = %locale, "locale changed");
        state.current = locale;
        state.version = state.version.wrapping_add(1);
        true
    }

    /// Version counter; advances on every effective change.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }
}

impl Default for LocaleContext {
    fn default() -> Self {
        Self::new("en")
    }
}

/// Detect the system locale from environment variables.
///
/// Preference order: `LC_ALL`, then `LANG`. Falls back to `"en"` when unknown.
#[must_use]
pub fn detect_system_locale() -> Locale {
    let lc_all = env::var("LC_ALL").ok();
    let lang = env::var("LANG").ok();
    detect_system_locale_from(lc_all.as_deref(), lang.as_deref())
}

/// Normalize a raw locale (`"ru_RU.UTF-8"` → `"ru-RU"`); empty input becomes `"en"`.
#[must_use]
pub fn normalize_locale(mut locale: Locale) -> Locale {
    normalize_locale_raw(&locale).unwrap_or_else(|| {
        locale.clear();
        locale.push_str("en");
        locale
    })
}

/// Primary language subtag (`"ru-RU"` → `"ru"`).
#[must_use]
pub fn language_of(locale: &str) -> &str {
    locale.split('-').next().unwrap_or(locale)
}

fn detect_system_locale_from(lc_all: Option<&str>, lang: Option<&str>) -> Locale {
    lc_all
        .and_then(normalize_locale_raw)
        .or_else(|| lang.and_then(normalize_locale_raw))
        .unwrap_or_else(|| "en".to_string())
}

fn normalize_locale_raw(raw: &str) -> Option<Locale> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let raw = raw.split('@').next().unwrap_or(raw);
    let raw = raw.split('.').next().unwrap_or(raw);
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let mut normalized = raw.replace('_', "-");
    if normalized.eq_ignore_ascii_case("c") || normalized.eq_ignore_ascii_case("posix") {
        normalized.clear();
        normalized.push_str("en");
    }
    Some(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn detect_system_locale_prefers_lc_all() {
        let locale = detect_system_locale_from(Some("ru_RU.UTF-8"), Some("en_US.UTF-8"));
        assert_eq!(locale, "ru-RU");
    }

    #[test]
    fn detect_system_locale_defaults_to_en() {
        assert_eq!(detect_system_locale_from(None, None), "en");
        assert_eq!(detect_system_locale_from(Some(""), Some("  ")), "en");
    }

    #[test]
    fn set_locale_bumps_version_only_on_change() {
        let ctx = LocaleContext::new("en");
        let v0 = ctx.version();
        assert!(!ctx.set_locale("en"));
        assert_eq!(ctx.version(), v0);
        assert!(ctx.set_locale("ru"));
        assert!(ctx.version() > v0);
        assert_eq!(ctx.current_locale(), "ru");
    }

    #[test]
    fn clones_share_state() {
        let ctx = LocaleContext::new("en");
        let other = ctx.clone();
        other.set_locale("ru");
        assert_eq!(ctx.current_locale(), "ru");
    }

    #[test]
    fn normalize_handles_c_posix_and_codesets() {
        assert_eq!(normalize_locale("C".into()), "en");
        assert_eq!(normalize_locale("POSIX".into()), "en");
        assert_eq!(normalize_locale("en_US.UTF-8@latin".into()), "en-US");
        assert_eq!(normalize_locale("".into()), "en");
    }

    #[test]
    fn language_subtag() {
        assert_eq!(language_of("ru-RU"), "ru");
        assert_eq!(language_of("en"), "en");
    }

    proptest! {
        #[test]
        fn normalize_locale_raw_sanitizes_segments(raw in "[A-Za-z0-9_@.\\-]{1,32}") {
            if let Some(locale) = normalize_locale_raw(&raw) {
                prop_assert!(!locale.trim().is_empty());
                prop_assert!(!locale.contains('@'));
                prop_assert!(!locale.contains('.'));
                prop_assert!(!locale.contains('_'));
            }
        }
    }
}
