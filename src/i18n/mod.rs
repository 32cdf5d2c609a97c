//! Internationalization (i18n) module.
//!
//! Loads embedded translation tables and resolves user-visible strings.
//! Keys use dot notation ("flood.set_on"); placeholders are replaced by
//! the callers with `str::replace`.

use std::collections::HashMap;
use std::sync::OnceLock;

use serde_json::Value;

/// Global translation store: lang code -> parsed JSON tree.
static TRANSLATIONS: OnceLock<HashMap<String, Value>> = OnceLock::new();

/// Initialize translations from the embedded JSON files.
///
/// Uses `include_str!` so there is no file I/O at runtime.
pub fn init() {
    let mut map = HashMap::new();

    let en_json = include_str!("en.json");
    if let Ok(val) = serde_json::from_str(en_json) {
        map.insert("en".to_string(), val);
    }

    let _ = TRANSLATIONS.set(map);
}

/// Get the text for a key in the given language.
///
/// Falls back to English, then to the key itself so a missing string
/// never panics at runtime.
pub fn get_text(lang: &str, key: &str) -> String {
    let Some(store) = TRANSLATIONS.get() else {
        return key.to_string();
    };

    if let Some(val) = store.get(lang)
        && let Some(text) = resolve_key(val, key)
    {
        return text;
    }

    if lang != "en"
        && let Some(val) = store.get("en")
        && let Some(text) = resolve_key(val, key)
    {
        return text;
    }

    key.to_string()
}

fn resolve_key(val: &Value, key: &str) -> Option<String> {
    let mut current = val;
    for part in key.split('.') {
        current = current.get(part)?;
    }
    current.as_str().map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_text_known_key() {
        init();
        let text = get_text("en", "flood.status_off");
        assert!(text.contains("disabled"));
    }

    #[test]
    fn test_get_text_unknown_lang_falls_back_to_english() {
        init();
        assert_eq!(get_text("xx", "flood.set_off"), get_text("en", "flood.set_off"));
    }

    #[test]
    fn test_get_text_missing_key_returns_key() {
        init();
        assert_eq!(get_text("en", "flood.nonexistent"), "flood.nonexistent");
    }
}
