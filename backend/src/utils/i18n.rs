//! Request locale
//!
//! The locale middleware stores the negotiated locale in a thread-local so
//! that error messages and property names can be rendered without threading
//! the locale through every call.

use std::cell::RefCell;

thread_local! {
    static CURRENT_LOCALE: RefCell<String> = RefCell::new(DEFAULT_LOCALE.to_string());
}

pub const SUPPORTED_LOCALES: &[&str] = &["en", "zh"];
pub const DEFAULT_LOCALE: &str = "en";

pub fn set_locale(locale: &str) {
    let locale = normalize_locale(locale);
    CURRENT_LOCALE.with(|l| {
        *l.borrow_mut() = locale;
    });
}

pub fn get_locale() -> String {
    CURRENT_LOCALE.with(|l| l.borrow().clone())
}

/// Accepts "en", "en-US", "zh_CN", or a full Accept-Language list
pub fn normalize_locale(locale: &str) -> String {
    let locale = locale.trim().to_lowercase();

    let primary = locale
        .split(|c| c == '-' || c == '_' || c == ',' || c == ';')
        .next()
        .unwrap_or(DEFAULT_LOCALE);

    SUPPORTED_LOCALES
        .iter()
        .find(|supported| primary.starts_with(**supported))
        .map(|supported| supported.to_string())
        .unwrap_or_else(|| DEFAULT_LOCALE.to_string())
}

pub fn extract_locale_from_header(header_value: Option<&str>) -> String {
    match header_value {
        Some(value) => normalize_locale(value),
        None => DEFAULT_LOCALE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_locale() {
        assert_eq!(normalize_locale("en"), "en");
        assert_eq!(normalize_locale("en-US"), "en");
        assert_eq!(normalize_locale("zh"), "zh");
        assert_eq!(normalize_locale("zh_CN"), "zh");
        assert_eq!(normalize_locale("zh-CN,zh;q=0.9,en;q=0.8"), "zh");
        assert_eq!(normalize_locale("fr"), "en");
        assert_eq!(normalize_locale(""), "en");
    }

    #[test]
    fn test_extract_locale_from_header() {
        assert_eq!(extract_locale_from_header(None), "en");
        assert_eq!(extract_locale_from_header(Some("zh-TW")), "zh");
    }

    #[test]
    fn test_set_get_locale() {
        set_locale("zh-CN");
        assert_eq!(get_locale(), "zh");

        set_locale("en-GB");
        assert_eq!(get_locale(), "en");
    }
}
