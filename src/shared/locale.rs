//! Locale resolution shared by classes and places.
//!
//! Content rows are stored per locale; a read resolves the requested
//! tag to exactly one row. The fallback order is fixed: the normalized
//! requested locale, then the default locale, then an explicitly empty
//! value. Fields from two different rows are never mixed.

/// Locales the catalog accepts, checked as a fixed lookup table.
pub const SUPPORTED_LOCALES: [&str; 3] = ["en", "ru", "uk"];

/// Fallback locale; every entity keeps a row for it.
pub const DEFAULT_LOCALE: &str = "en";

/// A per-locale content row (class or place locale).
pub trait Localized {
    fn locale(&self) -> &str;
}

pub fn is_supported(tag: &str) -> bool {
    SUPPORTED_LOCALES.contains(&tag)
}

/// Substitutes the default locale for unsupported tags.
pub fn normalize(tag: &str) -> &str {
    if is_supported(tag) {
        tag
    } else {
        DEFAULT_LOCALE
    }
}

/// Picks the effective row for a requested locale.
///
/// Returns the effective locale tag together with the chosen row:
/// the row for the normalized requested locale verbatim, else the
/// default-locale row tagged [`DEFAULT_LOCALE`], else no row at all.
pub fn resolve<'a, T: Localized>(requested: &str, rows: &'a [T]) -> (&'a str, Option<&'a T>) {
    let normalized = normalize(requested);

    if let Some(row) = rows.iter().find(|r| r.locale() == normalized) {
        return (row.locale(), Some(row));
    }

    if let Some(row) = rows.iter().find(|r| r.locale() == DEFAULT_LOCALE) {
        return (DEFAULT_LOCALE, Some(row));
    }

    (DEFAULT_LOCALE, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Row {
        locale: &'static str,
        name: &'static str,
    }

    impl Localized for Row {
        fn locale(&self) -> &str {
            self.locale
        }
    }

    #[test]
    fn test_normalize_unsupported_tag() {
        assert_eq!(normalize("en"), "en");
        assert_eq!(normalize("uk"), "uk");
        assert_eq!(normalize("de"), "en");
        assert_eq!(normalize(""), "en");
    }

    #[test]
    fn test_resolve_exact_match() {
        let rows = vec![
            Row { locale: "en", name: "Food" },
            Row { locale: "uk", name: "Їжа" },
        ];
        let (locale, row) = resolve("uk", &rows);
        assert_eq!(locale, "uk");
        assert_eq!(row.unwrap().name, "Їжа");
    }

    #[test]
    fn test_resolve_falls_back_to_default() {
        let rows = vec![Row { locale: "en", name: "Food" }];
        let (locale, row) = resolve("uk", &rows);
        assert_eq!(locale, "en");
        assert_eq!(row.unwrap().name, "Food");
    }

    #[test]
    fn test_resolve_unsupported_uses_default() {
        let rows = vec![
            Row { locale: "en", name: "Food" },
            Row { locale: "ru", name: "Еда" },
        ];
        // "de" is unsupported: normalized to "en", never "ru"
        let (locale, row) = resolve("de", &rows);
        assert_eq!(locale, "en");
        assert_eq!(row.unwrap().name, "Food");
    }

    #[test]
    fn test_resolve_no_rows_is_empty() {
        let rows: Vec<Row> = vec![];
        let (locale, row) = resolve("ru", &rows);
        assert_eq!(locale, "en");
        assert!(row.is_none());
    }

    #[test]
    fn test_resolve_never_borrows_unrelated_locale() {
        // Only a "ru" row exists; requesting "uk" must not fall back to it
        let rows = vec![Row { locale: "ru", name: "Еда" }];
        let (locale, row) = resolve("uk", &rows);
        assert_eq!(locale, "en");
        assert!(row.is_none());
    }
}
