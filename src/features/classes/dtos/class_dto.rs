use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::features::classes::models::{Class, ClassLocale, ClassStatus};
use crate::shared::locale;

/// Parameters for creating a class
#[derive(Debug, Clone, Deserialize)]
pub struct CreateClassParams {
    pub code: String,
    pub parent: Option<String>,
    pub icon: Option<String>,
    /// Default-locale display name
    pub name: String,
}

/// Parameters for updating a class; absent fields are left untouched
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateClassParams {
    /// New default-locale display name
    pub name: Option<String>,
    pub icon: Option<String>,
    /// `Some(None)` moves the class to the root of the forest
    pub parent: Option<Option<String>>,
}

/// Filter for listing classes
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClassFilter {
    pub status: Option<ClassStatus>,
    pub parent: Option<String>,
    /// Match the whole subtree under `parent`, not just direct children
    pub include_descendants: bool,
}

/// Locale-resolved class returned to callers
#[derive(Debug, Clone, Serialize)]
pub struct ClassView {
    pub code: String,
    pub parent: Option<String>,
    pub status: ClassStatus,
    pub icon: Option<String>,
    pub locale: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ClassView {
    /// Applies locale resolution to a class and its locale rows.
    pub fn assemble(class: Class, requested_locale: &str, rows: &[ClassLocale]) -> Self {
        let (effective, row) = locale::resolve(requested_locale, rows);
        Self {
            code: class.code,
            parent: class.parent,
            status: class.status,
            icon: class.icon,
            locale: effective.to_string(),
            name: row.map(|r| r.name.clone()),
            created_at: class.created_at,
            updated_at: class.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(code: &str) -> Class {
        Class {
            code: code.to_string(),
            parent: None,
            status: ClassStatus::Inactive,
            icon: None,
            path: code.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn locale_row(code: &str, locale: &str, name: &str) -> ClassLocale {
        ClassLocale {
            class_code: code.to_string(),
            locale: locale.to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_assemble_prefers_requested_locale() {
        let rows = vec![
            locale_row("food", "en", "Food"),
            locale_row("food", "uk", "Їжа"),
        ];
        let view = ClassView::assemble(class("food"), "uk", &rows);
        assert_eq!(view.locale, "uk");
        assert_eq!(view.name.as_deref(), Some("Їжа"));
    }

    #[test]
    fn test_assemble_falls_back_to_default() {
        let rows = vec![locale_row("food", "en", "Food")];
        let view = ClassView::assemble(class("food"), "uk", &rows);
        assert_eq!(view.locale, "en");
        assert_eq!(view.name.as_deref(), Some("Food"));
    }

    #[test]
    fn test_assemble_empty_without_rows() {
        let view = ClassView::assemble(class("food"), "uk", &[]);
        assert_eq!(view.locale, "en");
        assert!(view.name.is_none());
    }
}
