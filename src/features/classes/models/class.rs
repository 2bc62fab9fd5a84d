use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};

use crate::shared::constants::PATH_SEPARATOR;
use crate::shared::locale::Localized;

/// Class status enum matching database enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "class_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ClassStatus {
    Active,
    Inactive,
}

impl std::fmt::Display for ClassStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClassStatus::Active => write!(f, "active"),
            ClassStatus::Inactive => write!(f, "inactive"),
        }
    }
}

/// Database model for a class (category tree node)
#[derive(Debug, Clone, FromRow)]
pub struct Class {
    pub code: String,
    pub parent: Option<String>,
    pub status: ClassStatus,
    pub icon: Option<String>,
    /// Materialized ancestry, dot-joined codes from root to self.
    /// Derived cache; rewritten whenever `parent` changes.
    pub path: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Class {
    /// Path a direct child of this class gets.
    pub fn child_path(&self, code: &str) -> String {
        format!("{}{}{}", self.path, PATH_SEPARATOR, code)
    }
}

/// Path of a root class.
pub fn root_path(code: &str) -> String {
    code.to_string()
}

/// True when `path` lies strictly inside the subtree at `ancestor_path`.
pub fn path_is_rooted_under(path: &str, ancestor_path: &str) -> bool {
    path.len() > ancestor_path.len()
        && path.starts_with(ancestor_path)
        && path[ancestor_path.len()..].starts_with(PATH_SEPARATOR)
}

/// Database model for a per-locale class name
#[derive(Debug, Clone, FromRow)]
pub struct ClassLocale {
    pub class_code: String,
    pub locale: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Localized for ClassLocale {
    fn locale(&self) -> &str {
        &self.locale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(code: &str, path: &str) -> Class {
        Class {
            code: code.to_string(),
            parent: None,
            status: ClassStatus::Inactive,
            icon: None,
            path: path.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_child_path() {
        let food = class("food", "food");
        assert_eq!(food.child_path("pizza"), "food.pizza");

        let pizza = class("pizza", "food.pizza");
        assert_eq!(pizza.child_path("napoletana"), "food.pizza.napoletana");
    }

    #[test]
    fn test_path_is_rooted_under() {
        assert!(path_is_rooted_under("food.pizza", "food"));
        assert!(path_is_rooted_under("food.pizza.napoletana", "food"));
        assert!(!path_is_rooted_under("food", "food")); // not strictly inside
        assert!(!path_is_rooted_under("foodcourt", "food")); // prefix but no separator
        assert!(!path_is_rooted_under("drinks.beer", "food"));
    }
}
