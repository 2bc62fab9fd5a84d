use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::core::error::{AppError, Result};
use crate::core::tx;
use crate::features::classes::dtos::{ClassFilter, ClassView, CreateClassParams, UpdateClassParams};
use crate::features::classes::models::{root_path, Class, ClassLocale, ClassStatus};
use crate::shared::constants::MAX_HIERARCHY_DEPTH;
use crate::shared::locale::{self, DEFAULT_LOCALE};
use crate::shared::types::{Page, PaginationQuery};
use crate::shared::validation::CODE_REGEX;

const CLASS_COLUMNS: &str = "code, parent, status, icon, path, created_at, updated_at";
const CLASS_LOCALE_COLUMNS: &str = "class_code, locale, name, created_at, updated_at";

/// Service for class hierarchy operations
pub struct ClassService {
    pool: PgPool,
}

impl ClassService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a class by code with its locale resolved
    pub async fn get(&self, code: &str, requested_locale: &str) -> Result<ClassView> {
        let class = self.fetch_class(code).await?;
        let locales = self.fetch_locales(code).await?;
        Ok(ClassView::assemble(class, requested_locale, &locales))
    }

    /// Create a class together with its default-locale name
    ///
    /// New classes start inactive; activation is a separate step.
    pub async fn create(&self, params: &CreateClassParams) -> Result<ClassView> {
        let code = params.code.trim();
        let name = params.name.trim();

        if !CODE_REGEX.is_match(code) {
            return Err(AppError::Validation(format!(
                "Invalid class code '{}': expected lowercase alphanumerics and hyphens",
                params.code
            )));
        }
        if name.is_empty() {
            return Err(AppError::Validation(
                "Class name must not be empty".to_string(),
            ));
        }

        if self.class_exists(code).await? {
            return Err(AppError::Conflict(format!(
                "Class '{}' already exists",
                code
            )));
        }
        if self.display_name_taken(name, None).await? {
            return Err(AppError::Conflict(format!(
                "A class named '{}' already exists",
                name
            )));
        }

        let path = match &params.parent {
            Some(parent_code) => self.fetch_class(parent_code).await?.child_path(code),
            None => root_path(code),
        };

        let code_owned = code.to_string();
        let name_owned = name.to_string();
        let parent = params.parent.clone();
        let icon = params.icon.clone();

        tx::run(&self.pool, move |tx| {
            Box::pin(async move {
                sqlx::query(
                    r#"
                    INSERT INTO classes (code, parent, status, icon, path)
                    VALUES ($1, $2, $3, $4, $5)
                    "#,
                )
                .bind(&code_owned)
                .bind(&parent)
                .bind(ClassStatus::Inactive)
                .bind(&icon)
                .bind(&path)
                .execute(&mut **tx)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to insert class: {:?}", e);
                    AppError::Database(e)
                })?;

                sqlx::query(
                    r#"
                    INSERT INTO class_locales (class_code, locale, name)
                    VALUES ($1, $2, $3)
                    "#,
                )
                .bind(&code_owned)
                .bind(DEFAULT_LOCALE)
                .bind(&name_owned)
                .execute(&mut **tx)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to insert class locale: {:?}", e);
                    AppError::Database(e)
                })?;

                Ok(())
            })
        })
        .await?;

        tracing::info!("Created class: {}", code);
        self.get(code, DEFAULT_LOCALE).await
    }

    /// Update name, icon and/or parent of a class
    ///
    /// A parent change is rejected for self-parenting, a missing parent,
    /// or any move that would place the class under its own subtree; on
    /// success the paths of the whole moved subtree are rewritten.
    pub async fn update(&self, code: &str, params: &UpdateClassParams) -> Result<ClassView> {
        let class = self.fetch_class(code).await?;

        let name = match &params.name {
            Some(name) => {
                let name = name.trim();
                if name.is_empty() {
                    return Err(AppError::Validation(
                        "Class name must not be empty".to_string(),
                    ));
                }
                if self.display_name_taken(name, Some(code)).await? {
                    return Err(AppError::Conflict(format!(
                        "A class named '{}' already exists",
                        name
                    )));
                }
                Some(name.to_string())
            }
            None => None,
        };

        // Resolve the parent change up front; the path rewrite depends on it
        let mut parent_change: Option<(Option<String>, String)> = None;
        if let Some(new_parent) = &params.parent {
            match new_parent {
                Some(parent_code) if parent_code == code => {
                    return Err(AppError::Conflict(format!(
                        "Class '{}' cannot be its own parent",
                        code
                    )));
                }
                Some(parent_code) => {
                    let parent = self.fetch_class(parent_code).await?;
                    self.ensure_not_ancestor(code, &parent).await?;
                    parent_change =
                        Some((Some(parent.code.clone()), parent.child_path(code)));
                }
                None => {
                    parent_change = Some((None, root_path(code)));
                }
            }
        }

        let code_owned = code.to_string();
        let icon = params.icon.clone();
        let old_path = class.path.clone();

        tx::run(&self.pool, move |tx| {
            Box::pin(async move {
                if let Some(icon) = &icon {
                    sqlx::query(
                        "UPDATE classes SET icon = $2, updated_at = NOW() WHERE code = $1",
                    )
                    .bind(&code_owned)
                    .bind(icon)
                    .execute(&mut **tx)
                    .await
                    .map_err(|e| {
                        tracing::error!("Failed to update class icon: {:?}", e);
                        AppError::Database(e)
                    })?;
                }

                if let Some((parent, new_path)) = &parent_change {
                    // Rewrite the moved subtree's materialized paths in one pass
                    sqlx::query(
                        r#"
                        UPDATE classes
                        SET path = $2 || substr(path, char_length($1) + 1), updated_at = NOW()
                        WHERE path = $1 OR path LIKE $1 || '.%'
                        "#,
                    )
                    .bind(old_path)
                    .bind(new_path)
                    .execute(&mut **tx)
                    .await
                    .map_err(|e| {
                        tracing::error!("Failed to rewrite class paths: {:?}", e);
                        AppError::Database(e)
                    })?;

                    sqlx::query(
                        "UPDATE classes SET parent = $2, updated_at = NOW() WHERE code = $1",
                    )
                    .bind(&code_owned)
                    .bind(parent)
                    .execute(&mut **tx)
                    .await
                    .map_err(|e| {
                        tracing::error!("Failed to update class parent: {:?}", e);
                        AppError::Database(e)
                    })?;
                }

                if let Some(name) = &name {
                    sqlx::query(
                        r#"
                        UPDATE class_locales
                        SET name = $2, updated_at = NOW()
                        WHERE class_code = $1 AND locale = $3
                        "#,
                    )
                    .bind(&code_owned)
                    .bind(name)
                    .bind(DEFAULT_LOCALE)
                    .execute(&mut **tx)
                    .await
                    .map_err(|e| {
                        tracing::error!("Failed to update class name: {:?}", e);
                        AppError::Database(e)
                    })?;
                }

                Ok(())
            })
        })
        .await?;

        tracing::info!("Updated class: {}", code);
        self.get(code, DEFAULT_LOCALE).await
    }

    /// Activate a class so new places may reference it
    pub async fn activate(&self, code: &str) -> Result<ClassView> {
        let class = self.fetch_class(code).await?;

        sqlx::query("UPDATE classes SET status = $2, updated_at = NOW() WHERE code = $1")
            .bind(&class.code)
            .bind(ClassStatus::Active)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to activate class: {:?}", e);
                AppError::Database(e)
            })?;

        tracing::info!("Activated class: {}", code);
        self.get(code, DEFAULT_LOCALE).await
    }

    /// Deactivate a class, reassigning its places to a replacement class
    ///
    /// The status flip and the reassignment commit together or not at all.
    pub async fn deactivate(&self, code: &str, replacement_code: &str) -> Result<ClassView> {
        if code == replacement_code {
            return Err(AppError::Conflict(format!(
                "Replacement class must differ from '{}'",
                code
            )));
        }

        let class = self.fetch_class(code).await?;
        let replacement = self.fetch_class(replacement_code).await?;
        if replacement.status == ClassStatus::Inactive {
            return Err(AppError::Conflict(format!(
                "Replacement class '{}' is inactive",
                replacement_code
            )));
        }

        let code_owned = class.code.clone();
        let replacement_owned = replacement.code.clone();

        let reassigned = tx::run(&self.pool, move |tx| {
            Box::pin(async move {
                sqlx::query(
                    "UPDATE classes SET status = $2, updated_at = NOW() WHERE code = $1",
                )
                .bind(&code_owned)
                .bind(ClassStatus::Inactive)
                .execute(&mut **tx)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to deactivate class: {:?}", e);
                    AppError::Database(e)
                })?;

                let result = sqlx::query(
                    "UPDATE places SET class_code = $2, updated_at = NOW() WHERE class_code = $1",
                )
                .bind(&code_owned)
                .bind(&replacement_owned)
                .execute(&mut **tx)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to reassign places: {:?}", e);
                    AppError::Database(e)
                })?;

                Ok(result.rows_affected())
            })
        })
        .await?;

        tracing::info!(
            "Deactivated class {} ({} places reassigned to {})",
            code,
            reassigned,
            replacement_code
        );
        self.get(code, DEFAULT_LOCALE).await
    }

    /// Delete an inactive, childless, unreferenced class
    pub async fn delete(&self, code: &str) -> Result<()> {
        let class = self.fetch_class(code).await?;

        if class.status == ClassStatus::Active {
            return Err(AppError::Conflict(format!(
                "Class '{}' must be deactivated before deletion",
                code
            )));
        }

        let children: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM classes WHERE parent = $1")
            .bind(&class.code)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to count child classes: {:?}", e);
                AppError::Database(e)
            })?;
        if children > 0 {
            return Err(AppError::Conflict(format!(
                "Class '{}' still has {} child classes",
                code, children
            )));
        }

        let places: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM places WHERE class_code = $1")
            .bind(&class.code)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to count referencing places: {:?}", e);
                AppError::Database(e)
            })?;
        if places > 0 {
            return Err(AppError::Conflict(format!(
                "Class '{}' is still referenced by {} places",
                code, places
            )));
        }

        let code_owned = class.code.clone();
        tx::run(&self.pool, move |tx| {
            Box::pin(async move {
                sqlx::query("DELETE FROM class_locales WHERE class_code = $1")
                    .bind(&code_owned)
                    .execute(&mut **tx)
                    .await
                    .map_err(|e| {
                        tracing::error!("Failed to delete class locales: {:?}", e);
                        AppError::Database(e)
                    })?;

                sqlx::query("DELETE FROM classes WHERE code = $1")
                    .bind(&code_owned)
                    .execute(&mut **tx)
                    .await
                    .map_err(|e| {
                        tracing::error!("Failed to delete class: {:?}", e);
                        AppError::Database(e)
                    })?;

                Ok(())
            })
        })
        .await?;

        tracing::info!("Deleted class: {}", code);
        Ok(())
    }

    // ===== Locale Management =====

    /// Add or replace a per-locale display name
    pub async fn set_locale(&self, code: &str, locale_tag: &str, name: &str) -> Result<ClassView> {
        let class = self.fetch_class(code).await?;

        if !locale::is_supported(locale_tag) {
            return Err(AppError::Validation(format!(
                "Unsupported locale '{}'",
                locale_tag
            )));
        }
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Validation(
                "Class name must not be empty".to_string(),
            ));
        }
        // The global name rule applies to the default-locale display name
        if locale_tag == DEFAULT_LOCALE && self.display_name_taken(name, Some(code)).await? {
            return Err(AppError::Conflict(format!(
                "A class named '{}' already exists",
                name
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO class_locales (class_code, locale, name)
            VALUES ($1, $2, $3)
            ON CONFLICT (class_code, locale)
            DO UPDATE SET name = EXCLUDED.name, updated_at = NOW()
            "#,
        )
        .bind(&class.code)
        .bind(locale_tag)
        .bind(name)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to upsert class locale: {:?}", e);
            AppError::Database(e)
        })?;

        tracing::info!("Set locale {} for class {}", locale_tag, code);
        self.get(code, locale_tag).await
    }

    /// Remove a per-locale display name; the default locale is kept forever
    pub async fn remove_locale(&self, code: &str, locale_tag: &str) -> Result<()> {
        let class = self.fetch_class(code).await?;

        if locale_tag == DEFAULT_LOCALE {
            return Err(AppError::Conflict(format!(
                "Default locale '{}' cannot be removed from class '{}'",
                DEFAULT_LOCALE, code
            )));
        }

        let result = sqlx::query(
            "DELETE FROM class_locales WHERE class_code = $1 AND locale = $2",
        )
        .bind(&class.code)
        .bind(locale_tag)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete class locale: {:?}", e);
            AppError::Database(e)
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Locale '{}' not found for class '{}'",
                locale_tag, code
            )));
        }

        tracing::info!("Removed locale {} from class {}", locale_tag, code);
        Ok(())
    }

    // ===== Listing =====

    /// List classes with optional status/parent filtering, paginated
    pub async fn list(
        &self,
        requested_locale: &str,
        filter: &ClassFilter,
        page: &PaginationQuery,
    ) -> Result<Page<ClassView>> {
        let scope = match &filter.parent {
            Some(parent_code) => {
                let parent = self.fetch_class(parent_code).await?;
                if filter.include_descendants {
                    Some(ParentScope::Subtree(parent.path))
                } else {
                    Some(ParentScope::Direct(parent.code))
                }
            }
            None => None,
        };

        let total: i64 = build_class_query("SELECT COUNT(*) FROM classes", filter.status, &scope)
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to count classes: {:?}", e);
                AppError::Database(e)
            })?;

        let mut qb = build_class_query(
            &format!("SELECT {} FROM classes", CLASS_COLUMNS),
            filter.status,
            &scope,
        );
        qb.push(" ORDER BY path LIMIT ")
            .push_bind(page.fetch_limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows: Vec<Class> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to list classes: {:?}", e);
                AppError::Database(e)
            })?;

        let classes = Page::from_overfetched(rows, page.limit(), total);

        let codes: Vec<String> = classes.items.iter().map(|c| c.code.clone()).collect();
        let locales = self.fetch_locales_many(&codes).await?;

        Ok(classes.map(|class| {
            let rows: Vec<ClassLocale> = locales
                .iter()
                .filter(|l| l.class_code == class.code)
                .cloned()
                .collect();
            ClassView::assemble(class, requested_locale, &rows)
        }))
    }

    // ===== Internal helpers =====

    async fn fetch_class(&self, code: &str) -> Result<Class> {
        sqlx::query_as::<_, Class>(&format!(
            "SELECT {} FROM classes WHERE code = $1",
            CLASS_COLUMNS
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to get class: {:?}", e);
            AppError::Database(e)
        })?
        .ok_or_else(|| AppError::NotFound(format!("Class '{}' not found", code)))
    }

    async fn class_exists(&self, code: &str) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM classes WHERE code = $1)")
                .bind(code)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to check class existence: {:?}", e);
                    AppError::Database(e)
                })?;
        Ok(exists)
    }

    /// Checks the global display-name rule against default-locale rows
    async fn display_name_taken(&self, name: &str, exclude_code: Option<&str>) -> Result<bool> {
        let taken: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM class_locales
                WHERE locale = $1 AND lower(name) = lower($2) AND class_code <> $3
            )
            "#,
        )
        .bind(DEFAULT_LOCALE)
        .bind(name)
        .bind(exclude_code.unwrap_or(""))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to check class name: {:?}", e);
            AppError::Database(e)
        })?;
        Ok(taken)
    }

    /// Rejects a reparent that would create a cycle.
    ///
    /// Walks the relational parent chain upward from the proposed parent;
    /// the cached path is never trusted for this check.
    async fn ensure_not_ancestor(&self, code: &str, proposed_parent: &Class) -> Result<()> {
        let mut current = Some(proposed_parent.code.clone());
        let mut depth = 0usize;

        while let Some(ancestor) = current {
            if ancestor == code {
                return Err(AppError::Conflict(format!(
                    "Moving class '{}' under '{}' would create a cycle",
                    code, proposed_parent.code
                )));
            }
            depth += 1;
            if depth > MAX_HIERARCHY_DEPTH {
                return Err(AppError::Conflict(format!(
                    "Class hierarchy above '{}' exceeds {} levels",
                    proposed_parent.code, MAX_HIERARCHY_DEPTH
                )));
            }
            current = sqlx::query_scalar::<_, Option<String>>(
                "SELECT parent FROM classes WHERE code = $1",
            )
            .bind(&ancestor)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to walk class ancestry: {:?}", e);
                AppError::Database(e)
            })?
            .flatten();
        }

        Ok(())
    }

    async fn fetch_locales(&self, code: &str) -> Result<Vec<ClassLocale>> {
        sqlx::query_as::<_, ClassLocale>(&format!(
            "SELECT {} FROM class_locales WHERE class_code = $1 ORDER BY locale",
            CLASS_LOCALE_COLUMNS
        ))
        .bind(code)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to get class locales: {:?}", e);
            AppError::Database(e)
        })
    }

    async fn fetch_locales_many(&self, codes: &[String]) -> Result<Vec<ClassLocale>> {
        if codes.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, ClassLocale>(&format!(
            "SELECT {} FROM class_locales WHERE class_code = ANY($1)",
            CLASS_LOCALE_COLUMNS
        ))
        .bind(codes.to_vec())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to get class locales: {:?}", e);
            AppError::Database(e)
        })
    }
}

enum ParentScope {
    /// Direct children of a class
    Direct(String),
    /// Every class whose path is rooted under a class's path
    Subtree(String),
}

fn build_class_query(
    select: &str,
    status: Option<ClassStatus>,
    scope: &Option<ParentScope>,
) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(select);
    qb.push(" WHERE TRUE");

    if let Some(status) = status {
        qb.push(" AND status = ").push_bind(status);
    }
    match scope {
        Some(ParentScope::Direct(code)) => {
            qb.push(" AND parent = ").push_bind(code.clone());
        }
        Some(ParentScope::Subtree(path)) => {
            qb.push(" AND path LIKE ").push_bind(path.clone()).push(" || '.%'");
        }
        None => {}
    }

    qb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_class_query_no_filters() {
        let qb = build_class_query("SELECT COUNT(*) FROM classes", None, &None);
        assert_eq!(qb.sql(), "SELECT COUNT(*) FROM classes WHERE TRUE");
    }

    #[test]
    fn test_build_class_query_status_and_direct_parent() {
        let scope = Some(ParentScope::Direct("food".to_string()));
        let qb = build_class_query(
            "SELECT code FROM classes",
            Some(ClassStatus::Active),
            &scope,
        );
        assert_eq!(
            qb.sql(),
            "SELECT code FROM classes WHERE TRUE AND status = $1 AND parent = $2"
        );
    }

    #[test]
    fn test_build_class_query_subtree_scope() {
        let scope = Some(ParentScope::Subtree("food".to_string()));
        let qb = build_class_query("SELECT code FROM classes", None, &scope);
        assert_eq!(
            qb.sql(),
            "SELECT code FROM classes WHERE TRUE AND path LIKE $1 || '.%'"
        );
    }
}
