use std::collections::HashMap;
use std::sync::Arc;

use sqlx::PgPool;
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::core::tx;
use crate::features::classes::models::ClassStatus;
use crate::features::places::dtos::{
    apply_clear_sentinel, CreatePlaceParams, PlaceFilter, PlaceSort, PlaceView,
    SetPlaceLocaleParams, UpdatePlaceParams,
};
use crate::features::places::models::{Place, PlaceLocale, PlaceStatus};
use crate::features::places::services::geocoding_service::ReverseGeocoder;
use crate::features::places::services::search::{
    build_count_query, build_page_query, SearchArgs,
};
use crate::shared::locale::{self, DEFAULT_LOCALE};
use crate::shared::types::{Page, PaginationQuery};
use crate::shared::week;

const PLACE_COLUMNS: &str = "id, city_id, distributor_id, class_code, status, verified, \
                             lon, lat, website, phone, created_at, updated_at";
const PLACE_LOCALE_COLUMNS: &str =
    "place_id, locale, name, address, description, created_at, updated_at";

/// Service for place operations and the composite search
pub struct PlaceService {
    pool: PgPool,
    geocoder: Arc<dyn ReverseGeocoder>,
}

impl PlaceService {
    pub fn new(pool: PgPool, geocoder: Arc<dyn ReverseGeocoder>) -> Self {
        Self { pool, geocoder }
    }

    /// Get a place by id with its locale resolved
    pub async fn get(&self, id: Uuid, requested_locale: &str) -> Result<PlaceView> {
        let place = self.fetch_place(id).await?;
        let locales = self.fetch_locales(id).await?;
        Ok(PlaceView::assemble(place, requested_locale, &locales, None))
    }

    /// Create a place together with its default-locale content row
    ///
    /// The referenced class must exist and be active. A missing address
    /// is filled in by the reverse geocoder; its failure fails the
    /// whole create.
    pub async fn create(&self, params: &CreatePlaceParams) -> Result<PlaceView> {
        params.point.validate()?;
        let name = params.name.trim();
        if name.is_empty() {
            return Err(AppError::Validation(
                "Place name must not be empty".to_string(),
            ));
        }
        self.ensure_active_class(&params.class_code).await?;

        let address = match &params.address {
            Some(address) => address.clone(),
            None => self.geocoder.guess_address(params.point).await?,
        };

        let id = Uuid::new_v4();
        let city_id = params.city_id;
        let distributor_id = params.distributor_id;
        let class_code = params.class_code.clone();
        let point = params.point;
        let website = params.website.as_deref().filter(|s| !s.is_empty()).map(String::from);
        let phone = params.phone.as_deref().filter(|s| !s.is_empty()).map(String::from);
        let name = name.to_string();
        let description = params.description.clone();

        tx::run(&self.pool, move |tx| {
            Box::pin(async move {
                sqlx::query(
                    r#"
                    INSERT INTO places
                        (id, city_id, distributor_id, class_code, status, verified,
                         lon, lat, website, phone)
                    VALUES ($1, $2, $3, $4, $5, FALSE, $6, $7, $8, $9)
                    "#,
                )
                .bind(id)
                .bind(city_id)
                .bind(distributor_id)
                .bind(&class_code)
                .bind(PlaceStatus::Active)
                .bind(point.lon)
                .bind(point.lat)
                .bind(&website)
                .bind(&phone)
                .execute(&mut **tx)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to insert place: {:?}", e);
                    AppError::Database(e)
                })?;

                sqlx::query(
                    r#"
                    INSERT INTO place_locales (place_id, locale, name, address, description)
                    VALUES ($1, $2, $3, $4, $5)
                    "#,
                )
                .bind(id)
                .bind(DEFAULT_LOCALE)
                .bind(&name)
                .bind(&address)
                .bind(&description)
                .execute(&mut **tx)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to insert place locale: {:?}", e);
                    AppError::Database(e)
                })?;

                Ok(())
            })
        })
        .await?;

        tracing::info!("Created place: {} in class {}", id, params.class_code);
        self.get(id, DEFAULT_LOCALE).await
    }

    /// Update mutable place fields
    ///
    /// A class change is re-validated; an address patch lands on the
    /// locale row a read for `requested_locale` would resolve to.
    pub async fn update(
        &self,
        id: Uuid,
        requested_locale: &str,
        params: &UpdatePlaceParams,
    ) -> Result<PlaceView> {
        let place = self.fetch_place(id).await?;

        if let Some(class_code) = &params.class_code {
            self.ensure_active_class(class_code).await?;
        }
        if let Some(point) = params.point {
            point.validate()?;
        }

        let class_code = params
            .class_code
            .clone()
            .unwrap_or_else(|| place.class_code.clone());
        let (lon, lat) = params
            .point
            .map(|p| (p.lon, p.lat))
            .unwrap_or((place.lon, place.lat));
        let website = apply_clear_sentinel(place.website.clone(), params.website.as_deref());
        let phone = apply_clear_sentinel(place.phone.clone(), params.phone.as_deref());

        let address_patch = match &params.address {
            Some(address) => {
                let locales = self.fetch_locales(id).await?;
                let normalized = locale::normalize(requested_locale);
                let target = if locales.iter().any(|l| l.locale == normalized) {
                    normalized.to_string()
                } else {
                    DEFAULT_LOCALE.to_string()
                };
                Some((target, address.clone()))
            }
            None => None,
        };

        tx::run(&self.pool, move |tx| {
            Box::pin(async move {
                sqlx::query(
                    r#"
                    UPDATE places
                    SET class_code = $2, lon = $3, lat = $4, website = $5, phone = $6,
                        updated_at = NOW()
                    WHERE id = $1
                    "#,
                )
                .bind(id)
                .bind(&class_code)
                .bind(lon)
                .bind(lat)
                .bind(&website)
                .bind(&phone)
                .execute(&mut **tx)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to update place: {:?}", e);
                    AppError::Database(e)
                })?;

                if let Some((target_locale, address)) = &address_patch {
                    sqlx::query(
                        r#"
                        UPDATE place_locales
                        SET address = $3, updated_at = NOW()
                        WHERE place_id = $1 AND locale = $2
                        "#,
                    )
                    .bind(id)
                    .bind(target_locale)
                    .bind(address)
                    .execute(&mut **tx)
                    .await
                    .map_err(|e| {
                        tracing::error!("Failed to update place address: {:?}", e);
                        AppError::Database(e)
                    })?;
                }

                Ok(())
            })
        })
        .await?;

        tracing::info!("Updated place: {}", id);
        self.get(id, requested_locale).await
    }

    /// Flip a place between active and inactive
    ///
    /// The blocked state is owned by [`Self::block`]/[`Self::unblock`];
    /// this path refuses to enter or leave it.
    pub async fn update_status(&self, id: Uuid, status: PlaceStatus) -> Result<PlaceView> {
        if status == PlaceStatus::Blocked {
            return Err(AppError::Validation(
                "Status 'blocked' cannot be set via a status update; use block".to_string(),
            ));
        }

        let place = self.fetch_place(id).await?;
        if place.status == PlaceStatus::Blocked {
            return Err(AppError::Validation(format!(
                "Place {} is blocked; use unblock first",
                id
            )));
        }

        self.write_status(id, status).await?;
        tracing::info!("Updated place {} status to {}", id, status);
        self.get(id, DEFAULT_LOCALE).await
    }

    /// Block a place, hiding it from ordinary status flips
    pub async fn block(&self, id: Uuid) -> Result<PlaceView> {
        self.fetch_place(id).await?;
        self.write_status(id, PlaceStatus::Blocked).await?;
        tracing::info!("Blocked place {}", id);
        self.get(id, DEFAULT_LOCALE).await
    }

    /// Lift a block; the place lands on inactive for explicit re-activation
    pub async fn unblock(&self, id: Uuid) -> Result<PlaceView> {
        let place = self.fetch_place(id).await?;
        if place.status != PlaceStatus::Blocked {
            return Err(AppError::Conflict(format!("Place {} is not blocked", id)));
        }
        self.write_status(id, PlaceStatus::Inactive).await?;
        tracing::info!("Unblocked place {}", id);
        self.get(id, DEFAULT_LOCALE).await
    }

    /// Set the verified flag; same-value writes are no-ops
    pub async fn verify(&self, id: Uuid, value: bool) -> Result<PlaceView> {
        let place = self.fetch_place(id).await?;
        if place.verified == value {
            let locales = self.fetch_locales(id).await?;
            return Ok(PlaceView::assemble(place, DEFAULT_LOCALE, &locales, None));
        }

        sqlx::query("UPDATE places SET verified = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(value)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to update place verification: {:?}", e);
                AppError::Database(e)
            })?;

        tracing::info!("Set place {} verified = {}", id, value);
        self.get(id, DEFAULT_LOCALE).await
    }

    // ===== Locale Management =====

    /// Add or replace a per-locale content row
    pub async fn set_locale(
        &self,
        id: Uuid,
        locale_tag: &str,
        params: &SetPlaceLocaleParams,
    ) -> Result<PlaceView> {
        self.fetch_place(id).await?;

        if !locale::is_supported(locale_tag) {
            return Err(AppError::Validation(format!(
                "Unsupported locale '{}'",
                locale_tag
            )));
        }
        let name = params.name.trim();
        if name.is_empty() {
            return Err(AppError::Validation(
                "Place name must not be empty".to_string(),
            ));
        }

        sqlx::query(
            r#"
            INSERT INTO place_locales (place_id, locale, name, address, description)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (place_id, locale)
            DO UPDATE SET name = EXCLUDED.name, address = EXCLUDED.address,
                          description = EXCLUDED.description, updated_at = NOW()
            "#,
        )
        .bind(id)
        .bind(locale_tag)
        .bind(name)
        .bind(&params.address)
        .bind(&params.description)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to upsert place locale: {:?}", e);
            AppError::Database(e)
        })?;

        tracing::info!("Set locale {} for place {}", locale_tag, id);
        self.get(id, locale_tag).await
    }

    /// Remove a per-locale content row; the default locale stays
    pub async fn remove_locale(&self, id: Uuid, locale_tag: &str) -> Result<()> {
        self.fetch_place(id).await?;

        if locale_tag == DEFAULT_LOCALE {
            return Err(AppError::Conflict(format!(
                "Default locale '{}' cannot be removed from place {}",
                DEFAULT_LOCALE, id
            )));
        }

        let result = sqlx::query("DELETE FROM place_locales WHERE place_id = $1 AND locale = $2")
            .bind(id)
            .bind(locale_tag)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to delete place locale: {:?}", e);
                AppError::Database(e)
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Locale '{}' not found for place {}",
                locale_tag, id
            )));
        }

        tracing::info!("Removed locale {} from place {}", locale_tag, id);
        Ok(())
    }

    /// Delete an inactive place with everything it owns
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let place = self.fetch_place(id).await?;
        if place.status != PlaceStatus::Inactive {
            return Err(AppError::Conflict(format!(
                "Place {} must be inactive to delete (status: {})",
                id, place.status
            )));
        }

        tx::run(&self.pool, move |tx| {
            Box::pin(async move {
                sqlx::query("DELETE FROM place_timetables WHERE place_id = $1")
                    .bind(id)
                    .execute(&mut **tx)
                    .await
                    .map_err(|e| {
                        tracing::error!("Failed to delete place timetable: {:?}", e);
                        AppError::Database(e)
                    })?;

                sqlx::query("DELETE FROM place_locales WHERE place_id = $1")
                    .bind(id)
                    .execute(&mut **tx)
                    .await
                    .map_err(|e| {
                        tracing::error!("Failed to delete place locales: {:?}", e);
                        AppError::Database(e)
                    })?;

                sqlx::query("DELETE FROM places WHERE id = $1")
                    .bind(id)
                    .execute(&mut **tx)
                    .await
                    .map_err(|e| {
                        tracing::error!("Failed to delete place: {:?}", e);
                        AppError::Database(e)
                    })?;

                Ok(())
            })
        })
        .await?;

        tracing::info!("Deleted place: {}", id);
        Ok(())
    }

    // ===== Search =====

    /// Composite filtered search, paginated with next-page detection
    pub async fn search(
        &self,
        requested_locale: &str,
        filter: &PlaceFilter,
        sort: PlaceSort,
        page: &PaginationQuery,
    ) -> Result<Page<PlaceView>> {
        if filter.radius_m.is_some() && filter.center.is_none() {
            return Err(AppError::Validation(
                "Geo radius requires a center point".to_string(),
            ));
        }
        if let Some(radius) = filter.radius_m {
            if radius <= 0.0 {
                return Err(AppError::Validation(format!(
                    "Geo radius must be positive, got {}",
                    radius
                )));
            }
        }
        if let Some(center) = filter.center {
            center.validate()?;
        }

        let normalized = locale::normalize(requested_locale).to_string();

        let class_codes = if filter.class_codes.is_empty() {
            None
        } else {
            Some(
                self.expand_class_codes(&filter.class_codes, filter.expand_classes)
                    .await?,
            )
        };

        let window_segments = filter
            .open_within
            .map(|w| week::split_window(w.start_min, w.end_min));

        // Distance ordering without a center is meaningless; ignore it
        let sort = match (sort, filter.center) {
            (PlaceSort::Distance, None) => PlaceSort::CreatedAt,
            (sort, _) => sort,
        };

        let args = SearchArgs {
            class_codes,
            statuses: filter.statuses.clone(),
            city_ids: filter.city_ids.clone(),
            distributor_ids: filter.distributor_ids.clone(),
            verified: filter.verified,
            locale: normalized.clone(),
            query: filter.query.clone(),
            center: filter.center,
            radius_m: filter.radius_m,
            window_segments,
            sort,
        };

        let total: i64 = build_count_query(&args)
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to count places: {:?}", e);
                AppError::Database(e)
            })?;

        let rows: Vec<Place> = build_page_query(&args, page.fetch_limit(), page.offset())
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to search places: {:?}", e);
                AppError::Database(e)
            })?;

        let places = Page::from_overfetched(rows, page.limit(), total);

        let ids: Vec<Uuid> = places.items.iter().map(|p| p.id).collect();
        let locales = self.fetch_locales_many(&ids).await?;
        let mut by_place: HashMap<Uuid, Vec<PlaceLocale>> = HashMap::new();
        for row in locales {
            by_place.entry(row.place_id).or_default().push(row);
        }

        let center = filter.center;
        Ok(places.map(|place| {
            let rows = by_place.remove(&place.id).unwrap_or_default();
            PlaceView::assemble(place, &normalized, &rows, center)
        }))
    }

    // ===== Internal helpers =====

    async fn fetch_place(&self, id: Uuid) -> Result<Place> {
        sqlx::query_as::<_, Place>(&format!(
            "SELECT {} FROM places WHERE id = $1",
            PLACE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to get place: {:?}", e);
            AppError::Database(e)
        })?
        .ok_or_else(|| AppError::NotFound(format!("Place {} not found", id)))
    }

    async fn write_status(&self, id: Uuid, status: PlaceStatus) -> Result<()> {
        sqlx::query("UPDATE places SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to update place status: {:?}", e);
                AppError::Database(e)
            })?;
        Ok(())
    }

    /// The referenced class must exist and be active to take new places
    async fn ensure_active_class(&self, class_code: &str) -> Result<()> {
        let status: Option<ClassStatus> =
            sqlx::query_scalar("SELECT status FROM classes WHERE code = $1")
                .bind(class_code)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to check class: {:?}", e);
                    AppError::Database(e)
                })?;

        match status {
            None => Err(AppError::NotFound(format!(
                "Class '{}' not found",
                class_code
            ))),
            Some(ClassStatus::Inactive) => Err(AppError::Conflict(format!(
                "Class '{}' is not active",
                class_code
            ))),
            Some(ClassStatus::Active) => Ok(()),
        }
    }

    /// Expands class codes to their subtrees via the materialized path
    async fn expand_class_codes(&self, codes: &[String], expand: bool) -> Result<Vec<String>> {
        if !expand {
            return Ok(codes.to_vec());
        }

        sqlx::query_scalar::<_, String>(
            r#"
            SELECT c.code FROM classes c
            WHERE EXISTS (
                SELECT 1 FROM classes r
                WHERE r.code = ANY($1)
                AND (c.path = r.path OR c.path LIKE r.path || '.%')
            )
            "#,
        )
        .bind(codes.to_vec())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to expand class codes: {:?}", e);
            AppError::Database(e)
        })
    }

    async fn fetch_locales(&self, id: Uuid) -> Result<Vec<PlaceLocale>> {
        sqlx::query_as::<_, PlaceLocale>(&format!(
            "SELECT {} FROM place_locales WHERE place_id = $1 ORDER BY locale",
            PLACE_LOCALE_COLUMNS
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to get place locales: {:?}", e);
            AppError::Database(e)
        })
    }

    async fn fetch_locales_many(&self, ids: &[Uuid]) -> Result<Vec<PlaceLocale>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, PlaceLocale>(&format!(
            "SELECT {} FROM place_locales WHERE place_id = ANY($1)",
            PLACE_LOCALE_COLUMNS
        ))
        .bind(ids.to_vec())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to get place locales: {:?}", e);
            AppError::Database(e)
        })
    }
}
