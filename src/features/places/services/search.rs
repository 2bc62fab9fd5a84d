//! SQL composition for the place search.
//!
//! Predicates are applied in a fixed order so the generated statement
//! is deterministic for a given filter: class membership, status set,
//! city set, distributor set, verified flag, locale-resolved text
//! match, geo radius, timetable window. The count and page queries
//! share the same predicate chain.

use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::features::places::dtos::PlaceSort;
use crate::features::places::models::{GeoPoint, PlaceStatus, EARTH_RADIUS_METERS};
use crate::shared::week::Segment;

const PLACE_COLUMNS: &str = "id, city_id, distributor_id, class_code, status, verified, \
                             lon, lat, website, phone, created_at, updated_at";

/// Fully resolved inputs for the SQL builder.
///
/// Hierarchy expansion and window splitting happen before this point;
/// the builder only binds values.
#[derive(Debug, Clone, Default)]
pub struct SearchArgs {
    /// Expanded class codes; `None` means no class predicate
    pub class_codes: Option<Vec<String>>,
    pub statuses: Vec<PlaceStatus>,
    pub city_ids: Vec<Uuid>,
    pub distributor_ids: Vec<Uuid>,
    pub verified: Option<bool>,
    /// Normalized locale tag for the text match
    pub locale: String,
    pub query: Option<String>,
    pub center: Option<GeoPoint>,
    pub radius_m: Option<f64>,
    /// Split window segments; `Some(empty)` matches nothing
    pub window_segments: Option<Vec<Segment>>,
    pub sort: PlaceSort,
}

pub fn build_count_query(args: &SearchArgs) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM places");
    push_predicates(&mut qb, args);
    qb
}

pub fn build_page_query(args: &SearchArgs, limit: i64, offset: i64) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!("SELECT {} FROM places", PLACE_COLUMNS));
    push_predicates(&mut qb, args);

    match (args.sort, args.center) {
        (PlaceSort::Distance, Some(center)) => {
            qb.push(" ORDER BY ");
            push_distance_expr(&mut qb, center);
            qb.push(" ASC, created_at DESC");
        }
        _ => {
            qb.push(" ORDER BY created_at DESC, id");
        }
    }

    qb.push(" LIMIT ").push_bind(limit).push(" OFFSET ").push_bind(offset);
    qb
}

fn push_predicates(qb: &mut QueryBuilder<'static, Postgres>, args: &SearchArgs) {
    qb.push(" WHERE TRUE");

    if let Some(codes) = &args.class_codes {
        qb.push(" AND class_code = ANY(").push_bind(codes.clone()).push(")");
    }
    if !args.statuses.is_empty() {
        qb.push(" AND status = ANY(").push_bind(args.statuses.clone()).push(")");
    }
    if !args.city_ids.is_empty() {
        qb.push(" AND city_id = ANY(").push_bind(args.city_ids.clone()).push(")");
    }
    if !args.distributor_ids.is_empty() {
        qb.push(" AND distributor_id = ANY(")
            .push_bind(args.distributor_ids.clone())
            .push(")");
    }
    if let Some(verified) = args.verified {
        qb.push(" AND verified = ").push_bind(verified);
    }

    if let Some(query) = &args.query {
        // Match against the row locale resolution would pick for this
        // request: the normalized locale's row when present, else the
        // default-locale row.
        let pattern = format!("%{}%", escape_like(query));
        qb.push(
            " AND EXISTS (SELECT 1 FROM place_locales pl WHERE pl.place_id = places.id \
             AND pl.locale = COALESCE((SELECT pl2.locale FROM place_locales pl2 \
             WHERE pl2.place_id = places.id AND pl2.locale = ",
        )
        .push_bind(args.locale.clone())
        .push("), 'en') AND (pl.name ILIKE ")
        .push_bind(pattern.clone())
        .push(" OR pl.address ILIKE ")
        .push_bind(pattern)
        .push("))");
    }

    if let (Some(center), Some(radius)) = (args.center, args.radius_m) {
        // Bounding box prefilter before the exact distance check.
        // 1 degree of latitude is approximately 111km; the box is kept
        // conservative, the Haversine term below is exact.
        let lat_delta = (radius / 111_000.0) * 2.0;
        let lon_delta = lat_delta / center.lat.to_radians().cos().abs().max(0.01);

        qb.push(" AND lat BETWEEN ")
            .push_bind(center.lat - lat_delta)
            .push(" AND ")
            .push_bind(center.lat + lat_delta);
        qb.push(" AND lon BETWEEN ")
            .push_bind(center.lon - lon_delta)
            .push(" AND ")
            .push_bind(center.lon + lon_delta);
        qb.push(" AND ");
        push_distance_expr(qb, center);
        qb.push(" <= ").push_bind(radius);
    }

    if let Some(segments) = &args.window_segments {
        if segments.is_empty() {
            // zero-length window
            qb.push(" AND FALSE");
        } else {
            qb.push(
                " AND EXISTS (SELECT 1 FROM place_timetables t \
                 WHERE t.place_id = places.id AND (",
            );
            for (i, segment) in segments.iter().enumerate() {
                if i > 0 {
                    qb.push(" OR ");
                }
                qb.push("(t.start_min < ")
                    .push_bind(segment.1)
                    .push(" AND t.end_min > ")
                    .push_bind(segment.0)
                    .push(")");
            }
            qb.push("))");
        }
    }
}

/// Haversine distance in meters from `center`, as a SQL expression
fn push_distance_expr(qb: &mut QueryBuilder<'static, Postgres>, center: GeoPoint) {
    qb.push(format!("(2 * {} * asin(sqrt(power(sin(radians(lat - ", EARTH_RADIUS_METERS))
        .push_bind(center.lat)
        .push(") / 2), 2) + cos(radians(")
        .push_bind(center.lat)
        .push(")) * cos(radians(lat)) * power(sin(radians(lon - ")
        .push_bind(center.lon)
        .push(") / 2), 2))))");
}

/// Escapes ILIKE metacharacters in a user-supplied substring
pub fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> SearchArgs {
        SearchArgs {
            locale: "en".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_no_filters_builds_bare_query() {
        let qb = build_count_query(&args());
        assert_eq!(qb.sql(), "SELECT COUNT(*) FROM places WHERE TRUE");
    }

    #[test]
    fn test_predicate_order_is_fixed() {
        let mut a = args();
        a.class_codes = Some(vec!["food".to_string()]);
        a.statuses = vec![PlaceStatus::Active];
        a.verified = Some(true);

        let sql = build_count_query(&a).sql().to_string();
        let class_at = sql.find("class_code = ANY").unwrap();
        let status_at = sql.find("status = ANY").unwrap();
        let verified_at = sql.find("verified = ").unwrap();
        assert!(class_at < status_at && status_at < verified_at);
    }

    #[test]
    fn test_text_match_targets_resolved_locale() {
        let mut a = args();
        a.query = Some("coffee".to_string());
        let sql = build_count_query(&a).sql().to_string();
        assert!(sql.contains("pl.locale = COALESCE("));
        assert!(sql.contains("pl.name ILIKE "));
        assert!(sql.contains("pl.address ILIKE "));
    }

    #[test]
    fn test_geo_radius_adds_box_and_distance() {
        let mut a = args();
        a.center = Some(GeoPoint::new(30.5234, 50.4501));
        a.radius_m = Some(500.0);
        let sql = build_count_query(&a).sql().to_string();
        assert!(sql.contains("lat BETWEEN "));
        assert!(sql.contains("lon BETWEEN "));
        assert!(sql.contains("asin(sqrt(power(sin(radians(lat - "));
    }

    #[test]
    fn test_zero_length_window_matches_nothing() {
        let mut a = args();
        a.window_segments = Some(Vec::new());
        let sql = build_count_query(&a).sql().to_string();
        assert!(sql.ends_with(" AND FALSE"));
    }

    #[test]
    fn test_wrapping_window_produces_two_segments() {
        let mut a = args();
        a.window_segments = Some(vec![(10_000, 10_080), (0, 200)]);
        let sql = build_count_query(&a).sql().to_string();
        assert_eq!(sql.matches("t.start_min < ").count(), 2);
        assert!(sql.contains(" OR "));
    }

    #[test]
    fn test_distance_sort_requires_center() {
        let mut a = args();
        a.sort = PlaceSort::Distance;
        // no center: falls back to creation time
        let sql = build_page_query(&a, 11, 0).sql().to_string();
        assert!(sql.contains("ORDER BY created_at DESC"));

        a.center = Some(GeoPoint::new(30.5234, 50.4501));
        let sql = build_page_query(&a, 11, 0).sql().to_string();
        assert!(sql.contains("ORDER BY (2 * 6371000"));
        assert!(sql.contains("LIMIT "));
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }
}
