//! Technician-to-request proximity matching
//!
//! A technician matches a request when the request's point lies within the
//! technician's effective radius (base work radius plus membership bonus),
//! the category is among their specialties, and they are active and
//! available. Distance is great-circle (haversine), computed in SQL for
//! listings and mirrored here for notification payloads.

use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::users::Specialty;

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// SQL fragment computing haversine distance in km between a bound point
/// (`$lat`, `$lng` as the given placeholder numbers) and a technician's
/// base. `least(1.0, ..)` guards acos against rounding drift.
pub fn haversine_sql(lat_param: &str, lng_param: &str) -> String {
    format!(
        "(6371.0 * acos(least(1.0, \
         cos(radians({lat})) * cos(radians(tp.lat)) * cos(radians(tp.lng) - radians({lng})) \
         + sin(radians({lat})) * sin(radians(tp.lat)))))",
        lat = lat_param,
        lng = lng_param
    )
}

/// SQL expression for a technician's effective radius.
pub const EFFECTIVE_RADIUS_SQL: &str = "(tp.work_radius_km + CASE tp.membership_tier \
     WHEN 'pro' THEN 15.0 WHEN 'plus' THEN 5.0 ELSE 0.0 END)";

/// Great-circle distance between two points in km.
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}

/// A technician matched to a request point.
#[derive(Debug, sqlx::FromRow)]
pub struct MatchedTechnician {
    pub user_id: Uuid,
    pub lat: f64,
    pub lng: f64,
}

/// Find active, available technicians whose effective radius covers the
/// given point and whose specialties include the category.
pub async fn find_matching_technicians(
    db: &PgPool,
    category: Specialty,
    lat: f64,
    lng: f64,
) -> Result<Vec<MatchedTechnician>, sqlx::Error> {
    let sql = format!(
        r#"
        SELECT tp.user_id, tp.lat, tp.lng
        FROM technician_profiles tp
        JOIN users u ON u.id = tp.user_id
        WHERE u.active
          AND tp.available
          AND $1 = ANY(tp.specialties)
          AND {distance} <= {radius}
        "#,
        distance = haversine_sql("$2", "$3"),
        radius = EFFECTIVE_RADIUS_SQL,
    );

    sqlx::query_as::<_, MatchedTechnician>(&sql)
        .bind(category.as_str())
        .bind(lat)
        .bind(lng)
        .fetch_all(db)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_distance_for_same_point() {
        assert!(haversine_km(-12.05, -77.04, -12.05, -77.04) < 1e-9);
    }

    #[test]
    fn known_distance_lima_to_callao() {
        // Plaza de Armas de Lima to Callao port, roughly 12-13 km
        let d = haversine_km(-12.0464, -77.0428, -12.0667, -77.1536);
        assert!((11.0..15.0).contains(&d), "got {}", d);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = haversine_km(-12.0, -77.0, -12.2, -77.1);
        let b = haversine_km(-12.2, -77.1, -12.0, -77.0);
        assert!((a - b).abs() < 1e-9);
    }

    #[test]
    fn one_degree_latitude_is_about_111_km() {
        let d = haversine_km(0.0, 0.0, 1.0, 0.0);
        assert!((110.0..112.5).contains(&d), "got {}", d);
    }
}
