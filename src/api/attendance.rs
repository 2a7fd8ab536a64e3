use actix_web::{HttpResponse, Responder, web};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, error, warn};
use utoipa::ToSchema;

use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::model::attendance::AttendanceRecord;
use crate::utils::cloudinary::{Cloudinary, DestroyOutcome};
use crate::utils::geocode::{GeoPoint, format_gps_label, geocode_chain};
use crate::utils::report::{apply_current_status, is_valid_date_key, today_key};
use crate::utils::settings::get_cutoff_time;
use crate::utils::time_rules::status_for_time;
use crate::utils::tz_lookup::timezone_for_coords;

pub const ATTENDANCE_COLUMNS: &str = "id, date_key, user_id, user_name, captured_at, status, \
     location_label, photo_url, photo_public_id, flag_comment, flagged_at, \
     latitude, longitude, accuracy, timezone";

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckInRequest {
    #[schema(example = "Head office")]
    pub location_label: Option<String>,
    pub photo_url: Option<String>,
    pub photo_public_id: Option<String>,
    #[schema(example = 23.8103)]
    pub latitude: Option<f64>,
    #[schema(example = 90.4125)]
    pub longitude: Option<f64>,
    #[schema(example = 12.5)]
    pub accuracy: Option<f64>,
}

#[derive(Serialize, ToSchema)]
pub struct DayResponse {
    #[schema(example = "2026-01-05")]
    pub date: String,
    pub items: Vec<AttendanceRecord>,
}

pub async fn fetch_record(
    pool: &MySqlPool,
    id: u64,
) -> Result<Option<AttendanceRecord>, sqlx::Error> {
    sqlx::query_as::<_, AttendanceRecord>(&format!(
        "SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

async fn fetch_day(
    pool: &MySqlPool,
    date_key: &str,
    user_id: Option<u64>,
) -> Result<Vec<AttendanceRecord>, sqlx::Error> {
    match user_id {
        Some(user_id) => {
            sqlx::query_as::<_, AttendanceRecord>(&format!(
                "SELECT {ATTENDANCE_COLUMNS} FROM attendance \
                 WHERE date_key = ? AND user_id = ? ORDER BY captured_at ASC"
            ))
            .bind(date_key)
            .bind(user_id)
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query_as::<_, AttendanceRecord>(&format!(
                "SELECT {ATTENDANCE_COLUMNS} FROM attendance \
                 WHERE date_key = ? ORDER BY captured_at ASC"
            ))
            .bind(date_key)
            .fetch_all(pool)
            .await
        }
    }
}

/// Check-in endpoint: derives timezone and location from the submitted
/// coordinates, classifies against the current cutoff and persists exactly
/// one record per user per day.
#[utoipa::path(
    post,
    path = "/api/attendance",
    request_body = CheckInRequest,
    responses(
        (status = 201, description = "Checked in", body = AttendanceRecord),
        (status = 400, description = "Location coordinates are required", body = Object, example = json!({
            "error": "Location coordinates are required"
        })),
        (status = 409, description = "Already checked in today", body = Object, example = json!({
            "error": "User already checked in today"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_in(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    client: web::Data<reqwest::Client>,
    payload: web::Json<CheckInRequest>,
) -> actix_web::Result<impl Responder> {
    let (Some(latitude), Some(longitude)) = (payload.latitude, payload.longitude) else {
        return Ok(HttpResponse::BadRequest().json(json!({
            "error": "Location coordinates are required"
        })));
    };

    // zone resolution failing is fine; classification falls back
    let timezone = timezone_for_coords(latitude, longitude);
    if timezone.is_none() {
        debug!(latitude, longitude, "No timezone for coordinates");
    }

    let fallback_label = payload
        .location_label
        .as_deref()
        .map(str::trim)
        .filter(|label| !label.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format_gps_label(latitude, longitude, payload.accuracy));

    let geocoded = geocode_chain(&config, &client)
        .resolve(&GeoPoint {
            latitude,
            longitude,
        })
        .await;
    let location_label = geocoded
        .map(|result| result.label)
        .unwrap_or(fallback_label);

    let captured_at = Utc::now();
    let cutoff_time = match get_cutoff_time(pool.get_ref()).await {
        Ok(value) => value,
        Err(e) => {
            error!(error = %e, "Failed to read cutoff setting");
            return Ok(HttpResponse::InternalServerError().json(json!({"error": "Server error"})));
        }
    };
    let status = status_for_time(captured_at, timezone.as_deref(), &cutoff_time);

    let result = sqlx::query(
        r#"
        INSERT INTO attendance
        (date_key, user_id, user_name, captured_at, status, location_label,
         photo_url, photo_public_id, latitude, longitude, accuracy, timezone)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(today_key())
    .bind(auth.user_id)
    .bind(&auth.name)
    .bind(captured_at)
    .bind(status.as_str())
    .bind(&location_label)
    .bind(&payload.photo_url)
    .bind(&payload.photo_public_id)
    .bind(latitude)
    .bind(longitude)
    .bind(payload.accuracy)
    .bind(&timezone)
    .execute(pool.get_ref())
    .await;

    let record_id = match result {
        Ok(done) => done.last_insert_id(),
        Err(e) => {
            // duplicate check-in for the same user and day
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.code().as_deref() == Some("23000") {
                    return Ok(HttpResponse::Conflict().json(json!({
                        "error": "User already checked in today"
                    })));
                }
            }
            error!(error = %e, user_id = auth.user_id, "Check-in failed");
            return Ok(HttpResponse::InternalServerError().json(json!({"error": "Server error"})));
        }
    };

    match fetch_record(pool.get_ref(), record_id).await {
        Ok(Some(record)) => Ok(HttpResponse::Created().json(record)),
        _ => {
            error!(record_id, "Created attendance record could not be read back");
            Ok(HttpResponse::InternalServerError().json(json!({"error": "Server error"})))
        }
    }
}

/// Today's records: admins see everyone, members only themselves.
#[utoipa::path(
    get,
    path = "/api/attendance/today",
    responses(
        (status = 200, description = "Today's records", body = DayResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn today(auth: AuthUser, pool: web::Data<MySqlPool>) -> actix_web::Result<impl Responder> {
    let date_key = today_key();
    let scope = if auth.is_admin() {
        None
    } else {
        Some(auth.user_id)
    };

    let (records, cutoff_time) = match futures::try_join!(
        fetch_day(pool.get_ref(), &date_key, scope),
        get_cutoff_time(pool.get_ref()),
    ) {
        Ok(parts) => parts,
        Err(e) => {
            error!(error = %e, "Failed to load today's attendance");
            return Ok(HttpResponse::InternalServerError().json(json!({"error": "Server error"})));
        }
    };

    let mut items = records;
    for record in &mut items {
        apply_current_status(record, &cutoff_time);
    }

    Ok(HttpResponse::Ok().json(DayResponse {
        date: date_key,
        items,
    }))
}

/// Records for an arbitrary day; admin only.
#[utoipa::path(
    get,
    path = "/api/attendance/{date}",
    params(("date", Path, description = "Calendar day, YYYY-MM-DD")),
    responses(
        (status = 200, description = "Records for the day", body = DayResponse),
        (status = 400, description = "Invalid date"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn by_date(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<String>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let date_key = path.into_inner();
    if !is_valid_date_key(&date_key) {
        return Ok(HttpResponse::BadRequest().json(json!({"error": "Invalid date. Use YYYY-MM-DD."})));
    }

    let (records, cutoff_time) = match futures::try_join!(
        fetch_day(pool.get_ref(), &date_key, None),
        get_cutoff_time(pool.get_ref()),
    ) {
        Ok(parts) => parts,
        Err(e) => {
            error!(error = %e, date_key = %date_key, "Failed to load attendance for day");
            return Ok(HttpResponse::InternalServerError().json(json!({"error": "Server error"})));
        }
    };

    let mut items = records;
    for record in &mut items {
        apply_current_status(record, &cutoff_time);
    }

    Ok(HttpResponse::Ok().json(DayResponse {
        date: date_key,
        items,
    }))
}

/// Delete a record (owner or admin). A record with a photo requires the
/// photo store to confirm deletion first; anything short of "deleted" or
/// "already gone" blocks the removal.
#[utoipa::path(
    delete,
    path = "/api/attendance/{id}",
    params(("id", Path, description = "Attendance record ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not allowed"),
        (status = 404, description = "Record not found"),
        (status = 502, description = "Photo store refused the deletion"),
        (status = 503, description = "Photo store not configured")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn delete_record(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    client: web::Data<reqwest::Client>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let id = path.into_inner();

    let record = match fetch_record(pool.get_ref(), id).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            return Ok(HttpResponse::NotFound().json(json!({"error": "Record not found"})));
        }
        Err(e) => {
            error!(error = %e, id, "Failed to fetch record for deletion");
            return Ok(HttpResponse::InternalServerError().json(json!({"error": "Server error"})));
        }
    };

    if !auth.is_admin() && record.user_id != auth.user_id {
        return Ok(HttpResponse::Forbidden().json(json!({"error": "Not allowed"})));
    }

    if let Some(public_id) = record.photo_public_id.as_deref() {
        let Some(store) = Cloudinary::from_config(&config, &client) else {
            return Ok(HttpResponse::ServiceUnavailable()
                .json(json!({"error": "Photo storage not configured"})));
        };

        match store.destroy(public_id).await {
            Ok(DestroyOutcome::Deleted | DestroyOutcome::NotFound) => {}
            Ok(DestroyOutcome::Failed(result)) => {
                warn!(id, public_id, result = %result, "Photo store refused deletion");
                return Ok(HttpResponse::BadGateway()
                    .json(json!({"error": "Failed to delete photo from storage"})));
            }
            Err(e) => {
                error!(error = %e, id, public_id, "Photo store unreachable");
                return Ok(HttpResponse::BadGateway()
                    .json(json!({"error": "Failed to delete photo from storage"})));
            }
        }
    }

    if let Err(e) = sqlx::query("DELETE FROM attendance WHERE id = ?")
        .bind(id)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, id, "Failed to delete attendance record");
        return Ok(HttpResponse::InternalServerError().json(json!({"error": "Server error"})));
    }

    Ok(HttpResponse::NoContent().finish())
}
