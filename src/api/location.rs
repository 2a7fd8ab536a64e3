use actix_web::{HttpResponse, Responder, web};
use serde_json::json;

use crate::auth::auth::AuthUser;
use crate::utils::netloc::{NetworkLocation, network_location_chain};

/// Coarse network location for the caller, tried across the configured
/// IP-geolocation providers in order.
#[utoipa::path(
    get,
    path = "/api/location/ip",
    responses(
        (status = 200, description = "Network location", body = NetworkLocation),
        (status = 502, description = "Every provider failed", body = Object, example = json!({
            "error": "Unable to fetch network location"
        }))
    ),
    security(("bearer_auth" = [])),
    tag = "Location"
)]
pub async fn ip_location(
    _auth: AuthUser,
    client: web::Data<reqwest::Client>,
) -> actix_web::Result<impl Responder> {
    match network_location_chain(&client).resolve(&()).await {
        Some(location) => Ok(HttpResponse::Ok().json(location)),
        None => Ok(HttpResponse::BadGateway()
            .json(json!({"error": "Unable to fetch network location"}))),
    }
}
