use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::json;
use tracing::error;
use utoipa::ToSchema;

use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::utils::cloudinary::Cloudinary;

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PhotoUploadRequest {
    /// `data:image/...` data URL captured by the client.
    pub data_url: Option<String>,
}

/// Check-in photo upload; the stored URL and public id are echoed back for
/// the subsequent check-in request.
#[utoipa::path(
    post,
    path = "/api/uploads/photo",
    request_body = PhotoUploadRequest,
    responses(
        (status = 201, description = "Uploaded photo", body = Object, example = json!({
            "url": "https://res.example.com/photo.jpg",
            "publicId": "attendance-app/abc123",
            "width": 1280,
            "height": 720
        })),
        (status = 400, description = "Missing or invalid image"),
        (status = 503, description = "Photo storage not configured")
    ),
    security(("bearer_auth" = [])),
    tag = "Uploads"
)]
pub async fn upload_photo(
    _auth: AuthUser,
    config: web::Data<Config>,
    client: web::Data<reqwest::Client>,
    payload: web::Json<PhotoUploadRequest>,
) -> actix_web::Result<impl Responder> {
    let Some(data_url) = payload.data_url.as_deref() else {
        return Ok(HttpResponse::BadRequest().json(json!({"error": "Missing dataUrl"})));
    };

    if !data_url.starts_with("data:image/") {
        return Ok(HttpResponse::BadRequest().json(json!({"error": "Invalid image format"})));
    }

    let Some(store) = Cloudinary::from_config(&config, &client) else {
        return Ok(HttpResponse::ServiceUnavailable()
            .json(json!({"error": "Photo storage not configured"})));
    };

    match store.upload_data_url(data_url).await {
        Ok(photo) => Ok(HttpResponse::Created().json(json!({
            "url": photo.url,
            "publicId": photo.public_id,
            "width": photo.width,
            "height": photo.height
        }))),
        Err(e) => {
            error!(error = %e, "Photo upload failed");
            Ok(HttpResponse::InternalServerError().json(json!({"error": "Upload failed"})))
        }
    }
}
