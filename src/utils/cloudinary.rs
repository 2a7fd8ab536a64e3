use anyhow::{Context, Result};
use chrono::Utc;
use serde::Deserialize;
use sha1::{Digest, Sha1};

use crate::config::Config;

/// Photo-store client. Constructed only when the full credential set is
/// present in the environment; an unconfigured store is a 503 for callers
/// that need it.
pub struct Cloudinary {
    client: reqwest::Client,
    cloud_name: String,
    api_key: String,
    api_secret: String,
    folder: String,
}

#[derive(Debug, Deserialize)]
pub struct UploadedPhoto {
    #[serde(rename = "secure_url")]
    pub url: String,
    pub public_id: String,
    pub width: u32,
    pub height: u32,
}

/// What the store reported for a destroy request. Both `Deleted` and
/// `NotFound` unblock record deletion; anything else must stop it.
#[derive(Debug, PartialEq, Eq)]
pub enum DestroyOutcome {
    Deleted,
    NotFound,
    Failed(String),
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

impl Cloudinary {
    pub fn from_config(config: &Config, client: &reqwest::Client) -> Option<Self> {
        Some(Self {
            client: client.clone(),
            cloud_name: config.cloudinary_cloud_name.clone()?,
            api_key: config.cloudinary_api_key.clone()?,
            api_secret: config.cloudinary_api_secret.clone()?,
            folder: config.cloudinary_folder.clone(),
        })
    }

    pub async fn upload_data_url(&self, data_url: &str) -> Result<UploadedPhoto> {
        let timestamp = Utc::now().timestamp().to_string();
        let signed_params = [
            ("folder".to_string(), self.folder.clone()),
            ("overwrite".to_string(), "false".to_string()),
            ("timestamp".to_string(), timestamp.clone()),
        ];
        let signature = self.sign(&signed_params);

        let url = format!(
            "https://api.cloudinary.com/v1_1/{}/image/upload",
            self.cloud_name
        );
        let form = [
            ("file", data_url),
            ("folder", &self.folder),
            ("overwrite", "false"),
            ("timestamp", &timestamp),
            ("api_key", &self.api_key),
            ("signature", &signature),
        ];

        let uploaded = self
            .client
            .post(&url)
            .form(&form)
            .send()
            .await?
            .error_for_status()
            .context("photo upload rejected")?
            .json::<UploadedPhoto>()
            .await?;

        Ok(uploaded)
    }

    pub async fn destroy(&self, public_id: &str) -> Result<DestroyOutcome> {
        let timestamp = Utc::now().timestamp().to_string();
        let signed_params = [
            ("public_id".to_string(), public_id.to_string()),
            ("timestamp".to_string(), timestamp.clone()),
        ];
        let signature = self.sign(&signed_params);

        let url = format!(
            "https://api.cloudinary.com/v1_1/{}/image/destroy",
            self.cloud_name
        );
        let form = [
            ("public_id", public_id),
            ("timestamp", &timestamp),
            ("api_key", &self.api_key),
            ("signature", &signature),
        ];

        let body = self
            .client
            .post(&url)
            .form(&form)
            .send()
            .await?
            .error_for_status()?
            .json::<DestroyResponse>()
            .await?;

        Ok(destroy_outcome(&body.result))
    }

    fn sign(&self, params: &[(String, String)]) -> String {
        let to_sign = string_to_sign(params);
        let mut hasher = Sha1::new();
        hasher.update(to_sign.as_bytes());
        hasher.update(self.api_secret.as_bytes());
        hex::encode(hasher.finalize())
    }
}

fn destroy_outcome(result: &str) -> DestroyOutcome {
    match result {
        "ok" => DestroyOutcome::Deleted,
        "not found" => DestroyOutcome::NotFound,
        other => DestroyOutcome::Failed(other.to_string()),
    }
}

/// Signature base string: params sorted by key, joined `k=v` with `&`.
fn string_to_sign(params: &[(String, String)]) -> String {
    let mut sorted: Vec<&(String, String)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));
    sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_to_sign_sorts_params() {
        let params = [
            ("timestamp".to_string(), "1700000000".to_string()),
            ("folder".to_string(), "attendance-app".to_string()),
            ("overwrite".to_string(), "false".to_string()),
        ];
        assert_eq!(
            string_to_sign(&params),
            "folder=attendance-app&overwrite=false&timestamp=1700000000"
        );
    }

    #[test]
    fn test_destroy_outcome_mapping() {
        assert_eq!(destroy_outcome("ok"), DestroyOutcome::Deleted);
        // an already-deleted asset does not block record deletion
        assert_eq!(destroy_outcome("not found"), DestroyOutcome::NotFound);
        assert_eq!(
            destroy_outcome("error"),
            DestroyOutcome::Failed("error".to_string())
        );
    }
}
