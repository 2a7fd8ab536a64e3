use std::env;

use dotenvy::dotenv;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,
    pub refresh_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_register_per_min: u32,
    pub rate_refresh_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,

    /// Required for admin sign-ups; absent means admin signup is disabled.
    pub admin_invite_code: Option<String>,
    /// Base of the frontend, used to build password-reset links.
    pub app_base_url: String,

    // Reverse geocoding: exactly one active provider, picked here
    pub reverse_geocode_provider: String,
    pub reverse_geocode_user_agent: String,
    pub reverse_geocode_language: String,
    pub mapbox_token: Option<String>,
    pub google_maps_key: Option<String>,

    // Photo store
    pub cloudinary_cloud_name: Option<String>,
    pub cloudinary_api_key: Option<String>,
    pub cloudinary_api_secret: Option<String>,
    pub cloudinary_folder: String,

    // Outbound mail
    pub email_host: Option<String>,
    pub email_user: Option<String>,
    pub email_pass: Option<String>,
    pub email_port: Option<u16>,
    pub email_secure: bool,
    pub email_from: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        Self {
            server_addr: env::var("SERVER_ADDR").expect("SERVER_ADDR must be set"),
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            jwt_secret: env::var("JWT_SECRET").expect("JWT_SECRET must be set"),
            access_token_ttl: env::var("ACCESS_TOKEN_TTL")
                .unwrap_or_else(|_| "900".to_string()) // default 15 min
                .parse()
                .unwrap(),
            refresh_token_ttl: env::var("REFRESH_TOKEN_TTL")
                .unwrap_or_else(|_| "604800".to_string()) // default 7 days
                .parse()
                .unwrap(),

            rate_login_per_min: env::var("RATE_LOGIN_PER_MIN")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap(),
            rate_register_per_min: env::var("RATE_REGISTER_PER_MIN")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap(),
            rate_refresh_per_min: env::var("RATE_REFRESH_PER_MIN")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap(),
            rate_protected_per_min: env::var("RATE_PROTECTED_PER_MIN")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .unwrap(),

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api".to_string()),

            admin_invite_code: env::var("ADMIN_INVITE_CODE").ok(),
            app_base_url: env::var("APP_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),

            reverse_geocode_provider: env::var("REVERSE_GEOCODE_PROVIDER")
                .unwrap_or_else(|_| "nominatim".to_string()),
            reverse_geocode_user_agent: env::var("REVERSE_GEOCODE_USER_AGENT")
                .unwrap_or_else(|_| "attendance-app".to_string()),
            reverse_geocode_language: env::var("REVERSE_GEOCODE_LANGUAGE")
                .unwrap_or_else(|_| "en".to_string()),
            mapbox_token: env::var("MAPBOX_TOKEN").ok(),
            google_maps_key: env::var("GOOGLE_MAPS_KEY").ok(),

            cloudinary_cloud_name: env::var("CLOUDINARY_CLOUD_NAME").ok(),
            cloudinary_api_key: env::var("CLOUDINARY_API_KEY").ok(),
            cloudinary_api_secret: env::var("CLOUDINARY_API_SECRET").ok(),
            cloudinary_folder: env::var("CLOUDINARY_FOLDER")
                .unwrap_or_else(|_| "attendance-app".to_string()),

            email_host: env::var("EMAIL_HOST").ok(),
            email_user: env::var("EMAIL_USER").ok(),
            email_pass: env::var("EMAIL_PASS").ok(),
            email_port: env::var("EMAIL_PORT").ok().and_then(|value| value.parse().ok()),
            email_secure: env::var("EMAIL_SECURE")
                .map(|value| value == "true")
                .unwrap_or(false),
            email_from: env::var("EMAIL_FROM").ok(),
        }
    }
}
