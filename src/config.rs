use anyhow::Result;
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub http_host: String,
    pub http_port: u16,
    pub cors_origins: Vec<String>,
    pub database_url: Option<String>,
    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    pub alert_phone: Option<String>,
    pub twilio_from: Option<String>,
    pub twiml_voice_url: Option<String>,
    pub twilio_status_callback_url: Option<String>,
    pub answered_call_min_secs: i64,
    pub log_level: String,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        dotenv().ok();

        let http_host = env::var("HTTP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let http_port = env::var("HTTP_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .unwrap_or(8080);

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000,http://127.0.0.1:3000".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let database_url = env::var("DATABASE_URL").ok().filter(|s| !s.is_empty());

        // Older deployments used the short variable names
        let twilio_account_sid = env::var("TWILIO_ACCOUNT_SID")
            .or_else(|_| env::var("TWILIO_SID"))
            .unwrap_or_default();
        let twilio_auth_token = env::var("TWILIO_AUTH_TOKEN")
            .or_else(|_| env::var("TWILIO_TOKEN"))
            .unwrap_or_default();

        let alert_phone = env::var("ALERT_PHONE").ok().filter(|s| !s.is_empty());
        let twilio_from = env::var("TWILIO_FROM").ok().filter(|s| !s.is_empty());
        let twiml_voice_url = env::var("TWIML_VOICE_URL").ok().filter(|s| !s.is_empty());
        let twilio_status_callback_url = env::var("TWILIO_STATUS_CALLBACK_URL")
            .ok()
            .filter(|s| !s.is_empty());

        let answered_call_min_secs = env::var("ANSWERED_CALL_MIN_SECS")
            .unwrap_or_else(|_| "2".to_string())
            .parse()
            .unwrap_or(2);

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            http_host,
            http_port,
            cors_origins,
            database_url,
            twilio_account_sid,
            twilio_auth_token,
            alert_phone,
            twilio_from,
            twiml_voice_url,
            twilio_status_callback_url,
            answered_call_min_secs,
            log_level,
        })
    }

    pub fn has_twilio_credentials(&self) -> bool {
        !self.twilio_account_sid.is_empty() && !self.twilio_auth_token.is_empty()
    }
}
