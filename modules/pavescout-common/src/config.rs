use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Web server
    pub web_host: String,
    pub web_port: u16,

    // Geodata sources
    pub overpass_url: String,

    // Pipeline tuning
    pub job_retention_hours: i64,
    pub evaluation_pacing_ms: u64,
}

impl Config {
    /// Load configuration from environment variables. Every variable has a
    /// sensible default.
    pub fn from_env() -> Self {
        Self {
            web_host: env::var("WEB_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            web_port: env::var("WEB_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .expect("WEB_PORT must be a number"),
            overpass_url: env::var("OVERPASS_URL")
                .unwrap_or_else(|_| "https://overpass-api.de/api/interpreter".to_string()),
            job_retention_hours: env::var("JOB_RETENTION_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .expect("JOB_RETENTION_HOURS must be a number"),
            evaluation_pacing_ms: env::var("EVALUATION_PACING_MS")
                .unwrap_or_else(|_| "250".to_string())
                .parse()
                .expect("EVALUATION_PACING_MS must be a number"),
        }
    }
}
