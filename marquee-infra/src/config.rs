use serde::Deserialize;

fn default_app_env() -> String {
    "dev".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_frontend_url() -> String {
    "http://localhost:5173".to_string()
}

fn default_seat_lock_ttl() -> u64 {
    300
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_app_env")]
    pub app_env: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub database_url: String,
    pub redis_addr: String,
    pub jwt_secret: String,
    #[serde(default)]
    pub google_client_id: String,
    #[serde(default)]
    pub google_client_secret: String,
    #[serde(default)]
    pub google_redirect_url: String,
    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,
    // CSV; falls back to the frontend URL when unset
    #[serde(default)]
    pub cors_origins: Option<String>,
    #[serde(default = "default_seat_lock_ttl")]
    pub seat_lock_ttl_seconds: u64,
    #[serde(default)]
    pub admin_emails: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let s = config::Config::builder()
            .add_source(config::Environment::default())
            .build()?;

        let cfg: Config = s.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        if self.jwt_secret.len() < 32 {
            return Err(config::ConfigError::Message(
                "JWT_SECRET must be at least 32 characters".to_string(),
            ));
        }
        if self.seat_lock_ttl_seconds == 0 {
            return Err(config::ConfigError::Message(
                "SEAT_LOCK_TTL_SECONDS must be a positive integer".to_string(),
            ));
        }
        Ok(())
    }

    pub fn cors_origins(&self) -> Vec<String> {
        let raw = self.cors_origins.as_deref().unwrap_or(&self.frontend_url);
        split_csv(raw)
    }

    /// Lowercased, trimmed, de-duplicated admin allowlist.
    pub fn admin_emails(&self) -> Vec<String> {
        normalize_emails(split_csv(self.admin_emails.as_deref().unwrap_or("")))
    }
}

fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

fn normalize_emails(input: Vec<String>) -> Vec<String> {
    let mut out = Vec::with_capacity(input.len());
    for e in input {
        let e = e.trim().to_lowercase();
        if !e.is_empty() && !out.contains(&e) {
            out.push(e);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            app_env: "test".into(),
            port: 8080,
            database_url: "postgres://localhost/marquee".into(),
            redis_addr: "redis://127.0.0.1/".into(),
            jwt_secret: "0123456789abcdef0123456789abcdef".into(),
            google_client_id: String::new(),
            google_client_secret: String::new(),
            google_redirect_url: String::new(),
            frontend_url: "http://localhost:5173".into(),
            cors_origins: None,
            seat_lock_ttl_seconds: 300,
            admin_emails: None,
        }
    }

    #[test]
    fn cors_defaults_to_frontend_url() {
        let cfg = base_config();
        assert_eq!(cfg.cors_origins(), vec!["http://localhost:5173".to_string()]);
    }

    #[test]
    fn admin_emails_normalized_and_deduped() {
        let mut cfg = base_config();
        cfg.admin_emails = Some(" Ops@Example.com, ops@example.com ,, admin@example.com".into());
        assert_eq!(
            cfg.admin_emails(),
            vec!["ops@example.com".to_string(), "admin@example.com".to_string()]
        );
    }

    #[test]
    fn short_jwt_secret_rejected() {
        let mut cfg = base_config();
        cfg.jwt_secret = "too-short".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_ttl_rejected() {
        let mut cfg = base_config();
        cfg.seat_lock_ttl_seconds = 0;
        assert!(cfg.validate().is_err());
    }
}
