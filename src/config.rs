use std::time::Duration;

use anyhow::{Context, bail};

use crate::storage::{S3Config, StorageKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Dev,
    Prod,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub secret_key: String,
    pub app_env: AppEnv,
    pub storage_type: StorageKind,
    pub upload_dir: String,
    pub public_files_base_url: String,
    pub s3: Option<S3Config>,
    pub archive_interval: Duration,
    pub reconcile_interval: Duration,
    pub orphan_grace: Duration,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup, so tests do not need to touch
    /// the process environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let get_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let port = get_or("PORT", "8080")
            .parse::<u16>()
            .context("PORT must be a valid port number")?;

        let secret_key = get("SECRET_KEY").context("SECRET_KEY not set")?;

        let app_env = match get_or("APP_ENV", "prod").as_str() {
            "dev" => AppEnv::Dev,
            "prod" => AppEnv::Prod,
            other => bail!("APP_ENV must be 'dev' or 'prod', got '{}'", other),
        };

        let storage_raw = get_or("STORAGE_TYPE", "local");
        let storage_type = StorageKind::parse(&storage_raw)
            .with_context(|| format!("unknown STORAGE_TYPE '{}'", storage_raw))?;

        let s3_keys = [
            "S3_BUCKET",
            "S3_REGION",
            "S3_ENDPOINT",
            "S3_ACCESS_KEY",
            "S3_SECRET_KEY",
            "S3_PUBLIC_URL",
        ];
        let s3 = if storage_type == StorageKind::S3 || s3_keys.iter().any(|k| get(*k).is_some()) {
            let missing: Vec<&str> = s3_keys
                .iter()
                .copied()
                .filter(|k| get(*k).is_none())
                .collect();
            if !missing.is_empty() {
                bail!("incomplete S3 configuration, missing: {}", missing.join(", "));
            }

            Some(S3Config {
                bucket: get_or("S3_BUCKET", ""),
                region: get_or("S3_REGION", ""),
                endpoint: get_or("S3_ENDPOINT", ""),
                access_key: get_or("S3_ACCESS_KEY", ""),
                secret_key: get_or("S3_SECRET_KEY", ""),
                public_url: get_or("S3_PUBLIC_URL", ""),
            })
        } else {
            None
        };

        let seconds = |key: &str, default: u64| -> anyhow::Result<Duration> {
            match get(key) {
                Some(v) => v
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .with_context(|| format!("{} must be a number of seconds", key)),
                None => Ok(Duration::from_secs(default)),
            }
        };

        Ok(Self {
            database_url: get_or("DATABASE_URL", "sqlite://vietio.db?mode=rwc"),
            host: get_or("HOST", "0.0.0.0"),
            port,
            secret_key,
            app_env,
            storage_type,
            upload_dir: get_or("UPLOAD_DIR", "./uploads"),
            public_files_base_url: get_or("PUBLIC_FILES_BASE_URL", "/uploads"),
            s3,
            archive_interval: seconds("ARCHIVE_INTERVAL_SECS", 3600)?,
            reconcile_interval: seconds("RECONCILE_INTERVAL_SECS", 21600)?,
            orphan_grace: seconds("ORPHAN_GRACE_SECS", 3600)?,
        })
    }

    pub fn is_dev(&self) -> bool {
        self.app_env == AppEnv::Dev
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> anyhow::Result<AppConfig> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[("SECRET_KEY", "secret")]).unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.storage_type, StorageKind::Local);
        assert_eq!(cfg.app_env, AppEnv::Prod);
        assert!(cfg.s3.is_none());
        assert_eq!(cfg.archive_interval, Duration::from_secs(3600));
        assert_eq!(cfg.bind_address(), "0.0.0.0:8080");
    }

    #[test]
    fn test_secret_required() {
        assert!(config(&[]).is_err());
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(config(&[("SECRET_KEY", "s"), ("PORT", "eighty")]).is_err());
        assert!(config(&[("SECRET_KEY", "s"), ("STORAGE_TYPE", "gcs")]).is_err());
        assert!(config(&[("SECRET_KEY", "s"), ("APP_ENV", "staging")]).is_err());
    }

    #[test]
    fn test_s3_requires_all_settings() {
        let err = config(&[
            ("SECRET_KEY", "s"),
            ("STORAGE_TYPE", "s3"),
            ("S3_BUCKET", "ads"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("S3_ENDPOINT"));

        let cfg = config(&[
            ("SECRET_KEY", "s"),
            ("STORAGE_TYPE", "s3"),
            ("S3_BUCKET", "ads"),
            ("S3_REGION", "ru-central1"),
            ("S3_ENDPOINT", "https://storage.example.net"),
            ("S3_ACCESS_KEY", "key"),
            ("S3_SECRET_KEY", "secret"),
            ("S3_PUBLIC_URL", "https://ads.storage.example.net"),
        ])
        .unwrap();
        assert_eq!(cfg.storage_type, StorageKind::S3);
        assert_eq!(cfg.s3.map(|s| s.bucket).as_deref(), Some("ads"));
    }
}
