//! Driver configuration: an optional TOML file layered under
//! individual environment variables, env always winning — the same
//! "explicit override env var, else default file, else pure env" shape the
//! host repository's own `Config::load()` uses, adapted to the two
//! independent key sets S3 and GCS builds read (`S3_*` vs `GCS_*`).

use serde::Deserialize;
use std::path::Path;

/// Per-variant environment/file key names. S3 and GCS builds of this driver
/// read different env var prefixes for the same concepts; everything past
/// config loading is variant-agnostic.
pub struct ConfigKeys {
    /// Env var naming the config file path (`S3_DRIVER_CONFIG` / `GCS_DRIVER_CONFIG`).
    pub config_path_env: &'static str,
    pub bucket_env: &'static str,
    pub endpoint_env: &'static str,
    pub loglevel_env: &'static str,
}

pub const S3_KEYS: ConfigKeys = ConfigKeys {
    config_path_env: "S3_DRIVER_CONFIG",
    bucket_env: "S3_BUCKET_NAME",
    endpoint_env: "S3_ENDPOINT",
    loglevel_env: "S3_DRIVER_LOGLEVEL",
};

pub const GCS_KEYS: ConfigKeys = ConfigKeys {
    config_path_env: "GCS_DRIVER_CONFIG",
    bucket_env: "GCS_BUCKET_NAME",
    endpoint_env: "GCS_ENDPOINT",
    loglevel_env: "GCS_DRIVER_LOGLEVEL",
};

/// Resolved driver configuration, assembled once in `driver_connect`.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub default_bucket: Option<String>,
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub log_level: String,
}

/// Shape of the optional TOML config file — every field optional since a
/// key may be supplied purely through the environment instead.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DriverConfigFile {
    default_bucket: Option<String>,
    endpoint: Option<String>,
    region: Option<String>,
    access_key_id: Option<String>,
    secret_access_key: Option<String>,
    log_level: Option<String>,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DriverConfig {
    /// Load the file named by `keys.config_path_env` (if set and existing),
    /// then layer environment variables on top — env always wins. Returns
    /// `InvalidArgument` if only one of the access/secret keys is present.
    pub fn load(keys: &ConfigKeys) -> Result<Self, ConfigError> {
        let mut file = DriverConfigFile::default();
        if let Ok(path) = std::env::var(keys.config_path_env) {
            file = Self::read_file(Path::new(&path))?;
        }

        let default_bucket = std::env::var(keys.bucket_env).ok().or(file.default_bucket);

        // S3_ENDPOINT falls back to the AWS SDK's own AWS_ENDPOINT_URL
        // convention when unset, so an unconfigured driver still honors it.
        let endpoint = std::env::var(keys.endpoint_env)
            .ok()
            .or_else(|| std::env::var("AWS_ENDPOINT_URL").ok())
            .or(file.endpoint);

        let region = std::env::var("AWS_DEFAULT_REGION")
            .ok()
            .or(file.region)
            .unwrap_or_else(default_region);

        // S3_ACCESS_KEY/S3_SECRET_KEY are the base; AWS_ACCESS_KEY_ID/
        // AWS_SECRET_ACCESS_KEY override them, same precedence as endpoint.
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID")
            .ok()
            .or_else(|| std::env::var("S3_ACCESS_KEY").ok())
            .or(file.access_key_id);
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY")
            .ok()
            .or_else(|| std::env::var("S3_SECRET_KEY").ok())
            .or(file.secret_access_key);

        if access_key_id.is_some() != secret_access_key.is_some() {
            return Err(ConfigError::InvalidArgument(
                "access key and secret key must both be set or both unset".to_string(),
            ));
        }

        let log_level = std::env::var(keys.loglevel_env)
            .ok()
            .or(file.log_level)
            .unwrap_or_else(default_log_level);

        Ok(Self {
            default_bucket,
            endpoint,
            region,
            access_key_id,
            secret_access_key,
            log_level,
        })
    }

    fn read_file(path: &Path) -> Result<DriverConfigFile, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

/// Configuration errors, mirroring the host's `ConfigError::{Io,Parse}` split.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading config file: {0}")]
    Io(String),

    #[error("failed to parse config file: {0}")]
    Parse(String),

    #[error("invalid configuration: {0}")]
    InvalidArgument(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global; serialize tests that touch them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_s3_env() {
        for key in [
            "S3_DRIVER_CONFIG",
            "S3_BUCKET_NAME",
            "S3_ENDPOINT",
            "S3_DRIVER_LOGLEVEL",
            "AWS_ENDPOINT_URL",
            "AWS_DEFAULT_REGION",
            "AWS_ACCESS_KEY_ID",
            "AWS_SECRET_ACCESS_KEY",
            "S3_ACCESS_KEY",
            "S3_SECRET_KEY",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn defaults_when_nothing_set() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_s3_env();
        let config = DriverConfig::load(&S3_KEYS).unwrap();
        assert_eq!(config.region, "us-east-1");
        assert_eq!(config.log_level, "info");
        assert!(config.default_bucket.is_none());
    }

    #[test]
    fn env_overrides_file() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_s3_env();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        use std::io::Write;
        writeln!(file, r#"default_bucket = "from-file""#).unwrap();
        writeln!(file, r#"region = "eu-west-1""#).unwrap();

        std::env::set_var("S3_DRIVER_CONFIG", file.path());
        std::env::set_var("S3_BUCKET_NAME", "from-env");

        let config = DriverConfig::load(&S3_KEYS).unwrap();
        assert_eq!(config.default_bucket.as_deref(), Some("from-env"));
        assert_eq!(config.region, "eu-west-1");

        clear_s3_env();
    }

    #[test]
    fn partial_credentials_are_rejected() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_s3_env();
        std::env::set_var("AWS_ACCESS_KEY_ID", "only-key");
        let err = DriverConfig::load(&S3_KEYS).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidArgument(_)));
        clear_s3_env();
    }

    #[test]
    fn s3_keys_are_read_and_aws_keys_override_them() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_s3_env();

        std::env::set_var("S3_ACCESS_KEY", "s3-key");
        std::env::set_var("S3_SECRET_KEY", "s3-secret");
        let config = DriverConfig::load(&S3_KEYS).unwrap();
        assert_eq!(config.access_key_id.as_deref(), Some("s3-key"));
        assert_eq!(config.secret_access_key.as_deref(), Some("s3-secret"));

        std::env::set_var("AWS_ACCESS_KEY_ID", "aws-key");
        std::env::set_var("AWS_SECRET_ACCESS_KEY", "aws-secret");
        let config = DriverConfig::load(&S3_KEYS).unwrap();
        assert_eq!(config.access_key_id.as_deref(), Some("aws-key"));
        assert_eq!(config.secret_access_key.as_deref(), Some("aws-secret"));

        clear_s3_env();
    }

    #[test]
    fn missing_config_file_is_io_error() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_s3_env();
        std::env::set_var("S3_DRIVER_CONFIG", "/nonexistent/path/to/config.toml");
        let err = DriverConfig::load(&S3_KEYS).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
        clear_s3_env();
    }
}
