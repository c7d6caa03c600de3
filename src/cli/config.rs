//! Configuration file
//!
//! One JSON object. Connection settings and service commands live at the top
//! level next to the restore options, which are flattened in.
//!
//! ```json
//! {
//!   "mongodb_uri": "mongodb://localhost:27017",
//!   "database": "app",
//!   "bucket": "acme-assets",
//!   "region": "eu-west-1",
//!   "bootstrap": { "url": "http://localhost:3000/api/support-account" }
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::lifecycle::CommandSpec;
use crate::restore::RestoreOptions;

use super::errors::{CliError, CliResult};

/// Where assets are uploaded (and, for `local`, where archives are read from)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectStoreKind {
    #[default]
    S3,
    /// A directory mirroring buckets as `<local_root>/<bucket>/<key>`
    Local,
}

/// Service fleet commands, each an argv array
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicesConfig {
    #[serde(default = "default_stop")]
    pub stop: CommandSpec,
    #[serde(default = "default_start")]
    pub start: CommandSpec,
    #[serde(default = "default_status")]
    pub status: CommandSpec,
    #[serde(default = "default_migrate")]
    pub migrate: CommandSpec,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            stop: default_stop(),
            start: default_start(),
            status: default_status(),
            migrate: default_migrate(),
        }
    }
}

fn default_stop() -> CommandSpec {
    CommandSpec::new(["pm2", "stop", "all"])
}

fn default_start() -> CommandSpec {
    CommandSpec::new(["pm2", "start", "all"])
}

fn default_status() -> CommandSpec {
    CommandSpec::new(["pm2", "status"])
}

fn default_migrate() -> CommandSpec {
    CommandSpec::new(["npm", "run", "migrate"])
}

fn default_upload_timeout_secs() -> u64 {
    3600
}

/// Configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Document store connection string (required)
    pub mongodb_uri: String,

    /// Database holding the tenant's collections (required)
    pub database: String,

    /// AWS region for S3; the ambient AWS configuration decides when absent
    #[serde(default)]
    pub region: Option<String>,

    #[serde(default)]
    pub object_store: ObjectStoreKind,

    /// Root directory for `object_store = "local"`
    #[serde(default)]
    pub local_root: Option<PathBuf>,

    /// Per-operation timeout for object store transfers
    #[serde(default = "default_upload_timeout_secs")]
    pub upload_timeout_secs: u64,

    #[serde(default)]
    pub services: ServicesConfig,

    #[serde(flatten)]
    pub restore: RestoreOptions,
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read config: {}", e)))?;
        Self::parse(&content)
    }

    /// Parse and validate configuration JSON
    pub fn parse(content: &str) -> CliResult<Self> {
        let config: Config = serde_json::from_str(content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> CliResult<()> {
        if self.mongodb_uri.trim().is_empty() {
            return Err(CliError::config_error("mongodb_uri must not be empty"));
        }
        if self.database.trim().is_empty() {
            return Err(CliError::config_error("database must not be empty"));
        }
        if self.object_store == ObjectStoreKind::Local && self.local_root.is_none() {
            return Err(CliError::config_error(
                "local_root is required when object_store is 'local'",
            ));
        }
        if self.upload_timeout_secs == 0 {
            return Err(CliError::config_error("upload_timeout_secs must be > 0"));
        }

        let commands = [
            ("services.stop", &self.services.stop),
            ("services.start", &self.services.start),
            ("services.status", &self.services.status),
            ("services.migrate", &self.services.migrate),
        ];
        for (name, command) in commands {
            if command.argv.is_empty() {
                return Err(CliError::config_error(format!("{} must not be empty", name)));
            }
        }

        self.restore
            .validate()
            .map_err(|e| CliError::config_error(e.message().to_string()))
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "mongodb_uri": "mongodb://localhost:27017",
        "database": "app",
        "bucket": "acme-assets"
    }"#;

    #[test]
    fn test_minimal_config() {
        let config = Config::parse(MINIMAL).unwrap();
        assert_eq!(config.object_store, ObjectStoreKind::S3);
        assert_eq!(config.upload_timeout(), Duration::from_secs(3600));
        assert_eq!(config.services.stop.display(), "pm2 stop all");
        assert_eq!(config.restore.bucket, "acme-assets");
        assert_eq!(config.restore.rotation_prefix, "back_");
    }

    #[test]
    fn test_flattened_restore_options() {
        let config = Config::parse(
            r#"{
                "mongodb_uri": "mongodb://localhost:27017",
                "database": "app",
                "bucket": "acme-assets",
                "object_store": "local",
                "local_root": "/srv/mirror",
                "identity_fields": [{"collection": "organizations", "field": "orgCoreToken"}],
                "services": {"migrate": {"argv": ["node", "migrate.js"], "cwd": "/srv/app"}}
            }"#,
        )
        .unwrap();
        assert_eq!(config.object_store, ObjectStoreKind::Local);
        assert_eq!(config.restore.identity_fields.len(), 1);
        assert_eq!(config.services.migrate.cwd, Some(PathBuf::from("/srv/app")));
        assert_eq!(config.services.start.display(), "pm2 start all");
    }

    #[test]
    fn test_invalid_configs_rejected() {
        assert!(Config::parse("{").is_err());
        assert!(Config::parse(r#"{"database": "app", "bucket": "b"}"#).is_err());

        let err = Config::parse(
            r#"{"mongodb_uri": "mongodb://h", "database": "app", "bucket": "b", "object_store": "local"}"#,
        )
        .unwrap_err();
        assert!(err.message().contains("local_root"));

        let err = Config::parse(r#"{"mongodb_uri": "mongodb://h", "database": "app"}"#).unwrap_err();
        assert!(err.message().contains("bucket"));
    }
}
