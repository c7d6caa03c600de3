//! Restore options
//!
//! Everything the pipeline treats as configuration rather than discovered data:
//! the rotation prefix and exclusion set, the Identity Field Set, collection
//! names and the settings policy. Deserialized from the `restore` portion of
//! the config file; every field has a default except `bucket`.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::lifecycle::RetryPolicy;
use crate::predicates::DEFAULT_ROTATED_PREFIX;

use super::errors::{RestoreError, RestoreResult};

/// One `{collection, field}` pair of the Identity Field Set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityField {
    pub collection: String,
    pub field: String,
}

impl IdentityField {
    pub fn new(collection: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            field: field.into(),
        }
    }

    /// `collection.field`
    pub fn path(&self) -> String {
        format!("{}.{}", self.collection, self.field)
    }
}

/// What the Settings Sanitizer carries forward, removes and invalidates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsPolicy {
    #[serde(default = "default_settings_collection")]
    pub collection: String,
    /// Field holding a settings row's key
    #[serde(default = "default_key_field")]
    pub key_field: String,
    /// Keys copied from the rotated settings collection when present there
    #[serde(default = "default_carry_forward")]
    pub carry_forward: Vec<String>,
    /// Keys deleted from live settings unconditionally
    #[serde(default = "default_remove")]
    pub remove: Vec<String>,
    #[serde(default = "default_connections_collection")]
    pub connections_collection: String,
    /// Boolean flag set to `false` on every connection
    #[serde(default = "default_validity_field")]
    pub validity_field: String,
}

impl Default for SettingsPolicy {
    fn default() -> Self {
        Self {
            collection: default_settings_collection(),
            key_field: default_key_field(),
            carry_forward: default_carry_forward(),
            remove: default_remove(),
            connections_collection: default_connections_collection(),
            validity_field: default_validity_field(),
        }
    }
}

/// Bootstrap endpoint and retry bounds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapOptions {
    /// Endpoint to POST to once services run. No bootstrap when absent.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Fixed delay before every attempt
    #[serde(default = "default_delay_secs")]
    pub delay_secs: u64,
    /// Per-request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        Self {
            url: None,
            max_attempts: default_max_attempts(),
            delay_secs: default_delay_secs(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl BootstrapOptions {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_secs(self.delay_secs))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreOptions {
    /// Current tenant's object store bucket
    #[serde(default)]
    pub bucket: String,
    /// Scratch directory for the downloaded archive and its extraction
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    #[serde(default = "default_rotation_prefix")]
    pub rotation_prefix: String,
    /// Collections never rotated (e.g. job queues)
    #[serde(default = "default_rotation_exclude")]
    pub rotation_exclude: BTreeSet<String>,
    #[serde(default = "default_organizations_collection")]
    pub organizations_collection: String,
    #[serde(default = "default_identity_fields")]
    pub identity_fields: Vec<IdentityField>,
    /// Organization field naming the tenant's object store namespace
    #[serde(default = "default_tenant_id_field")]
    pub tenant_id_field: String,
    /// Restored fields that point at the organization; set to the live `_id`
    #[serde(default = "default_reparent")]
    pub reparent: Vec<IdentityField>,
    /// Collection of asset references
    #[serde(default = "default_files_collection")]
    pub files_collection: String,
    /// Asset directory inside the extracted archive
    #[serde(default = "default_assets_dir")]
    pub assets_dir: String,
    #[serde(default = "default_org_dir_marker")]
    pub org_dir_marker: String,
    #[serde(default = "default_upload_concurrency")]
    pub upload_concurrency: usize,
    #[serde(default)]
    pub settings: SettingsPolicy,
    #[serde(default)]
    pub bootstrap: BootstrapOptions,
}

impl Default for RestoreOptions {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            work_dir: default_work_dir(),
            rotation_prefix: default_rotation_prefix(),
            rotation_exclude: default_rotation_exclude(),
            organizations_collection: default_organizations_collection(),
            identity_fields: default_identity_fields(),
            tenant_id_field: default_tenant_id_field(),
            reparent: default_reparent(),
            files_collection: default_files_collection(),
            assets_dir: default_assets_dir(),
            org_dir_marker: default_org_dir_marker(),
            upload_concurrency: default_upload_concurrency(),
            settings: SettingsPolicy::default(),
            bootstrap: BootstrapOptions::default(),
        }
    }
}

impl RestoreOptions {
    /// Defaults with the given bucket
    pub fn with_bucket(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            ..Self::default()
        }
    }

    /// Reject options the pipeline cannot run with
    pub fn validate(&self) -> RestoreResult<()> {
        let required = [
            ("bucket", &self.bucket),
            ("rotation_prefix", &self.rotation_prefix),
            ("organizations_collection", &self.organizations_collection),
            ("tenant_id_field", &self.tenant_id_field),
            ("files_collection", &self.files_collection),
            ("assets_dir", &self.assets_dir),
            ("org_dir_marker", &self.org_dir_marker),
            ("settings.collection", &self.settings.collection),
            ("settings.key_field", &self.settings.key_field),
            ("settings.connections_collection", &self.settings.connections_collection),
            ("settings.validity_field", &self.settings.validity_field),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(RestoreError::config(format!("{} must not be empty", name)));
            }
        }

        for field in &self.identity_fields {
            if field.collection.is_empty() || field.field.is_empty() {
                return Err(RestoreError::config(format!(
                    "identity field '{}' is incomplete",
                    field.path()
                )));
            }
        }
        for field in &self.reparent {
            if field.collection.is_empty() || field.field.is_empty() {
                return Err(RestoreError::config(format!(
                    "reparent field '{}' is incomplete",
                    field.path()
                )));
            }
        }

        if self.bucket.contains('/') {
            return Err(RestoreError::config("bucket must not contain '/'"));
        }
        if self.upload_concurrency == 0 {
            return Err(RestoreError::config("upload_concurrency must be at least 1"));
        }
        if self.bootstrap.max_attempts == 0 {
            return Err(RestoreError::config("bootstrap.max_attempts must be at least 1"));
        }
        Ok(())
    }
}

fn default_work_dir() -> PathBuf {
    std::env::temp_dir().join("tenant-restore")
}

fn default_rotation_prefix() -> String {
    DEFAULT_ROTATED_PREFIX.to_string()
}

fn default_rotation_exclude() -> BTreeSet<String> {
    ["jobs".to_string()].into_iter().collect()
}

fn default_organizations_collection() -> String {
    "organizations".to_string()
}

fn default_identity_fields() -> Vec<IdentityField> {
    ["orgCoreToken", "orgCoreId", "apiKey", "apiSecret"]
        .into_iter()
        .map(|field| IdentityField::new("organizations", field))
        .collect()
}

fn default_tenant_id_field() -> String {
    "_id".to_string()
}

fn default_reparent() -> Vec<IdentityField> {
    vec![
        IdentityField::new("users", "organization"),
        IdentityField::new("organizationaffiliations", "organization"),
    ]
}

fn default_files_collection() -> String {
    "files".to_string()
}

fn default_assets_dir() -> String {
    "s3".to_string()
}

fn default_org_dir_marker() -> String {
    "org::".to_string()
}

fn default_upload_concurrency() -> usize {
    4
}

fn default_settings_collection() -> String {
    "settings".to_string()
}

fn default_key_field() -> String {
    "settingKey".to_string()
}

fn default_carry_forward() -> Vec<String> {
    vec!["templateUrl".to_string()]
}

fn default_remove() -> Vec<String> {
    vec!["sslDomain".to_string()]
}

fn default_connections_collection() -> String {
    "externalaccounts".to_string()
}

fn default_validity_field() -> String {
    "isValid".to_string()
}

fn default_max_attempts() -> u32 {
    10
}

fn default_delay_secs() -> u64 {
    30
}

fn default_timeout_secs() -> u64 {
    30
}
