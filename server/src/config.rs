use std::path::PathBuf;

use crate::storage::DEFAULT_PARALLEL_OPERATIONS;

/// Process configuration, read once at startup from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub entries_table: String,
    pub tracking_table: String,
    pub box_table: String,
    /// Root of the template blob store (local filesystem mode).
    pub template_path: PathBuf,
    pub region: String,
    pub account_id: String,
    pub secret_tier: String,
    pub secret_key_id: Option<String>,
    /// First segments accepted as-is by key sanitization; anything else
    /// is prefixed with `default_namespace`. Empty list disables
    /// prefixing.
    pub namespaces: Vec<String>,
    pub default_namespace: String,
    pub parallel_operations: usize,
    pub auth_realm: String,
    /// JSON object mapping user names to passwords.
    pub auth_credentials: String,
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

impl Config {
    pub fn from_env() -> Self {
        let namespaces: Vec<String> = env_or("NBOX_NAMESPACES", "")
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        Self {
            entries_table: env_or("NBOX_ENTRIES_TABLE_NAME", "nbox-entries"),
            tracking_table: env_or("NBOX_TRACKING_ENTRIES_TABLE_NAME", "nbox-tracking"),
            box_table: env_or("NBOX_BOX_TABLE_NAME", "nbox-boxes"),
            template_path: PathBuf::from(env_or("NBOX_TEMPLATE_PATH", "./data/templates")),
            region: env_or("AWS_REGION", "local"),
            account_id: env_or("ACCOUNT_ID", "000000000000"),
            secret_tier: env_or("NBOX_PARAMETER_STORE_DEFAULT_TIER", "Standard"),
            secret_key_id: std::env::var("NBOX_PARAMETER_STORE_KEY_ID").ok(),
            namespaces,
            default_namespace: env_or("NBOX_DEFAULT_NAMESPACE", ""),
            parallel_operations: env_or("NBOX_PARALLEL_OPERATIONS", "")
                .parse()
                .unwrap_or(DEFAULT_PARALLEL_OPERATIONS),
            auth_realm: env_or("NBOX_AUTH_REALM", "nbox"),
            auth_credentials: env_or("NBOX_AUTH_CREDENTIALS", "{}"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            entries_table: "nbox-entries".to_string(),
            tracking_table: "nbox-tracking".to_string(),
            box_table: "nbox-boxes".to_string(),
            template_path: PathBuf::from("./data/templates"),
            region: "local".to_string(),
            account_id: "000000000000".to_string(),
            secret_tier: "Standard".to_string(),
            secret_key_id: None,
            namespaces: Vec::new(),
            default_namespace: String::new(),
            parallel_operations: DEFAULT_PARALLEL_OPERATIONS,
            auth_realm: "nbox".to_string(),
            auth_credentials: "{}".to_string(),
        }
    }
}
