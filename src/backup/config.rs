use crate::backup::paths::BackupPaths;
use anyhow::{Result, anyhow};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

include!(concat!(env!("OUT_DIR"), "/qsb_env_allowlist.rs"));

pub const DEFAULT_RETENTION_KEEP: usize = 3;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub region: String,
    pub namespace: String,
    pub page_size: u32,
    pub retries: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            namespace: "default".to_string(),
            page_size: MAX_PAGE_SIZE,
            retries: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupRunConfig {
    pub admin_group: String,
    pub admin_principal_arn: Option<String>,
    pub timezone: String,
    pub template_ready_timeout_secs: u64,
    pub template_poll_interval_secs: u64,
}

impl Default for BackupRunConfig {
    fn default() -> Self {
        Self {
            admin_group: "Admins".to_string(),
            admin_principal_arn: None,
            timezone: "UTC".to_string(),
            template_ready_timeout_secs: 120,
            template_poll_interval_secs: 5,
        }
    }
}

impl BackupRunConfig {
    pub fn timezone(&self) -> Result<Tz> {
        self.timezone
            .trim()
            .parse::<Tz>()
            .map_err(|err| anyhow!("invalid timezone `{}`: {err}", self.timezone))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub keep: usize,
    pub force_delete_without_recovery: bool,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            keep: DEFAULT_RETENTION_KEEP,
            force_delete_without_recovery: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BackupConfig {
    pub service: ServiceConfig,
    pub backup: BackupRunConfig,
    pub retention: RetentionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialBackupConfig {
    service: Option<ServiceConfig>,
    backup: Option<BackupRunConfig>,
    retention: Option<RetentionConfig>,
}

fn lookup_trimmed(lookup: &dyn Fn(&str) -> Option<String>, var: &str) -> Option<String> {
    lookup(var)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_or_u64(lookup: &dyn Fn(&str) -> Option<String>, var: &str, fallback: u64) -> u64 {
    lookup_trimmed(lookup, var)
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(fallback)
}

fn env_or_usize(lookup: &dyn Fn(&str) -> Option<String>, var: &str, fallback: usize) -> usize {
    lookup_trimmed(lookup, var)
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(fallback)
}

fn env_or_bool(lookup: &dyn Fn(&str) -> Option<String>, var: &str, fallback: bool) -> bool {
    match lookup_trimmed(lookup, var).as_deref() {
        Some("1" | "true" | "TRUE" | "yes" | "on") => true,
        Some("0" | "false" | "FALSE" | "no" | "off") => false,
        _ => fallback,
    }
}

fn env_or_string(lookup: &dyn Fn(&str) -> Option<String>, var: &str, fallback: &str) -> String {
    lookup_trimmed(lookup, var).unwrap_or_else(|| fallback.to_string())
}

pub fn validate(cfg: &BackupConfig) -> Result<()> {
    if cfg.service.region.trim().is_empty() {
        return Err(anyhow!("invalid service region: cannot be empty"));
    }
    if cfg.service.namespace.trim().is_empty() {
        return Err(anyhow!("invalid service namespace: cannot be empty"));
    }
    if cfg.service.page_size == 0 || cfg.service.page_size > MAX_PAGE_SIZE {
        return Err(anyhow!(
            "invalid page size: require 1 <= page_size <= {MAX_PAGE_SIZE}"
        ));
    }
    let explicit_arn = cfg
        .backup
        .admin_principal_arn
        .as_deref()
        .is_some_and(|arn| !arn.trim().is_empty());
    if !explicit_arn && cfg.backup.admin_group.trim().is_empty() {
        return Err(anyhow!(
            "invalid admin principal: set admin_group or admin_principal_arn"
        ));
    }
    cfg.backup.timezone()?;
    if cfg.backup.template_poll_interval_secs == 0 {
        return Err(anyhow!(
            "invalid template poll interval: must be >= 1 second"
        ));
    }
    if cfg.backup.template_ready_timeout_secs < cfg.backup.template_poll_interval_secs {
        return Err(anyhow!(
            "invalid template ready timeout: must be >= poll interval"
        ));
    }
    if cfg.retention.keep == 0 {
        return Err(anyhow!("invalid retention keep: must be >= 1"));
    }
    Ok(())
}

fn merge_file_config(base: &mut BackupConfig, path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(path)?;
    let parsed: PartialBackupConfig = toml::from_str(&raw)
        .map_err(|err| anyhow!("failed to parse config {}: {err}", path.display()))?;
    if let Some(service) = parsed.service {
        base.service = service;
    }
    if let Some(backup) = parsed.backup {
        base.backup = backup;
    }
    if let Some(retention) = parsed.retention {
        base.retention = retention;
    }
    Ok(())
}

fn apply_env_overrides(cfg: &mut BackupConfig, lookup: &dyn Fn(&str) -> Option<String>) {
    cfg.service.region = env_or_string(lookup, "QSB_REGION", &cfg.service.region);
    cfg.service.namespace = env_or_string(lookup, "QSB_NAMESPACE", &cfg.service.namespace);
    cfg.service.page_size =
        env_or_u64(lookup, "QSB_PAGE_SIZE", u64::from(cfg.service.page_size))
            .try_into()
            .unwrap_or(cfg.service.page_size);
    cfg.service.retries = env_or_usize(lookup, "QSB_AWS_RETRIES", cfg.service.retries);

    cfg.backup.admin_group = env_or_string(lookup, "QSB_ADMIN_GROUP", &cfg.backup.admin_group);
    if let Some(arn) = lookup_trimmed(lookup, "QSB_ADMIN_PRINCIPAL_ARN") {
        cfg.backup.admin_principal_arn = Some(arn);
    }
    cfg.backup.timezone = env_or_string(lookup, "QSB_TIMEZONE", &cfg.backup.timezone);
    cfg.backup.template_ready_timeout_secs = env_or_u64(
        lookup,
        "QSB_TEMPLATE_READY_TIMEOUT_SECS",
        cfg.backup.template_ready_timeout_secs,
    );
    cfg.backup.template_poll_interval_secs = env_or_u64(
        lookup,
        "QSB_TEMPLATE_POLL_INTERVAL_SECS",
        cfg.backup.template_poll_interval_secs,
    );

    cfg.retention.keep = env_or_usize(lookup, "QSB_RETENTION_KEEP", cfg.retention.keep);
    cfg.retention.force_delete_without_recovery = env_or_bool(
        lookup,
        "QSB_FORCE_DELETE_WITHOUT_RECOVERY",
        cfg.retention.force_delete_without_recovery,
    );
}

pub fn load_config(paths: &BackupPaths) -> Result<BackupConfig> {
    let mut cfg = BackupConfig::default();
    merge_file_config(&mut cfg, &paths.config_file)?;
    apply_env_overrides(&mut cfg, &|var| env::var(var).ok());
    validate(&cfg)?;
    Ok(cfg)
}

/// `QSB_*` variables set in the environment that nothing in the crate reads.
pub fn unknown_env_keys() -> Vec<String> {
    let mut out = env::vars()
        .map(|(key, _)| key)
        .filter(|key| key.starts_with(ENV_PREFIX))
        .filter(|key| !GENERATED_QSB_ENV_ALLOWLIST.contains(&key.as_str()))
        .collect::<Vec<_>>();
    out.sort();
    out
}
