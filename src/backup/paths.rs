use anyhow::Result;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct BackupPaths {
    pub home: PathBuf,
    pub logs_dir: PathBuf,
    pub config_file: PathBuf,
}

fn required_home_dir() -> Result<PathBuf> {
    if let Some(home) = dirs::home_dir() {
        return Ok(home);
    }
    Err(anyhow::anyhow!("HOME directory could not be resolved"))
}

fn env_or_default_path(var: &str, fallback: PathBuf) -> PathBuf {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => fallback,
    }
}

pub fn resolve_paths() -> Result<BackupPaths> {
    let home = match env::var("QSB_HOME") {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => required_home_dir()?.join(".qs-backup"),
    };

    let logs_dir = env_or_default_path("QSB_LOGS_DIR", home.join("logs"));
    let config_file = env_or_default_path("QSB_CONFIG_PATH", home.join("config.toml"));

    Ok(BackupPaths {
        home,
        logs_dir,
        config_file,
    })
}
