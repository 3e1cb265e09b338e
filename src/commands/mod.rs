pub mod backup;
pub mod folder_init;
pub mod prune;
pub mod status;

use anyhow::Result;
use serde::Serialize;

use crate::backup::audit;
use crate::backup::config::{BackupConfig, load_config};
use crate::backup::paths::BackupPaths;
use crate::backup::warn;
use crate::error::BackupError;
use crate::quicksight::aws_cli::AwsCli;

#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub ok: bool,
    pub details: Vec<String>,
    pub issues: Vec<String>,
}

impl CommandReport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: true,
            details: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn detail(&mut self, text: impl Into<String>) {
        self.details.push(text.into());
    }

    pub fn issue(&mut self, text: impl Into<String>) {
        self.ok = false;
        self.issues.push(text.into());
    }
}

/// Paths, effective configuration and CLI credentials shared by the
/// commands that talk to the service.
#[derive(Debug, Clone)]
pub struct Session {
    pub paths: BackupPaths,
    pub config: BackupConfig,
    pub profile: Option<String>,
}

impl Session {
    pub fn load(
        paths: BackupPaths,
        profile: Option<String>,
        region: Option<String>,
    ) -> Result<Self> {
        let mut config = load_config(&paths)
            .map_err(|err| abort(&paths, "config", BackupError::InvalidConfig(format!("{err:#}"))))?;
        if let Some(region) = region.map(|r| r.trim().to_string()).filter(|r| !r.is_empty()) {
            config.service.region = region;
        }
        Ok(Self {
            paths,
            config,
            profile,
        })
    }

    pub fn aws_cli(&self) -> Result<AwsCli> {
        AwsCli::from_config(self.profile.as_deref(), &self.config.service).map_err(|err| {
            abort(
                &self.paths,
                "startup",
                BackupError::MissingAwsBinary(format!("{err:#}")),
            )
        })
    }
}

/// Record a run-ending error in the warn stream and audit log, and hand it
/// back for the caller to propagate.
pub fn abort(paths: &BackupPaths, phase: &str, err: BackupError) -> anyhow::Error {
    let message = err.to_string();
    warn::emit(warn::WarnEvent {
        code: err.code().as_str(),
        stage: phase,
        action: "abort",
        reason: "fatal",
        err: &message,
        ..Default::default()
    });
    audit::record(paths, phase, "aborted", &message);
    anyhow::Error::new(err)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_marks_report_not_ok() {
        let mut report = CommandReport::new("prune");
        report.detail("kept backup-X-2024-01-04");
        assert!(report.ok);

        report.issue("failed to delete backup-X-2024-01-01");
        assert!(!report.ok);
        assert_eq!(report.details.len(), 1);
        assert_eq!(report.issues.len(), 1);
    }

    #[test]
    fn abort_writes_audit_record_and_keeps_error_type() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let session = test_support::session_in(tmp.path());

        let err = abort(
            &session.paths,
            "backup",
            BackupError::Discovery("throttled".to_string()),
        );
        assert!(matches!(
            err.downcast_ref::<BackupError>(),
            Some(BackupError::Discovery(_))
        ));
        let audit_log = std::fs::read_to_string(session.paths.logs_dir.join("audit.log"))
            .expect("audit log");
        assert!(audit_log.contains("\"status\":\"aborted\""));
    }
}
