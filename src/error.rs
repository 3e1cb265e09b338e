use std::fmt;
use thiserror::Error;

/// Failures the backup and prune runs distinguish between.
///
/// `AuthResolution`, `Discovery` and `FolderListing` abort a run; the
/// per-item variants are recorded in the run summary and processing moves on.
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("could not resolve caller identity: {0}")]
    AuthResolution(String),
    #[error("analysis listing failed: {0}")]
    Discovery(String),
    #[error("folder listing failed for {folder_id}: {message}")]
    FolderListing { folder_id: String, message: String },
    #[error("{stage} failed for analysis {source_id}: {message}")]
    Replication {
        source_id: String,
        stage: ReplicationStage,
        message: String,
    },
    #[error("folder member `{0}` does not match the backup naming convention")]
    MalformedIdentifier(String),
    #[error("failed to delete backup {backup_id}: {message}")]
    Deletion { backup_id: String, message: String },
    #[error("config invalid: {0}")]
    InvalidConfig(String),
    #[error("aws binary unavailable: {0}")]
    MissingAwsBinary(String),
}

impl BackupError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::AuthResolution(_) => ErrorCode::E001AuthResolution,
            Self::Discovery(_) | Self::FolderListing { .. } => ErrorCode::E002Discovery,
            Self::Replication { .. } => ErrorCode::E003Replication,
            Self::MalformedIdentifier(_) => ErrorCode::E004MalformedId,
            Self::Deletion { .. } => ErrorCode::E005Deletion,
            Self::InvalidConfig(_) => ErrorCode::E006ConfigInvalid,
            Self::MissingAwsBinary(_) => ErrorCode::E007AwsMissing,
        }
    }
}

/// Step of a single backup sequence that produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicationStage {
    Describe,
    Template,
    TemplateReady,
    Analysis,
    Folder,
}

impl ReplicationStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Describe => "describe",
            Self::Template => "template",
            Self::TemplateReady => "template-ready",
            Self::Analysis => "analysis",
            Self::Folder => "folder",
        }
    }
}

impl fmt::Display for ReplicationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error surfaced by the hosted service, classified from its error code.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("resource not found: {0}")]
    NotFound(String),
    #[error("resource already exists: {0}")]
    AlreadyExists(String),
    #[error("request throttled: {0}")]
    Throttled(String),
    #[error("access denied: {0}")]
    AccessDenied(String),
    #[error("{operation} failed: {message}")]
    Failed { operation: String, message: String },
}

impl ServiceError {
    pub fn is_not_found(err: &anyhow::Error) -> bool {
        matches!(err.downcast_ref::<ServiceError>(), Some(Self::NotFound(_)))
    }

    pub fn is_already_exists(err: &anyhow::Error) -> bool {
        matches!(
            err.downcast_ref::<ServiceError>(),
            Some(Self::AlreadyExists(_))
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    E001AuthResolution,
    E002Discovery,
    E003Replication,
    E004MalformedId,
    E005Deletion,
    E006ConfigInvalid,
    E007AwsMissing,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::E001AuthResolution => "E001_AUTH_RESOLUTION",
            Self::E002Discovery => "E002_DISCOVERY",
            Self::E003Replication => "E003_REPLICATION",
            Self::E004MalformedId => "E004_MALFORMED_ID",
            Self::E005Deletion => "E005_DELETION",
            Self::E006ConfigInvalid => "E006_CONFIG_INVALID",
            Self::E007AwsMissing => "E007_AWS_MISSING",
        }
    }
}
