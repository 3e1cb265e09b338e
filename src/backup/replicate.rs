use crate::backup::context::RunContext;
use crate::backup::naming::BackupName;
use crate::backup::template::MaterializedTemplate;
use crate::error::{BackupError, ReplicationStage, ServiceError};
use crate::quicksight::{CreateAnalysisRequest, QuickSightApi, ResourcePermission};

/// Everything the admin principal needs to manage a backup independently of
/// the credentials that created it.
pub const ANALYSIS_ADMIN_ACTIONS: [&str; 7] = [
    "quicksight:RestoreAnalysis",
    "quicksight:DeleteAnalysis",
    "quicksight:QueryAnalysis",
    "quicksight:DescribeAnalysis",
    "quicksight:UpdateAnalysisPermissions",
    "quicksight:DescribeAnalysisPermissions",
    "quicksight:UpdateAnalysis",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Replicated {
    Created { backup_id: String, arn: String },
    /// A backup with this id was already there (same-day rerun).
    AlreadyExists { backup_id: String },
}

/// Create the dated backup analysis from `template`.
///
/// Not idempotent: a second call for the same name and date conflicts, which
/// is reported as [`Replicated::AlreadyExists`].
pub fn replicate(
    api: &dyn QuickSightApi,
    ctx: &RunContext,
    source_id: &str,
    logical_name: &str,
    template: &MaterializedTemplate,
) -> Result<Replicated, BackupError> {
    let backup_id = BackupName::new(logical_name, ctx.backup_date).backup_id();
    let request = CreateAnalysisRequest {
        analysis_id: backup_id.clone(),
        name: backup_id.clone(),
        template_arn: template.template_arn.clone(),
        dataset_references: template.dataset_references.clone(),
        permissions: vec![ResourcePermission::new(
            ctx.admin_principal_arn.clone(),
            &ANALYSIS_ADMIN_ACTIONS,
        )],
    };

    match api.create_analysis(&ctx.account_id, &request) {
        Ok(arn) => Ok(Replicated::Created { backup_id, arn }),
        Err(err) if ServiceError::is_already_exists(&err) => {
            Ok(Replicated::AlreadyExists { backup_id })
        }
        Err(err) => Err(BackupError::Replication {
            source_id: source_id.to_string(),
            stage: ReplicationStage::Analysis,
            message: format!("{err:#}"),
        }),
    }
}
