use crate::backup::context::RunContext;
use crate::backup::discovery::{DiscoveryOutcome, discover_changed};
use crate::backup::folder::{Filing, file_backup};
use crate::backup::naming::{self, BackupName};
use crate::backup::replicate::{Replicated, replicate};
use crate::backup::template::{ReadinessPolicy, materialize, wait_until_ready};
use crate::error::{BackupError, ReplicationStage};
use crate::quicksight::{AnalysisSummary, QuickSightApi};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    EmptyLogicalName { name: String },
    NoDatasets,
    AlreadyBackedUp { backup_id: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyLogicalName { name } => {
                write!(f, "name {name:?} has no alphanumeric characters")
            }
            Self::NoDatasets => f.write_str("analysis references no datasets"),
            Self::AlreadyBackedUp { backup_id } => write!(f, "{backup_id} already exists"),
        }
    }
}

#[derive(Debug)]
pub enum BackupOutcome {
    Created {
        source_id: String,
        backup_id: String,
        template_id: String,
        template_reused: bool,
    },
    /// Dry run: what would have been created.
    Planned {
        source_id: String,
        backup_id: String,
        template_id: String,
        template_exists: bool,
    },
    /// The backup already existed but was missing from the folder.
    Refiled {
        source_id: String,
        backup_id: String,
    },
    Skipped {
        source_id: String,
        reason: SkipReason,
    },
    Failed(BackupError),
}

#[derive(Debug, Default)]
pub struct BackupRunSummary {
    pub discovery: DiscoveryOutcome,
    pub outcomes: Vec<BackupOutcome>,
}

impl BackupRunSummary {
    pub fn created(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, BackupOutcome::Created { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, BackupOutcome::Failed(_)))
            .count()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BackupOptions<'a> {
    pub folder_id: &'a str,
    pub readiness: ReadinessPolicy,
    pub dry_run: bool,
}

/// Back up every analysis changed on the run date.
///
/// Discovery failure is the only fatal error. Each candidate then runs
/// describe, materialize, wait, replicate and file on its own; its failure is
/// recorded as an outcome and the next candidate proceeds.
pub fn run_backup(
    api: &dyn QuickSightApi,
    ctx: &RunContext,
    opts: BackupOptions<'_>,
) -> Result<BackupRunSummary, BackupError> {
    let discovery = discover_changed(api, ctx)?;
    let outcomes = discovery
        .candidates
        .iter()
        .map(|candidate| {
            back_up_one(api, ctx, candidate, opts).unwrap_or_else(BackupOutcome::Failed)
        })
        .collect();
    Ok(BackupRunSummary {
        discovery,
        outcomes,
    })
}

fn back_up_one(
    api: &dyn QuickSightApi,
    ctx: &RunContext,
    candidate: &AnalysisSummary,
    opts: BackupOptions<'_>,
) -> Result<BackupOutcome, BackupError> {
    let source_id = candidate.analysis_id.clone();
    let logical_name = naming::normalize(&candidate.name);
    if !logical_name.chars().any(|ch| ch.is_ascii_alphanumeric()) {
        return Ok(BackupOutcome::Skipped {
            source_id,
            reason: SkipReason::EmptyLogicalName {
                name: candidate.name.clone(),
            },
        });
    }

    let detail = api
        .describe_analysis(&ctx.account_id, &source_id)
        .map_err(|err| BackupError::Replication {
            source_id: source_id.clone(),
            stage: ReplicationStage::Describe,
            message: format!("{err:#}"),
        })?;
    if detail.dataset_arns.is_empty() {
        return Ok(BackupOutcome::Skipped {
            source_id,
            reason: SkipReason::NoDatasets,
        });
    }

    if opts.dry_run {
        let template_id = naming::template_id(&logical_name, ctx.backup_date);
        let template_exists = api
            .describe_template(&ctx.account_id, &template_id)
            .map_err(|err| BackupError::Replication {
                source_id: source_id.clone(),
                stage: ReplicationStage::Template,
                message: format!("{err:#}"),
            })?
            .is_some();
        return Ok(BackupOutcome::Planned {
            backup_id: BackupName::new(&logical_name, ctx.backup_date).backup_id(),
            source_id,
            template_id,
            template_exists,
        });
    }

    let template = materialize(api, ctx, &logical_name, &detail)?;
    wait_until_ready(api, ctx, &source_id, &template.template_id, opts.readiness)?;

    match replicate(api, ctx, &source_id, &logical_name, &template)? {
        Replicated::AlreadyExists { backup_id } => {
            match file_backup(api, ctx, &source_id, &backup_id, opts.folder_id)? {
                Filing::Filed => Ok(BackupOutcome::Refiled {
                    source_id,
                    backup_id,
                }),
                Filing::AlreadyFiled => Ok(BackupOutcome::Skipped {
                    source_id,
                    reason: SkipReason::AlreadyBackedUp { backup_id },
                }),
            }
        }
        Replicated::Created { backup_id, .. } => {
            file_backup(api, ctx, &source_id, &backup_id, opts.folder_id)?;
            Ok(BackupOutcome::Created {
                source_id,
                backup_id,
                template_id: template.template_id,
                template_reused: template.reused,
            })
        }
    }
}
