use crate::backup::config::BackupRunConfig;
use crate::backup::context::RunContext;
use crate::backup::naming;
use crate::backup::util::{PollOutcome, poll_until};
use crate::error::{BackupError, ReplicationStage, ServiceError};
use crate::quicksight::{
    AnalysisDetail, CreateTemplateRequest, DataSetReference, QuickSightApi, ResourcePermission,
    TemplateDescription,
};
use chrono::NaiveDate;
use std::time::Duration;

pub const TEMPLATE_ADMIN_ACTIONS: [&str; 5] = [
    "quicksight:DescribeTemplate",
    "quicksight:UpdateTemplatePermissions",
    "quicksight:DeleteTemplate",
    "quicksight:DescribeTemplatePermissions",
    "quicksight:UpdateTemplate",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedTemplate {
    pub template_id: String,
    pub template_arn: String,
    pub dataset_references: Vec<DataSetReference>,
    pub reused: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolicy {
    pub timeout: Duration,
    pub interval: Duration,
}

impl ReadinessPolicy {
    pub fn from_config(cfg: &BackupRunConfig) -> Self {
        Self {
            timeout: Duration::from_secs(cfg.template_ready_timeout_secs),
            interval: Duration::from_secs(cfg.template_poll_interval_secs),
        }
    }
}

/// Pair each dataset, in source order, with its dated placeholder slot.
pub fn placeholder_map(
    logical_name: &str,
    dataset_arns: &[String],
    date: NaiveDate,
) -> Vec<DataSetReference> {
    dataset_arns
        .iter()
        .enumerate()
        .map(|(index, arn)| DataSetReference {
            placeholder: naming::dataset_placeholder(logical_name, index, date),
            dataset_arn: arn.clone(),
        })
        .collect()
}

fn template_error(source_id: &str, message: String) -> BackupError {
    BackupError::Replication {
        source_id: source_id.to_string(),
        stage: ReplicationStage::Template,
        message,
    }
}

/// Return the template for `(logical_name, run date)`, creating it only if
/// no template with that id exists yet.
///
/// The placeholder map is rebuilt from the source's current datasets on the
/// reuse path too, so replication always gets a complete map.
pub fn materialize(
    api: &dyn QuickSightApi,
    ctx: &RunContext,
    logical_name: &str,
    source: &AnalysisDetail,
) -> Result<MaterializedTemplate, BackupError> {
    let template_id = naming::template_id(logical_name, ctx.backup_date);
    let dataset_references = placeholder_map(logical_name, &source.dataset_arns, ctx.backup_date);

    let existing = api
        .describe_template(&ctx.account_id, &template_id)
        .map_err(|err| template_error(&source.analysis_id, format!("{err:#}")))?;
    if let Some(existing) = existing {
        return Ok(MaterializedTemplate {
            template_id,
            template_arn: existing.arn,
            dataset_references,
            reused: true,
        });
    }

    let date = naming::format_date(ctx.backup_date);
    let request = CreateTemplateRequest {
        template_id: template_id.clone(),
        name: naming::template_display_name(logical_name, ctx.backup_date),
        source_analysis_arn: source.arn.clone(),
        dataset_references: dataset_references.clone(),
        permissions: vec![ResourcePermission::new(
            ctx.admin_principal_arn.clone(),
            &TEMPLATE_ADMIN_ACTIONS,
        )],
        version_description: format!("Template for {logical_name} created on {date}"),
    };

    match api.create_template(&ctx.account_id, &request) {
        Ok(template_arn) => Ok(MaterializedTemplate {
            template_id,
            template_arn,
            dataset_references,
            reused: false,
        }),
        // Lost a race with a concurrent create after the probe: reuse it.
        Err(err) if ServiceError::is_already_exists(&err) => {
            let existing = api
                .describe_template(&ctx.account_id, &template_id)
                .map_err(|err| template_error(&source.analysis_id, format!("{err:#}")))?
                .ok_or_else(|| {
                    template_error(
                        &source.analysis_id,
                        format!("template {template_id} reported as existing but not found"),
                    )
                })?;
            Ok(MaterializedTemplate {
                template_id,
                template_arn: existing.arn,
                dataset_references,
                reused: true,
            })
        }
        Err(err) => Err(template_error(&source.analysis_id, format!("{err:#}"))),
    }
}

/// Block until the template version has finished provisioning.
///
/// A template that is not visible yet counts as still provisioning.
pub fn wait_until_ready(
    api: &dyn QuickSightApi,
    ctx: &RunContext,
    source_id: &str,
    template_id: &str,
    policy: ReadinessPolicy,
) -> Result<TemplateDescription, BackupError> {
    let not_ready = |message: String| BackupError::Replication {
        source_id: source_id.to_string(),
        stage: ReplicationStage::TemplateReady,
        message,
    };

    let outcome = poll_until(policy.timeout, policy.interval, || {
        let Some(described) = api.describe_template(&ctx.account_id, template_id)? else {
            return Ok(None);
        };
        if described.version_status.is_failed() {
            anyhow::bail!(
                "template {template_id} provisioning ended in {:?}",
                described.version_status
            );
        }
        Ok(described.version_status.is_ready().then_some(described))
    })
    .map_err(|err| not_ready(format!("{err:#}")))?;

    match outcome {
        PollOutcome::Ready(described) => Ok(described),
        PollOutcome::TimedOut => Err(not_ready(format!(
            "template {template_id} not ready after {}s",
            policy.timeout.as_secs()
        ))),
    }
}
