use anyhow::Result;
use chrono::NaiveDate;

use crate::backup::audit;
use crate::backup::context::resolve_context;
use crate::backup::naming::format_date;
use crate::backup::pipeline::{BackupOptions, BackupOutcome, run_backup};
use crate::backup::template::ReadinessPolicy;
use crate::backup::warn;
use crate::commands::{CommandReport, Session, abort};
use crate::error::BackupError;
use crate::quicksight::QuickSightApi;

#[derive(Debug, Clone)]
pub struct BackupArgs {
    pub folder_id: String,
    pub date: Option<NaiveDate>,
    pub dry_run: bool,
}

fn report_failure(session: &Session, folder_id: &str, err: &BackupError, report: &mut CommandReport) {
    let (item, stage) = match err {
        BackupError::Replication {
            source_id, stage, ..
        } => (source_id.as_str(), stage.as_str()),
        _ => ("na", "backup"),
    };
    let message = err.to_string();
    warn::emit(warn::WarnEvent {
        code: err.code().as_str(),
        stage,
        action: "backup",
        item,
        folder: folder_id,
        retry: "next-run",
        reason: "item-failed",
        err: &message,
    });
    audit::record(&session.paths, "backup", "failed", &message);
    report.issue(format!("failed {item}: {message}"));
}

pub fn run(session: &Session, api: &dyn QuickSightApi, args: &BackupArgs) -> Result<CommandReport> {
    let mut report = CommandReport::new("backup");
    let ctx = resolve_context(api, &session.config, args.date)
        .map_err(|err| abort(&session.paths, "backup", err))?;

    report.detail(format!("account={}", ctx.account_id));
    report.detail(format!("backup_date={}", format_date(ctx.backup_date)));
    report.detail(format!("timezone={}", ctx.timezone));
    report.detail(format!("folder_id={}", args.folder_id));
    if args.dry_run {
        report.detail("dry_run=true");
    }

    let summary = run_backup(
        api,
        &ctx,
        BackupOptions {
            folder_id: &args.folder_id,
            readiness: ReadinessPolicy::from_config(&session.config.backup),
            dry_run: args.dry_run,
        },
    )
    .map_err(|err| abort(&session.paths, "backup", err))?;

    report.detail(format!(
        "listed={} changed={} excluded_backups={}",
        summary.discovery.listed,
        summary.discovery.candidates.len(),
        summary.discovery.excluded_backups.len()
    ));
    for id in &summary.discovery.excluded_backups {
        report.detail(format!("excluded {id}: already a backup"));
    }

    for outcome in &summary.outcomes {
        match outcome {
            BackupOutcome::Created {
                source_id,
                backup_id,
                template_id,
                template_reused,
            } => {
                let line = format!(
                    "created {backup_id} from {source_id} template={template_id}{}",
                    if *template_reused { " (reused)" } else { "" }
                );
                audit::record(&session.paths, "backup", "created", &line);
                report.detail(line);
            }
            BackupOutcome::Planned {
                source_id,
                backup_id,
                template_id,
                template_exists,
            } => {
                report.detail(format!(
                    "planned {backup_id} from {source_id} template={template_id} template_exists={template_exists}"
                ));
            }
            BackupOutcome::Refiled {
                source_id,
                backup_id,
            } => {
                let line = format!(
                    "filed {backup_id} from {source_id}: existing backup was not in the folder"
                );
                audit::record(&session.paths, "backup", "filed", &line);
                report.detail(line);
            }
            BackupOutcome::Skipped { source_id, reason } => {
                let line = format!("skipped {source_id}: {reason}");
                audit::record(&session.paths, "backup", "skipped", &line);
                report.detail(line);
            }
            BackupOutcome::Failed(err) => {
                report_failure(session, &args.folder_id, err, &mut report);
            }
        }
    }

    report.detail(format!(
        "summary created={} failed={} total={}",
        summary.created(),
        summary.failed(),
        summary.outcomes.len()
    ));
    Ok(report)
}
