use anyhow::Result;

use crate::backup::audit;
use crate::backup::context::resolve_context;
use crate::backup::retention::{PruneOptions, prune};
use crate::backup::warn;
use crate::commands::{CommandReport, Session, abort};
use crate::error::BackupError;
use crate::quicksight::QuickSightApi;

#[derive(Debug, Clone)]
pub struct PruneArgs {
    pub folder_id: String,
    /// Falls back to the configured retention.
    pub keep: Option<usize>,
    pub dry_run: bool,
}

pub fn run(session: &Session, api: &dyn QuickSightApi, args: &PruneArgs) -> Result<CommandReport> {
    let mut report = CommandReport::new("prune");
    let keep = args.keep.unwrap_or(session.config.retention.keep);
    let force = session.config.retention.force_delete_without_recovery;

    let ctx = resolve_context(api, &session.config, None)
        .map_err(|err| abort(&session.paths, "prune", err))?;
    report.detail(format!("account={}", ctx.account_id));
    report.detail(format!("folder_id={}", args.folder_id));
    report.detail(format!("keep={keep}"));
    report.detail(format!("force_delete_without_recovery={force}"));
    if args.dry_run {
        report.detail("dry_run=true");
    }

    let outcome = prune(
        api,
        &ctx,
        &args.folder_id,
        PruneOptions {
            keep,
            force_delete_without_recovery: force,
            dry_run: args.dry_run,
        },
    )
    .map_err(|err| abort(&session.paths, "prune", err))?;

    for entry in &outcome.plan.keep {
        report.detail(format!("kept {}", entry.backup_id));
    }
    for id in &outcome.plan.ignored {
        report.detail(format!("ignored {id}: not an analysis"));
    }
    for id in &outcome.plan.malformed {
        let err = BackupError::MalformedIdentifier(id.clone());
        warn::emit(warn::WarnEvent {
            code: err.code().as_str(),
            stage: "parse",
            action: "skip",
            item: id,
            folder: &args.folder_id,
            retry: "none",
            reason: "unparseable-member",
            err: &err.to_string(),
        });
        report.detail(format!("malformed {id}: left in place"));
    }

    if outcome.plan.is_noop() {
        report.detail("nothing to delete");
    } else if args.dry_run {
        for entry in &outcome.plan.delete {
            report.detail(format!("would delete {}", entry.backup_id));
        }
    }
    for id in &outcome.deleted {
        let line = format!("deleted {id}");
        audit::record(&session.paths, "prune", "deleted", &line);
        report.detail(line);
    }
    for err in &outcome.failures {
        let message = err.to_string();
        let item = match err {
            BackupError::Deletion { backup_id, .. } => backup_id.as_str(),
            _ => "na",
        };
        warn::emit(warn::WarnEvent {
            code: err.code().as_str(),
            stage: "delete",
            action: "delete",
            item,
            folder: &args.folder_id,
            retry: "next-run",
            reason: "delete-failed",
            err: &message,
        });
        audit::record(&session.paths, "prune", "failed", &message);
        report.issue(message);
    }

    report.detail(format!(
        "summary kept={} deleted={} failed={} malformed={}",
        outcome.plan.keep.len(),
        outcome.deleted.len(),
        outcome.failures.len(),
        outcome.plan.malformed.len()
    ));
    Ok(report)
}
