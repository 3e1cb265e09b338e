use crate::backup::context::RunContext;
use crate::backup::naming::BackupName;
use crate::error::BackupError;
use crate::quicksight::{AnalysisSummary, QuickSightApi, ResourceStatus, collect_pages};

#[derive(Debug, Clone, Default)]
pub struct DiscoveryOutcome {
    /// Analyses changed on the backup date; order is not meaningful.
    pub candidates: Vec<AnalysisSummary>,
    pub listed: usize,
    /// Changed analyses that are themselves backups.
    pub excluded_backups: Vec<String>,
}

fn changed_on_backup_date(summary: &AnalysisSummary, ctx: &RunContext) -> bool {
    summary.status != ResourceStatus::Deleted
        && summary.last_updated.with_timezone(&ctx.timezone).date_naive() == ctx.backup_date
}

/// List every analysis in the account and keep the ones changed on the run
/// date. The listing is drained completely before filtering; a failure on
/// any page is a `Discovery` error, never a shorter candidate list.
pub fn discover_changed(
    api: &dyn QuickSightApi,
    ctx: &RunContext,
) -> Result<DiscoveryOutcome, BackupError> {
    let listed = collect_pages(|token| api.list_analyses_page(&ctx.account_id, token))
        .map_err(|err| BackupError::Discovery(format!("{err:#}")))?;

    let mut out = DiscoveryOutcome {
        listed: listed.len(),
        ..Default::default()
    };
    for summary in listed {
        if !changed_on_backup_date(&summary, ctx) {
            continue;
        }
        if BackupName::parse(&summary.analysis_id).is_some() {
            out.excluded_backups.push(summary.analysis_id);
            continue;
        }
        out.candidates.push(summary);
    }
    Ok(out)
}
