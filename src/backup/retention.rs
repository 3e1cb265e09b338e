use crate::backup::context::RunContext;
use crate::backup::naming::BackupName;
use crate::error::BackupError;
use crate::quicksight::{FolderMember, QuickSightApi, collect_pages};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupEntry {
    pub backup_id: String,
    pub name: BackupName,
}

/// Survivor and deletion sets for one folder listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionPlan {
    pub keep: Vec<BackupEntry>,
    pub delete: Vec<BackupEntry>,
    /// Analysis members whose id does not follow the backup naming.
    pub malformed: Vec<String>,
    /// Members that are not analyses at all.
    pub ignored: Vec<String>,
}

impl RetentionPlan {
    pub fn is_noop(&self) -> bool {
        self.delete.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PruneOptions {
    pub keep: usize,
    pub force_delete_without_recovery: bool,
    pub dry_run: bool,
}

#[derive(Debug, Default)]
pub struct PruneOutcome {
    pub plan: RetentionPlan,
    pub deleted: Vec<String>,
    pub failures: Vec<BackupError>,
}

/// Newest first; equal dates fall back to the id, descending.
fn newest_first(a: &BackupEntry, b: &BackupEntry) -> Ordering {
    b.name
        .backup_date
        .cmp(&a.name.backup_date)
        .then_with(|| b.backup_id.cmp(&a.backup_id))
}

/// Keep the newest `keep` generations of every logical name and schedule the
/// rest for deletion. Members outside the naming grammar are never scheduled.
pub fn plan_retention(members: &[FolderMember], keep: usize) -> RetentionPlan {
    let mut plan = RetentionPlan::default();
    let mut seen = BTreeSet::new();
    let mut groups: BTreeMap<String, Vec<BackupEntry>> = BTreeMap::new();

    for member in members {
        if !seen.insert(member.member_id.as_str()) {
            continue;
        }
        if !member.is_analysis() {
            plan.ignored.push(member.member_id.clone());
            continue;
        }
        let Some(name) = BackupName::parse(&member.member_id) else {
            plan.malformed.push(member.member_id.clone());
            continue;
        };
        groups
            .entry(name.logical_name.clone())
            .or_default()
            .push(BackupEntry {
                backup_id: member.member_id.clone(),
                name,
            });
    }

    for (_, mut entries) in groups {
        entries.sort_by(newest_first);
        let surplus = entries.split_off(keep.min(entries.len()));
        plan.keep.extend(entries);
        plan.delete.extend(surplus);
    }
    plan
}

/// List the folder, plan retention and delete the surplus one by one.
///
/// A listing failure aborts before anything is deleted. A failed deletion is
/// recorded and the remaining deletions still run.
pub fn prune(
    api: &dyn QuickSightApi,
    ctx: &RunContext,
    folder_id: &str,
    opts: PruneOptions,
) -> Result<PruneOutcome, BackupError> {
    if opts.keep == 0 {
        return Err(BackupError::InvalidConfig(
            "retention keep must be >= 1".to_string(),
        ));
    }

    let members = collect_pages(|token| {
        api.list_folder_members_page(&ctx.account_id, folder_id, token)
    })
    .map_err(|err| BackupError::FolderListing {
        folder_id: folder_id.to_string(),
        message: format!("{err:#}"),
    })?;

    let plan = plan_retention(&members, opts.keep);
    let mut out = PruneOutcome::default();
    if !opts.dry_run {
        for entry in &plan.delete {
            match api.delete_analysis(
                &ctx.account_id,
                &entry.backup_id,
                opts.force_delete_without_recovery,
            ) {
                Ok(()) => out.deleted.push(entry.backup_id.clone()),
                Err(err) => out.failures.push(BackupError::Deletion {
                    backup_id: entry.backup_id.clone(),
                    message: format!("{err:#}"),
                }),
            }
        }
    }
    out.plan = plan;
    Ok(out)
}
