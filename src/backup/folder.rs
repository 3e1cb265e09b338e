use crate::backup::context::RunContext;
use crate::error::{BackupError, ReplicationStage, ServiceError};
use crate::quicksight::{GroupMember, QuickSightApi, ResourcePermission, collect_pages};
use anyhow::{Context, Result};

pub const FOLDER_ACTIONS: [&str; 8] = [
    "quicksight:CreateFolder",
    "quicksight:DescribeFolder",
    "quicksight:UpdateFolder",
    "quicksight:DeleteFolder",
    "quicksight:CreateFolderMembership",
    "quicksight:DeleteFolderMembership",
    "quicksight:DescribeFolderPermissions",
    "quicksight:UpdateFolderPermissions",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filing {
    Filed,
    /// The folder already listed the backup.
    AlreadyFiled,
}

/// File an existing backup analysis into the backup folder. A membership
/// conflict means an earlier run already filed it.
pub fn file_backup(
    api: &dyn QuickSightApi,
    ctx: &RunContext,
    source_id: &str,
    backup_id: &str,
    folder_id: &str,
) -> Result<Filing, BackupError> {
    match api.create_folder_membership(&ctx.account_id, folder_id, backup_id) {
        Ok(()) => Ok(Filing::Filed),
        Err(err) if ServiceError::is_already_exists(&err) => Ok(Filing::AlreadyFiled),
        Err(err) => Err(BackupError::Replication {
            source_id: source_id.to_string(),
            stage: ReplicationStage::Folder,
            message: format!("backup {backup_id} created but not filed in {folder_id}: {err:#}"),
        }),
    }
}

/// Folder ids are the folder name, lowercased, with spaces replaced by `-`.
pub fn folder_id_for_name(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "-")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderCreation {
    Created { folder_id: String, arn: String },
    AlreadyExists { folder_id: String },
}

/// Create the shared backup folder, owned by the caller.
pub fn create_folder(
    api: &dyn QuickSightApi,
    ctx: &RunContext,
    folder_name: &str,
) -> Result<FolderCreation> {
    let folder_id = folder_id_for_name(folder_name);
    let permissions = [ResourcePermission::new(ctx.caller_arn.clone(), &FOLDER_ACTIONS)];
    match api.create_folder(&ctx.account_id, &folder_id, folder_name, &permissions) {
        Ok(arn) => Ok(FolderCreation::Created { folder_id, arn }),
        Err(err) if ServiceError::is_already_exists(&err) => {
            Ok(FolderCreation::AlreadyExists { folder_id })
        }
        Err(err) => Err(err).with_context(|| format!("failed to create folder {folder_id}")),
    }
}

/// Grant every member of `group_name` the folder actions. Returns the members
/// that were granted; an empty group issues no update.
pub fn grant_group_access(
    api: &dyn QuickSightApi,
    ctx: &RunContext,
    folder_id: &str,
    group_name: &str,
) -> Result<Vec<GroupMember>> {
    let members = collect_pages(|token| {
        api.list_group_members_page(&ctx.account_id, &ctx.namespace, group_name, token)
    })
    .with_context(|| format!("failed to list members of group {group_name}"))?;

    if members.is_empty() {
        return Ok(members);
    }

    let permissions = members
        .iter()
        .map(|m| ResourcePermission::new(m.arn.clone(), &FOLDER_ACTIONS))
        .collect::<Vec<_>>();
    api.grant_folder_permissions(&ctx.account_id, folder_id, &permissions)
        .with_context(|| format!("failed to grant {group_name} access to folder {folder_id}"))?;
    Ok(members)
}
