use anyhow::Result;

use crate::backup::audit;
use crate::backup::context::resolve_context;
use crate::backup::folder::{FolderCreation, create_folder, grant_group_access};
use crate::commands::{CommandReport, Session, abort};
use crate::quicksight::QuickSightApi;

#[derive(Debug, Clone)]
pub struct FolderInitArgs {
    pub folder_name: String,
    pub group_name: String,
}

pub fn run(
    session: &Session,
    api: &dyn QuickSightApi,
    args: &FolderInitArgs,
) -> Result<CommandReport> {
    let mut report = CommandReport::new("folder-init");
    let ctx = resolve_context(api, &session.config, None)
        .map_err(|err| abort(&session.paths, "folder-init", err))?;
    report.detail(format!("account={}", ctx.account_id));
    report.detail(format!("namespace={}", ctx.namespace));

    let folder_id = match create_folder(api, &ctx, &args.folder_name) {
        Ok(FolderCreation::Created { folder_id, arn }) => {
            let line = format!("created folder {folder_id} arn={arn}");
            audit::record(&session.paths, "folder-init", "created", &line);
            report.detail(line);
            folder_id
        }
        Ok(FolderCreation::AlreadyExists { folder_id }) => {
            report.detail(format!("folder {folder_id} already exists"));
            folder_id
        }
        Err(err) => {
            report.issue(format!("{err:#}"));
            return Ok(report);
        }
    };

    match grant_group_access(api, &ctx, &folder_id, &args.group_name) {
        Ok(granted) if granted.is_empty() => {
            report.detail(format!(
                "group {} has no members; no permissions granted",
                args.group_name
            ));
        }
        Ok(granted) => {
            for member in &granted {
                report.detail(format!("granted {} arn={}", member.member_name, member.arn));
            }
            audit::record(
                &session.paths,
                "folder-init",
                "granted",
                &format!(
                    "granted {} member(s) of {} on {folder_id}",
                    granted.len(),
                    args.group_name
                ),
            );
        }
        Err(err) => report.issue(format!("{err:#}")),
    }
    Ok(report)
}
