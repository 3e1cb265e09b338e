//! In-memory stand-in for the hosted service, with scripted failures.

use super::*;
use crate::error::ServiceError;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone)]
pub struct FakeTemplate {
    pub arn: String,
    pub pending_polls: usize,
    pub failed: bool,
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub identity: Option<CallerIdentity>,
    pub analyses: Vec<AnalysisSummary>,
    pub page_size: usize,
    pub details: BTreeMap<String, AnalysisDetail>,
    pub templates: BTreeMap<String, FakeTemplate>,
    /// Polls a freshly created template reports as in progress.
    pub provisioning_polls: usize,
    pub created_templates: Vec<CreateTemplateRequest>,
    pub created_analyses: BTreeMap<String, CreateAnalysisRequest>,
    pub folder_members: BTreeMap<String, Vec<FolderMember>>,
    pub deleted: Vec<(String, bool)>,
    pub folders: BTreeMap<String, Vec<ResourcePermission>>,
    pub groups: BTreeMap<String, Vec<GroupMember>>,
    pub fail_list_analyses: bool,
    pub fail_list_folder: bool,
    pub fail_describe_for: BTreeSet<String>,
    pub fail_template_for: BTreeSet<String>,
    pub fail_create_analysis_for: BTreeSet<String>,
    pub fail_membership_for: BTreeSet<String>,
    pub fail_delete_for: BTreeSet<String>,
    pub calls: Vec<String>,
}

#[derive(Debug, Default)]
pub struct FakeQuickSight {
    pub state: RefCell<FakeState>,
}

pub const ACCOUNT: &str = "111122223333";

fn paginate<T: Clone>(items: &[T], page_size: usize, token: Option<&str>) -> Page<T> {
    let size = page_size.max(1);
    let start = token.and_then(|t| t.parse::<usize>().ok()).unwrap_or(0);
    let end = (start + size).min(items.len());
    Page {
        items: items[start.min(end)..end].to_vec(),
        next_token: (end < items.len()).then(|| end.to_string()),
    }
}

impl FakeQuickSight {
    pub fn new() -> Self {
        let fake = Self::default();
        {
            let mut state = fake.state.borrow_mut();
            state.identity = Some(CallerIdentity {
                account: ACCOUNT.to_string(),
                arn: format!("arn:aws:iam::{ACCOUNT}:user/backup-bot"),
            });
            state.page_size = 2;
        }
        fake
    }

    pub fn with_source(&self, id: &str, name: &str, last_updated: DateTime<Utc>, datasets: &[&str]) {
        let mut state = self.state.borrow_mut();
        let arn = format!("arn:aws:quicksight:us-east-1:{ACCOUNT}:analysis/{id}");
        state.analyses.push(AnalysisSummary {
            analysis_id: id.to_string(),
            arn: arn.clone(),
            name: name.to_string(),
            status: ResourceStatus::UpdateSuccessful,
            last_updated,
        });
        state.details.insert(
            id.to_string(),
            AnalysisDetail {
                analysis_id: id.to_string(),
                arn,
                name: name.to_string(),
                dataset_arns: datasets.iter().map(|d| (*d).to_string()).collect(),
            },
        );
    }

    pub fn with_folder_members(&self, folder_id: &str, ids: &[&str]) {
        let members = ids
            .iter()
            .map(|id| FolderMember {
                member_id: (*id).to_string(),
                member_arn: format!("arn:aws:quicksight:us-east-1:{ACCOUNT}:analysis/{id}"),
            })
            .collect::<Vec<_>>();
        self.state
            .borrow_mut()
            .folder_members
            .entry(folder_id.to_string())
            .or_default()
            .extend(members);
    }

    pub fn calls_matching(&self, prefix: &str) -> usize {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    fn log(&self, call: String) {
        self.state.borrow_mut().calls.push(call);
    }
}

impl QuickSightApi for FakeQuickSight {
    fn caller_identity(&self) -> Result<CallerIdentity> {
        self.log("caller_identity".to_string());
        self.state
            .borrow()
            .identity
            .clone()
            .ok_or_else(|| ServiceError::AccessDenied("expired token".to_string()).into())
    }

    fn list_analyses_page(
        &self,
        _account_id: &str,
        next_token: Option<&str>,
    ) -> Result<Page<AnalysisSummary>> {
        self.log(format!("list_analyses {}", next_token.unwrap_or("-")));
        let state = self.state.borrow();
        if state.fail_list_analyses && next_token.is_some() {
            return Err(ServiceError::Throttled("rate exceeded".to_string()).into());
        }
        Ok(paginate(&state.analyses, state.page_size, next_token))
    }

    fn describe_analysis(&self, _account_id: &str, analysis_id: &str) -> Result<AnalysisDetail> {
        self.log(format!("describe_analysis {analysis_id}"));
        let state = self.state.borrow();
        if state.fail_describe_for.contains(analysis_id) {
            return Err(ServiceError::AccessDenied(analysis_id.to_string()).into());
        }
        state
            .details
            .get(analysis_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(analysis_id.to_string()).into())
    }

    fn describe_template(
        &self,
        _account_id: &str,
        template_id: &str,
    ) -> Result<Option<TemplateDescription>> {
        self.log(format!("describe_template {template_id}"));
        let mut state = self.state.borrow_mut();
        let Some(template) = state.templates.get_mut(template_id) else {
            return Ok(None);
        };
        let version_status = if template.pending_polls > 0 {
            template.pending_polls -= 1;
            ResourceStatus::CreationInProgress
        } else if template.failed {
            ResourceStatus::CreationFailed
        } else {
            ResourceStatus::CreationSuccessful
        };
        Ok(Some(TemplateDescription {
            template_id: template_id.to_string(),
            arn: template.arn.clone(),
            version_status,
        }))
    }

    fn create_template(&self, _account_id: &str, request: &CreateTemplateRequest) -> Result<String> {
        self.log(format!("create_template {}", request.template_id));
        let mut state = self.state.borrow_mut();
        if state.fail_template_for.contains(&request.template_id) {
            return Err(ServiceError::Failed {
                operation: "create-template".to_string(),
                message: "InvalidParameterValueException".to_string(),
            }
            .into());
        }
        if state.templates.contains_key(&request.template_id) {
            return Err(ServiceError::AlreadyExists(request.template_id.clone()).into());
        }
        let arn = format!(
            "arn:aws:quicksight:us-east-1:{ACCOUNT}:template/{}",
            request.template_id
        );
        let pending_polls = state.provisioning_polls;
        state.templates.insert(
            request.template_id.clone(),
            FakeTemplate {
                arn: arn.clone(),
                pending_polls,
                failed: false,
            },
        );
        state.created_templates.push(request.clone());
        Ok(arn)
    }

    fn create_analysis(&self, _account_id: &str, request: &CreateAnalysisRequest) -> Result<String> {
        self.log(format!("create_analysis {}", request.analysis_id));
        let mut state = self.state.borrow_mut();
        if state.fail_create_analysis_for.contains(&request.analysis_id) {
            return Err(ServiceError::Failed {
                operation: "create-analysis".to_string(),
                message: "InternalFailureException".to_string(),
            }
            .into());
        }
        if state.created_analyses.contains_key(&request.analysis_id) {
            return Err(ServiceError::AlreadyExists(request.analysis_id.clone()).into());
        }
        state
            .created_analyses
            .insert(request.analysis_id.clone(), request.clone());
        Ok(format!(
            "arn:aws:quicksight:us-east-1:{ACCOUNT}:analysis/{}",
            request.analysis_id
        ))
    }

    fn create_folder_membership(
        &self,
        _account_id: &str,
        folder_id: &str,
        member_id: &str,
    ) -> Result<()> {
        self.log(format!("create_folder_membership {folder_id} {member_id}"));
        let mut state = self.state.borrow_mut();
        if state.fail_membership_for.contains(member_id) {
            return Err(ServiceError::AccessDenied(member_id.to_string()).into());
        }
        if !state.created_analyses.contains_key(member_id) {
            return Err(ServiceError::NotFound(member_id.to_string()).into());
        }
        let members = state.folder_members.entry(folder_id.to_string()).or_default();
        if members.iter().any(|m| m.member_id == member_id) {
            return Err(ServiceError::AlreadyExists(member_id.to_string()).into());
        }
        members.push(FolderMember {
            member_id: member_id.to_string(),
            member_arn: format!("arn:aws:quicksight:us-east-1:{ACCOUNT}:analysis/{member_id}"),
        });
        Ok(())
    }

    fn list_folder_members_page(
        &self,
        _account_id: &str,
        folder_id: &str,
        next_token: Option<&str>,
    ) -> Result<Page<FolderMember>> {
        self.log(format!(
            "list_folder_members {folder_id} {}",
            next_token.unwrap_or("-")
        ));
        let state = self.state.borrow();
        if state.fail_list_folder && next_token.is_some() {
            return Err(ServiceError::Throttled("rate exceeded".to_string()).into());
        }
        let Some(members) = state.folder_members.get(folder_id) else {
            return Err(ServiceError::NotFound(folder_id.to_string()).into());
        };
        Ok(paginate(members, state.page_size, next_token))
    }

    fn delete_analysis(
        &self,
        _account_id: &str,
        analysis_id: &str,
        force_without_recovery: bool,
    ) -> Result<()> {
        self.log(format!("delete_analysis {analysis_id}"));
        let mut state = self.state.borrow_mut();
        if state.fail_delete_for.contains(analysis_id) {
            return Err(ServiceError::AccessDenied(analysis_id.to_string()).into());
        }
        for members in state.folder_members.values_mut() {
            members.retain(|m| m.member_id != analysis_id);
        }
        state
            .deleted
            .push((analysis_id.to_string(), force_without_recovery));
        Ok(())
    }

    fn create_folder(
        &self,
        _account_id: &str,
        folder_id: &str,
        _name: &str,
        permissions: &[ResourcePermission],
    ) -> Result<String> {
        self.log(format!("create_folder {folder_id}"));
        let mut state = self.state.borrow_mut();
        if state.folders.contains_key(folder_id) {
            return Err(ServiceError::AlreadyExists(folder_id.to_string()).into());
        }
        state
            .folders
            .insert(folder_id.to_string(), permissions.to_vec());
        Ok(format!("arn:aws:quicksight:us-east-1:{ACCOUNT}:folder/{folder_id}"))
    }

    fn list_group_members_page(
        &self,
        _account_id: &str,
        _namespace: &str,
        group_name: &str,
        next_token: Option<&str>,
    ) -> Result<Page<GroupMember>> {
        self.log(format!("list_group_members {group_name}"));
        let state = self.state.borrow();
        let Some(members) = state.groups.get(group_name) else {
            return Err(ServiceError::NotFound(group_name.to_string()).into());
        };
        Ok(paginate(members, state.page_size, next_token))
    }

    fn grant_folder_permissions(
        &self,
        _account_id: &str,
        folder_id: &str,
        permissions: &[ResourcePermission],
    ) -> Result<()> {
        self.log(format!("grant_folder_permissions {folder_id}"));
        let mut state = self.state.borrow_mut();
        let Some(existing) = state.folders.get_mut(folder_id) else {
            return Err(ServiceError::NotFound(folder_id.to_string()).into());
        };
        existing.extend(permissions.iter().cloned());
        Ok(())
    }
}
