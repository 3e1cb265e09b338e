pub mod aws_cli;
#[cfg(test)]
pub mod fake;

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// Upper bound on pages drained from one listing; a guard against a service
/// that keeps handing out fresh cursors.
const MAX_PAGES: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CallerIdentity {
    pub account: String,
    pub arn: String,
}

/// Lifecycle status reported for analyses and template versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceStatus {
    CreationInProgress,
    CreationSuccessful,
    CreationFailed,
    UpdateInProgress,
    UpdateSuccessful,
    UpdateFailed,
    Deleted,
    #[serde(other)]
    Unknown,
}

impl ResourceStatus {
    pub fn is_ready(self) -> bool {
        matches!(self, Self::CreationSuccessful | Self::UpdateSuccessful)
    }

    pub fn is_failed(self) -> bool {
        matches!(self, Self::CreationFailed | Self::UpdateFailed)
    }
}

/// One entry of the analysis listing: a candidate source analysis.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AnalysisSummary {
    pub analysis_id: String,
    #[serde(default)]
    pub arn: String,
    #[serde(default)]
    pub name: String,
    pub status: ResourceStatus,
    #[serde(rename = "LastUpdatedTime", deserialize_with = "deserialize_timestamp")]
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AnalysisDetail {
    pub analysis_id: String,
    pub arn: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "DataSetArns", default)]
    pub dataset_arns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateDescription {
    pub template_id: String,
    pub arn: String,
    pub version_status: ResourceStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DataSetReference {
    #[serde(rename = "DataSetPlaceholder")]
    pub placeholder: String,
    #[serde(rename = "DataSetArn")]
    pub dataset_arn: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResourcePermission {
    pub principal: String,
    pub actions: Vec<String>,
}

impl ResourcePermission {
    pub fn new(principal: impl Into<String>, actions: &[&str]) -> Self {
        Self {
            principal: principal.into(),
            actions: actions.iter().map(|a| (*a).to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTemplateRequest {
    pub template_id: String,
    pub name: String,
    pub source_analysis_arn: String,
    pub dataset_references: Vec<DataSetReference>,
    pub permissions: Vec<ResourcePermission>,
    pub version_description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateAnalysisRequest {
    pub analysis_id: String,
    pub name: String,
    pub template_arn: String,
    pub dataset_references: Vec<DataSetReference>,
    pub permissions: Vec<ResourcePermission>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FolderMember {
    pub member_id: String,
    #[serde(default)]
    pub member_arn: String,
}

impl FolderMember {
    /// False only when the ARN is present and names a non-analysis resource.
    pub fn is_analysis(&self) -> bool {
        self.member_arn.is_empty() || self.member_arn.contains(":analysis/")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GroupMember {
    pub arn: String,
    #[serde(default)]
    pub member_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_token: Option<String>,
}

/// Operations of the hosted dashboarding service the backup core consumes.
///
/// Implementations report service-side failures as [`crate::error::ServiceError`]
/// inside the `anyhow::Error`, so callers can branch on not-found/conflict.
pub trait QuickSightApi {
    fn caller_identity(&self) -> Result<CallerIdentity>;

    fn list_analyses_page(
        &self,
        account_id: &str,
        next_token: Option<&str>,
    ) -> Result<Page<AnalysisSummary>>;

    fn describe_analysis(&self, account_id: &str, analysis_id: &str) -> Result<AnalysisDetail>;

    /// `Ok(None)` when no template with this id exists.
    fn describe_template(
        &self,
        account_id: &str,
        template_id: &str,
    ) -> Result<Option<TemplateDescription>>;

    /// Returns the ARN of the new template.
    fn create_template(&self, account_id: &str, request: &CreateTemplateRequest) -> Result<String>;

    /// Returns the ARN of the new analysis.
    fn create_analysis(&self, account_id: &str, request: &CreateAnalysisRequest) -> Result<String>;

    fn create_folder_membership(
        &self,
        account_id: &str,
        folder_id: &str,
        member_id: &str,
    ) -> Result<()>;

    fn list_folder_members_page(
        &self,
        account_id: &str,
        folder_id: &str,
        next_token: Option<&str>,
    ) -> Result<Page<FolderMember>>;

    fn delete_analysis(
        &self,
        account_id: &str,
        analysis_id: &str,
        force_without_recovery: bool,
    ) -> Result<()>;

    /// Returns the ARN of the new folder.
    fn create_folder(
        &self,
        account_id: &str,
        folder_id: &str,
        name: &str,
        permissions: &[ResourcePermission],
    ) -> Result<String>;

    fn list_group_members_page(
        &self,
        account_id: &str,
        namespace: &str,
        group_name: &str,
        next_token: Option<&str>,
    ) -> Result<Page<GroupMember>>;

    fn grant_folder_permissions(
        &self,
        account_id: &str,
        folder_id: &str,
        permissions: &[ResourcePermission],
    ) -> Result<()>;
}

/// Drain a cursor-paginated listing. Any page failure fails the whole
/// collection: a partial listing is never returned.
pub fn collect_pages<T, F>(mut fetch: F) -> Result<Vec<T>>
where
    F: FnMut(Option<&str>) -> Result<Page<T>>,
{
    let mut out = Vec::new();
    let mut seen_tokens = BTreeSet::new();
    let mut token: Option<String> = None;

    for _ in 0..MAX_PAGES {
        let page = fetch(token.as_deref())?;
        out.extend(page.items);
        match page.next_token.filter(|t| !t.is_empty()) {
            None => return Ok(out),
            Some(next) => {
                if !seen_tokens.insert(next.clone()) {
                    anyhow::bail!("pagination returned a repeated cursor: {next}");
                }
                token = Some(next);
            }
        }
    }
    anyhow::bail!("pagination exceeded {MAX_PAGES} pages")
}

/// Accepts ISO-8601 strings (aws cli v2) and epoch seconds (aws cli v1).
fn deserialize_timestamp<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    parse_timestamp(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
}

pub fn parse_timestamp(raw: &Value) -> Option<DateTime<Utc>> {
    match raw {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => {
            let secs = n.as_f64()?;
            let whole = secs.floor();
            let nanos = ((secs - whole) * 1e9).round() as u32;
            Utc.timestamp_opt(whole as i64, nanos.min(999_999_999)).single()
        }
        _ => None,
    }
}
