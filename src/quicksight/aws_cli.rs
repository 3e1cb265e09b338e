use super::{
    AnalysisDetail, AnalysisSummary, CallerIdentity, CreateAnalysisRequest, CreateTemplateRequest,
    FolderMember, GroupMember, Page, QuickSightApi, ResourcePermission, ResourceStatus,
    TemplateDescription,
};
use crate::backup::config::ServiceConfig;
use crate::error::ServiceError;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::env;
use std::path::PathBuf;
use std::process::{Command, Output};
use std::thread;
use std::time::Duration;

const RETRY_BASE_DELAY_MS: u64 = 250;

/// Talks to QuickSight through the `aws` command-line tool, which owns
/// credential and session resolution for the selected profile.
#[derive(Debug, Clone)]
pub struct AwsCli {
    bin: PathBuf,
    profile: Option<String>,
    region: Option<String>,
    page_size: u32,
    retries: usize,
}

pub fn resolve_aws_bin() -> Result<PathBuf> {
    if let Ok(custom) = env::var("QSB_AWS_BIN") {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            let path = PathBuf::from(trimmed);
            if !path.is_file() {
                anyhow::bail!("QSB_AWS_BIN does not point to a file: {}", path.display());
            }
            return Ok(path);
        }
    }
    which::which("aws").context("aws binary not found in QSB_AWS_BIN or PATH")
}

/// Map the `(ErrorCode)` in an aws cli failure message onto a [`ServiceError`].
pub fn classify_failure(operation: &str, stderr: &str) -> ServiceError {
    let message = stderr.trim().to_string();
    let code = message
        .split_once('(')
        .and_then(|(_, rest)| rest.split_once(')'))
        .map(|(code, _)| code.trim())
        .unwrap_or_default();

    match code {
        "ResourceNotFoundException" => ServiceError::NotFound(message),
        "ResourceExistsException" => ServiceError::AlreadyExists(message),
        "ThrottlingException" | "Throttling" | "TooManyRequestsException" => {
            ServiceError::Throttled(message)
        }
        "AccessDeniedException"
        | "ExpiredToken"
        | "ExpiredTokenException"
        | "UnrecognizedClientException"
        | "InvalidClientTokenId" => ServiceError::AccessDenied(message),
        _ if message.contains("Unable to locate credentials")
            || message.contains("The config profile") =>
        {
            ServiceError::AccessDenied(message)
        }
        _ => ServiceError::Failed {
            operation: operation.to_string(),
            message,
        },
    }
}

fn field<T: DeserializeOwned>(value: &Value, key: &str, operation: &str) -> Result<T> {
    let raw = value
        .get(key)
        .cloned()
        .with_context(|| format!("{operation} response missing `{key}`"))?;
    serde_json::from_value(raw).with_context(|| format!("invalid `{key}` in {operation} response"))
}

fn optional_list<T: DeserializeOwned>(value: &Value, key: &str, operation: &str) -> Result<Vec<T>> {
    match value.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(_) => field(value, key, operation),
    }
}

fn page_cursor(value: &Value) -> Option<String> {
    value
        .get("NextToken")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .map(ToOwned::to_owned)
}

fn to_json_arg<T: serde::Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

impl AwsCli {
    pub fn new(
        bin: PathBuf,
        profile: Option<String>,
        region: Option<String>,
        page_size: u32,
        retries: usize,
    ) -> Self {
        Self {
            bin,
            profile,
            region,
            page_size,
            retries,
        }
    }

    pub fn from_config(profile: Option<&str>, service: &ServiceConfig) -> Result<Self> {
        let bin = resolve_aws_bin()?;
        Ok(Self::new(
            bin,
            profile.map(ToOwned::to_owned),
            Some(service.region.clone()),
            service.page_size,
            service.retries,
        ))
    }

    fn base_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(profile) = &self.profile {
            args.push("--profile".to_string());
            args.push(profile.clone());
        }
        if let Some(region) = &self.region {
            args.push("--region".to_string());
            args.push(region.clone());
        }
        args.push("--output".to_string());
        args.push("json".to_string());
        args
    }

    fn page_args(&self, next_token: Option<&str>) -> Vec<String> {
        let mut args = vec![
            "--page-size".to_string(),
            self.page_size.to_string(),
            "--max-items".to_string(),
            self.page_size.to_string(),
        ];
        if let Some(token) = next_token {
            args.push("--starting-token".to_string());
            args.push(token.to_string());
        }
        args
    }

    fn invoke(&self, service: &str, operation: &str, args: &[String]) -> Result<Output> {
        Command::new(&self.bin)
            .args(self.base_args())
            .arg(service)
            .arg(operation)
            .args(args)
            .output()
            .with_context(|| format!("failed to run `{} {service} {operation}`", self.bin.display()))
    }

    /// Run one operation, retrying only throttled attempts.
    fn call(&self, service: &str, operation: &str, args: &[String]) -> Result<Value> {
        let mut attempt = 0usize;
        loop {
            let out = self.invoke(service, operation, args)?;
            if out.status.success() {
                let stdout = String::from_utf8_lossy(&out.stdout);
                if stdout.trim().is_empty() {
                    return Ok(Value::Null);
                }
                return serde_json::from_str(&stdout)
                    .with_context(|| format!("invalid JSON from `{service} {operation}`"));
            }

            let err = classify_failure(operation, &String::from_utf8_lossy(&out.stderr));
            if matches!(err, ServiceError::Throttled(_)) && attempt < self.retries {
                attempt += 1;
                thread::sleep(Duration::from_millis(RETRY_BASE_DELAY_MS * attempt as u64));
                continue;
            }
            return Err(err.into());
        }
    }

    fn quicksight(&self, operation: &str, account_id: &str, mut args: Vec<String>) -> Result<Value> {
        let mut full = vec!["--aws-account-id".to_string(), account_id.to_string()];
        full.append(&mut args);
        self.call("quicksight", operation, &full)
    }
}

impl QuickSightApi for AwsCli {
    fn caller_identity(&self) -> Result<CallerIdentity> {
        let value = self.call("sts", "get-caller-identity", &[])?;
        serde_json::from_value(value).context("invalid get-caller-identity response")
    }

    fn list_analyses_page(
        &self,
        account_id: &str,
        next_token: Option<&str>,
    ) -> Result<Page<AnalysisSummary>> {
        let value = self.quicksight("list-analyses", account_id, self.page_args(next_token))?;
        Ok(Page {
            items: optional_list(&value, "AnalysisSummaryList", "list-analyses")?,
            next_token: page_cursor(&value),
        })
    }

    fn describe_analysis(&self, account_id: &str, analysis_id: &str) -> Result<AnalysisDetail> {
        let value = self.quicksight(
            "describe-analysis",
            account_id,
            vec!["--analysis-id".to_string(), analysis_id.to_string()],
        )?;
        field(&value, "Analysis", "describe-analysis")
    }

    fn describe_template(
        &self,
        account_id: &str,
        template_id: &str,
    ) -> Result<Option<TemplateDescription>> {
        let value = match self.quicksight(
            "describe-template",
            account_id,
            vec!["--template-id".to_string(), template_id.to_string()],
        ) {
            Ok(value) => value,
            Err(err) if ServiceError::is_not_found(&err) => return Ok(None),
            Err(err) => return Err(err),
        };

        let template = value
            .get("Template")
            .context("describe-template response missing `Template`")?;
        let arn = template
            .get("Arn")
            .and_then(Value::as_str)
            .context("describe-template response missing `Template.Arn`")?;
        let version_status = template
            .get("Version")
            .and_then(|v| v.get("Status"))
            .cloned()
            .map(serde_json::from_value::<ResourceStatus>)
            .transpose()
            .context("invalid `Template.Version.Status`")?
            .unwrap_or(ResourceStatus::Unknown);

        Ok(Some(TemplateDescription {
            template_id: template_id.to_string(),
            arn: arn.to_string(),
            version_status,
        }))
    }

    fn create_template(&self, account_id: &str, request: &CreateTemplateRequest) -> Result<String> {
        let source_entity = serde_json::json!({
            "SourceAnalysis": {
                "Arn": request.source_analysis_arn,
                "DataSetReferences": request.dataset_references,
            }
        });
        let value = self.quicksight(
            "create-template",
            account_id,
            vec![
                "--template-id".to_string(),
                request.template_id.clone(),
                "--name".to_string(),
                request.name.clone(),
                "--source-entity".to_string(),
                to_json_arg(&source_entity)?,
                "--permissions".to_string(),
                to_json_arg(&request.permissions)?,
                "--version-description".to_string(),
                request.version_description.clone(),
            ],
        )?;
        field(&value, "Arn", "create-template")
    }

    fn create_analysis(&self, account_id: &str, request: &CreateAnalysisRequest) -> Result<String> {
        let source_entity = serde_json::json!({
            "SourceTemplate": {
                "Arn": request.template_arn,
                "DataSetReferences": request.dataset_references,
            }
        });
        let value = self.quicksight(
            "create-analysis",
            account_id,
            vec![
                "--analysis-id".to_string(),
                request.analysis_id.clone(),
                "--name".to_string(),
                request.name.clone(),
                "--source-entity".to_string(),
                to_json_arg(&source_entity)?,
                "--permissions".to_string(),
                to_json_arg(&request.permissions)?,
            ],
        )?;
        field(&value, "Arn", "create-analysis")
    }

    fn create_folder_membership(
        &self,
        account_id: &str,
        folder_id: &str,
        member_id: &str,
    ) -> Result<()> {
        self.quicksight(
            "create-folder-membership",
            account_id,
            vec![
                "--folder-id".to_string(),
                folder_id.to_string(),
                "--member-id".to_string(),
                member_id.to_string(),
                "--member-type".to_string(),
                "ANALYSIS".to_string(),
            ],
        )?;
        Ok(())
    }

    fn list_folder_members_page(
        &self,
        account_id: &str,
        folder_id: &str,
        next_token: Option<&str>,
    ) -> Result<Page<FolderMember>> {
        let mut args = vec!["--folder-id".to_string(), folder_id.to_string()];
        args.extend(self.page_args(next_token));
        let value = self.quicksight("list-folder-members", account_id, args)?;
        Ok(Page {
            items: optional_list(&value, "FolderMemberList", "list-folder-members")?,
            next_token: page_cursor(&value),
        })
    }

    fn delete_analysis(
        &self,
        account_id: &str,
        analysis_id: &str,
        force_without_recovery: bool,
    ) -> Result<()> {
        let mut args = vec!["--analysis-id".to_string(), analysis_id.to_string()];
        if force_without_recovery {
            args.push("--force-delete-without-recovery".to_string());
        }
        self.quicksight("delete-analysis", account_id, args)?;
        Ok(())
    }

    fn create_folder(
        &self,
        account_id: &str,
        folder_id: &str,
        name: &str,
        permissions: &[ResourcePermission],
    ) -> Result<String> {
        let value = self.quicksight(
            "create-folder",
            account_id,
            vec![
                "--folder-id".to_string(),
                folder_id.to_string(),
                "--name".to_string(),
                name.to_string(),
                "--permissions".to_string(),
                to_json_arg(&permissions)?,
            ],
        )?;
        field(&value, "Arn", "create-folder")
    }

    fn list_group_members_page(
        &self,
        account_id: &str,
        namespace: &str,
        group_name: &str,
        next_token: Option<&str>,
    ) -> Result<Page<GroupMember>> {
        let mut args = vec![
            "--namespace".to_string(),
            namespace.to_string(),
            "--group-name".to_string(),
            group_name.to_string(),
        ];
        args.extend(self.page_args(next_token));
        let value = self.quicksight("list-group-memberships", account_id, args)?;
        Ok(Page {
            items: optional_list(&value, "GroupMemberList", "list-group-memberships")?,
            next_token: page_cursor(&value),
        })
    }

    fn grant_folder_permissions(
        &self,
        account_id: &str,
        folder_id: &str,
        permissions: &[ResourcePermission],
    ) -> Result<()> {
        self.quicksight(
            "update-folder-permissions",
            account_id,
            vec![
                "--folder-id".to_string(),
                folder_id.to_string(),
                "--grant-permissions".to_string(),
                to_json_arg(&permissions)?,
            ],
        )?;
        Ok(())
    }
}
