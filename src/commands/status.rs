use anyhow::Result;

use crate::backup::config::{BackupConfig, load_config, unknown_env_keys};
use crate::backup::paths::BackupPaths;
use crate::commands::CommandReport;
use crate::quicksight::aws_cli::resolve_aws_bin;

fn config_details(cfg: &BackupConfig, report: &mut CommandReport) {
    report.detail(format!("service.region={}", cfg.service.region));
    report.detail(format!("service.namespace={}", cfg.service.namespace));
    report.detail(format!("service.page_size={}", cfg.service.page_size));
    report.detail(format!("service.retries={}", cfg.service.retries));
    report.detail(format!("backup.admin_group={}", cfg.backup.admin_group));
    if let Some(arn) = &cfg.backup.admin_principal_arn {
        report.detail(format!("backup.admin_principal_arn={arn}"));
    }
    report.detail(format!("backup.timezone={}", cfg.backup.timezone));
    report.detail(format!(
        "backup.template_ready_timeout_secs={}",
        cfg.backup.template_ready_timeout_secs
    ));
    report.detail(format!(
        "backup.template_poll_interval_secs={}",
        cfg.backup.template_poll_interval_secs
    ));
    report.detail(format!("retention.keep={}", cfg.retention.keep));
    report.detail(format!(
        "retention.force_delete_without_recovery={}",
        cfg.retention.force_delete_without_recovery
    ));
}

pub fn run(paths: &BackupPaths, profile: Option<&str>, region: Option<&str>) -> Result<CommandReport> {
    let mut report = CommandReport::new("status");

    report.detail(format!("build={}", env!("BUILD_UUID")));
    report.detail(format!("qsb_home={}", paths.home.display()));
    report.detail(format!("logs_dir={}", paths.logs_dir.display()));
    report.detail(format!(
        "config_file={}{}",
        paths.config_file.display(),
        if paths.config_file.is_file() {
            ""
        } else {
            " (absent, defaults in use)"
        }
    ));
    if let Some(profile) = profile {
        report.detail(format!("profile={profile}"));
    }

    match load_config(paths) {
        Ok(mut cfg) => {
            if let Some(region) = region.map(str::trim).filter(|r| !r.is_empty()) {
                cfg.service.region = region.to_string();
            }
            config_details(&cfg, &mut report);
        }
        Err(err) => report.issue(format!("config invalid: {err:#}")),
    }

    match resolve_aws_bin() {
        Ok(bin) => report.detail(format!("aws_bin={}", bin.display())),
        Err(err) => report.issue(format!("aws binary unavailable: {err:#}")),
    }

    for key in unknown_env_keys() {
        report.issue(format!("unrecognised environment variable {key}"));
    }

    Ok(report)
}
