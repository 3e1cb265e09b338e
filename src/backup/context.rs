use crate::backup::config::BackupConfig;
use crate::error::BackupError;
use crate::quicksight::QuickSightApi;
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;

/// Account, caller and date every step of a run works against.
#[derive(Debug, Clone, PartialEq)]
pub struct RunContext {
    pub account_id: String,
    pub caller_arn: String,
    pub backup_date: NaiveDate,
    pub timezone: Tz,
    pub region: String,
    pub namespace: String,
    pub admin_principal_arn: String,
}

pub fn today_in(tz: Tz) -> NaiveDate {
    Utc::now().with_timezone(&tz).date_naive()
}

pub fn admin_principal_arn(cfg: &BackupConfig, account_id: &str) -> String {
    if let Some(arn) = cfg
        .backup
        .admin_principal_arn
        .as_deref()
        .map(str::trim)
        .filter(|arn| !arn.is_empty())
    {
        return arn.to_string();
    }
    format!(
        "arn:aws:quicksight:{}:{account_id}:group/{}/{}",
        cfg.service.region, cfg.service.namespace, cfg.backup.admin_group
    )
}

/// Resolve the caller identity and fix the run date. Nothing is mutated
/// before this succeeds.
pub fn resolve_context(
    api: &dyn QuickSightApi,
    cfg: &BackupConfig,
    date_override: Option<NaiveDate>,
) -> Result<RunContext, BackupError> {
    let timezone = cfg
        .backup
        .timezone()
        .map_err(|err| BackupError::InvalidConfig(format!("{err:#}")))?;

    let identity = api
        .caller_identity()
        .map_err(|err| BackupError::AuthResolution(format!("{err:#}")))?;
    if identity.account.trim().is_empty() {
        return Err(BackupError::AuthResolution(
            "caller identity returned an empty account id".to_string(),
        ));
    }

    Ok(RunContext {
        admin_principal_arn: admin_principal_arn(cfg, &identity.account),
        account_id: identity.account,
        caller_arn: identity.arn,
        backup_date: date_override.unwrap_or_else(|| today_in(timezone)),
        timezone,
        region: cfg.service.region.clone(),
        namespace: cfg.service.namespace.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quicksight::fake::{ACCOUNT, FakeQuickSight};

    #[test]
    fn context_carries_account_and_derived_admin_principal() {
        let api = FakeQuickSight::new();
        let cfg = BackupConfig::default();
        let date = NaiveDate::from_ymd_opt(2024, 1, 4).expect("date");

        let ctx = resolve_context(&api, &cfg, Some(date)).expect("context");
        assert_eq!(ctx.account_id, ACCOUNT);
        assert_eq!(ctx.backup_date, date);
        assert_eq!(
            ctx.admin_principal_arn,
            format!("arn:aws:quicksight:us-east-1:{ACCOUNT}:group/default/Admins")
        );
    }

    #[test]
    fn explicit_admin_principal_wins() {
        let mut cfg = BackupConfig::default();
        cfg.backup.admin_principal_arn =
            Some("arn:aws:quicksight:us-east-1:1:group/default/MIQ-Admins".to_string());
        assert_eq!(
            admin_principal_arn(&cfg, "999"),
            "arn:aws:quicksight:us-east-1:1:group/default/MIQ-Admins"
        );
    }

    #[test]
    fn identity_failure_is_auth_resolution_error() {
        let api = FakeQuickSight::new();
        api.state.borrow_mut().identity = None;

        let err = resolve_context(&api, &BackupConfig::default(), None).expect_err("no identity");
        assert!(matches!(err, BackupError::AuthResolution(_)));
        assert_eq!(api.calls_matching("list_analyses"), 0);
    }
}
