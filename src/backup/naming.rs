//! Identifier grammar shared by the backup and prune runs.
//!
//! ```text
//! backupId    := "backup-" logicalName "-" isoDate
//! templateId  := logicalName "-" isoDate
//! logicalName := normalize(sourceAnalysisDisplayName)
//! ```
//!
//! Nothing is persisted locally: which backups exist, and which generation
//! they belong to, is recovered from these identifiers alone.

use chrono::NaiveDate;
use std::fmt;

pub const BACKUP_PREFIX: &str = "backup-";
const ISO_DATE_LEN: usize = 10;
const ISO_DATE_FORMAT: &str = "%Y-%m-%d";

/// Replace every run of characters outside `[A-Za-z0-9]` with a single `-`.
///
/// Unlike a slug, case is preserved and leading/trailing separators are kept,
/// so distinct display names stay distinct.
pub fn normalize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut prev_dash = false;
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch);
            prev_dash = false;
        } else if !prev_dash {
            out.push('-');
            prev_dash = true;
        }
    }
    out
}

pub fn is_normalized(name: &str) -> bool {
    !name.is_empty() && normalize(name) == name
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(ISO_DATE_FORMAT).to_string()
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    if raw.len() != ISO_DATE_LEN {
        return None;
    }
    NaiveDate::parse_from_str(raw, ISO_DATE_FORMAT).ok()
}

pub fn template_id(logical_name: &str, date: NaiveDate) -> String {
    normalize(&format!("{logical_name}-{}", format_date(date)))
}

pub fn template_display_name(logical_name: &str, date: NaiveDate) -> String {
    format!("{logical_name}-temp-{}", format_date(date))
}

/// Placeholder for the dataset at 0-based `index` in the source's dataset list.
pub fn dataset_placeholder(logical_name: &str, index: usize, date: NaiveDate) -> String {
    format!("{logical_name}-{}-{}", index + 1, format_date(date))
}

/// One dated generation of a logical analysis.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BackupName {
    pub logical_name: String,
    pub backup_date: NaiveDate,
}

impl BackupName {
    pub fn new(logical_name: impl Into<String>, backup_date: NaiveDate) -> Self {
        Self {
            logical_name: logical_name.into(),
            backup_date,
        }
    }

    pub fn backup_id(&self) -> String {
        format!(
            "{BACKUP_PREFIX}{}-{}",
            self.logical_name,
            format_date(self.backup_date)
        )
    }

    /// Inverse of [`BackupName::backup_id`]. The logical name may itself
    /// contain `-`, so the date is taken from the trailing ten characters.
    pub fn parse(id: &str) -> Option<Self> {
        let rest = id.strip_prefix(BACKUP_PREFIX)?;
        if rest.len() < ISO_DATE_LEN + 2 || !rest.is_char_boundary(rest.len() - ISO_DATE_LEN) {
            return None;
        }
        let (head, date_raw) = rest.split_at(rest.len() - ISO_DATE_LEN);
        let logical_name = head.strip_suffix('-')?;
        if !is_normalized(logical_name) {
            return None;
        }
        let backup_date = parse_date(date_raw)?;
        Some(Self::new(logical_name, backup_date))
    }
}

impl fmt::Display for BackupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.backup_id())
    }
}
