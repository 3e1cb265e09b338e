use anyhow::Result;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::backup::naming::parse_date;
use crate::backup::paths::{BackupPaths, resolve_paths};
use crate::commands::backup::BackupArgs;
use crate::commands::folder_init::FolderInitArgs;
use crate::commands::prune::PruneArgs;
use crate::commands::{self, CommandReport, Session};
use crate::quicksight::aws_cli::AwsCli;

#[derive(Debug, Parser)]
#[command(
    name = "qs-backup",
    version,
    about = "Back up changed QuickSight analyses and prune old backup generations"
)]
pub struct Cli {
    #[arg(long, global = true, help = "AWS named profile passed to the aws cli")]
    pub profile: Option<String>,

    #[arg(long, global = true, help = "Region override for this run")]
    pub region: Option<String>,

    #[arg(long, global = true, help = "Print the command report as JSON")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Replicate every analysis changed today into a dated backup.
    Backup(BackupCommand),
    /// Delete all but the newest generations of each backup.
    Prune(PruneCommand),
    /// Create the shared backup folder and grant a group access to it.
    FolderInit(FolderInitCommand),
    /// Show resolved paths, configuration and environment.
    Status,
}

#[derive(Debug, Clone, Args)]
pub struct BackupCommand {
    #[arg(long, alias = "folder_id", help = "Folder that receives the backups")]
    pub folder_id: String,

    #[arg(
        long,
        value_parser = parse_date_arg,
        value_name = "YYYY-MM-DD",
        help = "Back up analyses changed on this date instead of today"
    )]
    pub date: Option<NaiveDate>,

    #[arg(long, help = "Report what would be created without creating it")]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Args)]
pub struct PruneCommand {
    #[arg(long, alias = "folder_id", help = "Folder holding the backups")]
    pub folder_id: String,

    #[arg(
        long,
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Generations to keep per analysis (default from config)"
    )]
    pub keep: Option<u64>,

    #[arg(long, help = "Report what would be deleted without deleting")]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Args)]
pub struct FolderInitCommand {
    #[arg(long, alias = "folder_id", help = "Folder name; the id is derived from it")]
    pub folder_id: String,

    #[arg(long, alias = "group_name", help = "Group whose members get folder access")]
    pub group_name: String,
}

fn parse_date_arg(raw: &str) -> Result<NaiveDate, String> {
    parse_date(raw.trim()).ok_or_else(|| format!("invalid date '{raw}', expected YYYY-MM-DD"))
}

fn print_report(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    println!(
        "{}: {}",
        report.command,
        if report.ok { "ok" } else { "completed with issues" }
    );
    for detail in &report.details {
        println!("  {detail}");
    }
    for issue in &report.issues {
        println!("  ! {issue}");
    }
    Ok(())
}

fn connect(paths: BackupPaths, cli: &Cli) -> Result<(Session, AwsCli)> {
    let session = Session::load(paths, cli.profile.clone(), cli.region.clone())?;
    let api = session.aws_cli()?;
    Ok((session, api))
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let paths = resolve_paths()?;

    let report = match &cli.command {
        Command::Status => {
            commands::status::run(&paths, cli.profile.as_deref(), cli.region.as_deref())?
        }
        Command::Backup(args) => {
            let (session, api) = connect(paths, &cli)?;
            commands::backup::run(
                &session,
                &api,
                &BackupArgs {
                    folder_id: args.folder_id.clone(),
                    date: args.date,
                    dry_run: args.dry_run,
                },
            )?
        }
        Command::Prune(args) => {
            let (session, api) = connect(paths, &cli)?;
            commands::prune::run(
                &session,
                &api,
                &PruneArgs {
                    folder_id: args.folder_id.clone(),
                    keep: args.keep.and_then(|k| usize::try_from(k).ok()),
                    dry_run: args.dry_run,
                },
            )?
        }
        Command::FolderInit(args) => {
            let (session, api) = connect(paths, &cli)?;
            commands::folder_init::run(
                &session,
                &api,
                &FolderInitArgs {
                    folder_name: args.folder_id.clone(),
                    group_name: args.group_name.clone(),
                },
            )?
        }
    };

    print_report(&report, cli.json)
}
