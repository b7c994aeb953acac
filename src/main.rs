mod cache;
mod commands;
mod config;
mod error;
mod http;
mod jira;
mod logging;
mod report;
#[cfg(test)]
mod testing;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use std::path::PathBuf;

use report::aggregate::ReportKind;

#[derive(Parser, Debug)]
#[command(name = "jwx")]
#[command(about = "Export Jira worklogs into a per-project spreadsheet report")]
#[command(version)]
struct Args {
  /// Path to config file (default: ./jwx.yaml, ./config.json or $XDG_CONFIG_HOME/jwx/config.yaml)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Extract worklog entries of a period into a spreadsheet
  WorklogEntries(commands::ReportArgs),
  /// Sum up issues, worklogs and time per project over the period
  ProjectTotals(commands::ReportArgs),
  /// Hours per day, one column per project
  WorkedHoursPerDay(commands::ReportArgs),
  /// Hours per day, one column per author and one sheet per label
  WorkedHoursPerDayPerAuthor(commands::ReportArgs),
  /// Remove every cached API response
  ClearCache,
}

impl Command {
  fn report(self) -> Option<(ReportKind, commands::ReportArgs)> {
    match self {
      Command::WorklogEntries(args) => Some((ReportKind::WorklogEntries, args)),
      Command::ProjectTotals(args) => Some((ReportKind::ProjectTotals, args)),
      Command::WorkedHoursPerDay(args) => Some((ReportKind::HoursPerDay, args)),
      Command::WorkedHoursPerDayPerAuthor(args) => Some((ReportKind::HoursPerDayPerAuthor, args)),
      Command::ClearCache => None,
    }
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let config = config::Config::load(args.config.as_deref())?;

  match args.command.report() {
    Some((kind, report)) => {
      let _guard = logging::init(config.cache_dir().as_deref(), report.quiet)?;
      commands::report(&config, kind, report).await?;
    }
    None => {
      let _guard = logging::init(config.cache_dir().as_deref(), false)?;
      let removed = commands::clear_cache(&config)?;
      println!("Removed {} cached responses", removed);
    }
  }

  Ok(())
}
