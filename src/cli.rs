use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::archive::paths::PathOverrides;
use crate::commands::catalog::CatalogOptions;
use crate::commands::prepare_sync::PrepareSyncOptions;
use crate::commands::scrape::ScrapeOptions;
use crate::commands::sync::SyncOptions;
use crate::commands::{self, CommandReport, MonthWindow, Workspace};
use crate::logging;

#[derive(Parser, Debug)]
#[command(name = "bingsync")]
#[command(version, about = "Mirror the Bing wallpaper archive into a local directory")]
struct Cli {
    /// Print the command report as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Wallpaper directory (default: $BINGSYNC_HOME/bing_wallpapers)
    #[arg(long, global = true)]
    wallpaper_dir: Option<PathBuf>,

    /// Scrape state file (default: $BINGSYNC_HOME/scrape_state.json)
    #[arg(long, global = true)]
    state_file: Option<PathBuf>,

    /// Date catalog CSV (default: $BINGSYNC_HOME/image_dates.csv)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Clone, Default)]
struct WindowArgs {
    /// First month, YYYYMM
    #[arg(long)]
    start: Option<String>,

    /// Last month, YYYYMM (default: current month)
    #[arg(long)]
    end: Option<String>,
}

impl From<WindowArgs> for MonthWindow {
    fn from(args: WindowArgs) -> Self {
        Self {
            start: args.start,
            end: args.end,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resumable crawl of the archive (default start: 200906)
    Scrape {
        #[command(flatten)]
        window: WindowArgs,

        /// Seconds to wait between requests
        #[arg(long)]
        delay: Option<f64>,

        /// Try the CDN copy before the detail page
        #[arg(long)]
        cdn_first: bool,

        /// Only try the CDN copy; never read detail pages
        #[arg(long)]
        direct_only: bool,

        /// Ignore saved state and re-check everything
        #[arg(long)]
        reset: bool,

        /// Process months newest first
        #[arg(long)]
        reverse: bool,
    },
    /// Build or refresh the date catalog (default: previous and current month)
    Catalog {
        #[command(flatten)]
        window: WindowArgs,

        /// Re-fetch past months already in the catalog
        #[arg(long)]
        force: bool,
    },
    /// Reconcile scrape state with the catalog and the files on disk
    PrepareSync {
        #[command(flatten)]
        window: WindowArgs,
    },
    /// Refresh catalog, reconcile, and crawl only what is missing
    Sync {
        #[command(flatten)]
        window: WindowArgs,
    },
    /// Show resolved paths, configuration and progress counts
    Status,
}

fn render_report(report: &CommandReport, json: bool) -> Result<String> {
    if json {
        return Ok(serde_json::to_string_pretty(report)?);
    }
    let mut out = format!(
        "{}: {}\n",
        report.command,
        if report.ok { "ok" } else { "issues" }
    );
    for detail in &report.details {
        out.push_str(&format!("  {detail}\n"));
    }
    for issue in &report.issues {
        out.push_str(&format!("  ! {issue}\n"));
    }
    Ok(out.trim_end().to_string())
}

/// Parse arguments, run the command and return the process exit code.
pub fn run() -> Result<i32> {
    let cli = Cli::parse();
    logging::init();

    let overrides = PathOverrides {
        wallpaper_dir: cli.wallpaper_dir,
        state_file: cli.state_file,
        catalog_file: cli.catalog,
    };
    let ws = Workspace::load(&overrides)?;

    let report = match cli.command {
        Command::Scrape {
            window,
            delay,
            cdn_first,
            direct_only,
            reset,
            reverse,
        } => commands::scrape::run(
            &ws,
            &ScrapeOptions {
                window: window.into(),
                delay_secs: delay,
                cdn_first,
                direct_only,
                reset,
                reverse,
            },
        )?,
        Command::Catalog { window, force } => commands::catalog::run(
            &ws,
            &CatalogOptions {
                window: window.into(),
                force,
            },
        )?,
        Command::PrepareSync { window } => commands::prepare_sync::run(
            &ws,
            &PrepareSyncOptions {
                window: window.into(),
            },
        )?,
        Command::Sync { window } => commands::sync::run(
            &ws,
            &SyncOptions {
                window: window.into(),
            },
        )?,
        Command::Status => commands::status::run(&ws)?,
    };

    println!("{}", render_report(&report, cli.json)?);
    Ok(if report.ok { 0 } else { 1 })
}
