//! Grid-transform command implementation.
//!
//! Extracts a multi-team export under the working directory and writes one
//! archive per team to `<work_dir>/teams`.

use crate::archive::ZipArchiveIo;
use crate::cli::{Cli, GridArgs};
use crate::error::Result;
use crate::partition::{TeamMap, TeamPartitioner, TEAMS_DIR};

use super::{load_config, prepare_export, spinner, step};

/// Subdirectory of the working directory receiving the extracted export.
const EXTRACT_DIR: &str = "extracted";

/// Run the grid-transform command.
pub fn run(cli: &Cli, args: &GridArgs) -> Result<()> {
    let config = load_config(cli)?;
    let work_dir = args.work_dir.clone().unwrap_or(config.output.work_dir);
    let teams = TeamMap::load(&args.teams)?;

    let progress = spinner(cli, "Extracting export...");
    let root = prepare_export(&args.file, &work_dir.join(EXTRACT_DIR))?;

    step(progress.as_ref(), "Partitioning channels by team...");
    let archive = ZipArchiveIo::new();
    let report = TeamPartitioner::new(&archive, teams).partition(&root, &work_dir.join(TEAMS_DIR))?;

    if let Some(progress) = progress {
        progress.finish_and_clear();
    }
    if !cli.quiet {
        for team in &report.teams {
            eprintln!("{}: {} channels -> {}", team.team, team.channels, team.path.display());
        }
        for skipped in &report.skipped {
            eprintln!("skipped {}: {}", skipped.dir, skipped.reason);
        }
    }

    Ok(())
}
