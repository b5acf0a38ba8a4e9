use anyhow::{anyhow, ensure, Context, Result};
use std::{
    fs::File,
    path::{Path, PathBuf},
    sync::Mutex,
};
use structopt::StructOpt;

mod error;
mod events;
mod sweep;
mod ui;

#[derive(Debug, structopt::StructOpt)]
struct Opt {
    /// The number of columns in the grid.
    #[structopt(short = "-W", long, default_value = "20")]
    width: usize,

    /// The number of rows in the grid.
    #[structopt(short = "-H", long, default_value = "20")]
    height: usize,

    /// The total number of mines in the grid.
    #[structopt(short, long, default_value = "40")]
    mines: usize,

    /// The width of each cell.
    #[structopt(short = "-w", long, default_value = "5")]
    cell_width: u16,

    /// The height of each cell.
    #[structopt(short = "-c", long, default_value = "3")]
    cell_height: u16,

    /// Write debug logs to this file.
    #[structopt(long, parse(from_os_str))]
    log_file: Option<PathBuf>,
}

fn init_logging(path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init()
        .map_err(|e| anyhow!(e))
        .context("failed to install log subscriber")
}

fn main() -> Result<()> {
    let Opt {
        width,
        height,
        mines,
        cell_width,
        cell_height,
        log_file,
    } = Opt::from_args();

    if let Some(path) = &log_file {
        init_logging(path)?;
    }

    ensure!(
        cell_width >= 3 && cell_height >= 3,
        "cells must be at least 3x3, got {}x{}",
        cell_width,
        cell_height
    );

    // reject a bad board before the terminal is switched into raw mode
    let minefield =
        sweep::MineField::new(width, height, mines).context("invalid board configuration")?;

    ui::Ui::builder()
        .minefield(minefield)
        .cell_width(cell_width)
        .cell_height(cell_height)
        .build()
        .run()
        .context("sweep failed")
}
