//! cubeui - script-driven widget UI with a console
//!
//! Windows are rebuilt every frame from script blocks. The terminal preview
//! draws them with ratatui; `headless` records the draw commands as JSON.

mod clipboard;
mod config;
mod console;
mod core;
mod frontend;
mod script;
mod ui;

use anyhow::{Context, Result};
use clap::{Parser as ClapParser, Subcommand};
use frontend::Frontend;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;

/// Milliseconds per headless frame
const HEADLESS_FRAME_MS: u64 = 16;

#[derive(ClapParser)]
#[command(name = "cubeui")]
#[command(about = "Script-driven widget UI with a console", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Custom data directory (default: ~/.cubeui)
    /// Can also be set via CUBEUI_DIR environment variable
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the demo windows in the terminal (default)
    Demo,
    /// Run frames without a terminal and print what was drawn as JSON
    Headless {
        /// Number of frames to run
        #[arg(long, default_value_t = 1)]
        frames: u32,
        /// HUD width in pixels
        #[arg(long, default_value_t = 640)]
        width: i32,
        /// HUD height in pixels
        #[arg(long, default_value_t = 480)]
        height: i32,
        /// Script run once before the first frame
        #[arg(long, value_name = "FILE")]
        script: Option<PathBuf>,
    },
    /// Print the bindings and completions in binds.cfg format
    WriteConfig {
        /// Also save them to binds.cfg in the data directory
        #[arg(long)]
        save: bool,
    },
}

#[derive(Serialize)]
struct FrameReport {
    frame: u32,
    shown: Vec<String>,
    commands: usize,
    texts: usize,
}

#[derive(Serialize)]
struct HeadlessReport {
    frames: Vec<FrameReport>,
    console: Vec<String>,
    last_frame: ui::DrawList,
}

fn main() -> Result<()> {
    // TUI apps can't log to stdout, so we write to a file
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open("cubeui.log")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with_writer(std::sync::Mutex::new(log_file))
        .with_ansi(false)
        .init();

    let cli = Cli::parse();

    if let Some(data_dir) = &cli.data_dir {
        std::env::set_var(config::DATA_DIR_ENV, data_dir);
        tracing::info!("Using custom data directory: {:?}", data_dir);
    } else if let Ok(env_dir) = std::env::var(config::DATA_DIR_ENV) {
        tracing::info!("Using data directory from {}: {}", config::DATA_DIR_ENV, env_dir);
    }

    let config = match &cli.config {
        Some(path) => config::Config::load_from_path(path)?,
        None => config::Config::load()?,
    };

    let mut core = core::AppCore::new(config);
    core::demo::install(&mut core);
    load_binds(&mut core)?;

    match cli.command.unwrap_or(Commands::Demo) {
        Commands::Demo => run_tui(core),
        Commands::Headless {
            frames,
            width,
            height,
            script,
        } => run_headless(core, frames, (width, height), script),
        Commands::WriteConfig { save } => {
            print!("{}", config::binds_script(&core.binds, &core.completion));
            if save {
                let path = config::Config::binds_path()?;
                config::save_binds(&path, &core.binds, &core.completion)?;
                println!("Saved to {:?}", path);
            }
            Ok(())
        }
    }
}

/// Run binds.cfg from the data directory if it exists
fn load_binds(core: &mut core::AppCore) -> Result<()> {
    let path = config::Config::binds_path()?;
    if !path.exists() {
        return Ok(());
    }
    let source = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read bindings: {:?}", path))?;
    core.run_script(&source);
    tracing::info!("Loaded bindings from {:?}", path);
    Ok(())
}

/// Run the terminal preview until `quit`
fn run_tui(mut core: core::AppCore) -> Result<()> {
    let mut frontend = frontend::TuiFrontend::new()?;
    let start = Instant::now();
    tracing::info!("TUI started, terminal {:?}", frontend.size());

    while core.running {
        let events = frontend.poll_events()?;
        core::input_router::route_events(&mut core, &events);
        if !core.running {
            break;
        }
        core.update(start.elapsed().as_millis() as u64);
        frontend.render(&mut core)?;
    }

    frontend.cleanup()?;
    tracing::info!("TUI stopped");
    Ok(())
}

fn run_headless(
    mut core: core::AppCore,
    frames: u32,
    hud: (i32, i32),
    script: Option<PathBuf>,
) -> Result<()> {
    core.ui.set_hud_size(hud.0, hud.1);
    if let Some(path) = script {
        let source = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read script: {:?}", path))?;
        core.run_script(&source);
    }

    let mut reports = Vec::new();
    let mut list = ui::DrawList::default();
    for frame in 0..frames {
        if !core.running {
            break;
        }
        core.update(frame as u64 * HEADLESS_FRAME_MS);
        list.clear();
        core.render(&mut list);
        reports.push(FrameReport {
            frame,
            shown: core.ui.shown().map(str::to_string).collect(),
            commands: list.commands.len(),
            texts: list.texts().count(),
        });
    }

    let report = HeadlessReport {
        frames: reports,
        console: core.console.iter().map(|l| l.text.clone()).collect(),
        last_frame: list,
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("Failed to encode report")?
    );
    Ok(())
}
