//! saavy-toys - generative sound toys in the terminal
//!
//! Run with: cargo run -- --synth drone
//! Render offline: cargo run -- bounce --synth dna --seconds 20 out.wav

mod app;
mod ui;

use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result as EyreResult, WrapErr};
use tracing_subscriber::EnvFilter;

use saavy_toys::{EngineConfig, SynthKind};

#[derive(Parser, Debug)]
#[command(name = "saavy-toys", version, about = "Pointer-driven generative sound toys")]
struct Cli {
    /// Toy to open with, by name or position (1-10)
    #[arg(short, long, default_value = "minimalism")]
    synth: SynthKind,

    /// Directory with the adgc/, drum/ and concrete/ sample sets. Without
    /// it, stand-in samples are synthesized.
    #[arg(short, long)]
    assets: Option<PathBuf>,

    #[arg(long, default_value_t = 0x5EED)]
    seed: u64,

    /// Write logs here; the terminal is taken by the interface
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Hold the pointer at one spot and render the result to a WAV file
    Bounce {
        out: PathBuf,
        #[arg(long, default_value_t = 10.0)]
        seconds: f64,
        #[arg(short, default_value_t = 0.5)]
        x: f32,
        #[arg(short, default_value_t = 0.5)]
        y: f32,
        /// Keep rendering this long after the pointer is lifted
        #[arg(long, default_value_t = 2.0)]
        tail: f64,
        #[arg(long, default_value_t = 48_000.0)]
        sample_rate: f32,
    },
}

fn init_logging(path: Option<&PathBuf>) -> EyreResult<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let file = File::create(path).wrap_err_with(|| format!("cannot create {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("saavy_toys=debug")),
        )
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}

fn main() -> EyreResult<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_logging(cli.log_file.as_ref())?;

    let mut config = EngineConfig::default().seed(cli.seed);
    if let Some(root) = &cli.assets {
        config = config.asset_root(root);
    }

    match cli.command {
        Some(Command::Bounce {
            out,
            seconds,
            x,
            y,
            tail,
            sample_rate,
        }) => app::bounce(
            config.sample_rate(sample_rate),
            cli.synth,
            cli.assets.is_some(),
            app::Hold { x, y, seconds, tail },
            &out,
        ),
        None => app::Toys::new(config, cli.synth, cli.assets.is_some()).run(),
    }
}
