use clap::{Parser, Subcommand};
use std::path::Path;

use tileground::cli::{self, commands};
use tileground::config::generation::GenerationParams;
use tileground::config::simulation::SimulationConfig;
use tileground::world::coords::TilePos;

#[derive(Parser)]
#[command(name = "tileground")]
#[command(about = "A lazily generated tile world with tick-driven agent movement")]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a world and summarize its terrain
    Generate {
        /// Path to world generation config file
        #[arg(short, long, default_value = "worldgen.toml")]
        worldgen: String,

        /// Chunks to summarize in each direction from the origin
        #[arg(short, long, default_value_t = 4)]
        radius: i32,
    },

    /// Run the headless simulation
    Run {
        /// Path to world generation config file
        #[arg(short, long, default_value = "worldgen.toml")]
        worldgen: String,

        /// Stop after this many ticks
        #[arg(short, long)]
        ticks: Option<u64>,
    },

    /// Inspect the tiles around a coordinate
    Inspect {
        /// Path to world generation config file
        #[arg(short, long, default_value = "worldgen.toml")]
        worldgen: String,

        #[arg(short, long, default_value_t = 0, allow_hyphen_values = true)]
        x: i32,

        #[arg(short, long, default_value_t = 0, allow_hyphen_values = true)]
        y: i32,

        /// Tiles to show in each direction
        #[arg(short, long, default_value_t = 8)]
        radius: u32,

        /// Emit JSON instead of an ASCII map
        #[arg(long)]
        json: bool,
    },
}

fn load_params(path: &str) -> GenerationParams {
    match GenerationParams::from_file(Path::new(path)) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error loading generation config: {}", e);
            std::process::exit(1);
        }
    }
}

fn load_config(path: &str) -> SimulationConfig {
    match SimulationConfig::from_file(Path::new(path)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate { worldgen, radius } => {
            let params = load_params(&worldgen);
            println!("Generating world from {}...", worldgen);
            if let Err(e) = commands::generate(&params, radius) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }

        Commands::Run { worldgen, ticks } => {
            let config = load_config(&cli.config);
            cli::init_logging(&config);
            let params = load_params(&worldgen);

            if let Err(e) = commands::run_simulation(&config, &params, ticks).await {
                eprintln!("Simulation error: {}", e);
                std::process::exit(1);
            }
        }

        Commands::Inspect {
            worldgen,
            x,
            y,
            radius,
            json,
        } => {
            let config = load_config(&cli.config);
            cli::init_logging(&config);
            let params = load_params(&worldgen);

            if let Err(e) = commands::inspect(&config, &params, TilePos::new(x, y), radius, json) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    }
}
