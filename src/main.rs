use anyhow::{Context, Result};
use clap::Parser;
use collapse_core::{load_tileset, solve_with_retries, RngKind, RunConfig, Ruleset, Solution, StdRandom};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Fill a grid from a tileset with Wave Function Collapse.
#[derive(Debug, Parser)]
#[command(name = "tile_collapse", version)]
struct Args {
    /// Tileset XML file
    tileset: PathBuf,

    /// JSON run configuration; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    width: Option<usize>,

    #[arg(long)]
    height: Option<usize>,

    /// Seed for the generator that hands out per-attempt seeds
    #[arg(long, allow_negative_numbers = true)]
    seed: Option<i32>,

    /// Number of seeds to try before giving up
    #[arg(long)]
    tries: Option<usize>,

    /// Abandon an attempt after this many observations
    #[arg(long)]
    max_observations: Option<usize>,

    /// Generator for each attempt: std or dotnet
    #[arg(long)]
    rng: Option<RngKind>,

    /// Wrap the grid around its edges
    #[arg(long)]
    periodic: bool,

    /// Print the solution as JSON instead of tile names
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = resolve_config(&args)?;

    let rules = load_tileset(&args.tileset)
        .with_context(|| format!("loading tileset {}", args.tileset.display()))?;
    tracing::info!(
        tiles = rules.len(),
        width = config.grid.width,
        height = config.grid.height,
        "tileset loaded"
    );

    let mut seeds = StdRandom::from_seed(config.seed);
    let solution = solve_with_retries(&config.grid, &rules, &config.retry, &mut seeds)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&solution)?);
    } else {
        print_grid(&solution, &rules);
    }

    Ok(())
}

fn resolve_config(args: &Args) -> Result<RunConfig> {
    let mut config = match &args.config {
        Some(path) => RunConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => RunConfig::default(),
    };

    if let Some(width) = args.width {
        config.grid.width = width;
    }
    if let Some(height) = args.height {
        config.grid.height = height;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(tries) = args.tries {
        config.retry.tries = tries;
    }
    if args.max_observations.is_some() {
        config.retry.max_observations = args.max_observations;
    }
    if let Some(rng) = args.rng {
        config.retry.rng = rng;
    }
    if args.periodic {
        config.grid.periodic = true;
    }

    Ok(config)
}

fn print_grid(solution: &Solution, rules: &Ruleset) {
    let names: Vec<&str> = rules.tiles().iter().map(|t| t.name.as_str()).collect();
    let cell_width = names.iter().map(|n| n.len()).max().unwrap_or(1);

    for row in solution.rows() {
        let line: Vec<String> = row
            .iter()
            .map(|&t| format!("{:<width$}", names[t], width = cell_width))
            .collect();
        println!("{}", line.join(" ").trim_end());
    }
}
