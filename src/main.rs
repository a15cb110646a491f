use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use nutripanel::PanelModel;

/// Build analysis-ready nutrition, population and obesity tables from raw
/// food-balance and health-indicator exports.
#[derive(Parser, Debug)]
#[command(name = "nutripanel", version, about)]
struct Args {
    /// Directory containing the raw food-balance-sheet CSV exports
    #[arg(long, default_value = "data/raw/FoodBalanceSheet_data")]
    raw_dir: PathBuf,

    /// Raw health-indicator CSV export
    #[arg(long, default_value = "data/raw/data.csv")]
    health_file: PathBuf,

    /// Directory the cleaned snapshots are written to
    #[arg(long, default_value = "data/processed/cleaned")]
    out_dir: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    info!("reading raw corpus from {}", args.raw_dir.display());

    let mut model = PanelModel::new(&args.raw_dir);
    let outputs = model.run(&args.health_file, &args.out_dir)?;

    info!(
        "wrote {} population, {} nutrient, {} mapping and {} obesity rows to {}",
        outputs.population.height(),
        outputs.nutrients.height(),
        outputs.food_groups.height(),
        outputs.obesity.height(),
        args.out_dir.display()
    );
    Ok(())
}
