use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use serde_json::json;
use tracing::info;

use universe_gen::presets::{load_config_file, load_presets_from_env};
use universe_gen::{
    generate_batch, FeatureKind, FileStore, GenerationConfig, StoreFormat, Universe,
    UniverseStore,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Generate and persist trading-game universes", long_about = None)]
struct Args {
    /// Preset id from the catalogue (see --list-presets)
    #[arg(long, conflicts_with = "config")]
    preset: Option<String>,

    /// Path to a JSON generation config
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the sector count
    #[arg(long)]
    sectors: Option<u32>,

    /// Override the seed; batches use consecutive seeds from here
    #[arg(long)]
    seed: Option<u64>,

    /// Number of universes to generate
    #[arg(long, default_value_t = 1)]
    count: u32,

    /// Output directory for persisted universes
    #[arg(long, default_value = "universes")]
    out: PathBuf,

    #[arg(long, value_enum, default_value_t = Format::Json)]
    format: Format,

    /// Generate and report without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Print the preset catalogue and exit
    #[arg(long)]
    list_presets: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Json,
    Bincode,
}

impl From<Format> for StoreFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Json => StoreFormat::Json,
            Format::Bincode => StoreFormat::Bincode,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let (presets, presets_path) = load_presets_from_env();

    if args.list_presets {
        for preset in presets.iter() {
            println!(
                "{:<10} {:>6} sectors  {}",
                preset.id, preset.config.sector_count, preset.name
            );
        }
        return Ok(());
    }

    let mut config = match (&args.preset, &args.config) {
        (Some(id), _) => presets
            .require(id)
            .with_context(|| match &presets_path {
                Some(path) => format!("Presets loaded from {}", path.display()),
                None => "Presets loaded from the built-in catalogue".to_string(),
            })?
            .config
            .clone(),
        (None, Some(path)) => load_config_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        (None, None) => GenerationConfig::default(),
    };
    if let Some(sectors) = args.sectors {
        config.sector_count = sectors;
    }
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }
    if args.count == 0 {
        bail!("--count must be at least 1");
    }

    let configs: Vec<GenerationConfig> = (0..args.count)
        .map(|offset| GenerationConfig {
            seed: config.seed.map(|seed| seed.wrapping_add(offset as u64)),
            ..config.clone()
        })
        .collect();

    let mut store = FileStore::new(&args.out, args.format.into());
    for (index, result) in generate_batch(&configs).into_iter().enumerate() {
        let universe =
            result.with_context(|| format!("Failed to generate universe {}", index + 1))?;
        if !args.dry_run {
            store
                .persist(&universe)
                .with_context(|| format!("Failed to persist universe {}", index + 1))?;
            info!(
                target: "universe_gen::store",
                path = %store.path_for(universe.fingerprint()).display(),
                "genesis.persisted"
            );
        }
        println!("{}", summary(&universe));
    }
    Ok(())
}

fn summary(universe: &Universe) -> serde_json::Value {
    json!({
        "fingerprint": format!("{:016x}", universe.fingerprint()),
        "seed": universe.seed(),
        "sectors": universe.sector_count(),
        "links": universe.links().len(),
        "average_degree": universe.average_degree(),
        "hub_stations": universe.count(FeatureKind::HubStation),
        "spawn_sites": universe.count(FeatureKind::SpawnSite),
        "ports": universe.count(FeatureKind::Port),
        "planets": universe.count(FeatureKind::Planet),
        "warnings": universe
            .warnings()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>(),
    })
}
