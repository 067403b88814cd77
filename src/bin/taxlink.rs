use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use taxlink::{
    Canonicalizer, Compendium, Config, LinkageBuilder, RuleCategory, RuleLibrary,
    TransformationEngine,
};

/// Build a single-hop transformation linkage graph over a compendium.
#[derive(Debug, Parser)]
#[command(name = "taxlink", version, about)]
struct Cli {
    /// TOML configuration file. Falls back to $TAXLINK_CONFIG.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Compendium of structures (CSV with a SMILES column, or one per line).
    #[arg(long)]
    compendium: Option<PathBuf>,

    /// Name of the structure column in a CSV compendium.
    #[arg(long)]
    column: Option<String>,

    /// Biological rule library.
    #[arg(long)]
    biological: Option<PathBuf>,

    /// Chemical rule library.
    #[arg(long)]
    chemical: Option<PathBuf>,

    #[arg(short, long)]
    out_dir: Option<PathBuf>,

    /// Worker threads, 0 for a sequential build.
    #[arg(short, long)]
    workers: Option<usize>,

    /// Identity key characters compared when matching products.
    #[arg(long)]
    key_length: Option<usize>,

    /// Products kept per rule application.
    #[arg(long)]
    max_products: Option<usize>,

    /// Also write the build report as JSON to this path.
    #[arg(long)]
    report: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn apply(self, config: &mut Config) -> Option<PathBuf> {
        if let Some(path) = self.compendium {
            config.compendium.path = Some(path);
        }
        if let Some(column) = self.column {
            config.compendium.smiles_column = column;
        }
        if let Some(path) = self.biological {
            config.rules.biological = Some(path);
        }
        if let Some(path) = self.chemical {
            config.rules.chemical = Some(path);
        }
        if let Some(dir) = self.out_dir {
            config.output.dir = dir;
        }
        if let Some(workers) = self.workers {
            config.execution.workers = workers;
        }
        if let Some(length) = self.key_length {
            config.matching.identity_key_length = length;
        }
        if let Some(max) = self.max_products {
            config.matching.max_products = max;
        }
        self.report
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "taxlink=debug,info" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    let report_path = cli.apply(&mut config);
    config.validate()?;

    let canonicalizer = Canonicalizer::new(config.matching.identity_key_length);
    let engine = TransformationEngine::new(config.matching.max_products);

    // validate() guarantees both paths are present
    let (Some(compendium_path), Some(biological_path)) =
        (&config.compendium.path, &config.rules.biological)
    else {
        anyhow::bail!("configuration is missing a compendium or biological rule library");
    };

    let compendium = Compendium::load(compendium_path, &config.compendium.smiles_column, &canonicalizer)
        .with_context(|| format!("loading compendium {}", compendium_path.display()))?;
    if compendium.is_empty() {
        warn!("compendium has no usable structures");
    }

    let biological = RuleLibrary::load(biological_path, RuleCategory::Biological)
        .with_context(|| format!("loading biological rules {}", biological_path.display()))?;
    let chemical = config
        .rules
        .chemical
        .as_ref()
        .map(|path| {
            RuleLibrary::load(path, RuleCategory::Chemical)
                .with_context(|| format!("loading chemical rules {}", path.display()))
        })
        .transpose()?;

    let output = LinkageBuilder::new(canonicalizer, engine)
        .with_execution(config.execution.execution())
        .build(&compendium, &biological, chemical.as_ref())?;

    let files = output
        .persist(&config.output.dir, &config.output.names())
        .with_context(|| format!("writing outputs to {}", config.output.dir.display()))?;
    if let Some(path) = report_path {
        output
            .write_report(&path)
            .with_context(|| format!("writing report {}", path.display()))?;
    }

    info!(
        adjacency = %files.adjacency.display(),
        edges = %files.edges.display(),
        structures = %files.structures.display(),
        "done"
    );
    println!(
        "{} molecules, {} links ({} edges), {} without products",
        output.report.molecules, output.report.links, output.report.edges, output.report.without_products
    );
    Ok(())
}
