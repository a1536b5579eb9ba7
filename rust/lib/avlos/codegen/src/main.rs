//! `avlos`: compile a device schema into embedded C dispatchers.
//!
//! Usage:
//!   avlos <spec_path> [--config <path>] [--include-root-name] [--no-format]

mod config;

use std::path::PathBuf;

use anyhow::{Context, Result};
use avlos_codegen_lib::{
    formatting::DEFAULT_STYLE, generate, CGenerator, Codegen, GenerateOptions, RstGenerator,
};
use avlos_parser::{build_tree, BuildOptions};
use clap::Parser;
use tracing::{info, warn};

use config::{load_document, AvlosConfig};

#[derive(Parser, Debug)]
#[command(name = "avlos", version)]
#[command(about = "Generate embedded C dispatchers from an Avlos device schema")]
struct Args {
    /// Device schema (YAML or JSON)
    spec_path: PathBuf,

    /// Avlos config file
    #[arg(short, long, default_value = "./avlos_config.yaml")]
    config: PathBuf,

    /// Prefix generated identifiers with the root node's name
    #[arg(long)]
    include_root_name: bool,

    /// Skip the clang-format pass
    #[arg(long)]
    no_format: bool,

    /// clang-format style
    #[arg(long, default_value = DEFAULT_STYLE)]
    style: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let written = run(&args)?;
    info!("wrote {} file(s)", written.len());
    Ok(())
}

fn run(args: &Args) -> Result<Vec<PathBuf>> {
    info!("Reading schema: {}", args.spec_path.display());
    let doc = load_document(&args.spec_path)?;
    let tree = build_tree(
        &doc,
        BuildOptions {
            include_root_name: args.include_root_name,
        },
    )
    .with_context(|| format!("building {}", args.spec_path.display()))?;
    info!(
        "Built tree with {} endpoints, hash {}",
        tree.endpoints().len(),
        tree.hash_string()
    );

    let config = AvlosConfig::load(&args.config)?;
    let generators = enabled_generators(&config);
    if generators.is_empty() {
        warn!("no generators enabled in {}", args.config.display());
        return Ok(Vec::new());
    }
    let refs: Vec<&dyn Codegen> = generators.iter().map(|g| g.as_ref()).collect();

    let options = GenerateOptions {
        format: !args.no_format,
        style: args.style.clone(),
    };
    Ok(generate(&tree, &refs, &options)?)
}

fn enabled_generators(config: &AvlosConfig) -> Vec<Box<dyn Codegen>> {
    let mut generators: Vec<Box<dyn Codegen>> = Vec::new();
    if let Some(c) = config.generators.generator_c.as_ref().filter(|c| c.enabled) {
        generators.push(Box::new(CGenerator::new(c.generator.clone())));
    }
    if let Some(rst) = config.generators.generator_rst.as_ref().filter(|r| r.enabled) {
        generators.push(Box::new(RstGenerator {
            config: rst.paths.clone(),
        }));
    }
    generators
}
