//! oxide-template CLI
//!
//! Renders a JSON-described SQL template against JSON parameters.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use regex::Regex;
use tracing::{Level, debug, info};
use tracing_subscriber::FmtSubscriber;

use oxide_template::{
    DynamicContext, DynamicSqlSource, NodeDef, PathEvaluator, SqlContext, SqlNode, ToValue, Value,
};

/// Dynamic SQL templates with bound parameters.
#[derive(Parser)]
#[command(name = "oxide-template")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Template definition (JSON node tree).
    #[arg(short, long, env = "OXIDE_TEMPLATE")]
    template: PathBuf,

    /// Parameter object (JSON). The parameter is null when omitted.
    #[arg(short, long, env = "OXIDE_PARAMS")]
    params: Option<PathBuf>,

    /// Regex every `${}` substitution must match.
    #[arg(long)]
    injection_filter: Option<String>,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Expand the template and bind its placeholders.
    Render {
        /// Database id published to the template as `_databaseId`.
        #[arg(short, long)]
        database_id: Option<String>,

        /// Collapse whitespace runs in the generated SQL.
        #[arg(long)]
        shrink_whitespace: bool,

        /// Print the SQL, mappings and values as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Expand the template, leaving `#{}` placeholders in place.
    Expand,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    println!("{}", run(&cli)?);
    Ok(())
}

fn run(cli: &Cli) -> anyhow::Result<String> {
    let root = load_template(&cli.template, cli.injection_filter.as_deref())?;
    let params = match &cli.params {
        Some(path) => load_params(path)?,
        None => Value::Null,
    };
    let engine = PathEvaluator::new();

    match &cli.command {
        Commands::Render {
            database_id,
            shrink_whitespace,
            json,
        } => {
            let mut source = DynamicSqlSource::boxed(root).with_shrink_whitespace(*shrink_whitespace);
            if let Some(database_id) = database_id {
                source = source.with_database_id(database_id.clone());
            }
            let bound = source.bound_sql(params, &engine)?;
            info!("Bound {} parameter(s).", bound.parameters.len());

            if *json {
                return Ok(serde_json::to_string_pretty(&bound)?);
            }
            let mut out = bound.sql;
            for (i, (mapping, value)) in bound.mappings.iter().zip(&bound.parameters).enumerate() {
                let name = mapping
                    .property
                    .as_deref()
                    .or(mapping.expression.as_deref())
                    .unwrap_or_default();
                out.push_str(&format!("\n-- {}: {name} = {value}", i + 1));
            }
            Ok(out)
        }

        Commands::Expand => {
            let mut ctx = DynamicContext::new(params, &engine);
            root.apply(&mut ctx)?;
            Ok(ctx.sql().to_string())
        }
    }
}

fn load_template(path: &Path, injection_filter: Option<&str>) -> anyhow::Result<Box<dyn SqlNode>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read template {}", path.display()))?;
    let def: NodeDef = serde_json::from_str(&text)
        .with_context(|| format!("invalid template {}", path.display()))?;
    debug!("Loaded template from {}", path.display());

    Ok(match injection_filter {
        Some(pattern) => {
            let filter = Regex::new(pattern).context("invalid injection filter")?;
            def.into_filtered_node(&filter)
        }
        None => def.into_node(),
    })
}

fn load_params(path: &Path) -> anyhow::Result<Value> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read parameters {}", path.display()))?;
    let json: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("invalid parameters {}", path.display()))?;
    Ok(json.to_value())
}
