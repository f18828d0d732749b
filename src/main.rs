//! housing-predictor - train price models and score listings from the shell.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use housing_predictor::dataset::load_table;
use housing_predictor::{pipeline, FormOptions, PipelineConfig, PricePredictor, RawRecord, RawValue};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Housing price prediction
#[derive(Parser, Debug)]
#[command(name = "housing-predictor", version)]
#[command(after_help = "\
Examples:
  housing-predictor train HouseData2.csv -o model.bin
  housing-predictor predict model.bin -m \"neural network\" -f ilce=Kadıköy -f metrekare=120
  housing-predictor options HouseData2.csv")]
struct Cli {
    /// Pipeline configuration (TOML); defaults apply when omitted
    #[arg(long, short = 'c', global = true, env = "HOUSING_PREDICTOR_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Train every model family on a listing table and write the artifact
    Train {
        /// Listing table (CSV or workbook, header in the first row)
        data: PathBuf,

        /// Where to write the trained artifact
        #[arg(long, short = 'o', default_value = "model.bin")]
        output: PathBuf,
    },

    /// Predict the price of one listing
    Predict {
        /// Artifact written by `train`
        artifact: PathBuf,

        /// Model label or alias ("decision tree", "SVR", ...); all models when omitted
        #[arg(long, short = 'm')]
        model: Option<String>,

        /// Listing field as name=value (repeatable)
        #[arg(long = "field", short = 'f', value_parser = parse_field)]
        fields: Vec<(String, String)>,
    },

    /// Print the input options of every designated field as JSON
    Options {
        /// Listing table (CSV or workbook, header in the first row)
        data: PathBuf,
    },
}

fn parse_field(s: &str) -> std::result::Result<(String, String), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("'{}' is not of the form name=value", s))?;
    if name.trim().is_empty() {
        return Err(format!("'{}' has an empty field name", s));
    }
    Ok((name.to_string(), value.to_string()))
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Train { data, output } => {
            let artifact = pipeline::train_and_save(&data, &output, &config)
                .with_context(|| format!("training on {} failed", data.display()))?;
            println!("{:<28} {:>8} {:>14} {:>14}", "model", "R²", "RMSE", "MAE");
            for (family, m) in artifact.all_metrics() {
                println!(
                    "{:<28} {:>8.4} {:>14.0} {:>14.0}",
                    family.label(),
                    m.r_squared,
                    m.rmse,
                    m.mae
                );
            }
            info!("Artifact written to {}", output.display());
        }
        Commands::Predict {
            artifact,
            model,
            fields,
        } => {
            if fields.is_empty() {
                bail!("no listing fields given; pass them with --field name=value");
            }
            let predictor = PricePredictor::from_file(&artifact)
                .with_context(|| format!("failed to load artifact {}", artifact.display()))?;
            let record: RawRecord = fields
                .iter()
                .map(|(name, value)| (name.as_str(), RawValue::parse_cell(value)))
                .collect();

            let predictions = match model {
                Some(label) => vec![predictor.predict(&record, &label)?],
                None => predictor.predict_all(&record)?,
            };
            println!("{}", serde_json::to_string_pretty(&predictions)?);
        }
        Commands::Options { data } => {
            let table = load_table(&data)?;
            let options = FormOptions::from_table(&table, &config);
            println!("{}", serde_json::to_string_pretty(&options)?);
        }
    }

    Ok(())
}
