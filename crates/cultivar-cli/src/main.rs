mod display;
mod input;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use cultivar_ai::{ModelAdapter, process, shape};
use cultivar_client::PredictClient;
use cultivar_core::{BatchRequest, PredictMode, normalize};
use cultivar_serve::{DEFAULT_BIND, ServeConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cultivar", version, about = "Wine cultivar classifier")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load the model and serve the prediction API.
    Serve {
        /// Random-forest JSON export.
        #[arg(long, env = "CULTIVAR_MODEL", default_value = "models/wine_forest.json")]
        model: PathBuf,
        #[arg(long, env = "CULTIVAR_BIND", default_value = DEFAULT_BIND)]
        bind: SocketAddr,
    },
    /// Classify records from a JSON or Parquet file with a local model.
    Classify {
        /// JSON record, JSON list, `{"input": ..}` / `{"input_batch": [..]}`, or `.parquet`.
        input: PathBuf,
        #[arg(long, env = "CULTIVAR_MODEL", default_value = "models/wine_forest.json")]
        model: PathBuf,
        /// Include per-class probabilities.
        #[arg(long, short)]
        probabilities: bool,
        /// Print the response document as JSON instead of a table.
        #[arg(long)]
        json: bool,
        /// Also print the normalized feature matrix.
        #[arg(long)]
        show_features: bool,
    },
    /// Send records from a JSON file to a running server.
    Predict {
        input: PathBuf,
        #[arg(long, env = "CULTIVAR_URL", default_value = "http://localhost:8000")]
        url: String,
        #[arg(long, short)]
        probabilities: bool,
        #[arg(long)]
        json: bool,
    },
    /// Check that a server is up and report its model.
    Health {
        #[arg(long, env = "CULTIVAR_URL", default_value = "http://localhost:8000")]
        url: String,
    },
    /// Print the feature schema.
    Schema,
}

fn mode(probabilities: bool) -> PredictMode {
    if probabilities {
        PredictMode::WithProbabilities
    } else {
        PredictMode::Labels
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve { model, bind } => {
            tracing::info!("cultivar v{}", env!("CARGO_PKG_VERSION"));
            cultivar_serve::serve(ServeConfig {
                model_path: model,
                bind,
            })
            .await
            .context("prediction server failed")?;
        }
        Command::Classify {
            input,
            model,
            probabilities,
            json,
            show_features,
        } => {
            let adapter = ModelAdapter::load(&model).context("loading model")?;
            let payload = input::load(&input)?;

            if show_features {
                let request = BatchRequest::detect(&payload)?;
                let vectors: Vec<_> = request
                    .records()
                    .iter()
                    .filter_map(|r| normalize(r).ok())
                    .collect();
                println!("{}", display::render_features(&vectors)?);
            }

            let started = Instant::now();
            let outcome = process(&adapter, &payload, mode(probabilities))?;
            let doc = shape(&outcome, adapter.classes())?;
            let elapsed = started.elapsed();
            display::print_document(&doc, json)?;
            if !json {
                println!("{}", display::timing_line(elapsed, None));
            }
        }
        Command::Predict {
            input,
            url,
            probabilities,
            json,
        } => {
            let payload = input::load(&input)?;
            let client = PredictClient::new(url);
            let prediction = client
                .predict(&payload, mode(probabilities))
                .await
                .with_context(|| format!("requesting predictions from {}", client.base_url()))?;
            display::print_document(&prediction.document, json)?;
            if !json {
                println!(
                    "{}",
                    display::timing_line(prediction.elapsed, Some(prediction.calls))
                );
            }
        }
        Command::Health { url } => {
            let client = PredictClient::new(url);
            let health = client
                .health()
                .await
                .with_context(|| format!("backend at {} is offline", client.base_url()))?;
            display::print_health(&health);
        }
        Command::Schema => display::print_schema(),
    }

    Ok(())
}
