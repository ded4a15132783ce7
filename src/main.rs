use anyhow::Context;
use clap::{Parser, Subcommand};
use idmatch::{BatchSummary, ClassifierKind, IdentityRecord, MatchConfig, MatchEngine, RestApi};
use serde::Deserialize;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Rule-based and learned identity matching
#[derive(Parser, Debug)]
#[command(name = "idmatch")]
#[command(about = "Decide whether two identity records describe the same person", long_about = None)]
struct Args {
    /// JSON match configuration (weights, thresholds, training parameters)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train a model on synthetic data and print its evaluation
    Train {
        /// Number of synthetic record pairs
        #[arg(long)]
        samples: Option<usize>,

        /// random_forest or logistic_regression
        #[arg(long)]
        classifier: Option<String>,

        /// Where to write the trained model
        #[arg(long)]
        save_model: Option<PathBuf>,
    },
    /// Compare two records given as JSON objects
    Compare {
        #[arg(long)]
        record1: String,

        #[arg(long)]
        record2: String,

        #[arg(long)]
        model: Option<PathBuf>,
    },
    /// Compare every {"record1": .., "record2": ..} line of a JSONL file
    Batch {
        #[arg(long)]
        input: PathBuf,

        #[arg(long)]
        model: Option<PathBuf>,
    },
    /// Compare a built-in example pair
    Demo {
        #[arg(long)]
        model: Option<PathBuf>,
    },
    /// Serve the REST API
    Serve {
        /// HTTP API port
        #[arg(long, default_value_t = 8080)]
        http_port: u16,

        #[arg(long)]
        model: Option<PathBuf>,
    },
}

#[derive(Deserialize)]
struct PairLine {
    record1: IdentityRecord,
    record2: IdentityRecord,
}

fn load_config(path: Option<&Path>) -> anyhow::Result<MatchConfig> {
    match path {
        Some(path) => MatchConfig::from_path(path)
            .with_context(|| format!("failed to load configuration from {:?}", path)),
        None => Ok(MatchConfig::default()),
    }
}

fn parse_record(json: &str, which: &str) -> anyhow::Result<IdentityRecord> {
    serde_json::from_str(json).with_context(|| format!("{} is not a valid record: {}", which, json))
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn demo_pair() -> (IdentityRecord, IdentityRecord) {
    (
        IdentityRecord::new()
            .with_name("John Michael Doe")
            .with_email("john.doe@gmail.com")
            .with_phone("555-123-4567")
            .with_address("123 Main Street, Anytown, USA"),
        IdentityRecord::new()
            .with_name("John Doe")
            .with_email("johndoe123@gmail.com")
            .with_phone("5551234567")
            .with_address("123 Main St, Anytown, USA"),
    )
}

fn run_batch(engine: &MatchEngine, input: &Path) -> anyhow::Result<()> {
    let file = std::fs::File::open(input).with_context(|| format!("cannot open {:?}", input))?;

    let mut pairs = Vec::new();
    for (number, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let pair: PairLine = serde_json::from_str(&line)
            .with_context(|| format!("{:?} line {}: invalid pair", input, number + 1))?;
        pairs.push((pair.record1, pair.record2));
    }
    info!("Comparing {} pairs from {:?}", pairs.len(), input);

    let reports = engine.compare_batch(&pairs);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for report in &reports {
        writeln!(out, "{}", serde_json::to_string(report)?)?;
    }

    let summary = BatchSummary::from_reports(&reports);
    info!(
        "Batch complete: {} pairs, {} rule-based matches, {} ML matches, {} agreements, {} ML failures",
        summary.total, summary.rule_matches, summary.ml_matches, summary.agreements, summary.ml_failures
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so stdout stays machine readable
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = load_config(args.config.as_deref())?;

    match args.command {
        Command::Train {
            samples,
            classifier,
            save_model,
        } => {
            if let Some(samples) = samples {
                config.training_sample_count = samples;
            }
            if let Some(classifier) = classifier {
                let kind: ClassifierKind = classifier.parse()?;
                config.classifier = kind.as_str().to_string();
            }

            let engine = MatchEngine::new(Arc::new(config))?;
            let report = engine.train()?;
            print_json(&report)?;

            if let Some(path) = save_model {
                engine.save_model(&path)?;
            }
        }
        Command::Compare {
            record1,
            record2,
            model,
        } => {
            let record1 = parse_record(&record1, "record1")?;
            let record2 = parse_record(&record2, "record2")?;
            let engine = MatchEngine::open(Arc::new(config), model.as_deref())?;
            print_json(&engine.compare_records(&record1, &record2))?;
        }
        Command::Batch { input, model } => {
            let engine = MatchEngine::open(Arc::new(config), model.as_deref())?;
            run_batch(&engine, &input)?;
        }
        Command::Demo { model } => {
            let engine = MatchEngine::open(Arc::new(config), model.as_deref())?;
            let (record1, record2) = demo_pair();
            print_json(&serde_json::json!({
                "record1": record1,
                "record2": record2,
                "results": engine.compare_records(&record1, &record2),
            }))?;
        }
        Command::Serve { http_port, model } => {
            info!("Starting idmatch v{}", env!("CARGO_PKG_VERSION"));
            let engine = Arc::new(MatchEngine::open(Arc::new(config), model.as_deref())?);

            let http_handle = std::thread::spawn(move || {
                info!("Starting HTTP server on port {}", http_port);
                let sys = actix_web::rt::System::new();
                sys.block_on(async {
                    if let Err(e) = RestApi::start(engine, http_port).await {
                        tracing::error!("HTTP server error: {}", e);
                    }
                })
            });

            info!("HTTP API: http://localhost:{}/", http_port);

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received");
                }
                _ = tokio::task::spawn_blocking(move || {
                    http_handle.join().ok();
                }) => {
                    info!("HTTP server stopped");
                }
            }

            info!("Shutting down...");
        }
    }

    Ok(())
}
