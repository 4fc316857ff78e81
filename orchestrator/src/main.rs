use anyhow::{Context, Result};
use clap::Parser;
use sentiment_orchestrator::{InferenceOrchestrator, OrchestratorConfig, RunError};
use std::process::ExitCode;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

mod output;

use output::{
    render, BatchPredictionResponse, ErrorResponse, FeaturesResponse, InfoResponse, PredictionResponse,
};

/// Score the sentiment of text given as arguments or one per line on stdin.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Texts to score. Read from stdin, one per line, when omitted.
    texts: Vec<String>,

    /// Score all texts as a single batch
    #[arg(long)]
    batch: bool,

    /// Print extracted text features instead of scoring
    #[arg(long)]
    features: bool,

    /// Print model and service information, then exit
    #[arg(long)]
    info: bool,

    /// Model name or path to a model config JSON
    #[arg(long)]
    model: Option<String>,

    /// Worker threads used for scoring
    #[arg(long)]
    workers: Option<usize>,

    /// Per-call inference timeout in seconds
    #[arg(long)]
    timeout_secs: Option<f64>,

    /// Maximum normalized text length in characters
    #[arg(long)]
    max_length: Option<usize>,

    /// Lowercase text during normalization
    #[arg(long)]
    lowercase: bool,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    match run(Args::parse()).await {
        Ok(code) => code,
        Err(e) => {
            error!("Fatal error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json")) {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn apply_overrides(mut config: OrchestratorConfig, args: &Args) -> Result<OrchestratorConfig> {
    if let Some(model) = &args.model {
        config.model_name = model.clone();
    }
    if let Some(workers) = args.workers {
        config.worker_pool_size = workers;
    }
    if let Some(secs) = args.timeout_secs {
        anyhow::ensure!(secs.is_finite() && secs > 0.0, "--timeout-secs must be positive");
        config.per_call_timeout = Duration::try_from_secs_f64(secs).context("invalid --timeout-secs")?;
    }
    if let Some(max_length) = args.max_length {
        config.max_sequence_length = max_length;
    }
    if args.lowercase {
        config.lowercase = true;
    }
    Ok(config)
}

async fn read_stdin_lines() -> Result<Vec<String>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut texts = Vec::new();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        if !line.trim().is_empty() {
            texts.push(line);
        }
    }
    Ok(texts)
}

async fn run(args: Args) -> Result<ExitCode> {
    let config = OrchestratorConfig::from_env().context("failed to load configuration")?;
    let config = apply_overrides(config, &args)?;
    let model_name = config.model_name.clone();
    let max_length = config.max_sequence_length;

    let orchestrator = InferenceOrchestrator::new(config);

    if args.features {
        let texts = if args.texts.is_empty() { read_stdin_lines().await? } else { args.texts.clone() };
        for text in &texts {
            let response = FeaturesResponse::new(text, orchestrator.extract_features(text));
            println!("{}", render(&response, args.pretty)?);
        }
        return Ok(ExitCode::SUCCESS);
    }

    orchestrator
        .initialize(&model_name, max_length)
        .await
        .context("failed to initialize inference service")?;

    let code = if args.info {
        let response = InfoResponse {
            timestamp: chrono::Utc::now(),
            info: orchestrator.model_info(),
        };
        println!("{}", render(&response, args.pretty)?);
        ExitCode::SUCCESS
    } else {
        let texts = if args.texts.is_empty() { read_stdin_lines().await? } else { args.texts.clone() };
        info!("Scoring {} text(s)", texts.len());
        score_texts(&orchestrator, &texts, args.batch, args.pretty).await?
    };

    orchestrator.cleanup().await;
    Ok(code)
}

async fn score_texts(
    orchestrator: &InferenceOrchestrator,
    texts: &[String],
    batch: bool,
    pretty: bool,
) -> Result<ExitCode> {
    let model = orchestrator.model_info().model_name;

    if batch {
        return Ok(match orchestrator.run_batch(texts).await {
            Ok(records) => {
                println!("{}", render(&BatchPredictionResponse::new(&model, texts, records), pretty)?);
                ExitCode::SUCCESS
            }
            Err(e) => report(&e, pretty)?,
        });
    }

    let mut code = ExitCode::SUCCESS;
    for text in texts {
        match orchestrator.run(text).await {
            Ok(record) => println!("{}", render(&PredictionResponse::new(&model, text, record), pretty)?),
            Err(e) => code = report(&e, pretty)?,
        }
    }
    Ok(code)
}

fn report(error: &RunError, pretty: bool) -> Result<ExitCode> {
    error!("Inference failed: {}", error);
    println!("{}", render(&ErrorResponse::from_run_error(error), pretty)?);
    Ok(ExitCode::FAILURE)
}
