use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use axum_prometheus::PrometheusMetricLayer;
use clap::{Args, Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusHandle;
use segment_ai::api::{segment_router, ApiState};
use segment_ai::config::AppConfig;
use segment_ai::error::AppError;
use segment_ai::history::{PredictionLog, PredictionRecord};
use segment_ai::model::ModelArtifacts;
use segment_ai::scoring::{BatchScorer, FeatureVector, ScoredPrediction, ScoringEngine};
use segment_ai::telemetry;
use serde_json::json;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
struct InfraState {
    readiness: Arc<AtomicBool>,
    metrics: PrometheusHandle,
}

#[derive(Parser, Debug)]
#[command(
    name = "Customer Segmentation Scorer",
    about = "Score customers into behavioral segments from the command line or over HTTP",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Score a single customer and record the prediction
    Score(ScoreArgs),
    /// Score every row of a CSV table and emit the augmented table
    Batch(BatchArgs),
    /// Print the recorded prediction history
    History,
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    port: Option<u16>,
}

#[derive(Args, Debug)]
struct ScoreArgs {
    /// Monthly revenue for the customer
    #[arg(long)]
    monthly_revenue: Option<f64>,
    /// Lifetime revenue for the customer
    #[arg(long)]
    total_revenue: Option<f64>,
    /// Months since the customer signed up
    #[arg(long)]
    tenure_months: Option<u32>,
    /// Average monthly product usage
    #[arg(long)]
    avg_monthly_usage: Option<f64>,
    /// Open support tickets
    #[arg(long)]
    support_tickets: Option<u32>,
    /// Days since the customer was last active
    #[arg(long)]
    last_active_days: Option<u32>,
    /// Use the built-in example customer instead of the feature flags
    #[arg(long)]
    sample: bool,
    /// Compute the prediction without recording it
    #[arg(long)]
    no_log: bool,
}

impl ScoreArgs {
    fn features(&self) -> Result<FeatureVector, AppError> {
        if self.sample {
            return Ok(FeatureVector::sample());
        }

        match (
            self.monthly_revenue,
            self.total_revenue,
            self.tenure_months,
            self.avg_monthly_usage,
            self.support_tickets,
            self.last_active_days,
        ) {
            (
                Some(monthly_revenue),
                Some(total_revenue),
                Some(tenure_months),
                Some(avg_monthly_usage),
                Some(support_tickets),
                Some(last_active_days),
            ) => Ok(FeatureVector {
                monthly_revenue,
                total_revenue,
                tenure_months,
                avg_monthly_usage,
                support_tickets,
                last_active_days,
            }),
            _ => Err(AppError::InvalidArguments(
                "provide all six feature flags or use --sample".to_string(),
            )),
        }
    }
}

#[derive(Args, Debug)]
struct BatchArgs {
    /// CSV table with at least the six canonical feature columns
    #[arg(long)]
    input: PathBuf,
    /// Where to write the augmented table (stdout when omitted)
    #[arg(long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run_cli().await {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => run_server(args).await,
        Command::Score(args) => run_score(args),
        Command::Batch(args) => run_batch(args),
        Command::History => run_history(),
    }
}

fn build_engine(config: &AppConfig) -> Result<ScoringEngine, AppError> {
    let artifacts = ModelArtifacts::load(&config.model)?;
    Ok(ScoringEngine::new(artifacts)?)
}

async fn run_server(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let engine = Arc::new(build_engine(&config)?);
    let history = Arc::new(PredictionLog::new(config.history.log_path.clone()));

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let infra = InfraState {
        readiness: readiness_flag.clone(),
        metrics: prometheus_handle,
    };

    let app = Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .with_state(infra)
        .merge(segment_router(ApiState {
            engine: engine.clone(),
            history,
        }))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        segments = engine.segment_count(),
        "segmentation scorer ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}

fn run_score(args: ScoreArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let features = args.features()?;
    let engine = build_engine(&config)?;

    let prediction = engine.score(&features)?;
    render_prediction(&prediction, args.sample);

    if args.no_log {
        println!("\nPrediction not recorded (--no-log).");
        return Ok(());
    }

    let history = PredictionLog::new(config.history.log_path);
    match history.append(&PredictionRecord::from(&prediction)) {
        Ok(()) => {
            println!("\nPrediction saved to {}", history.path().display());
            Ok(())
        }
        Err(error) => {
            eprintln!("\nPrediction computed but NOT recorded: {error}");
            Err(error.into())
        }
    }
}

fn run_batch(args: BatchArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let engine = build_engine(&config)?;
    let scorer = BatchScorer::new(&engine);

    let report = scorer.from_path(&args.input)?;

    match &args.output {
        Some(path) => {
            let file = std::fs::File::create(path)?;
            report.write_csv(file)?;
            println!(
                "Scored {} row(s) into {}",
                report.rows.len(),
                path.display()
            );
        }
        None => {
            print!("{}", report.to_csv_string()?);
        }
    }

    if !report.failures.is_empty() {
        eprintln!("\n{} row(s) failed:", report.failures.len());
        for failure in &report.failures {
            eprintln!("- row {}: {}", failure.row_number, failure.reason);
        }
    }

    Ok(())
}

fn run_history() -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let history = PredictionLog::new(config.history.log_path);
    let records = history.read()?;

    if records.is_empty() {
        println!("No predictions recorded yet.");
        return Ok(());
    }

    println!("{} recorded prediction(s)\n", records.len());
    for (index, record) in records.iter().enumerate() {
        println!(
            "{:>4}. segment {} at {:.2}% | revenue {:.2}/mo, {:.2} total | tenure {} mo | usage {:.1} | tickets {} | last active {} day(s) ago",
            index + 1,
            record.predicted_cluster,
            record.confidence,
            record.monthly_revenue,
            record.total_revenue,
            record.tenure_months,
            record.avg_monthly_usage,
            record.support_tickets,
            record.last_active_days
        );
    }

    Ok(())
}

fn render_prediction(prediction: &ScoredPrediction, from_sample: bool) {
    if from_sample {
        println!("Input: built-in example customer");
    }

    println!("Segment: {} - {}", prediction.segment_id(), prediction.persona.label);
    println!("Confidence: {:.2}%", prediction.rounded_confidence());
    println!("Recommended strategy: {}", prediction.persona.recommendation);
    println!("Color tag: {}", prediction.persona.color_tag);

    if prediction.persona.insights.is_empty() {
        println!("Insights: none");
    } else {
        println!("Insights:");
        for insight in &prediction.persona.insights {
            println!("- {insight}");
        }
    }
}

async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn readiness_endpoint(State(state): State<InfraState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

async fn metrics_endpoint(State(state): State<InfraState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
