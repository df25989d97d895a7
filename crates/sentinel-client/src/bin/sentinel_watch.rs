//! Run one analysis job from the command line and follow its progress.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sentinel_client::models::{Feature, JobSnapshot, JobStatus, ResultSummary};
use sentinel_client::{ClientConfig, HttpEngine, JobSession, UploadCandidate};

#[derive(Debug, Parser)]
#[command(name = "sentinel-watch", about = "Upload a video and follow its analysis")]
struct Args {
    /// Analysis to run: mask, people_count or plate
    feature: Feature,

    /// Video file to upload
    video: PathBuf,

    /// Base URL of the analysis engine
    #[arg(long, env = "SENTINEL_ENGINE_URL")]
    engine_url: Option<String>,

    /// Print every snapshot as a JSON line
    #[arg(long)]
    json: bool,

    /// Only check that the engine is reachable
    #[arg(long)]
    health: bool,
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sentinel=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(false))
            .with(env_filter)
            .init();
    }
}

fn print_snapshot(snapshot: &JobSnapshot, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(snapshot)?);
        return Ok(());
    }

    let detail = match &snapshot.summary {
        ResultSummary::PeopleCount(s) => {
            format!("entering={} exiting={} total={}", s.entering, s.exiting, s.total)
        }
        ResultSummary::Mask(s) => format!(
            "people={} with_mask={} without_mask={}",
            s.total_people, s.with_mask, s.without_mask
        ),
        ResultSummary::Plate(s) => {
            let texts: Vec<&str> = s.plates.iter().map(|p| p.text.as_str()).collect();
            format!("plates={} [{}]", s.total_plates, texts.join(", "))
        }
    };

    println!(
        "[{}] {:<10} {:>3}% {}{}",
        snapshot.updated_at.format("%H:%M:%S"),
        snapshot.status.as_str(),
        snapshot.progress_hint,
        detail,
        snapshot
            .error
            .as_deref()
            .map(|e| format!(" ({})", e))
            .unwrap_or_default()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let args = Args::parse();

    let mut config = ClientConfig::from_env();
    if let Some(url) = args.engine_url.clone() {
        config = config.with_base_url(url);
    }
    config.validate()?;

    if args.health {
        let engine = HttpEngine::new(&config)?;
        let healthy = engine.health_check().await?;
        println!("{}: {}", config.base_url, if healthy { "healthy" } else { "unreachable" });
        if !healthy {
            bail!("engine at {} is not healthy", config.base_url);
        }
        return Ok(());
    }

    let session = JobSession::connect(args.feature, &config)?;
    info!("Session {} running {}", session.id(), args.feature.display_name());

    let candidate = UploadCandidate::from_path(&args.video)
        .await
        .with_context(|| format!("cannot read {}", args.video.display()))?;
    session.select_file(Some(candidate))?;

    let mut rx = session.subscribe();
    session.start().await?;

    let outcome = loop {
        let snapshot = rx.borrow_and_update().clone();
        print_snapshot(&snapshot, args.json)?;
        if snapshot.is_terminal() {
            break snapshot;
        }

        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break session.snapshot();
                }
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted, stopping job");
                session.stop().await;
            }
        }
    };

    session.shutdown().await;

    match outcome.status {
        JobStatus::Complete | JobStatus::Stopped => Ok(()),
        status => bail!(
            "job ended {}: {}",
            status,
            outcome.error.unwrap_or_else(|| "no error reported".to_string())
        ),
    }
}
