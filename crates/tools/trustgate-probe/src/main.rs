use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};
use trustgate_service::{metrics, CompositeTrustService};
use trustgate_transport::HttpTransport;
use trustgate_types::{AggregateHealth, TrustConfig, TrustDecision, TrustSource};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Path to the trustgate configuration file; built-in defaults when omitted.
    #[clap(short, long, value_parser)]
    config: Option<PathBuf>,

    /// Issuer (provider name, certificate subject or federation entity id) to validate.
    #[clap(long)]
    issuer: Option<String>,

    /// Verifier client id to validate.
    #[clap(long)]
    verifier: Option<String>,

    /// Trust source to switch off before refreshing.
    #[clap(long, value_enum)]
    disable: Vec<SourceArg>,

    /// Print the Prometheus metrics after the report.
    #[clap(long)]
    metrics: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum SourceArg {
    TrustList,
    Federation,
}

impl From<SourceArg> for TrustSource {
    fn from(arg: SourceArg) -> Self {
        match arg {
            SourceArg::TrustList => TrustSource::EtsiTrustList,
            SourceArg::Federation => TrustSource::OpenidFederation,
        }
    }
}

#[derive(Serialize)]
struct Report {
    status: AggregateHealth,
    #[serde(skip_serializing_if = "Option::is_none")]
    issuer: Option<TrustDecision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    verifier: Option<TrustDecision>,
}

fn load_config(path: Option<&PathBuf>) -> Result<TrustConfig> {
    match path {
        Some(path) => TrustConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration file: {:?}", path)),
        None => Ok(TrustConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(args.config.as_ref())?;

    let log_level_str = config.log_level.as_deref().unwrap_or("info");
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level_str))
        .unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()));
    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let transport = HttpTransport::from_config(&config.http).context("Failed to build HTTP client")?;
    let service = CompositeTrustService::from_config(&config, Arc::new(transport));
    for source in &args.disable {
        service.set_enabled((*source).into(), false);
    }

    info!("Refreshing trust sources...");
    let status = service.refresh().await;

    let issuer = match &args.issuer {
        Some(issuer) => Some(service.validate_issuer(Some(issuer.as_str())).await),
        None => None,
    };
    let verifier = match &args.verifier {
        Some(client_id) => Some(service.validate_verifier(client_id, None).await),
        None => None,
    };

    let report = Report {
        status,
        issuer,
        verifier,
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("Failed to serialize report")?
    );

    if args.metrics {
        print!("{}", metrics::gather_text());
    }
    Ok(())
}
