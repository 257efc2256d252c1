//! NetGuard - base-station traffic anomaly detection

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use netguard::{
    alerting::{notifier_from_config, DeliveryStatus},
    analytics::{AnomalyRecord, DetectionReport, Severity},
    config::{ConfigLoader, NetGuardConfig},
    http_server::NetGuardServer,
    logging::{init_logging, LogConfig},
    service::AnalysisService,
};
use std::path::PathBuf;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "netguard")]
#[command(version, about = "Cellular base-station traffic anomaly detection")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, env = "NETGUARD_CONFIG")]
    config: Option<PathBuf>,

    /// Log level or filter directive (overrides the configuration)
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a CSV or JSON dataset
    Analyze {
        /// Dataset file
        file: PathBuf,

        /// Send an alert to this address when anomalies are found
        #[arg(short, long)]
        recipient: Option<String>,

        /// Write the report JSON to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Pretty-print the report JSON
        #[arg(long)]
        pretty: bool,
    },

    /// Run the HTTP API
    Serve {
        /// Bind address (IP:PORT)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Write a sample configuration file
    InitConfig {
        /// Output path
        #[arg(short, long, default_value = "netguard.toml.example")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::InitConfig { path } = &cli.command {
        NetGuardConfig::write_sample_config(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Sample configuration written to {}", path.display());
        return Ok(());
    }

    let config = ConfigLoader::new()
        .load_from_file(cli.config.clone())
        .load_from_env()
        .build()?;

    let mut log_config = LogConfig::from_settings(&config.logging);
    if let Some(level) = &cli.log_level {
        log_config = log_config.with_level(level.clone());
    }
    let _guard = init_logging(&log_config)?;

    info!("Starting NetGuard v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Analyze {
            file,
            recipient,
            output,
            pretty,
        } => analyze(&config, file, recipient, output, pretty).await,
        Commands::Serve { bind } => {
            let addr = bind.unwrap_or_else(|| config.server.bind_addr.clone());
            NetGuardServer::from_config(&config)?.serve(&addr).await?;
            Ok(())
        }
        Commands::InitConfig { .. } => Ok(()),
    }
}

async fn analyze(
    config: &NetGuardConfig,
    file: PathBuf,
    recipient: Option<String>,
    output: Option<PathBuf>,
    pretty: bool,
) -> Result<()> {
    let service = AnalysisService::new(config.columns.clone(), config.detection.clone())?;
    let report = tokio::task::spawn_blocking({
        let file = file.clone();
        move || service.analyze_file(&file)
    })
    .await
    .context("Analysis task failed")?
    .with_context(|| format!("Failed to analyze {}", file.display()))?;

    log_anomalies(&report);

    let json = if pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    match &output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Report written to {}", path.display());
        }
        None => println!("{}", json),
    }

    if let Some(recipient) = recipient.or_else(|| config.alerting.recipient.clone()) {
        let notifier = notifier_from_config(&config.alerting)?;
        let status = notifier.send_alert(&recipient, &report.anomalies).await;
        if status.is_sent() || status == DeliveryStatus::Skipped {
            info!("Alert delivery via {}: {:?}", notifier.transport_name(), status);
        } else {
            warn!("Alert delivery via {}: {:?}", notifier.transport_name(), status);
        }
    }

    Ok(())
}

fn log_anomalies(report: &DetectionReport) {
    info!(
        "{} anomalies ({} high, {} medium, {} low) in {} rows",
        report.anomalies.len(),
        report.count_by_severity(Severity::High),
        report.count_by_severity(Severity::Medium),
        report.count_by_severity(Severity::Low),
        report.chart_data.len()
    );
    for anomaly in &report.anomalies {
        log_anomaly(anomaly);
    }
}

fn log_anomaly(anomaly: &AnomalyRecord) {
    match anomaly.severity {
        Severity::High => error!(
            station = %anomaly.base_station_id,
            timestamp = %anomaly.timestamp,
            "{}: {}",
            anomaly.anomaly_type,
            anomaly.details
        ),
        Severity::Medium => warn!(
            station = %anomaly.base_station_id,
            timestamp = %anomaly.timestamp,
            "{}: {}",
            anomaly.anomaly_type,
            anomaly.details
        ),
        Severity::Low => info!(
            station = %anomaly.base_station_id,
            timestamp = %anomaly.timestamp,
            "{}: {}",
            anomaly.anomaly_type,
            anomaly.details
        ),
    }
}
