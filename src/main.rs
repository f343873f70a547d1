//! Main entry point for the bulk-export-report CLI

use anyhow::Context;
use bulk_export_report::cli::{print_result, Cli, OutputFormat, Pipeline, RunResult};
use bulk_export_report::config::ExportConfig;
use bulk_export_report::metrics;
use bulk_export_report::remote::HttpExportClient;
use bulk_export_report::shutdown::{SharedShutdown, ShutdownCoordinator};
use clap::Parser;
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber with optional JSON formatting
fn init_tracing() {
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("bulk_export_report=info"));

    // stdout carries the run result
    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

async fn run(cli: Cli, shutdown: SharedShutdown) -> anyhow::Result<bool> {
    if let Some(addr) = cli.metrics_addr {
        metrics::init_metrics(addr).context("installing Prometheus exporter")?;
    }

    let mut config = ExportConfig::from_env().context("loading configuration")?;
    cli.apply_overrides(&mut config);

    let request = match cli.request(chrono::Local::now().date_naive()) {
        Ok(request) => request,
        Err(e) => {
            let result = RunResult {
                success: false,
                error: Some(e.to_string()),
                ..RunResult::default()
            };
            print_result(&result, cli.output_format);
            return Ok(false);
        }
    };
    let service = Arc::new(HttpExportClient::from_config(&config).context("building HTTP client")?);

    let pipeline = Pipeline::new(config, service)
        .with_shutdown(shutdown)
        .with_progress(cli.output_format == OutputFormat::Human)
        .with_force(cli.force);

    let result = pipeline.run(&request).await;
    print_result(&result, cli.output_format);
    Ok(result.success)
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();

    let shutdown = ShutdownCoordinator::shared();
    shutdown.listen_for_ctrl_c();

    match run(cli, shutdown).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("Command failed: {:#}", e);
            std::process::exit(1);
        }
    }
}
