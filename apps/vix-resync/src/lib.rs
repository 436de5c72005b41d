use std::path::PathBuf;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use vix_service::VixService;

/// Re-indexes one project and prints the per-type report as JSON.
#[derive(Debug, Parser)]
#[command(
	version = vix_cli::VERSION,
	rename_all = "kebab",
	styles = vix_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	#[arg(long, short = 'p', value_name = "PROJECT_ID")]
	pub project: String,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = vix_config::load(&args.config)?;
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

	let service = VixService::connect(config).await?;
	let cancel = CancellationToken::new();
	let watcher = tokio::spawn({
		let cancel = cancel.clone();

		async move {
			if tokio::signal::ctrl_c().await.is_ok() {
				tracing::warn!("Interrupt received. Stopping after the current entity.");

				cancel.cancel();
			}
		}
	});
	let report = service.resync(&args.project, &cancel).await;

	watcher.abort();

	let report = report?;

	println!("{}", serde_json::to_string_pretty(&report)?);

	if report.cancelled {
		tracing::warn!(project_id = %report.project_id, "Resync was cancelled before completion.");
	}

	Ok(())
}
