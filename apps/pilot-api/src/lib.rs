pub mod routes;
pub mod security;
pub mod state;

use std::{net::SocketAddr, path::PathBuf};

use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use pilot_service::supervisor::Supervisor;

use crate::state::AppState;

#[derive(Debug, Parser)]
#[command(
	version = pilot_cli::VERSION,
	rename_all = "kebab",
	styles = pilot_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = pilot_config::load(&args.config)?;

	init_tracing(&config)?;

	let http_addr: SocketAddr = config.service.http_bind.parse()?;
	let supervisor = Supervisor::new();
	let state = AppState::new(config, supervisor.clone()).await?;
	let app = routes::router(state);
	let listener = TcpListener::bind(http_addr).await?;

	tracing::info!(%http_addr, "HTTP server listening.");

	axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
		.with_graceful_shutdown(shutdown_signal(supervisor.cancel_token()))
		.await?;

	tracing::info!("HTTP server stopped. Draining background work.");

	supervisor.shutdown().await;

	Ok(())
}

fn init_tracing(config: &pilot_config::Config) -> color_eyre::Result<()> {
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).init();

	Ok(())
}

async fn shutdown_signal(cancel: CancellationToken) {
	tokio::select! {
		result = tokio::signal::ctrl_c() => match result {
			Ok(()) => tracing::info!("Shutdown signal received."),
			Err(err) => {
				tracing::error!(error = %err, "Failed to listen for the shutdown signal.");

				cancel.cancelled().await;
			},
		},
		_ = cancel.cancelled() => {},
	}

	cancel.cancel();
}
