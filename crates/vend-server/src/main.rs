// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! vend-server binary.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vend_server::{create_app_state, create_router, version};
use vend_server_auth_github::DispatchAuthenticator;
use vend_server_config::LogFormat;
use vend_server_identity::{Provisioner, SecretResolver};
use vend_server_k8s::{K8sClient, KubeClient};

/// vend-server - scoped CI credentials on demand.
#[derive(Parser, Debug)]
#[command(name = "vend-server", about = "Scoped CI credential vending server", version)]
struct Args {
	/// Config file to use instead of /etc/vend/server.toml
	#[arg(long, env = "VEND_SERVER_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Show version and build information
	Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	if let Some(Command::Version) = args.command {
		println!("{}", version::format_version_info());
		return Ok(());
	}

	dotenvy::dotenv().ok();

	let config = match &args.config {
		Some(path) => vend_server_config::load_config_with_file(path)?,
		None => vend_server_config::load_config()?,
	};

	let (text_layer, json_layer) = match config.logging.format {
		LogFormat::Text => (Some(tracing_subscriber::fmt::layer()), None),
		LogFormat::Json => (None, Some(tracing_subscriber::fmt::layer().json())),
	};
	tracing_subscriber::registry()
		.with(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| config.logging.level.clone().into()),
		)
		.with(text_layer)
		.with(json_layer)
		.init();

	tracing::info!(
		host = %config.http.host,
		port = config.http.port,
		strategy = config.identity.strategy.name(),
		"starting vend-server"
	);

	let k8s: Arc<dyn K8sClient> = Arc::new(KubeClient::new().await?);
	let authenticator = Arc::new(DispatchAuthenticator::new(config.github.clone())?);
	let provisioner = Arc::new(Provisioner::new(k8s.clone(), config.identity.clone()));
	let resolver = Arc::new(SecretResolver::new(k8s, config.resolver.clone()));

	let shutdown = CancellationToken::new();
	let state = create_app_state(authenticator, provisioner, resolver, shutdown.clone());
	let app = create_router(state).layer(TraceLayer::new_for_http());

	let addr = config.socket_addr();
	tracing::info!("listening on {}", addr);
	let listener = tokio::net::TcpListener::bind(&addr).await?;

	// In-flight vending runs see the cancellation, roll back, and answer
	// their callers before the server exits.
	axum::serve(listener, app)
		.with_graceful_shutdown(async move {
			if let Err(e) = tokio::signal::ctrl_c().await {
				tracing::error!(error = %e, "failed to listen for shutdown signal");
				std::future::pending::<()>().await;
			}
			tracing::info!("Received shutdown signal");
			shutdown.cancel();
		})
		.await?;

	tracing::info!("Server shutdown complete");
	Ok(())
}
