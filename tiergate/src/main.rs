//! # Tiergate CLI Entry Point
//!
//! 1. **Initialization**: Sets up `tracing` and parses command-line arguments using [`cli::Cli`].
//! 2. **Policy**: Builds the [`TierPolicy`] from the method options of a descriptor set.
//! 3. **Execution**: Serves the guarded showcase service, prints the tier table, or performs a call.
//! 4. **Presentation**: Formats and prints the resulting data or error status to standard output/error.
mod cli;
mod formatter;

use clap::Parser;
use cli::{Cli, Commands};
use formatter::{FormattedString, GenericError, TierTable};
use showcase_service::{FILE_DESCRIPTOR_SET, ShowcaseServiceImpl, ShowcaseServiceServer};
use std::{net::SocketAddr, path::PathBuf, process};
use tiergate_core::{
    PolicyConfig, TierLayer, TierPolicy,
    client::{CallRequest, TierClient},
    prost_reflect::DescriptorPool,
};
use tonic::transport::Server;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    init_tracing();

    let args = Cli::parse();

    match args.command {
        Commands::Serve {
            addr,
            deny_unknown,
            policy,
        } => serve(addr, policy.into_config(deny_unknown)).await,
        Commands::Tiers {
            file_descriptor_set,
            policy,
        } => list_tiers(file_descriptor_set, policy.into_config(false)),
        Commands::Call {
            url,
            endpoint,
            body,
            tier,
            headers,
            file_descriptor_set,
            metadata_key,
        } => {
            let (service, method) = endpoint;
            let request = CallRequest {
                service,
                method,
                body,
                tier,
                headers,
            };
            run_call(&url, request, file_descriptor_set, metadata_key).await
        }
    }
}

/// Logs go to stderr so they never mix with call results. `RUST_LOG` overrides the level.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn exit_with(err: impl Into<FormattedString>) -> ! {
    eprintln!("{}", err.into());
    process::exit(1);
}

fn read_descriptor_set(path: Option<PathBuf>) -> Vec<u8> {
    match path {
        Some(path) => std::fs::read(path).unwrap_or_else(|err| exit_with(err)),
        None => FILE_DESCRIPTOR_SET.to_vec(),
    }
}

async fn serve(addr: SocketAddr, config: PolicyConfig) {
    let policy = TierPolicy::from_file_descriptor_set(FILE_DESCRIPTOR_SET, &config)
        .unwrap_or_else(|err| exit_with(err));

    let reflection_service = tonic_reflection::server::Builder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build_v1()
        .unwrap_or_else(|err| exit_with(GenericError("Failed to build reflection service", err)));

    for method in policy.methods() {
        tracing::info!(path = %method.path, min_tier = ?method.min_tier, "Guarding method");
    }
    tracing::info!(
        %addr,
        metadata_key = policy.metadata_key(),
        unknown_method = ?config.unknown_method,
        "Serving showcase service"
    );

    let result = Server::builder()
        .layer(TierLayer::new(policy))
        .add_service(ShowcaseServiceServer::new(ShowcaseServiceImpl))
        .add_service(reflection_service)
        .serve_with_shutdown(addr, shutdown_signal())
        .await;

    if let Err(err) = result {
        exit_with(GenericError("Server error", err));
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "Failed to listen for the shutdown signal");
        return;
    }
    tracing::info!("Shutting down");
}

fn list_tiers(file_descriptor_set: Option<PathBuf>, config: PolicyConfig) {
    let bytes = read_descriptor_set(file_descriptor_set);

    let policy = TierPolicy::from_file_descriptor_set(&bytes, &config)
        .unwrap_or_else(|err| exit_with(err));

    println!("{}", FormattedString::from(TierTable(policy.methods().collect())));
}

async fn run_call(
    url: &str,
    request: CallRequest,
    file_descriptor_set: Option<PathBuf>,
    metadata_key: String,
) {
    let bytes = read_descriptor_set(file_descriptor_set);
    let pool = DescriptorPool::decode(bytes.as_slice()).unwrap_or_else(|err| exit_with(err));

    let mut client = TierClient::connect(url, pool)
        .await
        .unwrap_or_else(|err| exit_with(err))
        .with_metadata_key(&metadata_key)
        .unwrap_or_else(|err| exit_with(err));

    match client.call(request).await {
        Ok(Ok(value)) => println!("{}", FormattedString::from(value)),
        Ok(Err(status)) => println!("{}", FormattedString::from(status)),
        Err(err) => exit_with(err),
    }
}
