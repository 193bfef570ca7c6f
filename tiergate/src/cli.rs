//! # CLI
//!
//! This module defines the command-line interface of `tiergate` using `clap`.
//!
//! Every setting can also be provided through a `TIERGATE_*` environment variable.
use clap::{Args, Parser, Subcommand};
use std::{net::SocketAddr, path::PathBuf};
use tiergate_core::{PolicyConfig, UnknownMethod};

#[derive(Parser)]
#[command(name = "tiergate", version, about = "Per-method tier authorization for gRPC")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the showcase gRPC server behind the tier check
    ///
    /// Server reflection is exposed as well, so tools like `grpcurl` can discover it.
    ///
    /// ## Examples:
    ///
    /// ```bash
    /// tiergate serve --addr 0.0.0.0:50051 --deny-unknown
    /// ```
    Serve {
        /// Address to listen on
        #[arg(long, env = "TIERGATE_ADDR", default_value = "127.0.0.1:50051")]
        addr: SocketAddr,

        /// Reject calls to methods that are not in the descriptor set (reflection included)
        #[arg(long)]
        deny_unknown: bool,

        #[command(flatten)]
        policy: PolicyArgs,
    },

    /// Print the minimum tier of every method of a descriptor set
    Tiers {
        /// Path to the descriptor set (.bin). Defaults to the showcase service.
        #[arg(long)]
        file_descriptor_set: Option<PathBuf>,

        #[command(flatten)]
        policy: PolicyArgs,
    },

    /// Perform a unary gRPC call announcing a caller tier
    ///
    /// ## Examples:
    ///
    /// ```bash
    /// tiergate call http://localhost:50051 showcase.v1.ShowcaseService/GetPremiumInsights --tier 2 --body '{"topic": "latency"}'
    /// ```
    Call {
        /// The server URL to connect to (e.g. http://localhost:50051)
        url: String,

        /// Endpoint (package.Service/Method)
        #[arg(value_parser = parse_endpoint)]
        endpoint: (String, String),

        /// JSON body of the request message
        #[arg(long, value_parser = parse_body, default_value = "{}")]
        body: serde_json::Value,

        /// Caller tier sent in the request metadata
        #[arg(long)]
        tier: Option<u32>,

        #[arg(short = 'H', long = "header", value_parser = parse_header)]
        headers: Vec<(String, String)>,

        /// Path to the descriptor set (.bin). Defaults to the showcase service.
        #[arg(long)]
        file_descriptor_set: Option<PathBuf>,

        /// Metadata entry the tier is sent in
        #[arg(long, env = "TIERGATE_METADATA_KEY", default_value = "tier")]
        metadata_key: String,
    },
}

#[derive(Args)]
pub struct PolicyArgs {
    /// Full name of the method option holding the minimum tier
    #[arg(long = "option", env = "TIERGATE_OPTION", default_value = "tier.v1.min_tier")]
    pub option_name: String,

    /// Metadata entry the caller's tier is read from
    #[arg(long, env = "TIERGATE_METADATA_KEY", default_value = "tier")]
    pub metadata_key: String,
}

impl PolicyArgs {
    pub fn into_config(self, deny_unknown: bool) -> PolicyConfig {
        PolicyConfig {
            option_name: self.option_name,
            metadata_key: self.metadata_key,
            unknown_method: if deny_unknown {
                UnknownMethod::Deny
            } else {
                UnknownMethod::Allow
            },
        }
    }
}

fn parse_endpoint(value: &str) -> Result<(String, String), String> {
    let (service, method) = value.split_once('/').ok_or_else(|| {
        format!("Invalid endpoint format: '{value}'. Expected 'package.Service/Method'",)
    })?;

    if service.trim().is_empty() || method.trim().is_empty() {
        return Err("Service and Method names cannot be empty".to_string());
    }

    Ok((service.to_string(), method.to_string()))
}

fn parse_header(s: &str) -> Result<(String, String), String> {
    s.split_once(':')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .ok_or_else(|| "Format must be 'key:value'".to_string())
}

fn parse_body(value: &str) -> Result<serde_json::Value, String> {
    serde_json::from_str(value).map_err(|e| format!("Invalid JSON: {e}"))
}
