//! reef — operator CLI for the reef edge runtime.
//!
//! Talks to the control-plane API served by `reefd`:
//!
//! ```text
//! reef endpoint create "my endpoint" --runtime go --env FOO=BAR
//! reef endpoint list
//! reef endpoint env <ENDPOINT_ID> --env A=B --env C=D
//! reef deploy <ENDPOINT_ID> path/to/app.wasm
//! reef publish <DEPLOYMENT_ID>
//! reef rollback <DEPLOYMENT_ID>
//! reef metrics <ENDPOINT_ID>
//! ```

mod client;

use std::collections::HashMap;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use uuid::Uuid;

use client::Client;
use reef_api::{CreateEndpointParams, UpdateEndpointParams};

#[derive(Parser)]
#[command(name = "reef", about = "Run WASM workloads on the edge")]
struct Cli {
    /// Base URL of the reefd control-plane API.
    #[arg(long, default_value = "http://127.0.0.1:9090")]
    api_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage endpoints.
    Endpoint {
        #[command(subcommand)]
        command: EndpointCommand,
    },

    /// Upload a WASM blob as a new deployment for an endpoint.
    Deploy {
        endpoint_id: Uuid,
        wasm_file: PathBuf,
    },

    /// Publish a deployment as its endpoint's active deployment.
    Publish { deployment_id: Uuid },

    /// Roll back by publishing a previously uploaded deployment.
    Rollback { deployment_id: Uuid },

    /// Show recent runtime metrics for an endpoint.
    Metrics { endpoint_id: Uuid },
}

#[derive(Subcommand)]
enum EndpointCommand {
    /// Create a new endpoint.
    Create {
        name: String,

        /// Language label for the workload.
        #[arg(long, default_value = "go")]
        runtime: String,

        /// Environment variable, repeatable: --env FOO=BAR
        #[arg(long = "env", value_parser = parse_env_pair)]
        env: Vec<(String, String)>,
    },

    /// List all endpoints.
    List,

    /// Merge environment variables into an endpoint.
    Env {
        endpoint_id: Uuid,

        /// Environment variable, repeatable: --env FOO=BAR
        #[arg(long = "env", value_parser = parse_env_pair, required = true)]
        env: Vec<(String, String)>,
    },
}

fn parse_env_pair(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((key, val)) if !key.is_empty() => Ok((key.to_string(), val.to_string())),
        _ => Err(format!(
            "env arguments need to be in the format --env foo=bar, got {value:?}"
        )),
    }
}

fn env_map(pairs: Vec<(String, String)>) -> HashMap<String, String> {
    pairs.into_iter().collect()
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = Client::new(&cli.api_url);

    match cli.command {
        Command::Endpoint { command } => match command {
            EndpointCommand::Create { name, runtime, env } => {
                let endpoint = client
                    .create_endpoint(&CreateEndpointParams {
                        name,
                        runtime,
                        environment: env_map(env),
                    })
                    .await?;
                print_json(&endpoint)?;
            }
            EndpointCommand::List => {
                let endpoints = client.list_endpoints().await?;
                print_json(&endpoints)?;
            }
            EndpointCommand::Env { endpoint_id, env } => {
                let endpoint = client
                    .update_endpoint(
                        endpoint_id,
                        &UpdateEndpointParams {
                            environment: env_map(env),
                        },
                    )
                    .await?;
                print_json(&endpoint)?;
            }
        },
        Command::Deploy {
            endpoint_id,
            wasm_file,
        } => {
            let blob = std::fs::read(&wasm_file)?;
            let deploy = client.create_deployment(endpoint_id, blob).await?;
            print_json(&deploy)?;
            println!();
            println!("publish it with: reef publish {}", deploy.id);
        }
        Command::Publish { deployment_id } | Command::Rollback { deployment_id } => {
            let published = client.publish(deployment_id).await?;
            print_json(&published)?;
            println!();
            println!("deploy is live on: {}", published.url);
        }
        Command::Metrics { endpoint_id } => {
            let metrics = client.list_metrics(endpoint_id).await?;
            print_json(&metrics)?;
        }
    }

    Ok(())
}
