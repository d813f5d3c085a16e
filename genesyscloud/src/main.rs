use clap::{Parser, Subcommand};
use genesyscloud::GenesysCloudProvider;
use std::collections::BTreeMap;
use tflifecycle::{Context, ResourceRegistry, State};
use tracing_subscriber::EnvFilter;

/// Genesys Cloud resource lifecycle tooling
#[derive(Parser)]
#[command(name = "terraform-provider-genesyscloud")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the resource and data source types this provider manages
    Types,

    /// Print the id to name manifest of existing objects
    Export {
        /// Only export this resource type
        #[arg(long)]
        resource_type: Option<String>,
    },

    /// Read an existing object into state by id
    Import { resource_type: String, id: String },

    /// Resolve a data source by name
    Lookup {
        data_source_type: String,
        #[arg(long)]
        name: String,
    },
}

/// Configure from the environment and build the type registry.
async fn connect() -> tflifecycle::Result<ResourceRegistry> {
    let provider = GenesysCloudProvider::configure(&State::new()).await?;
    Ok(provider.registry())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let ctx = Context::new();

    let output = match cli.command {
        Commands::Types => serde_json::json!({
            "resources": genesyscloud::RESOURCE_TYPES,
            "data_sources": genesyscloud::DATA_SOURCE_TYPES,
        }),
        Commands::Export { resource_type } => {
            let registry = connect().await?;
            match resource_type {
                Some(resource_type) => {
                    let manifest = registry.resource(&resource_type)?.export().await?;
                    serde_json::to_value(BTreeMap::from([(resource_type, manifest)]))?
                }
                None => serde_json::to_value(registry.export_all().await?)?,
            }
        }
        Commands::Import { resource_type, id } => {
            let registry = connect().await?;
            let state = registry.resource(&resource_type)?.import(&ctx, &id).await?;
            serde_json::to_value(state)?
        }
        Commands::Lookup {
            data_source_type,
            name,
        } => {
            let registry = connect().await?;
            let config = State::new().with("name", name);
            let state = registry
                .data_source(&data_source_type)?
                .read(&ctx, &config)
                .await?;
            serde_json::to_value(state)?
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
