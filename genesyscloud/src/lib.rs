pub mod api;
pub mod config;
pub mod data_sources;
pub mod resources;

use tflifecycle::{ResourceController, ResourceRegistry, Result, State, Timeouts};

use config::ProviderConfig;

/// Managed resource types, sorted. Listing them needs no credentials.
pub const RESOURCE_TYPES: &[&str] = &[
    resources::journey_action_map::TYPE_NAME,
    resources::journey_segment::TYPE_NAME,
    resources::routing_queue::TYPE_NAME,
];

pub const DATA_SOURCE_TYPES: &[&str] = &[data_sources::trunkbasesettings::TYPE_NAME];

pub struct GenesysCloudProvider {
    client: api::Client,
    timeouts: Timeouts,
}

impl GenesysCloudProvider {
    /// Resolve provider settings (falling back to the environment) and
    /// authenticate against the configured region.
    pub async fn configure(settings: &State) -> Result<Self> {
        let config = ProviderConfig::resolve(settings)?;
        let client = config.connect().await?;
        tracing::info!("Configured provider for {}", config.api_url);
        Ok(Self::with_client(client, config.timeouts))
    }

    pub fn with_client(client: api::Client, timeouts: Timeouts) -> Self {
        Self { client, timeouts }
    }

    pub fn client(&self) -> &api::Client {
        &self.client
    }

    pub fn registry(&self) -> ResourceRegistry {
        let mut registry = ResourceRegistry::new();
        registry
            .register_resource(
                ResourceController::new(resources::RoutingQueue::new(self.client.clone()))
                    .with_timeouts(self.timeouts),
            )
            .register_resource(
                ResourceController::new(resources::JourneySegmentResource::new(self.client.clone()))
                    .with_timeouts(self.timeouts),
            )
            .register_resource(
                ResourceController::new(resources::JourneyActionMap::new(self.client.clone()))
                    .with_timeouts(self.timeouts),
            )
            .register_data_source(data_sources::TrunkBaseSettingsDataSource::new(
                self.client.clone(),
                self.timeouts,
            ));
        registry
    }
}
