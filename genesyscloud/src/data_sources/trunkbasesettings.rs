use async_trait::async_trait;
use tflifecycle::{
    lookup_by_name, AttributeBuilder, Context, DataSource, DescriptorBuilder, RemoteError,
    ResourceDescriptor, Result, State, Timeouts,
};

use crate::api::{Client, PaginationParams};

pub const TYPE_NAME: &str = "genesyscloud_telephony_providers_edges_trunkbasesettings";

const PAGE_SIZE: u32 = 100;

pub struct TrunkBaseSettingsDataSource {
    client: Client,
    timeouts: Timeouts,
    descriptor: ResourceDescriptor,
}

impl TrunkBaseSettingsDataSource {
    pub fn new(client: Client, timeouts: Timeouts) -> Self {
        Self {
            client,
            timeouts,
            descriptor: DescriptorBuilder::new(TYPE_NAME)
                .description("Data source for Genesys Cloud Trunk Base Settings. Select a trunk base settings by name.")
                .attribute(AttributeBuilder::string("id").computed())
                .attribute(
                    AttributeBuilder::string("name")
                        .description("Trunk Base Settings name.")
                        .required(),
                )
                .build(),
        }
    }

    /// Id of the non-deleted trunk base settings named exactly `name`.
    async fn find(&self, name: &str) -> std::result::Result<Option<String>, RemoteError> {
        let telephony = self.client.telephony();
        let mut page_number = 1;
        loop {
            let listing = telephony
                .list_trunk_base_settings(PaginationParams::new(page_number, PAGE_SIZE), Some(name))
                .await?;
            if listing.entities.is_empty() {
                return Ok(None);
            }
            let last_page = listing
                .page_count
                .is_some_and(|page_count| page_number >= page_count);
            let found = listing
                .entities
                .into_iter()
                .find(|settings| settings.name.as_deref() == Some(name) && !settings.is_deleted())
                .and_then(|settings| settings.id);
            if found.is_some() || last_page {
                return Ok(found);
            }
            page_number += 1;
        }
    }
}

#[async_trait]
impl DataSource for TrunkBaseSettingsDataSource {
    fn descriptor(&self) -> &ResourceDescriptor {
        &self.descriptor
    }

    async fn read(&self, ctx: &Context, config: &State) -> Result<State> {
        self.descriptor.validate(config)?;
        let name = config.require_string("name")?;

        let id = lookup_by_name(
            ctx,
            self.timeouts.lookup,
            self.timeouts.poll_interval,
            &name,
            || self.find(&name),
        )
        .await?;

        tracing::debug!("Resolved trunk base settings {} to {}", name, id);
        let mut state = config.clone();
        state.set_id(id.clone());
        state.set("id", id);
        Ok(state)
    }
}
