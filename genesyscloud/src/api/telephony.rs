//! Telephony provider (edge) API implementation

use super::common::{EntityListing, PaginationParams};
use super::{ApiError, Client};
use serde::{Deserialize, Serialize};

pub const TRUNK_BASE_SETTINGS_PATH: &str = "/api/v2/telephony/providers/edges/trunkbasesettings";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrunkBaseSettings {
    pub id: Option<String>,
    pub name: Option<String>,
    /// active, inactive or deleted
    pub state: Option<String>,
    pub trunk_type: Option<String>,
}

impl TrunkBaseSettings {
    pub fn is_deleted(&self) -> bool {
        self.state.as_deref() == Some("deleted")
    }
}

pub struct TelephonyApi<'a> {
    client: &'a Client,
}

impl<'a> TelephonyApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Name filtering on the server is a prefix match; callers compare names exactly.
    pub async fn list_trunk_base_settings(
        &self,
        page: PaginationParams,
        name: Option<&str>,
    ) -> Result<EntityListing<TrunkBaseSettings>, ApiError> {
        let params = page.to_query_params().add_optional("name", name);
        self.client
            .get_with_params(TRUNK_BASE_SETTINGS_PATH, &params)
            .await
    }
}
