//! Journey segment and action map API implementation

use super::common::{ApiQueryParams, DomainEntityRef, EntityListing, PaginationParams};
use super::{ApiError, Client};
use serde::{Deserialize, Serialize};

pub const SEGMENTS_PATH: &str = "/api/v2/journey/segments";
pub const ACTION_MAPS_PATH: &str = "/api/v2/journey/actionmaps";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JourneySegment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Session or Customer; fixed at creation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub should_display_to_agent: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<SegmentContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub journey: Option<Journey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_segment: Option<ExternalSegment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignment_expiration_days: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub self_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_date: Option<String>,
}

impl JourneySegment {
    /// Body accepted by PATCH: read-only and create-only fields removed.
    pub fn for_patch(&self) -> Self {
        let mut patch = self.clone();
        patch.id = None;
        patch.scope = None;
        patch.self_uri = None;
        patch.created_date = None;
        patch.modified_date = None;
        if let Some(external) = patch.external_segment.as_mut() {
            external.id = None;
            external.source = None;
        }
        patch
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentContext {
    #[serde(default)]
    pub patterns: Vec<ContextPattern>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextPattern {
    #[serde(default)]
    pub criteria: Vec<EntityTypeCriteria>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityTypeCriteria {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub should_ignore_case: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Journey {
    #[serde(default)]
    pub patterns: Vec<JourneyPattern>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JourneyPattern {
    #[serde(default)]
    pub criteria: Vec<Criteria>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Criteria {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub should_ignore_case: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalSegment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionMap {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub trigger_with_segments: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_with_event_conditions: Option<Vec<EventCondition>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_with_outcome_probability_conditions: Option<Vec<OutcomeProbabilityCondition>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_url_conditions: Option<Vec<UrlCondition>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activation: Option<Activation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<ActionMapAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_map_schedule_groups: Option<ActionMapScheduleGroups>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore_frequency_cap: Option<bool>,
    /// ISO-8601 in UTC, e.g. `2022-07-04T12:00:00.000Z`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

impl ActionMap {
    pub fn for_patch(&self) -> Self {
        let mut patch = self.clone();
        patch.id = None;
        patch
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventCondition {
    pub key: String,
    #[serde(default)]
    pub values: Vec<String>,
    pub operator: String,
    pub stream_type: String,
    pub session_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeProbabilityCondition {
    pub outcome_id: String,
    pub maximum_probability: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probability: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UrlCondition {
    #[serde(default)]
    pub values: Vec<String>,
    pub operator: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activation {
    #[serde(rename = "type")]
    pub activation_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_in_seconds: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionMapAction {
    pub media_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_template: Option<DomainEntityRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub architect_flow_fields: Option<ArchitectFlowFields>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_messaging_offer_fields: Option<WebMessagingOfferFields>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_action_fields: Option<OpenActionFields>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchitectFlowFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub architect_flow: Option<DomainEntityRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flow_request_mappings: Option<Vec<RequestMapping>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMapping {
    pub name: String,
    pub attribute_type: String,
    pub mapping_type: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebMessagingOfferFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offer_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub architect_flow: Option<DomainEntityRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenActionFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_action: Option<DomainEntityRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration_fields: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionMapScheduleGroups {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_map_schedule_group: Option<DomainEntityRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emergency_action_map_schedule_group: Option<DomainEntityRef>,
}

/// Journey API operations
pub struct JourneyApi<'a> {
    client: &'a Client,
}

impl<'a> JourneyApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Only active segments are listed; deleted ones linger as inactive.
    pub async fn list_segments(
        &self,
        page: PaginationParams,
    ) -> Result<EntityListing<JourneySegment>, ApiError> {
        let params = page
            .to_query_params()
            .extend(ApiQueryParams::new().add("isActive", true));
        self.client.get_with_params(SEGMENTS_PATH, &params).await
    }

    pub async fn get_segment(&self, segment_id: &str) -> Result<JourneySegment, ApiError> {
        self.client.get(&segment_path(segment_id)).await
    }

    pub async fn create_segment(
        &self,
        segment: &JourneySegment,
    ) -> Result<JourneySegment, ApiError> {
        self.client.post(SEGMENTS_PATH, segment).await
    }

    /// `segment` must carry the current server version.
    pub async fn patch_segment(
        &self,
        segment_id: &str,
        segment: &JourneySegment,
    ) -> Result<JourneySegment, ApiError> {
        self.client
            .patch(&segment_path(segment_id), &segment.for_patch())
            .await
    }

    pub async fn delete_segment(&self, segment_id: &str) -> Result<(), ApiError> {
        self.client.delete(&segment_path(segment_id)).await
    }

    pub async fn list_action_maps(
        &self,
        page: PaginationParams,
    ) -> Result<EntityListing<ActionMap>, ApiError> {
        self.client
            .get_with_params(ACTION_MAPS_PATH, &page.to_query_params())
            .await
    }

    pub async fn get_action_map(&self, action_map_id: &str) -> Result<ActionMap, ApiError> {
        self.client.get(&action_map_path(action_map_id)).await
    }

    pub async fn create_action_map(&self, action_map: &ActionMap) -> Result<ActionMap, ApiError> {
        self.client.post(ACTION_MAPS_PATH, action_map).await
    }

    pub async fn patch_action_map(
        &self,
        action_map_id: &str,
        action_map: &ActionMap,
    ) -> Result<ActionMap, ApiError> {
        self.client
            .patch(&action_map_path(action_map_id), &action_map.for_patch())
            .await
    }

    pub async fn delete_action_map(&self, action_map_id: &str) -> Result<(), ApiError> {
        self.client.delete(&action_map_path(action_map_id)).await
    }
}

fn segment_path(segment_id: &str) -> String {
    format!("{}/{}", SEGMENTS_PATH, segment_id)
}

fn action_map_path(action_map_id: &str) -> String {
    format!("{}/{}", ACTION_MAPS_PATH, action_map_id)
}
