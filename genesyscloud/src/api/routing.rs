//! Routing queue API implementation

use super::common::{ApiQueryParams, DomainEntityRef, EntityListing, PaginationParams};
use super::{ApiError, Client};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const QUEUES_PATH: &str = "/api/v2/routing/queues";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Queue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub division: Option<DomainEntityRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Keyed by media type: call, callback, chat, email, message,
    /// socialExpression, videoComm
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_settings: Option<BTreeMap<String, MediaSetting>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routing_rules: Option<Vec<RoutingRule>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bullseye: Option<Bullseye>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acw_settings: Option<AcwSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill_evaluation_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_flow: Option<DomainEntityRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whisper_prompt: Option<DomainEntityRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_answer_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_transcription: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_manual_assignment: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calling_party_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calling_party_number: Option<String>,
    /// Keyed by communication type: CALL, CHAT, EMAIL, ...
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_scripts: Option<BTreeMap<String, DomainEntityRef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outbound_messaging_addresses: Option<OutboundMessagingAddresses>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outbound_email_address: Option<OutboundEmailAddress>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaSetting {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alerting_timeout_seconds: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_level: Option<ServiceLevel>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceLevel {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingRule {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_seconds: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bullseye {
    #[serde(default)]
    pub rings: Vec<Ring>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ring {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expansion_criteria: Option<Vec<ExpansionCriterion>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actions: Option<RingActions>,
}

pub const EXPANSION_TIMEOUT_SECONDS: &str = "TIMEOUT_SECONDS";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpansionCriterion {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub criterion_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RingActions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skills_to_remove: Option<Vec<DomainEntityRef>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcwSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wrapup_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundMessagingAddresses {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sms_address: Option<DomainEntityRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutboundEmailAddress {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<DomainEntityRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<DomainEntityRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueMember {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ring_number: Option<i64>,
}

/// Routing API operations
pub struct RoutingApi<'a> {
    client: &'a Client,
}

impl<'a> RoutingApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn list_queues(&self, page: PaginationParams) -> Result<EntityListing<Queue>, ApiError> {
        self.client
            .get_with_params(QUEUES_PATH, &page.to_query_params())
            .await
    }

    pub async fn get_queue(&self, queue_id: &str) -> Result<Queue, ApiError> {
        self.client.get(&queue_path(queue_id)).await
    }

    pub async fn create_queue(&self, queue: &Queue) -> Result<Queue, ApiError> {
        self.client.post(QUEUES_PATH, queue).await
    }

    pub async fn update_queue(&self, queue_id: &str, queue: &Queue) -> Result<Queue, ApiError> {
        self.client.put(&queue_path(queue_id), queue).await
    }

    /// Members are detached by the platform along with the queue.
    pub async fn delete_queue(&self, queue_id: &str) -> Result<(), ApiError> {
        self.client
            .delete_with_params(
                &queue_path(queue_id),
                &ApiQueryParams::new().add("forceDelete", true),
            )
            .await
    }

    pub async fn list_queue_members(
        &self,
        queue_id: &str,
        page: PaginationParams,
    ) -> Result<EntityListing<QueueMember>, ApiError> {
        self.client
            .get_with_params(&members_path(queue_id), &page.to_query_params())
            .await
    }

    /// Bulk add or remove; the platform caps each call at 100 users.
    pub async fn post_queue_members(
        &self,
        queue_id: &str,
        user_ids: &[String],
        delete: bool,
    ) -> Result<(), ApiError> {
        let body: Vec<DomainEntityRef> = user_ids.iter().map(DomainEntityRef::id).collect();
        let path = format!(
            "{}{}",
            members_path(queue_id),
            ApiQueryParams::new().add("delete", delete).to_query_string()
        );
        self.client.post_no_content(&path, &body).await
    }

    pub async fn set_queue_member_ring(
        &self,
        queue_id: &str,
        user_id: &str,
        ring_number: i64,
    ) -> Result<(), ApiError> {
        let body = QueueMember {
            id: Some(user_id.to_string()),
            ring_number: Some(ring_number),
        };
        let path = format!("{}/{}", members_path(queue_id), user_id);
        self.client.patch_no_content(&path, &body).await
    }
}

fn queue_path(queue_id: &str) -> String {
    format!("{}/{}", QUEUES_PATH, queue_id)
}

fn members_path(queue_id: &str) -> String {
    format!("{}/{}/members", QUEUES_PATH, queue_id)
}
