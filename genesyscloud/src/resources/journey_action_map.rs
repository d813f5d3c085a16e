//! genesyscloud_journey_action_map
//!
//! Dates are configured as local date-times without a zone and exchanged
//! with the platform as UTC instants. `configuration_fields` is a JSON
//! document kept as a string; any formatting of an equivalent document is
//! preserved on read.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime};
use tflifecycle::schema::AttributeSchema;
use tflifecycle::validator::{LocalDateTimeValidator, NumberRangeValidator, StringInSliceValidator};
use tflifecycle::{
    AttributeBuilder, DescriptorBuilder, Dynamic, LifecycleError, ManagedResource, ObjectBuilder,
    Page, RemoteError, ResourceDescriptor, Result, State,
};
use tracing::{info, warn};

use super::journey_segment::{CRITERIA_OPERATORS, STREAM_TYPES};
use super::{ref_from, ref_id};
use crate::api::journey::{
    ActionMap, ActionMapAction, ActionMapScheduleGroups, Activation, ArchitectFlowFields,
    EventCondition, OpenActionFields, OutcomeProbabilityCondition, RequestMapping, UrlCondition,
    WebMessagingOfferFields,
};
use crate::api::{Client, DomainEntityRef, PaginationParams};

pub const TYPE_NAME: &str = "genesyscloud_journey_action_map";

const API_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";
const DEFAULT_WEIGHT: i64 = 2;
const DEFAULT_CONDITION_OPERATOR: &str = "equal";

fn descriptor() -> ResourceDescriptor {
    let event_condition = vec![
        AttributeBuilder::string("key").required().build(),
        AttributeBuilder::string_set("values").required().build(),
        AttributeBuilder::string("operator")
            .optional()
            .validator(StringInSliceValidator::new(CRITERIA_OPERATORS))
            .build(),
        AttributeBuilder::string("stream_type")
            .required()
            .validator(StringInSliceValidator::new(STREAM_TYPES))
            .build(),
        AttributeBuilder::string("session_type").required().build(),
        AttributeBuilder::string("event_name").optional().build(),
    ];
    let outcome_probability_condition = vec![
        AttributeBuilder::string("outcome_id").required().build(),
        AttributeBuilder::float("maximum_probability").required().build(),
        AttributeBuilder::float("probability").optional().build(),
    ];
    let url_condition = vec![
        AttributeBuilder::string_set("values").required().build(),
        AttributeBuilder::string("operator")
            .required()
            .validator(StringInSliceValidator::new(CRITERIA_OPERATORS))
            .build(),
    ];
    let activation = vec![
        AttributeBuilder::string("type")
            .required()
            .validator(StringInSliceValidator::new(&[
                "immediate",
                "on-next-visit",
                "on-next-session",
                "delay",
            ]))
            .build(),
        AttributeBuilder::int("delay_in_seconds").optional().build(),
    ];
    let schedule_groups = vec![
        AttributeBuilder::string("action_map_schedule_group_id").required().build(),
        AttributeBuilder::string("emergency_action_map_schedule_group_id")
            .optional()
            .build(),
    ];

    DescriptorBuilder::new(TYPE_NAME)
        .description("Genesys Cloud Journey Action Map")
        .version(1)
        .attribute(
            AttributeBuilder::bool("is_active")
                .description("Whether the action map is active.")
                .optional(),
        )
        .attribute(
            AttributeBuilder::string("display_name")
                .description("Display name of the action map.")
                .required(),
        )
        .attribute(
            AttributeBuilder::string_set("trigger_with_segments")
                .description("Trigger action map if any segment in the list is assigned to a given customer.")
                .required(),
        )
        .attribute(AttributeBuilder::block_set("trigger_with_event_conditions", event_condition).optional())
        .attribute(
            AttributeBuilder::block_set(
                "trigger_with_outcome_probability_conditions",
                outcome_probability_condition,
            )
            .optional(),
        )
        .attribute(AttributeBuilder::block_set("page_url_conditions", url_condition).optional())
        .attribute(AttributeBuilder::block_list("activation", activation).required())
        .attribute(
            AttributeBuilder::int("weight")
                .description("Weight of the action map with higher number denoting higher weight.")
                .optional()
                .validator(NumberRangeValidator {
                    min: Some(1.0),
                    max: Some(3.0),
                }),
        )
        .attribute(AttributeBuilder::block_list("action", action_fields()).required())
        .attribute(AttributeBuilder::block_list("action_map_schedule_groups", schedule_groups).optional())
        .attribute(AttributeBuilder::bool("ignore_frequency_cap").optional())
        .attribute(
            AttributeBuilder::string("start_date")
                .description("Timestamp at which the action map is scheduled to start firing. Date time is represented as an ISO-8601 string without a timezone. For example: 2006-01-02T15:04:05.000000.")
                .required()
                .validator(LocalDateTimeValidator),
        )
        .attribute(
            AttributeBuilder::string("end_date")
                .description("Timestamp at which the action map is scheduled to stop firing. Date time is represented as an ISO-8601 string without a timezone. For example: 2006-01-02T15:04:05.000000.")
                .optional()
                .validator(LocalDateTimeValidator),
        )
        .build()
}

fn action_fields() -> Vec<AttributeSchema> {
    let request_mapping = vec![
        AttributeBuilder::string("name").required().build(),
        AttributeBuilder::string("attribute_type")
            .required()
            .validator(StringInSliceValidator::new(&["String", "Number", "Integer", "Boolean"]))
            .build(),
        AttributeBuilder::string("mapping_type")
            .required()
            .validator(StringInSliceValidator::new(&["Lookup", "HardCoded"]))
            .build(),
        AttributeBuilder::string("value").required().build(),
    ];
    let entity_ref = vec![
        AttributeBuilder::string("id").required().build(),
        AttributeBuilder::string("name").required().build(),
    ];

    vec![
        AttributeBuilder::string("action_template_id").optional().build(),
        AttributeBuilder::string("media_type")
            .required()
            .validator(StringInSliceValidator::new(&[
                "webchat",
                "webMessagingOffer",
                "contentOffer",
                "architectFlow",
                "openAction",
            ]))
            .build(),
        AttributeBuilder::block_list(
            "architect_flow_fields",
            vec![
                AttributeBuilder::string("architect_flow_id").required().build(),
                AttributeBuilder::block_set("flow_request_mappings", request_mapping)
                    .optional()
                    .build(),
            ],
        )
        .optional()
        .build(),
        AttributeBuilder::block_list(
            "web_messaging_offer_fields",
            vec![
                AttributeBuilder::string("offer_text").optional().build(),
                AttributeBuilder::string("architect_flow_id").optional().build(),
            ],
        )
        .optional()
        .build(),
        AttributeBuilder::block_list(
            "open_action_fields",
            vec![
                AttributeBuilder::block_list("open_action", entity_ref)
                    .required()
                    .build(),
                AttributeBuilder::string("configuration_fields")
                    .description("JSON document of custom fields defined by the open action schema.")
                    .optional()
                    .build(),
            ],
        )
        .optional()
        .build(),
    ]
}

pub struct JourneyActionMap {
    client: Client,
    descriptor: ResourceDescriptor,
}

impl JourneyActionMap {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            descriptor: descriptor(),
        }
    }
}

#[async_trait]
impl ManagedResource for JourneyActionMap {
    type Payload = ActionMap;

    const VERSIONED: bool = true;

    fn descriptor(&self) -> &ResourceDescriptor {
        &self.descriptor
    }

    fn build(&self, desired: &State) -> Result<ActionMap> {
        let activation = desired
            .get_object("activation")?
            .map(|activation| -> Result<Activation> {
                Ok(Activation {
                    activation_type: activation.require_string("type")?,
                    delay_in_seconds: activation.get_i64("delay_in_seconds")?,
                })
            })
            .transpose()?;

        Ok(ActionMap {
            id: None,
            version: None,
            is_active: Some(desired.get_bool("is_active")?.unwrap_or(true)),
            display_name: Some(desired.require_string("display_name")?),
            trigger_with_segments: desired
                .get_string_list("trigger_with_segments")?
                .unwrap_or_default(),
            trigger_with_event_conditions: Some(build_event_conditions(desired)?),
            trigger_with_outcome_probability_conditions: build_outcome_probability_conditions(desired)?,
            page_url_conditions: Some(build_url_conditions(desired)?),
            activation,
            weight: Some(desired.get_i64("weight")?.unwrap_or(DEFAULT_WEIGHT)),
            action: desired
                .get_object("action")?
                .map(|action| build_action(&action))
                .transpose()?,
            action_map_schedule_groups: desired
                .get_object("action_map_schedule_groups")?
                .map(|groups| -> Result<ActionMapScheduleGroups> {
                    Ok(ActionMapScheduleGroups {
                        action_map_schedule_group: ref_from(&groups, "action_map_schedule_group_id")?,
                        emergency_action_map_schedule_group: ref_from(
                            &groups,
                            "emergency_action_map_schedule_group_id",
                        )?,
                    })
                })
                .transpose()?,
            ignore_frequency_cap: Some(desired.get_bool("ignore_frequency_cap")?.unwrap_or(false)),
            start_date: desired
                .get_string("start_date")?
                .map(|date| to_api_date("start_date", &date))
                .transpose()?,
            end_date: desired
                .get_string("end_date")?
                .map(|date| to_api_date("end_date", &date))
                .transpose()?,
        })
    }

    fn flatten(&self, action_map: &ActionMap, state: &mut State) -> Result<()> {
        let configured_fields = configured_configuration_fields(state)?;

        state.set("is_active", action_map.is_active);
        state.set("display_name", action_map.display_name.clone());
        state.set(
            "trigger_with_segments",
            Dynamic::string_list(action_map.trigger_with_segments.clone()),
        );
        state.set(
            "trigger_with_event_conditions",
            action_map
                .trigger_with_event_conditions
                .as_ref()
                .map(|conditions| Dynamic::List(conditions.iter().map(flatten_event_condition).collect())),
        );
        state.set(
            "trigger_with_outcome_probability_conditions",
            action_map
                .trigger_with_outcome_probability_conditions
                .as_ref()
                .map(|conditions| {
                    Dynamic::List(
                        conditions
                            .iter()
                            .map(|c| {
                                ObjectBuilder::new()
                                    .field("outcome_id", c.outcome_id.clone())
                                    .field("maximum_probability", c.maximum_probability)
                                    .field("probability", c.probability)
                                    .build()
                            })
                            .collect(),
                    )
                }),
        );
        state.set(
            "page_url_conditions",
            action_map.page_url_conditions.as_ref().map(|conditions| {
                Dynamic::List(
                    conditions
                        .iter()
                        .map(|c| {
                            ObjectBuilder::new()
                                .field("values", Dynamic::string_list(c.values.clone()))
                                .field("operator", c.operator.clone())
                                .build()
                        })
                        .collect(),
                )
            }),
        );
        state.set(
            "activation",
            action_map.activation.as_ref().map(|activation| {
                ObjectBuilder::new()
                    .field("type", activation.activation_type.clone())
                    .field("delay_in_seconds", activation.delay_in_seconds)
                    .build_block()
            }),
        );
        state.set("weight", action_map.weight);
        state.set(
            "action",
            action_map
                .action
                .as_ref()
                .map(|action| flatten_action(action, configured_fields.as_deref())),
        );
        state.set(
            "action_map_schedule_groups",
            action_map.action_map_schedule_groups.as_ref().map(|groups| {
                ObjectBuilder::new()
                    .field(
                        "action_map_schedule_group_id",
                        ref_id(groups.action_map_schedule_group.as_ref()),
                    )
                    .field(
                        "emergency_action_map_schedule_group_id",
                        ref_id(groups.emergency_action_map_schedule_group.as_ref()),
                    )
                    .build_block()
            }),
        );
        state.set("ignore_frequency_cap", action_map.ignore_frequency_cap);
        state.set("start_date", action_map.start_date.as_deref().map(to_local_date));
        state.set("end_date", action_map.end_date.as_deref().map(to_local_date));
        Ok(())
    }

    fn id_of(&self, action_map: &ActionMap) -> Option<String> {
        action_map.id.clone()
    }

    fn name_of(&self, action_map: &ActionMap) -> String {
        action_map.display_name.clone().unwrap_or_default()
    }

    async fn get(&self, id: &str) -> std::result::Result<ActionMap, RemoteError> {
        Ok(self.client.journey().get_action_map(id).await?)
    }

    /// Honours the reported page count; the action map listing keeps
    /// returning entities past the last page.
    async fn list(
        &self,
        page_number: u32,
        page_size: u32,
    ) -> std::result::Result<Page<ActionMap>, RemoteError> {
        let listing = self
            .client
            .journey()
            .list_action_maps(PaginationParams::new(page_number, page_size))
            .await?;
        Ok(listing.into_page())
    }

    async fn create(&self, action_map: &ActionMap) -> std::result::Result<ActionMap, RemoteError> {
        info!(
            "Creating journey action map {}",
            action_map.display_name.as_deref().unwrap_or_default()
        );
        Ok(self.client.journey().create_action_map(action_map).await?)
    }

    async fn update(
        &self,
        id: &str,
        action_map: &ActionMap,
    ) -> std::result::Result<ActionMap, RemoteError> {
        Ok(self.client.journey().patch_action_map(id, action_map).await?)
    }

    async fn delete(&self, id: &str) -> std::result::Result<(), RemoteError> {
        info!("Deleting journey action map {}", id);
        Ok(self.client.journey().delete_action_map(id).await?)
    }

    fn version_of(&self, action_map: &ActionMap) -> Option<i64> {
        action_map.version
    }

    fn set_version(&self, action_map: &mut ActionMap, version: i64) {
        action_map.version = Some(version);
    }
}

/// `2022-07-04T12:00:00.000000` to `2022-07-04T12:00:00.000Z`
fn to_api_date(attribute: &str, local: &str) -> Result<String> {
    let parsed = NaiveDateTime::parse_from_str(local, LocalDateTimeValidator::FORMAT).map_err(|e| {
        LifecycleError::validation(format!("{} '{}' is not a local date-time: {}", attribute, local, e))
    })?;
    Ok(parsed.and_utc().format(API_DATE_FORMAT).to_string())
}

fn to_local_date(api: &str) -> String {
    match DateTime::parse_from_rfc3339(api) {
        Ok(instant) => instant
            .naive_utc()
            .format(LocalDateTimeValidator::FORMAT)
            .to_string(),
        Err(e) => {
            warn!("Keeping unparseable date '{}': {}", api, e);
            api.to_string()
        }
    }
}

fn build_event_conditions(desired: &State) -> Result<Vec<EventCondition>> {
    desired
        .get_objects("trigger_with_event_conditions")?
        .unwrap_or_default()
        .iter()
        .map(|c| {
            Ok(EventCondition {
                key: c.require_string("key")?,
                values: c.get_string_list("values")?.unwrap_or_default(),
                operator: c
                    .get_string("operator")?
                    .unwrap_or_else(|| DEFAULT_CONDITION_OPERATOR.to_string()),
                stream_type: c.require_string("stream_type")?,
                session_type: c.require_string("session_type")?,
                event_name: c.get_string("event_name")?,
            })
        })
        .collect()
}

fn flatten_event_condition(condition: &EventCondition) -> Dynamic {
    ObjectBuilder::new()
        .field("key", condition.key.clone())
        .field("values", Dynamic::string_list(condition.values.clone()))
        .field("operator", condition.operator.clone())
        .field("stream_type", condition.stream_type.clone())
        .field("session_type", condition.session_type.clone())
        .field("event_name", condition.event_name.clone())
        .build()
}

fn build_outcome_probability_conditions(
    desired: &State,
) -> Result<Option<Vec<OutcomeProbabilityCondition>>> {
    let Some(conditions) = desired.get_objects("trigger_with_outcome_probability_conditions")? else {
        return Ok(None);
    };
    conditions
        .iter()
        .map(|c| {
            Ok(OutcomeProbabilityCondition {
                outcome_id: c.require_string("outcome_id")?,
                maximum_probability: c.get_f64("maximum_probability")?.unwrap_or_default(),
                probability: c.get_f64("probability")?,
            })
        })
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

fn build_url_conditions(desired: &State) -> Result<Vec<UrlCondition>> {
    desired
        .get_objects("page_url_conditions")?
        .unwrap_or_default()
        .iter()
        .map(|c| {
            Ok(UrlCondition {
                values: c.get_string_list("values")?.unwrap_or_default(),
                operator: c.require_string("operator")?,
            })
        })
        .collect()
}

fn build_action(action: &State) -> Result<ActionMapAction> {
    let architect_flow_fields = action
        .get_object("architect_flow_fields")?
        .map(|fields| -> Result<ArchitectFlowFields> {
            let mappings = fields
                .get_objects("flow_request_mappings")?
                .map(|mappings| {
                    mappings
                        .iter()
                        .map(|m| {
                            Ok(RequestMapping {
                                name: m.require_string("name")?,
                                attribute_type: m.require_string("attribute_type")?,
                                mapping_type: m.require_string("mapping_type")?,
                                value: m.require_string("value")?,
                            })
                        })
                        .collect::<Result<Vec<_>>>()
                })
                .transpose()?;
            Ok(ArchitectFlowFields {
                architect_flow: ref_from(&fields, "architect_flow_id")?,
                flow_request_mappings: mappings,
            })
        })
        .transpose()?;

    let web_messaging_offer_fields = action
        .get_object("web_messaging_offer_fields")?
        .map(|fields| -> Result<WebMessagingOfferFields> {
            Ok(WebMessagingOfferFields {
                offer_text: fields.get_string("offer_text")?,
                architect_flow: ref_from(&fields, "architect_flow_id")?,
            })
        })
        .transpose()?;

    let open_action_fields = action
        .get_object("open_action_fields")?
        .map(|fields| -> Result<OpenActionFields> {
            let open_action = fields
                .get_object("open_action")?
                .map(|entity| -> Result<DomainEntityRef> {
                    Ok(DomainEntityRef {
                        id: entity.get_string("id")?,
                        name: entity.get_string("name")?,
                    })
                })
                .transpose()?;
            let configuration_fields = fields
                .get_string("configuration_fields")?
                .map(|raw| {
                    serde_json::from_str::<serde_json::Value>(&raw).map_err(|e| {
                        LifecycleError::validation(format!(
                            "configuration_fields is not valid JSON: {}",
                            e
                        ))
                    })
                })
                .transpose()?;
            Ok(OpenActionFields {
                open_action,
                configuration_fields,
            })
        })
        .transpose()?;

    Ok(ActionMapAction {
        media_type: action.require_string("media_type")?,
        action_template: ref_from(action, "action_template_id")?,
        architect_flow_fields,
        web_messaging_offer_fields,
        open_action_fields,
    })
}

/// Raw `configuration_fields` string currently held in state, if any.
fn configured_configuration_fields(state: &State) -> Result<Option<String>> {
    let Some(action) = state.get_object("action")? else {
        return Ok(None);
    };
    let Some(fields) = action.get_object("open_action_fields")? else {
        return Ok(None);
    };
    fields.get_string("configuration_fields")
}

/// Serialized form of `value`, unless `configured` already describes the
/// same document.
fn configuration_fields_string(value: &serde_json::Value, configured: Option<&str>) -> String {
    if let Some(configured) = configured {
        if serde_json::from_str::<serde_json::Value>(configured).ok().as_ref() == Some(value) {
            return configured.to_string();
        }
    }
    value.to_string()
}

fn flatten_action(action: &ActionMapAction, configured_fields: Option<&str>) -> Dynamic {
    let architect_flow_fields = action.architect_flow_fields.as_ref().map(|fields| {
        ObjectBuilder::new()
            .field("architect_flow_id", ref_id(fields.architect_flow.as_ref()))
            .field(
                "flow_request_mappings",
                fields.flow_request_mappings.as_ref().map(|mappings| {
                    Dynamic::List(
                        mappings
                            .iter()
                            .map(|m| {
                                ObjectBuilder::new()
                                    .field("name", m.name.clone())
                                    .field("attribute_type", m.attribute_type.clone())
                                    .field("mapping_type", m.mapping_type.clone())
                                    .field("value", m.value.clone())
                                    .build()
                            })
                            .collect(),
                    )
                }),
            )
            .build_block()
    });

    let web_messaging_offer_fields = action.web_messaging_offer_fields.as_ref().map(|fields| {
        ObjectBuilder::new()
            .field("offer_text", fields.offer_text.clone())
            .field("architect_flow_id", ref_id(fields.architect_flow.as_ref()))
            .build_block()
    });

    let open_action_fields = action.open_action_fields.as_ref().map(|fields| {
        ObjectBuilder::new()
            .field(
                "open_action",
                fields.open_action.as_ref().map(|entity| {
                    ObjectBuilder::new()
                        .field("id", entity.id.clone())
                        .field("name", entity.name.clone())
                        .build_block()
                }),
            )
            .field(
                "configuration_fields",
                fields
                    .configuration_fields
                    .as_ref()
                    .map(|value| configuration_fields_string(value, configured_fields)),
            )
            .build_block()
    });

    ObjectBuilder::new()
        .field("action_template_id", ref_id(action.action_template.as_ref()))
        .field("media_type", action.media_type.clone())
        .field("architect_flow_fields", architect_flow_fields)
        .field("web_messaging_offer_fields", web_messaging_offer_fields)
        .field("open_action_fields", open_action_fields)
        .build_block()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource() -> JourneyActionMap {
        JourneyActionMap::new(Client::new("https://api.mypurecloud.com", "token").unwrap())
    }

    fn open_action(configuration_fields: &str) -> Dynamic {
        ObjectBuilder::new()
            .field("media_type", "openAction")
            .field(
                "open_action_fields",
                ObjectBuilder::new()
                    .field(
                        "open_action",
                        ObjectBuilder::new()
                            .field("id", "oa-1")
                            .field("name", "Send webhook")
                            .build_block(),
                    )
                    .field("configuration_fields", configuration_fields)
                    .build_block(),
            )
            .build_block()
    }

    fn desired() -> State {
        State::new()
            .with("display_name", "Offer chat")
            .with("trigger_with_segments", Dynamic::string_list(["s1"]))
            .with(
                "activation",
                ObjectBuilder::new().field("type", "immediate").build_block(),
            )
            .with(
                "action",
                ObjectBuilder::new().field("media_type", "webchat").build_block(),
            )
            .with("start_date", "2022-07-04T12:00:00.000000")
    }

    #[test]
    fn build_applies_defaults_and_converts_dates() {
        let action_map = resource()
            .build(&desired().with("end_date", "2022-08-01T06:30:15.250000"))
            .unwrap();

        assert_eq!(action_map.is_active, Some(true));
        assert_eq!(action_map.weight, Some(2));
        assert_eq!(action_map.ignore_frequency_cap, Some(false));
        assert_eq!(action_map.trigger_with_event_conditions, Some(Vec::new()));
        assert_eq!(action_map.trigger_with_outcome_probability_conditions, None);
        assert_eq!(action_map.start_date.as_deref(), Some("2022-07-04T12:00:00.000Z"));
        assert_eq!(action_map.end_date.as_deref(), Some("2022-08-01T06:30:15.250Z"));
    }

    #[test]
    fn event_condition_operator_defaults_to_equal() {
        let desired = desired().with(
            "trigger_with_event_conditions",
            Dynamic::List(vec![ObjectBuilder::new()
                .field("key", "page.url")
                .field("values", Dynamic::string_list(["/checkout"]))
                .field("stream_type", "Web")
                .field("session_type", "web")
                .build()]),
        );

        let action_map = resource().build(&desired).unwrap();
        let conditions = action_map.trigger_with_event_conditions.unwrap();
        assert_eq!(conditions[0].operator, "equal");
    }

    #[test]
    fn flatten_restores_local_dates() {
        let resource = resource();
        let action_map = resource.build(&desired()).unwrap();

        let mut state = State::with_id("am1");
        resource.flatten(&action_map, &mut state).unwrap();

        assert_eq!(
            state.get_string("start_date").unwrap().as_deref(),
            Some("2022-07-04T12:00:00.000000")
        );
        assert_eq!(state.get("end_date"), None);
        let action = state.get_object("action").unwrap().unwrap();
        assert_eq!(action.get_string("media_type").unwrap().as_deref(), Some("webchat"));
        assert_eq!(state.get_i64("weight").unwrap(), Some(2));
    }

    fn configuration_fields(state: &State) -> Option<String> {
        configured_configuration_fields(state).unwrap()
    }

    #[test]
    fn equivalent_configuration_fields_keep_configured_formatting() {
        let resource = resource();
        let configured = "{ \"url\": \"https://example.com\",  \"retries\": 3 }";
        let desired = desired().with("action", open_action(configured));
        let action_map = resource.build(&desired).unwrap();

        let mut state = desired.clone();
        resource.flatten(&action_map, &mut state).unwrap();
        assert_eq!(configuration_fields(&state).as_deref(), Some(configured));

        let mut state = desired.with("action", open_action("{\"retries\": 4}"));
        resource.flatten(&action_map, &mut state).unwrap();
        let remote: serde_json::Value =
            serde_json::from_str(&configuration_fields(&state).unwrap()).unwrap();
        assert_eq!(
            remote,
            serde_json::json!({"url": "https://example.com", "retries": 3})
        );
    }

    #[test]
    fn invalid_configuration_fields_fail_build() {
        let err = resource()
            .build(&desired().with("action", open_action("{not json")))
            .unwrap_err();
        assert!(err.to_string().contains("configuration_fields is not valid JSON"));
    }

    #[test]
    fn descriptor_rejects_weight_and_date_format() {
        let desired = desired()
            .with("weight", 5i64)
            .with("start_date", "2022-07-04 12:00");

        let message = resource()
            .descriptor()
            .validate(&desired)
            .unwrap_err()
            .to_string();
        assert!(message.contains("weight must be at most 3"));
        assert!(message.contains("start_date must be an ISO-8601 local date-time"));
    }
}
