//! genesyscloud_routing_queue
//!
//! Queue settings go through a single PUT. Division moves and membership
//! live behind their own endpoints and are applied after the queue write.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tflifecycle::membership::{reconcile_members, Member, MembershipClient, DEFAULT_BATCH_SIZE, DEFAULT_RANK};
use tflifecycle::schema::AttributeSchema;
use tflifecycle::validator::{NumberRangeValidator, StringInSliceValidator};
use tflifecycle::{
    AttributeBuilder, DescriptorBuilder, Dynamic, LifecycleError, ManagedResource, ObjectBuilder,
    Page, RemoteError, ResourceDescriptor, Result, State,
};
use tracing::{debug, info};

use super::{ids_of, ref_from, ref_id, refs_from_ids};
use crate::api::routing::{
    AcwSettings, Bullseye, ExpansionCriterion, MediaSetting, OutboundEmailAddress,
    OutboundMessagingAddresses, Queue, Ring, RingActions, RoutingRule, ServiceLevel,
    EXPANSION_TIMEOUT_SECONDS,
};
use crate::api::{Client, DomainEntityRef, PaginationParams};

pub const TYPE_NAME: &str = "genesyscloud_routing_queue";

/// Attribute block to API media type key
const MEDIA_TYPES: &[(&str, &str)] = &[
    ("media_settings_call", "call"),
    ("media_settings_callback", "callback"),
    ("media_settings_chat", "chat"),
    ("media_settings_email", "email"),
    ("media_settings_message", "message"),
    ("media_settings_social", "socialExpression"),
    ("media_settings_video", "videoComm"),
];

const SCRIPT_COMMUNICATION_TYPES: &[&str] = &[
    "CALL",
    "CALLBACK",
    "CHAT",
    "COBROWSE",
    "EMAIL",
    "MESSAGE",
    "SOCIAL_EXPRESSION",
    "VIDEO",
    "SCREENSHARE",
];

const ACW_WRAPUP_PROMPTS: &[&str] = &[
    "MANDATORY",
    "OPTIONAL",
    "MANDATORY_TIMEOUT",
    "MANDATORY_FORCED_TIMEOUT",
    "AGENT_REQUESTED",
];

/// Prompts for which the platform honours `timeoutMs`
const TIMED_ACW_PROMPTS: &[&str] = &["MANDATORY_TIMEOUT", "MANDATORY_FORCED_TIMEOUT", "AGENT_REQUESTED"];

const DEFAULT_ACW_PROMPT: &str = "MANDATORY_TIMEOUT";
const DEFAULT_SKILL_EVALUATION: &str = "ALL";
const DEFAULT_RULE_OPERATOR: &str = "MEETS_THRESHOLD";
const DEFAULT_RULE_WAIT_SECONDS: f64 = 5.0;
const MAX_ROUTING_RULES: usize = 6;
const MAX_BULLSEYE_RINGS: usize = 6;

fn range(min: f64, max: f64) -> NumberRangeValidator {
    NumberRangeValidator {
        min: Some(min),
        max: Some(max),
    }
}

fn at_least(min: f64) -> NumberRangeValidator {
    NumberRangeValidator {
        min: Some(min),
        max: None,
    }
}

fn media_settings_fields() -> Vec<AttributeSchema> {
    vec![
        AttributeBuilder::int("alerting_timeout_sec")
            .description("Alerting timeout in seconds. Must be >= 7")
            .required()
            .validator(at_least(7.0))
            .build(),
        AttributeBuilder::float("service_level_percentage")
            .description("The desired Service Level. A value between 0 and 1.")
            .required()
            .validator(range(0.0, 1.0))
            .build(),
        AttributeBuilder::int("service_level_duration_ms")
            .description("Service Level target in milliseconds. Must be >= 1000")
            .required()
            .validator(at_least(1000.0))
            .build(),
    ]
}

fn descriptor() -> ResourceDescriptor {
    let mut builder = DescriptorBuilder::new(TYPE_NAME)
        .description("Genesys Cloud Routing Queue")
        .version(1)
        .attribute(AttributeBuilder::string("name").description("Queue name.").required())
        .attribute(
            AttributeBuilder::string("division_id")
                .description("The division to which this queue will belong. If not set, the home division will be used.")
                .optional()
                .computed(),
        )
        .attribute(AttributeBuilder::string("description").optional());

    for (block, _) in MEDIA_TYPES {
        builder = builder.attribute(
            AttributeBuilder::block_list(block, media_settings_fields()).optional().computed(),
        );
    }

    builder
        .attribute(
            AttributeBuilder::block_list(
                "routing_rules",
                vec![
                    AttributeBuilder::string("operator")
                        .optional()
                        .validator(StringInSliceValidator::new(&["MEETS_THRESHOLD", "ANY"]))
                        .build(),
                    AttributeBuilder::int("threshold").optional().build(),
                    AttributeBuilder::float("wait_seconds")
                        .optional()
                        .validator(range(2.0, 900.0))
                        .build(),
                ],
            )
            .description("The routing rules for the queue, used for routing to known or preferred agents.")
            .optional(),
        )
        .attribute(
            AttributeBuilder::block_list(
                "bullseye_rings",
                vec![
                    AttributeBuilder::float("expansion_timeout_seconds")
                        .required()
                        .validator(range(2.0, 900.0))
                        .build(),
                    AttributeBuilder::string_set("skills_to_remove").optional().build(),
                ],
            )
            .description("The bullseye ring settings for the queue.")
            .optional(),
        )
        .attribute(
            AttributeBuilder::string("acw_wrapup_prompt")
                .optional()
                .validator(StringInSliceValidator::new(ACW_WRAPUP_PROMPTS)),
        )
        .attribute(
            AttributeBuilder::int("acw_timeout_ms")
                .optional()
                .computed()
                .validator(range(1000.0, 86_400_000.0)),
        )
        .attribute(
            AttributeBuilder::string("skill_evaluation_method")
                .optional()
                .validator(StringInSliceValidator::new(&["NONE", "BEST", "ALL"])),
        )
        .attribute(AttributeBuilder::string("queue_flow_id").optional())
        .attribute(AttributeBuilder::string("whisper_prompt_id").optional())
        .attribute(AttributeBuilder::bool("auto_answer_only").optional())
        .attribute(AttributeBuilder::bool("enable_transcription").optional())
        .attribute(AttributeBuilder::bool("enable_manual_assignment").optional())
        .attribute(AttributeBuilder::string("calling_party_name").optional())
        .attribute(AttributeBuilder::string("calling_party_number").optional())
        .attribute(
            AttributeBuilder::string_map("default_script_ids")
                .description("The default script IDs for each communication type.")
                .optional(),
        )
        .attribute(AttributeBuilder::string("outbound_messaging_sms_address_id").optional())
        .attribute(
            AttributeBuilder::block_list(
                "outbound_email_address",
                vec![
                    AttributeBuilder::string("domain_id").required().build(),
                    AttributeBuilder::string("route_id").required().build(),
                ],
            )
            .optional(),
        )
        .attribute(
            AttributeBuilder::block_set(
                "members",
                vec![
                    AttributeBuilder::string("user_id").required().build(),
                    AttributeBuilder::int("ring_num")
                        .optional()
                        .validator(range(1.0, 6.0))
                        .build(),
                ],
            )
            .description("Users in the queue. If not set, this resource will not manage members.")
            .optional()
            .computed()
            .eventually_consistent(),
        )
        .build()
}

pub struct RoutingQueue {
    client: Client,
    descriptor: ResourceDescriptor,
}

impl RoutingQueue {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            descriptor: descriptor(),
        }
    }

    /// Put the queue into `division_id` unless it is already there. Creation
    /// carries the division in the body, so a queue not yet readable is left alone.
    async fn move_to_division(&self, id: &str, division_id: &str) -> Result<()> {
        match self.client.routing().get_queue(id).await {
            Ok(current) if ref_id(current.division.as_ref()).as_deref() == Some(division_id) => Ok(()),
            Ok(_) => {
                info!("Moving queue {} to division {}", id, division_id);
                self.client
                    .authorization()
                    .move_objects_to_division(division_id, "QUEUE", &[id.to_string()])
                    .await?;
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                debug!("Queue {} not readable yet, keeping division from create", id);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl ManagedResource for RoutingQueue {
    type Payload = Queue;

    fn descriptor(&self) -> &ResourceDescriptor {
        &self.descriptor
    }

    fn build(&self, desired: &State) -> Result<Queue> {
        let mut media_settings = BTreeMap::new();
        for (block, media_type) in MEDIA_TYPES {
            if let Some(settings) = desired.get_object(block)? {
                media_settings.insert(media_type.to_string(), build_media_setting(&settings)?);
            }
        }

        let wrapup_prompt = desired
            .get_string("acw_wrapup_prompt")?
            .unwrap_or_else(|| DEFAULT_ACW_PROMPT.to_string());
        let timeout_ms = if TIMED_ACW_PROMPTS.contains(&wrapup_prompt.as_str()) {
            desired.get_i64("acw_timeout_ms")?
        } else {
            None
        };

        Ok(Queue {
            id: None,
            name: Some(desired.require_string("name")?),
            division: ref_from(desired, "division_id")?,
            description: desired.get_string("description")?,
            media_settings: (!media_settings.is_empty()).then_some(media_settings),
            routing_rules: build_routing_rules(desired)?,
            bullseye: build_bullseye(desired)?,
            acw_settings: Some(AcwSettings {
                wrapup_prompt: Some(wrapup_prompt),
                timeout_ms,
            }),
            skill_evaluation_method: Some(
                desired
                    .get_string("skill_evaluation_method")?
                    .unwrap_or_else(|| DEFAULT_SKILL_EVALUATION.to_string()),
            ),
            queue_flow: ref_from(desired, "queue_flow_id")?,
            whisper_prompt: ref_from(desired, "whisper_prompt_id")?,
            auto_answer_only: Some(desired.get_bool("auto_answer_only")?.unwrap_or(true)),
            enable_transcription: Some(desired.get_bool("enable_transcription")?.unwrap_or(false)),
            enable_manual_assignment: Some(
                desired.get_bool("enable_manual_assignment")?.unwrap_or(false),
            ),
            calling_party_name: desired.get_string("calling_party_name")?,
            calling_party_number: desired.get_string("calling_party_number")?,
            default_scripts: build_default_scripts(desired)?,
            outbound_messaging_addresses: ref_from(desired, "outbound_messaging_sms_address_id")?
                .map(|sms| OutboundMessagingAddresses {
                    sms_address: Some(sms),
                }),
            outbound_email_address: desired
                .get_object("outbound_email_address")?
                .map(|email| -> Result<OutboundEmailAddress> {
                    Ok(OutboundEmailAddress {
                        domain: ref_from(&email, "domain_id")?,
                        route: ref_from(&email, "route_id")?,
                    })
                })
                .transpose()?,
        })
    }

    fn flatten(&self, queue: &Queue, state: &mut State) -> Result<()> {
        state.set("name", queue.name.clone());
        state.set("division_id", ref_id(queue.division.as_ref()));
        state.set("description", queue.description.clone());

        for (block, media_type) in MEDIA_TYPES {
            let settings = queue
                .media_settings
                .as_ref()
                .and_then(|settings| settings.get(*media_type))
                .map(flatten_media_setting);
            state.set(block, settings);
        }

        state.set(
            "routing_rules",
            queue.routing_rules.as_ref().map(|rules| {
                Dynamic::List(rules.iter().map(flatten_routing_rule).collect())
            }),
        );
        state.set(
            "bullseye_rings",
            queue
                .bullseye
                .as_ref()
                .map(|bullseye| Dynamic::List(bullseye.rings.iter().map(flatten_ring).collect())),
        );

        let acw = queue.acw_settings.clone().unwrap_or_default();
        state.set("acw_wrapup_prompt", acw.wrapup_prompt);
        state.set("acw_timeout_ms", acw.timeout_ms);

        state.set("skill_evaluation_method", queue.skill_evaluation_method.clone());
        state.set("queue_flow_id", ref_id(queue.queue_flow.as_ref()));
        state.set("whisper_prompt_id", ref_id(queue.whisper_prompt.as_ref()));
        state.set("auto_answer_only", queue.auto_answer_only);
        state.set("enable_transcription", queue.enable_transcription);
        state.set("enable_manual_assignment", queue.enable_manual_assignment);
        state.set("calling_party_name", queue.calling_party_name.clone());
        state.set("calling_party_number", queue.calling_party_number.clone());

        state.set(
            "default_script_ids",
            queue
                .default_scripts
                .as_ref()
                .filter(|scripts| !scripts.is_empty())
                .map(|scripts| {
                    Dynamic::Map(
                        scripts
                            .iter()
                            .filter_map(|(kind, script)| {
                                script.id.clone().map(|id| (kind.clone(), Dynamic::from(id)))
                            })
                            .collect(),
                    )
                }),
        );

        state.set(
            "outbound_messaging_sms_address_id",
            queue
                .outbound_messaging_addresses
                .as_ref()
                .and_then(|addresses| ref_id(addresses.sms_address.as_ref())),
        );
        state.set(
            "outbound_email_address",
            queue.outbound_email_address.as_ref().map(|email| {
                ObjectBuilder::new()
                    .field("domain_id", ref_id(email.domain.as_ref()))
                    .field("route_id", ref_id(email.route.as_ref()))
                    .build_block()
            }),
        );
        Ok(())
    }

    fn id_of(&self, queue: &Queue) -> Option<String> {
        queue.id.clone()
    }

    fn name_of(&self, queue: &Queue) -> String {
        queue.name.clone().unwrap_or_default()
    }

    async fn get(&self, id: &str) -> std::result::Result<Queue, RemoteError> {
        Ok(self.client.routing().get_queue(id).await?)
    }

    async fn list(
        &self,
        page_number: u32,
        page_size: u32,
    ) -> std::result::Result<Page<Queue>, RemoteError> {
        let listing = self
            .client
            .routing()
            .list_queues(PaginationParams::new(page_number, page_size))
            .await?;
        Ok(listing.into_page())
    }

    async fn create(&self, queue: &Queue) -> std::result::Result<Queue, RemoteError> {
        info!("Creating queue {}", queue.name.as_deref().unwrap_or_default());
        Ok(self.client.routing().create_queue(queue).await?)
    }

    async fn update(&self, id: &str, queue: &Queue) -> std::result::Result<Queue, RemoteError> {
        Ok(self.client.routing().update_queue(id, queue).await?)
    }

    async fn delete(&self, id: &str) -> std::result::Result<(), RemoteError> {
        info!("Deleting queue {}", id);
        Ok(self.client.routing().delete_queue(id).await?)
    }

    async fn after_write(&self, id: &str, desired: &State) -> Result<()> {
        if let Some(division_id) = desired.get_string("division_id")? {
            self.move_to_division(id, &division_id).await?;
        }

        let members = desired_members(desired)?;
        reconcile_members(
            &QueueMembership::new(&self.client),
            id,
            members.as_deref(),
            DEFAULT_BATCH_SIZE,
        )
        .await?;
        Ok(())
    }

    async fn read_related(&self, id: &str, state: &mut State) -> std::result::Result<(), RemoteError> {
        let members = QueueMembership::new(&self.client).list_members(id).await?;
        state.set(
            "members",
            Dynamic::List(
                members
                    .into_iter()
                    .map(|member| {
                        ObjectBuilder::new()
                            .field("user_id", member.id)
                            .field("ring_num", member.rank)
                            .build()
                    })
                    .collect(),
            ),
        );
        Ok(())
    }
}

/// `None` when the configuration leaves membership unmanaged.
fn desired_members(desired: &State) -> Result<Option<Vec<Member>>> {
    let Some(members) = desired.get_objects("members")? else {
        return Ok(None);
    };
    members
        .iter()
        .map(|member| {
            Ok(Member::new(
                member.require_string("user_id")?,
                member.get_i64("ring_num")?.unwrap_or(DEFAULT_RANK),
            ))
        })
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

fn build_media_setting(settings: &State) -> Result<MediaSetting> {
    Ok(MediaSetting {
        alerting_timeout_seconds: settings.get_i64("alerting_timeout_sec")?,
        service_level: Some(ServiceLevel {
            percentage: settings.get_f64("service_level_percentage")?,
            duration_ms: settings.get_i64("service_level_duration_ms")?,
        }),
    })
}

fn flatten_media_setting(setting: &MediaSetting) -> Dynamic {
    let service_level = setting.service_level.clone().unwrap_or_default();
    ObjectBuilder::new()
        .field("alerting_timeout_sec", setting.alerting_timeout_seconds)
        .field("service_level_percentage", service_level.percentage)
        .field("service_level_duration_ms", service_level.duration_ms)
        .build_block()
}

fn build_routing_rules(desired: &State) -> Result<Option<Vec<RoutingRule>>> {
    let Some(rules) = desired.get_objects("routing_rules")? else {
        return Ok(None);
    };
    if rules.len() > MAX_ROUTING_RULES {
        return Err(LifecycleError::validation(format!(
            "routing_rules accepts at most {} rules, got {}",
            MAX_ROUTING_RULES,
            rules.len()
        )));
    }
    rules
        .iter()
        .map(|rule| {
            Ok(RoutingRule {
                operator: Some(
                    rule.get_string("operator")?
                        .unwrap_or_else(|| DEFAULT_RULE_OPERATOR.to_string()),
                ),
                threshold: rule.get_i64("threshold")?,
                wait_seconds: Some(rule.get_f64("wait_seconds")?.unwrap_or(DEFAULT_RULE_WAIT_SECONDS)),
            })
        })
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

fn flatten_routing_rule(rule: &RoutingRule) -> Dynamic {
    ObjectBuilder::new()
        .field("operator", rule.operator.clone())
        .field("threshold", rule.threshold)
        .field("wait_seconds", rule.wait_seconds)
        .build()
}

fn build_bullseye(desired: &State) -> Result<Option<Bullseye>> {
    let Some(rings) = desired.get_objects("bullseye_rings")? else {
        return Ok(None);
    };
    if rings.len() > MAX_BULLSEYE_RINGS {
        return Err(LifecycleError::validation(format!(
            "bullseye_rings accepts at most {} rings, got {}",
            MAX_BULLSEYE_RINGS,
            rings.len()
        )));
    }
    let rings = rings
        .iter()
        .map(|ring| {
            let skills = ring.get_string_list("skills_to_remove")?.unwrap_or_default();
            Ok(Ring {
                expansion_criteria: ring.get_f64("expansion_timeout_seconds")?.map(|timeout| {
                    vec![ExpansionCriterion {
                        criterion_type: Some(EXPANSION_TIMEOUT_SECONDS.to_string()),
                        threshold: Some(timeout),
                    }]
                }),
                actions: (!skills.is_empty()).then(|| RingActions {
                    skills_to_remove: Some(refs_from_ids(skills)),
                }),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Some(Bullseye { rings }))
}

fn flatten_ring(ring: &Ring) -> Dynamic {
    let timeout = ring
        .expansion_criteria
        .iter()
        .flatten()
        .find(|c| c.criterion_type.as_deref() == Some(EXPANSION_TIMEOUT_SECONDS))
        .and_then(|c| c.threshold);
    let skills = ring
        .actions
        .as_ref()
        .and_then(|actions| actions.skills_to_remove.as_deref())
        .map(ids_of)
        .unwrap_or_default();
    ObjectBuilder::new()
        .field("expansion_timeout_seconds", timeout)
        .field("skills_to_remove", Dynamic::string_list(skills))
        .build()
}

fn build_default_scripts(desired: &State) -> Result<Option<BTreeMap<String, DomainEntityRef>>> {
    let Some(scripts) = desired.get("default_script_ids").and_then(Dynamic::as_map) else {
        return Ok(None);
    };
    scripts
        .iter()
        .map(|(kind, script_id)| {
            if !SCRIPT_COMMUNICATION_TYPES.contains(&kind.as_str()) {
                return Err(LifecycleError::validation(format!(
                    "{} is an invalid communication type key",
                    kind
                )));
            }
            let script_id = script_id.as_string().ok_or_else(|| {
                LifecycleError::validation(format!("default_script_ids.{} must be a string", kind))
            })?;
            Ok((kind.clone(), DomainEntityRef::id(script_id)))
        })
        .collect::<Result<BTreeMap<_, _>>>()
        .map(Some)
}

/// Queue membership over the bulk member endpoints
pub struct QueueMembership<'a> {
    client: &'a Client,
}

impl<'a> QueueMembership<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MembershipClient for QueueMembership<'_> {
    async fn list_members(&self, queue_id: &str) -> std::result::Result<Vec<Member>, RemoteError> {
        let mut members = Vec::new();
        let mut page_number = 1;
        loop {
            let page = self
                .client
                .routing()
                .list_queue_members(queue_id, PaginationParams::new(page_number, DEFAULT_BATCH_SIZE as u32))
                .await?;
            if page.entities.is_empty() {
                break;
            }
            members.extend(page.entities.into_iter().filter_map(|member| {
                member
                    .id
                    .map(|id| Member::new(id, member.ring_number.unwrap_or(DEFAULT_RANK)))
            }));
            page_number += 1;
        }
        Ok(members)
    }

    async fn add_members(
        &self,
        queue_id: &str,
        user_ids: &[String],
    ) -> std::result::Result<(), RemoteError> {
        debug!("Adding {} members to queue {}", user_ids.len(), queue_id);
        Ok(self
            .client
            .routing()
            .post_queue_members(queue_id, user_ids, false)
            .await?)
    }

    async fn remove_members(
        &self,
        queue_id: &str,
        user_ids: &[String],
    ) -> std::result::Result<(), RemoteError> {
        debug!("Removing {} members from queue {}", user_ids.len(), queue_id);
        Ok(self
            .client
            .routing()
            .post_queue_members(queue_id, user_ids, true)
            .await?)
    }

    async fn set_member_rank(
        &self,
        queue_id: &str,
        member: &Member,
    ) -> std::result::Result<(), RemoteError> {
        Ok(self
            .client
            .routing()
            .set_queue_member_ring(queue_id, &member.id, member.rank)
            .await?)
    }
}
