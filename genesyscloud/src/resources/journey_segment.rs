//! genesyscloud_journey_segment

use async_trait::async_trait;
use std::sync::LazyLock;
use tflifecycle::schema::AttributeSchema;
use tflifecycle::validator::{StringInSliceValidator, StringPatternValidator};
use tflifecycle::{
    AttributeBuilder, DescriptorBuilder, Dynamic, ManagedResource, ObjectBuilder, Page,
    RemoteError, ResourceDescriptor, Result, State,
};
use tracing::info;

use crate::api::journey::{
    ContextPattern, Criteria, EntityTypeCriteria, ExternalSegment, Journey, JourneyPattern,
    JourneySegment, SegmentContext,
};
use crate::api::{Client, PaginationParams};

pub const TYPE_NAME: &str = "genesyscloud_journey_segment";

pub(crate) const CRITERIA_OPERATORS: &[&str] = &[
    "containsAll",
    "containsAny",
    "notContainsAll",
    "notContainsAny",
    "equal",
    "notEqual",
    "greaterThan",
    "greaterThanOrEqual",
    "lessThan",
    "lessThanOrEqual",
    "startsWith",
    "endsWith",
];

pub(crate) const STREAM_TYPES: &[&str] = &["Web", "Custom", "Conversation"];

fn criteria_fields(with_entity_type: bool) -> Vec<AttributeSchema> {
    let mut fields = vec![
        AttributeBuilder::string("key").description("The criteria key.").required().build(),
        AttributeBuilder::string_set("values")
            .description("The criteria values.")
            .required()
            .build(),
        AttributeBuilder::bool("should_ignore_case")
            .description("Should criteria be case insensitive.")
            .required()
            .build(),
        AttributeBuilder::string("operator")
            .description("The comparison operator.")
            .optional()
            .validator(StringInSliceValidator::new(CRITERIA_OPERATORS))
            .build(),
    ];
    if with_entity_type {
        fields.push(
            AttributeBuilder::string("entity_type")
                .description("The entity to match the pattern against.")
                .optional()
                .validator(StringInSliceValidator::new(&["visit"]))
                .build(),
        );
    }
    fields
}

fn descriptor() -> ResourceDescriptor {
    let context_pattern = vec![AttributeBuilder::block_set("criteria", criteria_fields(true))
        .required()
        .build()];
    let journey_pattern = vec![
        AttributeBuilder::block_set("criteria", criteria_fields(false))
            .required()
            .build(),
        AttributeBuilder::int("count")
            .description("The number of times the pattern must match.")
            .optional()
            .build(),
        AttributeBuilder::string("stream_type")
            .required()
            .validator(StringInSliceValidator::new(STREAM_TYPES))
            .build(),
        AttributeBuilder::string("session_type").required().build(),
        AttributeBuilder::string("event_name").optional().build(),
    ];

    DescriptorBuilder::new(TYPE_NAME)
        .description("Genesys Cloud Journey Segment")
        .version(1)
        .attribute(
            AttributeBuilder::bool("is_active")
                .description("Whether or not the segment is active.")
                .optional(),
        )
        .attribute(
            AttributeBuilder::string("display_name")
                .description("The display name of the segment.")
                .required(),
        )
        .attribute(
            AttributeBuilder::int("version")
                .description("The version of the segment.")
                .computed(),
        )
        .attribute(AttributeBuilder::string("description").optional())
        .attribute(
            AttributeBuilder::string("color")
                .description("The hexadecimal color value of the segment.")
                .optional()
                .validator(StringPatternValidator {
                    pattern: HEX_COLOR.clone(),
                    description: "a hex color such as #008000".to_string(),
                }),
        )
        .attribute(
            AttributeBuilder::string("scope")
                .description("The target entity that a segment applies to.")
                .optional()
                .validator(StringInSliceValidator::new(&["Session", "Customer"])),
        )
        .attribute(AttributeBuilder::bool("should_display_to_agent").optional())
        .attribute(
            AttributeBuilder::block_list(
                "context",
                vec![AttributeBuilder::block_set("patterns", context_pattern)
                    .required()
                    .build()],
            )
            .optional(),
        )
        .attribute(
            AttributeBuilder::block_list(
                "journey",
                vec![AttributeBuilder::block_set("patterns", journey_pattern)
                    .required()
                    .build()],
            )
            .optional(),
        )
        .attribute(
            AttributeBuilder::block_list(
                "external_segment",
                vec![
                    AttributeBuilder::string("id").computed().build(),
                    AttributeBuilder::string("name").required().build(),
                    AttributeBuilder::string("source")
                        .required()
                        .validator(StringInSliceValidator::new(&["AdobeExperiencePlatform", "Custom"]))
                        .build(),
                ],
            )
            .optional(),
        )
        .attribute(AttributeBuilder::int("assignment_expiration_days").optional())
        .attribute(AttributeBuilder::string("self_uri").computed())
        .attribute(AttributeBuilder::string("created_date").computed())
        .attribute(AttributeBuilder::string("modified_date").computed())
        .build()
}

static HEX_COLOR: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^#[0-9a-fA-F]{6}$").expect("HEX_COLOR is a valid regex pattern")
});

pub struct JourneySegmentResource {
    client: Client,
    descriptor: ResourceDescriptor,
}

impl JourneySegmentResource {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            descriptor: descriptor(),
        }
    }
}

#[async_trait]
impl ManagedResource for JourneySegmentResource {
    type Payload = JourneySegment;

    const VERSIONED: bool = true;

    fn descriptor(&self) -> &ResourceDescriptor {
        &self.descriptor
    }

    fn build(&self, desired: &State) -> Result<JourneySegment> {
        Ok(JourneySegment {
            is_active: desired.get_bool("is_active")?,
            display_name: Some(desired.require_string("display_name")?),
            description: desired.get_string("description")?,
            color: desired.get_string("color")?,
            scope: desired.get_string("scope")?,
            should_display_to_agent: desired.get_bool("should_display_to_agent")?,
            context: desired
                .get_object("context")?
                .map(|context| build_context(&context))
                .transpose()?,
            journey: desired
                .get_object("journey")?
                .map(|journey| build_journey(&journey))
                .transpose()?,
            external_segment: desired
                .get_object("external_segment")?
                .map(|external| -> Result<ExternalSegment> {
                    Ok(ExternalSegment {
                        id: None,
                        name: external.get_string("name")?,
                        source: external.get_string("source")?,
                    })
                })
                .transpose()?,
            assignment_expiration_days: desired.get_i64("assignment_expiration_days")?,
            ..JourneySegment::default()
        })
    }

    fn flatten(&self, segment: &JourneySegment, state: &mut State) -> Result<()> {
        state.set("is_active", segment.is_active);
        state.set("display_name", segment.display_name.clone());
        state.set("version", segment.version);
        state.set("description", segment.description.clone());
        state.set("color", segment.color.clone());
        state.set("scope", segment.scope.clone());
        state.set("should_display_to_agent", segment.should_display_to_agent);
        state.set("context", segment.context.as_ref().map(flatten_context));
        state.set("journey", segment.journey.as_ref().map(flatten_journey));
        state.set(
            "external_segment",
            segment.external_segment.as_ref().map(|external| {
                ObjectBuilder::new()
                    .field("id", external.id.clone())
                    .field("name", external.name.clone())
                    .field("source", external.source.clone())
                    .build_block()
            }),
        );
        state.set("assignment_expiration_days", segment.assignment_expiration_days);
        state.set("self_uri", segment.self_uri.clone());
        state.set("created_date", segment.created_date.clone());
        state.set("modified_date", segment.modified_date.clone());
        Ok(())
    }

    fn id_of(&self, segment: &JourneySegment) -> Option<String> {
        segment.id.clone()
    }

    fn name_of(&self, segment: &JourneySegment) -> String {
        segment.display_name.clone().unwrap_or_default()
    }

    async fn get(&self, id: &str) -> std::result::Result<JourneySegment, RemoteError> {
        Ok(self.client.journey().get_segment(id).await?)
    }

    async fn list(
        &self,
        page_number: u32,
        page_size: u32,
    ) -> std::result::Result<Page<JourneySegment>, RemoteError> {
        let listing = self
            .client
            .journey()
            .list_segments(PaginationParams::new(page_number, page_size))
            .await?;
        Ok(Page::new(listing.entities))
    }

    async fn create(&self, segment: &JourneySegment) -> std::result::Result<JourneySegment, RemoteError> {
        info!(
            "Creating journey segment {}",
            segment.display_name.as_deref().unwrap_or_default()
        );
        Ok(self.client.journey().create_segment(segment).await?)
    }

    async fn update(
        &self,
        id: &str,
        segment: &JourneySegment,
    ) -> std::result::Result<JourneySegment, RemoteError> {
        Ok(self.client.journey().patch_segment(id, segment).await?)
    }

    async fn delete(&self, id: &str) -> std::result::Result<(), RemoteError> {
        info!("Deleting journey segment {}", id);
        Ok(self.client.journey().delete_segment(id).await?)
    }

    fn version_of(&self, segment: &JourneySegment) -> Option<i64> {
        segment.version
    }

    fn set_version(&self, segment: &mut JourneySegment, version: i64) {
        segment.version = Some(version);
    }

    /// Deleted segments stay readable as inactive.
    fn is_deleted(&self, segment: &JourneySegment) -> bool {
        segment.is_active == Some(false)
    }
}

fn build_context(context: &State) -> Result<SegmentContext> {
    let patterns = context
        .get_objects("patterns")?
        .unwrap_or_default()
        .iter()
        .map(|pattern| {
            let criteria = pattern
                .get_objects("criteria")?
                .unwrap_or_default()
                .iter()
                .map(|c| {
                    Ok(EntityTypeCriteria {
                        key: c.get_string("key")?,
                        values: c.get_string_list("values")?.unwrap_or_default(),
                        should_ignore_case: c.get_bool("should_ignore_case")?,
                        operator: c.get_string("operator")?,
                        entity_type: c.get_string("entity_type")?,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(ContextPattern { criteria })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(SegmentContext { patterns })
}

fn build_journey(journey: &State) -> Result<Journey> {
    let patterns = journey
        .get_objects("patterns")?
        .unwrap_or_default()
        .iter()
        .map(|pattern| {
            let criteria = pattern
                .get_objects("criteria")?
                .unwrap_or_default()
                .iter()
                .map(|c| {
                    Ok(Criteria {
                        key: c.get_string("key")?,
                        values: c.get_string_list("values")?.unwrap_or_default(),
                        should_ignore_case: c.get_bool("should_ignore_case")?,
                        operator: c.get_string("operator")?,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(JourneyPattern {
                criteria,
                count: pattern.get_i64("count")?,
                stream_type: pattern.get_string("stream_type")?,
                session_type: pattern.get_string("session_type")?,
                event_name: pattern.get_string("event_name")?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Journey { patterns })
}

fn flatten_context(context: &SegmentContext) -> Dynamic {
    let patterns = context
        .patterns
        .iter()
        .map(|pattern| {
            let criteria = pattern
                .criteria
                .iter()
                .map(|c| {
                    ObjectBuilder::new()
                        .field("key", c.key.clone())
                        .field("values", Dynamic::string_list(c.values.clone()))
                        .field("should_ignore_case", c.should_ignore_case)
                        .field("operator", c.operator.clone())
                        .field("entity_type", c.entity_type.clone())
                        .build()
                })
                .collect();
            ObjectBuilder::new()
                .field("criteria", Dynamic::List(criteria))
                .build()
        })
        .collect();
    ObjectBuilder::new()
        .field("patterns", Dynamic::List(patterns))
        .build_block()
}

fn flatten_journey(journey: &Journey) -> Dynamic {
    let patterns = journey
        .patterns
        .iter()
        .map(|pattern| {
            let criteria = pattern
                .criteria
                .iter()
                .map(|c| {
                    ObjectBuilder::new()
                        .field("key", c.key.clone())
                        .field("values", Dynamic::string_list(c.values.clone()))
                        .field("should_ignore_case", c.should_ignore_case)
                        .field("operator", c.operator.clone())
                        .build()
                })
                .collect();
            ObjectBuilder::new()
                .field("criteria", Dynamic::List(criteria))
                .field("count", pattern.count)
                .field("stream_type", pattern.stream_type.clone())
                .field("session_type", pattern.session_type.clone())
                .field("event_name", pattern.event_name.clone())
                .build()
        })
        .collect();
    ObjectBuilder::new()
        .field("patterns", Dynamic::List(patterns))
        .build_block()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource() -> JourneySegmentResource {
        JourneySegmentResource::new(Client::new("https://api.mypurecloud.com", "token").unwrap())
    }

    fn journey_block() -> Dynamic {
        ObjectBuilder::new()
            .field(
                "patterns",
                Dynamic::List(vec![ObjectBuilder::new()
                    .field(
                        "criteria",
                        Dynamic::List(vec![ObjectBuilder::new()
                            .field("key", "page.hostname")
                            .field("values", Dynamic::string_list(["example.com", "example.org"]))
                            .field("should_ignore_case", true)
                            .field("operator", "containsAny")
                            .build()]),
                    )
                    .field("count", 1i64)
                    .field("stream_type", "Web")
                    .field("session_type", "web")
                    .build()]),
            )
            .build_block()
    }

    fn desired() -> State {
        State::new()
            .with("display_name", "Returning visitors")
            .with("color", "#008000")
            .with("scope", "Customer")
            .with("journey", journey_block())
    }

    #[test]
    fn build_and_flatten_agree() {
        let resource = resource();
        let segment = resource.build(&desired()).unwrap();

        let pattern = &segment.journey.as_ref().unwrap().patterns[0];
        assert_eq!(pattern.stream_type.as_deref(), Some("Web"));
        assert_eq!(pattern.criteria[0].values, vec!["example.com", "example.org"]);

        let mut state = State::with_id("s1");
        resource.flatten(&segment, &mut state).unwrap();
        assert_eq!(state.get("journey"), Some(&journey_block()));
        assert_eq!(state.get_string("scope").unwrap().as_deref(), Some("Customer"));
    }

    #[test]
    fn inactive_segment_counts_as_deleted() {
        let resource = resource();
        let mut segment = resource.build(&desired()).unwrap();
        assert!(!resource.is_deleted(&segment));
        segment.is_active = Some(false);
        assert!(resource.is_deleted(&segment));
    }

    #[test]
    fn descriptor_rejects_bad_color_and_stream_type() {
        let mut journey = journey_block();
        if let Dynamic::List(blocks) = &mut journey {
            if let Some(Dynamic::Map(block)) = blocks.first_mut() {
                if let Some(Dynamic::List(patterns)) = block.get_mut("patterns") {
                    if let Some(Dynamic::Map(pattern)) = patterns.first_mut() {
                        pattern.insert("stream_type".to_string(), Dynamic::from("Email"));
                    }
                }
            }
        }
        let desired = desired().with("color", "green").with("journey", journey);

        let err = resource().descriptor().validate(&desired).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("color must match a hex color"));
        assert!(message.contains("journey.0.patterns.0.stream_type must be one of"));
    }
}
