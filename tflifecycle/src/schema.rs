//! Resource descriptors
//!
//! A `ResourceDescriptor` names a manageable object type and lists the
//! attributes it manages locally. The consistency checker and the
//! configuration validation step are both driven from it.

use crate::error::Result;
use crate::types::State;
use crate::validator::{Diagnostics, Validator};
use std::sync::Arc;

/// Semantic type of a managed attribute
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeType {
    String,
    Bool,
    Int,
    Float,
    /// Ordered, allows duplicates
    List(Box<AttributeType>),
    /// Unordered, no duplicates
    Set(Box<AttributeType>),
    /// String keys to values of one type
    Map(Box<AttributeType>),
    /// Fixed structure; nested blocks are a list or set of objects
    Object(Vec<AttributeSchema>),
}

impl AttributeType {
    pub fn is_unordered(&self) -> bool {
        matches!(self, AttributeType::Set(_))
    }
}

#[derive(Clone)]
pub struct AttributeSchema {
    pub name: String,
    pub r#type: AttributeType,
    pub description: String,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub sensitive: bool,
    /// The remote API is known to lag behind writes for this attribute
    pub eventually_consistent: bool,
    pub validators: Vec<Arc<dyn Validator>>,
}

// Manual Debug implementation since validators don't implement Debug
impl std::fmt::Debug for AttributeSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttributeSchema")
            .field("name", &self.name)
            .field("type", &self.r#type)
            .field("required", &self.required)
            .field("optional", &self.optional)
            .field("computed", &self.computed)
            .field("sensitive", &self.sensitive)
            .field("eventually_consistent", &self.eventually_consistent)
            .field(
                "validators",
                &format!("{} validators", self.validators.len()),
            )
            .finish()
    }
}

impl PartialEq for AttributeSchema {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.r#type == other.r#type
            && self.required == other.required
            && self.optional == other.optional
            && self.computed == other.computed
            && self.sensitive == other.sensitive
            && self.eventually_consistent == other.eventually_consistent
    }
}

impl AttributeSchema {
    /// Computed-only attributes carry no local opinion.
    pub fn is_computed_only(&self) -> bool {
        self.computed && !self.required && !self.optional
    }

    pub fn nested(&self) -> Option<&[AttributeSchema]> {
        match &self.r#type {
            AttributeType::Object(fields) => Some(fields),
            AttributeType::List(inner) | AttributeType::Set(inner) => match inner.as_ref() {
                AttributeType::Object(fields) => Some(fields),
                _ => None,
            },
            _ => None,
        }
    }
}

pub struct AttributeBuilder {
    attribute: AttributeSchema,
}

impl AttributeBuilder {
    pub fn new(name: &str, r#type: AttributeType) -> Self {
        Self {
            attribute: AttributeSchema {
                name: name.to_string(),
                r#type,
                description: String::new(),
                required: false,
                optional: false,
                computed: false,
                sensitive: false,
                eventually_consistent: false,
                validators: Vec::new(),
            },
        }
    }

    pub fn string(name: &str) -> Self {
        Self::new(name, AttributeType::String)
    }

    pub fn bool(name: &str) -> Self {
        Self::new(name, AttributeType::Bool)
    }

    pub fn int(name: &str) -> Self {
        Self::new(name, AttributeType::Int)
    }

    pub fn float(name: &str) -> Self {
        Self::new(name, AttributeType::Float)
    }

    pub fn string_set(name: &str) -> Self {
        Self::new(name, AttributeType::Set(Box::new(AttributeType::String)))
    }

    pub fn string_list(name: &str) -> Self {
        Self::new(name, AttributeType::List(Box::new(AttributeType::String)))
    }

    pub fn string_map(name: &str) -> Self {
        Self::new(name, AttributeType::Map(Box::new(AttributeType::String)))
    }

    /// A nested block, carried as a set of objects
    pub fn block_set(name: &str, fields: Vec<AttributeSchema>) -> Self {
        Self::new(
            name,
            AttributeType::Set(Box::new(AttributeType::Object(fields))),
        )
    }

    /// A nested block, carried as a list of objects
    pub fn block_list(name: &str, fields: Vec<AttributeSchema>) -> Self {
        Self::new(
            name,
            AttributeType::List(Box::new(AttributeType::Object(fields))),
        )
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.attribute.description = desc.to_string();
        self
    }

    pub fn required(mut self) -> Self {
        self.attribute.required = true;
        self.attribute.optional = false;
        self
    }

    pub fn optional(mut self) -> Self {
        self.attribute.optional = true;
        self.attribute.required = false;
        self
    }

    pub fn computed(mut self) -> Self {
        self.attribute.computed = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.attribute.sensitive = true;
        self
    }

    pub fn eventually_consistent(mut self) -> Self {
        self.attribute.eventually_consistent = true;
        self
    }

    pub fn validator(mut self, validator: impl Validator + 'static) -> Self {
        self.attribute.validators.push(Arc::new(validator));
        self
    }

    pub fn build(self) -> AttributeSchema {
        self.attribute
    }
}

/// Identifies a manageable object type and its locally managed attributes
#[derive(Debug, Clone)]
pub struct ResourceDescriptor {
    pub type_name: String,
    pub description: String,
    pub version: i64,
    pub attributes: Vec<AttributeSchema>,
}

impl ResourceDescriptor {
    pub fn attribute(&self, name: &str) -> Option<&AttributeSchema> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Check required attributes and run attribute validators against the
    /// desired state. Never touches the remote system.
    pub fn validate(&self, desired: &State) -> Result<()> {
        let mut diagnostics = Diagnostics::new();
        for attribute in &self.attributes {
            let value = desired.get(&attribute.name);
            validate_attribute(attribute, value, &attribute.name, &mut diagnostics);
        }
        diagnostics.into_result()
    }
}

fn validate_attribute(
    attribute: &AttributeSchema,
    value: Option<&crate::types::Dynamic>,
    path: &str,
    diagnostics: &mut Diagnostics,
) {
    let Some(value) = value.filter(|v| !v.is_null()) else {
        if attribute.required {
            diagnostics.add_error(format!("{} is required", path), None::<String>);
        }
        return;
    };

    for validator in &attribute.validators {
        validator.validate(value, path, diagnostics);
    }

    if let Some(fields) = attribute.nested() {
        let elements: Vec<&crate::types::Dynamic> = match value.as_list() {
            Some(items) => items.iter().collect(),
            None => vec![value],
        };
        for (idx, element) in elements.into_iter().enumerate() {
            let Some(map) = element.as_map() else {
                continue;
            };
            for field in fields {
                let nested_path = format!("{}.{}.{}", path, idx, field.name);
                validate_attribute(
                    field,
                    map.get(&field.name).filter(|v| !v.is_null()),
                    &nested_path,
                    diagnostics,
                );
            }
        }
    } else if let AttributeType::List(_) | AttributeType::Set(_) = attribute.r#type {
        if let Some(items) = value.as_list() {
            for item in items {
                for validator in &attribute.validators {
                    validator.validate(item, path, diagnostics);
                }
            }
        }
    } else if let AttributeType::Map(_) = attribute.r#type {
        if let Some(entries) = value.as_map() {
            for (key, item) in entries {
                let entry_path = format!("{}.{}", path, key);
                for validator in &attribute.validators {
                    validator.validate(item, &entry_path, diagnostics);
                }
            }
        }
    }
}

pub struct DescriptorBuilder {
    descriptor: ResourceDescriptor,
}

impl DescriptorBuilder {
    pub fn new(type_name: &str) -> Self {
        Self {
            descriptor: ResourceDescriptor {
                type_name: type_name.to_string(),
                description: String::new(),
                version: 0,
                attributes: Vec::new(),
            },
        }
    }

    pub fn description(mut self, description: &str) -> Self {
        self.descriptor.description = description.to_string();
        self
    }

    pub fn version(mut self, version: i64) -> Self {
        self.descriptor.version = version;
        self
    }

    pub fn attribute(mut self, attribute: AttributeBuilder) -> Self {
        self.descriptor.attributes.push(attribute.build());
        self
    }

    pub fn build(self) -> ResourceDescriptor {
        self.descriptor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ObjectBuilder;
    use crate::validator::{NumberRangeValidator, StringInSliceValidator};

    fn descriptor() -> ResourceDescriptor {
        DescriptorBuilder::new("test_action_map")
            .attribute(AttributeBuilder::string("display_name").required())
            .attribute(
                AttributeBuilder::int("weight")
                    .optional()
                    .validator(NumberRangeValidator {
                        min: Some(1.0),
                        max: Some(3.0),
                    }),
            )
            .attribute(
                AttributeBuilder::block_set(
                    "activation",
                    vec![AttributeBuilder::string("type")
                        .required()
                        .validator(StringInSliceValidator::new(&["immediate", "delay"]))
                        .build()],
                )
                .required(),
            )
            .attribute(AttributeBuilder::string("self_uri").computed())
            .build()
    }

    #[test]
    fn descriptor_finds_attributes() {
        let d = descriptor();
        assert!(d.attribute("display_name").unwrap().required);
        assert!(d.attribute("self_uri").unwrap().is_computed_only());
        assert!(d.attribute("activation").unwrap().nested().is_some());
        assert!(d.attribute("nope").is_none());
    }

    #[test]
    fn validate_accepts_valid_state() {
        let state = State::new()
            .with("display_name", "map")
            .with("weight", 2i64)
            .with(
                "activation",
                ObjectBuilder::new().field("type", "immediate").build_block(),
            );
        assert!(descriptor().validate(&state).is_ok());
    }

    #[test]
    fn validate_reports_missing_required_and_nested_errors() {
        let state = State::new().with("weight", 7i64).with(
            "activation",
            ObjectBuilder::new().field("type", "later").build_block(),
        );

        let err = descriptor().validate(&state).unwrap_err().to_string();
        assert!(err.contains("display_name is required"));
        assert!(err.contains("weight must be at most 3"));
        assert!(err.contains("activation.0.type must be one of"));
    }
}
