use std::collections::BTreeMap;

use crate::types::Step;

/// A named set of steps executed as one logical transaction.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Saga {
    pub name: String,

    #[serde(
        default,
        deserialize_with = "crate::types::null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub description: String,

    #[serde(default, deserialize_with = "crate::types::null_as_default")]
    pub steps: Vec<Step>,

    #[serde(
        default,
        deserialize_with = "crate::types::null_as_default",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub metadata: BTreeMap<String, String>,
}

impl Saga {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            steps: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }
}

/// Top-level shape of a saga configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SagaConfig {
    #[serde(default, deserialize_with = "crate::types::null_as_default")]
    pub sagas: Vec<Saga>,
}
