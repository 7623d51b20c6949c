use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::condition::Condition;

// Condition types are nouns.

/// Whether the matching Beak resource exists.
pub const BIRD_CONDITION_CHILD_READY: &str = "ChildReady";

// Condition reasons are past-tense verbs describing the last transition.

/// The matching Beak resource was created (or found already present).
pub const BIRD_REASON_CREATED: &str = "Created";

#[derive(
    CustomResource,
    Deserialize,
    Serialize,
    Clone,
    Debug,
    Default,
    PartialEq,
    JsonSchema,
)]
#[kube(
    group = "dino.hpe.com",
    version = "v1alpha1",
    kind = "Bird",
    plural = "birds",
    namespaced,
    status = "BirdStatus"
)]
pub struct BirdSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foo: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct BirdStatus {
    /// Observations of the Bird's current state, keyed by condition type.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}
