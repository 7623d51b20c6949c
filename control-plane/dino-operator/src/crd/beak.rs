use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(
    CustomResource,
    Deserialize,
    Serialize,
    Clone,
    Debug,
    Default,
    PartialEq,
    Eq,
    JsonSchema,
)]
#[kube(
    group = "dino.hpe.com",
    version = "v1alpha1",
    kind = "Beak",
    plural = "beaks",
    namespaced,
    status = "BeakStatus"
)]
pub struct BeakSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub foo: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct BeakStatus {}
