use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Kubernetes-style status condition. At most one entry per `type_` is kept
/// in a conditions list; see `controller::conditions` for the update rules.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: ConditionStatus,
    /// Short CamelCase code for the last transition.
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
    /// RFC 3339 timestamp of the last status or reason change.
    #[serde(default)]
    pub last_transition_time: String,
}

#[derive(
    Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema,
)]
#[serde(rename_all = "PascalCase")]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_kubernetes_field_names() {
        let cond = Condition {
            type_: "ChildReady".into(),
            status: ConditionStatus::True,
            reason: "Created".into(),
            message: String::new(),
            last_transition_time: "2023-01-01T00:00:00Z".into(),
        };
        let v = serde_json::to_value(&cond).unwrap();
        assert_eq!(v["type"], "ChildReady");
        assert_eq!(v["status"], "True");
        assert_eq!(v["lastTransitionTime"], "2023-01-01T00:00:00Z");
    }

    #[test]
    fn missing_reason_and_message_default_to_empty() {
        let cond: Condition = serde_json::from_value(serde_json::json!({
            "type": "ChildReady",
            "status": "Unknown",
        }))
        .unwrap();
        assert_eq!(cond.status, ConditionStatus::Unknown);
        assert!(cond.reason.is_empty());
        assert!(cond.message.is_empty());
    }
}
