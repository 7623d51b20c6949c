//! Condition ledger: keeps at most one [`Condition`] per type, in
//! first-insertion order, and only stamps a new `lastTransitionTime` when the
//! status or the reason actually changes.
//!
//! Every mutating function reports whether the list changed so callers can
//! skip the status write entirely when nothing moved.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::crd::{Condition, ConditionStatus};

#[derive(Clone, Copy, Debug)]
pub struct ConditionUpdate<'a> {
    pub type_: &'a str,
    pub status: ConditionStatus,
    pub reason: &'a str,
    pub message: &'a str,
}

pub fn find<'a>(conds: &'a [Condition], type_: &str) -> Option<&'a Condition> {
    conds.iter().find(|c| c.type_ == type_)
}

pub fn is_true(conds: &[Condition], type_: &str) -> bool {
    find(conds, type_).is_some_and(|c| c.status == ConditionStatus::True)
}

pub fn is_false(conds: &[Condition], type_: &str) -> bool {
    find(conds, type_).is_some_and(|c| c.status == ConditionStatus::False)
}

/// Upsert `update`. A different status or reason replaces the entry with a
/// fresh transition time; a message-only difference rewrites the message and
/// keeps the transition time.
pub fn set_condition(
    conds: &mut Vec<Condition>,
    update: ConditionUpdate<'_>,
    now: DateTime<Utc>,
) -> bool {
    match conds.iter_mut().find(|c| c.type_ == update.type_) {
        Some(c) if c.status == update.status && c.reason == update.reason => {
            if c.message == update.message {
                false
            } else {
                c.message = update.message.to_string();
                true
            }
        }
        Some(c) => {
            *c = build(update, now);
            true
        }
        None => {
            conds.push(build(update, now));
            true
        }
    }
}

pub fn set_true(conds: &mut Vec<Condition>, type_: &str, reason: &str) -> bool {
    set_status(conds, type_, ConditionStatus::True, reason, Utc::now())
}

pub fn set_false(
    conds: &mut Vec<Condition>,
    type_: &str,
    reason: &str,
) -> bool {
    set_status(conds, type_, ConditionStatus::False, reason, Utc::now())
}

pub fn set_unknown(
    conds: &mut Vec<Condition>,
    type_: &str,
    reason: &str,
) -> bool {
    set_status(conds, type_, ConditionStatus::Unknown, reason, Utc::now())
}

// Same status and reason is a no-op regardless of the stored message.
fn set_status(
    conds: &mut Vec<Condition>,
    type_: &str,
    status: ConditionStatus,
    reason: &str,
    now: DateTime<Utc>,
) -> bool {
    if find(conds, type_).is_some_and(|c| c.status == status && c.reason == reason)
    {
        return false;
    }
    set_condition(
        conds,
        ConditionUpdate {
            type_,
            status,
            reason,
            message: "",
        },
        now,
    )
}

fn build(update: ConditionUpdate<'_>, now: DateTime<Utc>) -> Condition {
    Condition {
        type_: update.type_.to_string(),
        status: update.status,
        reason: update.reason.to_string(),
        message: update.message.to_string(),
        last_transition_time: now.to_rfc3339_opts(SecondsFormat::Secs, true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn update<'a>(
        status: ConditionStatus,
        reason: &'a str,
        message: &'a str,
    ) -> ConditionUpdate<'a> {
        ConditionUpdate {
            type_: "ChildReady",
            status,
            reason,
            message,
        }
    }

    #[test]
    fn set_true_inserts_then_is_idempotent() {
        let mut conds = Vec::new();
        assert!(set_true(&mut conds, "ChildReady", "Created"));
        let first = conds[0].clone();
        assert_eq!(first.status, ConditionStatus::True);
        assert_eq!(first.reason, "Created");
        assert!(first.message.is_empty());
        assert!(!first.last_transition_time.is_empty());

        for _ in 0..3 {
            assert!(!set_true(&mut conds, "ChildReady", "Created"));
        }
        assert_eq!(conds, vec![first]);
    }

    #[test]
    fn reason_change_is_a_transition() {
        let mut conds = Vec::new();
        set_condition(&mut conds, update(ConditionStatus::True, "A", ""), at(0));
        assert!(set_condition(
            &mut conds,
            update(ConditionStatus::True, "B", ""),
            at(10)
        ));
        assert_eq!(conds[0].reason, "B");
        assert_eq!(conds[0].last_transition_time, "2023-11-14T22:13:30Z");
    }

    #[test]
    fn status_change_is_a_transition() {
        let mut conds = Vec::new();
        set_condition(&mut conds, update(ConditionStatus::True, "A", ""), at(0));
        let before = conds[0].last_transition_time.clone();
        assert!(set_condition(
            &mut conds,
            update(ConditionStatus::False, "A", ""),
            at(60)
        ));
        assert!(is_false(&conds, "ChildReady"));
        assert_ne!(conds[0].last_transition_time, before);
    }

    #[test]
    fn message_only_change_keeps_transition_time() {
        let mut conds = Vec::new();
        set_condition(
            &mut conds,
            update(ConditionStatus::True, "A", "one"),
            at(0),
        );
        let before = conds[0].last_transition_time.clone();
        assert!(set_condition(
            &mut conds,
            update(ConditionStatus::True, "A", "two"),
            at(60)
        ));
        assert_eq!(conds[0].message, "two");
        assert_eq!(conds[0].last_transition_time, before);
        assert!(!set_condition(
            &mut conds,
            update(ConditionStatus::True, "A", "two"),
            at(120)
        ));
    }

    #[test]
    fn set_true_ignores_stored_message() {
        let mut conds = Vec::new();
        set_condition(
            &mut conds,
            update(ConditionStatus::True, "Created", "hello"),
            at(0),
        );
        assert!(!set_true(&mut conds, "ChildReady", "Created"));
        assert_eq!(conds[0].message, "hello");
    }

    #[test]
    fn entries_keep_first_insertion_order() {
        let mut conds = Vec::new();
        set_true(&mut conds, "Zeta", "Ok");
        set_false(&mut conds, "Alpha", "Missing");
        set_unknown(&mut conds, "Mid", "Pending");
        set_true(&mut conds, "Alpha", "Found");

        let types: Vec<_> = conds.iter().map(|c| c.type_.as_str()).collect();
        assert_eq!(types, vec!["Zeta", "Alpha", "Mid"]);
        assert!(is_true(&conds, "Alpha"));
        assert_eq!(
            find(&conds, "Mid").map(|c| c.status),
            Some(ConditionStatus::Unknown)
        );
        assert!(find(&conds, "Absent").is_none());
    }
}
