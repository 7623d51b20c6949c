pub mod beak;
pub mod bird;
pub mod condition;

pub use beak::{Beak, BeakSpec, BeakStatus};
pub use bird::{
    BIRD_CONDITION_CHILD_READY, BIRD_REASON_CREATED, Bird, BirdSpec,
    BirdStatus,
};
pub use condition::{Condition, ConditionStatus};
