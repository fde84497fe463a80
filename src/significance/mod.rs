/// Significance policy and target selection
pub mod policy;
pub mod rules;

pub use policy::{
    NotificationTarget, SelectionMode, SignificancePolicy, SignificanceRule, TargetReason,
};
pub use rules::{CapacityOpeningRule, LabelChangeRule};
