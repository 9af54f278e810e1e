//! Change detection between desired and observed stack shape
//!
//! Pure comparisons over a fixed, ordered list of watched fields. At most
//! one change class drives a pass: an update already regenerates the stack
//! with the latest scaling bounds, so scale is only evaluated when no
//! update is due. That ordering is what keeps a pass from issuing two
//! conflicting provider operations.

use nimbus_common::crd::ScalingBounds;

use crate::stack::StackState;

/// The single action change detection selects for a pass
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StackChange {
    /// Desired and observed shapes agree
    None,
    /// A watched shape field differs; the stack must be regenerated
    Update {
        /// The desired shape to render
        state: StackState,
        /// Which field diverged, with old and new values
        reason: String,
    },
    /// Only the scaling bounds differ; a pure capacity change
    Scale {
        /// The observed shape, kept so identity-bearing names survive
        state: StackState,
        /// Which bound diverged, with old and new values
        reason: String,
    },
}

/// First watched shape field that differs, in check order: data volume
/// size, instance type, version tag.
pub fn should_update(desired: &StackState, current: &StackState) -> Option<String> {
    if desired.data_volume_size_gb != current.data_volume_size_gb {
        return Some(format!(
            "data volume size changed from {} to {}",
            current.data_volume_size_gb, desired.data_volume_size_gb
        ));
    }
    if desired.instance_type != current.instance_type {
        return Some(format!(
            "instance type changed from {} to {}",
            current.instance_type, desired.instance_type
        ));
    }
    if desired.version_tag != current.version_tag {
        return Some(format!(
            "version tag changed from {} to {}",
            current.version_tag, desired.version_tag
        ));
    }
    None
}

/// First scaling bound that differs, max before min.
///
/// With no observed bounds there is nothing to scale yet: the stack has
/// not reported its scaling group.
pub fn should_scale(desired: &ScalingBounds, observed: Option<&ScalingBounds>) -> Option<String> {
    let observed = observed?;
    if desired.max != observed.max {
        return Some(format!(
            "max size changed from {} to {}",
            observed.max, desired.max
        ));
    }
    if desired.min != observed.min {
        return Some(format!(
            "min size changed from {} to {}",
            observed.min, desired.min
        ));
    }
    None
}

/// Select the one change (if any) the lifecycle controller should apply
pub fn plan(
    desired: &StackState,
    current: &StackState,
    desired_bounds: &ScalingBounds,
    observed_bounds: Option<&ScalingBounds>,
) -> StackChange {
    if let Some(reason) = should_update(desired, current) {
        return StackChange::Update {
            state: desired.clone(),
            reason,
        };
    }
    if let Some(reason) = should_scale(desired_bounds, observed_bounds) {
        return StackChange::Scale {
            state: current.clone(),
            reason,
        };
    }
    StackChange::None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(instance_type: &str, data_volume: u32, version: &str) -> StackState {
        StackState {
            name: "nimbus-tenant-a1b2c".to_string(),
            image_id: "ami-001".to_string(),
            instance_type: instance_type.to_string(),
            detailed_monitoring: false,
            root_volume_size_gb: 50,
            data_volume_size_gb: data_volume,
            version_tag: version.to_string(),
        }
    }

    #[test]
    fn identical_shapes_need_no_update() {
        let a = state("m5.xlarge", 100, "14.2.0");
        assert_eq!(should_update(&a, &a.clone()), None);
    }

    #[test]
    fn first_mismatch_in_field_order_wins() {
        let current = state("m5.xlarge", 100, "14.2.0");
        // Both the volume and the version differ; the volume is reported
        // because it is checked first.
        let desired = state("m5.xlarge", 200, "15.0.0");
        let reason = should_update(&desired, &current).expect("update due");
        assert!(reason.contains("data volume size changed from 100 to 200"));

        let desired = state("m5.2xlarge", 100, "15.0.0");
        let reason = should_update(&desired, &current).expect("update due");
        assert!(reason.contains("instance type changed from m5.xlarge to m5.2xlarge"));

        let desired = state("m5.xlarge", 100, "15.0.0");
        let reason = should_update(&desired, &current).expect("update due");
        assert!(reason.contains("version tag changed from 14.2.0 to 15.0.0"));
    }

    #[test]
    fn scale_reports_max_change_with_old_and_new() {
        let observed = ScalingBounds { min: 3, max: 10 };

        let reason = should_scale(&ScalingBounds { min: 3, max: 7 }, Some(&observed))
            .expect("scale due");
        assert!(reason.contains("max size changed from 10 to 7"));

        assert_eq!(
            should_scale(&ScalingBounds { min: 3, max: 10 }, Some(&observed)),
            None
        );
    }

    #[test]
    fn scale_checks_max_before_min() {
        let observed = ScalingBounds { min: 3, max: 10 };
        let reason = should_scale(&ScalingBounds { min: 1, max: 7 }, Some(&observed))
            .expect("scale due");
        assert!(reason.contains("max size"));

        let reason = should_scale(&ScalingBounds { min: 1, max: 10 }, Some(&observed))
            .expect("scale due");
        assert!(reason.contains("min size changed from 3 to 1"));
    }

    #[test]
    fn nothing_to_scale_before_the_group_reports() {
        assert_eq!(should_scale(&ScalingBounds { min: 1, max: 5 }, None), None);
    }

    #[test]
    fn update_shadows_scale() {
        // Both an instance-type and a bounds mismatch exist; only the
        // update is selected for this pass.
        let current = state("m5.xlarge", 100, "14.2.0");
        let desired = state("m5.2xlarge", 100, "14.2.0");
        let observed = ScalingBounds { min: 3, max: 10 };
        let wanted = ScalingBounds { min: 3, max: 7 };

        match plan(&desired, &current, &wanted, Some(&observed)) {
            StackChange::Update { state, reason } => {
                assert_eq!(state, desired);
                assert!(reason.contains("instance type"));
            }
            other => panic!("expected update, got {other:?}"),
        }
    }

    #[test]
    fn pure_scale_preserves_observed_identity() {
        let current = state("m5.xlarge", 100, "14.2.0");
        let observed = ScalingBounds { min: 3, max: 10 };
        let wanted = ScalingBounds { min: 3, max: 7 };

        match plan(&current.clone(), &current, &wanted, Some(&observed)) {
            StackChange::Scale { state, .. } => assert_eq!(state, current),
            other => panic!("expected scale, got {other:?}"),
        }
    }

    #[test]
    fn agreement_plans_nothing() {
        let current = state("m5.xlarge", 100, "14.2.0");
        let bounds = ScalingBounds { min: 3, max: 10 };
        assert_eq!(
            plan(&current.clone(), &current, &bounds, Some(&bounds)),
            StackChange::None
        );
    }
}
