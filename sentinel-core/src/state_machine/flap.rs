//! Flap detector (spec.md §4.6): weighted percent-state-change over the last
//! 21 observations, independent of whether the checkable is a host or a
//! service — it only needs `PartialEq` on the state type.

use crate::model::checkable::{CheckableCommon, StateHistory, STATE_HISTORY_SIZE};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FlapTransition {
    None,
    Started,
    Stopped,
}

/// `weight_i = 0.80 + 0.02 * i`, older samples (low `i`) weigh less (spec.md
/// §4.6).
fn weight(i: usize) -> f64 {
    0.80 + 0.02 * i as f64
}

fn percent_state_change<S: Copy + PartialEq>(history: &StateHistory<S>) -> f64 {
    let samples: Vec<S> = history.iter_oldest_to_newest().collect();
    if samples.len() < 2 {
        return 0.0;
    }
    let mut weighted_changes = 0.0;
    let mut weight_total = 0.0;
    for i in 1..samples.len() {
        let w = weight(i);
        weight_total += w;
        if samples[i] != samples[i - 1] {
            weighted_changes += w;
        }
    }
    if weight_total == 0.0 {
        0.0
    } else {
        (weighted_changes / weight_total) * 100.0
    }
}

/// Appends `probed_state` to the history ring, recomputes
/// `percent_state_change`, and reports whether flapping started or stopped
/// this call (spec.md §4.6). Caller is responsible for the side effects
/// (comment, notification) since those differ for hosts vs. services.
pub fn record_and_evaluate<S: Copy + PartialEq>(
    common: &mut CheckableCommon<S>,
    probed_state: S,
) -> FlapTransition {
    common.state_history.push(probed_state);
    if !common.flap_detection_enabled || common.state_history.len() < STATE_HISTORY_SIZE {
        common.percent_state_change = percent_state_change(&common.state_history);
        return FlapTransition::None;
    }
    common.percent_state_change = percent_state_change(&common.state_history);

    if !common.is_flapping && common.percent_state_change > common.high_flap_threshold {
        common.is_flapping = true;
        FlapTransition::Started
    } else if common.is_flapping && common.percent_state_change < common.low_flap_threshold {
        common.is_flapping = false;
        FlapTransition::Stopped
    } else {
        FlapTransition::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::host::HostState;

    #[test]
    fn steady_state_never_flaps() {
        let mut common = CheckableCommon::new("h".to_string(), HostState::Up);
        common.flap_detection_enabled = true;
        for _ in 0..30 {
            let t = record_and_evaluate(&mut common, HostState::Up);
            assert_eq!(t, FlapTransition::None);
        }
        assert_eq!(common.percent_state_change, 0.0);
    }

    #[test]
    fn alternating_state_triggers_flap_start() {
        let mut common = CheckableCommon::new("h".to_string(), HostState::Up);
        common.flap_detection_enabled = true;
        let mut started = false;
        for i in 0..30 {
            let state = if i % 2 == 0 { HostState::Up } else { HostState::Down };
            if record_and_evaluate(&mut common, state) == FlapTransition::Started {
                started = true;
            }
        }
        assert!(started);
        assert!(common.is_flapping);
    }
}
