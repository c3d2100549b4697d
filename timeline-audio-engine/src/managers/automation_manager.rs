//! Volume automation states and range/point markers (§4.4).
//!
//! Our [`AutomationMarkerKind::Range`] variant already carries the exact
//! element it applies to, so "the element is this element" (§4.4 step 1) is
//! the only range-matching rule this model needs; there is no separate
//! time-bounded range variant to reconcile against.

use timeline_audio_api::{AutomationMarker, AutomationMarkerKind, AutomationState, AutomationStateId, ElementId, TrackId};
use timeline_audio_base::hash_util::NonCryptoHashMap;

/// Computes the effective volume for `(track_id, element_id)` at time `t`,
/// starting from `base_volume` (already on the caller's scale, e.g. `[0,
/// 100]`) and applying matching automation states with last-wins semantics:
/// point markers (deduplicated to their most recent occurrence at or before
/// `t`) apply first, then range markers for this exact element, so range
/// automation takes precedence when both are present (§4.4).
pub fn effective_volume(
    states: &[AutomationState],
    markers: &[AutomationMarker],
    track_id: &TrackId,
    element_id: &ElementId,
    t: f64,
    base_volume: f64,
) -> f64 {
    let mut latest_point: NonCryptoHashMap<&AutomationStateId, (&AutomationMarker, f64)> = Default::default();
    for marker in markers {
        if let AutomationMarkerKind::Point { time } = &marker.kind {
            if *time > t {
                continue;
            }
            latest_point
                .entry(&marker.state_id)
                .and_modify(|(existing, existing_time)| {
                    if *time > *existing_time {
                        *existing = marker;
                        *existing_time = *time;
                    }
                })
                .or_insert((marker, *time));
        }
    }
    let mut point_markers: Vec<&AutomationMarker> = latest_point.into_values().map(|(m, _)| m).collect();
    point_markers.sort_by(|a, b| {
        let time_of = |m: &AutomationMarker| match &m.kind {
            AutomationMarkerKind::Point { time } => *time,
            _ => 0.0,
        };
        time_of(a).partial_cmp(&time_of(b)).unwrap()
    });

    let range_markers = markers.iter().filter(|marker| {
        matches!(
            &marker.kind,
            AutomationMarkerKind::Range { track_id: rt, element_id: re }
                if rt == track_id && re == element_id
        )
    });

    let mut volume = base_volume;
    for marker in point_markers.into_iter().chain(range_markers) {
        let Some(state) = states.iter().find(|s| s.id == marker.state_id) else {
            continue;
        };
        for operation in &state.operations {
            if &operation.track_id == track_id {
                volume = operation.value;
            }
        }
    }
    volume
}

#[cfg(test)]
mod tests {
    use super::*;
    use timeline_audio_api::{
        AutomationMarkerId, AutomationOperation, AutomationOperationId, AutomationOperationKind,
        AutomationStateId, ElementId, TrackId,
    };

    fn state(id: &str, track_id: &str, value: f64) -> AutomationState {
        AutomationState {
            id: AutomationStateId::from(id),
            name: id.to_string(),
            description: String::new(),
            operations: vec![AutomationOperation {
                id: AutomationOperationId::from(format!("{id}-op")),
                kind: AutomationOperationKind::AudioVolume,
                track_id: TrackId::from(track_id),
                value,
            }],
        }
    }

    fn point_marker(id: &str, state_id: &str, time: f64) -> AutomationMarker {
        AutomationMarker {
            id: AutomationMarkerId::from(id),
            state_id: AutomationStateId::from(state_id),
            kind: AutomationMarkerKind::Point { time },
        }
    }

    /// S6: point markers at t=1 (A: trackX<-30) and t=2 (B: trackX<-70),
    /// evaluated at t=3 with base=50. Expected = 70.
    #[test]
    fn point_markers_last_wins_matches_scenario_s6() {
        let states = vec![state("A", "trackX", 30.0), state("B", "trackX", 70.0)];
        let markers = vec![point_marker("m1", "A", 1.0), point_marker("m2", "B", 2.0)];
        let volume = effective_volume(
            &states,
            &markers,
            &TrackId::from("trackX"),
            &ElementId::from("unrelated"),
            3.0,
            50.0,
        );
        assert_eq!(volume, 70.0);
    }

    #[test]
    fn point_markers_in_the_future_are_ignored() {
        let states = vec![state("A", "trackX", 30.0)];
        let markers = vec![point_marker("m1", "A", 10.0)];
        let volume = effective_volume(
            &states,
            &markers,
            &TrackId::from("trackX"),
            &ElementId::from("unrelated"),
            3.0,
            50.0,
        );
        assert_eq!(volume, 50.0);
    }

    #[test]
    fn range_marker_for_this_element_overrides_a_prior_point_marker() {
        let states = vec![state("A", "trackX", 30.0), state("R", "trackX", 90.0)];
        let markers = vec![
            point_marker("m1", "A", 1.0),
            AutomationMarker {
                id: AutomationMarkerId::from("m2"),
                state_id: AutomationStateId::from("R"),
                kind: AutomationMarkerKind::Range {
                    track_id: TrackId::from("trackX"),
                    element_id: ElementId::from("el-1"),
                },
            },
        ];
        let volume = effective_volume(
            &states,
            &markers,
            &TrackId::from("trackX"),
            &ElementId::from("el-1"),
            5.0,
            50.0,
        );
        assert_eq!(volume, 90.0);
    }

    #[test]
    fn range_marker_for_a_different_element_is_ignored() {
        let states = vec![state("R", "trackX", 90.0)];
        let markers = vec![AutomationMarker {
            id: AutomationMarkerId::from("m1"),
            state_id: AutomationStateId::from("R"),
            kind: AutomationMarkerKind::Range {
                track_id: TrackId::from("trackX"),
                element_id: ElementId::from("el-other"),
            },
        }];
        let volume = effective_volume(
            &states,
            &markers,
            &TrackId::from("trackX"),
            &ElementId::from("el-1"),
            5.0,
            50.0,
        );
        assert_eq!(volume, 50.0);
    }

    #[test]
    fn no_matching_markers_returns_base_volume() {
        let volume = effective_volume(&[], &[], &TrackId::from("t"), &ElementId::from("e"), 0.0, 42.0);
        assert_eq!(volume, 42.0);
    }
}
