//! Keyframe Track Tests
//!
//! Tests for:
//! - KeyframeTrack key lookup (find_key_and_lerp) and sampling
//! - Cursor-accelerated lookup against the binary search
//! - Linear vs Step interpolation, Pose and Color blending
//! - Key editing: ordering, duplicates, invalid times, events
//! - TrackData dispatch and value-type checks
//! - JSON persistence and ordering validation

use glam::{DQuat, DVec3};
use serde_json::json;

use myth_rig::animation::{InterpolationMode, KeyAndLerp, KeyframeCursor, KeyframeTrack, TrackData, TrackEvent, TrackValue};
use myth_rig::errors::RigError;
use myth_rig::math::{Color, Pose};

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

fn scalar_track(keys: &[(f64, f64)]) -> KeyframeTrack<f64> {
    KeyframeTrack::from_keys("scalar", InterpolationMode::Linear, keys.iter().copied()).unwrap()
}

// ============================================================================
// Lookup
// ============================================================================

#[test]
fn find_key_and_lerp_positions() {
    let track = scalar_track(&[(0.0, 0.0), (1.0, 10.0), (3.0, 30.0)]);

    let cases = [
        (-1.0, 0, 0.0),
        (0.0, 0, 0.0),
        (0.5, 0, 0.5),
        (1.0, 1, 0.0),
        (2.0, 1, 0.5),
        (2.5, 1, 0.75),
        (3.0, 2, 0.0),
        (7.0, 2, 0.0),
    ];
    for (time, key_index, lerp) in cases {
        let found = track.find_key_and_lerp(time).unwrap();
        assert_eq!(found.key_index, key_index, "time {time}");
        assert!(approx(found.lerp, lerp), "time {time}: lerp {}", found.lerp);
    }
}

#[test]
fn empty_track_samples_nothing() {
    let track = KeyframeTrack::<f64>::new("empty", InterpolationMode::Linear);
    assert!(track.is_empty());
    assert!(track.find_key_and_lerp(0.0).is_none());
    assert!(track.evaluate(1.0).is_none());
}

#[test]
fn single_key_is_constant() {
    let track = scalar_track(&[(2.0, 5.0)]);
    for time in [-10.0, 2.0, 100.0] {
        assert!(approx(track.evaluate(time).unwrap(), 5.0));
    }
}

#[test]
fn cursor_lookup_matches_binary_search() {
    let keys: Vec<(f64, f64)> = (0..10).map(|i| (f64::from(i), f64::from(i * i))).collect();
    let track = scalar_track(&keys);
    let mut cursor = KeyframeCursor::default();

    // Playback, small reverse scrubs, far jumps both ways and out of range.
    let times = [0.0, 0.3, 1.2, 1.9, 2.0, 3.7, 3.1, 2.2, 8.9, 0.2, -1.0, 12.0, 4.5, 4.4, 9.0];
    for time in times {
        let with_cursor = track.find_key_and_lerp_with_cursor(time, &mut cursor).unwrap();
        let expected: KeyAndLerp = track.find_key_and_lerp(time).unwrap();
        assert_eq!(with_cursor, expected, "time {time}");
        assert_eq!(cursor.last_index, expected.key_index);
    }
}

#[test]
fn cursor_survives_track_shrinking() {
    let mut track = scalar_track(&[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0), (3.0, 3.0)]);
    let mut cursor = KeyframeCursor::default();
    track.find_key_and_lerp_with_cursor(2.5, &mut cursor).unwrap();
    assert_eq!(cursor.last_index, 2);

    track.remove_key(3).unwrap();
    track.remove_key(2).unwrap();
    let value = track.evaluate_with_cursor(0.5, &mut cursor).unwrap();
    assert!(approx(value, 0.5));
}

// ============================================================================
// Interpolation
// ============================================================================

#[test]
fn linear_interpolates_between_keys() {
    let track = scalar_track(&[(0.0, 0.0), (2.0, 10.0)]);
    assert!(approx(track.evaluate(0.5).unwrap(), 2.5));
    assert!(approx(track.evaluate(2.0).unwrap(), 10.0));
}

#[test]
fn step_holds_left_key() {
    let mut track = scalar_track(&[(0.0, 0.0), (2.0, 10.0)]);
    track.set_interpolation(InterpolationMode::Step);
    assert!(approx(track.evaluate(1.99).unwrap(), 0.0));
    assert!(approx(track.evaluate(2.0).unwrap(), 10.0));
}

#[test]
fn pose_track_blends_translation_and_rotation() {
    let start = Pose::IDENTITY;
    let end = Pose::from_translation_rotation(DVec3::new(2.0, 0.0, 0.0), DQuat::from_rotation_z(std::f64::consts::FRAC_PI_2));
    let track = KeyframeTrack::from_keys("pose", InterpolationMode::Linear, [(0.0, start), (1.0, end)]).unwrap();

    let mid = track.evaluate(0.5).unwrap();
    assert!((mid.translation - DVec3::new(1.0, 0.0, 0.0)).length() < 1e-9);
    assert!(mid
        .orientation
        .abs_diff_eq(DQuat::from_rotation_z(std::f64::consts::FRAC_PI_4), 1e-9));
}

#[test]
fn color_track_blends_channels() {
    let track = KeyframeTrack::from_keys("color", InterpolationMode::Linear, [(0.0, Color::BLACK), (1.0, Color::WHITE)]).unwrap();
    let mid = track.evaluate(0.25).unwrap();
    assert!((mid.r - 0.25).abs() < 1e-6);
    assert!((mid.a - 1.0).abs() < 1e-6);
}

// ============================================================================
// Editing
// ============================================================================

#[test]
fn add_key_keeps_times_sorted() {
    let mut track = KeyframeTrack::new("scalar", InterpolationMode::Linear);
    assert_eq!(track.add_key(2.0, 20.0).unwrap(), 0);
    assert_eq!(track.add_key(0.0, 0.0).unwrap(), 0);
    assert_eq!(track.add_key(1.0, 10.0).unwrap(), 1);
    assert_eq!(track.times(), &[0.0, 1.0, 2.0]);
    assert_eq!(track.values(), &[0.0, 10.0, 20.0]);
}

#[test]
fn add_key_rejects_duplicates_and_non_finite_times() {
    let mut track = scalar_track(&[(1.0, 1.0)]);
    assert!(matches!(track.add_key(1.0, 2.0), Err(RigError::DuplicateKeyTime(_))));
    assert!(matches!(track.add_key(f64::NAN, 2.0), Err(RigError::InvalidKeyTime(_))));
    assert!(matches!(track.add_key(f64::INFINITY, 2.0), Err(RigError::InvalidKeyTime(_))));
    assert_eq!(track.len(), 1);
}

#[test]
fn out_of_range_index_is_an_error() {
    let mut track = scalar_track(&[(0.0, 0.0)]);
    assert!(matches!(track.remove_key(1), Err(RigError::KeyIndex { index: 1, len: 1 })));
    assert!(matches!(track.set_key_value(3, 1.0), Err(RigError::KeyIndex { index: 3, len: 1 })));
}

#[test]
fn edits_queue_events() {
    let mut track = KeyframeTrack::new("scalar", InterpolationMode::Linear);
    track.add_key(0.0, 0.0).unwrap();
    track.add_key(1.0, 1.0).unwrap();
    track.set_key_value(1, 5.0).unwrap();
    track.remove_key(0).unwrap();

    assert!(track.has_pending_events());
    assert_eq!(
        track.drain_events(),
        vec![
            TrackEvent::KeyAdded { index: 0 },
            TrackEvent::KeyAdded { index: 1 },
            TrackEvent::KeyChanged { index: 1 },
            TrackEvent::KeyRemoved { index: 0 },
        ]
    );
    assert!(!track.has_pending_events());
}

#[test]
fn set_value_modifies_or_inserts() {
    let mut track = scalar_track(&[(0.0, 0.0), (2.0, 2.0)]);
    assert_eq!(track.set_value(2.0, 7.0).unwrap(), 1);
    assert_eq!(track.len(), 2);
    assert_eq!(track.set_value(1.0, 3.0).unwrap(), 1);
    assert_eq!(track.times(), &[0.0, 1.0, 2.0]);
    assert_eq!(track.values(), &[0.0, 3.0, 7.0]);
}

#[test]
fn track_data_rejects_mismatched_values() {
    let mut data = TrackData::Pose(KeyframeTrack::new("pose", InterpolationMode::Linear));
    let result = data.add_key(0.0, TrackValue::Color(Color::WHITE));
    assert!(matches!(result, Err(RigError::ValueType { .. })));

    data.add_key(0.0, TrackValue::Pose(Pose::IDENTITY)).unwrap();
    assert!(matches!(
        data.set_key_value(0, TrackValue::Color(Color::BLACK)),
        Err(RigError::ValueType { .. })
    ));
    assert_eq!(data.kind(), "Pose");
    assert_eq!(data.len(), 1);
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn track_json_round_trip() {
    let mut track = scalar_track(&[(0.0, 1.0), (0.5, 2.0), (4.0, -3.0)]);
    track.set_interpolation(InterpolationMode::Step);

    let json = track.to_json().unwrap();
    assert_eq!(json["name"], "scalar");
    assert_eq!(json["keys"].as_array().unwrap().len(), 3);

    let restored = KeyframeTrack::<f64>::from_json(&json).unwrap();
    assert_eq!(restored.times(), track.times());
    assert_eq!(restored.values(), track.values());
    assert_eq!(restored.interpolation(), InterpolationMode::Step);
    assert!(!restored.has_pending_events());
}

#[test]
fn unsorted_keys_are_rejected() {
    let json = json!({
        "name": "bad",
        "keys": [{ "time": 1.0, "value": 0.0 }, { "time": 0.5, "value": 1.0 }],
    });
    let err = KeyframeTrack::<f64>::from_json(&json).unwrap_err();
    assert!(matches!(err, RigError::KeyOrder { index: 1, .. }), "{err}");

    let duplicate = json!({
        "name": "dup",
        "keys": [{ "time": 1.0, "value": 0.0 }, { "time": 1.0, "value": 1.0 }],
    });
    assert!(matches!(
        KeyframeTrack::<f64>::from_json(&duplicate),
        Err(RigError::KeyOrder { .. })
    ));
}

#[test]
fn malformed_track_is_a_decode_error() {
    let json = json!({ "name": "bad", "keys": "not a list" });
    assert!(matches!(KeyframeTrack::<f64>::from_json(&json), Err(RigError::Decode(_))));

    let missing_interp = json!({ "name": "ok", "keys": [] });
    let track = KeyframeTrack::<f64>::from_json(&missing_interp).unwrap();
    assert_eq!(track.interpolation(), InterpolationMode::Linear);
}

#[test]
fn track_data_is_tagged_by_type() {
    let data = TrackData::Color(
        KeyframeTrack::from_keys("tint", InterpolationMode::Linear, [(0.0, Color::BLACK), (1.0, Color::WHITE)]).unwrap(),
    );
    let json = data.to_json().unwrap();
    assert_eq!(json["type"], "Color");

    let restored = TrackData::from_json(&json).unwrap();
    assert_eq!(restored.name(), "tint");
    assert_eq!(restored.key_value(1), Some(TrackValue::Color(Color::WHITE)));

    let mut unsorted = json;
    unsorted["keys"][1]["time"] = json!(-1.0);
    assert!(matches!(TrackData::from_json(&unsorted), Err(RigError::Decode(_))));
}
