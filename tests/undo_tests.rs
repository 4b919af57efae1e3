//! Undo/Redo Tests
//!
//! Tests for:
//! - Undo/redo symmetry of key add/modify/remove
//! - Transactions: grouping, empty commits, cancel, misuse errors
//! - Coalescing repeated writes at one time inside a transaction
//! - Failed undo leaving tracks and history intact
//! - TrackSampler evaluation, dirtying on key edits, write-back through history

use glam::DVec3;

use myth_rig::animation::{InterpolationMode, KeyframeTrack, TrackData, TrackSampler, TrackStore, TrackValue};
use myth_rig::errors::RigError;
use myth_rig::graph::{OperatorKey, ParamKey, TrackKey};
use myth_rig::math::Pose;
use myth_rig::undo::{TrackChange, UndoRedoManager};
use myth_rig::OperatorGraph;

fn at_x(x: f64) -> Pose {
    Pose::from_translation(DVec3::new(x, 0.0, 0.0))
}

fn pose_track(graph: &mut OperatorGraph) -> TrackKey {
    graph.add_track(TrackData::Pose(KeyframeTrack::new("motion", InterpolationMode::Linear)))
}

fn snapshot(graph: &OperatorGraph, track: TrackKey) -> Vec<(f64, TrackValue)> {
    let data = graph.track(track).unwrap();
    (0..data.len())
        .map(|i| (data.key_time(i).unwrap(), data.key_value(i).unwrap()))
        .collect()
}

// ============================================================================
// History
// ============================================================================

#[test]
fn undo_redo_restores_every_state() {
    let mut graph = OperatorGraph::new();
    let track = pose_track(&mut graph);

    let mut states = vec![snapshot(&graph, track)];
    graph.add_track_key(track, 0.0, at_x(0.0)).unwrap();
    states.push(snapshot(&graph, track));
    graph.add_track_key(track, 1.0, at_x(1.0)).unwrap();
    states.push(snapshot(&graph, track));
    graph.set_track_key_value(track, 0, at_x(5.0)).unwrap();
    states.push(snapshot(&graph, track));
    graph.remove_track_key(track, 1).unwrap();
    states.push(snapshot(&graph, track));

    for expected in states.iter().rev().skip(1) {
        assert!(graph.undo().unwrap());
        assert_eq!(&snapshot(&graph, track), expected);
    }
    assert!(!graph.undo().unwrap());

    for expected in states.iter().skip(1) {
        assert!(graph.redo().unwrap());
        assert_eq!(&snapshot(&graph, track), expected);
    }
    assert!(!graph.redo().unwrap());
}

#[test]
fn transaction_undoes_as_one_step() {
    let mut graph = OperatorGraph::new();
    let track = pose_track(&mut graph);

    graph.begin_transaction("Insert Keys").unwrap();
    graph.add_track_key(track, 0.0, at_x(0.0)).unwrap();
    graph.add_track_key(track, 1.0, at_x(1.0)).unwrap();
    graph.remove_track_key(track, 0).unwrap();
    assert!(!graph.history().can_undo());
    assert!(graph.commit_transaction().unwrap());

    assert_eq!(graph.history().undo_name(), Some("Insert Keys"));
    assert!(graph.undo().unwrap());
    assert!(graph.track(track).unwrap().is_empty());
    assert_eq!(graph.history().redo_name(), Some("Insert Keys"));

    graph.redo().unwrap();
    assert_eq!(snapshot(&graph, track), vec![(1.0, TrackValue::Pose(at_x(1.0)))]);
}

#[test]
fn empty_transaction_is_dropped() {
    let mut graph = OperatorGraph::new();
    graph.begin_transaction("Nothing").unwrap();
    assert!(!graph.commit_transaction().unwrap());
    assert!(!graph.history().can_undo());
}

#[test]
fn new_edit_clears_redo() {
    let mut graph = OperatorGraph::new();
    let track = pose_track(&mut graph);
    graph.add_track_key(track, 0.0, at_x(0.0)).unwrap();
    graph.undo().unwrap();
    assert!(graph.history().can_redo());

    graph.add_track_key(track, 2.0, at_x(2.0)).unwrap();
    assert!(!graph.history().can_redo());
    assert_eq!(graph.history().undo_name(), Some("Edit Key"));
}

#[test]
fn cancel_rolls_back_open_transaction() {
    let mut graph = OperatorGraph::new();
    let track = pose_track(&mut graph);
    graph.add_track_key(track, 0.0, at_x(0.0)).unwrap();
    let before = snapshot(&graph, track);

    graph.begin_transaction("Scratch").unwrap();
    graph.add_track_key(track, 1.0, at_x(1.0)).unwrap();
    graph.set_track_key_value(track, 0, at_x(3.0)).unwrap();
    graph.remove_track_key(track, 1).unwrap();
    graph.cancel_transaction().unwrap();

    assert_eq!(snapshot(&graph, track), before);
    assert!(!graph.history().is_open());
    assert_eq!(graph.history().undo_name(), Some("Edit Key"));
}

#[test]
fn transaction_misuse_is_rejected() {
    let mut graph = OperatorGraph::new();
    assert!(matches!(graph.commit_transaction(), Err(RigError::NoTransaction)));
    assert!(matches!(graph.cancel_transaction(), Err(RigError::NoTransaction)));

    graph.begin_transaction("Outer").unwrap();
    assert!(matches!(graph.begin_transaction("Inner"), Err(RigError::TransactionOpen(_))));
    assert!(matches!(graph.undo(), Err(RigError::TransactionOpen(_))));
    assert!(matches!(graph.redo(), Err(RigError::TransactionOpen(_))));
}

#[test]
fn failed_edit_records_nothing() {
    let mut graph = OperatorGraph::new();
    let track = pose_track(&mut graph);
    graph.add_track_key(track, 0.0, at_x(0.0)).unwrap();

    assert!(graph.add_track_key(track, 0.0, at_x(1.0)).is_err());
    assert!(graph.remove_track_key(track, 4).is_err());

    graph.undo().unwrap();
    assert!(!graph.history().can_undo());
    assert!(graph.track(track).unwrap().is_empty());
}

// ============================================================================
// Coalescing
// ============================================================================

#[test]
fn drag_coalesces_into_single_add() {
    let mut graph = OperatorGraph::new();
    let track = pose_track(&mut graph);

    graph.begin_transaction("Drag").unwrap();
    for x in [1.0, 2.0, 3.0] {
        assert_eq!(graph.set_track_value(track, 0.5, at_x(x)).unwrap(), 0);
    }
    graph.commit_transaction().unwrap();
    assert_eq!(snapshot(&graph, track), vec![(0.5, TrackValue::Pose(at_x(3.0)))]);

    graph.undo().unwrap();
    assert!(graph.track(track).unwrap().is_empty());
    graph.redo().unwrap();
    assert_eq!(snapshot(&graph, track), vec![(0.5, TrackValue::Pose(at_x(3.0)))]);
}

#[test]
fn drag_over_existing_key_restores_original() {
    let mut graph = OperatorGraph::new();
    let track = pose_track(&mut graph);
    graph.add_track_key(track, 1.0, at_x(1.0)).unwrap();

    graph.begin_transaction("Drag").unwrap();
    graph.set_track_value(track, 1.0, at_x(4.0)).unwrap();
    graph.set_track_value(track, 1.0, at_x(8.0)).unwrap();
    graph.commit_transaction().unwrap();

    graph.undo().unwrap();
    assert_eq!(snapshot(&graph, track), vec![(1.0, TrackValue::Pose(at_x(1.0)))]);
    // The original key is still undoable on its own.
    graph.undo().unwrap();
    assert!(graph.track(track).unwrap().is_empty());
}

#[test]
fn writes_outside_transaction_are_separate_steps() {
    let mut graph = OperatorGraph::new();
    let track = pose_track(&mut graph);
    graph.set_track_value(track, 0.0, at_x(1.0)).unwrap();
    graph.set_track_value(track, 0.0, at_x(2.0)).unwrap();

    graph.undo().unwrap();
    assert_eq!(snapshot(&graph, track), vec![(0.0, TrackValue::Pose(at_x(1.0)))]);
}

#[test]
fn write_after_remove_in_transaction_adds_fresh_key() {
    let mut graph = OperatorGraph::new();
    let track = pose_track(&mut graph);

    graph.begin_transaction("Retime").unwrap();
    let index = graph.set_track_value(track, 1.0, at_x(1.0)).unwrap();
    graph.remove_track_key(track, index).unwrap();
    assert_eq!(graph.set_track_value(track, 1.0, at_x(2.0)).unwrap(), 0);
    graph.set_track_value(track, 1.0, at_x(3.0)).unwrap();
    graph.commit_transaction().unwrap();
    assert_eq!(snapshot(&graph, track), vec![(1.0, TrackValue::Pose(at_x(3.0)))]);

    graph.undo().unwrap();
    assert!(graph.track(track).unwrap().is_empty());
    graph.redo().unwrap();
    assert_eq!(snapshot(&graph, track), vec![(1.0, TrackValue::Pose(at_x(3.0)))]);
}

// ============================================================================
// History Integrity
// ============================================================================

#[test]
fn remove_track_is_refused_inside_transaction() {
    let mut graph = OperatorGraph::new();
    let kept = pose_track(&mut graph);
    let removed = pose_track(&mut graph);

    graph.begin_transaction("Edit").unwrap();
    graph.set_track_value(kept, 0.0, at_x(1.0)).unwrap();
    graph.set_track_value(removed, 0.0, at_x(1.0)).unwrap();
    assert!(matches!(graph.remove_track(removed), Err(RigError::TransactionOpen(_))));
    assert!(graph.track(removed).is_some());
    graph.commit_transaction().unwrap();

    assert!(graph.undo().unwrap());
    assert!(graph.track(kept).unwrap().is_empty());
    assert!(graph.track(removed).unwrap().is_empty());
}

#[test]
fn failed_undo_rolls_back_and_keeps_transaction() {
    let mut tracks = TrackStore::default();
    let first = tracks.insert(TrackData::Pose(KeyframeTrack::new("first", InterpolationMode::Linear)));
    let second = tracks.insert(TrackData::Pose(KeyframeTrack::new("second", InterpolationMode::Linear)));

    let mut history = UndoRedoManager::new();
    history.begin_transaction("Both").unwrap();
    for track in [first, second] {
        let (change, _) = TrackChange::add_key(&mut tracks, track, 0.0, TrackValue::Pose(at_x(1.0))).unwrap();
        history.record(change);
    }
    history.commit_transaction().unwrap();

    // Undo reverts `second` first, then fails on the missing `first`.
    tracks.remove(first);
    assert!(matches!(history.undo(&mut tracks), Err(RigError::TrackNotFound(_))));
    assert_eq!(tracks[second].len(), 1);
    assert!(history.can_undo());
    assert!(!history.can_redo());
    assert_eq!(history.undo_name(), Some("Both"));
}

// ============================================================================
// Track Sampler
// ============================================================================

struct Sampled {
    graph: OperatorGraph,
    track: TrackKey,
    time: ParamKey,
    output: ParamKey,
    sampler: OperatorKey,
}

fn sampled(time: f64) -> Sampled {
    let mut graph = OperatorGraph::new();
    let track = graph.add_track(TrackData::Pose(
        KeyframeTrack::from_keys("motion", InterpolationMode::Linear, [(0.0, at_x(0.0)), (2.0, at_x(2.0))]).unwrap(),
    ));
    let time_param = graph.add_parameter("time", time);
    let output = graph.add_parameter("output", Pose::IDENTITY);

    let sampler = graph.add_operator("sampler", TrackSampler::new(track));
    graph.connect_input(sampler, TrackSampler::TIME, time_param).unwrap();
    graph.connect_output(sampler, TrackSampler::OUTPUT, output).unwrap();

    Sampled {
        graph,
        track,
        time: time_param,
        output,
        sampler,
    }
}

impl Sampled {
    fn x(&mut self) -> f64 {
        self.graph.pose(self.output).unwrap().translation.x
    }
}

#[test]
fn sampler_follows_time() {
    let mut rig = sampled(1.0);
    assert!((rig.x() - 1.0).abs() < 1e-9);

    rig.graph.set_value(rig.time, 1.5).unwrap();
    assert!((rig.x() - 1.5).abs() < 1e-9);
}

#[test]
fn key_edits_dirty_the_sampler() {
    let mut rig = sampled(1.0);
    assert!((rig.x() - 1.0).abs() < 1e-9);

    rig.graph.add_track_key(rig.track, 1.0, at_x(5.0)).unwrap();
    assert!((rig.x() - 5.0).abs() < 1e-9);

    rig.graph.undo().unwrap();
    assert!((rig.x() - 1.0).abs() < 1e-9);
}

#[test]
fn write_back_edits_track_at_current_time() {
    let mut rig = sampled(0.5);
    let index = TrackSampler::write_back(&mut rig.graph, rig.sampler, at_x(9.0)).unwrap();
    assert_eq!(index, 1);
    assert!((rig.x() - 9.0).abs() < 1e-9);

    rig.graph.undo().unwrap();
    assert!((rig.x() - 0.5).abs() < 1e-9);
}

#[test]
fn write_back_rejects_scalars_and_unbound_samplers() {
    let mut rig = sampled(0.0);
    assert!(matches!(
        TrackSampler::write_back(&mut rig.graph, rig.sampler, 1.0),
        Err(RigError::ValueType { .. })
    ));

    let unbound = rig.graph.add_operator("unbound", TrackSampler::default());
    assert!(matches!(
        TrackSampler::write_back(&mut rig.graph, unbound, at_x(1.0)),
        Err(RigError::SamplerUnbound(_))
    ));
}

#[test]
fn removing_track_unbinds_sampler_and_clears_history() {
    let mut rig = sampled(1.0);
    rig.graph.add_track_key(rig.track, 1.0, at_x(5.0)).unwrap();
    assert!((rig.x() - 5.0).abs() < 1e-9);

    rig.graph.remove_track(rig.track).unwrap();
    assert!(!rig.graph.history().can_undo());
    assert_eq!(rig.graph.operator_as::<TrackSampler>(rig.sampler).unwrap().track(), None);
    // Pass-through: the output falls back to its base value.
    assert!(rig.x().abs() < 1e-9);
}
