//! Operator Graph Tests
//!
//! Tests for:
//! - Pull-based evaluation and dirty propagation across operator chains
//! - Single-writer rule, disconnects, parameter removal
//! - Typed operator access and wiring errors
//! - Re-entrant pulls (an operator reading its own output)
//! - JSON persistence: round trip, detached state, timers, rebinding, decode errors

use std::f64::consts::FRAC_PI_2;

use glam::{DQuat, DVec3};
use serde_json::json;

use myth_rig::animation::{InterpolationMode, KeyframeTrack, TrackData, TrackSampler};
use myth_rig::errors::RigError;
use myth_rig::graph::{OperatorKey, ParamKey};
use myth_rig::math::{Axis, Pose};
use myth_rig::mechanisms::{ExplodePart, ExplodePartsOperator, Gear, GearsOperator};
use myth_rig::settings::GraphSettings;
use myth_rig::{AttachmentConstraint, OperatorGraph, TriangleIkSolver};

const EPSILON: f64 = 1e-9;

fn at(x: f64, y: f64, z: f64) -> Pose {
    Pose::from_translation(DVec3::new(x, y, z))
}

fn near(a: DVec3, b: DVec3) -> bool {
    (a - b).length() < EPSILON
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn find_operator(graph: &OperatorGraph, name: &str) -> OperatorKey {
    graph
        .operator_keys()
        .find(|&key| graph.operator(key).is_some_and(|slot| slot.name() == name))
        .unwrap()
}

/// Gear-driven wheel with a part attached to it.
struct Wheel {
    graph: OperatorGraph,
    gears: OperatorKey,
    wheel: ParamKey,
    part: ParamKey,
}

fn wheel() -> Wheel {
    let mut graph = OperatorGraph::new();
    let wheel = graph.add_parameter("wheel", Pose::IDENTITY);
    let part = graph.add_parameter("part", at(1.0, 0.0, 0.0));
    let time = graph.add_parameter("time", 0.0);

    let gears = graph.add_operator("gears", GearsOperator::new());
    GearsOperator::add_gear_to(&mut graph, gears, wheel, Gear::new(1.0, 0.0, Axis::Z)).unwrap();

    let attach = graph.add_operator("attach", AttachmentConstraint::new());
    graph.connect_input(attach, AttachmentConstraint::TIME, time).unwrap();
    AttachmentConstraint::add_target_to(&mut graph, attach, wheel, 0.0).unwrap();
    graph.connect_output(attach, AttachmentConstraint::ATTACHED, part).unwrap();

    Wheel {
        graph,
        gears,
        wheel,
        part,
    }
}

// ============================================================================
// Evaluation
// ============================================================================

#[test]
fn changes_propagate_through_operator_chain() {
    let mut rig = wheel();
    assert!(near(rig.graph.pose(rig.part).unwrap().translation, DVec3::X));

    rig.graph
        .modify_operator::<GearsOperator, _>(rig.gears, |g| g.revolutions = 0.25)
        .unwrap();
    assert!(near(rig.graph.pose(rig.part).unwrap().translation, DVec3::Y));
}

#[test]
fn evaluation_is_lazy() {
    let mut rig = wheel();
    rig.graph.pose(rig.part).unwrap();
    assert!(!rig.graph.parameter(rig.part).unwrap().is_dirty());

    rig.graph
        .modify_operator::<GearsOperator, _>(rig.gears, |g| g.revolutions = 0.5)
        .unwrap();
    assert!(rig.graph.parameter(rig.wheel).unwrap().is_dirty());
    assert!(rig.graph.parameter(rig.part).unwrap().is_dirty());
    // Cached values are untouched until pulled.
    assert!(near(rig.graph.parameter(rig.part).unwrap().cached_value().as_pose().unwrap().translation, DVec3::X));

    assert!(near(rig.graph.pose(rig.part).unwrap().translation, -DVec3::X));
    assert!(!rig.graph.parameter(rig.wheel).unwrap().is_dirty());
}

#[test]
fn writing_a_driven_parameter_changes_its_base() {
    let mut rig = wheel();
    rig.graph
        .modify_operator::<GearsOperator, _>(rig.gears, |g| g.revolutions = 0.25)
        .unwrap();
    rig.graph.set_value(rig.wheel, at(0.0, 0.0, 3.0)).unwrap();

    let wheel = rig.graph.pose(rig.wheel).unwrap();
    assert!(near(wheel.translation, DVec3::new(0.0, 0.0, 3.0)));
    assert!(wheel.orientation.abs_diff_eq(DQuat::from_rotation_z(FRAC_PI_2), EPSILON));
    assert!(rig.graph.parameter(rig.wheel).unwrap().base_value().as_pose().unwrap().orientation.abs_diff_eq(DQuat::IDENTITY, EPSILON));
}

#[test]
fn unwritten_parameter_is_never_dirty() {
    let mut graph = OperatorGraph::new();
    let free = graph.add_parameter("free", 2.0);
    graph.set_value(free, 3.0).unwrap();
    assert!(!graph.parameter(free).unwrap().is_dirty());
    assert_eq!(graph.scalar(free), Some(3.0));
    assert_eq!(graph.pose(free), None);
}

#[test]
fn self_referencing_operator_does_not_recurse() {
    init_logging();
    let mut graph = OperatorGraph::new();
    let part = graph.add_parameter("part", at(1.0, 2.0, 3.0));
    let attach = graph.add_operator("loop", AttachmentConstraint::new());
    AttachmentConstraint::add_target_to(&mut graph, attach, part, 0.0).unwrap();
    graph.connect_output(attach, AttachmentConstraint::ATTACHED, part).unwrap();

    let pose = graph.pose(part).unwrap();
    assert!(pose.abs_diff_eq(&at(1.0, 2.0, 3.0), EPSILON));
    assert!(!graph.parameter(part).unwrap().is_dirty());
}

// ============================================================================
// Wiring
// ============================================================================

#[test]
fn parameter_has_a_single_writer() {
    let mut rig = wheel();
    let other = rig.graph.add_operator("other", GearsOperator::new());
    rig.graph
        .modify_operator::<GearsOperator, _>(other, |g| g.add_gear(Gear::new(1.0, 0.0, Axis::X)))
        .unwrap();

    let err = rig.graph.connect_output(other, 0, rig.wheel).unwrap_err();
    assert!(matches!(err, RigError::WriterConflict(ref name) if name == "wheel"));

    // Re-binding the same output is allowed.
    rig.graph.connect_output(rig.gears, 0, rig.wheel).unwrap();
    assert_eq!(rig.graph.parameter(rig.wheel).unwrap().writer(), Some((rig.gears, 0)));
}

#[test]
fn disconnecting_output_restores_base_value() {
    let mut rig = wheel();
    rig.graph
        .modify_operator::<GearsOperator, _>(rig.gears, |g| g.revolutions = 0.25)
        .unwrap();
    assert!(!rig.graph.pose(rig.wheel).unwrap().abs_diff_eq(&Pose::IDENTITY, EPSILON));

    rig.graph.disconnect_output(rig.gears, 0).unwrap();
    assert!(rig.graph.pose(rig.wheel).unwrap().abs_diff_eq(&Pose::IDENTITY, EPSILON));
    assert_eq!(rig.graph.parameter(rig.wheel).unwrap().writer(), None);
    assert_eq!(rig.graph.output_port(rig.gears, 0).unwrap().target(), None);
}

#[test]
fn removing_parameter_disconnects_ports() {
    let mut rig = wheel();
    let attach = find_operator(&rig.graph, "attach");
    rig.graph.remove_parameter(rig.wheel).unwrap();

    assert_eq!(rig.graph.output_port(rig.gears, 0).unwrap().target(), None);
    assert_eq!(rig.graph.input_port(attach, 1).unwrap().source(), None);
    assert!(rig.graph.parameter(rig.wheel).is_none());

    // No target pose: the attachment passes through.
    assert!(near(rig.graph.pose(rig.part).unwrap().translation, DVec3::X));
    assert!(matches!(rig.graph.set_value(rig.wheel, 1.0), Err(RigError::ParameterNotFound(_))));
}

#[test]
fn wiring_errors() {
    let mut rig = wheel();
    let spare = rig.graph.add_parameter("spare", Pose::IDENTITY);
    assert!(matches!(
        rig.graph.connect_output(rig.gears, 4, spare),
        Err(RigError::PortIndex { index: 4, count: 1, .. })
    ));
    assert!(matches!(
        rig.graph.connect_input(rig.gears, 0, rig.part),
        Err(RigError::PortIndex { count: 0, .. })
    ));

    rig.graph.remove_operator(rig.gears).unwrap();
    assert!(matches!(
        rig.graph.connect_output(rig.gears, 0, rig.wheel),
        Err(RigError::OperatorNotFound(_))
    ));
}

#[test]
fn typed_access_checks_operator_type() {
    let rig = wheel();
    assert!(rig.graph.operator_as::<GearsOperator>(rig.gears).is_ok());
    assert!(matches!(
        rig.graph.operator_as::<AttachmentConstraint>(rig.gears),
        Err(RigError::OperatorType {
            expected: "AttachmentConstraint",
            found: "Gears",
        })
    ));
}

#[test]
fn adding_target_grows_inputs() {
    let mut rig = wheel();
    let attach = find_operator(&rig.graph, "attach");
    let other = rig.graph.add_parameter("other", at(0.0, 5.0, 0.0));
    let input = AttachmentConstraint::add_target_to(&mut rig.graph, attach, other, 1.0).unwrap();

    assert_eq!(input, 2);
    let names: Vec<&str> = rig
        .graph
        .operator(attach)
        .unwrap()
        .inputs()
        .iter()
        .map(|port| port.name())
        .collect();
    assert_eq!(names, ["Time", "Target0", "Target1"]);
    assert_eq!(rig.graph.parameter(other).unwrap().readers(), &[(attach, 2)]);
}

// ============================================================================
// Persistence
// ============================================================================

fn persisted_rig() -> OperatorGraph {
    let mut graph = OperatorGraph::with_settings(GraphSettings {
        ik_iterations: 12,
        ..Default::default()
    });

    let wheel = graph.add_parameter("wheel", Pose::IDENTITY);
    let gears = graph.add_operator("gears", GearsOperator::new());
    GearsOperator::add_gear_to(&mut graph, gears, wheel, Gear::new(2.0, 0.0, Axis::Z)).unwrap();
    graph.modify_operator::<GearsOperator, _>(gears, |g| g.driver.rpm = 30.0).unwrap();

    let time = graph.add_parameter("time", 0.5);
    let output = graph.add_parameter("sampled", Pose::IDENTITY);
    let track = graph.add_track(TrackData::Pose(
        KeyframeTrack::from_keys("slide", InterpolationMode::Linear, [(0.0, at(0.0, 0.0, 0.0)), (1.0, at(0.0, 4.0, 0.0))]).unwrap(),
    ));
    let sampler = graph.add_operator("sampler", TrackSampler::new(track));
    graph.connect_input(sampler, TrackSampler::TIME, time).unwrap();
    graph.connect_output(sampler, TrackSampler::OUTPUT, output).unwrap();

    let explode_value = graph.add_parameter("explode", 1.0);
    let part = graph.add_parameter("panel", at(1.0, 0.0, 0.0));
    let explode = graph.add_operator("explode", ExplodePartsOperator::new());
    graph.connect_input(explode, ExplodePartsOperator::EXPLODE, explode_value).unwrap();
    let index = graph
        .modify_operator::<ExplodePartsOperator, _>(explode, |e| e.add_part(ExplodePart::default()))
        .unwrap();
    graph.connect_output(explode, index, part).unwrap();
    graph.detach_operator(explode).unwrap();

    let target = graph.add_parameter("target", at(2.0, 0.0, 0.0));
    let joint0 = graph.add_parameter("joint0", Pose::IDENTITY);
    let joint1 = graph.add_parameter("joint1", at(1.0, 0.0, 0.0));
    let leg = graph.add_operator("leg", TriangleIkSolver::new());
    graph.connect_input(leg, TriangleIkSolver::TARGET, target).unwrap();
    graph.connect_output(leg, TriangleIkSolver::JOINT0, joint0).unwrap();
    graph.connect_output(leg, TriangleIkSolver::JOINT1, joint1).unwrap();
    graph.enable_operator(leg).unwrap();

    graph
}

#[test]
fn graph_json_round_trip() -> anyhow::Result<()> {
    init_logging();
    let mut original = persisted_rig();
    let json = original.to_json()?;
    let mut restored = OperatorGraph::from_json(&json)?;

    assert_eq!(restored.settings().ik_iterations, 12);
    assert_eq!(restored.operator_keys().count(), 4);
    assert_eq!(restored.track_keys().count(), 1);

    // Timers restart from the persisted rpm.
    let gears = find_operator(&restored, "gears");
    assert_eq!(restored.scheduler().tasks_owned_by(gears), 1);
    assert_eq!(restored.operator(gears).unwrap().node().unwrap().type_name(), "Gears");

    // Detached operators stay detached.
    let explode = find_operator(&restored, "explode");
    assert!(!restored.is_attached(explode));

    // The sampler is re-bound to its track.
    let sampler = find_operator(&restored, "sampler");
    assert!(restored.operator_as::<TrackSampler>(sampler)?.track().is_some());

    // Solvers are re-bound after wiring.
    let leg = find_operator(&restored, "leg");
    let lengths = restored.operator_as::<TriangleIkSolver>(leg).unwrap().bone_lengths().unwrap();
    assert!((lengths.0 - 1.0).abs() < EPSILON && (lengths.1 - 1.0).abs() < EPSILON);

    for graph in [&mut original, &mut restored] {
        let target = graph.find_parameter("target").unwrap();
        graph.set_value(target, at(1.0, 1.0, 0.0)).unwrap();
        graph.advance(0.5);
    }
    for name in ["wheel", "sampled", "panel", "joint0", "joint1"] {
        let a = original.find_parameter(name).and_then(|key| original.pose(key)).unwrap();
        let b = restored.find_parameter(name).and_then(|key| restored.pose(key)).unwrap();
        assert!(a.abs_diff_eq(&b, EPSILON), "{name}: {a:?} != {b:?}");
    }

    let sampled = restored.find_parameter("sampled").unwrap();
    assert!(near(restored.pose(sampled).unwrap().translation, DVec3::new(0.0, 2.0, 0.0)));
    let panel = restored.find_parameter("panel").unwrap();
    assert!(near(restored.pose(panel).unwrap().translation, DVec3::X));
    Ok(())
}

#[test]
fn document_uses_type_tags_and_indices() {
    let graph = persisted_rig();
    let json = graph.to_json().unwrap();

    let operators = json["operators"].as_array().unwrap();
    let types: Vec<&str> = operators.iter().map(|op| op["operator"]["type"].as_str().unwrap()).collect();
    assert_eq!(types, ["Gears", "TrackSampler", "ExplodeParts", "TriangleIkSolver"]);
    assert_eq!(operators[0]["outputs"], json!([0]));
    assert_eq!(operators[1]["track"], json!(0));
    assert_eq!(operators[2]["attached"], json!(false));
    assert_eq!(json["tracks"][0]["type"], "Pose");
}

#[test]
fn empty_document_builds_empty_graph() {
    let graph = OperatorGraph::from_json(&json!({})).unwrap();
    assert_eq!(graph.operator_keys().count(), 0);
    assert_eq!(graph.settings(), &GraphSettings::default());
}

#[test]
fn decode_errors() {
    let unknown_type = json!({
        "operators": [{ "name": "x", "operator": { "type": "Teleporter" } }],
    });
    assert!(matches!(OperatorGraph::from_json(&unknown_type), Err(RigError::Decode(_))));

    let dangling_param = json!({
        "parameters": [{ "name": "wheel", "value": { "Scalar": 0.0 } }],
        "operators": [{
            "name": "gears",
            "operator": { "type": "Gears", "gears": [{ "ratio": 1.0, "offset": 0.0, "axis": "Z" }] },
            "outputs": [3],
        }],
    });
    assert!(matches!(OperatorGraph::from_json(&dangling_param), Err(RigError::Decode(_))));

    let dangling_track = json!({
        "operators": [{ "name": "s", "operator": { "type": "TrackSampler" }, "track": 0 }],
    });
    assert!(matches!(OperatorGraph::from_json(&dangling_track), Err(RigError::Decode(_))));

    let unsorted_track = json!({
        "tracks": [{
            "type": "Pose",
            "name": "bad",
            "keys": [
                { "time": 1.0, "value": Pose::IDENTITY },
                { "time": 0.0, "value": Pose::IDENTITY },
            ],
        }],
    });
    assert!(matches!(OperatorGraph::from_json(&unsorted_track), Err(RigError::Decode(_))));
}

#[test]
fn duplicate_writer_in_document_is_rejected() {
    let doc = json!({
        "parameters": [{ "name": "p", "value": { "Pose": Pose::IDENTITY } }],
        "operators": [
            { "name": "a", "operator": { "type": "RamAndPiston", "axis": "X" }, "outputs": [0, null] },
            { "name": "b", "operator": { "type": "RamAndPiston", "axis": "X" }, "outputs": [0, null] },
        ],
    });
    assert!(matches!(OperatorGraph::from_json(&doc), Err(RigError::WriterConflict(_))));
}
