use glam::DVec3;
use myth_rig::mechanisms::{Piston, PistonOperator};
use myth_rig::{Axis, AttachmentConstraint, OperatorGraph, Pose};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    // 1. A V-twin: two pistons 90° apart on one crank, turning at 120 rpm
    let mut graph = OperatorGraph::new();
    let crank = graph.add_parameter("crank", Pose::IDENTITY);
    let engine = graph.add_operator("engine", PistonOperator::new(Axis::Z));

    let mut caps = Vec::new();
    for (i, angle) in [-std::f64::consts::FRAC_PI_4, std::f64::consts::FRAC_PI_4].into_iter().enumerate() {
        let index = graph.modify_operator::<PistonOperator, _>(engine, |e| e.add_piston(Piston::new(angle, 0.0, 0.5, 2.0)))?;
        let rod = graph.add_parameter(format!("rod{i}"), Pose::IDENTITY);
        let cap = graph.add_parameter(format!("cap{i}"), Pose::IDENTITY);
        graph.connect_output(engine, PistonOperator::rod_output(index), rod)?;
        graph.connect_output(engine, PistonOperator::cap_output(index), cap)?;
        caps.push(cap);
    }
    graph.connect_output(engine, PistonOperator::CRANK, crank)?;
    graph.modify_operator::<PistonOperator, _>(engine, |e| e.driver.rpm = 120.0)?;

    // 2. A counterweight riding on the crank
    let weight = graph.add_parameter("weight", Pose::from_translation(DVec3::new(0.0, -0.4, 0.0)));
    let attach = graph.add_operator("counterweight", AttachmentConstraint::new());
    AttachmentConstraint::add_target_to(&mut graph, attach, crank, 0.0)?;
    graph.connect_output(attach, AttachmentConstraint::ATTACHED, weight)?;

    // 3. Run for one second of frames
    for frame in 0..60 {
        graph.advance(1.0 / 60.0);
        if frame % 10 == 0 {
            let heads: Vec<f64> = caps
                .iter()
                .filter_map(|&cap| graph.pose(cap))
                .map(|pose| pose.translation.length())
                .collect();
            let weight = graph.pose(weight).map(|pose| pose.translation).unwrap_or_default();
            log::info!("frame {frame:>2}: piston travel {heads:.3?}, counterweight at {weight:.3}");
        }
    }

    // 4. Save the rig
    let json = graph.to_json()?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
