//! Evaluation Context
//!
//! The view of the graph handed to [`Operator::evaluate`](crate::graph::Operator::evaluate)
//! and [`Operator::enable`](crate::graph::Operator::enable).
//!
//! Inputs are pulled: reading an input whose source parameter is dirty evaluates
//! the upstream writer first. Outputs expose the host-written base value of the
//! target parameter; operators compose on top of it and write the result back
//! with [`EvalContext::set_clean`].

use crate::animation::TrackData;
use crate::graph::graph::OperatorGraph;
use crate::graph::value::PortValue;
use crate::graph::{OperatorKey, ParamKey, TrackKey};
use crate::math::Pose;
use crate::settings::GraphSettings;

pub struct EvalContext<'g> {
    graph: &'g mut OperatorGraph,
    operator: OperatorKey,
}

impl<'g> EvalContext<'g> {
    pub(crate) fn new(graph: &'g mut OperatorGraph, operator: OperatorKey) -> Self {
        Self { graph, operator }
    }

    /// Key of the operator being evaluated.
    #[inline]
    #[must_use]
    pub fn operator(&self) -> OperatorKey {
        self.operator
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &GraphSettings {
        &self.graph.settings
    }

    #[must_use]
    pub fn input_count(&self) -> usize {
        self.graph
            .operators
            .get(self.operator)
            .map_or(0, |slot| slot.inputs.len())
    }

    #[must_use]
    pub fn output_count(&self) -> usize {
        self.graph
            .operators
            .get(self.operator)
            .map_or(0, |slot| slot.outputs.len())
    }

    #[must_use]
    pub fn is_input_connected(&self, index: usize) -> bool {
        self.input_source(index).is_some()
    }

    #[must_use]
    pub fn is_output_connected(&self, index: usize) -> bool {
        self.output_target(index).is_some()
    }

    /// Pulls the value of an input. `None` when the input is not connected.
    pub fn input_value(&mut self, index: usize) -> Option<PortValue> {
        let source = self.input_source(index)?;
        self.graph.value(source)
    }

    pub fn input_pose(&mut self, index: usize) -> Option<Pose> {
        self.input_value(index)?.as_pose()
    }

    pub fn input_scalar(&mut self, index: usize) -> Option<f64> {
        self.input_value(index)?.as_scalar()
    }

    /// Base value of the parameter behind an output. `None` when unconnected.
    #[must_use]
    pub fn output_value(&self, index: usize) -> Option<PortValue> {
        let target = self.output_target(index)?;
        self.graph.parameters.get(target).map(|param| param.base)
    }

    #[must_use]
    pub fn output_pose(&self, index: usize) -> Option<Pose> {
        self.output_value(index)?.as_pose()
    }

    /// Writes an output and clears its dirty flag. No-op when unconnected.
    pub fn set_clean(&mut self, index: usize, value: impl Into<PortValue>) {
        let Some(target) = self.output_target(index) else {
            return;
        };
        if let Some(param) = self.graph.parameters.get_mut(target) {
            param.value = value.into();
            param.dirty = false;
        }
    }

    /// Writes every connected output's base value through unchanged.
    pub fn pass_through(&mut self) {
        let Some(slot) = self.graph.operators.get(self.operator) else {
            return;
        };
        for target in slot.outputs.iter().filter_map(|port| port.target) {
            if let Some(param) = self.graph.parameters.get_mut(target) {
                param.value = param.base;
                param.dirty = false;
            }
        }
    }

    #[must_use]
    pub fn track(&self, key: TrackKey) -> Option<&TrackData> {
        self.graph.tracks.get(key)
    }

    fn input_source(&self, index: usize) -> Option<ParamKey> {
        self.graph
            .operators
            .get(self.operator)?
            .inputs
            .get(index)?
            .source
    }

    fn output_target(&self, index: usize) -> Option<ParamKey> {
        self.graph
            .operators
            .get(self.operator)?
            .outputs
            .get(index)?
            .target
    }
}
