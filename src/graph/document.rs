//! Graph Persistence
//!
//! A [`GraphDocument`] is the serialized form of an [`OperatorGraph`]:
//! settings, parameter base values, tracks and operators. Ports refer to
//! parameters by their position in `parameters`, watched tracks by their
//! position in `tracks`.
//!
//! Operators are tagged by the stable `type` string of [`OperatorNode`].
//! Bind-time solver state is not persisted; solvers that need it are
//! re-enabled after the wiring is restored.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::animation::TrackData;
use crate::errors::{Result, RigError};
use crate::graph::graph::OperatorGraph;
use crate::graph::registry::OperatorNode;
use crate::graph::value::PortValue;
use crate::graph::{ParamKey, TrackKey};
use crate::settings::GraphSettings;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterRecord {
    pub name: String,
    pub value: PortValue,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(bound(serialize = "N: Serialize", deserialize = "N: Deserialize<'de>"))]
pub struct OperatorRecord<N = OperatorNode> {
    pub name: String,
    #[serde(default = "attached_default")]
    pub attached: bool,
    pub operator: N,
    #[serde(default)]
    pub inputs: Vec<Option<usize>>,
    #[serde(default)]
    pub outputs: Vec<Option<usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track: Option<usize>,
}

fn attached_default() -> bool {
    true
}

/// Serialized graph. Saving borrows the operators (`N = &OperatorNode`),
/// loading owns them.
#[derive(Debug, Serialize, Deserialize)]
#[serde(bound(serialize = "N: Serialize", deserialize = "N: Deserialize<'de>"))]
pub struct GraphDocument<N = OperatorNode> {
    #[serde(default)]
    pub settings: GraphSettings,
    #[serde(default)]
    pub parameters: Vec<ParameterRecord>,
    #[serde(default)]
    pub tracks: Vec<TrackData>,
    #[serde(default)]
    pub operators: Vec<OperatorRecord<N>>,
}

impl<'g> GraphDocument<&'g OperatorNode> {
    /// Captures a graph's persistent state.
    pub fn capture(graph: &'g OperatorGraph) -> Result<Self> {
        let mut param_index: FxHashMap<ParamKey, usize> = FxHashMap::default();
        let parameters = graph
            .parameters
            .iter()
            .enumerate()
            .map(|(index, (key, param))| {
                param_index.insert(key, index);
                ParameterRecord {
                    name: param.name.clone(),
                    value: param.base,
                }
            })
            .collect();

        let mut track_index: FxHashMap<TrackKey, usize> = FxHashMap::default();
        let tracks = graph
            .tracks
            .iter()
            .enumerate()
            .map(|(index, (key, track))| {
                track_index.insert(key, index);
                track.clone()
            })
            .collect();

        let mut operators = Vec::with_capacity(graph.operators.len());
        for (key, slot) in &graph.operators {
            let node = slot.node.as_ref().ok_or(RigError::OperatorBusy(key))?;
            operators.push(OperatorRecord {
                name: slot.name.clone(),
                attached: graph.is_attached(key),
                operator: node,
                inputs: slot
                    .inputs
                    .iter()
                    .map(|port| port.source.and_then(|p| param_index.get(&p).copied()))
                    .collect(),
                outputs: slot
                    .outputs
                    .iter()
                    .map(|port| port.target.and_then(|p| param_index.get(&p).copied()))
                    .collect(),
                track: node
                    .as_operator()
                    .watched_track()
                    .and_then(|track| track_index.get(&track).copied()),
            });
        }

        Ok(Self {
            settings: graph.settings.clone(),
            parameters,
            tracks,
            operators,
        })
    }
}

impl GraphDocument {
    /// Decodes a document without building the graph.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        Self::deserialize(value).map_err(|e| RigError::Decode(e.to_string()))
    }

    /// Rebuilds the graph. Fails fast on any dangling index or invalid wiring.
    pub fn into_graph(self) -> Result<OperatorGraph> {
        let mut graph = OperatorGraph::with_settings(self.settings);

        let params: Vec<ParamKey> = self
            .parameters
            .into_iter()
            .map(|record| graph.add_parameter(record.name, record.value))
            .collect();
        let tracks: Vec<TrackKey> = self.tracks.into_iter().map(|track| graph.add_track(track)).collect();

        let mut rebind = Vec::new();
        for (op_index, record) in self.operators.into_iter().enumerate() {
            let mut node = record.operator;
            if let Some(index) = record.track {
                let track = tracks.get(index).copied().ok_or_else(|| {
                    RigError::Decode(format!("operator {op_index}: track index {index} out of range"))
                })?;
                node.as_operator_mut().set_watched_track(Some(track));
            }
            let requires_bind = node.as_operator().requires_bind();
            let key = graph.add_operator(record.name, node);

            let lookup = |index: usize| {
                params.get(index).copied().ok_or_else(|| {
                    RigError::Decode(format!("operator {op_index}: parameter index {index} out of range"))
                })
            };
            for (port, param) in record.inputs.iter().enumerate() {
                if let Some(param) = *param {
                    graph.connect_input(key, port, lookup(param)?)?;
                }
            }
            for (port, param) in record.outputs.iter().enumerate() {
                if let Some(param) = *param {
                    graph.connect_output(key, port, lookup(param)?)?;
                }
            }

            if !record.attached {
                graph.detach_operator(key)?;
            }
            if requires_bind {
                rebind.push(key);
            }
        }

        for key in rebind {
            graph.enable_operator(key)?;
        }
        Ok(graph)
    }
}

impl OperatorGraph {
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(GraphDocument::capture(self)?)?)
    }

    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        GraphDocument::from_json(value)?.into_graph()
    }
}
