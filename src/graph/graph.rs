//! Operator Graph
//!
//! `OperatorGraph` owns every parameter (value slot), operator and keyframe
//! track of a rig, and drives pull-based evaluation.
//!
//! # Model
//! - Parameters live in a `SlotMap` and are addressed by [`ParamKey`].
//! - Operators live in a second `SlotMap`; their ports refer to parameters by key.
//! - A parameter has at most one writer (an operator output) and any number of
//!   readers (operator inputs).
//!
//! # Evaluation
//! - Writing a parameter marks everything downstream dirty with a breadth-first
//!   sweep over reader operators.
//! - Reading a dirty parameter evaluates its writer, which in turn pulls its own
//!   inputs first (depth first). Results are memoized until dirtied again.
//! - While an operator evaluates, its node is taken out of the slot and the slot
//!   is flagged `EVALUATING`. A pull that loops back to it is served the cached
//!   value instead of recursing.

use std::collections::VecDeque;

use bitflags::bitflags;
use rustc_hash::FxHashSet;
use slotmap::SlotMap;
use smallvec::SmallVec;

use crate::animation::TrackStore;
use crate::errors::{PortKind, Result, RigError};
use crate::graph::context::EvalContext;
use crate::graph::port::{InputPort, OutputPort, Parameter};
use crate::graph::registry::{OperatorNode, OperatorVariant};
use crate::graph::scheduler::{FiredTask, Scheduler};
use crate::graph::value::PortValue;
use crate::graph::{OperatorKey, ParamKey};
use crate::math::{Color, Pose};
use crate::settings::GraphSettings;
use crate::undo::UndoRedoManager;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct OperatorFlags: u8 {
        /// Participates in evaluation and owns live timers.
        const ATTACHED   = 1 << 0;
        /// Currently inside `evaluate` or `enable`.
        const EVALUATING = 1 << 1;
    }
}

/// An operator together with its port wiring.
#[derive(Debug)]
pub struct OperatorSlot {
    pub(crate) name: String,
    pub(crate) inputs: Vec<InputPort>,
    pub(crate) outputs: Vec<OutputPort>,
    pub(crate) flags: OperatorFlags,
    pub(crate) node: Option<OperatorNode>,
}

impl OperatorSlot {
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn inputs(&self) -> &[InputPort] {
        &self.inputs
    }

    #[inline]
    #[must_use]
    pub fn outputs(&self) -> &[OutputPort] {
        &self.outputs
    }

    #[inline]
    #[must_use]
    pub fn flags(&self) -> OperatorFlags {
        self.flags
    }

    /// The operator, or `None` while it is evaluating.
    #[inline]
    #[must_use]
    pub fn node(&self) -> Option<&OperatorNode> {
        self.node.as_ref()
    }
}

pub struct OperatorGraph {
    pub(crate) settings: GraphSettings,
    pub(crate) parameters: SlotMap<ParamKey, Parameter>,
    pub(crate) operators: SlotMap<OperatorKey, OperatorSlot>,
    pub(crate) tracks: TrackStore,
    pub(crate) scheduler: Scheduler,
    pub(crate) history: UndoRedoManager,
}

impl Default for OperatorGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl OperatorGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::with_settings(GraphSettings::default())
    }

    #[must_use]
    pub fn with_settings(settings: GraphSettings) -> Self {
        let scheduler = Scheduler::new(settings.driver_period(), settings.max_catch_up_ticks);
        Self {
            settings,
            parameters: SlotMap::with_key(),
            operators: SlotMap::with_key(),
            tracks: SlotMap::with_key(),
            scheduler,
            history: UndoRedoManager::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &GraphSettings {
        &self.settings
    }

    #[inline]
    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    // ========================================================================
    // Parameters
    // ========================================================================

    pub fn add_parameter(&mut self, name: impl Into<String>, value: impl Into<PortValue>) -> ParamKey {
        self.parameters.insert(Parameter::new(name.into(), value.into()))
    }

    #[inline]
    #[must_use]
    pub fn parameter(&self, key: ParamKey) -> Option<&Parameter> {
        self.parameters.get(key)
    }

    #[must_use]
    pub fn find_parameter(&self, name: &str) -> Option<ParamKey> {
        self.parameters
            .iter()
            .find_map(|(key, param)| (param.name == name).then_some(key))
    }

    /// Removes a parameter and disconnects every port bound to it.
    pub fn remove_parameter(&mut self, key: ParamKey) -> Result<()> {
        let param = self.parameters.remove(key).ok_or(RigError::ParameterNotFound(key))?;

        let mut stale: SmallVec<[OperatorKey; 4]> = SmallVec::new();
        if let Some((writer, index)) = param.writer {
            if let Some(port) = self
                .operators
                .get_mut(writer)
                .and_then(|slot| slot.outputs.get_mut(index))
            {
                port.target = None;
            }
        }
        for &(reader, index) in &param.readers {
            if let Some(port) = self
                .operators
                .get_mut(reader)
                .and_then(|slot| slot.inputs.get_mut(index))
            {
                port.source = None;
            }
            stale.push(reader);
        }

        for reader in stale {
            self.set_operator_dirty(reader);
        }
        Ok(())
    }

    /// Writes a parameter's base value and marks everything downstream dirty.
    pub fn set_value(&mut self, key: ParamKey, value: impl Into<PortValue>) -> Result<()> {
        let param = self
            .parameters
            .get_mut(key)
            .ok_or(RigError::ParameterNotFound(key))?;
        let value = value.into();
        param.base = value;
        if param.writer.is_none() {
            param.value = value;
        }
        self.propagate_dirty([key]);
        Ok(())
    }

    /// Marks everything downstream of `key` dirty without writing it.
    ///
    /// Hosts call this when the value a parameter mirrors changed elsewhere
    /// (for example a scene node's global transform).
    pub fn notify_changed(&mut self, key: ParamKey) -> Result<()> {
        if !self.parameters.contains_key(key) {
            return Err(RigError::ParameterNotFound(key));
        }
        self.propagate_dirty([key]);
        Ok(())
    }

    /// Reads a parameter, evaluating its writer first if it is dirty.
    pub fn value(&mut self, key: ParamKey) -> Option<PortValue> {
        self.pull(key);
        self.parameters.get(key).map(|param| param.value)
    }

    pub fn pose(&mut self, key: ParamKey) -> Option<Pose> {
        self.value(key)?.as_pose()
    }

    pub fn scalar(&mut self, key: ParamKey) -> Option<f64> {
        self.value(key)?.as_scalar()
    }

    pub fn color(&mut self, key: ParamKey) -> Option<Color> {
        self.value(key)?.as_color()
    }

    fn pull(&mut self, key: ParamKey) {
        let Some(param) = self.parameters.get(key) else {
            return;
        };
        if !param.dirty {
            return;
        }
        if let Some((writer, _)) = param.writer {
            self.evaluate_operator(writer);
        }
        // Still dirty: the writer declined to write (unconnected, degenerate or
        // re-entered). Hold the previous value.
        if let Some(param) = self.parameters.get_mut(key) {
            param.dirty = false;
        }
    }

    /// Breadth-first dirty sweep from `seeds` through reader operators.
    pub(crate) fn propagate_dirty(&mut self, seeds: impl IntoIterator<Item = ParamKey>) {
        let mut queue: VecDeque<ParamKey> = seeds.into_iter().collect();
        let mut visited: FxHashSet<ParamKey> = FxHashSet::default();

        while let Some(key) = queue.pop_front() {
            if !visited.insert(key) {
                continue;
            }
            let Some(param) = self.parameters.get_mut(key) else {
                continue;
            };
            if param.writer.is_some() {
                param.dirty = true;
            }
            for &(reader, _) in &param.readers {
                if let Some(slot) = self.operators.get(reader) {
                    queue.extend(slot.outputs.iter().filter_map(|port| port.target));
                }
            }
        }
    }

    // ========================================================================
    // Operators
    // ========================================================================

    /// Adds an operator. Its ports are created unconnected from the operator's
    /// declared layout.
    pub fn add_operator(&mut self, name: impl Into<String>, node: impl Into<OperatorNode>) -> OperatorKey {
        let node = node.into();
        let inputs = node
            .as_operator()
            .input_names()
            .into_iter()
            .map(InputPort::new)
            .collect();
        let outputs = node
            .as_operator()
            .output_names()
            .into_iter()
            .map(OutputPort::new)
            .collect();

        let key = self.operators.insert(OperatorSlot {
            name: name.into(),
            inputs,
            outputs,
            flags: OperatorFlags::ATTACHED,
            node: Some(node),
        });

        if let Some(node) = self.operators.get_mut(key).and_then(|slot| slot.node.as_mut()) {
            node.as_operator_mut().sync_schedule(&mut self.scheduler, key);
        }
        key
    }

    #[inline]
    #[must_use]
    pub fn operator(&self, key: OperatorKey) -> Option<&OperatorSlot> {
        self.operators.get(key)
    }

    pub fn operator_keys(&self) -> impl Iterator<Item = OperatorKey> + '_ {
        self.operators.keys()
    }

    /// Typed read access to an operator's parameters.
    pub fn operator_as<T: OperatorVariant>(&self, key: OperatorKey) -> Result<&T> {
        let slot = self.operators.get(key).ok_or(RigError::OperatorNotFound(key))?;
        let node = slot.node.as_ref().ok_or(RigError::OperatorBusy(key))?;
        T::from_node(node).ok_or(RigError::OperatorType {
            expected: T::TYPE_NAME,
            found: node.type_name(),
        })
    }

    /// Typed edit of an operator's parameters.
    ///
    /// Afterwards the port layout is re-synced (new ports are appended
    /// unconnected, dropped trailing ports are disconnected), periodic tasks
    /// are reconciled and the operator is marked dirty.
    pub fn modify_operator<T, R>(&mut self, key: OperatorKey, edit: impl FnOnce(&mut T) -> R) -> Result<R>
    where
        T: OperatorVariant,
    {
        let slot = self
            .operators
            .get_mut(key)
            .ok_or(RigError::OperatorNotFound(key))?;
        let attached = slot.flags.contains(OperatorFlags::ATTACHED);
        let node = slot.node.as_mut().ok_or(RigError::OperatorBusy(key))?;
        let found = node.type_name();
        let operator = T::from_node_mut(node).ok_or(RigError::OperatorType {
            expected: T::TYPE_NAME,
            found,
        })?;

        let result = edit(operator);

        if attached {
            node.as_operator_mut().sync_schedule(&mut self.scheduler, key);
        }
        self.sync_ports(key);
        self.set_operator_dirty(key);
        Ok(result)
    }

    /// Destroys an operator: cancels its timers and disconnects its ports.
    pub fn remove_operator(&mut self, key: OperatorKey) -> Result<()> {
        let mut slot = self
            .operators
            .remove(key)
            .ok_or(RigError::OperatorNotFound(key))?;

        if let Some(node) = slot.node.as_mut() {
            node.as_operator_mut().destroy(&mut self.scheduler);
        }
        let leaked = self.scheduler.cancel_owned_by(key);
        if leaked > 0 {
            log::warn!("Operator '{}' left {leaked} task(s) scheduled after destroy", slot.name);
        }

        for (index, port) in slot.inputs.iter().enumerate() {
            if let Some(param) = port.source.and_then(|source| self.parameters.get_mut(source)) {
                param.readers.retain(|reader| *reader != (key, index));
            }
        }

        let mut released: SmallVec<[ParamKey; 4]> = SmallVec::new();
        for port in &slot.outputs {
            if let Some(target) = port.target {
                if let Some(param) = self.parameters.get_mut(target) {
                    param.writer = None;
                    param.value = param.base;
                    param.dirty = false;
                }
                released.push(target);
            }
        }
        self.propagate_dirty(released);

        log::debug!("Removed operator '{}'", slot.name);
        Ok(())
    }

    /// Marks all outputs of an operator (and everything downstream) dirty.
    pub fn set_operator_dirty(&mut self, key: OperatorKey) {
        let Some(slot) = self.operators.get(key) else {
            return;
        };
        let seeds: SmallVec<[ParamKey; 8]> = slot.outputs.iter().filter_map(|port| port.target).collect();
        self.propagate_dirty(seeds);
    }

    fn sync_ports(&mut self, key: OperatorKey) {
        let Some(slot) = self.operators.get_mut(key) else {
            return;
        };
        let Some(node) = slot.node.as_ref() else {
            return;
        };
        let input_names = node.as_operator().input_names();
        let output_names = node.as_operator().output_names();

        let mut dropped_inputs: SmallVec<[(usize, ParamKey); 2]> = SmallVec::new();
        while slot.inputs.len() > input_names.len() {
            let index = slot.inputs.len() - 1;
            if let Some(source) = slot.inputs.pop().and_then(|port| port.source) {
                dropped_inputs.push((index, source));
            }
        }
        for (index, name) in input_names.into_iter().enumerate() {
            match slot.inputs.get_mut(index) {
                Some(port) => port.name = name,
                None => slot.inputs.push(InputPort::new(name)),
            }
        }

        let mut dropped_outputs: SmallVec<[ParamKey; 2]> = SmallVec::new();
        while slot.outputs.len() > output_names.len() {
            if let Some(target) = slot.outputs.pop().and_then(|port| port.target) {
                dropped_outputs.push(target);
            }
        }
        for (index, name) in output_names.into_iter().enumerate() {
            match slot.outputs.get_mut(index) {
                Some(port) => port.name = name,
                None => slot.outputs.push(OutputPort::new(name)),
            }
        }

        for (index, source) in dropped_inputs {
            if let Some(param) = self.parameters.get_mut(source) {
                param.readers.retain(|reader| *reader != (key, index));
            }
        }
        for target in &dropped_outputs {
            if let Some(param) = self.parameters.get_mut(*target) {
                param.writer = None;
                param.value = param.base;
                param.dirty = false;
            }
        }
        self.propagate_dirty(dropped_outputs);
    }

    // ========================================================================
    // Wiring
    // ========================================================================

    pub fn connect_input(&mut self, operator: OperatorKey, index: usize, param: ParamKey) -> Result<()> {
        if !self.parameters.contains_key(param) {
            return Err(RigError::ParameterNotFound(param));
        }
        let slot = self
            .operators
            .get_mut(operator)
            .ok_or(RigError::OperatorNotFound(operator))?;
        let count = slot.inputs.len();
        let port = slot.inputs.get_mut(index).ok_or(RigError::PortIndex {
            kind: PortKind::Input,
            index,
            count,
        })?;
        let previous = port.source.replace(param);

        if let Some(previous) = previous {
            if let Some(old) = self.parameters.get_mut(previous) {
                old.readers.retain(|reader| *reader != (operator, index));
            }
        }
        if let Some(param) = self.parameters.get_mut(param) {
            param.readers.push((operator, index));
        }
        self.set_operator_dirty(operator);
        Ok(())
    }

    pub fn disconnect_input(&mut self, operator: OperatorKey, index: usize) -> Result<()> {
        let slot = self
            .operators
            .get_mut(operator)
            .ok_or(RigError::OperatorNotFound(operator))?;
        let count = slot.inputs.len();
        let port = slot.inputs.get_mut(index).ok_or(RigError::PortIndex {
            kind: PortKind::Input,
            index,
            count,
        })?;
        if let Some(source) = port.source.take() {
            if let Some(param) = self.parameters.get_mut(source) {
                param.readers.retain(|reader| *reader != (operator, index));
            }
            self.set_operator_dirty(operator);
        }
        Ok(())
    }

    /// Binds an output to a parameter, making the operator its single writer.
    pub fn connect_output(&mut self, operator: OperatorKey, index: usize, param: ParamKey) -> Result<()> {
        let target = self
            .parameters
            .get(param)
            .ok_or(RigError::ParameterNotFound(param))?;
        if let Some(writer) = target.writer {
            if writer != (operator, index) {
                return Err(RigError::WriterConflict(target.name.clone()));
            }
        }

        let slot = self
            .operators
            .get_mut(operator)
            .ok_or(RigError::OperatorNotFound(operator))?;
        let count = slot.outputs.len();
        let port = slot.outputs.get_mut(index).ok_or(RigError::PortIndex {
            kind: PortKind::Output,
            index,
            count,
        })?;
        let previous = port.target.replace(param);

        if let Some(previous) = previous.filter(|previous| *previous != param) {
            self.release_writer(previous);
        }
        if let Some(target) = self.parameters.get_mut(param) {
            target.writer = Some((operator, index));
        }
        self.propagate_dirty([param]);
        Ok(())
    }

    pub fn disconnect_output(&mut self, operator: OperatorKey, index: usize) -> Result<()> {
        let slot = self
            .operators
            .get_mut(operator)
            .ok_or(RigError::OperatorNotFound(operator))?;
        let count = slot.outputs.len();
        let port = slot.outputs.get_mut(index).ok_or(RigError::PortIndex {
            kind: PortKind::Output,
            index,
            count,
        })?;
        if let Some(target) = port.target.take() {
            self.release_writer(target);
        }
        Ok(())
    }

    /// Removes an output port, shifting later ports down by one.
    ///
    /// Operator helpers call this when they drop the matching entry from their
    /// own layout (see [`GearsOperator::remove_gear_from`](crate::mechanisms::GearsOperator::remove_gear_from)).
    pub fn remove_output(&mut self, operator: OperatorKey, index: usize) -> Result<()> {
        self.disconnect_output(operator, index)?;
        let slot = self
            .operators
            .get_mut(operator)
            .ok_or(RigError::OperatorNotFound(operator))?;
        slot.outputs.remove(index);

        for (shifted, port) in slot.outputs.iter().enumerate().skip(index) {
            if let Some(param) = port.target.and_then(|target| self.parameters.get_mut(target)) {
                param.writer = Some((operator, shifted));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn input_port(&self, operator: OperatorKey, index: usize) -> Option<&InputPort> {
        self.operators.get(operator)?.inputs.get(index)
    }

    /// Output port by index.
    #[must_use]
    pub fn output_port(&self, operator: OperatorKey, index: usize) -> Option<&OutputPort> {
        self.operators.get(operator)?.outputs.get(index)
    }

    /// Pulls the value feeding an operator input.
    pub fn input_value(&mut self, operator: OperatorKey, index: usize) -> Option<PortValue> {
        let source = self.input_port(operator, index)?.source?;
        self.value(source)
    }

    fn release_writer(&mut self, key: ParamKey) {
        if let Some(param) = self.parameters.get_mut(key) {
            param.writer = None;
            param.value = param.base;
            param.dirty = false;
        }
        self.propagate_dirty([key]);
    }

    // ========================================================================
    // Evaluation & Lifecycle
    // ========================================================================

    fn evaluate_operator(&mut self, key: OperatorKey) {
        let Some(slot) = self.operators.get_mut(key) else {
            return;
        };
        if slot.flags.contains(OperatorFlags::EVALUATING) {
            log::warn!(
                "Operator '{}' was pulled while already evaluating; serving cached values",
                slot.name
            );
            return;
        }
        let Some(mut node) = slot.node.take() else {
            return;
        };
        slot.flags.insert(OperatorFlags::EVALUATING);
        let attached = slot.flags.contains(OperatorFlags::ATTACHED);

        {
            let mut ctx = EvalContext::new(self, key);
            if attached {
                node.as_operator_mut().evaluate(&mut ctx);
            } else {
                ctx.pass_through();
            }
        }

        self.restore_node(key, node);
        self.settle_outputs(key);
    }

    fn restore_node(&mut self, key: OperatorKey, node: OperatorNode) {
        if let Some(slot) = self.operators.get_mut(key) {
            slot.node = Some(node);
            slot.flags.remove(OperatorFlags::EVALUATING);
        }
    }

    fn settle_outputs(&mut self, key: OperatorKey) {
        let Some(slot) = self.operators.get(key) else {
            return;
        };
        for target in slot.outputs.iter().filter_map(|port| port.target) {
            if let Some(param) = self.parameters.get_mut(target) {
                param.dirty = false;
            }
        }
    }

    /// Captures bind-time state (solvers) from the current port values.
    pub fn enable_operator(&mut self, key: OperatorKey) -> Result<()> {
        let slot = self
            .operators
            .get_mut(key)
            .ok_or(RigError::OperatorNotFound(key))?;
        let mut node = slot.node.take().ok_or(RigError::OperatorBusy(key))?;
        slot.flags.insert(OperatorFlags::EVALUATING);

        {
            let mut ctx = EvalContext::new(self, key);
            node.as_operator_mut().enable(&mut ctx);
        }

        log::debug!("Enabled {} operator {key:?}", node.type_name());
        self.restore_node(key, node);
        self.set_operator_dirty(key);
        Ok(())
    }

    /// Switches an operator to pass-through.
    pub fn disable_operator(&mut self, key: OperatorKey) -> Result<()> {
        let node = self
            .operators
            .get_mut(key)
            .ok_or(RigError::OperatorNotFound(key))?
            .node
            .as_mut()
            .ok_or(RigError::OperatorBusy(key))?;
        node.as_operator_mut().disable();
        self.set_operator_dirty(key);
        Ok(())
    }

    /// Suspends an operator: timers stop and evaluation becomes pass-through.
    pub fn detach_operator(&mut self, key: OperatorKey) -> Result<()> {
        let slot = self
            .operators
            .get_mut(key)
            .ok_or(RigError::OperatorNotFound(key))?;
        let node = slot.node.as_mut().ok_or(RigError::OperatorBusy(key))?;
        node.as_operator_mut().detach(&mut self.scheduler);
        slot.flags.remove(OperatorFlags::ATTACHED);
        log::debug!("Detached operator '{}'", slot.name);
        self.set_operator_dirty(key);
        Ok(())
    }

    /// Resumes a detached operator and restarts its timers.
    pub fn reattach_operator(&mut self, key: OperatorKey) -> Result<()> {
        let slot = self
            .operators
            .get_mut(key)
            .ok_or(RigError::OperatorNotFound(key))?;
        let node = slot.node.as_mut().ok_or(RigError::OperatorBusy(key))?;
        node.as_operator_mut().sync_schedule(&mut self.scheduler, key);
        slot.flags.insert(OperatorFlags::ATTACHED);
        log::debug!("Reattached operator '{}'", slot.name);
        self.set_operator_dirty(key);
        Ok(())
    }

    #[must_use]
    pub fn is_attached(&self, key: OperatorKey) -> bool {
        self.operators
            .get(key)
            .is_some_and(|slot| slot.flags.contains(OperatorFlags::ATTACHED))
    }

    /// Advances the cooperative timer queue by `dt` seconds.
    pub fn advance(&mut self, dt: f64) {
        let period = self.scheduler.period();
        for FiredTask { task, owner, ticks } in self.scheduler.advance(dt) {
            let Some(node) = self
                .operators
                .get_mut(owner)
                .and_then(|slot| slot.node.as_mut())
            else {
                continue;
            };
            let operator = node.as_operator_mut();
            let mut changed = false;
            for _ in 0..ticks {
                changed |= operator.on_timer(task, period);
            }
            if changed {
                self.set_operator_dirty(owner);
            }
        }
    }
}
