use smallvec::SmallVec;

use crate::graph::value::PortValue;
use crate::graph::{OperatorKey, ParamKey};

/// An operator input slot. Reads the cached value of its source parameter.
#[derive(Debug, Clone)]
pub struct InputPort {
    pub(crate) name: String,
    pub(crate) source: Option<ParamKey>,
}

impl InputPort {
    pub(crate) fn new(name: String) -> Self {
        Self { name, source: None }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn source(&self) -> Option<ParamKey> {
        self.source
    }

    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.source.is_some()
    }
}

/// An operator output slot. Writes the cached value of its target parameter.
#[derive(Debug, Clone)]
pub struct OutputPort {
    pub(crate) name: String,
    pub(crate) target: Option<ParamKey>,
}

impl OutputPort {
    pub(crate) fn new(name: String) -> Self {
        Self { name, target: None }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn target(&self) -> Option<ParamKey> {
        self.target
    }

    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.target.is_some()
    }
}

/// A value slot owned by the graph.
///
/// # Values
///
/// - `base`: the value last written by the host (`set_value`). Operators see
///   this through `EvalContext::output_value` and compose on top of it.
/// - `value`: the cached evaluated value served to readers.
///
/// A parameter without a writer always serves its base value and is never dirty.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub(crate) name: String,
    pub(crate) base: PortValue,
    pub(crate) value: PortValue,
    pub(crate) dirty: bool,
    pub(crate) writer: Option<(OperatorKey, usize)>,
    pub(crate) readers: SmallVec<[(OperatorKey, usize); 4]>,
}

impl Parameter {
    pub(crate) fn new(name: String, value: PortValue) -> Self {
        Self {
            name,
            base: value,
            value,
            dirty: false,
            writer: None,
            readers: SmallVec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The value last written by the host.
    #[inline]
    #[must_use]
    pub fn base_value(&self) -> PortValue {
        self.base
    }

    /// The cached value, which may be stale if [`Parameter::is_dirty`].
    #[inline]
    #[must_use]
    pub fn cached_value(&self) -> PortValue {
        self.value
    }

    #[inline]
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[inline]
    #[must_use]
    pub fn writer(&self) -> Option<(OperatorKey, usize)> {
        self.writer
    }

    #[inline]
    #[must_use]
    pub fn readers(&self) -> &[(OperatorKey, usize)] {
        &self.readers
    }
}
