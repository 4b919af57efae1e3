//! Operator Registry
//!
//! [`OperatorNode`] is the closed set of operator types a graph can hold. It is
//! the persistence format (`#[serde(tag = "type")]`) and the dispatch point
//! for the [`Operator`] trait.

use serde::{Deserialize, Serialize};

use crate::animation::TrackSampler;
use crate::graph::operator::Operator;
use crate::kinematics::{AttachmentConstraint, IkSolver, TriangleIkSolver};
use crate::mechanisms::{ExplodePartsOperator, GearsOperator, PistonOperator, RamAndPistonOperator};

/// Typed access to one variant of [`OperatorNode`].
pub trait OperatorVariant: Operator + Sized {
    /// The persisted `type` tag.
    const TYPE_NAME: &'static str;

    fn from_node(node: &OperatorNode) -> Option<&Self>;
    fn from_node_mut(node: &mut OperatorNode) -> Option<&mut Self>;
}

/// Generates the `OperatorNode` enum, its trait dispatch and the
/// `OperatorVariant` / `From` impls for every operator type.
macro_rules! operator_nodes {
    ( $( $variant:ident ( $ty:ty ) ),* $(,)? ) => {
        #[derive(Debug, Serialize, Deserialize)]
        #[serde(tag = "type")]
        pub enum OperatorNode {
            $( $variant($ty), )*
        }

        impl OperatorNode {
            #[must_use]
            pub fn as_operator(&self) -> &dyn Operator {
                match self {
                    $( OperatorNode::$variant(op) => op, )*
                }
            }

            pub fn as_operator_mut(&mut self) -> &mut dyn Operator {
                match self {
                    $( OperatorNode::$variant(op) => op, )*
                }
            }

            #[must_use]
            pub fn type_name(&self) -> &'static str {
                match self {
                    $( OperatorNode::$variant(_) => stringify!($variant), )*
                }
            }
        }

        $(
            impl OperatorVariant for $ty {
                const TYPE_NAME: &'static str = stringify!($variant);

                fn from_node(node: &OperatorNode) -> Option<&Self> {
                    match node {
                        OperatorNode::$variant(op) => Some(op),
                        #[allow(unreachable_patterns)]
                        _ => None,
                    }
                }

                fn from_node_mut(node: &mut OperatorNode) -> Option<&mut Self> {
                    match node {
                        OperatorNode::$variant(op) => Some(op),
                        #[allow(unreachable_patterns)]
                        _ => None,
                    }
                }
            }

            impl From<$ty> for OperatorNode {
                fn from(op: $ty) -> Self {
                    OperatorNode::$variant(op)
                }
            }
        )*
    };
}

operator_nodes! {
    IkSolver(IkSolver),
    TriangleIkSolver(TriangleIkSolver),
    AttachmentConstraint(AttachmentConstraint),
    Gears(GearsOperator),
    Piston(PistonOperator),
    RamAndPiston(RamAndPistonOperator),
    ExplodeParts(ExplodePartsOperator),
    TrackSampler(TrackSampler),
}
