//! Algebraic mechanisms: coupled motion computed from a few parameters.

pub mod driver;
pub mod explode;
pub mod gears;
pub mod piston;
pub mod ram_piston;

pub use driver::RpmDriver;
pub use explode::{ExplodePart, ExplodePartsOperator};
pub use gears::{Gear, GearsOperator};
pub use piston::{Piston, PistonOperator};
pub use ram_piston::RamAndPistonOperator;
