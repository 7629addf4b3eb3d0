//! Concrete mechanism state machines.

pub mod feeder;
pub mod intake;

pub use feeder::Feeder;
pub use intake::Intake;
