//! Concrete environments.

pub mod cubes;
pub mod pendulum;

pub use cubes::{Control, CubesEnv, Task};
pub use pendulum::Pendulum;
