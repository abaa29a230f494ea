// Motor output path
//
// Provides:
// - Stick reading -> normalized velocity conversion (deadzone + rescale)
// - Change-driven mapping from velocities to per-motor channel commands

pub mod axis;
mod mapper;

pub use axis::axis_to_velocity;
pub use mapper::MotorOutputMapper;
