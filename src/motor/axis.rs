// Raw stick reading -> normalized velocity
// Pure deadzone-and-rescale conversion, no state.

use crate::config::DEADZONE;

/// Convert a signed 16-bit stick reading into a velocity in [-1.0, 1.0].
///
/// Readings inside the deadzone map to exactly 0.0; beyond it the value is
/// rescaled so the deadzone boundary is 0.0 and full deflection is 1.0.
/// Pushing the stick down/back reads negative on the wire but means
/// "forward" to the motor mapper, so the sign is flipped here.
pub fn axis_to_velocity(raw: i16) -> f32 {
    convert(raw, DEADZONE)
}

pub fn convert(raw: i16, deadzone: i32) -> f32 {
    let value = raw as i32;
    if value.abs() <= deadzone {
        return 0.0;
    }
    let span = (i16::MAX as i32 - deadzone) as f32;
    let normalized = (value.abs() - deadzone) as f32 / span;
    -normalized.min(1.0) * value.signum() as f32
}
