// Normalized velocities -> per-motor channel commands
//
// Each motor has a forward and a backward command channel on the wire.
// Commands only go out when a motor's effective value changed since the
// previous tick, so an idle session generates nothing but heartbeats.

use std::time::Instant;

use crate::config::MotorConfig;
use crate::protocol::{cmd_backward, cmd_forward, PacketLink};
use crate::state::{RobotState, SpeedScale};
use crate::transport::Transport;

struct Snapshot {
    speed: SpeedScale,
    inverted: bool,
    axis: Vec<f32>,
}

pub struct MotorOutputMapper {
    motors: Vec<MotorConfig>,
    prev: Option<Snapshot>,
}

impl MotorOutputMapper {
    pub fn new(motors: Vec<MotorConfig>) -> Self {
        Self { motors, prev: None }
    }

    pub fn num_motors(&self) -> usize {
        self.motors.len()
    }

    /// Which axis slot feeds this motor. Inversion reverses the slot
    /// assignment (for the usual two-motor tank drive, a swap); velocity
    /// signs are untouched.
    fn source_slot(&self, motor: usize, inverted: bool) -> usize {
        if inverted {
            self.motors.len() - 1 - motor
        } else {
            motor
        }
    }

    /// Compare against the previous tick and emit commands for every motor
    /// whose effective value changed. While disabled nothing is sent and
    /// the snapshot is dropped, so re-enabling resends the full state.
    pub fn tick<T: Transport>(
        &mut self,
        now: Instant,
        state: &RobotState,
        link: &mut PacketLink<T>,
    ) {
        if !state.enabled {
            self.prev = None;
            return;
        }

        let effective: Vec<f32> = (0..self.motors.len())
            .map(|m| state.axis[self.source_slot(m, state.inverted)])
            .collect();

        let all_changed = match &self.prev {
            None => true,
            Some(p) => p.speed != state.speed || p.inverted != state.inverted,
        };

        for (motor, &value) in effective.iter().enumerate() {
            let changed = all_changed
                || self
                    .prev
                    .as_ref()
                    .is_some_and(|p| p.axis[motor] != value);
            if changed {
                self.emit(now, motor, value, state.speed, link);
            }
        }

        self.prev = Some(Snapshot {
            speed: state.speed,
            inverted: state.inverted,
            axis: effective,
        });
    }

    /// Send the channel command(s) for one motor. Zero velocity explicitly
    /// zeroes both channels so a lost stop can't leave the receiver running
    /// on a stale command when the stick re-enters the deadzone.
    fn emit<T: Transport>(
        &self,
        now: Instant,
        motor: usize,
        value: f32,
        speed: SpeedScale,
        link: &mut PacketLink<T>,
    ) {
        let m = &self.motors[motor];
        if value == 0.0 {
            link.send(now, cmd_forward(motor), 0);
            link.send(now, cmd_backward(motor), 0);
            return;
        }

        let span = (m.max - m.min) as f32;
        let arg = (span * value.abs() / speed.divisor()).round() as u32 + m.min;
        let signed = value * m.dir as f32;
        let command = if signed > 0.0 {
            cmd_forward(motor)
        } else {
            cmd_backward(motor)
        };
        link.send(now, command, arg);
    }
}
