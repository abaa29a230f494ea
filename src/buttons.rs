// Button press -> action dispatch
//
// One transition per press, evaluated against the static bindings. A press
// with no binding falls through to the emergency stop, so an unmapped or
// misconfigured button can never do anything worse than halt the robot.

use std::time::Instant;

use tracing::{info, warn};

use crate::protocol::{cmd_disable, cmd_enable, PacketLink, CMD_EMERGENCY_STOP};
use crate::state::{Action, ButtonDefinition, RobotState, SpeedScale};
use crate::transport::Transport;

/// Whether the control loop should keep running after a press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Continue,
    Exit,
}

pub struct ButtonDispatcher {
    bindings: Vec<ButtonDefinition>,
}

impl ButtonDispatcher {
    pub fn new(bindings: Vec<ButtonDefinition>) -> Self {
        Self { bindings }
    }

    pub fn press<T: Transport>(
        &self,
        now: Instant,
        button: u8,
        state: &mut RobotState,
        link: &mut PacketLink<T>,
    ) -> Dispatch {
        let action = self
            .bindings
            .iter()
            .find(|b| b.button == button)
            .map(|b| b.action)
            .unwrap_or(Action::EmergencyStop);

        match action {
            Action::Enable => {
                for motor in 0..state.num_motors() {
                    link.send(now, cmd_enable(motor), 0);
                }
                state.enabled = true;
                info!("motors enabled");
            }
            Action::Disable => {
                for motor in 0..state.num_motors() {
                    link.send(now, cmd_disable(motor), 0);
                }
                state.enabled = false;
                info!("motors disabled");
            }
            Action::SpeedFast => {
                state.speed = SpeedScale::Normal;
                info!("speed scale: normal");
            }
            Action::SpeedSlow => {
                state.speed = SpeedScale::Slow;
                info!("speed scale: slow");
            }
            Action::InvertOff => {
                state.inverted = false;
                info!("inversion off");
            }
            Action::InvertOn => {
                state.inverted = true;
                info!("inversion on");
            }
            Action::StopAllMacros => {
                for m in state.macros.iter_mut().filter(|m| m.is_bound()) {
                    m.stop();
                }
                state.restore_live_axis();
                info!("all macros stopped");
            }
            Action::RunMacro(idx) => {
                let bound = state.macros.get(idx).is_some_and(|m| m.is_bound());
                if state.enabled && bound {
                    state.macros[idx].start(now);
                    info!("macro {} started", state.macros[idx].name);
                } else if let Some(m) = state.macros.get(idx) {
                    info!("macro {} would have run", m.name);
                }
            }
            Action::RequestExit => {
                info!("exit requested");
                return Dispatch::Exit;
            }
            Action::EmergencyStop => {
                link.send(now, CMD_EMERGENCY_STOP, 0);
                state.enabled = false;
                state.axis.fill(0.0);
                for m in state.macros.iter_mut() {
                    m.stop();
                }
                warn!("emergency stop");
            }
        }
        Dispatch::Continue
    }
}
