// The control loop: poll input, advance macros, emit motor deltas,
// keep the link alive
//
// Single-threaded and tick-driven. Nothing blocks except the interval
// timer itself; input is drained without waiting and both the heartbeat
// and the macro windows are checked against the clock at the top of the
// tick. Dropping the session sends one final universal stop, so the robot
// halts on every exit path including errors.

use std::path::Path;
use std::time::{Duration, Instant};

use tokio::time::interval;
use tracing::{info, warn};

use crate::buttons::{ButtonDispatcher, Dispatch};
use crate::config::{Config, LOOP_HZ};
use crate::input::{GilrsInput, InputEvent, InputSource};
use crate::macros::{tick_macros, Macro, MacroError};
use crate::motor::{axis_to_velocity, MotorOutputMapper};
use crate::protocol::{PacketLink, CMD_EMERGENCY_STOP};
use crate::state::{Action, ActionKind, ButtonDefinition, RobotState};
use crate::transport::{Transport, TransportError, UdpTransport};

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Macro(#[from] MacroError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("input device unavailable: {0}")]
    Input(String),
}

/// Everything one control session owns: the state snapshot, the button
/// bindings, the per-motor mapper, and the packet link.
pub struct Session<T: Transport> {
    state: RobotState,
    dispatcher: ButtonDispatcher,
    mapper: MotorOutputMapper,
    link: PacketLink<T>,
    /// Physical axis id feeding each motor slot.
    axis_bindings: Vec<u8>,
}

impl<T: Transport> Session<T> {
    /// Resolve the config into a session: load every bound macro file
    /// (fatal on failure), degrade empty macro bindings to the emergency
    /// stop, and start the packet link at sequence 0.
    pub fn from_config(cfg: &Config, transport: T, now: Instant) -> Result<Self, MacroError> {
        let num_motors = cfg.motors.len();
        let mut macros = Vec::new();
        let mut bindings = Vec::with_capacity(cfg.buttons.len());

        for b in &cfg.buttons {
            let action = match b.action {
                ActionKind::RunMacro => match &b.macro_file {
                    Some(path) => {
                        let m = Macro::load(Path::new(path), num_motors)?;
                        if m.is_bound() {
                            info!(
                                "button {}: macro {} ({} waypoints)",
                                b.button,
                                m.name,
                                m.waypoints.len()
                            );
                            macros.push(m);
                            Action::RunMacro(macros.len() - 1)
                        } else {
                            warn!("button {}: macro {} is empty, unbound", b.button, m.name);
                            Action::EmergencyStop
                        }
                    }
                    None => {
                        warn!("button {}: run_macro without macro_file, unbound", b.button);
                        Action::EmergencyStop
                    }
                },
                ActionKind::EmergencyStop => Action::EmergencyStop,
                ActionKind::SpeedFast => Action::SpeedFast,
                ActionKind::SpeedSlow => Action::SpeedSlow,
                ActionKind::InvertOff => Action::InvertOff,
                ActionKind::InvertOn => Action::InvertOn,
                ActionKind::Enable => Action::Enable,
                ActionKind::Disable => Action::Disable,
                ActionKind::StopAllMacros => Action::StopAllMacros,
                ActionKind::RequestExit => Action::RequestExit,
            };
            bindings.push(ButtonDefinition {
                button: b.button,
                action,
            });
        }

        Ok(Self {
            state: RobotState::new(num_motors, macros),
            dispatcher: ButtonDispatcher::new(bindings),
            mapper: MotorOutputMapper::new(cfg.motors.clone()),
            link: PacketLink::new(transport, now),
            axis_bindings: cfg.motors.iter().map(|m| m.axis).collect(),
        })
    }

    /// Apply one input event. Axis motion always refreshes the live
    /// readout; it only drives the effective values directly while no
    /// macro is overriding them.
    pub fn handle_event(&mut self, now: Instant, event: InputEvent) -> Dispatch {
        match event {
            InputEvent::AxisMoved { axis, raw } => {
                let velocity = axis_to_velocity(raw);
                let overridden = self.state.macro_active();
                for slot in 0..self.axis_bindings.len() {
                    if self.axis_bindings[slot] == axis {
                        self.state.live[slot] = velocity;
                        if !overridden {
                            self.state.axis[slot] = velocity;
                        }
                    }
                }
                Dispatch::Continue
            }
            InputEvent::ButtonPressed { button } => {
                self.dispatcher
                    .press(now, button, &mut self.state, &mut self.link)
            }
            InputEvent::Quit => {
                info!("input source closed");
                Dispatch::Exit
            }
        }
    }

    /// One pass of the per-tick pipeline.
    pub fn tick(&mut self, now: Instant) {
        tick_macros(now, &mut self.state);
        self.mapper.tick(now, &self.state, &mut self.link);
        self.link.maybe_heartbeat(now);
    }

    #[cfg(test)]
    pub fn state(&self) -> &RobotState {
        &self.state
    }
}

impl<T: Transport> Drop for Session<T> {
    fn drop(&mut self) {
        // Last packet out is always the universal stop.
        self.link.send(Instant::now(), CMD_EMERGENCY_STOP, 0);
    }
}

pub async fn run(cfg: &Config) -> Result<(), RuntimeError> {
    let transport = UdpTransport::connect(&cfg.remote)?;
    let mut input = GilrsInput::new().map_err(|e| RuntimeError::Input(e.to_string()))?;
    let mut session = Session::from_config(cfg, transport, Instant::now())?;

    let mut tick = interval(Duration::from_millis(1000 / LOOP_HZ));
    info!(
        "session started: {} motors, remote {}, {}Hz loop",
        cfg.motors.len(),
        cfg.remote,
        LOOP_HZ
    );

    loop {
        tokio::select! {
            _ = tick.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, stopping");
                return Ok(());
            }
        }

        let now = Instant::now();
        while let Some(event) = input.poll() {
            if session.handle_event(now, event) == Dispatch::Exit {
                return Ok(());
            }
        }
        session.tick(now);
    }
}
