// Shared control state mutated once per tick

use serde::Deserialize;

use crate::macros::Macro;

/// Velocity magnitude divisor toggled by the speed buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedScale {
    Normal,
    Slow,
}

impl SpeedScale {
    pub fn divisor(self) -> f32 {
        match self {
            SpeedScale::Normal => 1.0,
            SpeedScale::Slow => 2.0,
        }
    }
}

/// Button behavior as named in the config file. `RunMacro` gets its macro
/// table index when the session loads the bound file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    EmergencyStop,
    RunMacro,
    SpeedFast,
    SpeedSlow,
    InvertOff,
    InvertOn,
    Enable,
    Disable,
    StopAllMacros,
    RequestExit,
}

/// Resolved button behavior. Macros live in the session table and are
/// referenced by index, so reloading the table cannot leave a button
/// pointing at freed memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    EmergencyStop,
    RunMacro(usize),
    SpeedFast,
    SpeedSlow,
    InvertOff,
    InvertOn,
    Enable,
    Disable,
    StopAllMacros,
    RequestExit,
}

/// Static binding of a physical button to its behavior.
#[derive(Debug, Clone)]
pub struct ButtonDefinition {
    pub button: u8,
    pub action: Action,
}

/// The authoritative control snapshot read and mutated each tick.
///
/// `live` holds the latest physical stick readout per motor slot; `axis`
/// holds the effective values the motor mapper sends. They diverge only
/// while a macro is overriding the sticks.
#[derive(Debug)]
pub struct RobotState {
    pub speed: SpeedScale,
    pub inverted: bool,
    pub enabled: bool,
    pub axis: Vec<f32>,
    pub live: Vec<f32>,
    pub macros: Vec<Macro>,
}

impl RobotState {
    pub fn new(num_motors: usize, macros: Vec<Macro>) -> Self {
        Self {
            speed: SpeedScale::Normal,
            inverted: false,
            enabled: false,
            axis: vec![0.0; num_motors],
            live: vec![0.0; num_motors],
            macros,
        }
    }

    pub fn num_motors(&self) -> usize {
        self.axis.len()
    }

    /// True while at least one macro is overriding the sticks.
    pub fn macro_active(&self) -> bool {
        self.macros.iter().any(|m| m.running.is_some())
    }

    /// Copy the live stick readout into the effective axis values.
    pub fn restore_live_axis(&mut self) {
        self.axis.copy_from_slice(&self.live);
    }
}
