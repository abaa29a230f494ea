// Gamepad input adapter
//
// The runtime only sees discrete events carrying the small integer ids the
// config file binds against. The gilrs-specific naming stays in here.
//
// Axis ids:   0/1 left stick X/Y, 2/3 right stick X/Y, 4/5 triggers
// Button ids: 0..=10 pad buttons (south, east, west, north, LB, RB,
//             select, start, mode, L3, R3), 11..=14 the D-pad directions

use gilrs::{Axis, Button, Event, EventType, Gilrs};
use tracing::{info, warn};

/// Discrete event from the operator's pad.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    AxisMoved { axis: u8, raw: i16 },
    ButtonPressed { button: u8 },
    Quit,
}

/// A lazy, restartable sequence of input events, drained once per tick.
pub trait InputSource {
    fn poll(&mut self) -> Option<InputEvent>;
}

pub fn axis_id(axis: Axis) -> Option<u8> {
    match axis {
        Axis::LeftStickX => Some(0),
        Axis::LeftStickY => Some(1),
        Axis::RightStickX => Some(2),
        Axis::RightStickY => Some(3),
        Axis::LeftZ => Some(4),
        Axis::RightZ => Some(5),
        _ => None,
    }
}

pub fn button_id(button: Button) -> Option<u8> {
    match button {
        Button::South => Some(0),
        Button::East => Some(1),
        Button::West => Some(2),
        Button::North => Some(3),
        Button::LeftTrigger => Some(4),
        Button::RightTrigger => Some(5),
        Button::Select => Some(6),
        Button::Start => Some(7),
        Button::Mode => Some(8),
        Button::LeftThumb => Some(9),
        Button::RightThumb => Some(10),
        Button::DPadUp => Some(11),
        Button::DPadDown => Some(12),
        Button::DPadLeft => Some(13),
        Button::DPadRight => Some(14),
        _ => None,
    }
}

/// Scale a gilrs [-1, 1] axis value back to the signed 16-bit range the
/// deadzone conversion is calibrated for.
pub fn to_raw(value: f32) -> i16 {
    (value.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

pub struct GilrsInput {
    gilrs: Gilrs,
}

impl GilrsInput {
    pub fn new() -> Result<Self, gilrs::Error> {
        let gilrs = Gilrs::new()?;
        let pads: Vec<String> = gilrs
            .gamepads()
            .map(|(_, pad)| pad.name().to_string())
            .collect();
        if pads.is_empty() {
            warn!("no gamepad connected, waiting for one");
        } else {
            info!("{} gamepad(s) found: {}", pads.len(), pads.join(", "));
        }
        Ok(Self { gilrs })
    }
}

impl InputSource for GilrsInput {
    fn poll(&mut self) -> Option<InputEvent> {
        while let Some(Event { id, event, .. }) = self.gilrs.next_event() {
            match event {
                EventType::AxisChanged(axis, value, _) => {
                    if let Some(axis) = axis_id(axis) {
                        return Some(InputEvent::AxisMoved {
                            axis,
                            raw: to_raw(value),
                        });
                    }
                }
                EventType::ButtonPressed(button, _) => {
                    if let Some(button) = button_id(button) {
                        return Some(InputEvent::ButtonPressed { button });
                    }
                }
                EventType::Connected => {
                    info!("gamepad {} connected", id);
                }
                EventType::Disconnected => {
                    warn!("gamepad {} disconnected", id);
                    return Some(InputEvent::Quit);
                }
                _ => {}
            }
        }
        None
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::collections::VecDeque;

    /// Scripted input source for runtime tests.
    #[derive(Default)]
    pub struct ScriptedInput {
        pub events: VecDeque<InputEvent>,
    }

    impl ScriptedInput {
        pub fn new(events: impl IntoIterator<Item = InputEvent>) -> Self {
            Self {
                events: events.into_iter().collect(),
            }
        }
    }

    impl InputSource for ScriptedInput {
        fn poll(&mut self) -> Option<InputEvent> {
            self.events.pop_front()
        }
    }
}
