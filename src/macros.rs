// Pre-recorded timed motion sequences
//
// A macro file is plain text, one waypoint per line:
//
//     duration_ms v0 v1 ... v(num_motors-1)
//
// Durations are per-waypoint and get prefix-summed into cumulative offsets
// at load time. '#' starts a comment. A missing or malformed file is fatal
// at startup; playback itself never fails.

use std::fs;
use std::path::Path;
use std::time::Instant;

use tracing::{info, warn};

use crate::state::RobotState;

#[derive(Debug, thiserror::Error)]
pub enum MacroError {
    #[error("cannot read macro file: {0}")]
    Io(#[from] std::io::Error),

    #[error("{file}:{line}: {reason}")]
    Parse {
        file: String,
        line: usize,
        reason: String,
    },
}

/// One timestamped velocity vector. `at_ms` is the cumulative offset from
/// macro start; `velocity` always holds one entry per motor slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Waypoint {
    pub at_ms: u64,
    pub velocity: Vec<f32>,
}

/// A loaded macro plus its playback state. An empty waypoint list means
/// "nothing bound"; such a macro never starts.
#[derive(Debug, Clone)]
pub struct Macro {
    pub name: String,
    pub waypoints: Vec<Waypoint>,
    pub running: Option<Instant>,
    pub cursor: usize,
}

impl Macro {
    pub fn new(name: impl Into<String>, waypoints: Vec<Waypoint>) -> Self {
        Self {
            name: name.into(),
            waypoints,
            running: None,
            cursor: 0,
        }
    }

    /// Parse a macro file. Every line must carry a duration and exactly
    /// `num_motors` velocities; velocities outside [-1, 1] are clamped.
    pub fn load(path: &Path, num_motors: usize) -> Result<Self, MacroError> {
        let name = path.display().to_string();
        let raw = fs::read_to_string(path)?;
        let mut waypoints = Vec::new();
        let mut at_ms = 0u64;

        for (lineno, line) in raw.lines().enumerate() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let parse = |field: &str, what: &str| -> Result<f32, MacroError> {
                field.parse::<f32>().map_err(|_| MacroError::Parse {
                    file: name.clone(),
                    line: lineno + 1,
                    reason: format!("{} is not a number: {:?}", what, field),
                })
            };

            let mut fields = line.split_whitespace();
            let Some(duration) = fields.next() else {
                continue;
            };
            let duration = parse(duration, "duration")?;
            if duration < 0.0 {
                return Err(MacroError::Parse {
                    file: name.clone(),
                    line: lineno + 1,
                    reason: format!("negative duration {}", duration),
                });
            }

            let mut velocity = Vec::with_capacity(num_motors);
            for field in fields {
                let v = parse(field, "velocity")?;
                if !(-1.0..=1.0).contains(&v) {
                    warn!("{}:{}: velocity {} clamped to [-1, 1]", name, lineno + 1, v);
                }
                velocity.push(v.clamp(-1.0, 1.0));
            }
            if velocity.len() != num_motors {
                return Err(MacroError::Parse {
                    file: name.clone(),
                    line: lineno + 1,
                    reason: format!(
                        "expected {} velocities, got {}",
                        num_motors,
                        velocity.len()
                    ),
                });
            }

            at_ms += duration as u64;
            waypoints.push(Waypoint { at_ms, velocity });
        }

        Ok(Self::new(name, waypoints))
    }

    pub fn is_bound(&self) -> bool {
        !self.waypoints.is_empty()
    }

    /// (Re)start playback. Triggering an already-playing macro restarts it
    /// from the first waypoint.
    pub fn start(&mut self, now: Instant) {
        self.running = Some(now);
        self.cursor = 0;
    }

    pub fn stop(&mut self) {
        self.running = None;
    }
}

/// Advance every playing macro by one tick, writing waypoint velocities
/// over the effective axis values. A macro that has passed its last
/// waypoint window goes idle and the axes fall back to the live sticks.
pub fn tick_macros(now: Instant, state: &mut RobotState) {
    for i in 0..state.macros.len() {
        let Some(started) = state.macros[i].running else {
            continue;
        };
        let elapsed = now.duration_since(started).as_millis() as u64;
        let cursor = state.macros[i].cursor;
        let len = state.macros[i].waypoints.len();

        let in_window = cursor < len
            && (cursor == 0 || {
                let prev = state.macros[i].waypoints[cursor - 1].at_ms;
                let next = state.macros[i].waypoints[cursor].at_ms;
                elapsed > prev && elapsed < next
            });

        if in_window {
            let velocity = state.macros[i].waypoints[cursor].velocity.clone();
            for (slot, v) in velocity.into_iter().enumerate().take(state.axis.len()) {
                state.axis[slot] = v;
            }
            state.macros[i].cursor += 1;
            continue;
        }

        // Finished once the last applied waypoint's window has elapsed.
        // An inconsistent cursor/waypoint pairing also lands here and is
        // treated as finished rather than panicking.
        let done = match cursor.checked_sub(1).and_then(|c| state.macros[i].waypoints.get(c)) {
            Some(wp) => elapsed > wp.at_ms,
            None => true,
        };
        if done {
            state.macros[i].stop();
            state.restore_live_axis();
            info!("macro {} finished", state.macros[i].name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    fn two_motor_macro() -> Macro {
        // Illustrative two-waypoint sequence: forward nudge then a turn.
        Macro::new(
            "test",
            vec![
                Waypoint {
                    at_ms: 100,
                    velocity: vec![0.2, 0.2],
                },
                Waypoint {
                    at_ms: 250,
                    velocity: vec![0.2, -0.3],
                },
            ],
        )
    }

    fn state_with(m: Macro) -> RobotState {
        let mut s = RobotState::new(2, vec![m]);
        s.enabled = true;
        s
    }

    #[test]
    fn test_playback_timeline() {
        let t0 = Instant::now();
        let mut state = state_with(two_motor_macro());
        state.live = vec![0.9, -0.9];
        state.macros[0].start(t0);

        tick_macros(t0 + Duration::from_millis(50), &mut state);
        assert_eq!(state.axis, vec![0.2, 0.2]);
        assert!(state.macros[0].running.is_some());

        tick_macros(t0 + Duration::from_millis(150), &mut state);
        assert_eq!(state.axis, vec![0.2, -0.3]);
        assert!(state.macros[0].running.is_some());

        // Past the last window: idle again, axes follow the live sticks.
        tick_macros(t0 + Duration::from_millis(260), &mut state);
        assert!(state.macros[0].running.is_none());
        assert_eq!(state.axis, vec![0.9, -0.9]);
    }

    #[test]
    fn test_holds_last_waypoint_until_window_elapses() {
        let t0 = Instant::now();
        let mut state = state_with(two_motor_macro());
        state.macros[0].start(t0);
        tick_macros(t0 + Duration::from_millis(10), &mut state);
        tick_macros(t0 + Duration::from_millis(150), &mut state);
        tick_macros(t0 + Duration::from_millis(200), &mut state);
        assert!(state.macros[0].running.is_some());
        assert_eq!(state.axis, vec![0.2, -0.3]);
    }

    #[test]
    fn test_single_waypoint_macro() {
        let t0 = Instant::now();
        let m = Macro::new(
            "single",
            vec![Waypoint {
                at_ms: 80,
                velocity: vec![1.0, 1.0],
            }],
        );
        let mut state = state_with(m);
        state.macros[0].start(t0);

        tick_macros(t0 + Duration::from_millis(1), &mut state);
        assert_eq!(state.axis, vec![1.0, 1.0]);

        tick_macros(t0 + Duration::from_millis(81), &mut state);
        assert!(state.macros[0].running.is_none());
    }

    #[test]
    fn test_retrigger_restarts_from_first_waypoint() {
        let t0 = Instant::now();
        let mut state = state_with(two_motor_macro());
        state.macros[0].start(t0);
        tick_macros(t0 + Duration::from_millis(10), &mut state);
        tick_macros(t0 + Duration::from_millis(150), &mut state);
        assert_eq!(state.macros[0].cursor, 2);

        let t1 = t0 + Duration::from_millis(180);
        state.macros[0].start(t1);
        assert_eq!(state.macros[0].cursor, 0);
        tick_macros(t1 + Duration::from_millis(10), &mut state);
        assert_eq!(state.axis, vec![0.2, 0.2]);
    }

    #[test]
    fn test_inconsistent_cursor_falls_back_to_live() {
        let t0 = Instant::now();
        let mut state = state_with(Macro::new("broken", Vec::new()));
        state.live = vec![0.1, 0.1];
        // Force a running macro with no waypoints; must resolve to idle,
        // never panic.
        state.macros[0].running = Some(t0);
        tick_macros(t0 + Duration::from_millis(5), &mut state);
        assert!(state.macros[0].running.is_none());
        assert_eq!(state.axis, vec![0.1, 0.1]);
    }

    fn write_macro(contents: &str) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!(
            "rover-teleop-macro-{}-{:?}",
            std::process::id(),
            std::thread::current().id()
        ));
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_prefix_sums_durations() {
        let path = write_macro("# spin in place\n100 0.5 -0.5\n\n150 0.2 0.2 # ease off\n");
        let m = Macro::load(&path, 2).unwrap();
        fs::remove_file(&path).ok();
        assert!(m.is_bound());
        assert_eq!(m.waypoints.len(), 2);
        assert_eq!(m.waypoints[0].at_ms, 100);
        assert_eq!(m.waypoints[1].at_ms, 250);
        assert_eq!(m.waypoints[1].velocity, vec![0.2, 0.2]);
    }

    #[test]
    fn test_load_rejects_wrong_arity() {
        let path = write_macro("100 0.5\n");
        let err = Macro::load(&path, 2).unwrap_err();
        fs::remove_file(&path).ok();
        assert!(matches!(err, MacroError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_load_rejects_non_numeric_fields() {
        let path = write_macro("100 fast 0.5\n");
        let err = Macro::load(&path, 2).unwrap_err();
        fs::remove_file(&path).ok();
        assert!(matches!(err, MacroError::Parse { .. }));
    }

    #[test]
    fn test_load_clamps_out_of_range_velocity() {
        let path = write_macro("100 2.0 -3.0\n");
        let m = Macro::load(&path, 2).unwrap();
        fs::remove_file(&path).ok();
        assert_eq!(m.waypoints[0].velocity, vec![1.0, -1.0]);
    }

    #[test]
    fn test_empty_file_is_unbound() {
        let path = write_macro("# nothing here\n");
        let m = Macro::load(&path, 2).unwrap();
        fs::remove_file(&path).ok();
        assert!(!m.is_bound());
    }
}
