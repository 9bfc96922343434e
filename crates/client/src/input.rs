//! Operator input sources.
//!
//! The client core consumes "switch N observed at level V" events and does
//! not care whether they come from a keyboard, GPIO lines or a test harness.
//! On embedded targets switch lines bounce, so edges are confirmed with a
//! two-read debounce before being dispatched.

use std::io::{self, BufRead};
use std::time::Duration;

use crate::switch::Switch;

/// Settling time between the two debounce reads.
pub const DEBOUNCE_SETTLE: Duration = Duration::from_millis(30);

/// A switch observed at a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchEvent {
    /// Index into the panel.
    pub index: usize,
    /// Observed switch level.
    pub level: bool,
}

/// Blocking source of switch events.
pub trait InputSource {
    /// The next switch edge, or `None` when the input is exhausted.
    fn next_event(&mut self) -> io::Result<Option<SwitchEvent>>;
}

/// Two-read debounce: sample the line, wait for it to settle, sample again,
/// and accept the level only when both reads agree. One confirmed edge, one
/// dispatch.
pub fn debounce<F: FnMut() -> bool>(mut read_line: F, settle: Duration) -> Option<bool> {
    let first = read_line();
    std::thread::sleep(settle);
    let second = read_line();
    (first == second).then_some(second)
}

/// Keyboard panel for desktop use: one key per switch, each press toggles.
///
/// Keys `q w e r t y u i p a s d f g h` cover the actuator switches in panel
/// order; `z x c v b` cover the arming levels.
pub struct KeyboardInput<R> {
    reader: R,
    levels: Vec<bool>,
}

const KEYS: [char; 20] = [
    'q', 'w', 'e', 'r', 't', 'y', 'u', 'i', 'p', 'a', 's', 'd', 'f', 'g', 'h', 'z', 'x', 'c',
    'v', 'b',
];

impl KeyboardInput<io::StdinLock<'static>> {
    pub fn stdin() -> Self {
        Self::new(io::stdin().lock())
    }
}

impl<R: BufRead> KeyboardInput<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            levels: vec![false; KEYS.len()],
        }
    }

    /// The panel index bound to a key, if any.
    pub fn index_for_key(key: char) -> Option<usize> {
        KEYS.iter().position(|k| *k == key)
    }
}

impl<R: BufRead> InputSource for KeyboardInput<R> {
    fn next_event(&mut self) -> io::Result<Option<SwitchEvent>> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.reader.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            let Some(key) = line.trim().chars().next() else {
                continue;
            };
            let Some(index) = Self::index_for_key(key) else {
                eprintln!("Invalid key: {key}");
                continue;
            };
            self.levels[index] = !self.levels[index];
            return Ok(Some(SwitchEvent {
                index,
                level: self.levels[index],
            }));
        }
    }
}

/// Print the key bindings for a panel.
pub fn print_key_help(panel: &[Switch]) {
    for (key, switch) in KEYS.iter().zip(panel) {
        match switch.kind {
            crate::SwitchKind::Actuator(id) => println!("  {key}  toggle {}", id.name()),
            crate::SwitchKind::Arming(level) => println!("  {key}  arming: {level}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn keypresses_toggle_switches() {
        let mut input = KeyboardInput::new(Cursor::new("w\nw\nz\n"));
        assert_eq!(
            input.next_event().unwrap(),
            Some(SwitchEvent {
                index: 1,
                level: true
            })
        );
        assert_eq!(
            input.next_event().unwrap(),
            Some(SwitchEvent {
                index: 1,
                level: false
            })
        );
        assert_eq!(
            input.next_event().unwrap(),
            Some(SwitchEvent {
                index: 15,
                level: true
            })
        );
        assert_eq!(input.next_event().unwrap(), None);
    }

    #[test]
    fn unknown_keys_are_skipped() {
        let mut input = KeyboardInput::new(Cursor::new("?\n\nq\n"));
        assert_eq!(
            input.next_event().unwrap(),
            Some(SwitchEvent {
                index: 0,
                level: true
            })
        );
    }

    #[test]
    fn debounce_accepts_stable_levels() {
        let mut reads = [true, true].into_iter();
        assert_eq!(
            debounce(|| reads.next().unwrap(), Duration::ZERO),
            Some(true)
        );
    }

    #[test]
    fn debounce_rejects_bouncing_levels() {
        let mut reads = [true, false].into_iter();
        assert_eq!(debounce(|| reads.next().unwrap(), Duration::ZERO), None);
    }
}
