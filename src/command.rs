//! Inbound command protocol.
//!
//! Clients send one command per line, three fields joined by `*`:
//!
//! ```text
//! mute*1234*true
//! vol*-1*42.5
//! ```
//!
//! The action token at index 0 selects the operation; the pid routes to the
//! master endpoint (−1), system sounds (−2) or an application session. A
//! message that does not parse is dropped with no reply and no state change.

use crate::audio::{AudioError, AudioSystem};
use crate::target::{self, Target};

const DELIMITER: char = '*';

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    SetVolume { pid: i32, percent: f32 },
    SetMute { pid: i32, muted: bool },
}

#[derive(Debug, thiserror::Error)]
#[error("malformed command {0:?}")]
pub struct MalformedCommand(pub String);

/// Parse one raw message. Wrong field count, an unknown action token, a
/// non-numeric pid, or an unparsable/non-finite value all reject the message.
pub fn parse(raw: &str) -> Result<Command, MalformedCommand> {
    let malformed = || MalformedCommand(raw.to_owned());

    let mut fields = raw.trim().split(DELIMITER);
    let (Some(action), Some(pid), Some(value), None) =
        (fields.next(), fields.next(), fields.next(), fields.next())
    else {
        return Err(malformed());
    };

    let pid: i32 = pid.parse().map_err(|_| malformed())?;
    match action {
        "mute" => {
            let muted: bool = value.parse().map_err(|_| malformed())?;
            Ok(Command::SetMute { pid, muted })
        }
        "vol" => {
            let percent: f32 = value.parse().map_err(|_| malformed())?;
            if !percent.is_finite() {
                return Err(malformed());
            }
            Ok(Command::SetVolume { pid, percent })
        }
        _ => Err(malformed()),
    }
}

/// Apply a parsed command through the target layer. Volume percentages from
/// the wire are clamped to `[0, 100]` here, at the protocol boundary; the
/// target layer itself stays pass-through. Failures (unknown pid, platform
/// errors) propagate to the caller, which discards them.
pub fn apply(system: &mut dyn AudioSystem, command: Command) -> Result<(), AudioError> {
    match command {
        Command::SetVolume { pid, percent } => {
            target::set_volume(system, Target::from_pid(pid), percent.clamp(0.0, 100.0))
        }
        Command::SetMute { pid, muted } => target::set_mute(system, Target::from_pid(pid), muted),
    }
}
