//! Addressable volume/mute targets.
//!
//! A target is the master endpoint, the system-sounds session, or one
//! application's session addressed by pid. Volumes cross this layer as
//! percentages in `[0, 100]`; the platform seam below speaks scalars in
//! `[0, 1]`.

use crate::audio::{AudioError, AudioSystem, SessionControl};

/// Reserved pid for the master endpoint on the wire.
pub const MASTER_PID: i32 = -1;
/// Reserved pid for the system-sounds session on the wire.
pub const SYSTEM_SOUNDS_PID: i32 = -2;

/// The system-sounds session advertises this resource in its display name.
/// Matching it is a substring heuristic, not a hard identity.
const SYSTEM_SOUNDS_MARKER: &str = "@%systemroot%\\system32\\audiosrv.dll";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Master,
    SystemSounds,
    Application(u32),
}

impl Target {
    pub fn from_pid(pid: i32) -> Self {
        match pid {
            MASTER_PID => Target::Master,
            SYSTEM_SOUNDS_PID => Target::SystemSounds,
            other => Target::Application(other as u32),
        }
    }

    fn pid(self) -> i32 {
        match self {
            Target::Master => MASTER_PID,
            Target::SystemSounds => SYSTEM_SOUNDS_PID,
            Target::Application(pid) => pid as i32,
        }
    }
}

/// Current volume of the target as a percentage.
pub fn volume(system: &mut dyn AudioSystem, target: Target) -> Result<f32, AudioError> {
    match target {
        Target::Master => Ok(system.endpoint()?.volume()? * 100.0),
        other => Ok(resolve_session(system, other)?.volume()? * 100.0),
    }
}

/// Set the target volume from a percentage. No clamping here: out-of-range
/// values pass through and the platform may reject them.
pub fn set_volume(system: &mut dyn AudioSystem, target: Target, percent: f32) -> Result<(), AudioError> {
    let scalar = percent / 100.0;
    match target {
        Target::Master => system.endpoint()?.set_volume(scalar),
        other => resolve_session(system, other)?.set_volume(scalar),
    }
}

/// Current mute state of the target.
pub fn mute(system: &mut dyn AudioSystem, target: Target) -> Result<bool, AudioError> {
    match target {
        Target::Master => system.endpoint()?.mute(),
        other => resolve_session(system, other)?.mute(),
    }
}

pub fn set_mute(system: &mut dyn AudioSystem, target: Target, muted: bool) -> Result<(), AudioError> {
    match target {
        Target::Master => system.endpoint()?.set_mute(muted),
        other => resolve_session(system, other)?.set_mute(muted),
    }
}

/// Step the master volume by a percentage delta, clamping the result to
/// `[0, 100]`. Returns the percentage that was set. The only operation in
/// this layer with clamping semantics: incremental up/down requests must not
/// run past the scale ends.
pub fn step_master_volume(system: &mut dyn AudioSystem, delta: f32) -> Result<f32, AudioError> {
    let mut endpoint = system.endpoint()?;
    let next = (endpoint.volume()? + delta / 100.0).clamp(0.0, 1.0);
    endpoint.set_volume(next)?;
    Ok(next * 100.0)
}

/// Flip the master mute state; returns the new state.
pub fn toggle_master_mute(system: &mut dyn AudioSystem) -> Result<bool, AudioError> {
    let mut endpoint = system.endpoint()?;
    let next = !endpoint.mute()?;
    endpoint.set_mute(next)?;
    Ok(next)
}

/// Scan the enumerated sessions for the one this target addresses. Every
/// handle the scan produced, matched or not, is dropped (and released) when
/// this call returns.
fn resolve_session(
    system: &mut dyn AudioSystem,
    target: Target,
) -> Result<Box<dyn SessionControl>, AudioError> {
    let sessions = system.sessions()?;
    let found = match target {
        Target::Application(pid) => sessions.into_iter().find(|s| s.pid() == pid),
        Target::SystemSounds => sessions.into_iter().find(|s| {
            s.display_name()
                .is_some_and(|name| name.to_lowercase().contains(SYSTEM_SOUNDS_MARKER))
        }),
        Target::Master => unreachable!("master resolves to the endpoint, not a session"),
    };
    found.ok_or(AudioError::TargetNotFound(target.pid()))
}
