//! Snapshot assembly and its canonical wire form.
//!
//! A snapshot is the full mixer state at one instant: master endpoint,
//! system sounds, then one entry per distinct application pid. The JSON
//! serialization is canonical (stable entry order, stable field order), so
//! the broadcast loop can detect change by comparing strings.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::audio::AudioSystem;
use crate::directory::{self, SessionDirectory};
use crate::target::{self, MASTER_PID, SYSTEM_SOUNDS_PID, Target};

/// One mixer entry as clients see it. Field names (`Name`, `Pid`, `Volume`,
/// `IsMuted`) are the wire contract with existing clients; `None` serializes
/// as `null` and means the value could not be read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AudioInfo {
    pub name: String,
    pub pid: i32,
    pub volume: Option<f32>,
    pub is_muted: Option<bool>,
}

/// Build the current snapshot.
///
/// Master and system sounds are conceptual targets that always appear, with
/// `null` fields if their reads fail. Application sessions are transient and
/// best-effort: an entry whose reads fail is omitted entirely, and sessions
/// without a usable process name (missing, or a single character) are
/// skipped.
pub fn build(system: &mut dyn AudioSystem, directory: &mut SessionDirectory) -> Vec<AudioInfo> {
    let mut entries = vec![
        AudioInfo {
            name: "Master Volume".into(),
            pid: MASTER_PID,
            volume: target::volume(system, Target::Master).ok(),
            is_muted: target::mute(system, Target::Master).ok(),
        },
        AudioInfo {
            name: "System Sounds".into(),
            pid: SYSTEM_SOUNDS_PID,
            volume: target::volume(system, Target::SystemSounds).ok(),
            is_muted: target::mute(system, Target::SystemSounds).ok(),
        },
    ];

    let sessions = match directory.list(system) {
        Ok(sessions) => sessions,
        Err(err) => {
            debug!("session enumeration failed, reporting fixed targets only: {err}");
            Vec::new()
        }
    };

    for session in directory::dedup_by_pid(sessions) {
        let Some(process_name) = session.process_name else {
            continue;
        };
        if process_name.chars().count() <= 1 {
            continue;
        }
        let app = Target::Application(session.pid);
        let (volume, is_muted) = match (target::volume(system, app), target::mute(system, app)) {
            (Ok(volume), Ok(is_muted)) => (volume, is_muted),
            _ => continue,
        };
        entries.push(AudioInfo {
            name: directory::capitalize(&process_name),
            pid: session.pid as i32,
            volume: Some(volume),
            is_muted: Some(is_muted),
        });
    }

    entries
}

/// Canonical JSON array form: the value compared for change detection and
/// pushed to clients.
pub fn serialize(entries: &[AudioInfo]) -> serde_json::Result<String> {
    serde_json::to_string(entries)
}
