//! Session directory: which processes own audio sessions right now.
//!
//! Enumerates sessions through the platform seam and resolves each owning
//! process name from the OS process table. Resolution is best-effort: a pid
//! the table cannot name yields `process_name: None`, and one uninspectable
//! session never fails the whole listing. Nothing is cached across calls; a
//! session that disappears simply stops appearing.

use std::collections::HashSet;

use crate::audio::{AudioError, AudioSystem, SessionState};

/// One enumerated audio session, transient to a single snapshot build.
#[derive(Debug, Clone)]
pub struct Session {
    pub pid: u32,
    pub display_name: Option<String>,
    pub process_name: Option<String>,
    pub state: SessionState,
}

/// pid → process-name lookup. Split out as a trait so tests can substitute
/// a fixed table for the live process list.
pub trait ProcessNames: Send {
    /// Refresh the table before a batch of lookups.
    fn refresh(&mut self);
    fn name_of(&mut self, pid: u32) -> Option<String>;
}

/// Live process table backed by sysinfo.
pub struct SystemProcesses {
    system: sysinfo::System,
}

impl SystemProcesses {
    pub fn new() -> Self {
        Self {
            system: sysinfo::System::new(),
        }
    }
}

impl ProcessNames for SystemProcesses {
    fn refresh(&mut self) {
        self.system
            .refresh_processes(sysinfo::ProcessesToUpdate::All, true);
    }

    fn name_of(&mut self, pid: u32) -> Option<String> {
        self.system
            .process(sysinfo::Pid::from_u32(pid))
            .map(|process| {
                let name = process.name().to_string_lossy();
                name.trim_end_matches(".exe").to_string()
            })
    }
}

/// Fixed pid → name table for tests.
#[cfg(test)]
pub(crate) struct FixedNames(pub std::collections::HashMap<u32, String>);

#[cfg(test)]
impl ProcessNames for FixedNames {
    fn refresh(&mut self) {}

    fn name_of(&mut self, pid: u32) -> Option<String> {
        self.0.get(&pid).cloned()
    }
}

pub struct SessionDirectory {
    names: Box<dyn ProcessNames>,
}

impl SessionDirectory {
    pub fn new() -> Self {
        Self::with_names(Box::new(SystemProcesses::new()))
    }

    pub fn with_names(names: Box<dyn ProcessNames>) -> Self {
        Self { names }
    }

    /// List live sessions in enumerator order.
    pub fn list(&mut self, system: &mut dyn AudioSystem) -> Result<Vec<Session>, AudioError> {
        let controls = system.sessions()?;
        self.names.refresh();
        Ok(controls
            .iter()
            .map(|control| {
                let pid = control.pid();
                Session {
                    pid,
                    display_name: control.display_name(),
                    process_name: self.names.name_of(pid),
                    state: control.state(),
                }
            })
            .collect())
    }
}

/// Collapse multiple sessions owned by one process into a single entry.
/// The FIRST occurrence in enumeration order wins; order is preserved.
pub fn dedup_by_pid(sessions: Vec<Session>) -> Vec<Session> {
    let mut seen = HashSet::new();
    sessions
        .into_iter()
        .filter(|session| seen.insert(session.pid))
        .collect()
}

/// Display form of a process name: first character uppercased, the rest
/// lowercased. Cosmetic only; identity and matching always use the pid.
pub fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
