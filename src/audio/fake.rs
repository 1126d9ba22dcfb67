//! In-memory [`AudioSystem`] for tests.
//!
//! Backed by shared state so a test can keep a handle, mutate the mixer
//! underneath the code under test, and inspect what commands wrote back.
//! Individual reads can be broken per session or for the whole endpoint to
//! exercise the degrade-to-null and skip-entry paths.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::properties::PropertyValue;
use super::{
    AudioError, AudioSystem, DeviceInfo, DeviceState, EndpointControl, SessionControl,
    SessionState, PKEY_DEVICE_FRIENDLY_NAME,
};

/// Display name carrying the platform's system-sounds marker.
pub(crate) const SYSTEM_SOUNDS_DISPLAY_NAME: &str = "@%SystemRoot%\\System32\\AudioSrv.Dll,-202";

#[derive(Clone)]
pub(crate) struct FakeAudioSystem {
    state: Arc<Mutex<FakeState>>,
}

struct FakeState {
    endpoint_scalar: f32,
    endpoint_muted: bool,
    endpoint_broken: bool,
    enumeration_broken: bool,
    sessions: Vec<FakeSession>,
}

struct FakeSession {
    pid: u32,
    display_name: Option<String>,
    state: SessionState,
    scalar: f32,
    muted: bool,
    broken: bool,
}

impl FakeAudioSystem {
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState {
                endpoint_scalar: 0.5,
                endpoint_muted: false,
                endpoint_broken: false,
                enumeration_broken: false,
                sessions: Vec::new(),
            })),
        }
    }

    pub(crate) fn boxed(&self) -> Box<dyn AudioSystem> {
        Box::new(self.clone())
    }

    pub(crate) fn push_session(&self, pid: u32, display_name: Option<&str>, scalar: f32, muted: bool) {
        self.state.lock().unwrap().sessions.push(FakeSession {
            pid,
            display_name: display_name.map(str::to_owned),
            state: SessionState::Active,
            scalar,
            muted,
            broken: false,
        });
    }

    pub(crate) fn push_system_sounds(&self, scalar: f32, muted: bool) {
        self.push_session(0, Some(SYSTEM_SOUNDS_DISPLAY_NAME), scalar, muted);
    }

    pub(crate) fn set_endpoint(&self, scalar: f32, muted: bool) {
        let mut state = self.state.lock().unwrap();
        state.endpoint_scalar = scalar;
        state.endpoint_muted = muted;
    }

    pub(crate) fn break_endpoint(&self) {
        self.state.lock().unwrap().endpoint_broken = true;
    }

    pub(crate) fn break_enumeration(&self) {
        self.state.lock().unwrap().enumeration_broken = true;
    }

    pub(crate) fn break_session(&self, pid: u32) {
        let mut state = self.state.lock().unwrap();
        for session in state.sessions.iter_mut().filter(|s| s.pid == pid) {
            session.broken = true;
        }
    }

    pub(crate) fn endpoint_scalar(&self) -> f32 {
        self.state.lock().unwrap().endpoint_scalar
    }

    pub(crate) fn endpoint_muted(&self) -> bool {
        self.state.lock().unwrap().endpoint_muted
    }

    /// Scalar of the first session with this pid.
    pub(crate) fn session_scalar(&self, pid: u32) -> Option<f32> {
        let state = self.state.lock().unwrap();
        state.sessions.iter().find(|s| s.pid == pid).map(|s| s.scalar)
    }

    pub(crate) fn session_muted(&self, pid: u32) -> Option<bool> {
        let state = self.state.lock().unwrap();
        state.sessions.iter().find(|s| s.pid == pid).map(|s| s.muted)
    }
}

impl AudioSystem for FakeAudioSystem {
    fn sessions(&mut self) -> Result<Vec<Box<dyn SessionControl>>, AudioError> {
        let state = self.state.lock().unwrap();
        if state.enumeration_broken {
            return Err(AudioError::Unavailable("session enumeration broken".into()));
        }
        Ok((0..state.sessions.len())
            .map(|index| {
                Box::new(FakeSessionControl {
                    state: Arc::clone(&self.state),
                    index,
                }) as Box<dyn SessionControl>
            })
            .collect())
    }

    fn endpoint(&mut self) -> Result<Box<dyn EndpointControl>, AudioError> {
        Ok(Box::new(FakeEndpointControl {
            state: Arc::clone(&self.state),
        }))
    }

    fn devices(&mut self) -> Result<Vec<DeviceInfo>, AudioError> {
        let mut properties = HashMap::new();
        properties.insert(
            PKEY_DEVICE_FRIENDLY_NAME.to_owned(),
            PropertyValue::Text("Fake Speakers".into()),
        );
        Ok(vec![DeviceInfo {
            id: "fake-render-0".into(),
            state: DeviceState::Active,
            properties,
        }])
    }
}

struct FakeEndpointControl {
    state: Arc<Mutex<FakeState>>,
}

impl EndpointControl for FakeEndpointControl {
    fn volume(&self) -> Result<f32, AudioError> {
        let state = self.state.lock().unwrap();
        if state.endpoint_broken {
            return Err(AudioError::Unavailable("endpoint broken".into()));
        }
        Ok(state.endpoint_scalar)
    }

    fn set_volume(&mut self, scalar: f32) -> Result<(), AudioError> {
        let mut state = self.state.lock().unwrap();
        if state.endpoint_broken {
            return Err(AudioError::Unavailable("endpoint broken".into()));
        }
        state.endpoint_scalar = scalar;
        Ok(())
    }

    fn mute(&self) -> Result<bool, AudioError> {
        let state = self.state.lock().unwrap();
        if state.endpoint_broken {
            return Err(AudioError::Unavailable("endpoint broken".into()));
        }
        Ok(state.endpoint_muted)
    }

    fn set_mute(&mut self, muted: bool) -> Result<(), AudioError> {
        let mut state = self.state.lock().unwrap();
        if state.endpoint_broken {
            return Err(AudioError::Unavailable("endpoint broken".into()));
        }
        state.endpoint_muted = muted;
        Ok(())
    }
}

struct FakeSessionControl {
    state: Arc<Mutex<FakeState>>,
    index: usize,
}

impl FakeSessionControl {
    fn read<T>(&self, field: impl FnOnce(&FakeSession) -> T) -> T {
        let state = self.state.lock().unwrap();
        field(&state.sessions[self.index])
    }

    fn read_checked<T>(&self, field: impl FnOnce(&FakeSession) -> T) -> Result<T, AudioError> {
        let state = self.state.lock().unwrap();
        let session = &state.sessions[self.index];
        if session.broken {
            return Err(AudioError::Unavailable("session broken".into()));
        }
        Ok(field(session))
    }

    fn write(&self, apply: impl FnOnce(&mut FakeSession)) -> Result<(), AudioError> {
        let mut state = self.state.lock().unwrap();
        let session = &mut state.sessions[self.index];
        if session.broken {
            return Err(AudioError::Unavailable("session broken".into()));
        }
        apply(session);
        Ok(())
    }
}

impl SessionControl for FakeSessionControl {
    fn pid(&self) -> u32 {
        self.read(|s| s.pid)
    }

    fn display_name(&self) -> Option<String> {
        self.read(|s| s.display_name.clone())
    }

    fn state(&self) -> SessionState {
        self.read(|s| s.state)
    }

    fn volume(&self) -> Result<f32, AudioError> {
        self.read_checked(|s| s.scalar)
    }

    fn set_volume(&mut self, scalar: f32) -> Result<(), AudioError> {
        self.write(|s| s.scalar = scalar)
    }

    fn mute(&self) -> Result<bool, AudioError> {
        self.read_checked(|s| s.muted)
    }

    fn set_mute(&mut self, muted: bool) -> Result<(), AudioError> {
        self.write(|s| s.muted = muted)
    }
}
