//! Platform audio abstraction.
//!
//! Everything the server knows about the machine's mixer goes through the
//! [`AudioSystem`] trait: enumerate sessions on the default render device,
//! control the endpoint (master) volume, and list devices with their decoded
//! property stores. One adapter per platform:
//! - Windows: WASAPI via the `windows` crate (the only adapter today)
//!
//! Handles returned by the trait own their underlying platform objects and
//! release them on drop, so resolution scans can bail on any path without
//! leaking session or device references.

use std::collections::HashMap;

pub mod properties;

#[cfg(target_os = "windows")]
mod windows;

#[cfg(test)]
pub(crate) mod fake;

use properties::PropertyValue;

/// Errors from the platform seam and the target layer above it.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    /// A read or write against the platform could not be completed.
    /// Snapshot entries degrade to `null` fields or get skipped; never fatal.
    #[error("audio state unavailable: {0}")]
    Unavailable(String),
    /// An operation referenced a pid with no matching audio session.
    #[error("no audio session for pid {0}")]
    TargetNotFound(i32),
    /// No platform adapter exists for this OS.
    #[error("platform audio is not supported on this OS")]
    Unsupported,
}

/// Lifecycle state of an audio session, as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Inactive,
    Expired,
}

/// Lifecycle state of an audio device endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Active,
    Disabled,
    NotPresent,
    Unplugged,
}

/// Well-known device property key: human-readable device name.
pub const PKEY_DEVICE_FRIENDLY_NAME: &str = "{a45c254e-df1c-4efd-8020-67d146a850e0} 14";
/// Well-known device property key: device description.
pub const PKEY_DEVICE_DESCRIPTION: &str = "{a45c254e-df1c-4efd-8020-67d146a850e0} 2";

/// An audio endpoint device and its decoded property store.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub id: String,
    pub state: DeviceState,
    pub properties: HashMap<String, PropertyValue>,
}

impl DeviceInfo {
    pub fn friendly_name(&self) -> Option<String> {
        self.properties
            .get(PKEY_DEVICE_FRIENDLY_NAME)
            .map(|value| value.to_string())
    }

    pub fn description(&self) -> Option<String> {
        self.properties
            .get(PKEY_DEVICE_DESCRIPTION)
            .map(|value| value.to_string())
    }
}

/// Volume/mute control over the default render device endpoint.
/// All volumes at this seam are platform scalars in `[0, 1]`.
pub trait EndpointControl {
    fn volume(&self) -> Result<f32, AudioError>;
    fn set_volume(&mut self, scalar: f32) -> Result<(), AudioError>;
    fn mute(&self) -> Result<bool, AudioError>;
    fn set_mute(&mut self, muted: bool) -> Result<(), AudioError>;
}

/// One enumerated audio session and its volume control.
///
/// Identity fields are captured at enumeration time; a session the platform
/// could not fully inspect still appears, with whatever could be obtained
/// (pid 0, no display name, `Expired` state).
pub trait SessionControl {
    fn pid(&self) -> u32;
    fn display_name(&self) -> Option<String>;
    fn state(&self) -> SessionState;
    fn volume(&self) -> Result<f32, AudioError>;
    fn set_volume(&mut self, scalar: f32) -> Result<(), AudioError>;
    fn mute(&self) -> Result<bool, AudioError>;
    fn set_mute(&mut self, muted: bool) -> Result<(), AudioError>;
}

/// The platform audio collaborator. One instance lives on the audio engine
/// thread; nothing here is required to be `Send`.
pub trait AudioSystem {
    /// Enumerate the sessions on the default render device, in enumerator
    /// order. Handles release their platform objects on drop.
    fn sessions(&mut self) -> Result<Vec<Box<dyn SessionControl>>, AudioError>;

    /// Volume/mute control for the default render device endpoint.
    fn endpoint(&mut self) -> Result<Box<dyn EndpointControl>, AudioError>;

    /// Enumerate all audio endpoint devices with their property stores.
    fn devices(&mut self) -> Result<Vec<DeviceInfo>, AudioError>;
}

/// Create the audio system for the current platform.
pub fn create_system() -> anyhow::Result<Box<dyn AudioSystem>> {
    #[cfg(target_os = "windows")]
    return Ok(Box::new(windows::WasapiSystem::new()?));

    #[cfg(not(target_os = "windows"))]
    Err(AudioError::Unsupported.into())
}
