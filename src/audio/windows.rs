//! Windows audio control via WASAPI/COM.
//!
//! Every operation acquires its device, manager and session objects
//! transiently and lets the `windows` crate wrappers release them on drop, so
//! no COM reference outlives the call that needed it. The instance is owned
//! by the audio engine thread; COM is initialized once for that thread.

use std::collections::HashMap;

use windows::Win32::Media::Audio::Endpoints::IAudioEndpointVolume;
use windows::Win32::Media::Audio::{
    AudioSessionState, AudioSessionStateActive, AudioSessionStateInactive, DEVICE_STATE,
    DEVICE_STATE_ACTIVE, DEVICE_STATE_DISABLED, DEVICE_STATE_UNPLUGGED, DEVICE_STATEMASK_ALL,
    IAudioSessionControl, IAudioSessionControl2, IAudioSessionManager2, IMMDevice,
    IMMDeviceEnumerator, ISimpleAudioVolume, MMDeviceEnumerator, eAll, eMultimedia, eRender,
};
use windows::Win32::System::Com::StructuredStorage::{PROPVARIANT, PropVariantClear};
use windows::Win32::System::Com::{
    CLSCTX_ALL, COINIT_MULTITHREADED, CoCreateInstance, CoInitializeEx, CoTaskMemFree, STGM_READ,
};
use windows::Win32::System::Variant::{VARENUM, VT_BLOB, VT_BOOL, VT_CLSID, VT_LPWSTR, VT_UI4};
use windows::core::{GUID, Interface, PWSTR};

use super::properties::PropertyValue;
use super::{
    AudioError, AudioSystem, DeviceInfo, DeviceState, EndpointControl, SessionControl,
    SessionState,
};

pub struct WasapiSystem;

impl WasapiSystem {
    pub fn new() -> anyhow::Result<Self> {
        // One COM init for the engine thread that owns this instance.
        unsafe { CoInitializeEx(None, COINIT_MULTITHREADED).ok()? };
        Ok(Self)
    }

    /// Default render device (speakers), acquired fresh per operation.
    fn default_device(&self) -> Result<IMMDevice, AudioError> {
        unsafe {
            let enumerator: IMMDeviceEnumerator =
                CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL).map_err(unavailable)?;
            enumerator
                .GetDefaultAudioEndpoint(eRender, eMultimedia)
                .map_err(unavailable)
        }
    }
}

impl AudioSystem for WasapiSystem {
    fn sessions(&mut self) -> Result<Vec<Box<dyn SessionControl>>, AudioError> {
        unsafe {
            let device = self.default_device()?;
            let manager: IAudioSessionManager2 =
                device.Activate(CLSCTX_ALL, None).map_err(unavailable)?;
            let enumerator = manager.GetSessionEnumerator().map_err(unavailable)?;
            let count = enumerator.GetCount().map_err(unavailable)?;

            let mut sessions: Vec<Box<dyn SessionControl>> = Vec::with_capacity(count as usize);
            for index in 0..count {
                // One uninspectable session must not fail the enumeration.
                let Ok(control) = enumerator.GetSession(index) else {
                    continue;
                };
                sessions.push(Box::new(WasapiSession::capture(control)));
            }
            Ok(sessions)
        }
    }

    fn endpoint(&mut self) -> Result<Box<dyn EndpointControl>, AudioError> {
        unsafe {
            let device = self.default_device()?;
            let volume: IAudioEndpointVolume =
                device.Activate(CLSCTX_ALL, None).map_err(unavailable)?;
            Ok(Box::new(WasapiEndpoint { volume }))
        }
    }

    fn devices(&mut self) -> Result<Vec<DeviceInfo>, AudioError> {
        unsafe {
            let enumerator: IMMDeviceEnumerator =
                CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL).map_err(unavailable)?;
            let collection = enumerator
                .EnumAudioEndpoints(eAll, DEVICE_STATEMASK_ALL)
                .map_err(unavailable)?;
            let count = collection.GetCount().map_err(unavailable)?;

            let mut devices = Vec::with_capacity(count as usize);
            for index in 0..count {
                let Ok(device) = collection.Item(index) else {
                    continue;
                };
                devices.push(describe_device(&device));
            }
            Ok(devices)
        }
    }
}

unsafe fn describe_device(device: &IMMDevice) -> DeviceInfo {
    let id = unsafe { device.GetId() }
        .ok()
        .and_then(|raw| unsafe { take_pwstr(raw) })
        .unwrap_or_default();
    let state = unsafe { device.GetState() }
        .map(device_state)
        .unwrap_or(DeviceState::NotPresent);

    let mut properties = HashMap::new();
    if let Ok(store) = unsafe { device.OpenPropertyStore(STGM_READ) } {
        let count = unsafe { store.GetCount() }.unwrap_or(0);
        for index in 0..count {
            let Ok(key) = (unsafe { store.GetAt(index) }) else {
                continue;
            };
            let Ok(mut value) = (unsafe { store.GetValue(&key) }) else {
                continue;
            };
            let decoded = unsafe { decode_property(&value) };
            let _ = unsafe { PropVariantClear(&mut value) };
            properties.insert(
                format!("{} {}", guid_braced(&key.fmtid), key.pid),
                decoded,
            );
        }
    }

    DeviceInfo { id, state, properties }
}

/// Interpret the variant tags the property consumers care about; anything
/// else keeps its tag and renders as the `"<tag>:?"` placeholder.
unsafe fn decode_property(value: &PROPVARIANT) -> PropertyValue {
    let vt = unsafe { value.Anonymous.Anonymous.vt };
    match vt {
        VT_BOOL => PropertyValue::Bool(unsafe { value.Anonymous.Anonymous.Anonymous.boolVal }.as_bool()),
        VT_LPWSTR => {
            let raw = unsafe { value.Anonymous.Anonymous.Anonymous.pwszVal };
            PropertyValue::Text(if raw.is_null() {
                String::new()
            } else {
                unsafe { raw.to_string() }.unwrap_or_default()
            })
        }
        VT_UI4 => PropertyValue::U32(unsafe { value.Anonymous.Anonymous.Anonymous.ulVal }),
        VT_CLSID => {
            let raw = unsafe { value.Anonymous.Anonymous.Anonymous.puuid };
            if raw.is_null() {
                PropertyValue::Id(String::new())
            } else {
                PropertyValue::Id(guid_braced(unsafe { &*raw }))
            }
        }
        other => PropertyValue::Unsupported(tag_name(other)),
    }
}

fn tag_name(vt: VARENUM) -> String {
    if vt == VT_BLOB {
        "VT_BLOB".to_owned()
    } else {
        format!("VT_{}", vt.0)
    }
}

fn device_state(state: DEVICE_STATE) -> DeviceState {
    if state == DEVICE_STATE_ACTIVE {
        DeviceState::Active
    } else if state == DEVICE_STATE_DISABLED {
        DeviceState::Disabled
    } else if state == DEVICE_STATE_UNPLUGGED {
        DeviceState::Unplugged
    } else {
        DeviceState::NotPresent
    }
}

fn session_state(state: AudioSessionState) -> SessionState {
    if state == AudioSessionStateActive {
        SessionState::Active
    } else if state == AudioSessionStateInactive {
        SessionState::Inactive
    } else {
        SessionState::Expired
    }
}

/// Convert a COM-allocated wide string and free the allocation.
unsafe fn take_pwstr(raw: PWSTR) -> Option<String> {
    if raw.is_null() {
        return None;
    }
    let text = unsafe { raw.to_string() }.ok();
    unsafe { CoTaskMemFree(Some(raw.as_ptr() as *const _)) };
    text
}

fn guid_braced(guid: &GUID) -> String {
    format!(
        "{{{:08x}-{:04x}-{:04x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}}}",
        guid.data1,
        guid.data2,
        guid.data3,
        guid.data4[0],
        guid.data4[1],
        guid.data4[2],
        guid.data4[3],
        guid.data4[4],
        guid.data4[5],
        guid.data4[6],
        guid.data4[7],
    )
}

fn unavailable(err: windows::core::Error) -> AudioError {
    AudioError::Unavailable(err.to_string())
}

struct WasapiEndpoint {
    volume: IAudioEndpointVolume,
}

impl EndpointControl for WasapiEndpoint {
    fn volume(&self) -> Result<f32, AudioError> {
        unsafe { self.volume.GetMasterVolumeLevelScalar().map_err(unavailable) }
    }

    fn set_volume(&mut self, scalar: f32) -> Result<(), AudioError> {
        unsafe {
            self.volume
                .SetMasterVolumeLevelScalar(scalar, std::ptr::null())
                .map_err(unavailable)
        }
    }

    fn mute(&self) -> Result<bool, AudioError> {
        unsafe { self.volume.GetMute().map(|b| b.as_bool()).map_err(unavailable) }
    }

    fn set_mute(&mut self, muted: bool) -> Result<(), AudioError> {
        unsafe { self.volume.SetMute(muted, std::ptr::null()).map_err(unavailable) }
    }
}

struct WasapiSession {
    /// Identity captured at enumeration; reads that failed leave defaults.
    pid: u32,
    display_name: Option<String>,
    state: SessionState,
    volume: Option<ISimpleAudioVolume>,
}

impl WasapiSession {
    fn capture(control: IAudioSessionControl) -> Self {
        let pid = control
            .cast::<IAudioSessionControl2>()
            .ok()
            .and_then(|extended| unsafe { extended.GetProcessId() }.ok())
            .unwrap_or(0);
        let display_name = unsafe { control.GetDisplayName() }
            .ok()
            .and_then(|raw| unsafe { take_pwstr(raw) })
            .filter(|name| !name.is_empty());
        let state = unsafe { control.GetState() }
            .map(session_state)
            .unwrap_or(SessionState::Expired);
        let volume = control.cast::<ISimpleAudioVolume>().ok();
        Self {
            pid,
            display_name,
            state,
            volume,
        }
    }

    fn control(&self) -> Result<&ISimpleAudioVolume, AudioError> {
        self.volume
            .as_ref()
            .ok_or_else(|| AudioError::Unavailable("session has no volume control".into()))
    }
}

impl SessionControl for WasapiSession {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn display_name(&self) -> Option<String> {
        self.display_name.clone()
    }

    fn state(&self) -> SessionState {
        self.state
    }

    fn volume(&self) -> Result<f32, AudioError> {
        unsafe { self.control()?.GetMasterVolume().map_err(unavailable) }
    }

    fn set_volume(&mut self, scalar: f32) -> Result<(), AudioError> {
        unsafe {
            self.control()?
                .SetMasterVolume(scalar, std::ptr::null())
                .map_err(unavailable)
        }
    }

    fn mute(&self) -> Result<bool, AudioError> {
        unsafe {
            self.control()?
                .GetMute()
                .map(|b| b.as_bool())
                .map_err(unavailable)
        }
    }

    fn set_mute(&mut self, muted: bool) -> Result<(), AudioError> {
        unsafe {
            self.control()?
                .SetMute(muted, std::ptr::null())
                .map_err(unavailable)
        }
    }
}
