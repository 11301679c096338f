//! Safe owning wrapper around a native Csound instance
//!
//! `CsoundBridge` is the single owner of one `CSOUND*`: it configures the
//! global environment, creates the instance, compiles the orchestra, and
//! releases everything exactly once when dropped - including on early-return
//! error paths, since the wrapper is constructed as soon as the instance
//! exists.

use super::adapter::SpinSpout;
use super::csound_sys::{CsoundApi, CsoundPtr, Myflt, CSOUNDINIT_NO_SIGNAL_HANDLER};
use crate::environment::CsoundEnvironment;
use std::ffi::{CStr, CString};
use std::os::raw::c_int;
use std::path::Path;
use std::ptr;

pub struct CsoundBridge {
    api: CsoundApi,
    instance: CsoundPtr,
    compiled_ok: bool,
}

// Safety: CsoundBridge holds a raw pointer to the native engine instance.
// It is Send because:
// 1. The bridge is a single owner - the pointer is never shared or cloned
// 2. All access goes through the engine's RwLock, so calls never overlap
// 3. Initialization fully completes before the audio thread first touches it
unsafe impl Send for CsoundBridge {}

// Safety: the same invariants make it Sync - every method is funnelled through
// the engine's RwLock, so no two threads ever touch the instance concurrently.
unsafe impl Sync for CsoundBridge {}

impl CsoundBridge {
    /// Create a Csound instance and compile `csd_path`.
    ///
    /// A compile failure is not an error: the bridge is still returned (its
    /// message buffer holds the compiler output) with `compiled_ok() == false`
    /// and all audio processing downstream becomes a no-op.
    pub fn create(
        env: &CsoundEnvironment,
        csd_path: &Path,
        host_buffer_frames: u32,
    ) -> Result<Self, String> {
        let api = CsoundApi::load(&env.csound_library)?;

        for (name, value) in env.global_env_vars() {
            set_global_env(&api, name, &value);
        }

        unsafe { (api.initialize)(CSOUNDINIT_NO_SIGNAL_HANDLER) };
        let instance = unsafe { (api.create)(ptr::null_mut()) };
        if instance.is_null() {
            return Err("csoundCreate returned null".to_string());
        }

        // From here on the bridge owns the instance; any early return below
        // releases it through Drop.
        let mut bridge = Self {
            api,
            instance,
            compiled_ok: false,
        };

        unsafe {
            (bridge.api.set_host_implemented_audio_io)(
                bridge.instance,
                1,
                host_buffer_frames as c_int,
            );
            (bridge.api.create_message_buffer)(bridge.instance, 0);
        }

        let argv0 = CString::new("csound").expect("static argv");
        let argv1 = CString::new(csd_path.to_string_lossy().as_bytes())
            .map_err(|e| format!("invalid csd path: {}", e))?;
        let argv = [argv0.as_ptr(), argv1.as_ptr()];

        let ret = unsafe { (bridge.api.compile)(bridge.instance, 2, argv.as_ptr()) };
        bridge.compiled_ok = ret == 0;
        if bridge.compiled_ok {
            log::info!("Compiled {}", csd_path.display());
        } else {
            log::warn!("csoundCompile failed with code {}", ret);
        }

        Ok(bridge)
    }

    pub fn compiled_ok(&self) -> bool {
        self.compiled_ok
    }

    /// Engine frame size in samples per channel
    pub fn ksmps(&self) -> u32 {
        unsafe { (self.api.get_ksmps)(self.instance) }
    }

    /// Control rate in Hz
    pub fn kr(&self) -> Myflt {
        unsafe { (self.api.get_kr)(self.instance) }
    }

    /// Full-scale amplitude reference used to normalize engine output
    pub fn zero_dbfs(&self) -> Myflt {
        unsafe { (self.api.get_0dbfs)(self.instance) }
    }

    pub fn clear_spin(&self) {
        unsafe { (self.api.clear_spin)(self.instance) }
    }

    pub fn set_control_channel(&self, name: &str, value: Myflt) {
        let Ok(name) = CString::new(name) else { return };
        unsafe { (self.api.set_control_channel)(self.instance, name.as_ptr(), value) }
    }

    pub fn control_channel(&self, name: &str) -> Myflt {
        let Ok(name) = CString::new(name) else {
            return 0.0;
        };
        unsafe { (self.api.get_control_channel)(self.instance, name.as_ptr(), ptr::null_mut()) }
    }

    pub fn set_string_channel(&self, name: &str, value: &str) {
        let (Ok(name), Ok(value)) = (CString::new(name), CString::new(value)) else {
            return;
        };
        unsafe { (self.api.set_string_channel)(self.instance, name.as_ptr(), value.as_ptr()) }
    }

    pub fn string_channel(&self, name: &str) -> String {
        let Ok(name) = CString::new(name) else {
            return String::new();
        };
        // Csound string channels are capped at the engine's channel string
        // size; 256 covers every build in practice
        let mut buffer = [0u8; 256];
        unsafe {
            (self.api.get_string_channel)(
                self.instance,
                name.as_ptr(),
                buffer.as_mut_ptr() as *mut _,
            );
            CStr::from_ptr(buffer.as_ptr() as *const _)
                .to_string_lossy()
                .into_owned()
        }
    }

    /// Copy the current engine frame of a named audio-rate channel into
    /// `samples`. The destination must hold at least `ksmps()` values.
    pub fn read_audio_channel(&self, name: &str, samples: &mut [Myflt]) {
        debug_assert!(samples.len() >= self.ksmps() as usize);
        let Ok(name) = CString::new(name) else { return };
        unsafe {
            (self.api.get_audio_channel)(self.instance, name.as_ptr(), samples.as_mut_ptr())
        }
    }

    /// Inject a textual score event, e.g. `"i1 0 10"`
    pub fn send_score_event(&self, event: &str) {
        let Ok(event) = CString::new(event) else { return };
        unsafe { (self.api.input_message)(self.instance, event.as_ptr()) }
    }

    pub fn table_value(&self, table: i32, index: i32) -> Myflt {
        unsafe { (self.api.table_get)(self.instance, table as c_int, index as c_int) }
    }

    pub fn message_count(&self) -> usize {
        unsafe { (self.api.get_message_cnt)(self.instance).max(0) as usize }
    }

    /// Pop the oldest queued diagnostic message, if any
    pub fn pop_message(&self) -> Option<String> {
        if self.message_count() == 0 {
            return None;
        }
        let text = unsafe {
            let message = (self.api.get_first_message)(self.instance);
            if message.is_null() {
                None
            } else {
                Some(CStr::from_ptr(message).to_string_lossy().into_owned())
            }
        };
        unsafe { (self.api.pop_first_message)(self.instance) };
        text
    }

    pub fn stop(&self) {
        unsafe { (self.api.stop)(self.instance) }
    }
}

impl SpinSpout for CsoundBridge {
    fn perform_ksmps(&mut self) -> i32 {
        unsafe { (self.api.perform_ksmps)(self.instance) }
    }

    fn spout_sample(&self, frame: usize, channel: usize) -> Myflt {
        unsafe { (self.api.get_spout_sample)(self.instance, frame as c_int, channel as c_int) }
    }

    fn add_spin_sample(&mut self, frame: usize, channel: usize, sample: Myflt) {
        unsafe {
            (self.api.add_spin_sample)(self.instance, frame as c_int, channel as c_int, sample)
        }
    }
}

impl Drop for CsoundBridge {
    fn drop(&mut self) {
        log::info!("Releasing Csound instance");
        unsafe {
            (self.api.stop)(self.instance);
            (self.api.destroy_message_buffer)(self.instance);
            (self.api.destroy)(self.instance);
        }
    }
}

fn set_global_env(api: &CsoundApi, name: &str, value: &str) {
    let (Ok(name_c), Ok(value_c)) = (CString::new(name), CString::new(value)) else {
        return;
    };
    unsafe { (api.set_global_env)(name_c.as_ptr(), value_c.as_ptr()) };
}
