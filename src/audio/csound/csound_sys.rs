//! Raw Csound C API surface
//!
//! The Csound runtime is an external native library loaded at runtime; this
//! module resolves the fixed set of C entry points the host needs and keeps
//! the raw function pointers next to the `Library` that owns them. Nothing
//! here is reimplemented - the engine stays a black box behind this surface.

use libloading::Library;
use std::os::raw::{c_char, c_int, c_void};
use std::path::Path;

/// Csound's sample type on desktop builds (double precision)
pub type Myflt = f64;

/// Opaque pointer to a native Csound instance
pub type CsoundPtr = *mut c_void;

/// csoundInitialize flag: let the host keep its own signal handlers
pub const CSOUNDINIT_NO_SIGNAL_HANDLER: c_int = 1;

type InitializeFn = unsafe extern "C" fn(flags: c_int) -> c_int;
type CreateFn = unsafe extern "C" fn(host_data: *mut c_void) -> CsoundPtr;
type DestroyFn = unsafe extern "C" fn(csound: CsoundPtr);
type SetGlobalEnvFn = unsafe extern "C" fn(name: *const c_char, value: *const c_char) -> c_int;
type SetHostAudioIoFn = unsafe extern "C" fn(csound: CsoundPtr, state: c_int, buf_size: c_int);
type MessageBufferFn = unsafe extern "C" fn(csound: CsoundPtr, to_stdout: c_int);
type InstanceFn = unsafe extern "C" fn(csound: CsoundPtr);
type CompileFn =
    unsafe extern "C" fn(csound: CsoundPtr, argc: c_int, argv: *const *const c_char) -> c_int;
type PerformKsmpsFn = unsafe extern "C" fn(csound: CsoundPtr) -> c_int;
type GetKsmpsFn = unsafe extern "C" fn(csound: CsoundPtr) -> u32;
type GetMyfltFn = unsafe extern "C" fn(csound: CsoundPtr) -> Myflt;
type GetSpoutSampleFn =
    unsafe extern "C" fn(csound: CsoundPtr, frame: c_int, channel: c_int) -> Myflt;
type AddSpinSampleFn =
    unsafe extern "C" fn(csound: CsoundPtr, frame: c_int, channel: c_int, sample: Myflt);
type InputMessageFn = unsafe extern "C" fn(csound: CsoundPtr, message: *const c_char);
type SetControlChannelFn =
    unsafe extern "C" fn(csound: CsoundPtr, name: *const c_char, value: Myflt);
type GetControlChannelFn =
    unsafe extern "C" fn(csound: CsoundPtr, name: *const c_char, err: *mut c_int) -> Myflt;
type SetStringChannelFn =
    unsafe extern "C" fn(csound: CsoundPtr, name: *const c_char, value: *const c_char);
type GetStringChannelFn =
    unsafe extern "C" fn(csound: CsoundPtr, name: *const c_char, value: *mut c_char);
type GetAudioChannelFn =
    unsafe extern "C" fn(csound: CsoundPtr, name: *const c_char, samples: *mut Myflt);
type TableGetFn = unsafe extern "C" fn(csound: CsoundPtr, table: c_int, index: c_int) -> Myflt;
type GetMessageCntFn = unsafe extern "C" fn(csound: CsoundPtr) -> c_int;
type GetFirstMessageFn = unsafe extern "C" fn(csound: CsoundPtr) -> *const c_char;

/// Resolved Csound entry points.
///
/// The function pointers are copied out of the library once at load time;
/// `_library` keeps the underlying shared object mapped for as long as this
/// struct lives, so the pointers stay valid.
pub struct CsoundApi {
    pub initialize: InitializeFn,
    pub create: CreateFn,
    pub destroy: DestroyFn,
    pub set_global_env: SetGlobalEnvFn,
    pub set_host_implemented_audio_io: SetHostAudioIoFn,
    pub create_message_buffer: MessageBufferFn,
    pub destroy_message_buffer: InstanceFn,
    pub compile: CompileFn,
    pub stop: InstanceFn,
    pub perform_ksmps: PerformKsmpsFn,
    pub get_ksmps: GetKsmpsFn,
    pub get_kr: GetMyfltFn,
    pub get_0dbfs: GetMyfltFn,
    pub get_spout_sample: GetSpoutSampleFn,
    pub add_spin_sample: AddSpinSampleFn,
    pub clear_spin: InstanceFn,
    pub input_message: InputMessageFn,
    pub set_control_channel: SetControlChannelFn,
    pub get_control_channel: GetControlChannelFn,
    pub set_string_channel: SetStringChannelFn,
    pub get_string_channel: GetStringChannelFn,
    pub get_audio_channel: GetAudioChannelFn,
    pub table_get: TableGetFn,
    pub get_message_cnt: GetMessageCntFn,
    pub get_first_message: GetFirstMessageFn,
    pub pop_first_message: InstanceFn,
    _library: Library,
}

macro_rules! resolve {
    ($library:expr, $symbol:literal) => {
        unsafe {
            *$library.get($symbol).map_err(|e| {
                format!(
                    "missing Csound symbol {}: {}",
                    String::from_utf8_lossy(&$symbol[..$symbol.len() - 1]),
                    e
                )
            })?
        }
    };
}

impl CsoundApi {
    /// Load the Csound dynamic library and resolve every entry point
    pub fn load(library_path: &Path) -> Result<Self, String> {
        log::info!("Loading Csound library from: {}", library_path.display());

        let library = unsafe {
            Library::new(library_path)
                .map_err(|e| format!("failed to load {}: {}", library_path.display(), e))?
        };

        // Resolve into locals first: the symbol borrows must end before the
        // library moves into the returned struct
        let initialize: InitializeFn = resolve!(library, b"csoundInitialize\0");
        let create: CreateFn = resolve!(library, b"csoundCreate\0");
        let destroy: DestroyFn = resolve!(library, b"csoundDestroy\0");
        let set_global_env: SetGlobalEnvFn = resolve!(library, b"csoundSetGlobalEnv\0");
        let set_host_implemented_audio_io: SetHostAudioIoFn =
            resolve!(library, b"csoundSetHostImplementedAudioIO\0");
        let create_message_buffer: MessageBufferFn =
            resolve!(library, b"csoundCreateMessageBuffer\0");
        let destroy_message_buffer: InstanceFn =
            resolve!(library, b"csoundDestroyMessageBuffer\0");
        let compile: CompileFn = resolve!(library, b"csoundCompile\0");
        let stop: InstanceFn = resolve!(library, b"csoundStop\0");
        let perform_ksmps: PerformKsmpsFn = resolve!(library, b"csoundPerformKsmps\0");
        let get_ksmps: GetKsmpsFn = resolve!(library, b"csoundGetKsmps\0");
        let get_kr: GetMyfltFn = resolve!(library, b"csoundGetKr\0");
        let get_0dbfs: GetMyfltFn = resolve!(library, b"csoundGet0dBFS\0");
        let get_spout_sample: GetSpoutSampleFn = resolve!(library, b"csoundGetSpoutSample\0");
        let add_spin_sample: AddSpinSampleFn = resolve!(library, b"csoundAddSpinSample\0");
        let clear_spin: InstanceFn = resolve!(library, b"csoundClearSpin\0");
        let input_message: InputMessageFn = resolve!(library, b"csoundInputMessage\0");
        let set_control_channel: SetControlChannelFn =
            resolve!(library, b"csoundSetControlChannel\0");
        let get_control_channel: GetControlChannelFn =
            resolve!(library, b"csoundGetControlChannel\0");
        let set_string_channel: SetStringChannelFn =
            resolve!(library, b"csoundSetStringChannel\0");
        let get_string_channel: GetStringChannelFn =
            resolve!(library, b"csoundGetStringChannel\0");
        let get_audio_channel: GetAudioChannelFn =
            resolve!(library, b"csoundGetAudioChannel\0");
        let table_get: TableGetFn = resolve!(library, b"csoundTableGet\0");
        let get_message_cnt: GetMessageCntFn = resolve!(library, b"csoundGetMessageCnt\0");
        let get_first_message: GetFirstMessageFn =
            resolve!(library, b"csoundGetFirstMessage\0");
        let pop_first_message: InstanceFn = resolve!(library, b"csoundPopFirstMessage\0");

        Ok(Self {
            initialize,
            create,
            destroy,
            set_global_env,
            set_host_implemented_audio_io,
            create_message_buffer,
            destroy_message_buffer,
            compile,
            stop,
            perform_ksmps,
            get_ksmps,
            get_kr,
            get_0dbfs,
            get_spout_sample,
            add_spin_sample,
            clear_spin,
            input_message,
            set_control_channel,
            get_control_channel,
            set_string_channel,
            get_string_channel,
            get_audio_channel,
            table_get,
            get_message_cnt,
            get_first_message,
            pop_first_message,
            _library: library,
        })
    }
}
