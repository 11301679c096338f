//! Orchestra source handling: scanning and document state

pub mod document;
pub mod scanner;

pub use document::{CsdDocument, CsdFilesManifest};
pub use scanner::{
    parse_control_line, scan_audio_channels, scan_controls, ChannelController, ScanError,
};
