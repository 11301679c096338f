//! Loaded .csd source state
//!
//! A [`CsdDocument`] holds one orchestra source plus everything derived from
//! it by the scanner: control declarations and audio-rate channel names.
//! Derived state is always either fully populated from one file or fully
//! reset; a failed load never leaves a partial update behind.

use super::scanner::{scan_audio_channels, scan_controls, ChannelController};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One .csd source and the declarations scanned from it
#[derive(Debug, Clone, Default)]
pub struct CsdDocument {
    path: Option<PathBuf>,
    contents: String,
    controls: Vec<ChannelController>,
    audio_channel_names: Vec<String>,
}

impl CsdDocument {
    /// Load a csd file, scanning it for control and audio channel declarations
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path = path.as_ref();

        if path.extension().and_then(|e| e.to_str()) != Some("csd") {
            return Err(format!("not a .csd file: {}", path.display()));
        }
        if path.file_stem().map_or(true, |s| s.is_empty()) {
            return Err(format!("invalid csd file name: {}", path.display()));
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;

        let controls = scan_controls(&contents);
        let audio_channel_names = scan_audio_channels(&contents);
        log::info!(
            "Loaded {}: {} control(s), {} audio channel(s)",
            path.display(),
            controls.len(),
            audio_channel_names.len()
        );

        Ok(Self {
            path: Some(path.to_path_buf()),
            contents,
            controls,
            audio_channel_names,
        })
    }

    /// Replace this document's source file.
    ///
    /// On any failure the document is reset to its empty state rather than
    /// keeping a mix of old and new fields.
    pub fn set_file<P: AsRef<Path>>(&mut self, path: P) {
        match Self::load(path) {
            Ok(document) => *self = document,
            Err(e) => {
                log::warn!("{} - resetting fields", e);
                self.reset_fields();
            }
        }
    }

    fn reset_fields(&mut self) {
        self.path = None;
        self.contents.clear();
        self.controls.clear();
        self.audio_channel_names.clear();
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn contents(&self) -> &str {
        &self.contents
    }

    pub fn controls(&self) -> &[ChannelController] {
        &self.controls
    }

    pub fn audio_channel_names(&self) -> &[String] {
        &self.audio_channel_names
    }
}

/// Manifest listing the data files an orchestra needs staged alongside it.
///
/// Written as JSON next to the csd sources; used on platforms where loose
/// files must be pre-registered and copied in bulk before the engine starts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CsdFilesManifest {
    #[serde(rename = "fileNames")]
    pub file_names: Vec<String>,
}

impl CsdFilesManifest {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
        serde_json::from_str(&contents)
            .map_err(|e| format!("invalid manifest {}: {}", path.display(), e))
    }

    /// Data files only: csd/orc sources and manifest entries themselves are
    /// already staged through other paths
    pub fn data_files(&self) -> impl Iterator<Item = &str> {
        self.file_names
            .iter()
            .map(String::as_str)
            .filter(|name| {
                !name.ends_with(".json") && !name.ends_with(".csd") && !name.ends_with(".orc")
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("csound-host-{}-{}", std::process::id(), name));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    const CSD: &str = concat!(
        "form caption(\"Test\")\n",
        "slider1 channel(\"gain\") range(0,1,0.5)\n",
        "</Cabbage>\n",
        "instr 1\n",
        "chnset asig, \"outL\"\n",
        "endin\n",
    );

    #[test]
    fn load_populates_derived_state() {
        let path = temp_file("load.csd", CSD);
        let document = CsdDocument::load(&path).unwrap();
        assert_eq!(document.controls().len(), 2);
        assert_eq!(document.controls()[1].channel, "gain");
        assert_eq!(document.audio_channel_names(), ["outL"]);
        assert_eq!(document.path(), Some(path.as_path()));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn wrong_extension_is_rejected() {
        let path = temp_file("notes.txt", "hello");
        assert!(CsdDocument::load(&path).is_err());
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn set_file_failure_resets_all_fields() {
        let path = temp_file("reset.csd", CSD);
        let mut document = CsdDocument::load(&path).unwrap();
        assert!(!document.controls().is_empty());

        document.set_file("/nonexistent/never.csd");
        assert!(document.path().is_none());
        assert!(document.contents().is_empty());
        assert!(document.controls().is_empty());
        assert!(document.audio_channel_names().is_empty());
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn manifest_filters_data_files() {
        let manifest = CsdFilesManifest {
            file_names: vec![
                "kick.wav".to_string(),
                "synth.csd".to_string(),
                "csoundFiles.json".to_string(),
                "strings.orc".to_string(),
            ],
        };
        let data: Vec<_> = manifest.data_files().collect();
        assert_eq!(data, ["kick.wav"]);
    }

    #[test]
    fn manifest_parses_json() {
        let path = temp_file(
            "manifest.json",
            r#"{"fileNames":["kick.wav","loop.aif"]}"#,
        );
        let manifest = CsdFilesManifest::load(&path).unwrap();
        assert_eq!(manifest.file_names, ["kick.wav", "loop.aif"]);
        std::fs::remove_file(path).ok();
    }
}
