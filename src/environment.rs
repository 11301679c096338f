//! Csound environment resolution
//!
//! All platform-conditional path logic lives here. The rest of the crate
//! consumes the resolved `CsoundEnvironment` struct and never branches on
//! the build target itself.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Resolved locations the Csound runtime needs before an instance is created
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsoundEnvironment {
    /// Path to the native Csound dynamic library
    pub csound_library: PathBuf,
    /// Directory holding Csound opcode plugins (OPCODE6DIR64)
    pub opcode_dir: Option<PathBuf>,
    /// Directory searched for sound files and samples (SFDIR/SSDIR/SADIR)
    pub sample_dir: Option<PathBuf>,
    /// Base directory the environment was resolved from
    pub base_dir: PathBuf,
}

impl CsoundEnvironment {
    /// Resolve an environment rooted at `base_dir`.
    ///
    /// The library file name and plugin directory layout differ per platform;
    /// sample files are expected next to the orchestra sources.
    pub fn resolve<P: AsRef<Path>>(base_dir: P) -> Self {
        let base_dir = base_dir.as_ref().to_path_buf();

        #[cfg(target_os = "windows")]
        let (library, opcode_dir) = (
            base_dir.join("csound64.dll"),
            Some(base_dir.join("CsoundPlugins")),
        );

        #[cfg(target_os = "macos")]
        let (library, opcode_dir) = {
            let framework = base_dir.join("CsoundLib64.framework");
            let opcodes = framework.join("Resources/Opcodes64");
            (
                framework.join("CsoundLib64"),
                opcodes.is_dir().then_some(opcodes),
            )
        };

        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        let (library, opcode_dir) = (
            base_dir.join("libcsound64.so"),
            Some(base_dir.join("CsoundPlugins")),
        );

        Self {
            csound_library: library,
            opcode_dir,
            sample_dir: Some(base_dir.clone()),
            base_dir,
        }
    }

    /// Global environment variables to hand to Csound before creating an
    /// instance. Sound-file search paths all point at the sample directory,
    /// mirroring how Csound front ends configure SFDIR/SSDIR/SADIR together.
    pub fn global_env_vars(&self) -> Vec<(&'static str, String)> {
        let mut vars = Vec::new();

        if let Some(dir) = &self.opcode_dir {
            vars.push(("OPCODE6DIR64", dir.to_string_lossy().into_owned()));
        }
        if let Some(dir) = &self.sample_dir {
            let dir = dir.to_string_lossy().into_owned();
            vars.push(("SFDIR", dir.clone()));
            vars.push(("SSDIR", dir.clone()));
            vars.push(("SADIR", dir));
        }

        vars
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_vars_cover_opcode_and_sample_dirs() {
        let env = CsoundEnvironment {
            csound_library: PathBuf::from("/opt/csound/libcsound64.so"),
            opcode_dir: Some(PathBuf::from("/opt/csound/plugins")),
            sample_dir: Some(PathBuf::from("/srv/samples")),
            base_dir: PathBuf::from("/opt/csound"),
        };

        let vars = env.global_env_vars();
        assert_eq!(vars.len(), 4);
        assert_eq!(vars[0], ("OPCODE6DIR64", "/opt/csound/plugins".to_string()));
        assert!(vars[1..]
            .iter()
            .all(|(_, v)| v == "/srv/samples"));
        let names: Vec<_> = vars.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, ["OPCODE6DIR64", "SFDIR", "SSDIR", "SADIR"]);
    }

    #[test]
    fn missing_dirs_produce_no_vars() {
        let env = CsoundEnvironment {
            csound_library: PathBuf::from("libcsound64.so"),
            opcode_dir: None,
            sample_dir: None,
            base_dir: PathBuf::from("."),
        };
        assert!(env.global_env_vars().is_empty());
    }

    #[test]
    fn resolve_keeps_base_dir() {
        let env = CsoundEnvironment::resolve("/tmp/project");
        assert_eq!(env.base_dir, PathBuf::from("/tmp/project"));
        assert_eq!(env.sample_dir, Some(PathBuf::from("/tmp/project")));
    }
}
