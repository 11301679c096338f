//! Real-time Csound hosting engine
//!
//! Loads the native Csound library at runtime, compiles a `.csd` orchestra,
//! and performs it inside a host audio callback: the block adapter reconciles
//! the host's block size against Csound's fixed `ksmps` frames, while the csd
//! scanner discovers the orchestra's UI controls and audio-rate channels so
//! they can be seeded and exposed before the first block renders.

pub mod audio;
pub mod csd;
pub mod environment;

pub use audio::csound::{BlockAdapter, CsoundPerformer, Myflt, SpinSpout};
pub use audio::device::AudioConfig;
pub use audio::engine::{AudioEngine, AudioEngineHandle};
pub use csd::{ChannelController, CsdDocument};
pub use environment::CsoundEnvironment;
