//! Csound engine binding: raw surface, owning bridge, block adapter,
//! and the performer that ties them together

pub mod adapter;
pub mod bridge;
pub mod csound_sys;
pub mod performer;

pub use adapter::{BlockAdapter, SpinSpout};
pub use bridge::CsoundBridge;
pub use csound_sys::{CsoundApi, Myflt};
pub use performer::CsoundPerformer;
