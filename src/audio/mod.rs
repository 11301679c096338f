//! Audio engine for real-time Csound performance
//!
//! Provides:
//! - the Csound binding, block adapter and performer (`csound`)
//! - cpal device selection and the output engine driving the performer
//! - live audio input capture feeding the orchestra's input buffer

pub mod buffer;
pub mod csound;
pub mod device;
pub mod engine;
pub mod input;
