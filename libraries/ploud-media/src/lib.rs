//! Media collaborators for the loudness engine
//!
//! - [`SymphoniaSource`] decodes one audio stream of a container file into
//!   planar f32 fragments, optionally keeping a subset of its channels.
//! - [`WavSink`] writes corrected planar audio as PCM or float WAV.
//!
//! Both plug into `ploud_loudness` through its `FragmentSource` and
//! `FragmentSink` traits.

#![deny(unsafe_code)]

pub mod decoder;
pub mod error;
pub mod writer;

pub use decoder::{reduce_layout, SymphoniaSource};
pub use error::{MediaError, Result};
pub use writer::WavSink;
