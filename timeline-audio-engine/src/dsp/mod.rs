//! DSP primitives used to build sidechain envelopes and offline mixdown.

pub mod compressor;
pub mod envelope;
pub mod rms;
pub mod wsola;

pub use compressor::compress;
pub use envelope::Envelope;
pub use rms::rms_envelope;
pub use wsola::time_stretch_stereo;
