//! Background producers for glimpse.
//!
//! [`CaptureScheduler`] turns screen frames into memory observations;
//! [`AudioSession`] keeps the audio context slot current. Both run on a fixed
//! interval and treat every failed tick as "no observation".

pub mod audio;
pub mod periodic;
pub mod screen;
pub mod sources;

pub use audio::{AudioSession, AUDIO_OBSERVATION_PREFIX};
pub use periodic::{Producer, TickOutcome};
pub use screen::CaptureScheduler;
pub use sources::{FileFrameSource, PlainTextExtractor, SpoolAudioSource};
