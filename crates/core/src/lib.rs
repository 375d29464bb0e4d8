//! # glimpse core
//!
//! Domain types, collaborator traits, and error definitions for the glimpse
//! context companion. This crate has **zero framework dependencies**: it
//! defines the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (generation, OCR, transcription, capture) is a
//! trait here. Implementations live in their respective crates, so the memory
//! lifecycle and the chat dispatcher can be driven by scripted mocks in tests.

pub mod audio;
pub mod error;
pub mod event;
pub mod generation;
pub mod memory;
pub mod message;
pub mod sensing;

// Re-export key types at crate root for ergonomics
pub use audio::AudioContextSlot;
pub use error::{CaptureError, ChatError, Error, GenerationError, Result};
pub use event::{DomainEvent, EventBus};
pub use generation::{ContextBundle, SnapshotReceiver, TextGenerator, TextSnapshot};
pub use memory::{MemoryEntry, MAX_IMPORTANCE, MIN_IMPORTANCE};
pub use message::{Message, Role};
pub use sensing::{AudioSource, FrameSource, MediaPayload, TextExtractor, Transcriber};
