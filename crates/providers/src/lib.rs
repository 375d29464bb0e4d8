//! Generation, OCR and transcription backends for glimpse.
//!
//! Everything here implements a trait from `glimpse_core`. The builder
//! functions select and configure backends from `AppConfig`.

pub mod builder;
pub mod disabled;
pub mod ocr;
pub mod openai_compat;
pub mod transcribe;

pub use builder::{
    build_extractor, build_generator, build_transcriber, default_base_url, is_local_provider,
};
pub use disabled::DisabledGenerator;
pub use ocr::VisionTextExtractor;
pub use openai_compat::OpenAiCompatGenerator;
pub use transcribe::OpenAiTranscriber;
