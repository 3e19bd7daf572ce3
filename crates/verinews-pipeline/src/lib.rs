//! Verification pipeline: orchestrator, selection controller, preferences.

mod error;
#[cfg(test)]
mod fake;
pub mod orchestrator;
pub mod prefs;
pub mod selection;

pub use error::PipelineError;
pub use orchestrator::{AnalysisOutcome, DEFAULT_MAX_INPUT_CHARS, Orchestrator, PipelineConfig};
pub use prefs::{JsonFilePreferences, MemoryPreferences, PreferenceStore, PrefsError, Theme};
pub use selection::{DisplayState, SelectionController, VerifyHandle};
