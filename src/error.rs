use std::fmt::Display;
use std::path::PathBuf;

use crate::request::SynthesisOptionsBuilderError;

/// Rejected user input. Every variant names the offending field so callers
/// can show a precise message; none of them is retried or corrected.
#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("The text is empty after sanitization. Provide some text to synthesize.")]
    EmptyText,
    #[error(
        "The text has {length} characters, above the limit of {max}. \
         Split the content into smaller parts."
    )]
    TextTooLong { length: usize, max: usize },
    #[error("No voice selected. Pass a voice name.")]
    MissingVoice,
    #[error("Voice directory '{}' not found. Set PIPER_VOICE_DIR to the directory holding the voices.", .0.display())]
    VoiceDirNotFound(PathBuf),
    #[error("Voice '{name}' not found in '{}'. Ensure the .onnx model is available.", .dir.display())]
    VoiceNotFound { name: String, dir: PathBuf },
    #[error("Configuration file '{}' not found for voice '{name}'.", .path.display())]
    ConfigNotFound { name: String, path: PathBuf },
    #[error("Sample rate {requested} Hz is not supported. Use {} Hz.", join(.supported))]
    UnsupportedSampleRate { requested: u32, supported: Vec<u32> },
    #[error("Language '{requested}' is not supported. Available languages: {}", join(.supported))]
    UnsupportedLanguage {
        requested: String,
        supported: Vec<String>,
    },
    #[error("Speaker '{requested}' not found. Available speakers: {}", join(.available))]
    UnknownSpeaker {
        requested: String,
        available: Vec<String>,
    },
    #[error("Voice '{voice}' has a single speaker; '{requested}' cannot be selected.")]
    SpeakerNotSupported { voice: String, requested: String },
    #[error("The {engine} engine does not accept a reference voice sample.")]
    SpeakerSampleUnsupported { engine: &'static str },
    #[error("Reference voice sample not found: {}", .0.display())]
    SpeakerSampleNotFound(PathBuf),
    #[error("The {engine} engine does not support the '{parameter}' option.")]
    UnsupportedParameter {
        engine: &'static str,
        parameter: &'static str,
    },
    #[error("Invalid value {value} for '{parameter}': {reason}.")]
    InvalidParameter {
        parameter: &'static str,
        value: f32,
        reason: &'static str,
    },
}

/// Failures of the external engine process. The engine's own output is kept
/// verbatim.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("'{program}' not found. Install it or point {env} at the executable.")]
    ProgramNotFound { program: String, env: &'static str },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{program} exited with code {code:?}: {output}")]
    Failed {
        program: String,
        code: Option<i32>,
        output: String,
    },
    #[error("Synthesis finished but the output file '{}' was not created.", .0.display())]
    MissingOutput(PathBuf),
    #[error("Failed to read the generated audio: {0}")]
    Wav(#[from] hound::Error),
    #[error("Failed to parse the model description: {0}")]
    Describe(String),
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("Could not read the text file '{}': {source}", .path.display())]
    ReadText {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid voice configuration '{}': {reason}", .path.display())]
    VoiceConfig { path: PathBuf, reason: String },
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Invalid synthesis options: {0}")]
    Options(#[from] SynthesisOptionsBuilderError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

fn join<T: Display>(items: &[T]) -> String {
    if items.is_empty() {
        return "none".to_string();
    }
    items
        .iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_rate_message_lists_supported_rates() {
        let err = ValidationError::UnsupportedSampleRate {
            requested: 16000,
            supported: vec![24000],
        };
        assert_eq!(
            err.to_string(),
            "Sample rate 16000 Hz is not supported. Use 24000 Hz."
        );
    }

    #[test]
    fn validation_errors_surface_verbatim_through_the_crate_error() {
        let err: Error = ValidationError::EmptyText.into();
        assert_eq!(err.to_string(), ValidationError::EmptyText.to_string());
    }

    #[test]
    fn empty_choice_lists_read_as_none() {
        let err = ValidationError::UnknownSpeaker {
            requested: "bob".to_string(),
            available: vec![],
        };
        assert!(err.to_string().ends_with("Available speakers: none"));
    }
}
