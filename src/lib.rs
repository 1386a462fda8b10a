//! # local-tts
//!
//! A local text-to-speech front end for the Piper and Coqui XTTS engines.
//!
//! ## Features
//!
//! - **Text sanitation**: HTML, emoji and control characters are stripped
//!   before text reaches an engine
//! - **Voice resolution**: Piper voices are found by name in a voices
//!   directory, together with their JSON config
//! - **Validation**: sample rate, language, speaker and tuning values are
//!   checked against what the engine or voice declares, with a friendly
//!   message for every rejection
//! - **CLI and web form**: the `local-tts` binary, and an axum form behind
//!   the default `web` feature
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use local_tts::engines::piper::{PiperConfig, PiperEngine};
//! use local_tts::request::SynthesisOptions;
//!
//! let engine = PiperEngine::new(PiperConfig::default());
//! let options = SynthesisOptions::builder()
//!     .voice("pt_BR-faber-medium")
//!     .build()?;
//!
//! let output = local_tts::synthesize_to_wav(&engine, "Olá, mundo!", &options, Path::new("output/tts.wav"))?;
//! println!("{:.2}s of audio", output.duration_secs);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod engines;
pub mod error;
pub mod request;
pub mod text;
pub mod validate;
pub mod voice;
#[cfg(feature = "web")]
pub mod web;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

pub use error::{EngineError, Error, Result, ValidationError};

use request::{EngineCapabilities, SynthesisOptions, SynthesisRequest};
use text::TextSanitizer;

/// A WAV file produced by [`synthesize_to_wav`].
#[derive(Debug, Clone)]
pub struct SynthesisOutput {
    pub path: PathBuf,
    /// Sample rate read back from the WAV header.
    pub sample_rate: u32,
    pub duration_secs: f64,
    /// Wall time spent in the engine.
    pub elapsed: Duration,
}

/// Common interface for the external synthesis engines.
///
/// Engines do not sanitize or validate on their own: [`synthesize_to_wav`]
/// runs the sanitizer and the validator against [`capabilities`] before
/// calling [`synthesize_to_file`].
///
/// [`capabilities`]: SynthesisEngine::capabilities
/// [`synthesize_to_file`]: SynthesisEngine::synthesize_to_file
pub trait SynthesisEngine {
    fn name(&self) -> &'static str;

    /// Sanitizer configured with this engine's length limit.
    fn sanitizer(&self) -> &TextSanitizer;

    /// What the engine accepts, for `voice` when the engine has several.
    /// Resolving the voice happens here.
    fn capabilities(&self, voice: Option<&str>) -> Result<EngineCapabilities>;

    /// Render a validated request into `wav_path`.
    fn synthesize_to_file(
        &self,
        request: &SynthesisRequest,
        wav_path: &Path,
    ) -> std::result::Result<(), EngineError>;
}

/// Sanitize, validate and synthesize `raw_text` into `output`.
pub fn synthesize_to_wav(
    engine: &dyn SynthesisEngine,
    raw_text: &str,
    options: &SynthesisOptions,
    output: &Path,
) -> Result<SynthesisOutput> {
    let text = engine.sanitizer().sanitize(raw_text)?;
    let capabilities = engine.capabilities(options.voice.as_deref())?;
    let request = validate::validate(text, options, &capabilities)?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    log::debug!(
        "{} request: voice={} sample_rate={} language={:?}",
        engine.name(),
        request.voice.name,
        request.sample_rate,
        request.language
    );

    let started = Instant::now();
    engine.synthesize_to_file(&request, output)?;
    let elapsed = started.elapsed();

    if !output.is_file() {
        return Err(EngineError::MissingOutput(output.to_path_buf()).into());
    }

    let reader = hound::WavReader::open(output).map_err(EngineError::from)?;
    let sample_rate = reader.spec().sample_rate;
    let duration_secs = if sample_rate == 0 {
        0.0
    } else {
        reader.duration() as f64 / sample_rate as f64
    };

    log::info!(
        "Wrote {} ({:.2}s of audio in {:.2?})",
        output.display(),
        duration_secs,
        elapsed
    );

    Ok(SynthesisOutput {
        path: output.to_path_buf(),
        sample_rate,
        duration_secs,
        elapsed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{Speakers, TuningParam};
    use std::cell::RefCell;

    /// Writes half a second of silence, or nothing at all.
    struct FakeEngine {
        sanitizer: TextSanitizer,
        write_output: bool,
        seen: RefCell<Vec<String>>,
    }

    impl FakeEngine {
        fn new(write_output: bool) -> Self {
            Self {
                sanitizer: TextSanitizer::default(),
                write_output,
                seen: RefCell::new(Vec::new()),
            }
        }
    }

    impl SynthesisEngine for FakeEngine {
        fn name(&self) -> &'static str {
            "fake"
        }

        fn sanitizer(&self) -> &TextSanitizer {
            &self.sanitizer
        }

        fn capabilities(&self, _voice: Option<&str>) -> Result<EngineCapabilities> {
            Ok(EngineCapabilities {
                engine: "fake",
                voice: "fake".to_string(),
                model: None,
                sample_rates: vec![16000],
                default_sample_rate: 16000,
                languages: Vec::new(),
                default_language: None,
                speakers: Speakers::None,
                default_speaker: None,
                supports_speaker_wav: false,
                tuning: vec![TuningParam::Speed],
                supports_split_sentences: false,
            })
        }

        fn synthesize_to_file(
            &self,
            request: &SynthesisRequest,
            wav_path: &Path,
        ) -> std::result::Result<(), EngineError> {
            self.seen.borrow_mut().push(request.text.to_string());
            if !self.write_output {
                return Ok(());
            }
            let spec = hound::WavSpec {
                channels: 1,
                sample_rate: request.sample_rate,
                bits_per_sample: 16,
                sample_format: hound::SampleFormat::Int,
            };
            let mut writer = hound::WavWriter::create(wav_path, spec)?;
            for _ in 0..request.sample_rate / 2 {
                writer.write_sample(0i16)?;
            }
            writer.finalize()?;
            Ok(())
        }
    }

    #[test]
    fn pipeline_sanitizes_and_reads_back_the_wav() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("nested/out.wav");
        let engine = FakeEngine::new(true);

        let result = synthesize_to_wav(
            &engine,
            "Olá 😀 <b>mundo</b>!!!",
            &SynthesisOptions::default(),
            &output,
        )
        .unwrap();

        assert_eq!(*engine.seen.borrow(), vec!["Olá mundo!!!".to_string()]);
        assert_eq!(result.path, output);
        assert_eq!(result.sample_rate, 16000);
        assert!((result.duration_secs - 0.5).abs() < 1e-9);
    }

    #[test]
    fn missing_output_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.wav");

        let err = synthesize_to_wav(
            &FakeEngine::new(false),
            "Olá",
            &SynthesisOptions::default(),
            &output,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Engine(EngineError::MissingOutput(ref path)) if *path == output
        ));
    }

    #[test]
    fn rejected_input_never_reaches_the_engine() {
        let dir = tempfile::tempdir().unwrap();
        let engine = FakeEngine::new(true);

        let err = synthesize_to_wav(
            &engine,
            "😀😀",
            &SynthesisOptions::default(),
            &dir.path().join("out.wav"),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Validation(ValidationError::EmptyText)));

        let options = SynthesisOptions::builder().sample_rate(22050).build().unwrap();
        let err = synthesize_to_wav(&engine, "Olá", &options, &dir.path().join("out.wav"))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::UnsupportedSampleRate { requested: 22050, .. })
        ));
        assert!(engine.seen.borrow().is_empty());
    }
}
