use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::engines::{run_program, Invocation};
use crate::error::{EngineError, Error, ValidationError};
use crate::request::{EngineCapabilities, Speaker, Speakers, SynthesisRequest, TuningParam};
use crate::text::{TextSanitizer, DEFAULT_MAX_TEXT_LEN};
use crate::{voice, SynthesisEngine};

use super::voices::VoiceMetadata;

pub const ENGINE_NAME: &str = "piper";

/// Piper settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PiperConfig {
    /// Directory searched for `<voice>.onnx` models.
    pub voice_dir: PathBuf,
    /// Piper executable.
    pub program: String,
    pub max_text_len: usize,
}

impl Default for PiperConfig {
    fn default() -> Self {
        Self {
            voice_dir: PathBuf::from("/voices"),
            program: "piper".to_string(),
            max_text_len: DEFAULT_MAX_TEXT_LEN,
        }
    }
}

/// Runs Piper voices through the `piper` executable.
///
/// Capabilities are per voice: the sample rate, language and speakers come
/// from the voice's `.onnx.json` config.
///
/// ```rust,no_run
/// use local_tts::engines::piper::{PiperConfig, PiperEngine};
/// use local_tts::request::SynthesisOptions;
/// use std::path::Path;
///
/// let engine = PiperEngine::new(PiperConfig::default());
/// let options = SynthesisOptions::builder().voice("pt_BR-faber-medium").build()?;
/// local_tts::synthesize_to_wav(&engine, "Olá, mundo!", &options, Path::new("out.wav"))?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct PiperEngine {
    config: PiperConfig,
    sanitizer: TextSanitizer,
}

impl PiperEngine {
    pub fn new(config: PiperConfig) -> Self {
        let sanitizer = TextSanitizer::new(config.max_text_len);
        Self { config, sanitizer }
    }

    pub fn config(&self) -> &PiperConfig {
        &self.config
    }

    /// Voices available in the configured directory.
    pub fn list_voices(&self) -> Vec<String> {
        voice::discover_voices(&self.config.voice_dir)
    }

    pub fn voice_metadata(&self, voice_name: &str) -> Result<VoiceMetadata, Error> {
        VoiceMetadata::load(voice_name, &self.config.voice_dir)
    }
}

impl SynthesisEngine for PiperEngine {
    fn name(&self) -> &'static str {
        ENGINE_NAME
    }

    fn sanitizer(&self) -> &TextSanitizer {
        &self.sanitizer
    }

    fn capabilities(&self, voice_name: Option<&str>) -> Result<EngineCapabilities, Error> {
        let voice_name = voice_name
            .filter(|v| !v.trim().is_empty())
            .ok_or(ValidationError::MissingVoice)?;
        let location = voice::resolve(voice_name, &self.config.voice_dir)?;
        let metadata = VoiceMetadata::from_config_file(voice_name, &location.config_path)?;
        Ok(capabilities_for(metadata, location))
    }

    fn synthesize_to_file(
        &self,
        request: &SynthesisRequest,
        wav_path: &Path,
    ) -> Result<(), EngineError> {
        let args = build_args(request, wav_path)?;
        log::info!(
            "Synthesizing {} characters with Piper voice '{}'",
            request.text.len(),
            request.voice.name
        );
        run_program(&Invocation {
            program: &self.config.program,
            program_env: "PIPER_BIN",
            args,
            stdin: Some(request.text.as_str()),
        })?;
        Ok(())
    }
}

fn capabilities_for(metadata: VoiceMetadata, location: voice::ModelLocation) -> EngineCapabilities {
    let languages = match &metadata.language {
        Some(code) => {
            let mut langs = vec![code.clone()];
            if let Some((family, _)) = code.split_once('-') {
                langs.push(family.to_string());
            }
            langs
        }
        None => Vec::new(),
    };

    let default_speaker = metadata.speakers.first().cloned();
    let speakers = if metadata.speakers.is_empty() {
        Speakers::None
    } else {
        Speakers::Listed(metadata.speakers)
    };

    EngineCapabilities {
        engine: ENGINE_NAME,
        voice: metadata.name,
        model: Some(location),
        sample_rates: vec![metadata.sample_rate],
        default_sample_rate: metadata.sample_rate,
        languages,
        default_language: metadata.language,
        speakers,
        default_speaker,
        supports_speaker_wav: false,
        tuning: vec![
            TuningParam::LengthScale,
            TuningParam::NoiseScale,
            TuningParam::NoiseW,
        ],
        supports_split_sentences: false,
    }
}

/// Command-line arguments for `piper`. The text itself goes to stdin.
pub fn build_args(request: &SynthesisRequest, wav_path: &Path) -> Result<Vec<OsString>, EngineError> {
    let model = request.voice.model.as_ref().ok_or_else(|| {
        EngineError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("No model resolved for voice '{}'", request.voice.name),
        ))
    })?;

    let mut args: Vec<OsString> = vec![
        "--model".into(),
        model.model_path.clone().into(),
        "--config".into(),
        model.config_path.clone().into(),
        "--output_file".into(),
        wav_path.into(),
    ];

    if let Some(speaker) = &request.voice.speaker {
        let id = match speaker {
            Speaker::Index(idx) => idx.to_string(),
            Speaker::Named(name) => name.clone(),
        };
        args.push("--speaker".into());
        args.push(id.into());
    }

    let tuning = &request.tuning;
    for (flag, value) in [
        ("--length_scale", tuning.length_scale),
        ("--noise_scale", tuning.noise_scale),
        ("--noise_w", tuning.noise_w),
    ] {
        if let Some(value) = value {
            args.push(flag.into());
            args.push(value.to_string().into());
        }
    }

    Ok(args)
}
