use std::ffi::OsString;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::engines::{run_program, Invocation};
use crate::error::{EngineError, Error};
use crate::request::{
    EngineCapabilities, Speaker, SpeakerChoice, Speakers, SynthesisRequest, TuningParam,
};
use crate::text::{TextSanitizer, DEFAULT_MAX_TEXT_LEN};
use crate::validate::normalize_language;
use crate::SynthesisEngine;

pub const ENGINE_NAME: &str = "xtts";

/// Only output rate of XTTS v2.
pub const SAMPLE_RATE: u32 = 24000;

pub const DEFAULT_MODEL: &str = "tts_models/multilingual/multi-dataset/xtts_v2";

/// Languages XTTS v2 ships with, used when the model is not probed.
pub const FALLBACK_LANGUAGES: [&str; 17] = [
    "pt", "en", "es", "fr", "de", "it", "ru", "tr", "pl", "nl", "sv", "fi", "uk", "ja", "ko",
    "zh-cn", "ar",
];

/// Studio speakers bundled with XTTS v2.
pub const FALLBACK_SPEAKERS: [&str; 58] = [
    "Claribel Dervla",
    "Daisy Studious",
    "Gracie Wise",
    "Tammie Ema",
    "Alison Dietlinde",
    "Ana Florence",
    "Annmarie Nele",
    "Asya Anara",
    "Brenda Stern",
    "Gitta Nikolina",
    "Henriette Usha",
    "Sofia Hellen",
    "Tammy Grit",
    "Tanja Adelina",
    "Vjollca Johnnie",
    "Andrew Chipper",
    "Badr Odhiambo",
    "Dionisio Schuyler",
    "Royston Min",
    "Viktor Eka",
    "Abrahan Mack",
    "Adde Michal",
    "Baldur Sanjin",
    "Craig Gutsy",
    "Damien Black",
    "Gilberto Mathias",
    "Ilkin Urbano",
    "Kazuhiko Atallah",
    "Ludvig Milivoj",
    "Suad Qasim",
    "Torcull Diarmuid",
    "Viktor Menelaos",
    "Zacharie Aimilios",
    "Nova Hogarth",
    "Maja Ruoho",
    "Uta Obando",
    "Lidiya Szekeres",
    "Chandra MacFarland",
    "Szofi Granger",
    "Camilla Holmström",
    "Lilya Stainthorpe",
    "Zofija Kendrick",
    "Narelle Moon",
    "Barbora MacLean",
    "Alexandra Hisakawa",
    "Alma María",
    "Rosemary Okafor",
    "Ige Behringer",
    "Filip Traverse",
    "Damjan Chapman",
    "Wulf Carlevaro",
    "Aaron Dreschner",
    "Kumar Dahl",
    "Eugenio Mataracı",
    "Ferran Simen",
    "Xavier Hayasaka",
    "Luis Moray",
    "Marcos Rudaski",
];

const BRIDGE: &str = include_str!("bridge.py");

/// XTTS settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct XttsConfig {
    /// Python interpreter with the Coqui `TTS` package installed.
    pub python: String,
    pub model_name: String,
    pub default_language: String,
    /// Used whenever no reference sample is given.
    pub default_speaker: String,
    pub languages: Vec<String>,
    /// Accepted speaker names.
    pub speakers: Vec<String>,
    /// Pass any speaker name through unchecked, for fine-tuned models whose
    /// speakers are not listed.
    pub accept_any_speaker: bool,
    pub max_text_len: usize,
    pub use_gpu: bool,
}

impl Default for XttsConfig {
    fn default() -> Self {
        Self {
            python: "python3".to_string(),
            model_name: DEFAULT_MODEL.to_string(),
            default_language: "pt".to_string(),
            default_speaker: "Ana Florence".to_string(),
            languages: FALLBACK_LANGUAGES.iter().map(|l| l.to_string()).collect(),
            speakers: FALLBACK_SPEAKERS.iter().map(|s| s.to_string()).collect(),
            accept_any_speaker: false,
            max_text_len: DEFAULT_MAX_TEXT_LEN,
            use_gpu: false,
        }
    }
}

/// Languages and speakers reported by the loaded model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelInventory {
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub speakers: Vec<String>,
}

/// Coqui XTTS v2 through a Python bridge process.
#[derive(Debug, Clone)]
pub struct XttsEngine {
    config: XttsConfig,
    sanitizer: TextSanitizer,
}

impl XttsEngine {
    pub fn new(config: XttsConfig) -> Self {
        let sanitizer = TextSanitizer::new(config.max_text_len);
        Self { config, sanitizer }
    }

    pub fn config(&self) -> &XttsConfig {
        &self.config
    }

    /// Load the model and ask it for its languages and speakers.
    pub fn probe(&self) -> Result<ModelInventory, EngineError> {
        let mut args = self.bridge_args("describe");
        if self.config.use_gpu {
            args.push("--gpu".into());
        }
        let output = run_program(&Invocation {
            program: &self.config.python,
            program_env: "XTTS_PYTHON",
            args,
            stdin: None,
        })?;
        parse_inventory(&output.stdout)
    }

    /// [`probe`](Self::probe), falling back to the configured lists.
    pub fn inventory(&self) -> ModelInventory {
        match self.probe() {
            Ok(inventory) => {
                let languages = if inventory.languages.is_empty() {
                    self.config.languages.clone()
                } else {
                    inventory.languages
                };
                ModelInventory {
                    languages,
                    speakers: inventory.speakers,
                }
            }
            Err(e) => {
                log::warn!("Could not query the XTTS model, using configured lists: {e}");
                ModelInventory {
                    languages: self.config.languages.clone(),
                    speakers: self.config.speakers.clone(),
                }
            }
        }
    }

    pub fn build_args(&self, request: &SynthesisRequest, wav_path: &Path) -> Vec<OsString> {
        let mut args = self.bridge_args("synthesize");
        args.push("--out".into());
        args.push(wav_path.into());

        if let Some(language) = &request.language {
            args.push("--language".into());
            args.push(language.into());
        }
        if let Some(wav) = &request.voice.speaker_wav {
            args.push("--speaker-wav".into());
            args.push(wav.into());
        } else if let Some(speaker) = &request.voice.speaker {
            let name = match speaker {
                Speaker::Named(name) => name.clone(),
                Speaker::Index(idx) => idx.to_string(),
            };
            args.push("--speaker".into());
            args.push(name.into());
        }
        if request.split_sentences {
            args.push("--split-sentences".into());
        }
        if let Some(speed) = request.tuning.speed {
            args.push("--speed".into());
            args.push(speed.to_string().into());
        }
        if let Some(temperature) = request.tuning.temperature {
            args.push("--temperature".into());
            args.push(temperature.to_string().into());
        }
        if self.config.use_gpu {
            args.push("--gpu".into());
        }
        args
    }

    fn bridge_args(&self, command: &str) -> Vec<OsString> {
        vec![
            "-c".into(),
            BRIDGE.into(),
            command.into(),
            "--model".into(),
            self.config.model_name.clone().into(),
        ]
    }
}

impl SynthesisEngine for XttsEngine {
    fn name(&self) -> &'static str {
        ENGINE_NAME
    }

    fn sanitizer(&self) -> &TextSanitizer {
        &self.sanitizer
    }

    fn capabilities(&self, voice: Option<&str>) -> Result<EngineCapabilities, Error> {
        if let Some(voice) = voice.filter(|v| *v != self.config.model_name) {
            log::debug!("XTTS ignores voice '{voice}'; using {}", self.config.model_name);
        }

        let mut languages: Vec<String> = self
            .config
            .languages
            .iter()
            .map(|l| normalize_language(l))
            .collect();
        languages.sort();
        languages.dedup();

        let speakers = if self.config.accept_any_speaker {
            Speakers::Any
        } else {
            Speakers::Listed(
                self.config
                    .speakers
                    .iter()
                    .map(SpeakerChoice::named)
                    .collect(),
            )
        };

        Ok(EngineCapabilities {
            engine: ENGINE_NAME,
            voice: self.config.model_name.clone(),
            model: None,
            sample_rates: vec![SAMPLE_RATE],
            default_sample_rate: SAMPLE_RATE,
            languages,
            default_language: Some(normalize_language(&self.config.default_language)),
            speakers,
            default_speaker: Some(SpeakerChoice::named(self.config.default_speaker.clone())),
            supports_speaker_wav: true,
            tuning: vec![TuningParam::Speed, TuningParam::Temperature],
            supports_split_sentences: true,
        })
    }

    fn synthesize_to_file(
        &self,
        request: &SynthesisRequest,
        wav_path: &Path,
    ) -> Result<(), EngineError> {
        log::info!(
            "Synthesizing {} characters with {} (language {:?})",
            request.text.len(),
            self.config.model_name,
            request.language
        );
        run_program(&Invocation {
            program: &self.config.python,
            program_env: "XTTS_PYTHON",
            args: self.build_args(request, wav_path),
            stdin: Some(request.text.as_str()),
        })?;
        Ok(())
    }
}

/// The bridge prints the inventory as the last JSON line; anything before it
/// is library chatter.
fn parse_inventory(stdout: &str) -> Result<ModelInventory, EngineError> {
    let line = stdout
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| l.starts_with('{'))
        .ok_or_else(|| EngineError::Describe("no JSON in bridge output".to_string()))?;
    let mut inventory: ModelInventory =
        serde_json::from_str(line).map_err(|e| EngineError::Describe(e.to_string()))?;
    inventory.languages = inventory
        .languages
        .iter()
        .map(|l| normalize_language(l))
        .collect();
    Ok(inventory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::SynthesisOptions;
    use crate::validate::validate;

    fn engine() -> XttsEngine {
        XttsEngine::new(XttsConfig::default())
    }

    fn args_of(request: &SynthesisRequest) -> Vec<String> {
        engine()
            .build_args(request, Path::new("outputs/output.wav"))
            .into_iter()
            .skip(3)
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn declares_the_xtts_capability_set() {
        let caps = engine().capabilities(None).unwrap();
        assert_eq!(caps.sample_rates, vec![24000]);
        assert_eq!(caps.languages.len(), 17);
        assert!(caps.languages.contains(&"zh-cn".to_string()));
        assert_eq!(caps.default_language.as_deref(), Some("pt"));
        assert!(matches!(&caps.speakers, Speakers::Listed(list) if list.len() == 58));
        assert!(caps.supports_speaker_wav);
    }

    #[test]
    fn unknown_speaker_is_rejected_before_running_python() {
        let caps = engine().capabilities(None).unwrap();
        let text = engine().sanitizer().sanitize("Olá").unwrap();
        let options = SynthesisOptions::builder().speaker("Nobody").build().unwrap();
        assert!(matches!(
            validate(text.clone(), &options, &caps),
            Err(crate::error::ValidationError::UnknownSpeaker { ref requested, .. })
                if requested == "Nobody"
        ));

        let options = SynthesisOptions::builder()
            .speaker("Claribel Dervla")
            .build()
            .unwrap();
        let request = validate(text.clone(), &options, &caps).unwrap();
        assert_eq!(
            request.voice.speaker,
            Some(Speaker::Named("Claribel Dervla".to_string()))
        );

        let open = XttsEngine::new(XttsConfig {
            accept_any_speaker: true,
            ..Default::default()
        });
        let caps = open.capabilities(None).unwrap();
        assert_eq!(caps.speakers, Speakers::Any);
        let options = SynthesisOptions::builder().speaker("Nobody").build().unwrap();
        assert!(validate(text, &options, &caps).is_ok());
    }

    #[test]
    fn default_speaker_is_passed_without_a_reference_sample() {
        let caps = engine().capabilities(None).unwrap();
        let text = engine().sanitizer().sanitize("Olá mundo").unwrap();
        let options = SynthesisOptions::builder()
            .split_sentences(true)
            .build()
            .unwrap();
        let request = validate(text, &options, &caps).unwrap();

        assert_eq!(
            args_of(&request),
            vec![
                "--model",
                DEFAULT_MODEL,
                "--out",
                "outputs/output.wav",
                "--language",
                "pt",
                "--speaker",
                "Ana Florence",
                "--split-sentences",
            ]
        );
    }

    #[test]
    fn reference_sample_is_passed_instead_of_a_speaker() {
        let dir = tempfile::tempdir().unwrap();
        let wav = dir.path().join("voz.wav");
        std::fs::write(&wav, b"RIFF").unwrap();

        let caps = engine().capabilities(None).unwrap();
        let text = engine().sanitizer().sanitize("Hello").unwrap();
        let options = SynthesisOptions::builder()
            .language("en")
            .speaker_wav(wav.clone())
            .tuning(crate::request::Tuning {
                speed: Some(1.2),
                temperature: Some(0.65),
                ..Default::default()
            })
            .build()
            .unwrap();
        let request = validate(text, &options, &caps).unwrap();

        let args = args_of(&request);
        assert!(args.contains(&"--speaker-wav".to_string()));
        assert!(args.contains(&wav.to_string_lossy().into_owned()));
        assert!(!args.contains(&"--speaker".to_string()));
        assert!(args.ends_with(&[
            "--speed".to_string(),
            "1.2".to_string(),
            "--temperature".to_string(),
            "0.65".to_string(),
        ]));
    }

    #[test]
    fn bridge_script_is_passed_inline() {
        let args = engine().bridge_args("describe");
        assert_eq!(args[0], "-c");
        assert!(args[1].to_string_lossy().contains("tts_to_file"));
        assert_eq!(args[2], "describe");
    }

    #[test]
    fn parses_the_last_json_line() {
        let stdout = "> Using model: xtts\n{\"languages\": [\"EN\", \"zh_cn\"], \"speakers\": [\"Ana Florence\"]}\n";
        let inventory = parse_inventory(stdout).unwrap();
        assert_eq!(inventory.languages, vec!["en", "zh-cn"]);
        assert_eq!(inventory.speakers, vec!["Ana Florence"]);

        assert!(matches!(
            parse_inventory("nothing here"),
            Err(EngineError::Describe(_))
        ));
    }

    #[test]
    fn inventory_falls_back_to_configured_lists() {
        let engine = XttsEngine::new(XttsConfig {
            python: "definitely-not-a-python".to_string(),
            speakers: vec!["Claribel Dervla".to_string()],
            ..Default::default()
        });
        let inventory = engine.inventory();
        assert_eq!(inventory.languages.len(), 17);
        assert_eq!(inventory.speakers, vec!["Claribel Dervla"]);
    }
}
