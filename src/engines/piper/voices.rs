use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;

use crate::error::Error;
use crate::request::SpeakerChoice;
use crate::validate::normalize_language;
use crate::voice;

/// Sample rate Piper assumes when a voice config does not declare one.
pub const DEFAULT_SAMPLE_RATE: u32 = 22050;

/// Multipliers applied to a voice's default value to build its suggested
/// choices.
const VARIATION_FACTORS: [f64; 5] = [0.75, 0.9, 1.0, 1.1, 1.25];

/// Upper bound on generated `Speaker N` labels.
const MAX_SPEAKERS: u32 = 1024;

/// Numeric inference parameters read from a voice config.
pub const NUMERIC_PARAMETERS: [&str; 3] = ["length_scale", "noise_scale", "noise_w"];

/// Suggested values for a numeric inference parameter, keyed by display
/// label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericChoices {
    pub values: Vec<(String, f64)>,
    pub default_label: String,
}

impl NumericChoices {
    pub fn get(&self, label: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| *v)
    }
}

/// What a Piper voice offers, read from its `.onnx.json` config.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoiceMetadata {
    pub name: String,
    pub sample_rate: u32,
    /// Normalized language code, e.g. `pt-br`.
    pub language: Option<String>,
    /// Ordered by speaker id.
    pub speakers: Vec<SpeakerChoice>,
    pub default_speaker: Option<String>,
    pub numeric_parameters: BTreeMap<String, NumericChoices>,
}

impl VoiceMetadata {
    /// Resolve `voice_name` under `voice_dir` and read its config.
    pub fn load(voice_name: &str, voice_dir: &Path) -> Result<Self, Error> {
        let location = voice::resolve(voice_name, voice_dir)?;
        Self::from_config_file(voice_name, &location.config_path)
    }

    pub fn from_config_file(voice_name: &str, config_path: &Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(config_path)?;
        let json: Value = serde_json::from_str(&content).map_err(|e| Error::VoiceConfig {
            path: config_path.to_path_buf(),
            reason: format!("Failed to parse JSON: {e}"),
        })?;
        Ok(Self::from_config(voice_name, &json))
    }

    /// Build metadata from a parsed config. Missing or mistyped fields fall
    /// back to single-speaker defaults.
    pub fn from_config(voice_name: &str, config: &Value) -> Self {
        let speakers = extract_speakers(config);
        let default_speaker = speakers.first().map(|s| s.label.clone());

        let numeric_parameters = NUMERIC_PARAMETERS
            .iter()
            .filter_map(|&name| {
                extract_numeric_choices(config, name).map(|c| (name.to_string(), c))
            })
            .collect();

        Self {
            name: voice_name.to_string(),
            sample_rate: extract_sample_rate(config),
            language: extract_language(config),
            speakers,
            default_speaker,
            numeric_parameters,
        }
    }
}

fn extract_sample_rate(config: &Value) -> u32 {
    config
        .pointer("/audio/sample_rate")
        .and_then(Value::as_u64)
        .and_then(|rate| u32::try_from(rate).ok())
        .filter(|&rate| rate > 0)
        .unwrap_or(DEFAULT_SAMPLE_RATE)
}

fn extract_language(config: &Value) -> Option<String> {
    config
        .pointer("/language/code")
        .or_else(|| config.pointer("/espeak/voice"))
        .and_then(Value::as_str)
        .filter(|code| !code.trim().is_empty())
        .map(normalize_language)
}

fn extract_speakers(config: &Value) -> Vec<SpeakerChoice> {
    if let Some(map) = config.get("speaker_id_map").and_then(Value::as_object) {
        let mut speakers: Vec<SpeakerChoice> = map
            .iter()
            .filter_map(|(name, id)| {
                let id = u32::try_from(id.as_u64()?).ok()?;
                Some(SpeakerChoice::indexed(name.clone(), id))
            })
            .collect();
        if !speakers.is_empty() {
            speakers.sort_by_key(|s| s.id);
            return speakers;
        }
    }

    match config.get("num_speakers").and_then(Value::as_u64) {
        Some(count) if count > 1 => {
            if count > u64::from(MAX_SPEAKERS) {
                log::warn!(
                    "num_speakers {count} exceeds {MAX_SPEAKERS}; listing the first {MAX_SPEAKERS}"
                );
            }
            let count = u32::try_from(count.min(u64::from(MAX_SPEAKERS))).unwrap_or(MAX_SPEAKERS);
            (0..count)
                .map(|idx| SpeakerChoice::indexed(format!("Speaker {idx}"), idx))
                .collect()
        }
        _ => Vec::new(),
    }
}

fn extract_numeric_choices(config: &Value, parameter: &str) -> Option<NumericChoices> {
    let default = config.get("inference")?.get(parameter)?.as_f64()?;

    let mut rounded: Vec<f64> = VARIATION_FACTORS
        .iter()
        .map(|factor| round5((default * factor).max(0.0)))
        .collect();
    rounded.sort_by(|a, b| a.total_cmp(b));
    rounded.dedup();

    let mut values: Vec<(String, f64)> = Vec::with_capacity(rounded.len());
    for value in rounded {
        let label = format_float(value);
        if values.iter().all(|(l, _)| *l != label) {
            let parsed = label.parse().unwrap_or(value);
            values.push((label, parsed));
        }
    }

    let default_label = format_float(default);
    if values.iter().all(|(l, _)| *l != default_label) {
        values.push((default_label.clone(), default));
    }

    Some(NumericChoices {
        values,
        default_label,
    })
}

fn round5(value: f64) -> f64 {
    (value * 100_000.0).round() / 100_000.0
}

/// Up to three decimals without trailing zeros: `1.0` -> `"1"`,
/// `0.5003` -> `"0.5"`.
pub fn format_float(value: f64) -> String {
    let formatted = format!("{value:.3}");
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "" | "-0" => "0".to_string(),
        other => other.to_string(),
    }
}
