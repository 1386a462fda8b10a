//! Request types shared by the CLI, the web form and the engines.

use std::fmt;
use std::path::PathBuf;

use derive_builder::Builder;
use serde::Serialize;

use crate::text::SanitizedText;
use crate::voice::ModelLocation;

/// A selected speaker, either by name or by numeric id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Speaker {
    Named(String),
    Index(u32),
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Speaker::Named(name) => f.write_str(name),
            Speaker::Index(idx) => write!(f, "{idx}"),
        }
    }
}

/// The voice a request is rendered with.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceSpec {
    pub name: String,
    /// Model files, for engines that load voices from disk.
    pub model: Option<ModelLocation>,
    /// Reference sample for voice cloning. When set, `speaker` is `None`.
    pub speaker_wav: Option<PathBuf>,
    pub speaker: Option<Speaker>,
}

/// Engine-specific tuning values. `None` leaves the engine default in place.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Tuning {
    pub length_scale: Option<f32>,
    pub noise_scale: Option<f32>,
    pub noise_w: Option<f32>,
    pub speed: Option<f32>,
    pub temperature: Option<f32>,
}

/// Tuning parameters an engine may declare support for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TuningParam {
    LengthScale,
    NoiseScale,
    NoiseW,
    Speed,
    Temperature,
}

impl TuningParam {
    pub fn as_str(&self) -> &'static str {
        match self {
            TuningParam::LengthScale => "length_scale",
            TuningParam::NoiseScale => "noise_scale",
            TuningParam::NoiseW => "noise_w",
            TuningParam::Speed => "speed",
            TuningParam::Temperature => "temperature",
        }
    }
}

impl Tuning {
    /// Set values paired with their parameter.
    pub fn values(&self) -> Vec<(TuningParam, f32)> {
        [
            (TuningParam::LengthScale, self.length_scale),
            (TuningParam::NoiseScale, self.noise_scale),
            (TuningParam::NoiseW, self.noise_w),
            (TuningParam::Speed, self.speed),
            (TuningParam::Temperature, self.temperature),
        ]
        .into_iter()
        .filter_map(|(param, value)| value.map(|v| (param, v)))
        .collect()
    }
}

/// Caller-supplied options, before validation.
#[derive(Debug, Clone, Default, Builder)]
#[builder(default)]
pub struct SynthesisOptions {
    #[builder(setter(into, strip_option))]
    pub voice: Option<String>,
    #[builder(setter(into, strip_option))]
    pub language: Option<String>,
    #[builder(setter(into, strip_option))]
    pub speaker: Option<String>,
    #[builder(setter(into, strip_option))]
    pub speaker_wav: Option<PathBuf>,
    #[builder(setter(strip_option))]
    pub sample_rate: Option<u32>,
    pub tuning: Tuning,
    pub split_sentences: bool,
}

impl SynthesisOptions {
    pub fn builder() -> SynthesisOptionsBuilder {
        SynthesisOptionsBuilder::default()
    }
}

/// A fully validated request, ready to hand to an engine.
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    pub text: SanitizedText,
    pub voice: VoiceSpec,
    pub sample_rate: u32,
    pub language: Option<String>,
    pub tuning: Tuning,
    pub split_sentences: bool,
}

/// One selectable speaker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeakerChoice {
    pub label: String,
    /// Numeric id passed to engines that select speakers by index.
    pub id: Option<u32>,
}

impl SpeakerChoice {
    pub fn named(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            id: None,
        }
    }

    pub fn indexed(label: impl Into<String>, id: u32) -> Self {
        Self {
            label: label.into(),
            id: Some(id),
        }
    }

    pub fn to_speaker(&self) -> Speaker {
        match self.id {
            Some(id) => Speaker::Index(id),
            None => Speaker::Named(self.label.clone()),
        }
    }
}

/// How an engine constrains speaker selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "choices", rename_all = "snake_case")]
pub enum Speakers {
    /// Single-speaker voice; nothing can be selected.
    None,
    /// Any name is passed through as-is.
    Any,
    Listed(Vec<SpeakerChoice>),
}

/// What an engine, or a specific voice of it, accepts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineCapabilities {
    pub engine: &'static str,
    pub voice: String,
    pub model: Option<ModelLocation>,
    pub sample_rates: Vec<u32>,
    pub default_sample_rate: u32,
    /// Empty when the engine does not constrain the language.
    pub languages: Vec<String>,
    pub default_language: Option<String>,
    pub speakers: Speakers,
    pub default_speaker: Option<SpeakerChoice>,
    pub supports_speaker_wav: bool,
    pub tuning: Vec<TuningParam>,
    pub supports_split_sentences: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_fills_only_what_is_set() {
        let options = SynthesisOptions::builder()
            .voice("pt_BR-faber-medium")
            .sample_rate(22050)
            .tuning(Tuning {
                noise_w: Some(0.8),
                ..Default::default()
            })
            .build()
            .unwrap();

        assert_eq!(options.voice.as_deref(), Some("pt_BR-faber-medium"));
        assert_eq!(options.sample_rate, Some(22050));
        assert_eq!(options.language, None);
        assert!(!options.split_sentences);
        assert_eq!(options.tuning.values(), vec![(TuningParam::NoiseW, 0.8)]);
    }

    #[test]
    fn speaker_choice_maps_to_index_when_it_has_an_id() {
        assert_eq!(
            SpeakerChoice::indexed("alice", 3).to_speaker(),
            Speaker::Index(3)
        );
        assert_eq!(
            SpeakerChoice::named("Ana Florence").to_speaker(),
            Speaker::Named("Ana Florence".to_string())
        );
    }
}
