//! Parameter validation against an engine's capabilities.

use crate::error::ValidationError;
use crate::request::{
    EngineCapabilities, Speaker, SpeakerChoice, Speakers, SynthesisOptions, SynthesisRequest,
    TuningParam, VoiceSpec,
};
use crate::text::SanitizedText;

/// Check every option in `options` against `caps` and build the request.
///
/// Every field is checked before anything is returned, so an engine never
/// sees a partially validated request.
pub fn validate(
    text: SanitizedText,
    options: &SynthesisOptions,
    caps: &EngineCapabilities,
) -> Result<SynthesisRequest, ValidationError> {
    let sample_rate = validate_sample_rate(options.sample_rate, caps)?;
    let language = validate_language(options.language.as_deref(), caps)?;

    if let Some(path) = &options.speaker_wav {
        if !caps.supports_speaker_wav {
            return Err(ValidationError::SpeakerSampleUnsupported {
                engine: caps.engine,
            });
        }
        if !path.is_file() {
            return Err(ValidationError::SpeakerSampleNotFound(path.clone()));
        }
    }

    let speaker = if options.speaker_wav.is_some() {
        if let Some(name) = &options.speaker {
            log::debug!("Reference sample given; ignoring speaker '{name}'");
        }
        None
    } else {
        validate_speaker(options.speaker.as_deref(), caps)?
    };

    for (param, value) in options.tuning.values() {
        validate_tuning(param, value, caps)?;
    }

    if options.split_sentences && !caps.supports_split_sentences {
        return Err(ValidationError::UnsupportedParameter {
            engine: caps.engine,
            parameter: "split_sentences",
        });
    }

    Ok(SynthesisRequest {
        text,
        voice: VoiceSpec {
            name: caps.voice.clone(),
            model: caps.model.clone(),
            speaker_wav: options.speaker_wav.clone(),
            speaker,
        },
        sample_rate,
        language,
        tuning: options.tuning,
        split_sentences: options.split_sentences,
    })
}

fn validate_sample_rate(
    requested: Option<u32>,
    caps: &EngineCapabilities,
) -> Result<u32, ValidationError> {
    let rate = requested.unwrap_or(caps.default_sample_rate);
    if caps.sample_rates.contains(&rate) {
        Ok(rate)
    } else {
        Err(ValidationError::UnsupportedSampleRate {
            requested: rate,
            supported: caps.sample_rates.clone(),
        })
    }
}

/// Lowercase and use `-` as the region separator (`pt_BR` -> `pt-br`).
pub fn normalize_language(lang: &str) -> String {
    lang.trim().to_lowercase().replace('_', "-")
}

fn validate_language(
    requested: Option<&str>,
    caps: &EngineCapabilities,
) -> Result<Option<String>, ValidationError> {
    let Some(requested) = requested.filter(|l| !l.trim().is_empty()) else {
        return Ok(caps.default_language.clone());
    };

    let normalized = normalize_language(requested);
    if caps.languages.is_empty() || caps.languages.contains(&normalized) {
        Ok(Some(normalized))
    } else {
        Err(ValidationError::UnsupportedLanguage {
            requested: requested.to_string(),
            supported: caps.languages.clone(),
        })
    }
}

fn validate_speaker(
    requested: Option<&str>,
    caps: &EngineCapabilities,
) -> Result<Option<Speaker>, ValidationError> {
    let Some(requested) = requested.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(caps.default_speaker.as_ref().map(SpeakerChoice::to_speaker));
    };

    match &caps.speakers {
        Speakers::None => Err(ValidationError::SpeakerNotSupported {
            voice: caps.voice.clone(),
            requested: requested.to_string(),
        }),
        Speakers::Any => Ok(Some(Speaker::Named(requested.to_string()))),
        Speakers::Listed(choices) => {
            let by_label = choices.iter().find(|c| c.label == requested);
            let by_id = || {
                let id: u32 = requested.parse().ok()?;
                choices.iter().find(|c| c.id == Some(id))
            };
            by_label
                .or_else(by_id)
                .map(|choice| Some(choice.to_speaker()))
                .ok_or_else(|| ValidationError::UnknownSpeaker {
                    requested: requested.to_string(),
                    available: choices.iter().map(|c| c.label.clone()).collect(),
                })
        }
    }
}

fn validate_tuning(
    param: TuningParam,
    value: f32,
    caps: &EngineCapabilities,
) -> Result<(), ValidationError> {
    if !caps.tuning.contains(&param) {
        return Err(ValidationError::UnsupportedParameter {
            engine: caps.engine,
            parameter: param.as_str(),
        });
    }

    let invalid = |reason| ValidationError::InvalidParameter {
        parameter: param.as_str(),
        value,
        reason,
    };

    if !value.is_finite() {
        return Err(invalid("must be a finite number"));
    }
    match param {
        TuningParam::NoiseScale | TuningParam::NoiseW if value < 0.0 => {
            Err(invalid("must not be negative"))
        }
        TuningParam::LengthScale | TuningParam::Speed | TuningParam::Temperature
            if value <= 0.0 =>
        {
            Err(invalid("must be greater than zero"))
        }
        _ => Ok(()),
    }
}
