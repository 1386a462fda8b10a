//! HTML form in front of the synthesis pipeline.
//!
//! Each submission runs on a blocking worker and writes a uniquely named WAV
//! into the configured output directory, served back under `/audio/{file}`.

use std::fmt::Write as _;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Form, Path as UrlPath, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};
use serde::Deserialize;

use crate::config::AppConfig;
use crate::engines::piper::{PiperEngine, VoiceMetadata};
use crate::engines::xtts::XttsEngine;
use crate::error::Error;
use crate::request::{SynthesisOptions, Tuning};
use crate::{synthesize_to_wav, SynthesisEngine, SynthesisOutput};

#[derive(Debug)]
struct AppState {
    config: AppConfig,
}

/// Fields of the synthesis form. HTML sends blank inputs as empty strings,
/// so everything arrives as text and blanks mean "use the default".
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SynthesisForm {
    pub engine: String,
    pub voice: String,
    pub text: String,
    pub language: String,
    pub speaker: String,
    pub sample_rate: String,
    pub length_scale: String,
    pub noise_scale: String,
    pub noise_w: String,
    pub speed: String,
    pub temperature: String,
    pub split_sentences: Option<String>,
}

impl SynthesisForm {
    fn options(&self) -> Result<SynthesisOptions, String> {
        Ok(SynthesisOptions {
            voice: non_blank(&self.voice),
            language: non_blank(&self.language),
            speaker: non_blank(&self.speaker),
            speaker_wav: None,
            sample_rate: parse_field("sample_rate", &self.sample_rate)?,
            tuning: Tuning {
                length_scale: parse_field("length_scale", &self.length_scale)?,
                noise_scale: parse_field("noise_scale", &self.noise_scale)?,
                noise_w: parse_field("noise_w", &self.noise_w)?,
                speed: parse_field("speed", &self.speed)?,
                temperature: parse_field("temperature", &self.temperature)?,
            },
            split_sentences: self.split_sentences.is_some(),
        })
    }
}

fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn parse_field<T: FromStr>(name: &str, value: &str) -> Result<Option<T>, String> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse()
        .map(Some)
        .map_err(|_| format!("Invalid value '{value}' for '{name}'."))
}

/// Query of `GET /`: the voice whose speakers and tuning choices the form
/// offers. Other fields are ignored, so the whole form can be sent back.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FormQuery {
    pub voice: String,
}

pub fn router(config: AppConfig) -> Router {
    let state = Arc::new(AppState { config });
    Router::new()
        .route("/", get(index))
        .route("/voices/{name}", get(voice_metadata))
        .route("/synthesize", post(synthesize))
        .route("/audio/{file}", get(audio))
        .with_state(state)
}

/// Serve the form on all interfaces until the process is stopped.
pub async fn serve(config: AppConfig) -> std::io::Result<()> {
    let port = config.port;
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    log::info!("Web form listening on http://0.0.0.0:{port}");
    axum::serve(listener, router(config)).await
}

async fn index(State(state): State<Arc<AppState>>, Query(query): Query<FormQuery>) -> Response {
    let piper = PiperEngine::new(state.config.piper.clone());
    let loaded = tokio::task::spawn_blocking(move || {
        let voices = piper.list_voices();
        let selected = non_blank(&query.voice).or_else(|| voices.first().cloned());
        let metadata = selected.and_then(|name| match piper.voice_metadata(&name) {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                log::warn!("Voice '{name}' has no usable options: {e}");
                None
            }
        });
        (voices, metadata)
    })
    .await;

    match loaded {
        Ok((voices, metadata)) => Html(render_form(&FormView {
            voices: &voices,
            voice_dir: &state.config.piper.voice_dir,
            selected: metadata.as_ref(),
            xtts_speakers: &state.config.xtts.speakers,
        }))
        .into_response(),
        Err(e) => {
            log::error!("Voice listing worker panicked: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(render_error("Could not list the voices.")),
            )
                .into_response()
        }
    }
}

async fn voice_metadata(
    State(state): State<Arc<AppState>>,
    UrlPath(name): UrlPath<String>,
) -> Response {
    let piper = PiperEngine::new(state.config.piper.clone());
    let loaded = tokio::task::spawn_blocking(move || piper.voice_metadata(&name)).await;

    match loaded {
        Ok(Ok(metadata)) => Json(metadata).into_response(),
        Ok(Err(Error::Validation(e))) => (StatusCode::NOT_FOUND, e.to_string()).into_response(),
        Ok(Err(e)) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
        Err(e) => {
            log::error!("Voice metadata worker panicked: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn synthesize(
    State(state): State<Arc<AppState>>,
    Form(form): Form<SynthesisForm>,
) -> (StatusCode, Html<String>) {
    let options = match form.options() {
        Ok(options) => options,
        Err(message) => return (StatusCode::BAD_REQUEST, Html(render_error(&message))),
    };

    let engine: Box<dyn SynthesisEngine + Send> = match form.engine.trim() {
        "" | "piper" => Box::new(PiperEngine::new(state.config.piper.clone())),
        "xtts" => Box::new(XttsEngine::new(state.config.xtts.clone())),
        other => {
            let message = format!("Unknown engine '{other}'. Use piper or xtts.");
            return (StatusCode::BAD_REQUEST, Html(render_error(&message)));
        }
    };

    let file_name = format!("{}.wav", uuid::Uuid::new_v4());
    let output = state.config.output_dir.join(&file_name);
    let raw_text = form.text;

    let result = tokio::task::spawn_blocking(move || {
        synthesize_to_wav(engine.as_ref(), &raw_text, &options, &output)
    })
    .await;

    match result {
        Ok(Ok(output)) => (StatusCode::OK, Html(render_result(&file_name, &output))),
        Ok(Err(e)) => {
            log::warn!("Synthesis failed: {e}");
            (status_for(&e), Html(render_error(&e.to_string())))
        }
        Err(e) => {
            log::error!("Synthesis worker panicked: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(render_error("Synthesis failed unexpectedly.")),
            )
        }
    }
}

fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::Validation(_) | Error::ReadText { .. } | Error::Options(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn audio(State(state): State<Arc<AppState>>, UrlPath(file): UrlPath<String>) -> Response {
    let is_plain_name = Path::new(&file).file_name().and_then(|n| n.to_str()) == Some(file.as_str())
        && !file.contains(['/', '\\']);
    if !is_plain_name {
        return StatusCode::NOT_FOUND.into_response();
    }

    match tokio::fs::read(state.config.output_dir.join(&file)).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, "audio/wav")], bytes).into_response(),
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

const STYLE: &str = "body{font-family:sans-serif;max-width:48rem;margin:2rem auto}\
label{display:block;margin-top:.75rem}textarea{width:100%}\
.warning{color:#a15c00}.error{color:#b00020}pre{background:#f4f4f4;padding:.5rem}";

fn page(title: &str, body: &str) -> String {
    format!(
        "<!doctype html><html><head><meta charset=\"utf-8\"><title>{}</title>\
         <style>{STYLE}</style></head><body>{body}</body></html>",
        text(title)
    )
}

/// What the form shows: installed voices, and the options of the voice
/// picked through `?voice=` (the first one otherwise).
struct FormView<'a> {
    voices: &'a [String],
    voice_dir: &'a Path,
    selected: Option<&'a VoiceMetadata>,
    xtts_speakers: &'a [String],
}

const TUNING_FIELDS: [(&str, &str); 3] = [
    ("length_scale", "Length scale"),
    ("noise_scale", "Noise scale"),
    ("noise_w", "Noise width"),
];

fn render_form(view: &FormView<'_>) -> String {
    let mut body = String::from("<h1>Local TTS</h1>");
    if view.voices.is_empty() {
        let _ = write!(
            body,
            "<p class=\"warning\">No Piper voice found in {}. Add .onnx models with their \
             .onnx.json configs, or set PIPER_VOICE_DIR.</p>",
            text(&view.voice_dir.display().to_string())
        );
    }
    let selected_name = view.selected.map(|m| m.name.as_str());

    body.push_str(
        "<form method=\"post\" action=\"/synthesize\">\
         <label>Engine <select name=\"engine\">\
         <option value=\"piper\">Piper</option><option value=\"xtts\">XTTS</option>\
         </select></label><label>Voice <select name=\"voice\">",
    );
    for voice in view.voices {
        let _ = write!(
            body,
            "<option value=\"{}\"{}>{}</option>",
            attr(voice),
            selected_attr(selected_name == Some(voice.as_str())),
            text(voice)
        );
    }
    body.push_str(
        "</select></label>\
         <button type=\"submit\" formmethod=\"get\" formaction=\"/\" formnovalidate>Load voice options</button>\
         <label>Text <textarea name=\"text\" rows=\"8\" required></textarea></label>\
         <label>Language <input name=\"language\"></label>\
         <label>Speaker <select name=\"speaker\"><option value=\"\">Default</option>",
    );
    if let Some(metadata) = view.selected.filter(|m| !m.speakers.is_empty()) {
        let _ = write!(body, "<optgroup label=\"Piper: {}\">", attr(&metadata.name));
        for speaker in &metadata.speakers {
            push_option(&mut body, &speaker.label, &speaker.label);
        }
        body.push_str("</optgroup>");
    }
    if !view.xtts_speakers.is_empty() {
        body.push_str("<optgroup label=\"XTTS\">");
        for speaker in view.xtts_speakers {
            push_option(&mut body, speaker, speaker);
        }
        body.push_str("</optgroup>");
    }
    body.push_str("</select></label>");

    let _ = write!(
        body,
        "<label>Sample rate <input name=\"sample_rate\" inputmode=\"numeric\"{}></label>\
         <fieldset><legend>Piper</legend>",
        view.selected
            .map(|m| format!(" placeholder=\"{}\"", m.sample_rate))
            .unwrap_or_default()
    );
    for (field, label) in TUNING_FIELDS {
        let choices = view.selected.and_then(|m| m.numeric_parameters.get(field));
        match choices {
            Some(choices) => {
                let _ = write!(
                    body,
                    "<label>{label} <select name=\"{field}\"><option value=\"\">Default</option>"
                );
                for (value, _) in &choices.values {
                    if *value == choices.default_label {
                        push_option(&mut body, value, &format!("{value} (voice default)"));
                    } else {
                        push_option(&mut body, value, value);
                    }
                }
                body.push_str("</select></label>");
            }
            None => {
                let _ = write!(body, "<label>{label} <input name=\"{field}\"></label>");
            }
        }
    }
    body.push_str(
        "</fieldset>\
         <fieldset><legend>XTTS</legend>\
         <label>Speed <input name=\"speed\"></label>\
         <label>Temperature <input name=\"temperature\"></label>\
         <label><input type=\"checkbox\" name=\"split_sentences\"> Split sentences</label>\
         </fieldset><p><button type=\"submit\">Synthesize</button></p></form>",
    );
    page("Local TTS", &body)
}

fn selected_attr(selected: bool) -> &'static str {
    if selected {
        " selected"
    } else {
        ""
    }
}

fn push_option(body: &mut String, value: &str, label: &str) {
    let _ = write!(
        body,
        "<option value=\"{}\">{}</option>",
        attr(value),
        text(label)
    );
}

fn render_result(file_name: &str, output: &SynthesisOutput) -> String {
    let log = format!(
        "File: {}\nSample rate: {} Hz\nDuration: {:.2}s\nElapsed: {:.2?}",
        output.path.display(),
        output.sample_rate,
        output.duration_secs,
        output.elapsed
    );
    let body = format!(
        "<h1>Audio ready</h1><audio controls src=\"/audio/{}\"></audio>\
         <pre>{}</pre><p><a href=\"/\">Back</a></p>",
        attr(file_name),
        text(&log)
    );
    page("Audio ready", &body)
}

fn render_error(message: &str) -> String {
    let body = format!(
        "<h1>Synthesis failed</h1><p class=\"error\">{}</p><p><a href=\"/\">Back</a></p>",
        text(message)
    );
    page("Synthesis failed", &body)
}
