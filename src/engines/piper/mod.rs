//! Piper text-to-speech engine.
//!
//! Piper voices are VITS models exported to ONNX. Synthesis is delegated to
//! the `piper` executable, which receives the sanitized text on stdin.
//!
//! # System Requirements
//!
//! **piper** must be on `PATH`, or set `PIPER_BIN` to its location:
//! - pip: `pip install piper-tts`
//! - Releases: <https://github.com/rhasspy/piper/releases>
//!
//! # Voice Directory Layout
//!
//! ```text
//! /voices/
//! ├── pt_BR-faber-medium.onnx         # model
//! ├── pt_BR-faber-medium.onnx.json    # config sidecar (required)
//! └── en/
//!     ├── en_US-amy-medium.onnx
//!     └── en_US-amy-medium.onnx.json
//! ```
//!
//! Voices are found recursively and selected by file stem, e.g.
//! `pt_BR-faber-medium`.
//!
//! # Config Fields Used
//!
//! | Field | Meaning |
//! |---|---|
//! | `audio.sample_rate` | Output sample rate (default 22050) |
//! | `language.code` / `espeak.voice` | Voice language |
//! | `speaker_id_map` | Named speakers and their ids |
//! | `num_speakers` | Speaker count when no names are given |
//! | `inference.length_scale`, `noise_scale`, `noise_w` | Default tuning |

pub mod engine;
pub mod voices;

pub use engine::{PiperConfig, PiperEngine};
pub use voices::{NumericChoices, VoiceMetadata};
