//! Coqui XTTS v2 engine.
//!
//! Synthesis runs inside Python: a small bridge script is embedded in the
//! binary and started with `python -c`, reading the text from stdin.
//!
//! # System Requirements
//!
//! A Python interpreter with the Coqui `TTS` package (`pip install TTS`).
//! Set `XTTS_PYTHON` when it is not `python3` on `PATH`. The model is
//! downloaded by Coqui on first use.
//!
//! Languages and speakers are taken from [`XttsConfig`]; run
//! [`XttsEngine::probe`] to ask the installed model instead.

pub mod engine;

pub use engine::{ModelInventory, XttsConfig, XttsEngine};
