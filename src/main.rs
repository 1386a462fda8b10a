use std::error::Error as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use local_tts::config::AppConfig;
use local_tts::engines::piper::PiperEngine;
use local_tts::engines::xtts::{ModelInventory, XttsEngine};
use local_tts::request::{SynthesisOptions, Tuning};
use local_tts::{synthesize_to_wav, text, Error, SynthesisEngine, ValidationError};

#[derive(Parser, Debug)]
#[command(name = "local-tts")]
#[command(about = "Local text-to-speech with Piper and Coqui XTTS")]
#[command(version)]
struct Cli {
    /// Debug logging and full error chains
    #[arg(long, global = true)]
    debug: bool,

    /// JSON settings file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Synthesize with a Piper voice
    Piper(PiperArgs),
    /// Synthesize with Coqui XTTS v2
    Xtts(XttsArgs),
    /// List Piper voices, or show one voice's options as JSON
    Voices {
        /// Directory holding the .onnx voices
        #[arg(long)]
        voice_dir: Option<PathBuf>,
        name: Option<String>,
    },
    /// Show the languages and speakers XTTS accepts
    XttsInfo {
        /// Load the model and ask it instead of using the configured lists
        #[arg(long)]
        probe: bool,
    },
    /// Start the web form
    #[cfg(feature = "web")]
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct TextInput {
    /// Text to synthesize
    #[arg(long)]
    text: Option<String>,

    /// UTF-8 file with the text to synthesize
    #[arg(long, value_name = "FILE")]
    text_file: Option<PathBuf>,
}

impl TextInput {
    fn read(&self) -> Result<String, Error> {
        match (&self.text, &self.text_file) {
            (Some(text), _) => Ok(text.clone()),
            (None, Some(path)) => text::read_text_file(path).map_err(|source| Error::ReadText {
                path: path.clone(),
                source,
            }),
            (None, None) => Err(ValidationError::EmptyText.into()),
        }
    }
}

#[derive(Args, Debug)]
struct PiperArgs {
    /// Voice name, e.g. pt_BR-faber-medium
    #[arg(long)]
    voice: String,

    #[command(flatten)]
    input: TextInput,

    #[arg(long)]
    voice_dir: Option<PathBuf>,

    #[arg(long, default_value = "output/tts.wav")]
    output: PathBuf,

    /// Speaker name or id, for multi-speaker voices
    #[arg(long)]
    speaker: Option<String>,

    #[arg(long)]
    lang: Option<String>,

    /// Sample rate in Hz
    #[arg(long)]
    sr: Option<u32>,

    #[arg(long)]
    length_scale: Option<f32>,

    #[arg(long)]
    noise_scale: Option<f32>,

    #[arg(long)]
    noise_w: Option<f32>,
}

#[derive(Args, Debug)]
struct XttsArgs {
    #[command(flatten)]
    input: TextInput,

    #[arg(long)]
    lang: Option<String>,

    #[arg(long, default_value = "outputs/output.wav")]
    output: PathBuf,

    /// Reference WAV to clone the voice from
    #[arg(long)]
    speaker_wav: Option<PathBuf>,

    /// Built-in speaker, used when no reference WAV is given
    #[arg(long)]
    speaker: Option<String>,

    /// Sample rate in Hz (only 24000)
    #[arg(long)]
    sr: Option<u32>,

    #[arg(long)]
    split_sentences: bool,

    #[arg(long)]
    speed: Option<f32>,

    #[arg(long)]
    temperature: Option<f32>,

    /// Coqui model name
    #[arg(long)]
    model: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match run(cli.command, cli.config.as_deref()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            if cli.debug {
                let mut source = e.source();
                while let Some(cause) = source {
                    eprintln!("  caused by: {cause}");
                    source = cause.source();
                }
            }
            match e {
                Error::ReadText { .. } => ExitCode::from(1),
                _ => ExitCode::from(2),
            }
        }
    }
}

fn run(command: Commands, config_file: Option<&Path>) -> Result<(), Error> {
    let mut config = AppConfig::load(config_file)?;

    match command {
        Commands::Piper(args) => {
            if let Some(dir) = args.voice_dir {
                config.piper.voice_dir = dir;
            }
            let raw_text = args.input.read()?;
            let mut options = SynthesisOptions::builder();
            options.voice(args.voice).tuning(Tuning {
                length_scale: args.length_scale,
                noise_scale: args.noise_scale,
                noise_w: args.noise_w,
                ..Default::default()
            });
            if let Some(speaker) = args.speaker {
                options.speaker(speaker);
            }
            if let Some(lang) = args.lang {
                options.language(lang);
            }
            if let Some(sr) = args.sr {
                options.sample_rate(sr);
            }

            let engine = PiperEngine::new(config.piper);
            synthesize(&engine, &raw_text, &options.build()?, &args.output)
        }
        Commands::Xtts(args) => {
            if let Some(model) = args.model {
                config.xtts.model_name = model;
            }
            let raw_text = args.input.read()?;
            let mut options = SynthesisOptions::builder();
            options.split_sentences(args.split_sentences).tuning(Tuning {
                speed: args.speed,
                temperature: args.temperature,
                ..Default::default()
            });
            if let Some(wav) = args.speaker_wav {
                options.speaker_wav(wav);
            }
            if let Some(speaker) = args.speaker {
                options.speaker(speaker);
            }
            if let Some(lang) = args.lang {
                options.language(lang);
            }
            if let Some(sr) = args.sr {
                options.sample_rate(sr);
            }

            let engine = XttsEngine::new(config.xtts);
            synthesize(&engine, &raw_text, &options.build()?, &args.output)
        }
        Commands::Voices { voice_dir, name } => {
            if let Some(dir) = voice_dir {
                config.piper.voice_dir = dir;
            }
            if !config.piper.voice_dir.is_dir() {
                return Err(ValidationError::VoiceDirNotFound(config.piper.voice_dir).into());
            }
            let engine = PiperEngine::new(config.piper);
            match name {
                Some(name) => println!("{}", to_json(&engine.voice_metadata(&name)?)?),
                None => {
                    let voices = engine.list_voices();
                    if voices.is_empty() {
                        log::warn!(
                            "No voice found in {}",
                            engine.config().voice_dir.display()
                        );
                    }
                    for voice in voices {
                        println!("{voice}");
                    }
                }
            }
            Ok(())
        }
        Commands::XttsInfo { probe } => {
            let engine = XttsEngine::new(config.xtts);
            let inventory = if probe {
                engine.inventory()
            } else {
                ModelInventory {
                    languages: engine.config().languages.clone(),
                    speakers: engine.config().speakers.clone(),
                }
            };
            let info = serde_json::json!({
                "model": engine.config().model_name,
                "languages": inventory.languages,
                "speakers": inventory.speakers,
                "default_language": engine.config().default_language,
                "default_speaker": engine.config().default_speaker,
            });
            println!("{}", to_json(&info)?);
            Ok(())
        }
        #[cfg(feature = "web")]
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.port = port;
            }
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(local_tts::web::serve(config))?;
            Ok(())
        }
    }
}

fn synthesize(
    engine: &dyn SynthesisEngine,
    raw_text: &str,
    options: &SynthesisOptions,
    output: &Path,
) -> Result<(), Error> {
    let result = synthesize_to_wav(engine, raw_text, options, output)?;
    println!(
        "Audio saved to {} ({:.2}s at {} Hz, {:.2?})",
        result.path.display(),
        result.duration_secs,
        result.sample_rate,
        result.elapsed
    );
    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, Error> {
    serde_json::to_string_pretty(value).map_err(|e| Error::Io(std::io::Error::other(e)))
}
