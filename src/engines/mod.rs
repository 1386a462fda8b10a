//! Speech synthesis engines.
//!
//! Both engines run out of process: Piper through its own executable and
//! XTTS through a Python interpreter with the Coqui `TTS` package installed.
//!
//! # Available Engines
//!
//! - [`piper`] - Piper voices (`.onnx` + `.onnx.json`) from a voices directory
//! - [`xtts`] - Coqui XTTS v2, multilingual with voice cloning

pub mod piper;
pub mod xtts;

use std::borrow::Cow;
use std::ffi::OsString;
use std::io::Write;
use std::process::{Command, Stdio};

use crate::error::EngineError;

/// An external program invocation.
#[derive(Debug, Clone)]
pub(crate) struct Invocation<'a> {
    pub program: &'a str,
    /// Environment variable that overrides `program`, named in errors.
    pub program_env: &'static str,
    pub args: Vec<OsString>,
    pub stdin: Option<&'a str>,
}

/// Captured output of a successful run.
#[derive(Debug, Clone, Default)]
pub(crate) struct ProgramOutput {
    pub stdout: String,
}

/// Run `invocation` to completion.
///
/// Text given as stdin is newline-terminated. A non-zero exit becomes
/// [`EngineError::Failed`] carrying the program's own output unmodified.
pub(crate) fn run_program(invocation: &Invocation<'_>) -> Result<ProgramOutput, EngineError> {
    log::debug!(
        "Running {} {:?}",
        invocation.program,
        invocation.args
    );

    let mut child = Command::new(invocation.program)
        .args(&invocation.args)
        .stdin(if invocation.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EngineError::ProgramNotFound {
                    program: invocation.program.to_string(),
                    env: invocation.program_env,
                }
            } else {
                EngineError::Io(e)
            }
        })?;

    if let (Some(mut stdin), Some(text)) = (child.stdin.take(), invocation.stdin) {
        // An engine that exits before reading stdin reports its own error below.
        if let Err(e) = stdin.write_all(line_terminated(text).as_bytes()) {
            if e.kind() != std::io::ErrorKind::BrokenPipe {
                return Err(e.into());
            }
        }
    }

    let output = child.wait_with_output()?;
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    for line in stdout.lines().chain(stderr.lines()) {
        let line = line.trim();
        if !line.is_empty() {
            log::debug!("[{}] {}", invocation.program, line);
        }
    }

    if !output.status.success() {
        let combined = [stderr.trim(), stdout.trim()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        return Err(EngineError::Failed {
            program: invocation.program.to_string(),
            code: output.status.code(),
            output: combined,
        });
    }

    Ok(ProgramOutput { stdout })
}

fn line_terminated(input: &str) -> Cow<'_, str> {
    if input.ends_with('\n') {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(format!("{input}\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_trailing_newline_for_stdin() {
        assert_eq!(line_terminated("Olá"), "Olá\n");
        assert_eq!(line_terminated("Olá\n"), "Olá\n");
    }

    #[test]
    fn missing_program_is_reported_by_name() {
        let invocation = Invocation {
            program: "definitely-not-a-real-tts-binary",
            program_env: "PIPER_BIN",
            args: vec![],
            stdin: Some("text"),
        };
        match run_program(&invocation) {
            Err(EngineError::ProgramNotFound { program, env }) => {
                assert_eq!(program, "definitely-not-a-real-tts-binary");
                assert_eq!(env, "PIPER_BIN");
            }
            other => panic!("expected ProgramNotFound, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn failing_program_passes_its_output_through() {
        let invocation = Invocation {
            program: "sh",
            program_env: "PIPER_BIN",
            args: vec!["-c".into(), "cat >/dev/null; echo 'model load failed' >&2; exit 3".into()],
            stdin: Some("text"),
        };
        match run_program(&invocation) {
            Err(EngineError::Failed { code, output, .. }) => {
                assert_eq!(code, Some(3));
                assert_eq!(output, "model load failed");
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn stdin_reaches_the_program() {
        let invocation = Invocation {
            program: "cat",
            program_env: "PIPER_BIN",
            args: vec![],
            stdin: Some("Olá mundo"),
        };
        let output = run_program(&invocation).unwrap();
        assert_eq!(output.stdout, "Olá mundo\n");
    }
}
