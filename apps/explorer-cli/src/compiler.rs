//! External compiler for EV3 Basic and assembler sources.
//!
//! The compiler runs as `program args... <kind>` where `<kind>` is `basic`
//! or `assembly`. It reads the source on stdin and writes the `.rbf` image
//! to stdout. A non-zero exit status turns each stderr line into one
//! compile error.

use std::io::Write;
use std::process::{Command, Stdio};

use ev3explorer_file_ops::{Compiler, SourceKind};
use tracing::debug;

use crate::config::CompilerConfig;

/// Compiler backed by a child process.
#[derive(Debug, Clone)]
pub struct ExternalCompiler {
    program: String,
    args: Vec<String>,
}

impl ExternalCompiler {
    pub fn new(config: &CompilerConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
        }
    }

    fn run(&self, kind: SourceKind, source: &[u8]) -> std::io::Result<std::process::Output> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(kind.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // stdin is written while stdout is drained.
        let stdin = child.stdin.take();
        std::thread::scope(|s| {
            let writer = s.spawn(move || -> std::io::Result<()> {
                if let Some(mut stdin) = stdin {
                    stdin.write_all(source)?;
                }
                Ok(())
            });
            let output = child.wait_with_output();
            match writer.join() {
                Ok(Err(e)) if e.kind() != std::io::ErrorKind::BrokenPipe => Err(e),
                _ => output,
            }
        })
    }
}

impl Compiler for ExternalCompiler {
    fn compile(&mut self, kind: SourceKind, source: &[u8]) -> Result<Vec<u8>, Vec<String>> {
        debug!(program = %self.program, %kind, bytes = source.len(), "running compiler");
        let output = self
            .run(kind, source)
            .map_err(|e| vec![format!("failed to run {}: {e}", self.program)])?;

        if output.status.success() {
            return Ok(output.stdout);
        }

        let errors: Vec<String> = String::from_utf8_lossy(&output.stderr)
            .lines()
            .map(str::trim_end)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect();
        if errors.is_empty() {
            Err(vec![format!("{} exited with {}", self.program, output.status)])
        } else {
            Err(errors)
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> ExternalCompiler {
        ExternalCompiler::new(&CompilerConfig {
            program: "sh".into(),
            args: vec!["-c".into(), script.into(), "compiler".into()],
        })
    }

    #[test]
    fn stdout_becomes_image() {
        let mut c = sh(r#"printf "$1:"; cat"#);
        let image = c.compile(SourceKind::Assembly, b"vmthread MAIN").unwrap();
        assert_eq!(image, b"assembly:vmthread MAIN");
    }

    #[test]
    fn stderr_lines_become_errors() {
        let mut c = sh("cat >/dev/null; echo 'line 3: bad' >&2; echo 'line 9: worse' >&2; exit 1");
        let errors = c.compile(SourceKind::Basic, b"x").unwrap_err();
        assert_eq!(errors, vec!["line 3: bad", "line 9: worse"]);
    }

    #[test]
    fn silent_failure_reports_status() {
        let mut c = sh("exit 2");
        let errors = c.compile(SourceKind::Basic, b"").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("exited"));
    }

    #[test]
    fn missing_program_is_an_error() {
        let mut c = ExternalCompiler::new(&CompilerConfig {
            program: "/nonexistent/ev3-compiler".into(),
            args: vec![],
        });
        let errors = c.compile(SourceKind::Basic, b"").unwrap_err();
        assert!(errors[0].starts_with("failed to run"));
    }
}
