//! Subprocess execution utilities.

use std::ffi::OsStr;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};

/// How a child's stdout/stderr are handled while it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Echo every line to this process's stdout/stderr as it arrives.
    Stream,
    /// Collect silently; the caller decides what to surface.
    Capture,
}

/// Exit status plus the combined output of both streams, in arrival order.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub output: String,
}

/// Builder for subprocess execution.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<String>,
    cwd: Option<PathBuf>,
}

impl ProcessBuilder {
    /// Create a new process builder for the given program.
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            cwd: None,
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(
            args.into_iter()
                .map(|s| s.as_ref().to_string_lossy().into_owned()),
        );
        self
    }

    /// Set the working directory.
    pub fn cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    /// Get the program path.
    pub fn get_program(&self) -> &Path {
        &self.program
    }

    /// Build the Command. The child inherits this process's environment.
    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }

        cmd
    }

    /// Run the command to completion, draining stdout and stderr on
    /// dedicated threads so neither pipe can fill and stall the child.
    /// Both pipes are drained to end of stream; lines that are not valid
    /// UTF-8 are decoded lossily.
    ///
    /// In [`OutputMode::Stream`] every line is echoed live to the matching
    /// stream of this process; in [`OutputMode::Capture`] nothing is printed.
    /// Either way the combined output is collected in arrival order.
    pub fn exec_streamed(&self, mode: OutputMode) -> Result<CommandOutput> {
        let mut cmd = self.build_command();
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn `{}`", self.display_command()))?;

        let combined = Arc::new(Mutex::new(String::new()));
        let echo = mode == OutputMode::Stream;

        let readers: Vec<JoinHandle<()>> = [
            child
                .stdout
                .take()
                .map(|pipe| drain(pipe, echo, false, Arc::clone(&combined))),
            child
                .stderr
                .take()
                .map(|pipe| drain(pipe, echo, true, Arc::clone(&combined))),
        ]
        .into_iter()
        .flatten()
        .collect();

        let status = child
            .wait()
            .with_context(|| format!("failed to wait for `{}`", self.display_command()))?;

        for handle in readers {
            let _ = handle.join();
        }

        let output = match Arc::try_unwrap(combined) {
            Ok(mutex) => mutex.into_inner().unwrap_or_else(|e| e.into_inner()),
            Err(arc) => arc.lock().unwrap_or_else(|e| e.into_inner()).clone(),
        };

        Ok(CommandOutput { status, output })
    }

    /// Display the command for error messages.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

fn drain<R>(pipe: R, echo: bool, to_stderr: bool, sink: Arc<Mutex<String>>) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut reader = BufReader::new(pipe);
        let mut raw = Vec::new();
        loop {
            raw.clear();
            match reader.read_until(b'\n', &mut raw) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            if raw.last() == Some(&b'\n') {
                raw.pop();
            }
            if raw.last() == Some(&b'\r') {
                raw.pop();
            }

            // Tool output is not guaranteed to be UTF-8.
            let line = String::from_utf8_lossy(&raw);

            if echo {
                if to_stderr {
                    eprintln!("{}", line);
                } else {
                    println!("{}", line);
                }
            }

            let mut sink = sink.lock().unwrap_or_else(|e| e.into_inner());
            sink.push_str(&line);
            sink.push('\n');
        }
    })
}

/// Find an executable in PATH.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}
