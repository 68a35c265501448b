//! Detached terminal sessions for long-running scans.
//!
//! Each pattern class is scanned by its own `lrr-scan` process inside a named session, so several
//! scans run side by side, survive the launching terminal, and can be listed, reattached, or
//! killed by name.

use std::process::{Command, Stdio};

use log::info;

use crate::cli::LaunchArgs;
use crate::errors::*;
use crate::patterns::PatternSpec;

pub trait SessionManager {
    /// Start `command` (program and arguments) in a new detached session.
    fn create(&mut self, name: &str, command: &[String]) -> Result<()>;

    /// Hand the current terminal over to a session until it detaches.
    fn attach(&mut self, name: &str) -> Result<()>;

    fn list(&self) -> Result<Vec<String>>;

    fn kill(&mut self, name: &str) -> Result<()>;

    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.list()?.iter().any(|s| s == name))
    }
}

/// Sessions backed by `tmux`.
#[derive(Debug, Clone)]
pub struct TmuxSessions {
    program: String,
}

impl Default for TmuxSessions {
    fn default() -> Self {
        Self {
            program: "tmux".to_owned(),
        }
    }
}

impl TmuxSessions {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self) -> Command {
        Command::new(&self.program)
    }

    fn run_checked(&self, cmd: &mut Command) -> Result<()> {
        let output = cmd
            .stdin(Stdio::null())
            .output()
            .map_err(|e| Error::Session(format!("cannot run {}: {e}", self.program)))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(Error::Session(
                String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            ))
        }
    }

    fn require(&self, name: &str) -> Result<()> {
        if self.exists(name)? {
            Ok(())
        } else {
            Err(Error::SessionNotFound(name.to_owned()))
        }
    }
}

impl SessionManager for TmuxSessions {
    fn create(&mut self, name: &str, command: &[String]) -> Result<()> {
        if self.exists(name)? {
            return Err(Error::SessionExists(name.to_owned()));
        }

        self.run_checked(
            self.command()
                .args(["new-session", "-d", "-s", name, "--"])
                .args(command),
        )
    }

    fn attach(&mut self, name: &str) -> Result<()> {
        self.require(name)?;

        let status = self
            .command()
            .args(["attach-session", "-t", name])
            .status()
            .map_err(|e| Error::Session(format!("cannot run {}: {e}", self.program)))?;

        if status.success() {
            Ok(())
        } else {
            Err(Error::Session(format!("attach to \"{name}\" exited with {status}")))
        }
    }

    fn list(&self) -> Result<Vec<String>> {
        let output = self
            .command()
            .args(["list-sessions", "-F", "#{session_name}"])
            .stdin(Stdio::null())
            .output()
            .map_err(|e| Error::Session(format!("cannot run {}: {e}", self.program)))?;

        // tmux exits non-zero when no server is running, which just means no sessions
        if !output.status.success() {
            return Ok(Vec::new());
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_owned)
            .collect())
    }

    fn kill(&mut self, name: &str) -> Result<()> {
        self.require(name)?;
        self.run_checked(self.command().args(["kill-session", "-t", name]))
    }
}

/// Session name for a pattern class, e.g. `lrr_RI_like` for `RI-like`.
pub fn session_name(pattern: &str) -> String {
    let name = pattern
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect::<String>();
    format!("lrr_{name}")
}

/// One session to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub session: String,
    pub command: Vec<String>,
}

/// Build one scanner invocation per pattern, each writing its own result file.
pub fn plan_launch(args: &LaunchArgs, patterns: &[PatternSpec]) -> Vec<LaunchSpec> {
    patterns
        .iter()
        .map(|p| {
            let output = args.output_dir.join(format!("{}_hits.tsv", p.name()));
            let mut command = vec![
                args.scanner.clone(),
                args.bucket_or_path.clone(),
                args.file_name.clone(),
                "--pattern".to_owned(),
                p.name().to_owned(),
                "--output".to_owned(),
                output.display().to_string(),
            ];
            if let Some(n) = args.max_sequences {
                command.extend(["--max-sequences".to_owned(), n.to_string()]);
            }
            if args.local {
                command.push("--local".to_owned());
            }
            if args.no_upload {
                command.push("--no-upload".to_owned());
            }

            LaunchSpec {
                session: session_name(p.name()),
                command,
            }
        })
        .collect()
}

/// Start every planned session. Sessions that already exist are left running and reported as
/// [`Error::SessionExists`] after the remaining ones have been started.
pub fn launch(manager: &mut dyn SessionManager, plan: &[LaunchSpec]) -> Result<Vec<String>> {
    let mut started = Vec::with_capacity(plan.len());
    let mut existing = None;

    for spec in plan {
        match manager.create(&spec.session, &spec.command) {
            Ok(()) => {
                info!("Started session {}: {}", spec.session, spec.command.join(" "));
                started.push(spec.session.clone());
            }
            Err(Error::SessionExists(name)) => {
                existing.get_or_insert(name);
            }
            Err(e) => return Err(e),
        }
    }

    match existing {
        Some(name) => Err(Error::SessionExists(name)),
        None => Ok(started),
    }
}
