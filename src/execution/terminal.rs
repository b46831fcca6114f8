//! Terminal Channel
//!
//! The shell a workflow's commands are written into. The engine only needs
//! two operations: make sure a shell exists for a workspace, and write a
//! line into it. Writes are fire-and-forget; the engine never waits for a
//! command to finish or looks at its exit status.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use log::{debug, info, warn};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TerminalError {
    #[error("Failed to start shell '{shell}' in {}: {source}", .workspace.display())]
    Spawn {
        shell: String,
        workspace: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Workspace {} is not a directory", .0.display())]
    InvalidWorkspace(PathBuf),

    #[error("Shell for {} exited with status {status}", .workspace.display())]
    Exited { workspace: PathBuf, status: String },
}

/// A live shell per workspace.
pub trait TerminalChannel {
    /// Spawns a shell for `workspace` unless one was already started for it.
    fn ensure_ready(&mut self, workspace: &Path) -> Result<(), TerminalError>;

    /// Sends literal text to the shell's input.
    fn write(&mut self, text: &str);

    /// Updates the terminal size.
    fn resize(&mut self, cols: u16, rows: u16);
}

struct ShellProcess {
    child: Child,
    stdin: ChildStdin,
}

/// Runs commands in a child shell process with piped stdin.
///
/// Output goes straight to the parent's stdout/stderr.
pub struct ShellTerminal {
    shell: String,
    process: Option<ShellProcess>,
    last_workspace: Option<PathBuf>,
    size: (u16, u16),
}

impl ShellTerminal {
    /// Creates a channel that will spawn `shell` on first use.
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
            process: None,
            last_workspace: None,
            size: (80, 24),
        }
    }

    /// Workspace the current shell was started for.
    pub fn workspace(&self) -> Option<&Path> {
        self.last_workspace.as_deref()
    }

    fn spawn(&mut self, workspace: &Path) -> Result<(), TerminalError> {
        let (cols, rows) = self.size;
        let mut child = Command::new(&self.shell)
            .current_dir(workspace)
            .env("COLUMNS", cols.to_string())
            .env("LINES", rows.to_string())
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|source| TerminalError::Spawn {
                shell: self.shell.clone(),
                workspace: workspace.to_path_buf(),
                source,
            })?;

        let stdin = child.stdin.take().ok_or_else(|| TerminalError::Spawn {
            shell: self.shell.clone(),
            workspace: workspace.to_path_buf(),
            source: io::Error::new(io::ErrorKind::BrokenPipe, "shell stdin not captured"),
        })?;

        info!("Started shell '{}' in {}", self.shell, workspace.display());
        self.process = Some(ShellProcess { child, stdin });
        self.last_workspace = Some(workspace.to_path_buf());
        Ok(())
    }

    /// Kills the current shell without waiting for queued commands.
    fn kill(&mut self) {
        if let Some(mut process) = self.process.take() {
            drop(process.stdin);
            if let Err(e) = process.child.kill() {
                debug!("Shell already gone: {}", e);
            }
            if let Err(e) = process.child.wait() {
                warn!("Failed to reap shell: {}", e);
            }
        }
    }

    /// Closes the shell's input and lets it run what it already received.
    fn shutdown(&mut self) {
        if let Some(mut process) = self.process.take() {
            drop(process.stdin);
            if let Err(e) = process.child.wait() {
                warn!("Failed to wait for shell: {}", e);
            }
        }
    }
}

impl TerminalChannel for ShellTerminal {
    fn ensure_ready(&mut self, workspace: &Path) -> Result<(), TerminalError> {
        if self.last_workspace.as_deref() == Some(workspace) {
            if let Some(process) = self.process.as_mut() {
                if let Ok(Some(status)) = process.child.try_wait() {
                    return Err(TerminalError::Exited {
                        workspace: workspace.to_path_buf(),
                        status: status.to_string(),
                    });
                }
            }
            return Ok(());
        }

        if !workspace.is_dir() {
            return Err(TerminalError::InvalidWorkspace(workspace.to_path_buf()));
        }

        if self.process.is_some() {
            debug!("Workspace changed, replacing shell");
            self.kill();
        }
        self.spawn(workspace)
    }

    fn write(&mut self, text: &str) {
        let Some(process) = self.process.as_mut() else {
            warn!("Dropping write, no shell running");
            return;
        };

        let result = process
            .stdin
            .write_all(text.as_bytes())
            .and_then(|_| process.stdin.flush());
        if let Err(e) = result {
            warn!("Failed to write to shell: {}", e);
        }
    }

    fn resize(&mut self, cols: u16, rows: u16) {
        // Piped shells have no pty; the size applies to the next spawn.
        debug!("Terminal resized to {}x{}", cols, rows);
        self.size = (cols, rows);
    }
}

impl Drop for ShellTerminal {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Records commands instead of running them.
///
/// Used for `--dry-run` and in tests.
#[derive(Debug, Default, Clone)]
pub struct DryRunTerminal {
    written: Vec<String>,
    spawned: Vec<PathBuf>,
    last_workspace: Option<PathBuf>,
    echo: bool,
    fail_spawn: bool,
}

impl DryRunTerminal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prints every dispatched command to stdout.
    pub fn echoing() -> Self {
        Self {
            echo: true,
            ..Self::default()
        }
    }

    /// A channel whose shell never comes up.
    pub fn unavailable() -> Self {
        Self {
            fail_spawn: true,
            ..Self::default()
        }
    }

    /// Every text written so far, in order.
    pub fn written(&self) -> &[String] {
        &self.written
    }

    /// Workspaces a shell was spawned for, in order.
    pub fn spawned(&self) -> &[PathBuf] {
        &self.spawned
    }
}

impl TerminalChannel for DryRunTerminal {
    fn ensure_ready(&mut self, workspace: &Path) -> Result<(), TerminalError> {
        if self.fail_spawn {
            return Err(TerminalError::Spawn {
                shell: "dry-run".to_string(),
                workspace: workspace.to_path_buf(),
                source: io::Error::new(io::ErrorKind::NotFound, "shell unavailable"),
            });
        }

        if self.last_workspace.as_deref() != Some(workspace) {
            self.spawned.push(workspace.to_path_buf());
            self.last_workspace = Some(workspace.to_path_buf());
        }
        Ok(())
    }

    fn write(&mut self, text: &str) {
        if self.echo {
            print!("[DRY RUN] {}", text);
        }
        self.written.push(text.to_string());
    }

    fn resize(&mut self, _cols: u16, _rows: u16) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::thread;
    use std::time::{Duration, Instant};
    use tempfile::tempdir;

    #[test]
    fn test_dry_run_spawns_once_per_workspace() {
        let mut terminal = DryRunTerminal::new();

        terminal.ensure_ready(Path::new("/a")).unwrap();
        terminal.ensure_ready(Path::new("/a")).unwrap();
        terminal.ensure_ready(Path::new("/b")).unwrap();
        terminal.ensure_ready(Path::new("/b")).unwrap();

        assert_eq!(
            terminal.spawned(),
            &[PathBuf::from("/a"), PathBuf::from("/b")]
        );
    }

    #[test]
    fn test_dry_run_records_writes() {
        let mut terminal = DryRunTerminal::new();
        terminal.write("echo 1\n");
        terminal.write("echo 2\n");

        assert_eq!(terminal.written(), &["echo 1\n", "echo 2\n"]);
    }

    #[test]
    fn test_dry_run_unavailable() {
        let mut terminal = DryRunTerminal::unavailable();
        assert!(terminal.ensure_ready(Path::new("/a")).is_err());
        assert!(terminal.spawned().is_empty());
    }

    #[test]
    fn test_shell_rejects_missing_workspace() {
        let mut terminal = ShellTerminal::new("sh");
        let result = terminal.ensure_ready(Path::new("/nonexistent/workspace/dir"));

        assert!(matches!(result, Err(TerminalError::InvalidWorkspace(_))));
        assert!(terminal.workspace().is_none());
    }

    #[test]
    fn test_shell_unknown_program() {
        let workspace = tempdir().unwrap();
        let mut terminal = ShellTerminal::new("definitely-not-a-shell-binary");

        let result = terminal.ensure_ready(workspace.path());
        assert!(matches!(result, Err(TerminalError::Spawn { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_shell_runs_written_commands() {
        let workspace = tempdir().unwrap();
        let mut terminal = ShellTerminal::new("sh");

        terminal.ensure_ready(workspace.path()).unwrap();
        terminal.ensure_ready(workspace.path()).unwrap();
        terminal.write("echo hello > out.txt\n");
        terminal.write("exit\n");

        // Dropping waits for the shell to finish.
        drop(terminal);
        let content = fs::read_to_string(workspace.path().join("out.txt")).unwrap();
        assert_eq!(content.trim(), "hello");
    }

    #[cfg(unix)]
    #[test]
    fn test_shell_reports_exited_process() {
        let workspace = tempdir().unwrap();
        let mut terminal = ShellTerminal::new("sh");

        terminal.ensure_ready(workspace.path()).unwrap();
        terminal.write("exit 0\n");
        thread::sleep(Duration::from_millis(300));

        let result = terminal.ensure_ready(workspace.path());
        assert!(matches!(result, Err(TerminalError::Exited { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_shell_respawns_on_workspace_change() {
        let first = tempdir().unwrap();
        let second = tempdir().unwrap();
        let mut terminal = ShellTerminal::new("sh");

        terminal.ensure_ready(first.path()).unwrap();
        terminal.ensure_ready(second.path()).unwrap();
        assert_eq!(terminal.workspace(), Some(second.path()));

        terminal.write("pwd > where.txt\nexit\n");
        drop(terminal);
        assert!(second.path().join("where.txt").exists());
        assert!(!first.path().join("where.txt").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_workspace_change_does_not_wait_for_old_shell() {
        let first = tempdir().unwrap();
        let second = tempdir().unwrap();
        let mut terminal = ShellTerminal::new("sh");

        terminal.ensure_ready(first.path()).unwrap();
        terminal.write("sleep 5\n");

        let started = Instant::now();
        terminal.ensure_ready(second.path()).unwrap();
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(terminal.workspace(), Some(second.path()));

        terminal.write("exit\n");
    }
}
