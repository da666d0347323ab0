//! ExifTool subprocess probe
//!
//! Runs `exiftool -j <file>` (or the geolocation variant) once per file,
//! waits for it with an optional deadline, and parses the JSON document it
//! prints. A child that overruns the deadline is killed and the file is
//! reported as failed.

use crate::error::{ProbeError, ProbeResult};
use crate::probe::{parse_tool_output, Metadata, MetadataProbe};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Interval between child status checks while waiting
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Which tag set to request from the tool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeMode {
    /// Every tag the tool knows about
    Full,
    /// Only the tool's reverse-geocoded `Geolocation*` tags
    Geolocation,
}

impl ProbeMode {
    fn tool_args(self) -> &'static [&'static str] {
        match self {
            ProbeMode::Full => &["-j"],
            ProbeMode::Geolocation => &["-api", "geolocation", "-geolocation*", "-j"],
        }
    }
}

/// Metadata probe backed by the ExifTool executable
#[derive(Debug, Clone)]
pub struct ExifToolProbe {
    /// Resolved executable path
    tool: PathBuf,

    /// Tag set to request
    mode: ProbeMode,

    /// Per-invocation deadline (None waits forever)
    timeout: Option<Duration>,
}

impl ExifToolProbe {
    /// Locate the tool and build a probe
    ///
    /// A bare program name (no directory component) is looked up on `PATH`;
    /// anything else must exist as a file.
    pub fn locate(tool: &Path, mode: ProbeMode, timeout: Option<Duration>) -> ProbeResult<Self> {
        let tool = resolve_tool(tool)?;
        debug!(tool = %tool.display(), ?mode, "Metadata tool located");
        Ok(Self { tool, mode, timeout })
    }

    /// Resolved executable path
    pub fn tool_path(&self) -> &Path {
        &self.tool
    }

    fn run_tool(&self, file: &Path) -> ProbeResult<Vec<u8>> {
        let mut cmd = Command::new(&self.tool);
        cmd.args(self.mode.tool_args())
            .arg(file)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // Own process group, so a timeout can take down helpers the tool spawned
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let mut child = cmd
            .spawn()
            .map_err(|source| ProbeError::Spawn {
                tool: self.tool.clone(),
                source,
            })?;

        // Drain both pipes on their own threads so a chatty tool cannot
        // block on a full pipe while we wait for it.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        // On timeout the reader threads are left detached: a surviving
        // grandchild may still hold the pipes open.
        let status = self.wait(&mut child, file)?;
        let stdout = join_drain(stdout);
        let stderr = join_drain(stderr);

        let io_err = |source| ProbeError::Io {
            file: file.to_path_buf(),
            source,
        };
        let stdout = stdout.map_err(io_err)?;
        let stderr = stderr.map_err(io_err)?;

        if !status.success() {
            return Err(ProbeError::ToolFailed {
                file: file.to_path_buf(),
                status: status.to_string(),
                stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            });
        }

        Ok(stdout)
    }

    fn wait(&self, child: &mut Child, file: &Path) -> ProbeResult<ExitStatus> {
        let io_err = |source| ProbeError::Io {
            file: file.to_path_buf(),
            source,
        };

        let Some(timeout) = self.timeout else {
            return child.wait().map_err(io_err);
        };

        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = child.try_wait().map_err(io_err)? {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                warn!(file = %file.display(), "Metadata tool overran its deadline, killing it");
                kill_tree(child);
                // Reap the child so it does not linger as a zombie
                let _ = child.wait();
                return Err(ProbeError::Timeout {
                    file: file.to_path_buf(),
                    timeout,
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl MetadataProbe for ExifToolProbe {
    fn ensure_available(&self) -> ProbeResult<()> {
        if self.tool.is_file() {
            Ok(())
        } else {
            Err(ProbeError::ToolNotFound {
                path: self.tool.clone(),
            })
        }
    }

    fn extract(&self, path: &Path) -> ProbeResult<Metadata> {
        let stdout = self.run_tool(path)?;
        let text = String::from_utf8_lossy(&stdout);
        parse_tool_output(path, &text)
    }
}

/// Kill the tool and everything in its process group
fn kill_tree(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        let pgid = Pid::from_raw(child.id() as i32);
        match killpg(pgid, Signal::SIGKILL) {
            Ok(()) => {
                debug!(pgid = child.id(), "Killed metadata tool process group");
                return;
            }
            Err(e) => warn!(pgid = child.id(), error = %e, "Failed to kill process group, killing tool only"),
        }
    }

    if let Err(e) = child.kill() {
        warn!(error = %e, "Failed to kill metadata tool");
    }
}

fn resolve_tool(tool: &Path) -> ProbeResult<PathBuf> {
    let not_found = || ProbeError::ToolNotFound {
        path: tool.to_path_buf(),
    };

    if tool.is_file() {
        return Ok(tool.to_path_buf());
    }
    let is_bare_name = tool.parent().map_or(true, |p| p.as_os_str().is_empty());
    if is_bare_name && !tool.as_os_str().is_empty() {
        return which::which(tool).map_err(|_| not_found());
    }
    Err(not_found())
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<std::io::Result<Vec<u8>>>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            pipe.read_to_end(&mut buf)?;
            Ok(buf)
        })
    })
}

fn join_drain(handle: Option<JoinHandle<std::io::Result<Vec<u8>>>>) -> std::io::Result<Vec<u8>> {
    match handle {
        Some(handle) => handle
            .join()
            .unwrap_or_else(|_| Err(std::io::Error::other("pipe reader thread panicked"))),
        None => Ok(Vec::new()),
    }
}
