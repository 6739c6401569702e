//! Transcoder process contract
//!
//! Launching, signalling and reaping the transcoder, plus the bounded ring
//! that keeps its most recent stderr lines.

use crate::config::recording::STDERR_RING_CAPACITY;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::task::JoinHandle;

/// Markers that make a stderr line worth shouting about
const ERROR_MARKERS: [&str; 3] = ["Error", "failed", "403"];

/// A running transcoder
#[async_trait]
pub trait TranscoderProcess: Send {
    /// OS process id, while known
    fn id(&self) -> Option<u32>;

    /// Non-blocking check whether the process has exited
    fn has_exited(&mut self) -> bool;

    /// Ask the transcoder to finish its output and quit
    async fn request_quit(&mut self) -> io::Result<()>;

    /// Send a terminate signal
    fn terminate(&mut self) -> io::Result<()>;

    /// Kill the process outright
    fn kill(&mut self) -> io::Result<()>;

    /// Wait for the process to exit
    async fn wait(&mut self) -> io::Result<()>;
}

/// A freshly launched transcoder and its stderr stream
pub struct LaunchedTranscoder {
    pub process: Box<dyn TranscoderProcess>,
    pub stderr: Option<Box<dyn AsyncRead + Send + Unpin>>,
}

/// Spawns transcoder processes
pub trait TranscoderLauncher: Send + Sync {
    fn launch(&self, program: &Path, args: &[String]) -> io::Result<LaunchedTranscoder>;
}

/// Launches real OS processes
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLauncher;

impl TranscoderLauncher for SystemLauncher {
    fn launch(&self, program: &Path, args: &[String]) -> io::Result<LaunchedTranscoder> {
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(windows)]
        {
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            command.creation_flags(CREATE_NO_WINDOW);
        }

        let mut child = command.spawn()?;
        let stdin = child.stdin.take();
        let stderr = child
            .stderr
            .take()
            .map(|s| Box::new(s) as Box<dyn AsyncRead + Send + Unpin>);

        tracing::debug!("Spawned transcoder pid {:?}", child.id());

        Ok(LaunchedTranscoder {
            process: Box::new(ChildTranscoder { child, stdin }),
            stderr,
        })
    }
}

/// A transcoder running as a child process
struct ChildTranscoder {
    child: Child,
    stdin: Option<ChildStdin>,
}

#[async_trait]
impl TranscoderProcess for ChildTranscoder {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    fn has_exited(&mut self) -> bool {
        match self.child.try_wait() {
            Ok(Some(_)) => true,
            Ok(None) => false,
            Err(e) => {
                tracing::warn!("Transcoder status query failed: {}", e);
                true
            }
        }
    }

    async fn request_quit(&mut self) -> io::Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "stdin already closed"))?;
        stdin.write_all(b"q\n").await?;
        stdin.flush().await
    }

    #[cfg(unix)]
    fn terminate(&mut self) -> io::Result<()> {
        let Some(pid) = self.child.id() else {
            // Already reaped
            return Ok(());
        };
        let pid = libc::pid_t::try_from(pid)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
        // SAFETY: plain signal delivery to our own child's pid.
        let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
        if rc == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    #[cfg(not(unix))]
    fn terminate(&mut self) -> io::Result<()> {
        self.child.start_kill()
    }

    fn kill(&mut self) -> io::Result<()> {
        self.child.start_kill()
    }

    async fn wait(&mut self) -> io::Result<()> {
        self.child.wait().await.map(|_| ())
    }
}

/// Bounded FIFO of the most recent stderr lines
///
/// Cloning shares the buffer, so the drain task and the supervisor see
/// the same lines.
#[derive(Debug, Clone)]
pub struct StderrRing {
    lines: Arc<Mutex<VecDeque<String>>>,
    capacity: usize,
}

impl Default for StderrRing {
    fn default() -> Self {
        Self::new(STDERR_RING_CAPACITY)
    }
}

impl StderrRing {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    /// Append a line, dropping the oldest when full
    pub fn push(&self, line: String) {
        let mut lines = self.lines.lock();
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    /// The last `n` lines, oldest first
    pub fn tail(&self, n: usize) -> Vec<String> {
        let lines = self.lines.lock();
        let skip = lines.len().saturating_sub(n);
        lines.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Drain a transcoder's stderr into `ring` until the stream closes
///
/// Lines carrying error markers are logged as errors right away.
pub fn spawn_stderr_drain(
    stderr: Box<dyn AsyncRead + Send + Unpin>,
    ring: StderrRing,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut reader = BufReader::new(stderr);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf).trim().to_string();
                    if line.is_empty() {
                        continue;
                    }
                    if ERROR_MARKERS.iter().any(|m| line.contains(m)) {
                        tracing::error!("FFMPEG ERROR: {}", line);
                    }
                    ring.push(line);
                }
                Err(e) => {
                    tracing::debug!("Transcoder stderr closed: {}", e);
                    break;
                }
            }
        }
    })
}
