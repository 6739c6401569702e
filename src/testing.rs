//! Scripted doubles for the engine and the transcoder
//!
//! Both fakes share their state through an `Arc` so a test can keep a
//! handle after moving the fake into a supervisor.

use crate::engine::{PlayerState, StreamEngine, TrackMetadata};
use crate::recorder::process::{LaunchedTranscoder, TranscoderLauncher, TranscoderProcess};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::AsyncRead;

// =============================================================================
// Engine
// =============================================================================

#[derive(Debug)]
pub struct FakeEngineState {
    pub state: PlayerState,
    pub metadata: TrackMetadata,
    pub volume: i32,
    pub muted: bool,
    pub plays: Vec<(String, Vec<String>)>,
    pub stops: usize,
}

/// Engine whose state is set by the test
#[derive(Clone)]
pub struct FakeEngine {
    inner: Arc<Mutex<FakeEngineState>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeEngineState {
                state: PlayerState::NothingSpecial,
                metadata: TrackMetadata::unknown(),
                volume: 80,
                muted: false,
                plays: Vec::new(),
                stops: 0,
            })),
        }
    }

    pub fn set_state(&self, state: PlayerState) {
        self.inner.lock().state = state;
    }

    pub fn set_metadata(&self, artist: &str, title: &str) {
        self.inner.lock().metadata = TrackMetadata::new(artist, title);
    }

    pub fn set_audio(&self, volume: i32, muted: bool) {
        let mut inner = self.inner.lock();
        inner.volume = volume;
        inner.muted = muted;
    }

    pub fn audio(&self) -> (i32, bool) {
        let inner = self.inner.lock();
        (inner.volume, inner.muted)
    }

    pub fn plays(&self) -> Vec<(String, Vec<String>)> {
        self.inner.lock().plays.clone()
    }

    pub fn play_count(&self) -> usize {
        self.inner.lock().plays.len()
    }

    pub fn stop_count(&self) -> usize {
        self.inner.lock().stops
    }
}

impl StreamEngine for FakeEngine {
    fn play(&mut self, url: &str, options: &[String]) {
        let mut inner = self.inner.lock();
        inner.plays.push((url.to_string(), options.to_vec()));
        inner.state = PlayerState::Opening;
    }

    fn stop(&mut self) {
        let mut inner = self.inner.lock();
        inner.stops += 1;
        inner.state = PlayerState::Stopped;
    }

    fn is_playing(&self) -> bool {
        self.inner.lock().state == PlayerState::Playing
    }

    fn poll_state(&mut self) -> PlayerState {
        self.inner.lock().state
    }

    fn poll_metadata(&mut self) -> TrackMetadata {
        self.inner.lock().metadata.clone()
    }

    fn volume(&self) -> i32 {
        self.inner.lock().volume
    }

    fn set_volume(&mut self, volume: i32) {
        self.inner.lock().volume = volume;
    }

    fn is_muted(&self) -> bool {
        self.inner.lock().muted
    }

    fn set_muted(&mut self, muted: bool) {
        self.inner.lock().muted = muted;
    }
}

// =============================================================================
// Transcoder
// =============================================================================

/// How a fake process reacts to the shutdown ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBehavior {
    ExitOnQuit,
    ExitOnTerminate,
    NeedsKill,
}

/// Script for one launched process
#[derive(Debug, Clone)]
pub struct FakeScript {
    pub behavior: StopBehavior,
    pub stderr: Vec<String>,
}

impl Default for FakeScript {
    fn default() -> Self {
        Self {
            behavior: StopBehavior::ExitOnQuit,
            stderr: Vec::new(),
        }
    }
}

/// Observation and control over one launched fake process
#[derive(Debug, Clone, Default)]
pub struct FakeProcessControl {
    pub exited: Arc<AtomicBool>,
    pub quit_requested: Arc<AtomicBool>,
    pub terminated: Arc<AtomicBool>,
    pub killed: Arc<AtomicBool>,
}

impl FakeProcessControl {
    /// Make the process die on its own
    pub fn crash(&self) {
        self.exited.store(true, Ordering::SeqCst);
    }

    pub fn has_exited(&self) -> bool {
        self.exited.load(Ordering::SeqCst)
    }

    pub fn was_killed(&self) -> bool {
        self.killed.load(Ordering::SeqCst)
    }

    pub fn was_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    pub fn was_asked_to_quit(&self) -> bool {
        self.quit_requested.load(Ordering::SeqCst)
    }
}

struct FakeProcess {
    behavior: StopBehavior,
    control: FakeProcessControl,
}

#[async_trait]
impl TranscoderProcess for FakeProcess {
    fn id(&self) -> Option<u32> {
        Some(4242)
    }

    fn has_exited(&mut self) -> bool {
        self.control.has_exited()
    }

    async fn request_quit(&mut self) -> io::Result<()> {
        if self.control.has_exited() {
            return Err(io::Error::from(io::ErrorKind::BrokenPipe));
        }
        self.control.quit_requested.store(true, Ordering::SeqCst);
        if self.behavior == StopBehavior::ExitOnQuit {
            self.control.exited.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    fn terminate(&mut self) -> io::Result<()> {
        self.control.terminated.store(true, Ordering::SeqCst);
        if self.behavior != StopBehavior::NeedsKill {
            self.control.exited.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    fn kill(&mut self) -> io::Result<()> {
        self.control.killed.store(true, Ordering::SeqCst);
        self.control.exited.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn wait(&mut self) -> io::Result<()> {
        if self.control.has_exited() {
            return Ok(());
        }
        std::future::pending::<()>().await;
        Ok(())
    }
}

#[derive(Default)]
struct LauncherState {
    scripts: VecDeque<FakeScript>,
    launches: Vec<(PathBuf, Vec<String>)>,
    controls: Vec<FakeProcessControl>,
    fail_spawn: bool,
}

/// Launcher that hands out scripted fake processes
#[derive(Clone, Default)]
pub struct FakeLauncher {
    inner: Arc<Mutex<LauncherState>>,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a script for the next launch; unscripted launches use the default
    pub fn push_script(&self, script: FakeScript) {
        self.inner.lock().scripts.push_back(script);
    }

    pub fn fail_spawn(&self, fail: bool) {
        self.inner.lock().fail_spawn = fail;
    }

    pub fn launches(&self) -> Vec<(PathBuf, Vec<String>)> {
        self.inner.lock().launches.clone()
    }

    pub fn launch_count(&self) -> usize {
        self.inner.lock().launches.len()
    }

    pub fn control(&self, index: usize) -> FakeProcessControl {
        self.inner.lock().controls[index].clone()
    }

    pub fn last_control(&self) -> FakeProcessControl {
        let inner = self.inner.lock();
        inner.controls[inner.controls.len() - 1].clone()
    }
}

impl TranscoderLauncher for FakeLauncher {
    fn launch(&self, program: &Path, args: &[String]) -> io::Result<LaunchedTranscoder> {
        let mut inner = self.inner.lock();
        if inner.fail_spawn {
            return Err(io::Error::from(io::ErrorKind::PermissionDenied));
        }

        let script = inner.scripts.pop_front().unwrap_or_default();
        let control = FakeProcessControl::default();
        inner.launches.push((program.to_path_buf(), args.to_vec()));
        inner.controls.push(control.clone());

        let stderr: Vec<u8> = script
            .stderr
            .iter()
            .flat_map(|line| format!("{}\n", line).into_bytes())
            .collect();
        let stderr: Box<dyn AsyncRead + Send + Unpin> = Box::new(io::Cursor::new(stderr));

        Ok(LaunchedTranscoder {
            process: Box::new(FakeProcess {
                behavior: script.behavior,
                control,
            }),
            stderr: Some(stderr),
        })
    }
}

/// Create an executable-looking file to satisfy transcoder discovery
pub fn fake_transcoder_binary(dir: &Path) -> PathBuf {
    let path = dir.join(if cfg!(windows) { "ffmpeg.exe" } else { "ffmpeg" });
    std::fs::write(&path, b"#!/bin/sh\n").unwrap();
    path
}
