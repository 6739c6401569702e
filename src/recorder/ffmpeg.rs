//! FFmpeg discovery and command line
//!
//! Resolves the transcoder executable through an ordered set of strategies
//! and builds the argument vector for a recording job.

use crate::config::network::USER_AGENT;
use crate::config::recording::REENCODE_BITRATE;
use crate::config::url_matches_any;
use crate::utils::RecorderError;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

#[cfg(windows)]
const EXECUTABLE_NAME: &str = "ffmpeg.exe";
#[cfg(not(windows))]
const EXECUTABLE_NAME: &str = "ffmpeg";

/// Where the transcoder executable was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryStrategy {
    /// Absolute configured path
    Configured,
    /// Configured path relative to the application root
    RelativeToRoot,
    /// Found on the system `PATH`
    SystemPath,
    /// Portable copy under `<root>/bin`
    Bundled,
}

/// A resolved transcoder executable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTranscoder {
    pub path: PathBuf,
    pub strategy: DiscoveryStrategy,
}

/// Locates the transcoder executable
#[derive(Debug, Clone)]
pub struct TranscoderLocator {
    configured: String,
    app_root: PathBuf,
    search_path: Option<OsString>,
}

impl TranscoderLocator {
    pub fn new(configured: impl Into<String>, app_root: impl Into<PathBuf>) -> Self {
        Self {
            configured: configured.into(),
            app_root: app_root.into(),
            search_path: std::env::var_os("PATH"),
        }
    }

    /// Override the directories searched by the `PATH` strategy
    pub fn with_search_path(mut self, search_path: Option<OsString>) -> Self {
        self.search_path = search_path;
        self
    }

    /// Location of the portable fallback binary
    pub fn bundled_path(&self) -> PathBuf {
        self.app_root.join("bin").join(EXECUTABLE_NAME)
    }

    /// Resolve the executable, trying each strategy in order
    pub fn resolve(&self) -> Result<ResolvedTranscoder, RecorderError> {
        let configured = self.configured.trim();
        let command = if configured.is_empty() { "ffmpeg" } else { configured };
        let command_path = Path::new(command);

        if command_path.is_absolute() && command_path.is_file() {
            return Ok(self.found(command_path.to_path_buf(), DiscoveryStrategy::Configured));
        }

        if !command_path.is_absolute() {
            let relative = self.app_root.join(command_path);
            if relative.is_file() {
                return Ok(self.found(relative, DiscoveryStrategy::RelativeToRoot));
            }
        }

        if let Some(found) = self.search_system_path(command) {
            return Ok(self.found(found, DiscoveryStrategy::SystemPath));
        }

        let bundled = self.bundled_path();
        if bundled.is_file() {
            return Ok(self.found(bundled, DiscoveryStrategy::Bundled));
        }

        tracing::error!("FFmpeg not found (configured: {:?})", command);
        tracing::info!(
            "Hint: place {} in {:?} or set ffmpeg_path in settings",
            EXECUTABLE_NAME,
            self.bundled_path().parent().unwrap_or(&self.app_root)
        );
        Err(RecorderError::NotFound(command.to_string()))
    }

    fn found(&self, path: PathBuf, strategy: DiscoveryStrategy) -> ResolvedTranscoder {
        tracing::info!("FFmpeg resolved via {:?}: {:?}", strategy, path);
        ResolvedTranscoder { path, strategy }
    }

    fn search_system_path(&self, command: &str) -> Option<PathBuf> {
        // Only bare names are looked up on PATH
        if Path::new(command).components().count() != 1 {
            return None;
        }
        let search_path = self.search_path.as_ref()?;

        let mut names = vec![command.to_string()];
        if cfg!(windows) && Path::new(command).extension().is_none() {
            names.push(format!("{}.exe", command));
        }

        std::env::split_paths(search_path).find_map(|dir| {
            names
                .iter()
                .map(|name| dir.join(name))
                .find(|candidate| candidate.is_file())
        })
    }
}

/// Everything that shapes one transcoder invocation
#[derive(Debug, Clone)]
pub struct TranscodeJob<'a> {
    pub url: &'a str,
    pub output_path: &'a Path,
    pub stream_copy: bool,
    pub low_latency: bool,
}

/// Decide the effective copy mode for a source
///
/// Sources matching a force-reencode marker never use passthrough copy.
pub fn effective_stream_copy(url: &str, prefer_stream_copy: bool, markers: &[String]) -> bool {
    if prefer_stream_copy && url_matches_any(url, markers) {
        tracing::debug!("Provider marker matched, forcing re-encode for {}", url);
        return false;
    }
    prefer_stream_copy
}

/// Muxer for a container extension, when FFmpeg cannot infer it
fn muxer_for(output_path: &Path) -> Option<&'static str> {
    let ext = output_path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "aac" => Some("adts"),
        "mp3" => Some("mp3"),
        "ts" => Some("mpegts"),
        "mka" => Some("matroska"),
        _ => None,
    }
}

/// Build the FFmpeg argument list for a job
///
/// Per-input options precede `-i`; FFmpeg ignores them afterwards.
pub fn build_args(job: &TranscodeJob<'_>) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-y".into(),
        "-hide_banner".into(),
        "-loglevel".into(),
        "warning".into(),
    ];

    if job.low_latency {
        args.extend(["-fflags", "nobuffer", "-flags", "low_delay"].map(String::from));
    }

    args.extend(
        [
            "-user_agent",
            USER_AGENT,
            "-reconnect",
            "1",
            "-reconnect_streamed",
            "1",
            "-reconnect_delay_max",
            "2",
            "-rw_timeout",
            "15000000",
        ]
        .map(String::from),
    );

    args.extend(["-i".to_string(), job.url.to_string(), "-vn".to_string()]);

    if job.stream_copy {
        args.extend(["-c:a", "copy"].map(String::from));
    } else {
        args.extend(["-c:a", "aac", "-b:a", REENCODE_BITRATE].map(String::from));
    }

    if let Some(muxer) = muxer_for(job.output_path) {
        args.extend(["-f".to_string(), muxer.to_string()]);
    }

    args.push(job.output_path.to_string_lossy().into_owned());
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fake_transcoder_binary;
    use std::fs;
    use tempfile::tempdir;

    fn position(args: &[String], value: &str) -> usize {
        args.iter().position(|a| a == value).unwrap()
    }

    fn job<'a>(url: &'a str, output: &'a Path, stream_copy: bool) -> TranscodeJob<'a> {
        TranscodeJob {
            url,
            output_path: output,
            stream_copy,
            low_latency: true,
        }
    }

    #[test]
    fn test_user_agent_precedes_input() {
        let output = PathBuf::from("out.aac");
        let args = build_args(&job("http://example.org/live", &output, true));

        assert!(position(&args, "-user_agent") < position(&args, "-i"));
        assert!(position(&args, "-reconnect") < position(&args, "-i"));
        assert!(position(&args, "low_delay") < position(&args, "-i"));
        assert_eq!(args[position(&args, "-i") + 1], "http://example.org/live");
        assert!(args.contains(&"-vn".to_string()));
    }

    #[test]
    fn test_copy_and_reencode_codecs() {
        let output = PathBuf::from("out.aac");
        let copy = build_args(&job("http://a", &output, true));
        assert_eq!(copy[position(&copy, "-c:a") + 1], "copy");
        assert!(!copy.contains(&"-b:a".to_string()));

        let reencode = build_args(&job("http://a", &output, false));
        assert_eq!(reencode[position(&reencode, "-c:a") + 1], "aac");
        assert_eq!(reencode[position(&reencode, "-b:a") + 1], "192k");
    }

    #[test]
    fn test_muxer_and_output_last() {
        let output = PathBuf::from("dir/out.aac");
        let args = build_args(&job("http://a", &output, true));
        assert_eq!(args[position(&args, "-f") + 1], "adts");
        assert_eq!(args.last().unwrap(), &output.to_string_lossy().into_owned());

        let unknown = PathBuf::from("out.opus");
        let args = build_args(&job("http://a", &unknown, true));
        assert!(!args.contains(&"-f".to_string()));
    }

    #[test]
    fn test_normal_latency_omits_flags() {
        let output = PathBuf::from("out.aac");
        let mut j = job("http://a", &output, true);
        j.low_latency = false;
        let args = build_args(&j);
        assert!(!args.contains(&"low_delay".to_string()));
        assert!(!args.contains(&"nobuffer".to_string()));
    }

    #[test]
    fn test_marker_forces_reencode() {
        let markers = vec!["sharp-stream.com".to_string()];
        assert!(!effective_stream_copy(
            "http://edge.sharp-stream.com/absolute.aac",
            true,
            &markers
        ));
        assert!(effective_stream_copy("http://example.org/live", true, &markers));
        assert!(!effective_stream_copy("http://example.org/live", false, &markers));
    }

    #[test]
    fn test_resolve_absolute_configured() {
        let dir = tempdir().unwrap();
        let binary = fake_transcoder_binary(dir.path());
        let locator = TranscoderLocator::new(binary.to_string_lossy(), "/nonexistent")
            .with_search_path(None);

        let resolved = locator.resolve().unwrap();
        assert_eq!(resolved.strategy, DiscoveryStrategy::Configured);
        assert_eq!(resolved.path, binary);
    }

    #[test]
    fn test_resolve_relative_to_root() {
        let root = tempdir().unwrap();
        fs::create_dir(root.path().join("tools")).unwrap();
        let binary = fake_transcoder_binary(&root.path().join("tools"));
        let relative = binary.strip_prefix(root.path()).unwrap().to_string_lossy().into_owned();

        let locator = TranscoderLocator::new(relative, root.path()).with_search_path(None);
        let resolved = locator.resolve().unwrap();
        assert_eq!(resolved.strategy, DiscoveryStrategy::RelativeToRoot);
        assert_eq!(resolved.path, binary);
    }

    #[test]
    fn test_resolve_on_search_path() {
        let root = tempdir().unwrap();
        let path_dir = tempdir().unwrap();
        let binary = fake_transcoder_binary(path_dir.path());

        let locator = TranscoderLocator::new("ffmpeg", root.path())
            .with_search_path(Some(path_dir.path().as_os_str().to_os_string()));
        let resolved = locator.resolve().unwrap();
        assert_eq!(resolved.strategy, DiscoveryStrategy::SystemPath);
        assert_eq!(resolved.path, binary);
    }

    #[test]
    fn test_resolve_bundled_fallback() {
        let root = tempdir().unwrap();
        fs::create_dir(root.path().join("bin")).unwrap();
        let binary = fake_transcoder_binary(&root.path().join("bin"));

        let locator = TranscoderLocator::new("missing-ffmpeg", root.path()).with_search_path(None);
        let resolved = locator.resolve().unwrap();
        assert_eq!(resolved.strategy, DiscoveryStrategy::Bundled);
        assert_eq!(resolved.path, binary);
    }

    #[test]
    fn test_resolve_not_found() {
        let root = tempdir().unwrap();
        let locator = TranscoderLocator::new("ffmpeg", root.path()).with_search_path(None);
        let err = locator.resolve().unwrap_err();
        assert!(matches!(err, RecorderError::NotFound(_)));
        assert_eq!(err.status_text(), "FFMPEG ERROR: not found");
    }
}
