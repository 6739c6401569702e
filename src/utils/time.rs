//! Clock and naming helpers
//!
//! Wall-clock stamps for log lines, elapsed-time markers and collision-free
//! recording file names.

use chrono::Local;
use std::path::Path;
use std::time::Duration;

/// Wall-clock time as `HH:MM:SS`
pub fn hms_now() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

/// Wall-clock stamp for file names, `YYYY-MM-DD_HH-MM-SS`
pub fn file_timestamp_now() -> String {
    Local::now().format("%Y-%m-%d_%H-%M-%S").to_string()
}

/// Format an elapsed duration as `+MM:SS`, or `+HH:MM:SS` past one hour
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    let (minutes, seconds) = (total / 60, total % 60);
    if minutes >= 60 {
        format!("+{:02}:{:02}:{:02}", minutes / 60, minutes % 60, seconds)
    } else {
        format!("+{:02}:{:02}", minutes, seconds)
    }
}

/// Replace characters that are not allowed in file names
pub fn safe_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '\\' | '/' | '*' | '?' | ':' | '"' | '<' | '>' | '|' => '_',
            other => other,
        })
        .collect()
}

/// Pick a base name that does not collide with an existing file
///
/// Tries `template` first, then `template_001`, `template_002`, ...
pub fn unique_base_name(dir: &Path, template: &str, extension: &str) -> String {
    let mut candidate = template.to_string();
    let mut counter = 0u32;

    while dir.join(format!("{}.{}", candidate, extension)).exists() {
        counter += 1;
        candidate = format!("{}_{:03}", template, counter);
    }

    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_format_elapsed_minutes() {
        assert_eq!(format_elapsed(Duration::ZERO), "+00:00");
        assert_eq!(format_elapsed(Duration::from_secs(30)), "+00:30");
        assert_eq!(format_elapsed(Duration::from_millis(90_900)), "+01:30");
        assert_eq!(format_elapsed(Duration::from_secs(59 * 60 + 59)), "+59:59");
    }

    #[test]
    fn test_format_elapsed_hours() {
        assert_eq!(format_elapsed(Duration::from_secs(3600)), "+01:00:00");
        assert_eq!(format_elapsed(Duration::from_secs(3 * 3600 + 61)), "+03:01:01");
    }

    #[test]
    fn test_hms_shape() {
        let hms = hms_now();
        assert_eq!(hms.len(), 8);
        assert_eq!(hms.matches(':').count(), 2);
    }

    #[test]
    fn test_safe_filename() {
        assert_eq!(safe_filename("P3 Din Gata"), "P3 Din Gata");
        assert_eq!(safe_filename("a/b:c*d?"), "a_b_c_d_");
    }

    #[test]
    fn test_unique_base_name_appends_counter() {
        let dir = tempdir().unwrap();
        assert_eq!(unique_base_name(dir.path(), "TapeDeck_P3", "aac"), "TapeDeck_P3");

        fs::write(dir.path().join("TapeDeck_P3.aac"), b"x").unwrap();
        assert_eq!(unique_base_name(dir.path(), "TapeDeck_P3", "aac"), "TapeDeck_P3_001");

        fs::write(dir.path().join("TapeDeck_P3_001.aac"), b"x").unwrap();
        assert_eq!(unique_base_name(dir.path(), "TapeDeck_P3", "aac"), "TapeDeck_P3_002");

        // A different extension does not collide
        assert_eq!(unique_base_name(dir.path(), "TapeDeck_P3", "mp3"), "TapeDeck_P3");
    }
}
