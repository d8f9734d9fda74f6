//! Recording path resolution from qualified names

use std::path::{Path, PathBuf};

/// Default directory recordings are stored under
pub const DEFAULT_RECORDING_DIR: &str = "recordings";

/// Compute the recording path for a qualified name
///
/// Closure-scope qualifiers (`{{closure}}` segments) and everything before
/// the last of them are stripped; the remaining segments join with `.`. No
/// file suffix is applied, the codec adds its own.
#[must_use]
pub fn recording_path(directory: impl AsRef<Path>, qualname: &str) -> PathBuf {
    directory.as_ref().join(scrubbed_qualname(qualname))
}

/// Recording path derived from the current thread's name
///
/// The test harness names each test thread with the test's full path, which
/// makes it a stable per-test recording identifier.
#[must_use]
pub fn test_recording_path(directory: impl AsRef<Path>) -> PathBuf {
    let thread = std::thread::current();
    recording_path(directory, thread.name().unwrap_or("unnamed"))
}

fn scrubbed_qualname(qualname: &str) -> String {
    let segments: Vec<&str> = qualname.split("::").collect();
    let start = segments
        .iter()
        .rposition(|segment| *segment == "{{closure}}")
        .map_or(0, |index| index + 1);

    let kept: Vec<&str> = segments[start..]
        .iter()
        .copied()
        .filter(|segment| !segment.is_empty())
        .collect();

    if kept.is_empty() {
        // A qualname ending in a closure qualifier: fall back to whatever
        // named segments exist.
        segments
            .iter()
            .copied()
            .filter(|segment| *segment != "{{closure}}" && !segment.is_empty())
            .collect::<Vec<&str>>()
            .join(".")
    } else {
        kept.join(".")
    }
}
