// Integration test utilities
//
// Benchmark stand-ins are small /bin/sh scripts that print the same
// `Memory Usage: <kb> Time: <elapsed>` line a measurement wrapper would.

#![allow(dead_code)]

use pairbench::orchestrator::RunSettings;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Write an executable shell script
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// A benchmark that prints the next time from `times` on each invocation
///
/// The invocation count is kept in `<script>.count` next to the script.
pub fn write_sequenced(dir: &Path, name: &str, memory_kb: u64, times: &[&str]) -> PathBuf {
    let body = format!(
        r#"f="$0.count"
n=$(cat "$f" 2>/dev/null || echo 0)
echo $((n + 1)) > "$f"
set -- {times}
shift $n
echo "result ok"
echo "Memory Usage: {memory_kb} Time: $1""#,
        times = times.join(" ")
    );
    write_script(dir, name, &body)
}

/// A benchmark that always reports the same measurement
pub fn write_steady(dir: &Path, name: &str, memory_kb: u64, time: &str) -> PathBuf {
    write_script(
        dir,
        name,
        &format!("echo \"Memory Usage: {memory_kb} Time: {time}\""),
    )
}

/// Original and instrumented builds of one case, both steady
pub fn write_pair(dir: &Path, name: &str, original: (u64, &str), instrumented: (u64, &str)) {
    write_steady(dir, name, original.0, original.1);
    write_steady(dir, &format!("{name}.inst"), instrumented.0, instrumented.1);
}

/// Settings without a measurement wrapper: the scripts print the line themselves
pub fn direct_settings(iterations: u32) -> RunSettings {
    RunSettings {
        iterations,
        timeout: Duration::from_secs(10),
        time_wrapper: Vec::new(),
        env: Vec::new(),
    }
}
