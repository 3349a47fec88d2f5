//! Append-only operation log, `var/log/zypp/history` (spec §6.1, §4.7).

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

use zypp_core::Timestamp;

/// One line appended per registry mutation: `timestamp|op|alias|detail`,
/// matching the pipe-delimited convention of zypp's package history log.
pub fn append(path: &Path, now: Timestamp, op: &str, alias: &str, detail: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{now}|{op}|{alias}|{detail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_one_line_per_call() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history");
        append(&path, 1, "add", "factory", "").unwrap();
        append(&path, 2, "remove", "factory", "").unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.lines().next().unwrap().starts_with("1|add|factory|"));
    }
}
