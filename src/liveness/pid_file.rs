use crate::error::{Error, Result};
use std::io;
use std::path::Path;

/// Read the PID stored in `path`.
///
/// Returns `Ok(None)` when the file does not exist. Surrounding whitespace is
/// ignored; anything other than a positive integer is an error.
pub fn read_pid_file(path: &Path) -> Result<Option<u32>> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(Error::PidFile {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
        }
    };
    parse_pid(&contents)
        .map(Some)
        .ok_or_else(|| Error::PidFile {
            path: path.to_path_buf(),
            reason: format!("'{}' is not a valid PID", contents.trim()),
        })
}

fn parse_pid(contents: &str) -> Option<u32> {
    contents.trim().parse::<u32>().ok().filter(|pid| *pid > 0)
}
