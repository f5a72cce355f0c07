//! `include path` expansion for the command line driver.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;

/// Reads `path`, replacing every `include <file>` line with that file's
/// expanded contents. Paths are relative to the including file and each
/// file is pulled in at most once.
pub fn expand(path: &Path) -> io::Result<String> {
    let mut seen = HashSet::new();
    let mut output = String::new();
    expand_into(path, &mut seen, &mut output)?;
    Ok(output)
}

fn expand_into(path: &Path, seen: &mut HashSet<PathBuf>, output: &mut String) -> io::Result<()> {
    if !seen.insert(fs::canonicalize(path)?) {
        debug!("{} already included", path.display());
        return Ok(());
    }

    let source = fs::read_to_string(path)?;
    let directory = path.parent().unwrap_or_else(|| Path::new("."));
    for line in source.lines() {
        match include_target(line) {
            Some(target) => {
                debug!("including {} from {}", target, path.display());
                expand_into(&directory.join(target), seen, output)?;
            }
            None => {
                output.push_str(line);
                output.push('\n');
            }
        }
    }
    Ok(())
}

/// The path named by an `include` line, with optional quotes removed.
fn include_target(line: &str) -> Option<&str> {
    let code = line.split(';').next().unwrap_or_default().trim();
    let (keyword, rest) = code.split_once(char::is_whitespace)?;
    if !keyword.eq_ignore_ascii_case("include") {
        return None;
    }
    let target = rest.trim().trim_matches('"');
    (!target.is_empty()).then_some(target)
}
