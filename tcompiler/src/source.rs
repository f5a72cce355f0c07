/// One line of TCode as written and as the classifier sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceLine {
    /// 0-based line index.
    pub index: usize,
    pub raw: String,
    /// Comment-stripped, trimmed, lower-cased outside of `'...'` literals.
    pub code: String,
}

pub fn split_lines(source: &str) -> Vec<SourceLine> {
    source
        .split('\n')
        .enumerate()
        .map(|(index, raw)| {
            let raw = raw.trim_end_matches('\r');
            SourceLine {
                index,
                raw: raw.to_string(),
                code: normalize(strip_comment(raw)),
            }
        })
        .collect()
}

fn strip_comment(line: &str) -> &str {
    let mut quoted = false;
    for (i, ch) in line.char_indices() {
        match ch {
            '\'' => quoted = !quoted,
            ';' if !quoted => return &line[..i],
            _ => {}
        }
    }
    line
}

fn normalize(line: &str) -> String {
    let mut quoted = false;
    line.trim()
        .chars()
        .map(|ch| {
            if ch == '\'' {
                quoted = !quoted;
                ch
            } else if quoted {
                ch
            } else {
                ch.to_ascii_lowercase()
            }
        })
        .collect()
}
