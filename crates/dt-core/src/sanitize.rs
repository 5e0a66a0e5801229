use crate::directive::{bare_advance_re, fenced_re};
use regex::Regex;
use std::sync::OnceLock;

static LABEL_RES: OnceLock<Vec<Regex>> = OnceLock::new();

/// Section labels coaches print around the machine-readable part of a reply.
fn label_res() -> &'static [Regex] {
    LABEL_RES.get_or_init(|| {
        [
            r"(?i)💾\s*\*\*.*?JSON\s*action.*?\*\*[：:]*\s*\n*",
            r"(?i)🗣\x{FE0F}?\s*\*\*.*?(?:對話內容|conversation).*?\*\*[：:]*\s*\n*",
            r"\*\*第[一二]部分[：:]\s*.*?\*\*\s*\n*",
            r"(?i)\*\*Part\s+(?:one|two|1|2)[：:]\s*.*?\*\*\s*\n*",
            r"(?m)^[ \t]*💾[ \t]*$\n?",
            r"(?m)^[ \t]*🗣\x{FE0F}?[ \t]*$\n?",
        ]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
    })
}

fn strip_once(raw: &str) -> String {
    let mut out = fenced_re().replace_all(raw, "").into_owned();
    out = bare_advance_re().replace_all(&out, "").into_owned();
    for re in label_res() {
        out = re.replace_all(&out, "").into_owned();
    }
    out.trim().to_string()
}

/// The user-visible part of a coach reply.
///
/// Passes repeat until nothing changes, so removing one fragment can never
/// expose another that survives.
pub fn strip_directives(raw: &str) -> String {
    let mut current = strip_once(raw);
    loop {
        let next = strip_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}
