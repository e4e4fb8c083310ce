//! Line and token splitting for the DSL (`spec.md` §4.1).
//!
//! Config is one newline-delimited blob. Each non-empty, trimmed line is
//! split on single spaces, preserving exact token text — no collapsing of
//! repeated whitespace beyond the outer trim.

/// One non-empty, trimmed config line paired with its 1-based line number
/// (for error messages; blank lines are skipped but still counted so
/// reported line numbers match what an operator sees in their file).
pub struct Line<'a> {
    pub number: usize,
    pub tokens: Vec<&'a str>,
}

/// Split the full config blob into lines, trimming and dropping blanks.
pub fn split_lines(config: &str) -> Vec<Line<'_>> {
    config
        .split('\n')
        .enumerate()
        .filter_map(|(idx, raw)| {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(Line {
                    number: idx + 1,
                    tokens: split_tokens(trimmed),
                })
            }
        })
        .collect()
}

/// Split a single trimmed line on single-space characters.
fn split_tokens(line: &str) -> Vec<&str> {
    line.split(' ').filter(|t| !t.is_empty()).collect()
}
