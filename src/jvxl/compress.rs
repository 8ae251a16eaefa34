//! Run-length compression of encoded character strings.
//!
//! ```text
//! cccccc  ->  c~5␠      the character, then how many more follow
//! ~       ->  ~~
//! ```
//!
//! Runs shorter than four, and runs of `~`, space or tab, are written out.
//! Line breaks are dropped, so a compressed string may be wrapped freely.

use crate::error::{Result, SurfaceError};

const MIN_RUN: usize = 4;

fn is_line_break(c: char) -> bool {
    c == '\n' || c == '\r'
}

/// Run-length compresses `data`, dropping every `\n` and `\r`.
///
/// `decompress(compress(s))` gives back `s` only when `s` is a single line;
/// multi-line input comes back with its line breaks removed.
pub fn compress(data: &str) -> String {
    let mut out = String::with_capacity(data.len());
    let mut chars = data.chars().filter(|&c| !is_line_break(c)).peekable();
    while let Some(c) = chars.next() {
        if c == '~' {
            out.push_str("~~");
            continue;
        }
        let mut run = 1;
        while chars.peek() == Some(&c) {
            chars.next();
            run += 1;
        }
        if run >= MIN_RUN && c != ' ' && c != '\t' {
            out.push(c);
            out.push('~');
            out.push_str(&(run - 1).to_string());
            out.push(' ');
        } else {
            out.extend(std::iter::repeat_n(c, run));
        }
    }
    out
}

/// Inverse of [`compress`].
///
/// Fails on a `~` that neither escapes another `~` nor starts a repeat
/// count, or on a count with nothing before it to repeat.
pub fn decompress(data: &str) -> Result<String> {
    let malformed = |reason: &str| SurfaceError::data(0, reason);
    let mut out = String::with_capacity(data.len());
    let mut previous = None;
    let mut chars = data.chars().filter(|&c| !is_line_break(c)).peekable();
    while let Some(c) = chars.next() {
        if c != '~' {
            out.push(c);
            previous = Some(c);
            continue;
        }
        if chars.peek() == Some(&'~') {
            chars.next();
            out.push('~');
            previous = Some('~');
            continue;
        }
        let mut digits = String::new();
        while let Some(d) = chars.next_if(char::is_ascii_digit) {
            digits.push(d);
        }
        let count: usize = digits
            .parse()
            .map_err(|_| malformed("'~' is not followed by a repeat count"))?;
        chars.next_if_eq(&' ');
        let repeated = previous.ok_or_else(|| malformed("repeat count with nothing to repeat"))?;
        out.extend(std::iter::repeat_n(repeated, count));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_runs_collapse() {
        assert_eq!(compress("aaaaaab"), "a~5 b");
        assert_eq!(compress("aaab"), "aaab");
        assert_eq!(decompress("a~5 b").unwrap(), "aaaaaab");
    }

    #[test]
    fn tildes_are_escaped() {
        assert_eq!(compress("~~~~~"), "~~~~~~~~~~");
        assert_eq!(decompress("~~~~~~~~~~").unwrap(), "~~~~~");
        assert_eq!(compress("a~"), "a~~");
    }

    #[test]
    fn whitespace_runs_stay_literal() {
        assert_eq!(compress("x     y"), "x     y");
        assert_eq!(decompress("x     y").unwrap(), "x     y");
    }

    #[test]
    fn digits_after_a_run_survive() {
        let s = "5555555 12";
        assert_eq!(decompress(&compress(s)).unwrap(), s);
    }

    #[test]
    fn line_breaks_are_ignored() {
        assert_eq!(compress("ab\ncd\r\n"), "abcd");
        assert_eq!(decompress(&compress("aaaa\naaaa\n~")).unwrap(), "aaaaaaaa~");
        assert_eq!(decompress("a~3\n b").unwrap(), "aaaab");
    }

    #[test]
    fn malformed_counts_fail() {
        assert!(decompress("a~x").is_err());
        assert!(decompress("~5 ").is_err());
    }
}
