//! Flag-file and flag-list syntax.
//!
//! A flag file is plain text, one item per line:
//!
//! ```text
//! # comment
//! --verbose
//! --port=8080
//! server*  backup-server
//! --threads=16
//! ```
//!
//! Flag lines before the first program-name line apply to every program.
//! A line of whitespace-separated glob patterns limits the flag lines that
//! follow it to programs whose invocation name matches one of the patterns.

use std::fs;
use std::path::Path;

use globset::GlobBuilder;

use crate::{FlagError, report_fatal};

/// One meaningful line of a flag file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlagfileLine<'a> {
    /// A line starting with `-`, kept verbatim.
    Flag(&'a str),
    /// A list of program-name glob patterns.
    ProgramNames(&'a str),
}

/// Splits flag-file contents into lines, dropping blanks and comments.
///
/// Lines end at `\r` or `\n`; leading whitespace is ignored.
pub fn flagfile_lines(contents: &str) -> impl Iterator<Item = FlagfileLine<'_>> {
    contents
        .split(['\r', '\n'])
        .map(str::trim_start)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            if line.starts_with('-') {
                FlagfileLine::Flag(line)
            } else {
                FlagfileLine::ProgramNames(line)
            }
        })
}

/// Tracks which flag lines of a file apply to the running program.
#[derive(Debug)]
pub struct SectionTracker<'a> {
    invocation_name: &'a str,
    short_name: &'a str,
    relevant: bool,
    in_names: bool,
}

impl<'a> SectionTracker<'a> {
    pub fn new(invocation_name: &'a str, short_name: &'a str) -> Self {
        Self {
            invocation_name,
            short_name,
            relevant: true,
            in_names: false,
        }
    }

    /// Feeds one line and returns whether it is a flag line to apply.
    pub fn accept(&mut self, line: FlagfileLine<'_>) -> bool {
        match line {
            FlagfileLine::Flag(_) => {
                self.in_names = false;
                self.relevant
            }
            FlagfileLine::ProgramNames(patterns) => {
                if !self.in_names {
                    self.in_names = true;
                    self.relevant = false;
                }
                if !self.relevant {
                    self.relevant = patterns
                        .split_whitespace()
                        .any(|pattern| self.matches(pattern));
                }
                false
            }
        }
    }

    fn matches(&self, pattern: &str) -> bool {
        if pattern == self.invocation_name || pattern == self.short_name {
            return true;
        }
        match GlobBuilder::new(pattern).literal_separator(true).build() {
            Ok(glob) => {
                let matcher = glob.compile_matcher();
                matcher.is_match(self.invocation_name) || matcher.is_match(self.short_name)
            }
            Err(error) => {
                tracing::debug!(pattern, %error, "ignoring malformed program-name pattern");
                false
            }
        }
    }
}

/// Splits a comma-separated flag list.
///
/// An empty input is an empty list and a single trailing comma is ignored.
/// Other empty entries and entries starting with `-` are errors.
pub fn try_parse_flag_list(value: &str) -> Result<Vec<String>, FlagError> {
    if value.is_empty() {
        return Ok(Vec::new());
    }
    let value = match value.strip_suffix(',') {
        Some(rest) if !rest.is_empty() => rest,
        _ => value,
    };
    value
        .split(',')
        .map(|entry| {
            if entry.is_empty() {
                Err(FlagError::EmptyFlagListEntry)
            } else if entry.starts_with('-') {
                Err(FlagError::FlagListEntryStartsWithDash {
                    entry: entry.to_string(),
                })
            } else {
                Ok(entry.to_string())
            }
        })
        .collect()
}

/// Like [`try_parse_flag_list`], but a malformed list is fatal.
pub fn parse_flag_list(value: &str) -> Vec<String> {
    try_parse_flag_list(value).unwrap_or_else(|error| report_fatal(error))
}

/// Reads a whole flag file. A read failure is fatal.
pub fn read_flagfile(path: impl AsRef<Path>) -> String {
    let path = path.as_ref();
    match fs::read(path) {
        Ok(bytes) => {
            tracing::debug!(path = %path.display(), bytes = bytes.len(), "read flag file");
            String::from_utf8_lossy(&bytes).into_owned()
        }
        Err(source) => report_fatal(FlagError::FlagfileRead {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn applied<'a>(contents: &'a str, invocation: &str, short: &str) -> Vec<&'a str> {
        let mut tracker = SectionTracker::new(invocation, short);
        flagfile_lines(contents)
            .filter_map(|line| {
                let apply = tracker.accept(line);
                match line {
                    FlagfileLine::Flag(text) if apply => Some(text),
                    _ => None,
                }
            })
            .collect()
    }

    #[test]
    fn test_lines_classified() {
        let contents = "# comment\n\n   --a=1\r\n\tserver*  other\n-b\n";
        let lines: Vec<_> = flagfile_lines(contents).collect();
        assert_eq!(
            lines,
            [
                FlagfileLine::Flag("--a=1"),
                FlagfileLine::ProgramNames("server*  other"),
                FlagfileLine::Flag("-b"),
            ]
        );
    }

    #[test]
    fn test_sections_follow_program_name() {
        let contents = "--all\nserver*\n--server_only\nclient\n--client_only\n";
        assert_eq!(
            applied(contents, "/usr/bin/server-main", "server-main"),
            ["--all", "--server_only"]
        );
        assert_eq!(applied(contents, "./client", "client"), ["--all", "--client_only"]);
        assert_eq!(applied(contents, "tool", "tool"), ["--all"]);
    }

    #[test]
    fn test_consecutive_name_lines_combine() {
        let contents = "alpha\nbeta\n--shared\ngamma\n--gamma_only\n";
        assert_eq!(applied(contents, "beta", "beta"), ["--shared"]);
        assert_eq!(applied(contents, "alpha", "alpha"), ["--shared"]);
        assert_eq!(applied(contents, "gamma", "gamma"), ["--gamma_only"]);
    }

    #[test]
    fn test_glob_does_not_cross_separator() {
        let contents = "*server\n--hit\n";
        assert_eq!(applied(contents, "/opt/server", "server"), ["--hit"]);
        let tracker = SectionTracker::new("/opt/server", "/opt/server");
        assert!(!tracker.matches("*server"));
        assert!(tracker.matches("/opt/*"));
    }

    #[test]
    fn test_flag_list() {
        assert!(try_parse_flag_list("").unwrap().is_empty());
        assert_eq!(try_parse_flag_list("a,b.txt").unwrap(), ["a", "b.txt"]);
        assert!(matches!(
            try_parse_flag_list("a,,b"),
            Err(FlagError::EmptyFlagListEntry)
        ));
        assert_eq!(try_parse_flag_list("a,").unwrap(), ["a"]);
        assert!(matches!(
            try_parse_flag_list("a,,"),
            Err(FlagError::EmptyFlagListEntry)
        ));
        assert!(matches!(
            try_parse_flag_list(",a"),
            Err(FlagError::EmptyFlagListEntry)
        ));
        assert!(matches!(
            try_parse_flag_list(","),
            Err(FlagError::EmptyFlagListEntry)
        ));
        assert!(matches!(
            try_parse_flag_list("a,-b"),
            Err(FlagError::FlagListEntryStartsWithDash { .. })
        ));
    }
}
