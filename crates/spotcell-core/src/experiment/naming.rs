use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::DEFAULT_ENDING_PATTERN;

/// Join key derived from an image file name. Never used as identity.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExperimentName(String);

impl ExperimentName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExperimentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// File-name ending that identifies a channel image.
///
/// Literal text, except `#` which matches one ASCII digit and `?` which
/// matches any single character. `_w#` matches `_w1`, `_w2`, ...
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndingPattern(String);

impl EndingPattern {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self(pattern.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Byte length of the match starting at the beginning of `s`, if any.
    fn match_len(&self, s: &str) -> Option<usize> {
        let mut chars = s.char_indices();
        let mut consumed = 0;
        for p in self.0.chars() {
            let (offset, c) = chars.next()?;
            let ok = match p {
                '#' => c.is_ascii_digit(),
                '?' => true,
                _ => c == p,
            };
            if !ok {
                return None;
            }
            consumed = offset + c.len_utf8();
        }
        Some(consumed)
    }

    /// Byte offset of the right-most match inside `s`.
    pub fn rfind(&self, s: &str) -> Option<usize> {
        if self.0.is_empty() {
            return Some(s.len());
        }
        s.char_indices()
            .map(|(i, _)| i)
            .rev()
            .find(|&i| self.match_len(&s[i..]).is_some())
    }

    /// Byte range `(start, end)` of the right-most match inside the stem of
    /// `file_name`.
    pub fn span(&self, file_name: &str) -> Option<(usize, usize)> {
        let stem = file_stem(file_name);
        let start = self.rfind(stem)?;
        let len = self.match_len(&stem[start..]).unwrap_or(0);
        Some((start, start + len))
    }

    /// Whether the file name (extension excluded) contains this ending.
    pub fn matches(&self, file_name: &str) -> bool {
        self.rfind(file_stem(file_name)).is_some()
    }

    /// Experiment name of `file_name`: the stem up to the right-most match.
    pub fn strip(&self, file_name: &str) -> Option<ExperimentName> {
        let stem = file_stem(file_name);
        self.rfind(stem).map(|pos| ExperimentName::new(&stem[..pos]))
    }
}

impl Default for EndingPattern {
    fn default() -> Self {
        Self::new(DEFAULT_ENDING_PATTERN)
    }
}

impl fmt::Display for EndingPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn file_stem(file_name: &str) -> &str {
    Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digit_wildcard() {
        let p = EndingPattern::new("_w#");
        assert_eq!(p.strip("A_w1.tif").unwrap().as_str(), "A");
        assert_eq!(p.strip("plate3_B02_w4.TIF").unwrap().as_str(), "plate3_B02");
        assert!(p.strip("A_wx.tif").is_none());
    }

    #[test]
    fn test_rightmost_match_wins() {
        let p = EndingPattern::new("_w#");
        assert_eq!(p.strip("run_w2_A_w1.tif").unwrap().as_str(), "run_w2_A");
    }

    #[test]
    fn test_span_covers_the_match() {
        assert_eq!(EndingPattern::new("_w1").span("A_w10.tif"), Some((1, 4)));
        assert_eq!(EndingPattern::new("_w10").span("A_w10.tif"), Some((1, 5)));
        assert_eq!(EndingPattern::new("_w2").span("A_w10.tif"), None);
    }

    #[test]
    fn test_literal_ending_with_trailing_text() {
        let p = EndingPattern::new("-DAPI");
        assert_eq!(p.strip("well1-DAPI-stack.tif").unwrap().as_str(), "well1");
    }

    #[test]
    fn test_directory_is_ignored() {
        let p = EndingPattern::new("_c?");
        assert_eq!(p.strip("data_c1/img_c2.tif").unwrap().as_str(), "img");
    }
}
