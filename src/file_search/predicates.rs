use chrono::{DateTime, Utc};
use globset::{GlobBuilder, GlobMatcher};
use regex::{Regex, RegexBuilder};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use super::error::FilterError;
use super::types::ScanRequest;

/// Metadata of one candidate file, as seen by the predicates.
#[derive(Debug, Clone, Copy)]
pub struct FileMeta<'a> {
    pub path: &'a Path,
    pub name: &'a str,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

/// Lazily opens a file's content. Only the keyword predicate reads it.
pub trait ContentAccessor {
    fn open(&self) -> io::Result<Box<dyn BufRead + '_>>;
}

pub struct FsContent<'a> {
    path: &'a Path,
}

impl<'a> FsContent<'a> {
    pub fn new(path: &'a Path) -> Self {
        FsContent { path }
    }
}

impl ContentAccessor for FsContent<'_> {
    fn open(&self) -> io::Result<Box<dyn BufRead + '_>> {
        let file = File::open(self.path)?;
        Ok(Box::new(BufReader::new(file)))
    }
}

/// A pure test over one file. Two evaluations on an unchanged file agree.
pub trait Predicate: Send + Sync {
    fn matches(&self, meta: &FileMeta<'_>, content: &dyn ContentAccessor) -> bool;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SizeRange {
    pub min: Option<u64>,
    pub max: Option<u64>,
}

impl SizeRange {
    pub fn new(min: Option<u64>, max: Option<u64>) -> Self {
        SizeRange { min, max }
    }

    pub fn at_least(min: u64) -> Self {
        SizeRange::new(Some(min), None)
    }

    pub fn at_most(max: u64) -> Self {
        SizeRange::new(None, Some(max))
    }

    pub fn is_unbounded(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    pub fn validate(&self) -> Result<(), FilterError> {
        match (self.min, self.max) {
            (Some(min), Some(max)) if min > max => Err(FilterError::SizeRangeInverted { min, max }),
            _ => Ok(()),
        }
    }

    pub fn contains(&self, size: u64) -> bool {
        self.min.map_or(true, |min| size >= min) && self.max.map_or(true, |max| size <= max)
    }
}

impl Predicate for SizeRange {
    fn matches(&self, meta: &FileMeta<'_>, _content: &dyn ContentAccessor) -> bool {
        self.contains(meta.size)
    }
}

/// Inclusive modification-time window, compared in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        DateRange { start, end }
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    pub fn validate(&self) -> Result<(), FilterError> {
        match (self.start, self.end) {
            (Some(start), Some(end)) if start > end => Err(FilterError::DateRangeInverted {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            }),
            _ => Ok(()),
        }
    }

    pub fn contains(&self, modified: Option<DateTime<Utc>>) -> bool {
        if self.is_unbounded() {
            return true;
        }
        let Some(modified) = modified else {
            return false;
        };
        let millis = modified.timestamp_millis();
        self.start.map_or(true, |s| millis >= s.timestamp_millis())
            && self.end.map_or(true, |e| millis <= e.timestamp_millis())
    }
}

impl Predicate for DateRange {
    fn matches(&self, meta: &FileMeta<'_>, _content: &dyn ContentAccessor) -> bool {
        self.contains(meta.modified)
    }
}

/// Case-insensitive full match against a file's base name.
#[derive(Debug, Clone)]
pub struct NamePattern {
    source: String,
    matcher: NameMatcher,
}

#[derive(Debug, Clone)]
enum NameMatcher {
    Regex(Regex),
    /// `*`, `?`, `[0-9]` classes and `{a,b}` alternatives.
    Glob(GlobMatcher),
}

impl NamePattern {
    pub fn from_regex(source: &str) -> Result<Self, FilterError> {
        let regex = RegexBuilder::new(&format!("^(?:{})$", source))
            .case_insensitive(true)
            .build()
            .map_err(|e| FilterError::InvalidPattern {
                pattern: source.to_string(),
                reason: e.to_string(),
            })?;
        Ok(NamePattern {
            source: source.to_string(),
            matcher: NameMatcher::Regex(regex),
        })
    }

    pub fn from_glob(glob: &str) -> Result<Self, FilterError> {
        let compiled = GlobBuilder::new(glob)
            .case_insensitive(true)
            .literal_separator(true)
            .build()
            .map_err(|e| FilterError::InvalidPattern {
                pattern: glob.to_string(),
                reason: e.to_string(),
            })?;
        Ok(NamePattern {
            source: glob.to_string(),
            matcher: NameMatcher::Glob(compiled.compile_matcher()),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// True for a glob that can only match its own text.
    pub fn is_literal_glob(&self) -> bool {
        matches!(self.matcher, NameMatcher::Glob(_))
            && !self
                .source
                .contains(|c: char| matches!(c, '*' | '?' | '[' | '{'))
    }

    pub fn is_match(&self, name: &str) -> bool {
        match &self.matcher {
            NameMatcher::Regex(regex) => regex.is_match(name),
            NameMatcher::Glob(glob) => glob.is_match(name),
        }
    }
}

impl Predicate for NamePattern {
    fn matches(&self, meta: &FileMeta<'_>, _content: &dyn ContentAccessor) -> bool {
        self.is_match(meta.name)
    }
}

/// Every keyword must appear in the file name or, failing that, within the
/// first `line_cap` lines of the content.
#[derive(Debug, Clone)]
pub struct KeywordFilter {
    keywords: Vec<String>,
    line_cap: usize,
}

impl KeywordFilter {
    pub fn new(keywords: &[String], line_cap: usize) -> Self {
        KeywordFilter {
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
            line_cap,
        }
    }

    fn content_contains_all(&self, content: &dyn ContentAccessor, missing: &[&str]) -> bool {
        let mut reader = match content.open() {
            Ok(reader) => reader,
            Err(_) => return false,
        };
        let mut pending: Vec<&str> = missing.to_vec();
        let mut buf = Vec::new();
        for _ in 0..self.line_cap {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {}
                Err(_) => return false,
            }
            let line = String::from_utf8_lossy(&buf).to_lowercase();
            pending.retain(|kw| !line.contains(kw));
            if pending.is_empty() {
                return true;
            }
        }
        false
    }
}

impl Predicate for KeywordFilter {
    fn matches(&self, meta: &FileMeta<'_>, content: &dyn ContentAccessor) -> bool {
        let name = meta.name.to_lowercase();
        let missing: Vec<&str> = self
            .keywords
            .iter()
            .map(String::as_str)
            .filter(|kw| !name.contains(kw))
            .collect();
        if missing.is_empty() {
            return true;
        }
        self.content_contains_all(content, &missing)
    }
}

/// Logical AND of the configured predicates, cheapest first.
#[derive(Default)]
pub struct PredicateSet {
    predicates: Vec<Box<dyn Predicate>>,
}

impl PredicateSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_request(request: &ScanRequest, line_cap: usize) -> Self {
        let mut set = PredicateSet::new();
        if !request.size.is_unbounded() {
            set.push(request.size);
        }
        if !request.modified.is_unbounded() {
            set.push(request.modified);
        }
        if let Some(pattern) = &request.name_pattern {
            set.push(pattern.clone());
        }
        if !request.keywords.is_empty() {
            set.push(KeywordFilter::new(&request.keywords, line_cap));
        }
        set
    }

    pub fn push<P: Predicate + 'static>(&mut self, predicate: P) {
        self.predicates.push(Box::new(predicate));
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    /// No filters at all: every walked file matches.
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn matches(&self, meta: &FileMeta<'_>, content: &dyn ContentAccessor) -> bool {
        self.predicates.iter().all(|p| p.matches(meta, content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_wildcards_match_the_whole_name() {
        let txt = NamePattern::from_glob("*.txt").unwrap();
        assert!(txt.is_match("notes.txt"));
        assert!(txt.is_match("NOTES.TXT"));
        assert!(!txt.is_match("notes.txt.bak"));
        let single = NamePattern::from_glob("file?.bin").unwrap();
        assert!(single.is_match("file1.bin"));
        assert!(!single.is_match("file12.bin"));
    }

    #[test]
    fn glob_classes_and_alternatives() {
        let class = NamePattern::from_glob("file[0-9].bin").unwrap();
        assert!(class.is_match("file1.bin"));
        assert!(!class.is_match("fileA.bin"));
        let either = NamePattern::from_glob("*.{txt,log}").unwrap();
        assert!(either.is_match("a.txt"));
        assert!(either.is_match("b.LOG"));
        assert!(!either.is_match("c.csv"));
    }

    #[test]
    fn glob_punctuation_is_literal() {
        let pattern = NamePattern::from_glob("report (1)+.doc").unwrap();
        assert!(pattern.is_match("report (1)+.doc"));
        assert!(!pattern.is_match("report 1.doc"));
        assert!(!NamePattern::from_glob("a.b").unwrap().is_match("axb"));
    }

    #[test]
    fn unclosed_glob_class_is_rejected() {
        assert!(matches!(
            NamePattern::from_glob("file[0-9"),
            Err(FilterError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn literal_glob_detection() {
        assert!(NamePattern::from_glob("southside.zip").unwrap().is_literal_glob());
        assert!(!NamePattern::from_glob("*southside*").unwrap().is_literal_glob());
        assert!(!NamePattern::from_glob("v{1,2}.zip").unwrap().is_literal_glob());
        assert!(!NamePattern::from_regex("southside").unwrap().is_literal_glob());
    }

    #[test]
    fn empty_set_matches_everything() {
        let set = PredicateSet::new();
        assert!(set.is_empty());
        let meta = FileMeta {
            path: Path::new("/tmp/x"),
            name: "x",
            size: 1,
            modified: None,
        };
        assert!(set.matches(&meta, &FsContent::new(meta.path)));
    }
}
