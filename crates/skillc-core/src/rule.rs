use crate::error::ParseError;
use crate::types::Impact;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// SectionVocabulary
// ---------------------------------------------------------------------------

/// The fixed set of section names promoted from a rule body into
/// [`Rule::sections`]. Any other heading stays in the body only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionVocabulary {
    names: Vec<String>,
}

pub const INCORRECT: &str = "Incorrect";
pub const CORRECT: &str = "Correct";
pub const WHEN_NOT_TO_USE: &str = "When NOT to use";
pub const VERIFY_WITH: &str = "Verify with";

impl Default for SectionVocabulary {
    fn default() -> Self {
        Self::new([INCORRECT, CORRECT, WHEN_NOT_TO_USE, VERIFY_WITH])
    }
}

impl SectionVocabulary {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: Vec<String> = names.into_iter().map(Into::into).collect();
        // Longest first, so "Verify with shell" would win over "Verify".
        names.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        names.dedup();
        Self { names }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Map heading text such as `Incorrect (scans every document):` to its
    /// canonical vocabulary name.
    pub fn recognize(&self, heading: &str) -> Option<&str> {
        let heading = heading.trim();
        let lower = heading.to_lowercase();
        self.names.iter().map(String::as_str).find(|name| {
            let name_lower = name.to_lowercase();
            lower.starts_with(&name_lower)
                && matches!(
                    lower[name_lower.len()..].chars().next(),
                    None | Some(' ') | Some('(') | Some(':')
                )
        })
    }
}

// ---------------------------------------------------------------------------
// Rule
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub title: String,
    /// `None` when the frontmatter omits `impact` or names an unknown level.
    pub impact: Option<Impact>,
    pub tags: BTreeSet<String>,
    /// Frontmatter exactly as written, keys and values trimmed.
    pub frontmatter: BTreeMap<String, String>,
    /// Markdown after the closing frontmatter delimiter.
    pub body: String,
    pub sections: BTreeMap<String, String>,
    pub reference_urls: Vec<String>,
    pub file_name: String,
    /// Location relative to the corpus root; the file name until the loader
    /// places the rule.
    pub path: PathBuf,
}

impl Rule {
    /// Parse one rule file. Fails only on absent or malformed frontmatter;
    /// a rule without any recognized section is a valid parse.
    pub fn parse(
        file_name: &str,
        content: &str,
        vocabulary: &SectionVocabulary,
    ) -> Result<Rule, ParseError> {
        let (frontmatter, body) = split_frontmatter(content)?;

        let id = frontmatter
            .get("id")
            .filter(|v| !v.is_empty())
            .cloned()
            .unwrap_or_else(|| file_stem(file_name).to_string());
        let title = frontmatter.get("title").cloned().unwrap_or_default();
        let impact = frontmatter.get("impact").and_then(|v| v.parse().ok());
        let tags = frontmatter
            .get("tags")
            .map(|v| parse_tags(v))
            .unwrap_or_default();

        Ok(Rule {
            id,
            title,
            impact,
            tags,
            sections: extract_sections(body, vocabulary),
            reference_urls: extract_urls(body),
            body: body.to_string(),
            frontmatter,
            file_name: file_name.to_string(),
            path: PathBuf::from(file_name),
        })
    }

    pub fn section(&self, name: &str) -> Option<&str> {
        self.sections.get(name).map(String::as_str)
    }

    /// Leading `prefix-` segment of the id used for taxonomy lookups.
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.id == prefix
            || (self.id.starts_with(prefix) && self.id[prefix.len()..].starts_with('-'))
    }
}

fn file_stem(file_name: &str) -> &str {
    file_name.strip_suffix(".md").unwrap_or(file_name)
}

fn parse_tags(value: &str) -> BTreeSet<String> {
    let value = value.trim();
    let inner = value
        .strip_prefix('[')
        .and_then(|v| v.strip_suffix(']'))
        .unwrap_or(value);
    inner
        .split(',')
        .map(|t| t.trim().trim_matches(|c| c == '"' || c == '\''))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

// ---------------------------------------------------------------------------
// Frontmatter
// ---------------------------------------------------------------------------

static KEY_RE: OnceLock<Regex> = OnceLock::new();

fn key_re() -> &'static Regex {
    KEY_RE.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_-]*$").unwrap())
}

fn split_frontmatter(content: &str) -> Result<(BTreeMap<String, String>, &str), ParseError> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut offset = 0;
    let mut lines = content.split_inclusive('\n');

    match lines.next() {
        Some(first) if first.trim_end() == "---" => offset += first.len(),
        _ => return Err(ParseError::MissingFrontmatter),
    }

    let mut map = BTreeMap::new();
    for (idx, raw) in lines.enumerate() {
        offset += raw.len();
        let line = raw.trim_end();
        if line == "---" {
            return Ok((map, &content[offset..]));
        }
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let malformed = || ParseError::MalformedLine {
            line: idx + 2,
            text: trimmed.to_string(),
        };
        let (key, value) = trimmed.split_once(':').ok_or_else(malformed)?;
        let key = key.trim();
        if !key_re().is_match(key) {
            return Err(malformed());
        }
        if map.insert(key.to_string(), value.trim().to_string()).is_some() {
            return Err(ParseError::DuplicateKey(key.to_string()));
        }
    }

    Err(ParseError::UnterminatedFrontmatter)
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Tracks fenced code blocks so `# comment` lines inside shell or Python
/// examples are never taken for headings.
#[derive(Default)]
struct FenceState {
    open: Option<(char, usize)>,
}

impl FenceState {
    /// Returns true when `line` is a fence delimiter or sits inside a fence.
    fn consume(&mut self, line: &str) -> bool {
        let trimmed = line.trim_start();
        let marker = trimmed.chars().next().filter(|c| *c == '`' || *c == '~');
        let run = marker.map(|c| trimmed.chars().take_while(|x| *x == c).count());

        match (self.open, marker, run) {
            (Some((c, len)), Some(m), Some(n)) if m == c && n >= len => {
                self.open = None;
                true
            }
            (Some(_), _, _) => true,
            (None, Some(m), Some(n)) if n >= 3 => {
                self.open = Some((m, n));
                true
            }
            (None, _, _) => false,
        }
    }
}

/// Text of a heading line: an ATX heading (`## Correct`) or a line made of
/// a single bold run (`**Correct (uses the index):**`).
fn heading_text(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    let hashes = trimmed.chars().take_while(|c| *c == '#').count();
    if (1..=6).contains(&hashes) {
        let rest = &trimmed[hashes..];
        if rest.is_empty() || rest.starts_with(' ') {
            return Some(rest.trim().trim_end_matches('#').trim());
        }
        return None;
    }

    let inner = trimmed.strip_prefix("**")?;
    let close = inner.find("**")?;
    let tail = inner[close + 2..].trim();
    if close == 0 || !(tail.is_empty() || tail == ":") {
        return None;
    }
    Some(inner[..close].trim().trim_end_matches(':').trim())
}

fn extract_sections(body: &str, vocabulary: &SectionVocabulary) -> BTreeMap<String, String> {
    let mut sections: BTreeMap<String, String> = BTreeMap::new();
    let mut current: Option<(String, Vec<&str>)> = None;
    let mut fences = FenceState::default();

    let mut flush = |current: &mut Option<(String, Vec<&str>)>| {
        if let Some((name, lines)) = current.take() {
            let text = trim_blank_lines(&lines);
            sections
                .entry(name)
                .and_modify(|existing| {
                    existing.push_str("\n\n");
                    existing.push_str(&text);
                })
                .or_insert(text);
        }
    };

    for line in body.lines() {
        if !fences.consume(line) {
            if let Some(text) = heading_text(line) {
                flush(&mut current);
                if let Some(name) = vocabulary.recognize(text) {
                    current = Some((name.to_string(), Vec::new()));
                }
                continue;
            }
        }
        if let Some((_, lines)) = current.as_mut() {
            lines.push(line);
        }
    }
    flush(&mut current);
    sections
}

fn trim_blank_lines(lines: &[&str]) -> String {
    let start = lines.iter().position(|l| !l.trim().is_empty());
    let end = lines.iter().rposition(|l| !l.trim().is_empty());
    match (start, end) {
        (Some(s), Some(e)) => lines[s..=e].join("\n"),
        _ => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Reference URLs
// ---------------------------------------------------------------------------

static URL_RE: OnceLock<Regex> = OnceLock::new();
static CODE_SPAN_RE: OnceLock<Regex> = OnceLock::new();

fn url_re() -> &'static Regex {
    URL_RE.get_or_init(|| Regex::new(r#"https?://[^\s<>\[\]"'`]+"#).unwrap())
}

fn code_span_re() -> &'static Regex {
    CODE_SPAN_RE.get_or_init(|| Regex::new(r"`[^`]*`").unwrap())
}

/// Markdown link targets and bare URLs in order of first appearance.
/// Example code (fenced blocks and inline code spans) is not a reference.
fn extract_urls(body: &str) -> Vec<String> {
    let mut urls = Vec::new();
    let mut fences = FenceState::default();
    for line in body.lines() {
        if fences.consume(line) {
            continue;
        }
        let prose = code_span_re().replace_all(line, " ");
        for m in url_re().find_iter(&prose) {
            let url = trim_url_end(m.as_str());
            if url.len() > "https://".len() {
                urls.push(url.to_string());
            }
        }
    }
    urls
}

/// Strip trailing prose punctuation and any `)` that closes something outside
/// the URL, such as a markdown link target. Balanced parentheses stay.
fn trim_url_end(mut url: &str) -> &str {
    loop {
        let trimmed = url.trim_end_matches(['.', ',', ';', ':', '!', '?', '*', '_']);
        if trimmed.ends_with(')') && trimmed.matches(')').count() > trimmed.matches('(').count() {
            url = &trimmed[..trimmed.len() - 1];
        } else {
            return trimmed;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
