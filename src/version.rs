//! Maven version ordering.
//!
//! Versions are tokenized into alternating numeric and qualifier runs;
//! dashes (and digit/letter transitions) open nested sublists, dots separate
//! tokens at the same rank, and trailing null tokens are trimmed. Known
//! qualifiers rank `alpha < beta < milestone < rc < snapshot < "" < sp`;
//! anything else sorts after the known set, lexicographically.
//!
//! This module is the single source of truth for version ordering. Every
//! selection and arbitration decision in the crate goes through it.

use std::cmp::Ordering;
use std::fmt;

use regex::Regex;

use crate::error::Error;

/// Ranked qualifiers, weakest first. The empty qualifier is the release
/// marker: `1-alpha < 1 < 1-sp`.
const QUALIFIERS: [&str; 7] = ["alpha", "beta", "milestone", "rc", "snapshot", "", "sp"];

#[derive(Clone, Debug, PartialEq, Eq)]
enum Token {
    /// Digit run, normalized (no leading zeros, `"0"` for zero).
    Number(String),
    /// Letter run, canonicalized (aliases folded into the known qualifiers).
    Qualifier(String),
    /// Dash-opened nested run.
    Sublist(Vec<Token>),
}

#[derive(PartialEq, Eq, PartialOrd, Ord)]
enum QualifierRank<'a> {
    Known(usize),
    Unknown(&'a str),
}

fn qualifier_rank(qualifier: &str) -> QualifierRank<'_> {
    match QUALIFIERS.iter().position(|known| *known == qualifier) {
        Some(index) => QualifierRank::Known(index),
        None => QualifierRank::Unknown(qualifier),
    }
}

fn canonical_qualifier(raw: &str, followed_by_digit: bool) -> String {
    let expanded = if followed_by_digit {
        match raw {
            "a" => "alpha",
            "b" => "beta",
            "m" => "milestone",
            other => other,
        }
    } else {
        raw
    };
    match expanded {
        "ga" | "final" | "release" => "",
        "cr" => "rc",
        other => other,
    }
    .to_string()
}

fn normalize_digits(raw: &str) -> String {
    let trimmed = raw.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

fn parse_run(is_digit: bool, raw: &str) -> Token {
    if is_digit {
        Token::Number(normalize_digits(raw))
    } else {
        Token::Qualifier(canonical_qualifier(raw, false))
    }
}

fn push_token(stack: &mut Vec<Vec<Token>>, token: Token) {
    if let Some(list) = stack.last_mut() {
        list.push(token);
    }
}

fn is_null(token: &Token) -> bool {
    match token {
        Token::Number(digits) => digits == "0",
        Token::Qualifier(qualifier) => qualifier_rank(qualifier) == qualifier_rank(""),
        Token::Sublist(tokens) => tokens.is_empty(),
    }
}

/// Trim trailing null tokens, scanning past non-null sublists.
fn normalize(tokens: &mut Vec<Token>) {
    for index in (0..tokens.len()).rev() {
        if is_null(&tokens[index]) {
            tokens.remove(index);
        } else if !matches!(tokens[index], Token::Sublist(_)) {
            break;
        }
    }
}

fn parse(version: &str) -> Vec<Token> {
    let version = version.to_ascii_lowercase();
    let mut stack: Vec<Vec<Token>> = vec![Vec::new()];
    let mut start = 0;
    let mut in_digits = false;

    for (index, character) in version.char_indices() {
        match character {
            '.' => {
                if index == start {
                    push_token(&mut stack, Token::Number("0".to_string()));
                } else {
                    push_token(&mut stack, parse_run(in_digits, &version[start..index]));
                }
                start = index + 1;
            }
            '-' => {
                if index == start {
                    push_token(&mut stack, Token::Number("0".to_string()));
                } else {
                    push_token(&mut stack, parse_run(in_digits, &version[start..index]));
                }
                start = index + 1;
                stack.push(Vec::new());
            }
            c if c.is_ascii_digit() => {
                if !in_digits && index > start {
                    // Letter run directly followed by a digit: "alpha1".
                    let qualifier = canonical_qualifier(&version[start..index], true);
                    push_token(&mut stack, Token::Qualifier(qualifier));
                    start = index;
                    stack.push(Vec::new());
                }
                in_digits = true;
            }
            _ => {
                if in_digits && index > start {
                    push_token(&mut stack, parse_run(true, &version[start..index]));
                    start = index;
                    stack.push(Vec::new());
                }
                in_digits = false;
            }
        }
    }
    if version.len() > start {
        push_token(&mut stack, parse_run(in_digits, &version[start..]));
    }

    // Collapse the sublist stack innermost-first so each parent sees its
    // child fully normalized before its own trailing-null trim.
    while let Some(mut child) = stack.pop() {
        normalize(&mut child);
        match stack.last_mut() {
            Some(parent) => parent.push(Token::Sublist(child)),
            None => return child,
        }
    }
    Vec::new()
}

fn compare_to_empty(token: &Token) -> Ordering {
    match token {
        Token::Number(digits) => {
            if digits == "0" {
                Ordering::Equal
            } else {
                Ordering::Greater
            }
        }
        Token::Qualifier(qualifier) => qualifier_rank(qualifier).cmp(&qualifier_rank("")),
        Token::Sublist(tokens) => {
            for token in tokens {
                let result = compare_to_empty(token);
                if result != Ordering::Equal {
                    return result;
                }
            }
            Ordering::Equal
        }
    }
}

fn compare_numbers(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn compare_tokens(a: Option<&Token>, b: Option<&Token>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (Some(token), None) => compare_to_empty(token),
        (None, Some(token)) => compare_to_empty(token).reverse(),
        (Some(left), Some(right)) => match (left, right) {
            (Token::Number(a), Token::Number(b)) => compare_numbers(a, b),
            (Token::Number(_), _) => Ordering::Greater,
            (_, Token::Number(_)) => Ordering::Less,
            (Token::Qualifier(a), Token::Qualifier(b)) => {
                qualifier_rank(a).cmp(&qualifier_rank(b))
            }
            (Token::Qualifier(_), Token::Sublist(_)) => Ordering::Less,
            (Token::Sublist(_), Token::Qualifier(_)) => Ordering::Greater,
            (Token::Sublist(a), Token::Sublist(b)) => compare_lists(a, b),
        },
    }
}

fn compare_lists(a: &[Token], b: &[Token]) -> Ordering {
    for index in 0..a.len().max(b.len()) {
        let result = compare_tokens(a.get(index), b.get(index));
        if result != Ordering::Equal {
            return result;
        }
    }
    Ordering::Equal
}

/// A version string with its parsed comparison structure.
///
/// Equality follows the ordering, not the raw text: `1.0` == `1.0.0`.
#[derive(Clone, Eq)]
pub struct MavenVersion {
    raw: String,
    tokens: Vec<Token>,
}

impl MavenVersion {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let tokens = parse(&raw);
        Self { raw, tokens }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl Ord for MavenVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_lists(&self.tokens, &other.tokens)
    }
}

impl PartialOrd for MavenVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for MavenVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl fmt::Debug for MavenVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MavenVersion({:?})", self.raw)
    }
}

impl fmt::Display for MavenVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Compare two version strings under the Maven order.
pub fn compare(a: &str, b: &str) -> Ordering {
    compare_lists(&parse(a), &parse(b))
}

/// Greatest element of `candidates` under the Maven order.
pub fn latest_of<'a, I>(candidates: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    candidates.into_iter().max_by(|a, b| compare(a, b))
}

/// A version pattern, matched in full against candidate versions.
///
/// The raw pattern is kept for serialization; matching is anchored, so
/// `1\..*` matches `1.2.3` but not `11.2.3`.
#[derive(Clone, Debug)]
pub struct VersionPattern {
    raw: String,
    regex: Regex,
}

impl VersionPattern {
    pub fn new(raw: impl Into<String>) -> crate::Result<Self> {
        let raw = raw.into();
        let regex = Regex::new(&format!("^(?:{raw})$")).map_err(|e| Error::InvalidChannel {
            reason: format!("invalid version pattern `{raw}`: {e}"),
        })?;
        Ok(Self { raw, regex })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, version: &str) -> bool {
        self.regex.is_match(version)
    }
}

impl PartialEq for VersionPattern {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for VersionPattern {}

impl Ord for VersionPattern {
    fn cmp(&self, other: &Self) -> Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl PartialOrd for VersionPattern {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for VersionPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}
