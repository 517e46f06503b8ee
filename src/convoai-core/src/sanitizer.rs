//! Filler-language sanitization for stored conversational memory.
//!
//! Replies are narrated as generated, but what goes into a participant's
//! history is first run through [`sanitize`] so that verbal tics do not
//! snowball from one turn to the next.

use regex::{Captures, Regex};
use std::sync::LazyLock;

/// A single case-insensitive replacement rule.
#[derive(Debug, Clone, Copy)]
pub struct FillerRule {
    /// Pattern, matched case-insensitively.
    pub pattern: &'static str,
    /// Text substituted for each match.
    pub replacement: &'static str,
    /// Matches immediately followed by this context are left untouched.
    pub unless_followed_by: Option<&'static str>,
}

impl FillerRule {
    pub const fn new(pattern: &'static str, replacement: &'static str) -> Self {
        Self {
            pattern,
            replacement,
            unless_followed_by: None,
        }
    }

    /// Spare matches that are followed by `context`, without consuming it.
    pub const fn unless_followed_by(self, context: &'static str) -> Self {
        Self {
            unless_followed_by: Some(context),
            ..self
        }
    }
}

/// Replacement rules, applied in order.
pub const FILLER_RULES: &[FillerRule] = &[
    FillerRule::new(r"\b(okay|ok),?\s+so\b", ""),
    FillerRule::new(r"\bhonestly,?\s*", ""),
    FillerRule::new(r"\bseriously,?\s*", ""),
    FillerRule::new(r"\bkinda\b", "somewhat"),
    FillerRule::new(r"\bliterally\b", ""),
    FillerRule::new(r"\bpretty\b", "").unless_followed_by(r"\s+\w+\s+(good|bad|important)"),
    FillerRule::new(r"\breally\b", ""),
    FillerRule::new(r"\bactually\b", ""),
    FillerRule::new(r"\byou know\??\s*", ""),
    FillerRule::new(r",?\s*right\?", "."),
    FillerRule::new(r",?\s*isn't it\?", "."),
    FillerRule::new(r",?\s*don't you think\?", "."),
    FillerRule::new(r"\bI think\b", ""),
    FillerRule::new(r"\bprobably\b", ""),
];

struct CompiledRule {
    re: Regex,
    /// Anchored at the end of each match.
    guard: Option<Regex>,
    replacement: &'static str,
}

impl CompiledRule {
    fn compile(rule: &FillerRule) -> Option<Self> {
        let re = Regex::new(&format!("(?i){}", rule.pattern)).ok()?;
        let guard = match rule.unless_followed_by {
            Some(context) => Some(Regex::new(&format!("(?i)^(?:{context})")).ok()?),
            None => None,
        };

        Some(Self {
            re,
            guard,
            replacement: rule.replacement,
        })
    }

    fn apply(&self, text: &str) -> String {
        self.re
            .replace_all(text, |caps: &Captures| {
                let spared = match (&self.guard, caps.get(0)) {
                    (Some(guard), Some(m)) => guard.is_match(&text[m.end()..]),
                    _ => false,
                };
                if spared {
                    caps[0].to_string()
                } else {
                    self.replacement.to_string()
                }
            })
            .into_owned()
    }
}

static COMPILED_RULES: LazyLock<Vec<CompiledRule>> =
    LazyLock::new(|| FILLER_RULES.iter().filter_map(CompiledRule::compile).collect());

/// Whitespace tidy-up run after the filler rules.
const SPACING_PATTERNS: &[(&str, &str)] = &[(r"\s+", " "), (r"\s+([.,!?])", "$1")];

/// Stray punctuation left at the start once leading filler is gone.
const LEADING_STRAY_PATTERNS: &[(&str, &str)] = &[(r"^\s*[,.]", "")];

fn compile_patterns(patterns: &[(&str, &'static str)]) -> Vec<(Regex, &'static str)> {
    patterns
        .iter()
        .filter_map(|&(pattern, replacement)| Regex::new(pattern).ok().map(|re| (re, replacement)))
        .collect()
}

static SPACING: LazyLock<Vec<(Regex, &'static str)>> =
    LazyLock::new(|| compile_patterns(SPACING_PATTERNS));

static LEADING_STRAY: LazyLock<Vec<(Regex, &'static str)>> =
    LazyLock::new(|| compile_patterns(LEADING_STRAY_PATTERNS));

/// Strip filler language and tidy punctuation and capitalization.
pub fn sanitize(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let mut result = text.to_string();
    for rule in COMPILED_RULES.iter() {
        result = rule.apply(&result);
    }

    for (re, replacement) in SPACING.iter() {
        result = re.replace_all(&result, *replacement).into_owned();
    }
    result = collapse_repeated_punctuation(&result);
    for (re, replacement) in LEADING_STRAY.iter() {
        result = re.replace(&result, *replacement).into_owned();
    }

    capitalize_first_letter(result.trim())
}

/// Collapse runs of the same punctuation mark (`"!!"`, `"..."`) to one.
fn collapse_repeated_punctuation(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev = None;
    for c in text.chars() {
        if matches!(c, '.' | ',' | '!' | '?') && prev == Some(c) {
            continue;
        }
        out.push(c);
        prev = Some(c);
    }
    out
}

fn capitalize_first_letter(text: &str) -> String {
    match text.char_indices().find(|(_, c)| c.is_alphabetic()) {
        Some((idx, c)) if c.is_lowercase() => {
            let mut out = String::with_capacity(text.len());
            out.push_str(&text[..idx]);
            out.extend(c.to_uppercase());
            out.push_str(&text[idx + c.len_utf8()..]);
            out
        }
        _ => text.to_string(),
    }
}
