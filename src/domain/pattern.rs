//! # Interaction Patterns
//!
//! Custom ids are matched either literally or by a regular expression. Features that
//! declare a namespace get every pattern rewritten so two features cannot collide on
//! the same id.

use regex::Regex;
use std::fmt;

/// A literal custom id or a compiled matching rule.
#[derive(Clone)]
pub enum InteractionPattern {
    Literal(String),
    Rule(Regex),
}

impl InteractionPattern {
    pub fn literal(id: impl Into<String>) -> Self {
        Self::Literal(id.into())
    }

    /// Compile a matching rule.
    ///
    /// Under a namespace only a leading `^`, optionally after an inline flag group such
    /// as `(?i)`, is recognised as the start anchor. Anchors further in stay in the body.
    pub fn rule(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Self::Rule)
    }

    /// Map key: the literal text or the rule's source.
    pub fn key(&self) -> &str {
        match self {
            Self::Literal(id) => id,
            Self::Rule(re) => re.as_str(),
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Self::Literal(_))
    }

    pub fn matches(&self, custom_id: &str) -> bool {
        match self {
            Self::Literal(id) => id == custom_id,
            Self::Rule(re) => re.is_match(custom_id),
        }
    }

    /// Rewrite the pattern under a namespace.
    ///
    /// Literals become `prefix + id`. Rules lose their leading `^`, and a new anchored
    /// rule `^` + escaped prefix + original body is compiled, so a rule only matches ids
    /// carrying the namespace while keeping its own sub-matching.
    pub fn with_prefix(&self, prefix: &str) -> Result<Self, regex::Error> {
        match self {
            Self::Literal(id) => Ok(Self::Literal(format!("{prefix}{id}"))),
            Self::Rule(re) => {
                let (flags, rest) = split_flags(re.as_str());
                let body = rest.strip_prefix('^').unwrap_or(rest);
                Regex::new(&format!("^{}{flags}{body}", regex::escape(prefix))).map(Self::Rule)
            }
        }
    }
}

/// Split a leading inline flag group (`(?i)`, `(?x-s)`) off a rule's source.
fn split_flags(source: &str) -> (&str, &str) {
    let Some(inner) = source.strip_prefix("(?") else {
        return ("", source);
    };
    match inner.find(')') {
        Some(end) if end > 0 && inner[..end].chars().all(|c| c.is_ascii_alphabetic() || c == '-') => {
            source.split_at(end + 3)
        }
        _ => ("", source),
    }
}

impl PartialEq for InteractionPattern {
    fn eq(&self, other: &Self) -> bool {
        self.is_literal() == other.is_literal() && self.key() == other.key()
    }
}

impl fmt::Debug for InteractionPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(id) => write!(f, "Literal({id:?})"),
            Self::Rule(re) => write!(f, "Rule(/{}/)", re.as_str()),
        }
    }
}

impl fmt::Display for InteractionPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(id) => f.write_str(id),
            Self::Rule(re) => write!(f, "/{}/", re.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_prefix() {
        let pattern = InteractionPattern::literal("foo");
        let prefixed = pattern.with_prefix("ns:").unwrap();
        assert_eq!(prefixed, InteractionPattern::literal("ns:foo"));
        assert!(prefixed.matches("ns:foo"));
        assert!(!prefixed.matches("foo"));
    }

    #[test]
    fn test_rule_prefix_shifts_matches() {
        let plain = InteractionPattern::rule("^foo").unwrap();
        let prefixed = plain.with_prefix("ns:").unwrap();
        assert_eq!(prefixed.key(), "^ns:foo");

        for id in ["foo", "foobar", "foo:1", "barfoo", "fo", ""] {
            assert_eq!(
                plain.matches(id),
                prefixed.matches(&format!("ns:{id}")),
                "mismatch for {id:?}"
            );
            assert!(!prefixed.matches(id));
        }
    }

    #[test]
    fn test_rule_prefix_escapes_special_characters() {
        let rule = InteractionPattern::rule(r"^vote:(\d+)$").unwrap();
        let prefixed = rule.with_prefix("poll.v2+:").unwrap();
        assert!(prefixed.matches("poll.v2+:vote:12"));
        assert!(!prefixed.matches("pollXv2+:vote:12"));
        assert!(!prefixed.matches("poll.v2+:vote:x"));
    }

    #[test]
    fn test_unanchored_rule_becomes_anchored() {
        let rule = InteractionPattern::rule("page").unwrap();
        let prefixed = rule.with_prefix("ns:").unwrap();
        assert!(prefixed.matches("ns:page:2"));
        assert!(!prefixed.matches("other:ns:page"));
    }

    #[test]
    fn test_flagged_rule_keeps_flags_after_prefix() {
        let rule = InteractionPattern::rule("(?i)^confirm$").unwrap();
        let prefixed = rule.with_prefix("ns:").unwrap();
        assert_eq!(prefixed.key(), "^ns:(?i)confirm$");
        assert!(prefixed.matches("ns:CONFIRM"));
        assert!(!prefixed.matches("NS:confirm"));
        assert!(!prefixed.matches("CONFIRM"));

        // A scoped group is part of the body, not a flag prefix.
        let scoped = InteractionPattern::rule("(?i:yes|no)").unwrap();
        assert_eq!(scoped.with_prefix("ns:").unwrap().key(), "^ns:(?i:yes|no)");
    }
}
