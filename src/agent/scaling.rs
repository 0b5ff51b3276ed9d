//! Dynamic fan-out sizing.
//!
//! Picks an agent count for requests that omit one. The [`FanOutTier`] is a
//! pure function of [`QueryProfile`], making it deterministic and easy to
//! test.
//!
//! # Resolution Chain
//!
//! The agent count is resolved in priority order:
//! **Request → Config default → Scaling**

use std::fmt;

/// Words that signal the query spans several subjects.
const BREADTH_MARKERS: &[&str] = &[
    "and", "or", "vs", "versus", "compare", "comparison", "between", "pros", "cons",
    "tradeoffs", "trade-offs", "impact", "implications",
];

/// Observable characteristics of a query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryProfile {
    /// Whitespace-separated words.
    pub word_count: usize,
    /// Number of `?` characters.
    pub question_marks: usize,
    /// Comparison or conjunction markers (`vs`, `and`, `compare`, ...).
    pub breadth_markers: usize,
}

impl QueryProfile {
    /// Profiles a query string.
    #[must_use]
    pub fn from_query(query: &str) -> Self {
        let words: Vec<String> = query
            .split_whitespace()
            .map(|w| {
                w.trim_matches(|c: char| !c.is_alphanumeric() && c != '-')
                    .to_lowercase()
            })
            .filter(|w| !w.is_empty())
            .collect();

        let breadth_markers = words
            .iter()
            .filter(|w| BREADTH_MARKERS.contains(&w.as_str()))
            .count();

        Self {
            word_count: words.len(),
            question_marks: query.matches('?').count(),
            breadth_markers,
        }
    }

    /// Weighted complexity score.
    const fn score(&self) -> usize {
        self.word_count / 6 + self.question_marks.saturating_sub(1) * 2 + self.breadth_markers * 2
    }
}

/// Fan-out tier classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FanOutTier {
    /// Narrow, single-subject question.
    Focused,
    /// Ordinary open question.
    Standard,
    /// Several subjects or an explicit comparison.
    Broad,
    /// Long, multi-part investigation.
    Sweeping,
}

impl FanOutTier {
    /// Agent count recommended for this tier.
    #[must_use]
    pub const fn agent_count(self) -> usize {
        match self {
            Self::Focused => 2,
            Self::Standard => 3,
            Self::Broad => 4,
            Self::Sweeping => 6,
        }
    }
}

impl fmt::Display for FanOutTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Focused => write!(f, "focused"),
            Self::Standard => write!(f, "standard"),
            Self::Broad => write!(f, "broad"),
            Self::Sweeping => write!(f, "sweeping"),
        }
    }
}

/// Classifies a query profile.
///
/// This is a pure function: no I/O, no config reads, fully deterministic.
///
/// # Tier Boundaries
///
/// | Tier       | Score | Agents |
/// |------------|-------|--------|
/// | Focused    | 0     | 2      |
/// | Standard   | 1–2   | 3      |
/// | Broad      | 3–5   | 4      |
/// | Sweeping   | 6+    | 6      |
///
/// Score = `words / 6 + 2 × (extra question marks) + 2 × breadth markers`.
#[must_use]
pub const fn classify(profile: &QueryProfile) -> FanOutTier {
    match profile.score() {
        0 => FanOutTier::Focused,
        1..=2 => FanOutTier::Standard,
        3..=5 => FanOutTier::Broad,
        _ => FanOutTier::Sweeping,
    }
}

/// Agent count for `query`, clamped to `[1, max_agents]`.
#[must_use]
pub fn recommended_agent_count(query: &str, max_agents: usize) -> usize {
    let tier = classify(&QueryProfile::from_query(query));
    tier.agent_count().clamp(1, max_agents.max(1))
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("solar panels", FanOutTier::Focused ; "two words")]
    #[test_case("What drives the price of lithium today", FanOutTier::Standard ; "plain question")]
    #[test_case("Compare solar vs wind energy costs", FanOutTier::Broad ; "comparison")]
    #[test_case(
        "How do tariffs and subsidies shape solar and wind adoption? What are the regulatory implications for grid operators? How does storage change the picture?",
        FanOutTier::Sweeping ;
        "multi part"
    )]
    fn test_classify(query: &str, expected: FanOutTier) {
        assert_eq!(classify(&QueryProfile::from_query(query)), expected);
    }

    #[test]
    fn test_profile_counts_markers() {
        let profile = QueryProfile::from_query("Compare solar vs. wind? And why?");
        assert_eq!(profile.word_count, 6);
        assert_eq!(profile.question_marks, 2);
        assert_eq!(profile.breadth_markers, 3);
    }

    #[test]
    fn test_empty_query_is_focused() {
        assert_eq!(classify(&QueryProfile::default()), FanOutTier::Focused);
    }

    #[test_case(8, 3 ; "within ceiling")]
    #[test_case(2, 2 ; "clamped to ceiling")]
    #[test_case(1, 1 ; "single agent ceiling")]
    #[test_case(0, 1 ; "zero ceiling still yields one")]
    fn test_recommended_agent_count_clamps(max_agents: usize, expected: usize) {
        let n = recommended_agent_count("What drives the price of lithium today", max_agents);
        assert_eq!(n, expected);
    }

    #[test]
    fn test_tier_ordering_and_counts() {
        assert!(FanOutTier::Focused < FanOutTier::Standard);
        assert!(FanOutTier::Broad < FanOutTier::Sweeping);
        assert_eq!(FanOutTier::Sweeping.agent_count(), 6);
        assert_eq!(FanOutTier::Broad.to_string(), "broad");
    }
}
