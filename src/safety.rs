//! Safety gate: text screening before any remote model call.
//!
//! The gate runs a case-insensitive substring check of the request text
//! against a configured blocklist.  It is pure and deterministic — the same
//! text and policy always produce the same verdict — and a rejection carries
//! the reason verbatim so the caller can surface it unchanged.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// SafetyPolicy
// ---------------------------------------------------------------------------

/// The blocklist plus a version tag recorded in every verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyPolicy {
    /// Bumped whenever the list changes, so stored verdicts stay auditable.
    pub version: String,
    /// Terms matched case-insensitively as substrings.
    pub blocked_terms: Vec<String>,
}

impl Default for SafetyPolicy {
    fn default() -> Self {
        Self {
            version: "1".into(),
            blocked_terms: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Verdict / SafetyGate
// ---------------------------------------------------------------------------

/// Outcome of screening one piece of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub is_safe: bool,
    /// Present only on rejection; names the matched term.
    pub reason: Option<String>,
    pub policy_version: String,
}

#[derive(Debug, Clone)]
pub struct SafetyGate {
    policy: SafetyPolicy,
}

impl SafetyGate {
    pub fn new(policy: SafetyPolicy) -> Self {
        Self { policy }
    }

    pub fn policy_version(&self) -> &str {
        &self.policy.version
    }

    /// Screen `text` against the blocklist.
    ///
    /// The first matching term wins; terms are checked in list order so the
    /// reported reason is stable across runs.
    pub fn validate(&self, text: &str) -> Verdict {
        let lower = text.to_lowercase();
        for term in &self.policy.blocked_terms {
            if !term.is_empty() && lower.contains(&term.to_lowercase()) {
                log::warn!("safety gate rejected request (blocked term {term:?})");
                return Verdict {
                    is_safe: false,
                    reason: Some(format!("contains blocked term {term:?}")),
                    policy_version: self.policy.version.clone(),
                };
            }
        }
        Verdict {
            is_safe: true,
            reason: None,
            policy_version: self.policy.version.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> SafetyGate {
        SafetyGate::new(SafetyPolicy {
            version: "test-2".into(),
            blocked_terms: vec!["violence".into(), "Hate".into()],
        })
    }

    #[test]
    fn clean_text_passes() {
        let verdict = gate().validate("a calm piano piece for a rainy evening");
        assert!(verdict.is_safe);
        assert_eq!(verdict.reason, None);
        assert_eq!(verdict.policy_version, "test-2");
    }

    #[test]
    fn match_is_case_insensitive_both_ways() {
        assert!(!gate().validate("extreme VIOLENCE everywhere").is_safe);
        assert!(!gate().validate("full of hate speech").is_safe);
    }

    #[test]
    fn rejection_names_the_matched_term() {
        let verdict = gate().validate("scenes of violence");
        assert_eq!(
            verdict.reason.as_deref(),
            Some("contains blocked term \"violence\"")
        );
    }

    #[test]
    fn first_listed_term_wins() {
        let verdict = gate().validate("hate and violence");
        // "violence" is listed first in the policy.
        assert!(verdict.reason.unwrap().contains("violence"));
    }

    #[test]
    fn verdict_is_deterministic() {
        let g = gate();
        assert_eq!(g.validate("some hate here"), g.validate("some hate here"));
    }

    #[test]
    fn empty_blocklist_passes_everything() {
        let gate = SafetyGate::new(SafetyPolicy::default());
        assert!(gate.validate("anything at all").is_safe);
    }

    #[test]
    fn empty_terms_are_ignored() {
        let gate = SafetyGate::new(SafetyPolicy {
            version: "1".into(),
            blocked_terms: vec!["".into()],
        });
        assert!(gate.validate("text").is_safe);
    }
}
