//! Status normalization and transition evaluation.
//!
//! Every comparison in the pipeline goes through [`normalize`]; raw page text
//! is never compared directly.

mod extract;

pub use extract::StatusExtractor;

use serde::{Deserialize, Serialize};

/// Canonicalize an observed status string: trim, lowercase, absent → empty
pub fn normalize(raw: Option<&str>) -> String {
    raw.map(|s| s.trim().to_lowercase()).unwrap_or_default()
}

/// How an observed status is matched against target members
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    /// Observed status contains the target as a substring
    #[default]
    Contains,
    /// Observed status equals the target
    Exact,
}

/// Fixed set of normalized "success" statuses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSet {
    members: Vec<String>,
    policy: MatchPolicy,
}

impl TargetSet {
    /// Build a target set, normalizing members and dropping blanks and duplicates
    pub fn new<I, S>(members: I, policy: MatchPolicy) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for member in members {
            let member = normalize(Some(member.as_ref()));
            if !member.is_empty() && !normalized.contains(&member) {
                normalized.push(member);
            }
        }
        Self {
            members: normalized,
            policy,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    /// Whether a normalized status belongs to the target set
    pub fn matches(&self, status: &str) -> bool {
        if status.is_empty() {
            return false;
        }
        self.members.iter().any(|m| match self.policy {
            MatchPolicy::Contains => status.contains(m.as_str()),
            MatchPolicy::Exact => status == m,
        })
    }
}

/// Whether `previous → current` is a qualifying edge into the target set
///
/// Both values must already be normalized. Target-to-target (including two
/// lexically different target values) and target-to-non-target never qualify.
pub fn became_target(current: &str, previous: &str, targets: &TargetSet) -> bool {
    targets.matches(current) && !targets.matches(previous)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn done() -> TargetSet {
        TargetSet::new(["done"], MatchPolicy::Contains)
    }

    #[test]
    fn test_normalize_trims_and_lowercases() {
        assert_eq!(normalize(Some("  Dev Complete \n")), "dev complete");
        assert_eq!(normalize(None), "");
        assert_eq!(normalize(Some("")), "");
    }

    #[test]
    fn test_normalize_idempotent() {
        for raw in ["  In Progress ", "DONE", "", "  ", "Ünïcode Ståtus", "to do\t"] {
            let once = normalize(Some(raw));
            assert_eq!(normalize(Some(&once)), once, "not idempotent for {:?}", raw);
        }
    }

    #[test]
    fn test_became_target_edge() {
        assert!(became_target("done", "in progress", &done()));
    }

    #[test]
    fn test_became_target_unchanged() {
        assert!(!became_target("done", "done", &done()));
    }

    #[test]
    fn test_became_target_leaving_target() {
        assert!(!became_target("in progress", "done", &done()));
    }

    #[test]
    fn test_became_target_between_two_targets() {
        let targets = TargetSet::new(["dev complete", "done"], MatchPolicy::Contains);
        assert!(!became_target("done", "dev complete", &targets));
    }

    #[test]
    fn test_became_target_from_empty() {
        assert!(became_target("done", "", &done()));
    }

    #[test]
    fn test_contains_policy_matches_substring() {
        let targets = done();
        assert!(targets.matches("done-ish"));
        assert!(targets.matches("done"));
        assert!(!targets.matches("to do"));
    }

    #[test]
    fn test_exact_policy() {
        let targets = TargetSet::new(["done"], MatchPolicy::Exact);
        assert!(targets.matches("done"));
        assert!(!targets.matches("done-ish"));
    }

    #[test]
    fn test_empty_status_never_matches() {
        let targets = TargetSet::new(["done"], MatchPolicy::Contains);
        assert!(!targets.matches(""));
    }

    #[test]
    fn test_target_set_normalizes_members() {
        let targets = TargetSet::new([" Done ", "done", "  ", "DEV COMPLETE"], MatchPolicy::Contains);
        assert_eq!(targets.members(), &["done".to_string(), "dev complete".to_string()]);
    }
}
