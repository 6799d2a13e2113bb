//! Decides what to do with an authenticated webhook

use std::collections::BTreeSet;

use crate::webhook::PUSH_EVENT;

const BRANCH_REF_PREFIX: &str = "refs/heads/";

/// Outcome of classifying a verified request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Deploy. `branch` is `None` when the payload carried no `ref`.
    Accept { branch: Option<String> },
    IgnoredEvent(String),
    IgnoredBranch(String),
}

/// Extracts the branch name from a git ref.
/// Refs outside `refs/heads/` are returned unchanged.
pub fn branch_from_ref(git_ref: &str) -> &str {
    git_ref.strip_prefix(BRANCH_REF_PREFIX).unwrap_or(git_ref)
}

/// Classifies a request by event type and target branch.
///
/// A push without a `ref` is accepted without branch filtering.
pub fn classify(
    event_type: Option<&str>,
    git_ref: Option<&str>,
    allowed_branches: &BTreeSet<String>,
) -> Disposition {
    match event_type {
        Some(PUSH_EVENT) => {}
        Some(other) => return Disposition::IgnoredEvent(other.to_string()),
        None => return Disposition::IgnoredEvent("unknown".to_string()),
    }

    let Some(git_ref) = git_ref else {
        return Disposition::Accept { branch: None };
    };

    let branch = branch_from_ref(git_ref);
    if allowed_branches.contains(branch) {
        Disposition::Accept {
            branch: Some(branch.to_string()),
        }
    } else {
        Disposition::IgnoredBranch(branch.to_string())
    }
}
