//! Protected-branch reconciliation.
//!
//! Pure functions deciding what to do with a branch given the desired
//! access levels and what the server currently has. Callers perform the
//! remote calls.

use enforcer_client::{AccessLevelKey, BranchAccessSetting, ProtectedBranch};

/// What to do with a protected branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchPlan {
    /// The branch already satisfies the policy.
    Compliant,
    /// The branch is not protected; protect it with these settings.
    Create(Vec<BranchAccessSetting>),
    /// Remove the existing protection, then protect with these settings.
    Replace(Vec<BranchAccessSetting>),
}

/// Returns true if every desired pair has a grant with exactly that
/// permission under its key.
pub fn is_compliant(existing: &ProtectedBranch, desired: &[BranchAccessSetting]) -> bool {
    desired
        .iter()
        .all(|setting| existing.has_access_level(setting.key, setting.permission))
}

/// Tighten `desired` with stricter existing grants.
///
/// For each pair except `unprotect_access_level`, if the key has grants and
/// all of them are stricter-or-same than the desired permission, the
/// existing permission replaces it (the last grant wins when they differ).
/// Keys are handled independently. Exact duplicates produced by the merge
/// are dropped.
pub fn merge_stricter(
    existing: &ProtectedBranch,
    desired: &[BranchAccessSetting],
) -> Vec<BranchAccessSetting> {
    let mut merged: Vec<BranchAccessSetting> = Vec::with_capacity(desired.len());

    for setting in desired {
        let effective = match setting.key {
            AccessLevelKey::Unprotect => *setting,
            key => {
                let grants = existing.access_levels(key);
                let all_stricter = !grants.is_empty()
                    && grants
                        .iter()
                        .all(|grant| grant.permission.is_stricter_or_same(setting.permission));
                match grants.last() {
                    Some(grant) if all_stricter => BranchAccessSetting::new(key, grant.permission),
                    _ => *setting,
                }
            }
        };
        if !merged.contains(&effective) {
            merged.push(effective);
        }
    }

    merged
}

/// Decide how to bring `existing` in line with `desired`.
pub fn plan(
    existing: Option<&ProtectedBranch>,
    desired: &[BranchAccessSetting],
    keep_stricter: bool,
) -> BranchPlan {
    let Some(existing) = existing else {
        return BranchPlan::Create(desired.to_vec());
    };

    if is_compliant(existing, desired) {
        return BranchPlan::Compliant;
    }

    if !keep_stricter {
        return BranchPlan::Replace(desired.to_vec());
    }

    let merged = merge_stricter(existing, desired);
    if is_compliant(existing, &merged) {
        BranchPlan::Compliant
    } else {
        BranchPlan::Replace(merged)
    }
}
