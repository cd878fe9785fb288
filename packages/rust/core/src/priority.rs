//! Priority assignment for generated and expanded strategies.

use std::collections::HashSet;

use keyplan_shared::{GroupSkeleton, KeyplanError, KeywordGroup, Result};

/// Highest priority already used by `existing`, or 0 for an empty strategy.
pub fn base_priority(existing: &[KeywordGroup]) -> u32 {
    existing.iter().map(|g| g.priority).max().unwrap_or(0)
}

/// First priority available after `base`.
pub fn next_priority(base: u32) -> Result<u32> {
    base.checked_add(1).ok_or_else(|| {
        KeyplanError::validation(format!("priority {base} leaves no room for new groups"))
    })
}

/// Number new skeletons `base + 1, base + 2, ...` in authored order.
///
/// Whatever priorities the generator proposed are overwritten.
pub fn continue_priorities(skeletons: &mut [GroupSkeleton], base: u32) -> Result<()> {
    let mut next = next_priority(base)?;
    for (i, skeleton) in skeletons.iter_mut().enumerate() {
        if i > 0 {
            next = next_priority(next)?;
        }
        skeleton.priority = next;
    }
    Ok(())
}

/// Reject generator output whose priorities are zero or repeated.
pub fn check_proposed_priorities(skeletons: &[GroupSkeleton]) -> Result<()> {
    let mut seen = HashSet::with_capacity(skeletons.len());
    for skeleton in skeletons {
        if skeleton.priority == 0 || !seen.insert(skeleton.priority) {
            let proposed: Vec<String> = skeletons.iter().map(|s| s.priority.to_string()).collect();
            return Err(KeyplanError::decode(
                format!(
                    "group \"{}\" has an invalid priority {}",
                    skeleton.group_title, skeleton.priority
                ),
                format!("[{}]", proposed.join(", ")),
            ));
        }
    }
    Ok(())
}
