//! Resource-pool path matcher.
//!
//! Desired pool names arrive in suffix form (`/Resources`, `Prod`, or a
//! full path); the matcher scans the `(reference, path)` pairs reachable
//! under the target cluster and picks the first pool whose path ends with
//! the desired name. A candidate whose path also ends with the VM's
//! current pool name is the placement the VM already has, so it reports
//! no change instead of triggering a redundant migration.

use crate::vsphere::ObjectRef;

/// Outcome of matching a desired pool name against the cluster's pools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolDecision {
    /// The first matching pool is the one the VM already occupies.
    AlreadyPlaced,
    /// The VM should migrate to this pool.
    Migrate(ObjectRef),
}

/// Finds the migration target for a desired pool name.
///
/// Matching is case-sensitive suffix matching, not an anchored full-path
/// match. The first candidate in listing order whose path ends with the
/// desired name decides the outcome. Known limitation, preserved
/// deliberately: a desired name that is a suffix of two sibling pools
/// under different parents is ambiguous and resolves to whichever the
/// listing order visits first.
///
/// Returns `None` when no candidate path matches at all.
#[must_use]
pub fn find_target(
    desired_name: &str,
    current_pool_name: &str,
    candidates: &[(ObjectRef, String)],
) -> Option<PoolDecision> {
    for (reference, path) in candidates {
        if path.ends_with(desired_name) {
            if path.ends_with(current_pool_name) {
                return Some(PoolDecision::AlreadyPlaced);
            }
            return Some(PoolDecision::Migrate(reference.clone()));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vsphere::ObjectKind;

    fn pool(id: &str) -> ObjectRef {
        ObjectRef::new(ObjectKind::ResourcePool, id)
    }

    fn candidates(paths: &[(&str, &str)]) -> Vec<(ObjectRef, String)> {
        paths
            .iter()
            .map(|(id, path)| (pool(id), (*path).to_string()))
            .collect()
    }

    #[test]
    fn test_migrates_to_matching_pool() {
        let pools = candidates(&[
            ("resgroup-1", "/Resources"),
            ("resgroup-8", "/Resources/Prod"),
        ]);

        let decision = find_target("Prod", "Dev", &pools);
        assert_eq!(decision, Some(PoolDecision::Migrate(pool("resgroup-8"))));
    }

    #[test]
    fn test_current_placement_reports_no_change() {
        // Desired name "Pool" matches the path of the pool the VM is
        // already in; the matcher must not select it as a target.
        let pools = candidates(&[("resgroup-8", "/Resources/Pool")]);

        let decision = find_target("Pool", "Pool", &pools);
        assert_eq!(decision, Some(PoolDecision::AlreadyPlaced));
    }

    #[test]
    fn test_suffix_of_current_path_does_not_loop() {
        // Desired "Resources" while already under .../Resources.
        let pools = candidates(&[("resgroup-1", "/DC1/host/Cluster1/Resources")]);

        let decision = find_target("Resources", "Resources", &pools);
        assert_eq!(decision, Some(PoolDecision::AlreadyPlaced));
    }

    #[test]
    fn test_unknown_pool_reports_not_found() {
        let pools = candidates(&[
            ("resgroup-1", "/Resources"),
            ("resgroup-8", "/Resources/Prod"),
        ]);

        assert_eq!(find_target("Ghost", "Prod", &pools), None);
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        let pools = candidates(&[("resgroup-8", "/Resources/Prod")]);
        assert_eq!(find_target("prod", "Dev", &pools), None);
    }

    #[test]
    fn test_sibling_ambiguity_resolves_to_listing_order() {
        // Two sibling pools end with the same suffix; the first listed
        // wins. This mirrors the search-order semantics of the backend.
        let pools = candidates(&[
            ("resgroup-8", "/Resources/TeamA/Workers"),
            ("resgroup-9", "/Resources/TeamB/Workers"),
        ]);

        let decision = find_target("Workers", "Idle", &pools);
        assert_eq!(decision, Some(PoolDecision::Migrate(pool("resgroup-8"))));
    }

    #[test]
    fn test_full_path_form_matches() {
        let pools = candidates(&[("resgroup-1", "/Resources")]);
        let decision = find_target("/Resources", "Prod", &pools);
        assert_eq!(decision, Some(PoolDecision::Migrate(pool("resgroup-1"))));
    }
}
