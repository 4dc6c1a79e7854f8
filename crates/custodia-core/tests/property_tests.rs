//! # Property-Based Tests
//!
//! Verification tests using proptest.
//!
//! These tests ensure determinism and the governance invariants hold
//! under arbitrary operation sequences.

use custodia_core::{
    GovernanceConfig, ImplementationId, Ledger, LedgerStore, ModuleKind, Role, RoleRegistry,
    SubjectId, UpgradeCoordinator, canonical_checksum,
};
use proptest::collection::vec;
use proptest::prelude::*;

const DEPLOYER: SubjectId = SubjectId(1);

fn bootstrapped() -> (Ledger, custodia_core::ModuleId) {
    let mut ledger = Ledger::new();
    let id = RoleRegistry::bootstrap(
        &mut ledger,
        ModuleKind::Storefront,
        "storefront",
        SubjectId(100),
        ImplementationId(1),
        DEPLOYER,
    )
    .expect("bootstrap");
    (ledger, id)
}

fn storefront_role() -> impl Strategy<Value = Role> {
    proptest::sample::select(ModuleKind::Storefront.role_table().to_vec())
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Granting a role twice yields identical state to granting once.
    #[test]
    fn grant_is_idempotent(role in storefront_role(), subject in 2u64..10_000) {
        let (mut once, module) = bootstrapped();
        let (mut twice, _) = bootstrapped();

        RoleRegistry::grant(&mut once, module, DEPLOYER, role, SubjectId(subject))
            .expect("grant");

        RoleRegistry::grant(&mut twice, module, DEPLOYER, role, SubjectId(subject))
            .expect("grant");
        RoleRegistry::grant(&mut twice, module, DEPLOYER, role, SubjectId(subject))
            .expect("grant again");

        prop_assert_eq!(canonical_checksum(&once), canonical_checksum(&twice));
    }

    /// Revoking an ungranted role is a no-op.
    #[test]
    fn revoke_of_ungranted_is_noop(role in storefront_role(), subject in 2u64..10_000) {
        let (mut ledger, module) = bootstrapped();
        let before = canonical_checksum(&ledger);

        // The deployer holds everything; any other subject holds nothing.
        RoleRegistry::revoke(&mut ledger, module, DEPLOYER, role, SubjectId(subject))
            .expect("revoke");

        prop_assert_eq!(canonical_checksum(&ledger), before);
    }

    /// hasRole is false before grant, true after, false after revoke.
    #[test]
    fn has_role_truth_table(role in storefront_role(), subject in 2u64..10_000) {
        let (mut ledger, module) = bootstrapped();
        let subject = SubjectId(subject);

        prop_assert!(!RoleRegistry::has_role(&ledger, module, role, subject).expect("query"));

        RoleRegistry::grant(&mut ledger, module, DEPLOYER, role, subject).expect("grant");
        prop_assert!(RoleRegistry::has_role(&ledger, module, role, subject).expect("query"));

        RoleRegistry::revoke(&mut ledger, module, DEPLOYER, role, subject).expect("revoke");
        prop_assert!(!RoleRegistry::has_role(&ledger, module, role, subject).expect("query"));
    }

    /// Identical grant sequences produce canonically identical ledgers.
    #[test]
    fn determinism_identical_input_produces_identical_output(
        subjects in vec(2u64..10_000, 1..30)
    ) {
        let (mut first, module_a) = bootstrapped();
        let (mut second, module_b) = bootstrapped();

        for &subject in &subjects {
            RoleRegistry::grant(&mut first, module_a, DEPLOYER, Role::Staff, SubjectId(subject))
                .expect("grant");
            RoleRegistry::grant(&mut second, module_b, DEPLOYER, Role::Staff, SubjectId(subject))
                .expect("grant");
        }

        prop_assert_eq!(canonical_checksum(&first), canonical_checksum(&second));
    }

    /// The proxy identity never changes across any upgrade chain, and
    /// history records every superseded implementation in order.
    #[test]
    fn upgrade_chain_preserves_identity(candidates in vec(2u64..10_000, 1..10)) {
        let (mut ledger, module) = bootstrapped();
        let proxy_before = ledger.lookup(module).expect("lookup").expect("present").proxy;

        for &candidate in &candidates {
            UpgradeCoordinator::propose(
                &mut ledger,
                module,
                DEPLOYER,
                ImplementationId(candidate),
            )
            .expect("propose");
            UpgradeCoordinator::execute(&mut ledger, module, DEPLOYER).expect("execute");
        }

        let record = ledger.lookup(module).expect("lookup").expect("present");
        prop_assert_eq!(record.proxy, proxy_before);
        prop_assert_eq!(record.history.len(), candidates.len());
        prop_assert_eq!(
            record.implementation,
            ImplementationId(candidates[candidates.len() - 1])
        );
    }

    /// Audit sequence numbers are strictly increasing and every state
    /// change produces exactly one event.
    #[test]
    fn audit_seq_is_strictly_monotonic(subjects in vec(2u64..10_000, 1..30)) {
        let (mut ledger, module) = bootstrapped();

        for &subject in &subjects {
            RoleRegistry::grant(&mut ledger, module, DEPLOYER, Role::Banker, SubjectId(subject))
                .expect("grant");
        }

        let log = ledger.audit_log();
        for window in log.windows(2) {
            prop_assert!(window[0].seq < window[1].seq);
        }

        // Bootstrap events plus one per unique newly granted subject.
        let unique: std::collections::BTreeSet<_> = subjects.iter().collect();
        let bootstrap_events = ModuleKind::Storefront.role_table().len() + 1;
        prop_assert_eq!(log.len(), bootstrap_events + unique.len());
    }

    /// Config narrowing never widens a role table.
    #[test]
    fn effective_roles_are_subset_of_table(keep in vec(0usize..6, 1..6)) {
        let table = ModuleKind::Storefront.role_table();
        let mut narrowed: Vec<Role> = keep
            .iter()
            .map(|&i| table[i % table.len()])
            .collect();
        narrowed.sort();
        narrowed.dedup();
        if !narrowed.contains(&Role::Admin) {
            narrowed.push(Role::Admin);
        }

        let mut config = GovernanceConfig::new(DEPLOYER, SubjectId(2));
        config
            .role_overrides
            .insert(ModuleKind::Storefront, narrowed.clone());
        config.validate().expect("valid");

        for role in config.effective_roles(ModuleKind::Storefront) {
            prop_assert!(table.contains(&role));
        }
    }
}
