//! # Ledger Benchmarks
//!
//! Performance benchmarks for custodia-core governance operations.
//!
//! Run with: `cargo bench -p custodia-core`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use custodia_core::{
    DeployPlan, DeploymentRun, GovernanceConfig, ImplementationId, Ledger, LedgerStore,
    ModuleKind, Role, RoleRegistry, SubjectId, export_canonical,
};
use std::hint::black_box;

const DEPLOYER: SubjectId = SubjectId(1);
const GOVERNANCE: SubjectId = SubjectId(2);

/// Deploy N treasury modules through the orchestrator.
fn deployed_ledger(size: usize) -> Ledger {
    let mut ledger = Ledger::new();
    let config = GovernanceConfig::new(DEPLOYER, GOVERNANCE);
    for i in 0..size {
        let plan = DeployPlan::build(
            ModuleKind::Treasury,
            format!("treasury-{i}"),
            SubjectId(1000 + i as u64),
            ImplementationId(1),
            &config,
        )
        .expect("plan");
        DeploymentRun::new(plan)
            .run_to_completion(&mut ledger)
            .expect("run");
    }
    ledger
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_grant(c: &mut Criterion) {
    let mut group = c.benchmark_group("grant");

    for size in [10, 100, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let mut ledger = Ledger::new();
                let module = RoleRegistry::bootstrap(
                    &mut ledger,
                    ModuleKind::Treasury,
                    "treasury",
                    SubjectId(100),
                    ImplementationId(1),
                    DEPLOYER,
                )
                .expect("bootstrap");
                for i in 0..size {
                    let _ = RoleRegistry::grant(
                        &mut ledger,
                        module,
                        DEPLOYER,
                        Role::Operator,
                        SubjectId(10_000 + i as u64),
                    );
                }
                black_box(ledger)
            });
        });
    }

    group.finish();
}

fn bench_has_role(c: &mut Criterion) {
    let mut group = c.benchmark_group("has_role");

    for size in [10, 100, 1000].iter() {
        let ledger = deployed_ledger(*size);
        let module = ledger
            .module_by_proxy(SubjectId(1000 + (*size as u64) / 2))
            .expect("module");

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                black_box(RoleRegistry::has_role(
                    &ledger,
                    module,
                    Role::Admin,
                    GOVERNANCE,
                ))
            });
        });
    }

    group.finish();
}

fn bench_full_deployment(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_deployment");
    let config = GovernanceConfig::new(DEPLOYER, GOVERNANCE);

    group.bench_function("treasury_with_timelock", |b| {
        b.iter(|| {
            let mut ledger = Ledger::new();
            let plan = DeployPlan::build(
                ModuleKind::Treasury,
                "treasury",
                SubjectId(100),
                ImplementationId(1),
                &config,
            )
            .expect("plan")
            .with_timelock("timelock", SubjectId(200), ImplementationId(7));
            DeploymentRun::new(plan)
                .run_to_completion(&mut ledger)
                .expect("run");
            black_box(ledger)
        });
    });

    group.finish();
}

fn bench_export_canonical(c: &mut Criterion) {
    let mut group = c.benchmark_group("export_canonical");

    for size in [10, 100, 500].iter() {
        let ledger = deployed_ledger(*size);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(export_canonical(&ledger)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_grant,
    bench_has_role,
    bench_full_deployment,
    bench_export_canonical,
);

criterion_main!(benches);
