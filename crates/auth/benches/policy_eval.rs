use criterion::{Criterion, black_box, criterion_group, criterion_main};

use crewbase_auth::{AccessRequest, Authority, Role, Session, SubscriptionStatus, evaluate};
use crewbase_core::{SubjectId, TenantId};

fn ready_session() -> Session {
    Session::Ready(Authority {
        subject_id: SubjectId::new("u-bench").unwrap(),
        role: Role::Csr,
        tenant_id: Some(TenantId::new("t-bench").unwrap()),
        subscription: SubscriptionStatus::Active,
    })
}

fn bench_evaluate(c: &mut Criterion) {
    let session = ready_session();
    let allow = AccessRequest::roles([Role::Admin, Role::Csr]).with_subscription(SubscriptionStatus::Active);
    let deny_role = AccessRequest::roles([Role::Admin]);

    c.bench_function("evaluate_allow", |b| {
        b.iter(|| evaluate(black_box(&session), black_box(&allow)))
    });

    c.bench_function("evaluate_deny_role", |b| {
        b.iter(|| evaluate(black_box(&session), black_box(&deny_role)))
    });

    c.bench_function("evaluate_pending", |b| {
        b.iter(|| evaluate(black_box(&Session::Initializing), black_box(&allow)))
    });
}

criterion_group!(benches, bench_evaluate);
criterion_main!(benches);
