use criterion::{Criterion, black_box, criterion_group, criterion_main};
use keyloom::config::TokenConfig;
use keyloom::credentials;
use keyloom::dispatch::GrantType;
use keyloom::tokens::TokenService;

fn token_service() -> TokenService {
    TokenService::new(&TokenConfig {
        secret_key: "bench-secret-bench-secret-bench-secret".to_string(),
        issuer: "keyloom".to_string(),
        audience: "keyloom-api".to_string(),
        lifetime_minutes: 60,
    })
    .expect("valid token config")
}

fn benchmark_token_operations(c: &mut Criterion) {
    let service = token_service();

    c.bench_function("token_issue", |b| {
        b.iter(|| {
            let token = service.issue(black_box("5f1c1a7e-bench-user"));
            black_box(token)
        });
    });

    let issued = service
        .issue("5f1c1a7e-bench-user")
        .expect("issue succeeds")
        .access_token;
    c.bench_function("token_verify", |b| {
        b.iter(|| black_box(service.verify(black_box(&issued))));
    });

    c.bench_function("token_verify_rejects_garbage", |b| {
        b.iter(|| black_box(service.verify(black_box("not.a.token"))));
    });
}

fn benchmark_grant_classification(c: &mut Criterion) {
    c.bench_function("grant_type_classify", |b| {
        b.iter(|| {
            for raw in ["password", "client_credentials", "refresh_token", ""] {
                black_box(GrantType::classify(black_box(Some(raw))));
            }
        });
    });
}

fn benchmark_password_verify(c: &mut Criterion) {
    let hashed = credentials::hash("correct horse battery staple").expect("hash succeeds");

    // Argon2 is deliberately slow; keep the sample small
    let mut group = c.benchmark_group("credentials");
    group.sample_size(10);
    group.bench_function("password_verify", |b| {
        b.iter(|| black_box(credentials::verify(&hashed, black_box("correct horse battery staple"))));
    });
    group.finish();
}

criterion_group!(
    benches,
    benchmark_token_operations,
    benchmark_grant_classification,
    benchmark_password_verify
);
criterion_main!(benches);
