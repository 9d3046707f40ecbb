use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;
use wayroute::router::Router;

const ROUTES: &[&str] = &[
    "/",
    "/404",
    "/zoo/animals",
    "/zoo/animals/:id",
    "/zoo/animals/:id/toys/:toy_id",
    "/zoo/:category/animals/:id/habitats/:habitat_id/sections/:section_id",
    "/inventory/:warehouse_id/feeds/:feed_id/items/:item_id/batches/:batch_id",
    "/complex/:a/:b/:c/:d/:e/:f/:g/:h/:i",
    "/zoo/health",
    "/static/*",
];

fn verb_zoo() -> Router<usize> {
    let mut router = Router::with_default("/404");
    for (i, pattern) in ROUTES.iter().enumerate() {
        router.handle(pattern, i);
    }
    router
}

fn bench_route_throughput(c: &mut Criterion) {
    let router = verb_zoo();
    c.bench_function("route_match", |b| {
        let test_paths = [
            "/zoo/animals/123",
            "/zoo/animals/123/toys/456",
            "/zoo/cats/animals/123/habitats/88/sections/5",
            "/inventory/1/feeds/2/items/3/batches/4",
            "/complex/1/2/3/4/5/6/7/8/9",
        ];
        b.iter(|| {
            for path in &test_paths {
                let res = router.match_route(black_box(path));
                black_box(&res);
            }
        })
    });
}

fn bench_match_kinds(c: &mut Criterion) {
    let router = verb_zoo();
    let mut group = c.benchmark_group("match_kind");
    for (name, path) in [
        ("literal", "/zoo/health"),
        ("capture", "/zoo/animals/42"),
        ("wildcard", "/static/css/vendor/site.css"),
        ("percent_decoded", "/zoo/animals/%E2%9C%93"),
        ("default_fallback", "/nowhere/at/all"),
    ] {
        group.bench_with_input(BenchmarkId::new("match_route", name), path, |b, path| {
            b.iter(|| black_box(router.match_route(black_box(path))));
        });
    }
    group.finish();
}

fn bench_mount(c: &mut Criterion) {
    c.bench_function("mount_and_match", |b| {
        b.iter(|| {
            let mut root: Router<usize> = Router::new();
            root.mount("/api/v1", verb_zoo());
            black_box(root.match_route("/api/v1/zoo/animals/7").is_ok())
        })
    });
}

criterion_group!(benches, bench_route_throughput, bench_match_kinds, bench_mount);
criterion_main!(benches);
