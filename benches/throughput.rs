use criterion::{criterion_group, criterion_main, Criterion};
use http::Method;
use routegate::dispatcher::Dispatcher;
use routegate::ratelimit::RateLimiter;
use routegate::resource::{HandlerResult, Resource};
use routegate::router::Router;
use routegate::server::{Request, Response};
use std::hint::black_box;
use std::net::SocketAddr;
use std::num::NonZeroUsize;

fn ok(_req: &mut Request) -> HandlerResult {
    Ok(Some(Response::text("ok")))
}

fn zoo_router() -> Router {
    let mut zoo = Resource::new("zoo");
    zoo.get("root", "/", ok);
    zoo.get("animals", "/zoo/animals", ok);
    zoo.post("create_animal", "/zoo/animals", ok);
    zoo.get("animal", "/zoo/animals/:id", ok);
    zoo.put("update_animal", "/zoo/animals/:id", ok);
    zoo.delete("delete_animal", "/zoo/animals/:id", ok);
    zoo.get("animal_toy", "/zoo/animals/:id/toys/:toy_id", ok);
    zoo.get(
        "habitat_section",
        "/zoo/:category/animals/:id/habitats/:habitat_id/sections/:section_id",
        ok,
    );
    zoo.post(
        "item_batch",
        "/inventory/:warehouse_id/feeds/:feed_id/items/:item_id/batches/:batch_id",
        ok,
    );
    zoo.get("complex", "/complex/:a/:b/:c/:d/:e/:f/:g/:h/:i", ok);
    zoo.get("files", "/files/:path*", ok);

    let mut router = Router::new();
    router
        .register_resource(zoo)
        .unwrap_or_else(|e| panic!("bench routes must register: {e}"));
    router
}

fn bench_route_throughput(c: &mut Criterion) {
    let router = zoo_router();
    c.bench_function("route_match", |b| {
        let test_paths = [
            (Method::GET, "/zoo/animals/123"),
            (Method::GET, "/zoo/animals/123/toys/456"),
            (Method::GET, "/zoo/cats/animals/123/habitats/88/sections/5"),
            (Method::POST, "/inventory/1/feeds/2/items/3/batches/4"),
            (Method::GET, "/complex/1/2/3/4/5/6/7/8/9"),
            (Method::GET, "/files/a/b/c.txt"),
        ];
        b.iter(|| {
            for (method, path) in test_paths.iter() {
                let res = router.route(method, path);
                black_box(&res);
            }
        })
    });
}

fn bench_rate_limiter(c: &mut Criterion) {
    let capacity = NonZeroUsize::new(1024).unwrap_or(NonZeroUsize::MIN);
    let limiter = RateLimiter::new(u64::MAX, 60_000, capacity);
    let keys: Vec<String> = (0..2048).map(|i| format!("10.0.{}.{}", i / 256, i % 256)).collect();
    c.bench_function("rate_limit_check", |b| {
        let mut i = 0usize;
        b.iter(|| {
            let decision = limiter.check(&keys[i % keys.len()]);
            i = i.wrapping_add(1);
            black_box(decision);
        })
    });
}

fn bench_dispatch(c: &mut Criterion) {
    let dispatcher = Dispatcher::unlimited(zoo_router());
    let client = SocketAddr::from(([127, 0, 0, 1], 40000));
    c.bench_function("dispatch", |b| {
        b.iter(|| {
            let mut req = Request::new(client, Method::GET, "/zoo/animals/123/toys/456");
            black_box(dispatcher.dispatch(&mut req));
        })
    });
}

criterion_group!(benches, bench_route_throughput, bench_rate_limiter, bench_dispatch);
criterion_main!(benches);
