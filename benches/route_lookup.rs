use criterion::{criterion_group, criterion_main, Criterion};
use elfaro::dispatcher::HandlerRequest;
use elfaro::routes::route_table;
use elfaro::AppState;
use http::Method;
use std::hint::black_box;
use std::sync::Arc;

fn bench_route_lookup(c: &mut Criterion) {
    let table = route_table().expect("site routes register");
    c.bench_function("route_lookup", |b| {
        let test_paths = [
            (Method::GET, "/"),
            (Method::GET, "/articulos/42"),
            (Method::GET, "/articulos/categoria/Medio%20Ambiente"),
            (Method::GET, "/articulos/buscar"),
            (Method::POST, "/perfil/actualizar"),
            (Method::GET, "/no/existe"),
        ];
        b.iter(|| {
            for (method, path) in test_paths.iter() {
                black_box(table.lookup(method, path));
            }
        })
    });
}

fn bench_dispatch(c: &mut Criterion) {
    let state = Arc::new(AppState::from_config(elfaro::AppConfig::default()).expect("memory state"));
    let dispatcher = elfaro::build_dispatcher(&state).expect("dispatcher builds");
    c.bench_function("dispatch_article_show", |b| {
        b.iter(|| {
            let resp = dispatcher.dispatch(HandlerRequest::new(Method::GET, "/articulos/3"));
            black_box(resp.status);
        })
    });
}

criterion_group!(benches, bench_route_lookup, bench_dispatch);
criterion_main!(benches);
