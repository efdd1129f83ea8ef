use criterion::{black_box, criterion_group, criterion_main, Criterion};
use redirect_manager::url_parser::{
    generate_child_source_url_from_parent_redirect_urls, prepare_internal_target_url, prepare_source_url,
};

fn bench_prepare_source_url(c: &mut Criterion) {
    let urls = [
        "https://example.com/en/products/shoes?color=red#reviews",
        "/de/ueber-uns/team/",
        "index.php?id=42&project=main&lang=en",
        "https://example.com",
    ];

    c.bench_function("prepare_source_url", |b| {
        b.iter(|| {
            for url in &urls {
                let _ = prepare_source_url(black_box(url));
            }
        })
    });

    c.bench_function("prepare_internal_target_url", |b| {
        b.iter(|| {
            for url in &urls {
                let _ = prepare_internal_target_url(black_box(url));
            }
        })
    });
}

fn bench_child_urls(c: &mut Criterion) {
    c.bench_function("generate_child_source_url", |b| {
        b.iter(|| {
            generate_child_source_url_from_parent_redirect_urls(
                black_box("/news/about/team/jobs"),
                black_box("/about"),
                black_box("/news/about"),
            )
        })
    });
}

criterion_group!(benches, bench_prepare_source_url, bench_child_urls);
criterion_main!(benches);
