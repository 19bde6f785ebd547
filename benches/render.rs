#![allow(clippy::unwrap_used)]
//! Benchmarks for command-line rendering and catalog serialization

#![allow(missing_docs)]

use criterion::{Criterion, criterion_group, criterion_main};
use darts_hub::catalog::defaults;
use darts_hub::model::{App, AppKind, Argument, ArgumentType, Configuration, RuntimeArguments};
use std::hint::black_box;

fn configured_caller() -> App {
    let mut caller = defaults::darts_caller();
    let configuration = caller.base_mut().configuration.as_mut().unwrap();
    for (name, value) in [
        ("U", "player@example.com"),
        ("P", "correct horse battery staple"),
        ("B", "1234-5678"),
        ("M", "/home/player/sounds"),
        ("V", "0.8"),
        ("R", "True"),
        ("DLL", "50"),
    ] {
        configuration
            .argument_mut(name)
            .unwrap()
            .set_value(Some(value.to_string()));
    }
    caller
}

fn wide_configuration() -> Configuration {
    (0..100).fold(Configuration::new("--", "="), |config, i| {
        config.with(
            Argument::new(
                format!("arg{i}"),
                ArgumentType::Int {
                    min: Some(0),
                    max: Some(1000),
                },
            )
            .with_value((i * 7).to_string()),
        )
    })
}

fn bench_render(c: &mut Criterion) {
    let caller = configured_caller();
    let configuration = caller.base().configuration.clone().unwrap();

    c.bench_function("caller_tokens", |b| {
        b.iter(|| black_box(configuration.tokens(None)));
    });

    c.bench_function("caller_render_masked", |b| {
        b.iter(|| black_box(configuration.render(None, true)));
    });

    let wide = wide_configuration();
    c.bench_function("wide_configuration_tokens", |b| {
        b.iter(|| black_box(wide.tokens(None)));
    });

    let extern_app = defaults::darts_extern();
    let extern_config = extern_app.base().configuration.clone().unwrap();
    let runtime: RuntimeArguments =
        [("extern_platform".to_string(), "lidarts".to_string())].into();
    c.bench_function("extern_runtime_override", |b| {
        b.iter(|| black_box(extern_config.tokens(Some(black_box(&runtime)))));
    });
}

fn bench_catalog_json(c: &mut Criterion) {
    let apps = defaults::default_apps(AppKind::Downloadable);
    c.bench_function("downloadable_serialize", |b| {
        b.iter(|| black_box(serde_json::to_vec_pretty(black_box(&apps)).unwrap()));
    });

    let json = serde_json::to_string(&apps).unwrap();
    c.bench_function("downloadable_deserialize", |b| {
        b.iter(|| {
            let parsed: Vec<darts_hub::model::DownloadableApp> =
                serde_json::from_str(black_box(&json)).unwrap();
            black_box(parsed);
        });
    });
}

criterion_group!(benches, bench_render, bench_catalog_json);
criterion_main!(benches);
