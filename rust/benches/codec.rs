use std::hint::black_box;

use chrono::{TimeZone, Utc};
use criterion::{Criterion, criterion_group, criterion_main};
use snowflake::{Preset, pack, parse_value, unpack};

fn bench_codec(c: &mut Criterion) {
    let date = Utc.with_ymd_and_hms(2022, 1, 1, 16, 15, 0).unwrap();

    for preset in Preset::ALL {
        let schema = preset.schema();
        let id = pack(schema, Some(date), 5, 0, 222).unwrap();

        c.bench_function(&format!("pack/{}", preset.as_str()), |b| {
            b.iter(|| pack(black_box(schema), Some(date), black_box(5), 0, black_box(222)))
        });
        c.bench_function(&format!("unpack/{}", preset.as_str()), |b| {
            b.iter(|| unpack(black_box(schema), black_box(id)))
        });
    }

    c.bench_function("parse_value", |b| {
        b.iter(|| parse_value(black_box("926871139123876062")))
    });
}

criterion_group!(benches, bench_codec);
criterion_main!(benches);
