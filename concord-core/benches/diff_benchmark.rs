use concord_core::{diff, patch, relocate, split, Granularity};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

fn document(lines: usize) -> Vec<String> {
    (0..lines).map(|i| format!("line {i} of the document\n")).collect()
}

fn edited(base: &[String], every: usize, tag: &str) -> Vec<String> {
    base.iter()
        .enumerate()
        .map(|(i, line)| {
            if i % every == 0 {
                format!("{tag} {line}")
            } else {
                line.clone()
            }
        })
        .collect()
}

fn bench_diff(c: &mut Criterion) {
    let mut group = c.benchmark_group("Diff");
    for size in [100, 1_000] {
        let base = document(size);
        let revised = edited(&base, 50, "edited");
        group.throughput(Throughput::Elements(size as u64));
        group.bench_function(format!("diff_{size}_lines"), |b| {
            b.iter(|| black_box(diff(black_box(&base), black_box(&revised))))
        });
    }

    let text: String = document(40).concat();
    let base = split(&text, Granularity::Char);
    let revised = split(&text.replacen("line 20", "row 20", 1), Granularity::Char);
    group.bench_function("diff_chars_single_edit", |b| {
        b.iter(|| black_box(diff(black_box(&base), black_box(&revised))))
    });
    group.finish();
}

fn bench_patch(c: &mut Criterion) {
    let base = document(1_000);
    let revision = diff(&base, &edited(&base, 10, "patched"));

    c.bench_function("patch_1000_lines", |b| {
        b.iter(|| black_box(patch(black_box(&revision), black_box(&base)).unwrap()))
    });
}

fn bench_relocate(c: &mut Criterion) {
    let base = document(1_000);
    let theirs = diff(&base, &edited(&base, 7, "theirs"));
    let ours = diff(&base, &edited(&base, 11, "ours"));

    c.bench_function("relocate_1000_lines", |b| {
        b.iter(|| black_box(relocate(black_box(&ours), black_box(&theirs))))
    });
}

criterion_group!(benches, bench_diff, bench_patch, bench_relocate);
criterion_main!(benches);
