use criterion::{black_box, criterion_group, criterion_main, Criterion};

use regwatch::analytics::{line_ratio, unified_diff, ChangeAnalyzer};

fn sample_page(lines: usize, edit_every: usize) -> String {
    (0..lines)
        .map(|i| {
            if edit_every > 0 && i % edit_every == 0 {
                format!("§ {i} Ny forskrift om lakselus, grense 0.25 (oppdatert)")
            } else {
                format!("§ {i} Forskrift om drift av akvakulturanlegg, grense 0.5")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn bench_similarity(c: &mut Criterion) {
    let old = sample_page(2_000, 0);
    let new = sample_page(2_000, 40);
    let old_lines: Vec<&str> = old.lines().collect();
    let new_lines: Vec<&str> = new.lines().collect();

    c.bench_function("line_ratio_2000", |b| {
        b.iter(|| line_ratio(black_box(&old_lines), black_box(&new_lines)))
    });

    c.bench_function("unified_diff_2000", |b| {
        b.iter(|| {
            let diff = unified_diff(black_box(&old_lines), black_box(&new_lines), "old", "new", 3);
            black_box(diff.len())
        })
    });

    let analyzer = ChangeAnalyzer::default();
    c.bench_function("analyze_2000", |b| {
        b.iter(|| {
            let analysis = analyzer.analyze(black_box(&old), black_box(&new));
            black_box(analysis.change_percent)
        })
    });
}

criterion_group!(benches, bench_similarity);
criterion_main!(benches);
