//! Benchmarks for word alignment and full comparisons.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pdfcompare::diff::{align, Normalizer};
use pdfcompare::{CompareOptions, Comparer, DocId, DocumentTokens, PageWord};

const VOCABULARY: &[&str] = &[
    "Miel", "Brun", "TES", "Nougat", "Vanille", "Bourbon", "Fraise", "Confiture", "200ml",
    "500g", "Chocolat", "noir", "Lot", "Cannelle", "Abricot", "Citron",
];

/// Deterministic word sequence; `edit` changes every n-th word.
fn words(count: usize, edit: Option<usize>) -> Vec<String> {
    (0..count)
        .map(|i| {
            let mut index = (i * 7 + i / 3) % VOCABULARY.len();
            if edit.is_some_and(|n| i % n == 0) {
                index = (index + 5) % VOCABULARY.len();
            }
            VOCABULARY[index].to_string()
        })
        .collect()
}

fn document(doc: DocId, words: &[String], per_page: usize) -> DocumentTokens {
    let pages = words
        .chunks(per_page)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .map(|(i, w)| {
                    let x = (i % 10) as f32 * 55.0;
                    let y = (i / 10) as f32 * 14.0;
                    PageWord::new(x, y, x + 50.0, y + 12.0, w.clone())
                })
                .collect()
        })
        .collect();
    DocumentTokens::from_pages(doc, pages, &Normalizer::default())
}

/// Benchmark raw alignment at various sizes.
fn bench_align(c: &mut Criterion) {
    let mut group = c.benchmark_group("align");

    for count in [100, 1_000, 5_000].iter() {
        let a = words(*count, None);
        let b = words(*count, Some(13));

        group.bench_function(format!("{}_words", count), |bench| {
            bench.iter(|| align(black_box(&a), black_box(&b)));
        });
    }

    group.finish();
}

/// Benchmark both directions of a multi-page comparison.
fn bench_compare(c: &mut Criterion) {
    let mut group = c.benchmark_group("compare");
    let a = document(DocId::A, &words(4_000, None), 400);
    let b = document(DocId::B, &words(4_000, Some(17)), 400);

    group.bench_function("10_pages_parallel", |bench| {
        let comparer = Comparer::new(CompareOptions::default());
        bench.iter(|| comparer.compare_tokens(black_box(&a), black_box(&b)).unwrap());
    });

    group.bench_function("10_pages_sequential", |bench| {
        let comparer = Comparer::new(CompareOptions::default().sequential());
        bench.iter(|| comparer.compare_tokens(black_box(&a), black_box(&b)).unwrap());
    });

    group.finish();
}

criterion_group!(benches, bench_align, bench_compare);
criterion_main!(benches);
