use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nbtext::{from_str, metadata, to_string, Cell, Notebook};

fn notebook(size: usize) -> Notebook {
    let cells = (0..size)
        .flat_map(|i| {
            [
                Cell::markdown(format!("## Section {}\n\nSome *text* about step {}.", i, i)),
                Cell::code(format!("def step_{}(x):\n    return x + {}\n\n\nstep_{}(1)", i, i, i))
                    .with_metadata(metadata!({"tags": ["step"]})),
                Cell::code("%matplotlib inline"),
            ]
        })
        .collect();
    Notebook::new(cells)
}

fn benchmark_write_formats(c: &mut Criterion) {
    let notebook = notebook(20);
    let mut group = c.benchmark_group("write");

    for fmt in ["py:light", "py:percent", "md", "Rmd", "py:sphinx"] {
        group.bench_with_input(BenchmarkId::from_parameter(fmt), fmt, |b, fmt| {
            b.iter(|| to_string(black_box(&notebook), fmt))
        });
    }
    group.finish();
}

fn benchmark_read_formats(c: &mut Criterion) {
    let notebook = notebook(20);
    let mut group = c.benchmark_group("read");

    for fmt in ["py:light", "py:percent", "md", "Rmd", "py:sphinx"] {
        let text = to_string(&notebook, fmt).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(fmt), &text, |b, text| {
            b.iter(|| from_str(black_box(text), fmt))
        });
    }
    group.finish();
}

fn benchmark_read_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("read_light");

    for size in [10, 50, 100, 500].iter() {
        let text = to_string(&notebook(*size), "py:light").unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), &text, |b, text| {
            b.iter(|| from_str(black_box(text), "py:light"))
        });
    }
    group.finish();
}

fn benchmark_detect_format(c: &mut Criterion) {
    let text = to_string(&notebook(50), "py:percent").unwrap();

    c.bench_function("detect_format", |b| {
        b.iter(|| nbtext::detect_format(black_box(&text), ".py"))
    });
}

criterion_group!(
    benches,
    benchmark_write_formats,
    benchmark_read_formats,
    benchmark_read_sizes,
    benchmark_detect_format
);
criterion_main!(benches);
