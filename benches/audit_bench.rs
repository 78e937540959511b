use std::fs;
use std::hint::black_box;
use std::path::Path;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use site_upkeep::auditor::{AuditOptions, Auditor};
use tempfile::TempDir;

const PAGES: usize = 400;
const ASSETS_PER_PAGE: usize = 6;

fn audit_benchmark(c: &mut Criterion) {
    let fixture = create_site_fixture(PAGES, ASSETS_PER_PAGE);
    let auditor = Auditor::new(AuditOptions::default()).expect("auditor");

    let total_files = (PAGES * (ASSETS_PER_PAGE + 2)) as u64;

    let mut group = c.benchmark_group("audit_site");
    group.throughput(Throughput::Elements(total_files));
    group.bench_with_input(BenchmarkId::new("synthetic", total_files), &fixture, |b, root| {
        b.iter(|| {
            let audit = auditor.audit(black_box(root.path())).expect("audit should succeed");
            black_box(audit.report().unused_candidates_count);
        });
    });
    group.finish();
}

fn create_site_fixture(pages: usize, assets: usize) -> TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path();
    fs::create_dir_all(root.join("site/css")).expect("create css");
    fs::write(
        root.join("site/css/main.css"),
        "body { background: url(../img/bg.png) }\n.logo { background: url('../img/logo.svg') }\n",
    )
    .expect("write css");

    let mut index = String::from("<!doctype html><html><head><link rel=\"stylesheet\" href=\"site/css/main.css\"></head><body>\n");
    for i in 0..pages {
        index.push_str(&format!("<a href=\"site/p{i}/index.html\">page {i}</a>\n"));
    }
    index.push_str("</body></html>\n");
    fs::write(root.join("index.html"), index).expect("write index");

    for i in 0..pages {
        write_page(root, i, assets);
    }

    // Legacy output that should land in safe-delete.
    fs::create_dir_all(root.join("docs")).expect("create docs");
    for i in 0..pages / 4 {
        fs::write(root.join(format!("docs/old_{i}.html")), "<p>old</p>").expect("write docs");
    }

    dir
}

fn write_page(root: &Path, i: usize, assets: usize) {
    let dir = root.join(format!("site/p{i}"));
    fs::create_dir_all(&dir).expect("create page dir");

    let mut body = String::from("<!doctype html><html><body>\n");
    // Half of the assets are linked, the rest are orphans.
    for n in 0..assets {
        fs::write(dir.join(format!("fig{n}.png")), [0u8; 64]).expect("write asset");
        if n % 2 == 0 {
            body.push_str(&format!("<img src=\"fig{n}.png\" alt=\"\">\n"));
        }
    }
    body.push_str("<a href=\"notes.pdf\">notes</a></body></html>\n");
    fs::write(dir.join("index.html"), body).expect("write page");
    fs::write(dir.join("notes.pdf"), b"%PDF").expect("write pdf");
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = audit_benchmark
}
criterion_main!(benches);
