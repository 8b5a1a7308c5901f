use divan::{Bencher, black_box};
use inkdiff::{UnifiedOptions, unified, unified_batch};

fn main() {
    divan::main();
}

const SIZES: &[usize] = &[10, 100, 1000];

fn generate(items: usize) -> String {
    let mut html = String::from("<main><h1>Changelog</h1><ol>");
    for i in 0..items {
        html.push_str(&format!(
            "<li class=\"entry\"><strong>v0.{i}</strong> fixed issue number {i} in the parser</li>"
        ));
    }
    html.push_str("</ol></main>");
    html
}

fn modify(html: &str) -> String {
    html.replacen("issue number 2 ", "issue number 2 and 3 ", 1)
        .replacen("<li class=\"entry\"><strong>v0.4</strong>", "<li class=\"entry new\"><strong>v0.4</strong>", 1)
        .replacen("</ol>", "<li class=\"entry\"><strong>next</strong> unreleased</li></ol>", 1)
}

// Full cycle: parse both, match, build, mark, prune, serialize
#[divan::bench(args = SIZES)]
fn unified_cycle(bencher: Bencher, items: usize) {
    let old = generate(items);
    let new = modify(&old);
    let opts = UnifiedOptions::default();
    bencher.bench_local(|| {
        let html = unified(black_box(&old), black_box(&new), &opts).unwrap();
        black_box(html);
    });
}

// Unpruned output, to see what pruning saves in serialization
#[divan::bench(args = SIZES)]
fn unified_cycle_unpruned(bencher: Bencher, items: usize) {
    let old = generate(items);
    let new = modify(&old);
    let opts = UnifiedOptions::default().no_prune();
    bencher.bench_local(|| {
        let html = unified(black_box(&old), black_box(&new), &opts).unwrap();
        black_box(html);
    });
}

// 64 independent pairs on the rayon pool
#[divan::bench(args = [10, 100])]
fn batch(bencher: Bencher, items: usize) {
    let old = generate(items);
    let new = modify(&old);
    let pairs: Vec<(String, String)> = (0..64).map(|_| (old.clone(), new.clone())).collect();
    let opts = UnifiedOptions::default();
    bencher.bench_local(|| {
        let results = unified_batch(black_box(&pairs), &opts);
        black_box(results);
    });
}
