//! Counts co-occurring token pairs across worker threads and folds the
//! partial estimators into one.
//!
//! Reads lines from stdin when input is piped, otherwise generates a
//! synthetic link graph.

use std::io::{BufRead, IsTerminal};
use std::sync::mpsc;
use std::thread;

use streaming_estimators::{CountMinSketch, HyperLogLog};
use tracing_subscriber::EnvFilter;

const NUM_WORKERS: usize = 8;
const WIDTH: usize = 1 << 16;
const DEPTH: usize = 8;
const STD_ERR: f64 = 0.005;

fn synthetic_lines() -> Vec<String> {
    (0..20_000u64)
        .map(|i| {
            let links: Vec<String> = (1..6)
                .map(|j| format!("page{}", (i * j * 7919) % (1000 + 97 * j)))
                .collect();
            format!("src{} {}", i, links.join(" "))
        })
        .collect()
}

/// Unordered pairs of links on a line, skipping the leading source token
fn pairs(line: &str) -> Vec<String> {
    let links: Vec<&str> = line.split(' ').skip(1).collect();
    let mut pairs = Vec::new();
    for (i, l1) in links.iter().enumerate() {
        for l2 in &links[i + 1..] {
            pairs.push(format!("{} {}", l1, l2));
        }
    }
    pairs
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let stdin = std::io::stdin();
    let lines: Vec<String> = if stdin.is_terminal() {
        synthetic_lines()
    } else {
        stdin.lock().lines().map_while(Result::ok).collect()
    };

    let (tx, rx) = mpsc::channel();
    let chunk_len = lines.len().div_ceil(NUM_WORKERS).max(1);
    thread::scope(|scope| {
        for chunk in lines.chunks(chunk_len) {
            let tx = tx.clone();
            scope.spawn(move || {
                let mut sketch = CountMinSketch::<u32>::new(WIDTH, DEPTH).unwrap();
                let mut hll = HyperLogLog::new(STD_ERR).unwrap();
                for line in chunk {
                    for pair in pairs(line) {
                        sketch.conservative_increment(pair.as_str());
                        hll.insert(pair.as_str());
                    }
                }
                tx.send((sketch, hll)).unwrap();
            });
        }
    });
    drop(tx);

    let mut sketch = CountMinSketch::<u32>::new(WIDTH, DEPTH).unwrap();
    let mut hll = HyperLogLog::new(STD_ERR).unwrap();
    for (partial_sketch, partial_hll) in rx {
        sketch.merge(&partial_sketch).unwrap();
        hll.merge(&partial_hll).unwrap();
    }

    println!("processed {} lines with {}", lines.len(), sketch);
    println!("distinct pairs estimate = {}", hll.count());

    let mut top: Vec<(u32, String)> = lines
        .iter()
        .flat_map(|line| pairs(line))
        .map(|pair| (sketch.count(pair.as_str()), pair))
        .collect();
    top.sort_unstable_by(|a, b| b.cmp(a));
    top.dedup();
    for (count, pair) in top.iter().take(10) {
        println!("  {}\t->\t{}", pair, count);
    }
}
