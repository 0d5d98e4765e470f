#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use streaming_estimators::{CountMinSketch, HyperLogLog};
use tabled::{
    settings::{Settings, Style},
    Table, Tabled,
};

#[derive(Tabled)]
struct Record {
    items: usize,
    count_min_sketch: String,
    conservative_count_min_sketch: String,
    hyperloglog: String,
}

struct Usage {
    stack: usize,
    bytes: u64,
    blocks: u64,
}

impl std::fmt::Display for Usage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} / {} / {}", self.stack, self.bytes, self.blocks)
    }
}

fn measure_memory_usage<T>(
    items: usize,
    create: impl Fn() -> T,
    insert: impl Fn(&mut T, &usize),
) -> Usage
where
    T: Sized,
{
    let _profiler = dhat::Profiler::builder().testing().build();
    let mut estimator = create();
    for i in 0..items {
        insert(&mut estimator, &i);
    }
    let stats = dhat::HeapStats::get();
    Usage {
        stack: std::mem::size_of::<T>(),
        bytes: stats.total_bytes,
        blocks: stats.total_blocks,
    }
}

#[test]
fn test_allocations() {
    let mut results = Vec::new();
    let mut baseline: Option<(u64, u64, u64)> = None;

    // register logging callsites before measuring
    drop(CountMinSketch::<u32>::new(1, 1));
    drop(HyperLogLog::with_precision(4));

    for items in std::iter::once(0)
        .chain((0..).map(|c| 1 << c))
        .take_while(|&c| c <= 1 << 16)
    {
        let cms = measure_memory_usage(
            items,
            || CountMinSketch::<u32>::new(1 << 12, 4).unwrap(),
            |s, i| {
                s.increment(i);
            },
        );
        let conservative = measure_memory_usage(
            items,
            || CountMinSketch::<u32>::new(1 << 12, 4).unwrap(),
            |s, i| {
                s.conservative_increment(i);
            },
        );
        let hll = measure_memory_usage(
            items,
            || HyperLogLog::new(0.01).unwrap(),
            |h, i| h.insert(i),
        );

        // allocation happens at construction only, independent of stream length
        let blocks = (cms.blocks, conservative.blocks, hll.blocks);
        match baseline {
            None => baseline = Some(blocks),
            Some(expected) => assert_eq!(blocks, expected, "items = {}", items),
        }

        results.push(Record {
            items,
            count_min_sketch: cms.to_string(),
            conservative_count_min_sketch: conservative.to_string(),
            hyperloglog: hll.to_string(),
        });
    }

    let table_config = Settings::default().with(Style::markdown());
    let markdown = Table::new(results).with(table_config).to_string();
    println!("{}", markdown);
}
