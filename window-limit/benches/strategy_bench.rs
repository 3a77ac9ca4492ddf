use std::num::NonZeroU32;
use std::sync::Arc;
use std::sync::Barrier;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use criterion::BenchmarkId;
use criterion::Criterion;
use criterion::black_box;
use criterion::criterion_group;
use criterion::criterion_main;

use governor::Quota;
use governor::RateLimiter;
use governor::clock::QuantaClock;
use governor::state::InMemoryState;
use governor::state::direct::NotKeyed;

use window_limit::FixedWindow;
use window_limit::SlidingWindow;
use window_limit::Strategy;

// Governor as a baseline, seen through the same gate
#[derive(Debug)]
struct GovernorStrategy {
    limiter: RateLimiter<NotKeyed, InMemoryState, QuantaClock>,
}

impl Strategy for GovernorStrategy {
    fn allow(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

fn bench_single_strategy<S: Strategy>(group_name: &str, c: &mut Criterion, strategy: Arc<S>) {
    let mut group = c.benchmark_group(group_name);

    group.bench_function("single-threaded", |b| {
        b.iter(|| black_box(strategy.as_ref()).allow())
    });

    group.finish();
}

fn bench_parallel_strategy<S: Strategy + Send + Sync + 'static>(
    group_name: &str,
    c: &mut Criterion,
    strategy: Arc<S>,
) {
    let mut group = c.benchmark_group(group_name);

    for threads in [2, 4, 8].iter() {
        let num_threads = *threads;
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}-threads", num_threads)),
            &num_threads,
            |b, &n| {
                b.iter_custom(|iters| {
                    let barrier = Arc::new(Barrier::new(n + 1));
                    let mut handles = Vec::with_capacity(n);

                    for _ in 0..n {
                        let s = Arc::clone(&strategy);
                        let bar = Arc::clone(&barrier);
                        let iters_per_thread = iters / n as u64;

                        handles.push(thread::spawn(move || {
                            bar.wait();
                            for _ in 0..iters_per_thread {
                                black_box(s.allow());
                            }
                        }));
                    }

                    barrier.wait();
                    let start = Instant::now();

                    for handle in handles {
                        let _ = handle.join();
                    }

                    start.elapsed()
                });
            },
        );
    }
    group.finish();
}

fn bench_dynamic_strategy(
    group_name: &str,
    c: &mut Criterion,
    strategy: Arc<dyn Strategy + Send + Sync>,
) {
    let mut group = c.benchmark_group(format!("Dynamic-{}", group_name));

    group.bench_function("single-threaded", |b| {
        b.iter(|| black_box(strategy.as_ref()).allow())
    });

    group.finish();
}

fn run_all_benches(c: &mut Criterion) {
    let limit = 1_000_000;
    let period = Duration::from_secs(60);

    let fw = Arc::new(FixedWindow::new(limit, period).expect("valid fixed window"));
    // 60 sub-windows of 1s: the span matches the fixed window period.
    let sw = Arc::new(
        SlidingWindow::new(limit, 60, Duration::from_secs(1)).expect("valid sliding window"),
    );
    // Ten times finer, to see what the extra buckets cost.
    let sw_fine = Arc::new(
        SlidingWindow::new(limit, 600, Duration::from_millis(100)).expect("valid sliding window"),
    );

    let gov_quota = Quota::per_minute(NonZeroU32::new(limit as u32).expect("non-zero quota"));
    let gov = Arc::new(GovernorStrategy {
        limiter: RateLimiter::direct_with_clock(gov_quota, QuantaClock::default()),
    });

    bench_single_strategy("FixedWindow-Static", c, Arc::clone(&fw));
    bench_parallel_strategy("FixedWindow-Static", c, fw.clone());

    bench_single_strategy("SlidingWindow-Static", c, Arc::clone(&sw));
    bench_parallel_strategy("SlidingWindow-Static", c, sw.clone());

    bench_single_strategy("SlidingWindowFine-Static", c, Arc::clone(&sw_fine));
    bench_parallel_strategy("SlidingWindowFine-Static", c, sw_fine.clone());

    bench_single_strategy("Governor-Static", c, Arc::clone(&gov));
    bench_parallel_strategy("Governor-Static", c, gov.clone());

    // The cost of going through Arc<dyn Strategy>
    let strategies: Vec<(&str, Arc<dyn Strategy + Send + Sync>)> = vec![
        ("FixedWindow", fw),
        ("SlidingWindow", sw),
        ("SlidingWindowFine", sw_fine),
        ("Governor", gov),
    ];

    for (name, strategy) in strategies {
        bench_dynamic_strategy(name, c, strategy);
    }
}

criterion_group!(benches, run_all_benches);
criterion_main!(benches);
