//! Demo, benchmark, and stress-sweep drivers built on the transfer coordinator.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::cancel::CancelToken;
use crate::config::{DemoConfig, TransferOptions};
use crate::coordinator::TransferCoordinator;
use crate::destination::Destination;
use crate::error::{Result, TransferError};
use crate::types::{Item, ItemId, source_items};

// Bench runs should never hang a sweep; anything slower is reported as unclean.
const BENCH_WAIT_TIMEOUT: Duration = Duration::from_secs(60);
// Sampling interval for the in-flight high-water mark.
const SAMPLE_POLL: Duration = Duration::from_micros(200);

const CSV_HEADER: &str = "items,capacity,elapsed_ms,throughput_items_per_s,max_in_flight,cpu_user_s,cpu_sys_s,consumed,order_preserved,capacity_violation,clean_exit";

/// Best-effort CPU user/system time snapshot (seconds) on Unix platforms.
#[cfg(unix)]
fn cpu_times_seconds() -> Option<(f64, f64)> {
    // SAFETY: rusage is plain data and getrusage only writes into it.
    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::getrusage(libc::RUSAGE_SELF, &mut usage) };
    if rc != 0 {
        return None;
    }
    let seconds = |tv: libc::timeval| tv.tv_sec as f64 + tv.tv_usec as f64 / 1_000_000.0;
    Some((seconds(usage.ru_utime), seconds(usage.ru_stime)))
}

#[cfg(not(unix))]
fn cpu_times_seconds() -> Option<(f64, f64)> {
    None
}

fn format_cpu(value: Option<f64>) -> String {
    value
        .map(|v| format!("{v:.4}"))
        .unwrap_or_else(|| "NA".to_string())
}

/// Polls the in-flight count until stopped and returns the highest value seen.
fn spawn_in_flight_sampler(
    coordinator: Arc<TransferCoordinator>,
    stop_flag: Arc<AtomicBool>,
    poll: Duration,
) -> thread::JoinHandle<usize> {
    thread::spawn(move || {
        let mut max_seen = 0;
        while !stop_flag.load(Ordering::SeqCst) {
            max_seen = max_seen.max(coordinator.in_flight_count());
            thread::sleep(poll);
        }
        max_seen
    })
}

/// Outcome of one demo transfer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DemoReport {
    pub produced: usize,
    pub consumed: usize,
    pub clean_exit: bool,
    pub order_preserved: bool,
}

impl DemoReport {
    pub fn all_transferred(&self) -> bool {
        self.consumed == self.produced
    }

    /// Every item arrived and both workers exited cleanly.
    pub fn succeeded(&self) -> bool {
        self.all_transferred() && self.clean_exit
    }
}

/// Run the demo transfer, printing periodic status and a final summary.
///
/// Once `shutdown` is cancelled the transfer is stopped at the next status
/// tick and the summary reflects whatever arrived.
pub fn run_demo(config: &DemoConfig, shutdown: &CancelToken) -> Result<DemoReport> {
    tracing::info!(
        items = config.total_items,
        capacity = config.capacity,
        "demo starting"
    );

    let source = source_items(config.total_items);
    let expected: Vec<ItemId> = source.iter().map(Item::id).collect();
    let destination = Arc::new(Destination::new());
    let coordinator = TransferCoordinator::with_capacity(config.capacity)?
        .with_options(config.transfer_options());

    println!("=== Producer-Consumer Transfer ===");
    println!(
        "items={} capacity={}",
        config.total_items,
        coordinator.capacity()
    );

    coordinator.start_transfer(source, Arc::clone(&destination))?;

    // Stop polling if both workers are gone, so a lost item cannot hang the driver.
    while destination.len() < config.total_items && coordinator.workers_running() > 0 {
        if shutdown.is_cancelled() {
            println!("[WARN] Interrupted. Stopping transfer.");
            coordinator.stop_transfer();
            break;
        }
        println!(
            "[STATUS] {} | In-Flight={}",
            coordinator.queue_status(),
            coordinator.in_flight_count()
        );
        thread::sleep(config.status_interval);
    }

    let clean_exit = coordinator.wait_for_completion(config.wait_timeout);
    let received = destination.ids();
    let report = DemoReport {
        produced: expected.len(),
        consumed: received.len(),
        clean_exit,
        order_preserved: received == expected,
    };
    if !report.succeeded() {
        coordinator.stop_transfer();
    }

    println!("TRANSFER SUMMARY");
    println!("items_produced={}", report.produced);
    println!("items_consumed={}", report.consumed);
    println!("clean_exit={}", report.clean_exit);
    println!("order_preserved={}", report.order_preserved);
    println!("all_transferred={}", report.all_transferred());
    Ok(report)
}

/// Aggregated metrics from a single benchmark run.
struct BenchResult {
    items: usize,
    capacity: usize,
    elapsed_ms: f64,
    throughput: f64,
    max_in_flight: usize,
    cpu_user_s: Option<f64>,
    cpu_sys_s: Option<f64>,
    consumed: usize,
    order_preserved: bool,
    clean_exit: bool,
}

impl BenchResult {
    fn capacity_violation(&self) -> bool {
        self.max_in_flight > self.capacity
    }

    fn csv_row(&self) -> String {
        format!(
            "{},{},{:.2},{:.2},{},{},{},{},{},{},{}",
            self.items,
            self.capacity,
            self.elapsed_ms,
            self.throughput,
            self.max_in_flight,
            format_cpu(self.cpu_user_s),
            format_cpu(self.cpu_sys_s),
            self.consumed,
            self.order_preserved,
            self.capacity_violation(),
            self.clean_exit
        )
    }

    fn report(&self) {
        println!("{}", self.csv_row());
        if self.consumed != self.items {
            eprintln!("# violation,lost_items,{}", self.items - self.consumed.min(self.items));
        }
        if !self.order_preserved {
            eprintln!("# violation,fifo_order");
        }
        if self.capacity_violation() {
            eprintln!("# violation,capacity");
        }
        if !self.clean_exit {
            eprintln!("# warning,unclean_exit");
        }
    }
}

fn benchmark_once(items: usize, capacity: usize, poll_interval: Duration) -> Result<BenchResult> {
    let source = source_items(items);
    let expected: Vec<ItemId> = source.iter().map(Item::id).collect();
    let destination = Arc::new(Destination::new());
    let coordinator = Arc::new(
        TransferCoordinator::with_capacity(capacity)?
            .with_options(TransferOptions::default().with_poll_interval(poll_interval)),
    );

    let stop_flag = Arc::new(AtomicBool::new(false));
    let sampler = spawn_in_flight_sampler(
        Arc::clone(&coordinator),
        Arc::clone(&stop_flag),
        SAMPLE_POLL,
    );

    let cpu_start = cpu_times_seconds();
    let start = Instant::now();
    let started = coordinator.start_transfer(source, Arc::clone(&destination));
    let clean_exit = started.is_ok() && coordinator.wait_for_completion(BENCH_WAIT_TIMEOUT);
    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

    stop_flag.store(true, Ordering::SeqCst);
    let max_in_flight = sampler.join().unwrap_or(0);
    started?;

    let (cpu_user_s, cpu_sys_s) = match (cpu_start, cpu_times_seconds()) {
        (Some((user_start, sys_start)), Some((user_end, sys_end))) => {
            (Some(user_end - user_start), Some(sys_end - sys_start))
        }
        _ => (None, None),
    };
    let consumed = destination.len();
    let throughput = if elapsed_ms > 0.0 {
        consumed as f64 / (elapsed_ms / 1000.0)
    } else {
        0.0
    };

    Ok(BenchResult {
        items,
        capacity,
        elapsed_ms,
        throughput,
        max_in_flight,
        cpu_user_s,
        cpu_sys_s,
        consumed,
        order_preserved: destination.ids() == expected,
        clean_exit,
    })
}

/// Run a single benchmark transfer and print one CSV row.
pub fn run_benchmark(items: usize, capacity: usize, poll_interval: Duration) -> Result<()> {
    let result = benchmark_once(items, capacity, poll_interval)?;
    println!("{CSV_HEADER}");
    result.report();
    Ok(())
}

/// Sweep every item count against every capacity and print CSV output.
pub fn run_stress(
    item_sets: &[usize],
    capacity_sets: &[usize],
    poll_interval: Duration,
) -> Result<()> {
    let capacities: Vec<usize> = capacity_sets.iter().copied().filter(|&c| c > 0).collect();
    let dropped = capacity_sets.len() - capacities.len();
    if dropped > 0 {
        eprintln!("stress warning: ignored {dropped} capacity set(s) <= 0");
    }
    if capacities.is_empty() {
        return Err(TransferError::InvalidArgument(
            "capacity sets must contain a value > 0".to_string(),
        ));
    }

    println!("{CSV_HEADER}");
    for &items in item_sets {
        for &capacity in &capacities {
            benchmark_once(items, capacity, poll_interval)?.report();
        }
    }
    Ok(())
}
