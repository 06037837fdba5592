use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use bounded_transfer::config::DemoConfig;
use bounded_transfer::{CancelToken, logging, sim};

/// Move a batch of items through a bounded buffer with one producer and one consumer.
#[derive(Parser)]
#[command(name = "bounded_transfer", version)]
struct Cli {
    /// Log every enqueue and dequeue
    #[arg(short, long, global = true, env = "VERBOSE_LOGGING")]
    verbose: bool,

    #[command(flatten)]
    demo: DemoArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Settings for the default demo run
#[derive(Args)]
struct DemoArgs {
    /// Number of items to transfer
    #[arg(long, default_value_t = 25)]
    items: usize,
    /// Buffer capacity
    #[arg(long, default_value_t = 10)]
    capacity: usize,
    /// Interval between status lines
    #[arg(long, default_value_t = 300)]
    status_interval_ms: u64,
    /// Upper bound on the final wait for both workers
    #[arg(long, default_value_t = 10)]
    wait_timeout_secs: u64,
    /// Consumer poll timeout
    #[arg(long, default_value_t = 500)]
    poll_ms: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one transfer and print a CSV row of timings
    Bench {
        #[arg(long, default_value_t = 1000)]
        items: usize,
        #[arg(long, default_value_t = 10)]
        capacity: usize,
        #[arg(long, default_value_t = 20)]
        poll_ms: u64,
    },
    /// Sweep item counts against capacities (comma-separated lists)
    Stress {
        #[arg(long, value_delimiter = ',', default_values_t = [10usize, 100, 1000])]
        item_sets: Vec<usize>,
        #[arg(long, value_delimiter = ',', default_values_t = [1usize, 2, 10, 100])]
        capacity_sets: Vec<usize>,
        #[arg(long, default_value_t = 20)]
        poll_ms: u64,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = logging::init_tracing(cli.verbose) {
        eprintln!("failed to initialise logging: {err}");
    }

    // First Ctrl+C asks the demo to stop gracefully; a second one exits at once.
    let shutdown = CancelToken::new();
    let handler_token = shutdown.clone();
    if let Err(err) = ctrlc::set_handler(move || {
        if !handler_token.cancel() {
            std::process::exit(130);
        }
    }) {
        tracing::warn!(error = %err, "failed to install Ctrl+C handler");
    }

    let outcome = match cli.command {
        None => {
            let config = DemoConfig {
                total_items: cli.demo.items,
                capacity: cli.demo.capacity,
                status_interval: Duration::from_millis(cli.demo.status_interval_ms),
                wait_timeout: Duration::from_secs(cli.demo.wait_timeout_secs),
                poll_interval: Duration::from_millis(cli.demo.poll_ms),
                verbose: cli.verbose,
            };
            sim::run_demo(&config, &shutdown).map(|report| report.succeeded())
        }
        Some(Commands::Bench {
            items,
            capacity,
            poll_ms,
        }) => sim::run_benchmark(items, capacity, Duration::from_millis(poll_ms)).map(|()| true),
        Some(Commands::Stress {
            item_sets,
            capacity_sets,
            poll_ms,
        }) => sim::run_stress(&item_sets, &capacity_sets, Duration::from_millis(poll_ms))
            .map(|()| true),
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => {
            eprintln!("[ERROR] Transfer did not complete successfully.");
            ExitCode::FAILURE
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(2)
        }
    }
}
