//! # Example: connect_first_alive
//!
//! Retries a blocking "connect to the first alive database" routine until it
//! succeeds. The attempt limit is unbounded, so only success or cancellation
//! ends the run.
//!
//! The in-memory database only comes up on the third round; the other URLs
//! never answer.
//!
//! ## Flow
//! ```text
//! RetryRun::drive()
//!   ├─► attempt 1: mysql ✗ oracle ✗ h2 ✗ ─► Err("No alive DB found")
//!   ├─► BackoffScheduled{delay≈100ms}
//!   ├─► attempt 2: ... ─► Err("No alive DB found")
//!   ├─► BackoffScheduled{delay≈200ms}
//!   └─► attempt 3: h2 ✓ ─► RunSucceeded
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=debug cargo run --example connect_first_alive
//! ```

use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use retryvisor::{BackoffPolicy, Config, JitterPolicy, LogWriter, RetryPolicy, Retrier, Subscribe};
use tracing_subscriber::EnvFilter;

const DB_URLS: [&str; 3] = [
    "jdbc:mysql:foo",
    "jdbc:oracle:bar",
    "jdbc:h2:mem:myDb;DB_CLOSE_DELAY=-1",
];

#[derive(Debug)]
struct Connection {
    url: &'static str,
}

/// Pretends to open a connection; only the in-memory DB answers, and only once warmed up.
fn open(url: &'static str, round: u32) -> io::Result<Connection> {
    if url.starts_with("jdbc:h2:mem") && round >= 3 {
        Ok(Connection { url })
    } else {
        Err(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            format!("{url}: connection refused"),
        ))
    }
}

fn connect_first_alive(urls: &[&'static str], round: u32) -> io::Result<Connection> {
    urls.iter()
        .find_map(|url| open(url, round).ok())
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "No alive DB found"))
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let retrier = Retrier::builder(Config::default())
        .with_subscribers(subs)
        .build()?;

    let policy = RetryPolicy::unbounded(
        BackoffPolicy::exponential(Duration::from_millis(100), 2.0)
            .with_max(Duration::from_secs(2))
            .with_jitter(JitterPolicy::Equal),
    )?;

    let rounds = AtomicU32::new(0);
    let handle = retrier.retry_blocking("connect", policy, move || {
        let round = rounds.fetch_add(1, Ordering::Relaxed) + 1;
        println!("[connect] round {round}");
        connect_first_alive(&DB_URLS, round)
    });

    // A deadline the run would never hit on its own.
    let canceller = handle.canceller();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(10)).await;
        canceller.cancel();
    });

    let conn = handle.await?;
    println!("[main] connected to {}", conn.url);

    retrier.shutdown();
    Ok(())
}
