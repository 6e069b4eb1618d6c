//! # Example: send_mail
//!
//! Sends a message through the first available SMTP server, retrying the whole
//! round 10 times with a fixed 10ms delay. Every server refuses, so the run is
//! exhausted and the demo reports `false`.
//!
//! The failure observer prints each failed attempt as `"{attempt} of {max} {message}"`.
//!
//! ## Run
//! ```bash
//! cargo run --example send_mail
//! ```

use std::time::Duration;

use retryvisor::{BackoffPolicy, Config, RetryError, RetryPolicy, Retrier};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
enum MailError {
    #[error("Can't send message '{msg}' to {server}")]
    Refused { server: String, msg: String },
    #[error("No alive smtp servers")]
    NoAliveServers,
}

fn send_mail(server: &str, msg: &str) -> Result<(), MailError> {
    Err(MailError::Refused {
        server: server.to_owned(),
        msg: msg.to_owned(),
    })
}

fn send_first_available(servers: &[&str], msg: &str) -> Result<(), MailError> {
    for server in servers {
        match send_mail(server, msg) {
            Ok(()) => return Ok(()),
            Err(e) => tracing::debug!(%server, error = %e, "smtp server refused"),
        }
    }
    Err(MailError::NoAliveServers)
}

async fn send_with_retry(retrier: &Retrier, servers: Vec<String>, msg: String) -> bool {
    let policy = match RetryPolicy::builder()
        .with_backoff(BackoffPolicy::fixed(Duration::from_millis(10)))
        .with_max_attempts(10)
        .with_on_failure(|attempt, max, failure| println!("{attempt} of {max} {failure}"))
        .build()
    {
        Ok(policy) => policy,
        Err(e) => {
            eprintln!("invalid policy: {e}");
            return false;
        }
    };

    let handle = retrier.retry_blocking("send-mail", policy, move || {
        let servers: Vec<&str> = servers.iter().map(String::as_str).collect();
        send_first_available(&servers, &msg)
    });

    match handle.await {
        Ok(()) => true,
        Err(RetryError::Exhausted { attempts, last }) => {
            println!("[main] gave up after {attempts} attempts: {last}");
            false
        }
        Err(e) => {
            println!("[main] {e}");
            false
        }
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let retrier = Retrier::new(Config::default())?;
    let sent = send_with_retry(
        &retrier,
        vec!["smtp1".into(), "smtp2".into()],
        "Some message".into(),
    )
    .await;

    println!("[main] sent = {sent}");
    Ok(())
}
