use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use workbench::prelude::*;

/// Checksum job: fails on purpose when fed a multiple of `FAIL_EVERY`.
const FAIL_EVERY: u64 = 997;

#[tokio::main]
async fn main() -> WorkResult<()> {
    let config = WorkConfig::from_env();
    workbench::logging::init(&config.logging)?;
    if let Err(errors) = config.validate() {
        return Err(WorkError::config(errors.join("; ")));
    }

    let run_for = workbench::env::int("WORK_DEMO_SECONDS", 10u64);
    let root = Signal::new().on_interrupt().with_timeout(run_for.secs());
    let (runner, signal) = Runner::new(&root);

    let processed = Arc::new(AtomicU64::new(0));
    let queue = {
        let processed = Arc::clone(&processed);
        Arc::new(ErrQueue::new(
            move |signal: Signal, n: u64| {
                let processed = Arc::clone(&processed);
                async move {
                    tokio::select! {
                        _ = signal.cancelled() => return Ok(()),
                        _ = tokio::time::sleep(Duration::from_millis(n % 7)) => {}
                    }
                    if n > 0 && n % FAIL_EVERY == 0 {
                        return Err(WorkError::failed(format!("checksum mismatch for job {n}")));
                    }
                    processed.fetch_add(1, Ordering::Relaxed);
                    Ok(())
                }
            },
            config.queue,
        ))
    };

    tracing::info!(
        "Pipeline running for up to {}s with {} workers, press Ctrl+C to stop",
        run_for,
        queue.workers()
    );

    // consume
    {
        let queue = Arc::clone(&queue);
        let signal = signal.clone();
        runner.run(async move { queue.run(&signal).await });
    }

    // produce
    {
        let queue = Arc::clone(&queue);
        let signal = signal.clone();
        let throttler = config.throttle.build();
        runner.run(async move {
            let mut next = 0u64;
            while !signal.is_cancelled() {
                if queue.push(next) {
                    next += 1;
                } else {
                    throttler.execute(|| tracing::debug!("Queue full, backing off"));
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
            }
            Ok(())
        });
    }

    // report
    {
        let signal = signal.clone();
        let processed = Arc::clone(&processed);
        let throttler = Throttler::new(Duration::from_secs(1));
        runner.run(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(100));
            loop {
                tokio::select! {
                    _ = signal.cancelled() => return Ok(()),
                    _ = ticker.tick() => {
                        throttler.execute(|| {
                            tracing::info!("Processed {} jobs", processed.load(Ordering::Relaxed));
                        });
                    }
                }
            }
        });
    }

    let result = runner.wait().await;
    tracing::info!(
        "Pipeline stopped after {} jobs",
        processed.load(Ordering::Relaxed)
    );

    match result {
        Err(WorkError::DeadlineExceeded) => Ok(()),
        other => other,
    }
}
