use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, select, Receiver, Sender};
use tracing::{debug, info, trace, warn};

use crate::decode::Decoder;
use crate::frame::RawPayload;
use crate::queue::{DecodedSender, RawReceiver};

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("failed to spawn decode worker {index}: {source}")]
    Spawn {
        index: usize,
        #[source]
        source: std::io::Error,
    },
}

/// Settings for the decode thread pool.
///
/// A single worker keeps decoded output in arrival order; more workers trade
/// that ordering for throughput.
#[derive(Debug, Clone, Copy)]
pub struct WorkerConfig {
    pub workers: usize,
    pub decoder: Decoder,
}

/// Running totals shared by every worker in the pool.
#[derive(Debug, Default)]
struct Counters {
    decoded: AtomicU64,
    failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStats {
    pub decoded: u64,
    pub failed: u64,
}

/// Decode threads sitting between the raw and decoded queues.
///
/// Each worker blocks on the raw queue; dropping the stop sender wakes them all
/// so shutdown never waits for another payload to arrive.
pub struct DecodeWorkers {
    stop: Option<Sender<()>>,
    handles: Vec<JoinHandle<()>>,
    counters: Arc<Counters>,
}

impl DecodeWorkers {
    pub fn spawn(
        config: WorkerConfig,
        raw: RawReceiver,
        decoded: DecodedSender,
    ) -> Result<Self, WorkerError> {
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let counters = Arc::new(Counters::default());
        let count = config.workers.max(1);

        let mut workers = Self {
            stop: Some(stop_tx),
            handles: Vec::with_capacity(count),
            counters: counters.clone(),
        };

        for index in 0..count {
            let raw = raw.channel().clone();
            let stop = stop_rx.clone();
            let decoded = decoded.clone();
            let counters = counters.clone();
            let decoder = config.decoder;
            let handle = thread::Builder::new()
                .name(format!("imageflash-decode-{index}"))
                .spawn(move || run_worker(index, decoder, raw, stop, decoded, counters))
                .map_err(|source| WorkerError::Spawn { index, source })?;
            workers.handles.push(handle);
        }

        info!(
            workers = count,
            resolution = %config.decoder.resolution(),
            "decode workers started"
        );
        Ok(workers)
    }

    pub fn stats(&self) -> WorkerStats {
        WorkerStats {
            decoded: self.counters.decoded.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    /// Wakes every worker and waits for them to exit.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        if self.stop.take().is_none() {
            return;
        }
        for handle in self.handles.drain(..) {
            let name = handle.thread().name().map(str::to_owned);
            if handle.join().is_err() {
                warn!(thread = ?name, "decode worker panicked");
            }
        }
        let stats = self.stats();
        info!(
            decoded = stats.decoded,
            failed = stats.failed,
            "decode workers stopped"
        );
    }
}

impl Drop for DecodeWorkers {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

fn run_worker(
    index: usize,
    decoder: Decoder,
    raw: Receiver<RawPayload>,
    stop: Receiver<()>,
    decoded: DecodedSender,
    counters: Arc<Counters>,
) {
    loop {
        select! {
            recv(raw) -> message => {
                let Ok(payload) = message else {
                    debug!(worker = index, "raw queue closed; decode worker exiting");
                    return;
                };
                match decoder.decode(&payload) {
                    Ok(frame) => {
                        trace!(worker = index, sequence = frame.sequence, "decoded frame");
                        if decoded.send(frame).is_err() {
                            debug!(worker = index, "decoded queue closed; decode worker exiting");
                            return;
                        }
                        counters.decoded.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(err) => {
                        counters.failed.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            worker = index,
                            sequence = payload.sequence,
                            bytes = payload.bytes.len(),
                            error = %err,
                            "dropping undecodable payload"
                        );
                    }
                }
            }
            recv(stop) -> _ => {
                debug!(worker = index, "decode worker received shutdown");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;
    use crate::decode::test_support::png_bytes;
    use crate::decode::ResizeFilter;
    use crate::frame::Resolution;
    use crate::queue::{decoded_queue, raw_queue};

    fn config(workers: usize) -> WorkerConfig {
        WorkerConfig {
            workers,
            decoder: Decoder::new(Resolution::new(4, 4), ResizeFilter::Nearest),
        }
    }

    fn wait_for(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !condition() {
            assert!(Instant::now() < deadline, "timed out waiting for workers");
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn shutdown_wakes_idle_workers() {
        let (_raw_tx, raw_rx) = raw_queue();
        let (decoded_tx, _decoded) = decoded_queue();
        let workers = DecodeWorkers::spawn(config(3), raw_rx, decoded_tx).unwrap();

        let started = Instant::now();
        workers.shutdown();
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn failures_are_dropped_without_stopping_the_worker() {
        let (raw_tx, raw_rx) = raw_queue();
        let (decoded_tx, decoded) = decoded_queue();
        let workers = DecodeWorkers::spawn(config(1), raw_rx, decoded_tx).unwrap();

        raw_tx.push(b"garbage".to_vec()).unwrap();
        raw_tx.push(png_bytes(2, 2, [9, 9, 9, 255])).unwrap();
        raw_tx.push(Vec::new()).unwrap();
        raw_tx.push(png_bytes(8, 8, [1, 1, 1, 255])).unwrap();

        wait_for(|| {
            let stats = workers.stats();
            stats.decoded + stats.failed == 4
        });
        assert_eq!(workers.stats(), WorkerStats { decoded: 2, failed: 2 });

        let sequences: Vec<_> = decoded.drain(0).map(|frame| frame.sequence).collect();
        assert_eq!(sequences, vec![1, 3]);
        workers.shutdown();
    }
}
