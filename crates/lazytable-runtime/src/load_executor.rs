#![forbid(unsafe_code)]

//! Off-thread execution of row loads.
//!
//! The cache store hands every load to a [`LoadExecutor`] together with a
//! [`CancellationToken`]. Loads run on a small pool of worker threads and
//! post a [`Completion`] into a channel. Nothing a worker produces touches
//! the cache directly: the UI thread calls [`LoadExecutor::drain`] from its
//! own loop and applies completions there, which keeps every cache mutation
//! on one thread.
//!
//! # How it works
//!
//! 1. `submit()` stamps the load with a fresh ticket and queues it
//! 2. A worker picks it up, skipping it if its token was cancelled meanwhile
//! 3. The loader runs; a panic is contained and becomes [`LoadError::Panicked`]
//! 4. Unless cancelled in the meantime, the completion is posted for `drain()`
//!
//! [`LoadExecutor::inline`] runs each load synchronously inside `submit()` but
//! still delivers through the channel, so tests see the same ordering as the
//! threaded pool without sleeping.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;

use lazytable_core::LoadError;
use tracing::{debug, trace};

use crate::cancellation::CancellationToken;

/// Identifies one issued load. Tickets are never reused by an executor.
pub type Ticket = u64;

/// A load producing one row's data.
pub type LoadJob<R> = Box<dyn FnOnce() -> Result<R, LoadError> + Send + 'static>;

/// Result of a load, delivered back to the UI thread.
#[derive(Debug)]
pub struct Completion<R> {
    /// Ticket returned by `submit()`.
    pub ticket: Ticket,
    /// Row key the load was submitted under.
    pub row: usize,
    /// What the loader produced.
    pub result: Result<R, LoadError>,
}

struct QueuedLoad<R> {
    ticket: Ticket,
    row: usize,
    token: CancellationToken,
    job: LoadJob<R>,
}

enum Dispatch<R> {
    Inline,
    Workers {
        queue: mpsc::Sender<QueuedLoad<R>>,
        threads: Vec<thread::JoinHandle<()>>,
    },
}

/// Runs loads off the UI thread and collects their completions.
pub struct LoadExecutor<R: Send + 'static> {
    dispatch: Dispatch<R>,
    done_tx: mpsc::Sender<Completion<R>>,
    done_rx: mpsc::Receiver<Completion<R>>,
    next_ticket: Ticket,
}

impl<R: Send + 'static> LoadExecutor<R> {
    /// Run loads synchronously at submit time.
    pub fn inline() -> Self {
        let (done_tx, done_rx) = mpsc::channel();
        Self {
            dispatch: Dispatch::Inline,
            done_tx,
            done_rx,
            next_ticket: 0,
        }
    }

    /// Run loads on `count` worker threads (at least one).
    pub fn with_workers(count: usize) -> Self {
        let count = count.max(1);
        let (done_tx, done_rx) = mpsc::channel();
        let (queue, jobs) = mpsc::channel::<QueuedLoad<R>>();
        let jobs = Arc::new(Mutex::new(jobs));

        let threads = (0..count)
            .map(|worker| {
                let jobs = Arc::clone(&jobs);
                let done = done_tx.clone();
                thread::spawn(move || worker_loop(worker, &jobs, &done))
            })
            .collect();

        debug!(workers = count, "Started load workers");
        Self {
            dispatch: Dispatch::Workers { queue, threads },
            done_tx,
            done_rx,
            next_ticket: 0,
        }
    }

    /// Number of worker threads (zero for an inline executor).
    pub fn worker_count(&self) -> usize {
        match &self.dispatch {
            Dispatch::Inline => 0,
            Dispatch::Workers { threads, .. } => threads.len(),
        }
    }

    /// Queue a load for `row`, returning its ticket.
    pub fn submit(&mut self, row: usize, token: CancellationToken, job: LoadJob<R>) -> Ticket {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        let load = QueuedLoad {
            ticket,
            row,
            token,
            job,
        };
        trace!(ticket, row, "Submitting load");

        match &self.dispatch {
            Dispatch::Inline => {
                if let Some(done) = run_load(load) {
                    let _ = self.done_tx.send(done);
                }
            }
            Dispatch::Workers { queue, .. } => {
                if let Err(mpsc::SendError(load)) = queue.send(load) {
                    // Every worker is gone; run on the caller rather than lose the row.
                    if let Some(done) = run_load(load) {
                        let _ = self.done_tx.send(done);
                    }
                }
            }
        }
        ticket
    }

    /// Take every completion posted so far without blocking.
    pub fn drain(&self) -> Vec<Completion<R>> {
        self.done_rx.try_iter().collect()
    }

    /// Stop accepting loads and wait for the workers to finish their queue.
    pub fn shutdown(self) {
        let Self { dispatch, .. } = self;
        if let Dispatch::Workers { queue, threads } = dispatch {
            drop(queue);
            for handle in threads {
                let _ = handle.join();
            }
            debug!("Load workers stopped");
        }
    }
}

fn worker_loop<R: Send + 'static>(
    worker: usize,
    jobs: &Mutex<mpsc::Receiver<QueuedLoad<R>>>,
    done: &mpsc::Sender<Completion<R>>,
) {
    loop {
        let next = {
            let guard = jobs.lock().unwrap_or_else(|e| e.into_inner());
            guard.recv()
        };
        let Ok(load) = next else {
            break;
        };
        if let Some(completion) = run_load(load)
            && done.send(completion).is_err()
        {
            break;
        }
    }
    trace!(worker, "Load worker exiting");
}

fn run_load<R>(load: QueuedLoad<R>) -> Option<Completion<R>> {
    let QueuedLoad {
        ticket,
        row,
        token,
        job,
    } = load;

    if token.is_cancelled() {
        trace!(ticket, row, "Skipping cancelled load");
        return None;
    }

    let result = match panic::catch_unwind(AssertUnwindSafe(job)) {
        Ok(result) => result,
        Err(payload) => Err(LoadError::Panicked {
            row,
            message: panic_message(payload.as_ref()),
        }),
    };

    if token.is_cancelled() {
        trace!(ticket, row, "Dropping result of cancelled load");
        return None;
    }
    Some(Completion {
        ticket,
        row,
        result,
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::CancellationSource;
    use std::time::{Duration, Instant};

    fn wait_for<R: Send + 'static>(exec: &LoadExecutor<R>, want: usize) -> Vec<Completion<R>> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut got = Vec::new();
        while got.len() < want && Instant::now() < deadline {
            got.extend(exec.drain());
            thread::sleep(Duration::from_millis(2));
        }
        got
    }

    #[test]
    fn inline_delivers_through_channel() {
        let mut exec = LoadExecutor::inline();
        let source = CancellationSource::new();
        let ticket = exec.submit(4, source.token(), Box::new(|| Ok(40)));

        let done = exec.drain();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].ticket, ticket);
        assert_eq!(done[0].row, 4);
        assert_eq!(done[0].result, Ok(40));
        assert!(exec.drain().is_empty());
        assert_eq!(exec.worker_count(), 0);
    }

    #[test]
    fn tickets_are_unique() {
        let mut exec = LoadExecutor::inline();
        let source = CancellationSource::new();
        let a = exec.submit(0, source.token(), Box::new(|| Ok(())));
        let b = exec.submit(0, source.token(), Box::new(|| Ok(())));
        assert_ne!(a, b);
    }

    #[test]
    fn cancelled_load_is_skipped() {
        let mut exec = LoadExecutor::<u32>::inline();
        let source = CancellationSource::new();
        source.cancel();
        exec.submit(1, source.token(), Box::new(|| panic!("must not run")));
        assert!(exec.drain().is_empty());
    }

    #[test]
    fn loader_error_is_delivered() {
        let mut exec = LoadExecutor::<u32>::inline();
        let source = CancellationSource::new();
        exec.submit(2, source.token(), Box::new(|| Err(LoadError::failed(2, "nope"))));
        let done = exec.drain();
        assert_eq!(done[0].result, Err(LoadError::failed(2, "nope")));
    }

    #[test]
    fn panic_becomes_load_error() {
        let mut exec = LoadExecutor::<u32>::inline();
        let source = CancellationSource::new();
        exec.submit(9, source.token(), Box::new(|| panic!("loader exploded")));
        let done = exec.drain();
        match &done[0].result {
            Err(LoadError::Panicked { row, message }) => {
                assert_eq!(*row, 9);
                assert!(message.contains("loader exploded"));
            }
            other => panic!("expected panic error, got {other:?}"),
        }
    }

    #[test]
    fn workers_complete_loads() {
        let mut exec = LoadExecutor::with_workers(3);
        assert_eq!(exec.worker_count(), 3);
        let source = CancellationSource::new();
        for row in 0..10 {
            exec.submit(row, source.token(), Box::new(move || Ok(row * 2)));
        }
        let mut done = wait_for(&exec, 10);
        done.sort_by_key(|c| c.row);
        assert_eq!(done.len(), 10);
        for (i, c) in done.iter().enumerate() {
            assert_eq!(c.row, i);
            assert_eq!(c.result, Ok(i * 2));
        }
        exec.shutdown();
    }

    #[test]
    fn queued_load_cancelled_before_start_never_completes() {
        let mut exec = LoadExecutor::with_workers(1);
        let (gate_tx, gate_rx) = mpsc::channel::<()>();
        let first = CancellationSource::new();
        let second = CancellationSource::new();

        exec.submit(
            0,
            first.token(),
            Box::new(move || {
                let _ = gate_rx.recv();
                Ok(0)
            }),
        );
        exec.submit(1, second.token(), Box::new(|| Ok(1)));
        second.cancel();
        gate_tx.send(()).unwrap();

        let done = wait_for(&exec, 1);
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].row, 0);

        thread::sleep(Duration::from_millis(20));
        assert!(exec.drain().is_empty());
        exec.shutdown();
    }

    #[test]
    fn zero_workers_rounds_up_to_one() {
        let exec = LoadExecutor::<()>::with_workers(0);
        assert_eq!(exec.worker_count(), 1);
        exec.shutdown();
    }
}
