//! Mining worker thread.
//!
//! Each worker owns one [`HashBackend`] on a dedicated `std::thread` so
//! hashing never blocks the Tokio runtime. Work arrives over a std `mpsc`
//! channel; a new job raises the restart flag so the running scan stops at
//! its next batch boundary. Candidates go out in scan order over a Tokio
//! channel with `blocking_send`.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::backend::HashBackend;
use crate::mining::Work;
use crate::scanner::{Candidate, ScanStatus};

/// Nonces scanned between command checks and hash-counter updates
pub const SCAN_CHUNK: u32 = 1 << 16;

const IDLE_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("Worker {0} is no longer running")]
    Disconnected(String),

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[from] io::Error),
}

/// Commands sent to the worker thread
#[derive(Debug)]
pub enum WorkerCommand {
    /// Scan `work` from its current nonce up to `max_nonce`
    NewWork { job_id: u64, work: Work, max_nonce: u32 },
    /// Stop hashing until the next job
    Idle,
    Shutdown,
}

/// Candidate tagged with the worker and job it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundCandidate {
    pub worker: String,
    pub job_id: u64,
    pub candidate: Candidate,
}

struct Job {
    id: u64,
    work: Work,
    max_nonce: u32,
}

/// Controller side of a worker thread
#[derive(Debug)]
pub struct WorkerHandle {
    name: String,
    cmd_tx: mpsc::Sender<WorkerCommand>,
    restart: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    hashes: Arc<AtomicU64>,
    bench_hits: Arc<AtomicU64>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replace the current job; the running scan stops at its next batch boundary
    pub fn new_work(&self, job_id: u64, work: Work, max_nonce: u32) -> Result<(), WorkerError> {
        self.send(WorkerCommand::NewWork {
            job_id,
            work,
            max_nonce,
        })?;
        self.restart.store(true, Ordering::Release);
        Ok(())
    }

    pub fn idle(&self) -> Result<(), WorkerError> {
        self.send(WorkerCommand::Idle)?;
        self.restart.store(true, Ordering::Release);
        Ok(())
    }

    /// Total nonces hashed so far
    pub fn hashes_done(&self) -> u64 {
        self.hashes.load(Ordering::Relaxed)
    }

    /// Target hits counted in bench mode
    pub fn bench_hits(&self) -> u64 {
        self.bench_hits.load(Ordering::Relaxed)
    }

    /// Stop the thread and wait for it to exit
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn send(&self, cmd: WorkerCommand) -> Result<(), WorkerError> {
        self.cmd_tx
            .send(cmd)
            .map_err(|_| WorkerError::Disconnected(self.name.clone()))
    }

    fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        self.restart.store(true, Ordering::Release);
        let _ = self.cmd_tx.send(WorkerCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Worker {} panicked", self.name);
            }
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Spawn a named worker thread around `backend`
pub fn spawn_worker(
    name: String,
    backend: Box<dyn HashBackend>,
    candidate_tx: tokio::sync::mpsc::Sender<FoundCandidate>,
) -> Result<WorkerHandle, WorkerError> {
    let (cmd_tx, cmd_rx) = mpsc::channel();
    let restart = Arc::new(AtomicBool::new(false));
    let shutdown = Arc::new(AtomicBool::new(false));
    let hashes = Arc::new(AtomicU64::new(0));
    let bench_hits = Arc::new(AtomicU64::new(0));

    let thread = {
        let shared = Shared {
            restart: restart.clone(),
            shutdown: shutdown.clone(),
            hashes: hashes.clone(),
            bench_hits: bench_hits.clone(),
        };
        let name = name.clone();
        thread::Builder::new()
            .name(name.clone())
            .spawn(move || run_worker(name, backend, cmd_rx, candidate_tx, shared))?
    };

    Ok(WorkerHandle {
        name,
        cmd_tx,
        restart,
        shutdown,
        hashes,
        bench_hits,
        thread: Some(thread),
    })
}

/// Flags and counters shared between a worker thread and its handle
struct Shared {
    restart: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    hashes: Arc<AtomicU64>,
    bench_hits: Arc<AtomicU64>,
}

enum Control {
    Continue,
    Exit,
}

fn apply_command(cmd: WorkerCommand, job: &mut Option<Job>, name: &str) -> Control {
    match cmd {
        WorkerCommand::NewWork {
            job_id,
            work,
            max_nonce,
        } => {
            debug!("Worker {} job {} from {:08x} to {:08x}", name, job_id, work.nonce(), max_nonce);
            *job = Some(Job {
                id: job_id,
                work,
                max_nonce,
            });
            Control::Continue
        }
        WorkerCommand::Idle => {
            *job = None;
            Control::Continue
        }
        WorkerCommand::Shutdown => Control::Exit,
    }
}

fn run_worker(
    name: String,
    mut backend: Box<dyn HashBackend>,
    cmd_rx: mpsc::Receiver<WorkerCommand>,
    candidate_tx: tokio::sync::mpsc::Sender<FoundCandidate>,
    shared: Shared,
) {
    let Shared {
        restart,
        shutdown,
        hashes,
        bench_hits,
    } = shared;
    info!(
        "Worker {} started: {} x{} lanes",
        name,
        backend.algorithm_name(),
        backend.lanes()
    );
    let mut job: Option<Job> = None;

    loop {
        if shutdown.load(Ordering::Acquire) {
            break;
        }

        // commands are queued before the flag is raised, so a flag cleared here
        // belongs to a command the drain below still sees
        restart.store(false, Ordering::Release);
        loop {
            match cmd_rx.try_recv() {
                Ok(cmd) => {
                    if let Control::Exit = apply_command(cmd, &mut job, &name) {
                        return;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return,
            }
        }

        if job.is_none() {
            match cmd_rx.recv_timeout(IDLE_POLL) {
                Ok(cmd) => {
                    if let Control::Exit = apply_command(cmd, &mut job, &name) {
                        return;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return,
            }
            continue;
        }
        let Some(current) = job.as_mut() else {
            continue;
        };

        let start = current.work.nonce();
        let chunk_end = start.saturating_add(SCAN_CHUNK).min(current.max_nonce);
        let outcome = backend.scan(&mut current.work, chunk_end, &restart);
        hashes.fetch_add(outcome.hashes_done, Ordering::Relaxed);
        bench_hits.fetch_add(outcome.bench_hits, Ordering::Relaxed);

        for candidate in outcome.candidates {
            debug!(
                "Worker {} candidate nonce {:08x} (job {})",
                name, candidate.nonce, current.id
            );
            let found = FoundCandidate {
                worker: name.clone(),
                job_id: current.id,
                candidate,
            };
            if candidate_tx.blocking_send(found).is_err() {
                debug!("Worker {} candidate channel closed", name);
                return;
            }
        }

        if outcome.status == ScanStatus::Exhausted && outcome.next_nonce >= current.max_nonce {
            debug!("Worker {} exhausted job {}", name, current.id);
            job = None;
        }
    }

    debug!("Worker {} stopped", name);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::Variant;
    use crate::backend::create_backend;
    use crate::lanes::Lanes;
    use crate::mining::Target;
    use crate::scanner::ScanMode;

    fn easy_work(start: u32) -> Work {
        let mut work = Work::new([9u8; 80], Target::MAX);
        work.set_nonce(start);
        work
    }

    #[test]
    fn test_worker_reports_candidates_in_order() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(64);
        let backend = create_backend(Variant::X16r, Lanes::Four, ScanMode::Live);
        let handle = spawn_worker("cpu0".to_string(), backend, tx).unwrap();

        handle.new_work(7, easy_work(10), 22).unwrap();
        let mut nonces = Vec::new();
        while nonces.len() < 12 {
            let found = rx.blocking_recv().unwrap();
            assert_eq!(found.worker, "cpu0");
            assert_eq!(found.job_id, 7);
            nonces.push(found.candidate.nonce);
        }
        assert_eq!(nonces, (10..22).collect::<Vec<u32>>());

        // hashes are published after each scan returns
        while handle.hashes_done() < 12 {
            thread::sleep(Duration::from_millis(5));
        }
        handle.shutdown();
    }

    #[test]
    fn test_new_work_interrupts_running_job() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(64);
        let backend = create_backend(Variant::X16r, Lanes::One, ScanMode::Live);
        let handle = spawn_worker("cpu2".to_string(), backend, tx).unwrap();

        // a job that never yields a candidate
        let mut hopeless = Work::new([3u8; 80], Target::from_words([0; 4]));
        hopeless.set_nonce(0);
        handle.new_work(1, hopeless, u32::MAX).unwrap();
        thread::sleep(Duration::from_millis(20));

        let started = std::time::Instant::now();
        handle.new_work(2, easy_work(500), 501).unwrap();
        let found = rx.blocking_recv().unwrap();
        assert_eq!(found.job_id, 2);
        assert_eq!(found.candidate.nonce, 500);
        // well under the time a full scan chunk of the old job would take
        assert!(started.elapsed() < Duration::from_secs(5));
        handle.shutdown();
    }

    #[test]
    fn test_worker_shuts_down_while_idle() {
        let (tx, _rx) = tokio::sync::mpsc::channel(1);
        let backend = create_backend(Variant::X16r, Lanes::One, ScanMode::Bench);
        let handle = spawn_worker("cpu1".to_string(), backend, tx).unwrap();
        handle.idle().unwrap();
        assert_eq!(handle.hashes_done(), 0);
        handle.shutdown();
    }
}
