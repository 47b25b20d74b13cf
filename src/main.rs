use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::*;

mod cli;

use cli::{display_banner, Args};
use std::future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use x16_miner::algorithms::{BundledSuite, Chain, HashAlgorithm, Variant};
use x16_miner::backend::create_backend;
use x16_miner::config::WorkerConfig;
use x16_miner::lanes::Lanes;
use x16_miner::mining::{MiningStats, Target, Work, HEADER_LEN};
use x16_miner::scanner::{ScanMode, Scanner};
use x16_miner::worker::{spawn_worker, FoundCandidate, WorkerHandle};

const STATS_INTERVAL: Duration = Duration::from_secs(10);
const SELFTEST_NONCES: u32 = 64;

/// Synthetic header for benchmark runs: version 0x20000000, patterned
/// previous hash and merkle root, current time, easy bits
fn bench_header() -> [u8; HEADER_LEN] {
    let mut header = [0u8; HEADER_LEN];
    header[..4].copy_from_slice(&0x2000_0000u32.to_le_bytes());
    for (i, byte) in header[4..68].iter_mut().enumerate() {
        *byte = (i as u8).wrapping_mul(0x9d).wrapping_add(0x3b);
    }
    let ntime = chrono::Utc::now().timestamp() as u32;
    header[68..72].copy_from_slice(&ntime.to_le_bytes());
    header[72..76].copy_from_slice(&0x1e0f_fff0u32.to_le_bytes());
    header
}

fn build_work(args: &Args, mode: ScanMode) -> Result<Work> {
    match (&args.header, &args.target) {
        (Some(header), Some(target)) => Work::from_hex(header, target).context("Invalid --header/--target"),
        (Some(header), None) if mode == ScanMode::Bench => {
            let work = Work::from_hex(header, &hex::encode(Target::bench().to_be_bytes()))
                .context("Invalid --header")?;
            Ok(work)
        }
        (Some(_), None) => bail!("--target is required with --header"),
        (None, _) => Ok(Work::new(bench_header(), Target::bench())),
    }
}

/// Compare every variant's multi-lane digests with the scalar chain
fn run_selftest() -> bool {
    println!("\n{}", "=== Self-test ===".cyan().bold());
    let header = bench_header();
    let mut all_passed = true;

    for variant in Variant::ALL {
        let chain = Chain::<BundledSuite>::new(variant);
        for lanes in [Lanes::One, Lanes::Four, Lanes::Eight] {
            let mut scanner = Scanner::new(chain.clone(), lanes, ScanMode::Live);
            let mut work = Work::new(header, Target::MAX);
            work.set_nonce(0);

            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                scanner.scan(&mut work, SELFTEST_NONCES, &AtomicBool::new(false))
            }));
            let passed = match result {
                Ok(outcome) => {
                    outcome.candidates.len() == SELFTEST_NONCES as usize
                        && outcome
                            .candidates
                            .iter()
                            .all(|c| c.digest == chain.hash_chain(&header, c.nonce))
                }
                Err(_) => false,
            };

            let mark = if passed { "ok".green() } else { "FAILED".red().bold() };
            println!("   {:<8} x{} lanes  {}", chain.name(), lanes, mark);
            all_passed &= passed;
        }
    }

    let digest = Chain::<BundledSuite>::new(Variant::X16r).hash(&header);
    tracing::debug!("x16r bench header digest {}", hex::encode(digest));
    all_passed
}

/// Split the nonce space into one contiguous range per worker
fn nonce_ranges(threads: usize) -> Vec<(u32, u32)> {
    let span = (u32::MAX as u64 + 1) / threads as u64;
    (0..threads as u64)
        .map(|i| {
            let start = i * span;
            let end = if i + 1 == threads as u64 {
                u32::MAX as u64
            } else {
                start + span
            };
            (start as u32, end as u32)
        })
        .collect()
}

fn print_stats(workers: &[WorkerHandle], stats: &MiningStats, rate: f64) {
    println!(
        "[{}] {} {:.2} kH/s   {} {}   {} {}",
        chrono::Local::now().format("%H:%M:%S"),
        "hashrate".green(),
        rate / 1_000.0,
        "hashes".green(),
        stats.hashes,
        "workers".green(),
        workers.len()
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let start_time = Instant::now();

    // Parse command-line arguments
    let args = Args::parse();

    // Initialize logging
    let default_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    if args.no_color {
        colored::control::set_override(false);
    }

    display_banner();

    if args.selftest {
        if run_selftest() {
            println!("\n{}", "All lane widths agree with the scalar path".green().bold());
            return Ok(());
        }
        eprintln!("\n{}", "Self-test failed".red().bold());
        std::process::exit(1);
    }

    let bench = args.bench || args.header.is_none();
    let config = WorkerConfig::new(&args.algo, &args.lanes, args.threads, bench)?;
    let work = build_work(&args, config.mode)?;

    // Display configuration
    println!("\n{}", "=== Mining Configuration ===".cyan().bold());
    println!("{:<15} {}", "Algorithm:".green(), config.variant.to_string().bright_white());
    println!("{:<15} {}", "Threads:".green(), config.threads.to_string().bright_white());
    println!("{:<15} {}", "Lanes:".green(), config.lanes.to_string().bright_white());
    println!("{:<15} {:?}", "Mode:".green(), config.mode);
    println!("{:<15} {}", "Target:".green(), work.target);
    println!();

    tracing::info!("Starting {} worker(s)...", config.threads);

    let (candidate_tx, mut candidate_rx) = mpsc::channel::<FoundCandidate>(256);
    let mut workers = Vec::with_capacity(config.threads);
    for (i, (start, end)) in nonce_ranges(config.threads).into_iter().enumerate() {
        let backend = create_backend(config.variant, config.lanes, config.mode);
        let handle = spawn_worker(format!("cpu{}", i), backend, candidate_tx.clone())?;
        let mut job = work.clone();
        job.set_nonce(start);
        handle.new_work(1, job, end)?;
        workers.push(handle);
    }
    drop(candidate_tx);

    let mut stats = MiningStats::new();
    let mut last_hashes = 0u64;
    let mut last_sample = Instant::now();
    let mut ticker = tokio::time::interval(STATS_INTERVAL);
    ticker.tick().await;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let deadline = async {
        match args.seconds {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    println!("\n{}", "=== Mining Status ===".cyan().bold());

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                match result {
                    Ok(()) => println!("\n{}", "Interrupt signal received, shutting down...".yellow().bold()),
                    Err(err) => eprintln!("Unable to listen for shutdown signal: {}", err),
                }
                break;
            }
            _ = &mut deadline => {
                println!("\n{}", "Time limit reached, shutting down...".yellow());
                break;
            }
            found = candidate_rx.recv() => {
                let Some(found) = found else {
                    tracing::warn!("All workers stopped");
                    break;
                };
                stats.candidates_found += 1;
                println!("\n{}", "CANDIDATE FOUND".green().bold());
                println!("   {} {}", "Worker:".green(), found.worker);
                println!("   {} 0x{:08x}", "Nonce:".green(), found.candidate.nonce);
                println!("   {} {}", "Hash:".green(), hex::encode(found.candidate.digest));
            }
            _ = ticker.tick() => {
                stats.hashes = workers.iter().map(WorkerHandle::hashes_done).sum();
                let elapsed = last_sample.elapsed().as_secs_f64();
                let rate = stats.hashes.saturating_sub(last_hashes) as f64 / elapsed.max(f64::EPSILON);
                tracing::trace!("sampled {} hashes in {:.3}s", stats.hashes - last_hashes, elapsed);
                print_stats(&workers, &stats, rate);
                last_hashes = stats.hashes;
                last_sample = Instant::now();
            }
        }
    }

    stats.hashes = workers.iter().map(WorkerHandle::hashes_done).sum();
    stats.bench_hits = workers.iter().map(WorkerHandle::bench_hits).sum();
    // unblocks any worker waiting in blocking_send
    drop(candidate_rx);
    for worker in workers {
        worker.shutdown();
    }

    let elapsed = start_time.elapsed().as_secs_f64();
    println!("\n{}", "=== Final Statistics ===".cyan().bold());
    println!("   {} {}", "Total Hashes:".green(), stats.hashes);
    println!("   {} {:.2} kH/s", "Average:".green(), stats.hashes as f64 / elapsed.max(f64::EPSILON) / 1_000.0);
    println!("   {} {}", "Candidates:".green(), stats.candidates_found);
    if config.mode == ScanMode::Bench {
        println!("   {} {}", "Bench Hits:".green(), stats.bench_hits);
    }

    Ok(())
}
