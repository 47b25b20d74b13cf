use clap::Parser;
use colored::*;

/// x16-miner - CPU miner for the x16r hash-chain family
#[derive(Parser, Debug)]
#[command(name = "x16-miner")]
#[command(author = "x16-miner developers")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Multi-lane CPU miner for x16r, x16s, x16rv2, hex, x17, sonoa and xevan", long_about = None)]
pub struct Args {
    /// Chain variant (x16r, x16s, x16rv2, hex, x17, sonoa, xevan)
    #[arg(short, long, default_value = "x16r", value_name = "ALGORITHM")]
    pub algo: String,

    /// Number of worker threads (default: one per CPU)
    #[arg(short, long, env = "X16_MINER_THREADS", value_name = "THREADS")]
    pub threads: Option<usize>,

    /// Nonces hashed in parallel per thread: 1, 4, 8 or auto
    #[arg(short, long, env = "X16_MINER_LANES", default_value = "auto", value_name = "LANES")]
    pub lanes: String,

    /// 80-byte block header to scan (hex); omitted runs a benchmark header
    #[arg(long, value_name = "HEX")]
    pub header: Option<String>,

    /// 256-bit target (big-endian hex), required with --header
    #[arg(long, value_name = "HEX")]
    pub target: Option<String>,

    /// Benchmark mode: loose fixed target, candidates are counted only
    #[arg(short, long)]
    pub bench: bool,

    /// Stop after this many seconds
    #[arg(short, long, value_name = "SECONDS")]
    pub seconds: Option<u64>,

    /// Compare multi-lane digests against the scalar path and exit
    #[arg(long)]
    pub selftest: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

pub fn display_banner() {
    let rule = "=".repeat(62);
    println!();
    println!("{}", rule.bright_cyan());
    println!("  {}", "x16-miner - hash chain CPU miner".bright_white().bold());
    println!(
        "  {}",
        format!("Version {} | 1/4/8-lane engine", env!("CARGO_PKG_VERSION")).bright_green()
    );
    println!("{}", rule.bright_cyan());
    println!(
        "  {}",
        "x16r | x16s | x16rv2 | hex | x17 | sonoa | xevan".yellow()
    );
    println!("{}", rule.bright_cyan());
    println!();
}
