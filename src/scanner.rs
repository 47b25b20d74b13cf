//! Per-thread nonce scan loop.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, trace};

use crate::algorithms::primitive::PrimitiveSuite;
use crate::algorithms::{AlgoOrder, BundledSuite, Chain, Midstate, OrderCache};
use crate::lanes::{LaneBatch, LaneEngine, Lanes, Layout};
use crate::mining::{digest_top_word, header_with_nonce, Target, Work, HEADER_LEN, NONCE_OFFSET};

/// Polled once per batch; `true` abandons the scan at that boundary
pub trait RestartSignal {
    fn restart_requested(&self) -> bool;
}

impl RestartSignal for AtomicBool {
    fn restart_requested(&self) -> bool {
        self.load(Ordering::Acquire)
    }
}

impl<F: Fn() -> bool> RestartSignal for F {
    fn restart_requested(&self) -> bool {
        self()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Report candidates that meet the work target
    Live,
    /// Loose fixed target, hits are counted but never reported
    Bench,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Scanning,
    Restarted,
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStatus {
    /// Every nonce below `max_nonce` was hashed
    Exhausted,
    /// Stopped at a batch boundary on request
    Restarted,
}

/// A nonce whose digest met the target, verified on the scalar path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub nonce: u32,
    pub digest: [u8; 32],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutcome {
    pub candidates: Vec<Candidate>,
    pub hashes_done: u64,
    /// First nonce not hashed; also written back into the work header
    pub next_nonce: u32,
    pub status: ScanStatus,
    /// Target hits counted in bench mode
    pub bench_hits: u64,
}

/// One worker's scan context: chain, lane engine and the order/midstate caches
pub struct Scanner<S: PrimitiveSuite = BundledSuite> {
    chain: Chain<S>,
    lanes: Lanes,
    mode: ScanMode,
    state: ScanState,
    orders: OrderCache,
    midstate: Option<Midstate<S>>,
    engine: LaneEngine<S>,
    headers: LaneBatch,
}

impl<S: PrimitiveSuite> Scanner<S> {
    pub fn new(chain: Chain<S>, lanes: Lanes, mode: ScanMode) -> Self {
        let orders = OrderCache::new(chain.order_rule());
        Self {
            chain,
            lanes,
            mode,
            state: ScanState::Idle,
            orders,
            midstate: None,
            engine: LaneEngine::new(lanes),
            headers: LaneBatch::new(lanes, HEADER_LEN, Layout::Linear),
        }
    }

    pub fn chain(&self) -> &Chain<S> {
        &self.chain
    }

    pub fn lanes(&self) -> Lanes {
        self.lanes
    }

    pub fn mode(&self) -> ScanMode {
        self.mode
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Hash every nonce from `work.nonce()` up to (excluding) `max_nonce`.
    ///
    /// `restart` is polled after every batch. On return the work header's
    /// nonce field holds the first nonce not hashed.
    ///
    /// # Panics
    /// Panics if a lane digest disagrees with the scalar recomputation.
    pub fn scan<R>(&mut self, work: &mut Work, max_nonce: u32, restart: &R) -> ScanOutcome
    where
        R: RestartSignal + ?Sized,
    {
        let first_nonce = work.nonce();
        let target = match self.mode {
            ScanMode::Live => work.target,
            ScanMode::Bench => Target::bench(),
        };
        let order = self.prepare(&work.header);

        let width = self.lanes.count() as u64;
        let end = max_nonce as u64;
        let mut nonce = first_nonce as u64;
        let mut status = ScanStatus::Exhausted;
        let mut found = Vec::new();
        let mut bench_hits = 0u64;

        while nonce < end {
            let batch = if width > 1 && nonce + width <= end {
                self.scan_lanes(&work.header, nonce as u32, &order, &target, &mut found)
            } else {
                // tail shorter than the lane count
                self.scan_single(&work.header, nonce as u32, &order, &target, &mut found)
            };
            nonce += batch;

            if restart.restart_requested() {
                status = ScanStatus::Restarted;
                break;
            }
        }

        match self.mode {
            ScanMode::Live => {
                for candidate in &found {
                    info!(
                        "{} candidate nonce {:08x} hash {}",
                        self.chain.name(),
                        candidate.nonce,
                        hex::encode(candidate.digest)
                    );
                }
            }
            ScanMode::Bench => {
                bench_hits = found.len() as u64;
                found.clear();
            }
        }

        let next_nonce = nonce as u32;
        work.set_nonce(next_nonce);
        self.state = match status {
            ScanStatus::Exhausted => ScanState::Exhausted,
            ScanStatus::Restarted => ScanState::Restarted,
        };

        let hashes_done = nonce - first_nonce as u64;
        trace!(
            "{} scan {:08x}..{:08x}: {} hashes, {} candidates, {:?}",
            self.chain.name(),
            first_nonce,
            next_nonce,
            hashes_done,
            found.len(),
            status
        );

        ScanOutcome {
            candidates: found,
            hashes_done,
            next_nonce,
            status,
            bench_hits,
        }
    }

    /// Enter `Scanning`: refresh the order, midstate and header batch
    fn prepare(&mut self, header: &[u8; HEADER_LEN]) -> AlgoOrder {
        self.state = ScanState::Scanning;

        let order = if self.chain.pipeline().uses_order() {
            self.orders.refresh(header)
        } else {
            // fixed pipelines never read it
            AlgoOrder::select(self.chain.order_rule(), &[0; 8])
        };
        let consumer = self.chain.pipeline().header_consumer(&order);
        let stale = match &self.midstate {
            Some(mid) => !mid.matches(consumer, header),
            None => true,
        };
        if stale {
            self.midstate = self.chain.midstate(header, &order);
        }

        if self.lanes != Lanes::One {
            let layout = LaneEngine::header_layout(&self.chain, &order);
            self.headers.reshape(self.lanes, HEADER_LEN, layout);
            for lane in 0..self.lanes.count() {
                self.headers.write_lane(lane, header);
            }
        }
        order
    }

    fn scan_lanes(
        &mut self,
        header: &[u8; HEADER_LEN],
        base: u32,
        order: &AlgoOrder,
        target: &Target,
        found: &mut Vec<Candidate>,
    ) -> u64 {
        for lane in 0..self.lanes.count() {
            let nonce = base.wrapping_add(lane as u32);
            self.headers.write_lane_range(lane, NONCE_OFFSET, &nonce.to_le_bytes());
        }

        let Self {
            chain,
            lanes,
            engine,
            headers,
            midstate,
            ..
        } = self;
        let digests = engine.hash_batch(chain, headers, order, midstate.as_ref());

        for lane in 0..digests.lanes().count() {
            if digests.lane_u32(lane, 7) > target.top_word() {
                continue;
            }
            let digest: [u8; 32] = digests.extract_lane(lane);
            let nonce = base.wrapping_add(lane as u32);
            if !target.is_met_by(&digest) {
                trace!("nonce {:08x} passed the word-7 filter only", nonce);
                continue;
            }
            Self::record(chain, header, nonce, &digest, target, found);
        }
        lanes.count() as u64
    }

    fn scan_single(
        &mut self,
        header: &[u8; HEADER_LEN],
        nonce: u32,
        order: &AlgoOrder,
        target: &Target,
        found: &mut Vec<Candidate>,
    ) -> u64 {
        let hashed = header_with_nonce(header, nonce);
        let digest = self.chain.hash_with(&hashed, order, self.midstate.as_ref());
        if digest_top_word(&digest) <= target.top_word() && target.is_met_by(&digest) {
            Self::record(&self.chain, header, nonce, &digest, target, found);
        }
        1
    }

    /// Re-verify `digest` on the plain scalar path, then keep it
    fn record(
        chain: &Chain<S>,
        header: &[u8; HEADER_LEN],
        nonce: u32,
        digest: &[u8; 32],
        target: &Target,
        found: &mut Vec<Candidate>,
    ) {
        let verified = chain.hash_chain(header, nonce);
        assert_eq!(
            &verified, digest,
            "{} lane digest for nonce {:08x} disagrees with the scalar path",
            chain.name(),
            nonce
        );
        if !target.is_met_by(&verified) {
            trace!("nonce {:08x} dropped after re-verification", nonce);
            return;
        }
        found.push(Candidate {
            nonce,
            digest: verified,
        });
    }
}

impl<S: PrimitiveSuite> std::fmt::Debug for Scanner<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scanner")
            .field("chain", &self.chain)
            .field("lanes", &self.lanes)
            .field("mode", &self.mode)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::Variant;
    use std::cell::Cell;

    fn work(target: Target) -> Work {
        let mut header = [0u8; HEADER_LEN];
        for (i, byte) in header.iter_mut().enumerate() {
            *byte = (i as u8).wrapping_mul(71).wrapping_add(3);
        }
        let mut work = Work::new(header, target);
        work.set_nonce(100);
        work
    }

    #[test]
    fn test_state_machine() {
        let mut scanner: Scanner = Scanner::new(Chain::new(Variant::X16r), Lanes::Four, ScanMode::Live);
        assert_eq!(scanner.state(), ScanState::Idle);

        let mut w = work(Target::from_words([0; 4]));
        let outcome = scanner.scan(&mut w, 108, &AtomicBool::new(false));
        assert_eq!(outcome.status, ScanStatus::Exhausted);
        assert_eq!(scanner.state(), ScanState::Exhausted);

        let outcome = scanner.scan(&mut w, 200, &AtomicBool::new(true));
        assert_eq!(outcome.status, ScanStatus::Restarted);
        assert_eq!(scanner.state(), ScanState::Restarted);
    }

    #[test]
    fn test_tail_uses_scalar_path() {
        let mut scanner: Scanner = Scanner::new(Chain::new(Variant::X16r), Lanes::Eight, ScanMode::Live);
        let mut w = work(Target::MAX);
        let outcome = scanner.scan(&mut w, 111, &AtomicBool::new(false));

        // one 8-lane batch, then 3 single nonces
        assert_eq!(outcome.hashes_done, 11);
        assert_eq!(outcome.next_nonce, 111);
        assert_eq!(w.nonce(), 111);
        let nonces: Vec<u32> = outcome.candidates.iter().map(|c| c.nonce).collect();
        assert_eq!(nonces, (100..111).collect::<Vec<u32>>());
    }

    #[test]
    fn test_empty_range() {
        let mut scanner: Scanner = Scanner::new(Chain::new(Variant::X16r), Lanes::Four, ScanMode::Live);
        let mut w = work(Target::MAX);
        let outcome = scanner.scan(&mut w, 100, &AtomicBool::new(false));
        assert_eq!(outcome.hashes_done, 0);
        assert_eq!(outcome.next_nonce, 100);
        assert!(outcome.candidates.is_empty());
    }

    #[test]
    fn test_restart_stops_at_batch_boundary() {
        let mut scanner: Scanner = Scanner::new(Chain::new(Variant::X16r), Lanes::Four, ScanMode::Live);
        let mut w = work(Target::MAX);
        let polls = Cell::new(0u32);
        let restart = || {
            polls.set(polls.get() + 1);
            polls.get() >= 2
        };
        let outcome = scanner.scan(&mut w, 1_000, &restart);
        assert_eq!(outcome.status, ScanStatus::Restarted);
        assert_eq!(outcome.hashes_done, 8);
        assert_eq!(outcome.next_nonce, 108);
        assert_eq!(outcome.candidates.len(), 8);
    }

    #[test]
    fn test_bench_mode_suppresses_candidates() {
        let mut scanner: Scanner = Scanner::new(Chain::new(Variant::X16r), Lanes::Four, ScanMode::Bench);
        let mut w = work(Target::MAX);
        let outcome = scanner.scan(&mut w, 100 + 4 * 64, &AtomicBool::new(false));
        assert!(outcome.candidates.is_empty());
        assert_eq!(outcome.hashes_done, 256);
        // the bench target admits roughly 1 in 2^20 digests
        assert!(outcome.bench_hits <= 1);
    }

    #[test]
    fn test_live_candidates_match_scalar() {
        let chain = Chain::<BundledSuite>::new(Variant::X16r);
        let mut scanner = Scanner::new(chain.clone(), Lanes::Four, ScanMode::Live);
        let mut w = work(Target::from_words([u64::MAX, u64::MAX, u64::MAX, 0x3fff_ffff_ffff_ffff]));
        let header = w.header;
        let outcome = scanner.scan(&mut w, 164, &AtomicBool::new(false));
        assert!(!outcome.candidates.is_empty());
        for candidate in &outcome.candidates {
            assert_eq!(candidate.digest, chain.hash_chain(&header, candidate.nonce));
            assert!(w.target.is_met_by(&candidate.digest));
        }
    }

    #[test]
    fn test_order_cache_only_for_ordered_pipelines() {
        let mut fixed: Scanner = Scanner::new(Chain::new(Variant::Sonoa), Lanes::Four, ScanMode::Live);
        let mut w = work(Target::MAX);
        let outcome = fixed.scan(&mut w, 104, &AtomicBool::new(false));
        assert_eq!(outcome.candidates.len(), 4);
        assert!(fixed.orders.current().is_none());

        let mut ordered: Scanner = Scanner::new(Chain::new(Variant::X16r), Lanes::Four, ScanMode::Live);
        let mut w = work(Target::MAX);
        ordered.scan(&mut w, 104, &AtomicBool::new(false));
        assert_eq!(ordered.orders.current(), Some(ordered.chain().order_for(&w.header)));
    }
}
