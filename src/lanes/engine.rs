//! N-way chain executor.
//!
//! Runs the same pipeline as [`Chain`] over N nonces at once. Working state
//! stays interleaved; before each stage it is transcoded into the layout the
//! stage primitive's N-way form expects. A self-referential stage whose lanes
//! disagree on the next primitive falls back to per-lane scalar hashing.

use std::marker::PhantomData;
use std::mem;

use super::{LaneBatch, Lanes, Layout, MAX_LANE_LEN};
use crate::algorithms::chain::MIDSTATE_PREFIX_LEN;
use crate::algorithms::pipeline::PassOrder;
use crate::algorithms::primitive::{self, PrimitiveSuite, StageState};
use crate::algorithms::{next_algo, Algo, AlgoOrder, BundledSuite, Chain, Midstate};
use crate::mining::HEADER_LEN;

enum Selection {
    Uniform(Algo),
    Divergent([Algo; 8]),
}

pub struct LaneEngine<S: PrimitiveSuite = BundledSuite> {
    lanes: Lanes,
    state: LaneBatch,
    scratch: LaneBatch,
    _suite: PhantomData<fn() -> S>,
}

impl<S: PrimitiveSuite> LaneEngine<S> {
    pub fn new(lanes: Lanes) -> Self {
        Self {
            lanes,
            state: LaneBatch::new(lanes, 64, Layout::Linear),
            scratch: LaneBatch::new(lanes, 64, Layout::Linear),
            _suite: PhantomData,
        }
    }

    pub fn lanes(&self) -> Lanes {
        self.lanes
    }

    /// Layout the header batch should be built in for `order`
    pub fn header_layout(chain: &Chain<S>, order: &AlgoOrder) -> Layout {
        primitive::lane_width::<S>(chain.pipeline().header_consumer(order)).layout()
    }

    /// Hash one batch of headers; returns the final outputs (lane length 64 or
    /// the last pass buffer length, in whatever layout the last stage left).
    ///
    /// # Panics
    /// Panics if `headers` does not hold this engine's lane count of 80-byte lanes.
    pub fn hash_batch(
        &mut self,
        chain: &Chain<S>,
        headers: &LaneBatch,
        order: &AlgoOrder,
        midstate: Option<&Midstate<S>>,
    ) -> &LaneBatch {
        assert_eq!(headers.lanes(), self.lanes, "header batch lane count");
        assert_eq!(headers.lane_len(), HEADER_LEN, "header batch lane length");

        headers.reinterleave_into(&mut self.state, headers.layout());

        let mut chain_start = true;
        for pass in chain.pipeline().passes() {
            for stage in 0..pass.stage_count() {
                let selection = match pass.order {
                    PassOrder::Feedback if !chain_start => self.feedback_selection(),
                    _ => Selection::Uniform(pass.select(stage, order, &[], chain_start)),
                };

                match selection {
                    Selection::Uniform(algo) if chain_start => {
                        self.header_stage(chain, algo, midstate, pass.buffer_len);
                        chain_start = false;
                    }
                    Selection::Uniform(algo) => self.uniform_stage(chain, algo, pass.buffer_len),
                    Selection::Divergent(algos) => self.divergent_stage(chain, &algos, pass.buffer_len),
                }
            }
        }

        &self.state
    }

    fn header_stage(&mut self, chain: &Chain<S>, algo: Algo, midstate: Option<&Midstate<S>>, out_len: usize) {
        let prefixed = chain.pipeline().tiger_prefixed(algo);
        let consumer = if prefixed { Algo::Tiger } else { algo };

        // every lane shares the header prefix; only the nonce differs
        let first: [u8; HEADER_LEN] = self.state.extract_lane(0);
        let seed = midstate.filter(|mid| mid.matches(consumer, &first)).map(Midstate::state);
        let skip = if seed.is_some() { MIDSTATE_PREFIX_LEN } else { 0 };

        if prefixed {
            self.apply(consumer, seed, skip, 64);
            self.apply(algo, None, 0, out_len);
        } else {
            self.apply(consumer, seed, skip, out_len);
        }
    }

    fn uniform_stage(&mut self, chain: &Chain<S>, algo: Algo, len: usize) {
        self.fit_state(len);
        if chain.pipeline().tiger_prefixed(algo) {
            self.apply(Algo::Tiger, None, 0, 64);
        }
        self.apply(algo, None, 0, len);
    }

    /// Lanes disagree on the primitive: hash each lane through the scalar path
    fn divergent_stage(&mut self, chain: &Chain<S>, algos: &[Algo; 8], len: usize) {
        let keep = self.state.lane_len().min(len);
        self.scratch.reshape(self.lanes, len, Layout::Linear);

        let mut input = [0u8; MAX_LANE_LEN];
        let mut padded = [0u8; MAX_LANE_LEN];
        for (lane, algo) in algos.iter().enumerate().take(self.lanes.count()) {
            input.fill(0);
            self.state.read_lane_range(lane, 0, &mut input[..keep]);
            let mut out = [0u8; 64];
            chain.absorb(*algo, &input[..len], &mut out);
            padded[..64].copy_from_slice(&out);
            self.scratch.write_lane(lane, &padded[..len]);
        }
        mem::swap(&mut self.state, &mut self.scratch);
    }

    fn feedback_selection(&self) -> Selection {
        let mut algos = [Algo::Blake; 8];
        let mut first = [0u8; 1];
        for (lane, slot) in algos.iter_mut().enumerate().take(self.lanes.count()) {
            self.state.read_lane_range(lane, 0, &mut first);
            *slot = next_algo(&first);
        }
        let active = &algos[..self.lanes.count()];
        if active.iter().all(|a| *a == active[0]) {
            Selection::Uniform(active[0])
        } else {
            Selection::Divergent(algos)
        }
    }

    /// Zero-extend or truncate every lane to `len`
    fn fit_state(&mut self, len: usize) {
        if self.state.lane_len() == len {
            return;
        }
        let keep = self.state.lane_len().min(len);
        self.scratch.reshape(self.lanes, len, self.state.layout());
        let mut lane = [0u8; MAX_LANE_LEN];
        for l in 0..self.lanes.count() {
            self.state.read_lane_range(l, 0, &mut lane[..keep]);
            self.scratch.write_lane_range(l, 0, &lane[..keep]);
        }
        mem::swap(&mut self.state, &mut self.scratch);
    }

    /// Run `algo`'s N-way form on the state, transcoding it to the native layout first
    fn apply(&mut self, algo: Algo, seed: Option<&StageState<S>>, skip: usize, out_len: usize) {
        let native = primitive::lane_width::<S>(algo).layout();
        if !self.state.is_in(native) {
            self.state.reinterleave_into(&mut self.scratch, native);
            mem::swap(&mut self.state, &mut self.scratch);
        }
        self.scratch.reshape(self.lanes, out_len, native);
        primitive::hash_lanes::<S>(algo, seed, skip, &self.state, &mut self.scratch);
        mem::swap(&mut self.state, &mut self.scratch);
    }
}

impl<S: PrimitiveSuite> std::fmt::Debug for LaneEngine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LaneEngine").field("lanes", &self.lanes).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::pipeline::{Pass, Pipeline};
    use crate::algorithms::{OrderRule, Variant};
    use crate::mining::{header_with_nonce, NONCE_OFFSET};

    fn sample_header() -> [u8; HEADER_LEN] {
        let mut header = [0u8; HEADER_LEN];
        for (i, byte) in header.iter_mut().enumerate() {
            *byte = (i as u8).wrapping_mul(13) ^ 0x5a;
        }
        header
    }

    fn header_batch(chain: &Chain, lanes: Lanes, base: u32) -> (LaneBatch, AlgoOrder) {
        let header = sample_header();
        let order = chain.order_for(&header);
        let layout = LaneEngine::<BundledSuite>::header_layout(chain, &order);
        let mut batch = LaneBatch::new(lanes, HEADER_LEN, layout);
        for lane in 0..lanes.count() {
            batch.write_lane(lane, &header);
            batch.write_lane_range(lane, NONCE_OFFSET, &(base + lane as u32).to_le_bytes());
        }
        (batch, order)
    }

    fn assert_lanes_match(chain: &Chain, lanes: Lanes, base: u32, with_midstate: bool) {
        let (batch, order) = header_batch(chain, lanes, base);
        let midstate = if with_midstate {
            chain.midstate(&sample_header(), &order)
        } else {
            None
        };
        let mut engine = LaneEngine::new(lanes);
        let out = engine.hash_batch(chain, &batch, &order, midstate.as_ref());
        for lane in 0..lanes.count() {
            let digest: [u8; 32] = out.extract_lane(lane);
            assert_eq!(
                digest,
                chain.hash_chain(&sample_header(), base + lane as u32),
                "{} lane {} of {}",
                chain.name(),
                lane,
                lanes
            );
        }
    }

    #[test]
    fn test_x16r_eight_lanes_match_scalar() {
        let chain = Chain::new(Variant::X16r);
        assert_lanes_match(&chain, Lanes::Eight, 1000, false);
        assert_lanes_match(&chain, Lanes::Eight, 1000, true);
    }

    #[test]
    fn test_hex_four_lanes_match_scalar() {
        // lanes diverge on the self-referential stages
        let chain = Chain::new(Variant::Hex);
        assert_lanes_match(&chain, Lanes::Four, 0, false);
        assert_lanes_match(&chain, Lanes::Four, 4, true);
    }

    #[test]
    fn test_single_lane_engine() {
        let chain = Chain::new(Variant::X16s);
        assert_lanes_match(&chain, Lanes::One, 77, true);
    }

    #[test]
    fn test_buffer_growth_between_passes() {
        let chain = Chain::custom(
            "grow",
            OrderRule::Plain,
            Pipeline::new(vec![Pass::new(PassOrder::Ordered, 64), Pass::new(PassOrder::Ordered, 128)]),
        );
        assert_lanes_match(&chain, Lanes::Eight, 9, false);
    }

    #[test]
    fn test_feedback_selection_reads_first_byte() {
        let mut engine = LaneEngine::<BundledSuite>::new(Lanes::Four);
        let lanes: Vec<Vec<u8>> = vec![vec![0x05; 64], vec![0x15; 64], vec![0x25; 64], vec![0x35; 64]];
        let refs: Vec<&[u8]> = lanes.iter().map(|v| v.as_slice()).collect();
        engine.state = LaneBatch::interleave(Layout::X64, &refs);
        assert!(matches!(engine.feedback_selection(), Selection::Uniform(Algo::Skein)));

        engine.state.write_lane_range(2, 0, &[0x06]);
        match engine.feedback_selection() {
            Selection::Divergent(algos) => assert_eq!(algos[2], Algo::Luffa),
            Selection::Uniform(_) => panic!("lanes should diverge"),
        }
    }

    #[test]
    #[should_panic(expected = "header batch lane count")]
    fn test_lane_count_mismatch_is_fatal() {
        let chain = Chain::new(Variant::X16r);
        let (batch, order) = header_batch(&chain, Lanes::Four, 0);
        let mut engine = LaneEngine::<BundledSuite>::new(Lanes::Eight);
        engine.hash_batch(&chain, &batch, &order, None);
    }

    #[test]
    fn test_header_nonce_helper_agrees() {
        let (batch, _) = header_batch(&Chain::new(Variant::X16r), Lanes::Four, 3);
        let lane: [u8; HEADER_LEN] = batch.extract_lane(2);
        assert_eq!(lane, header_with_nonce(&sample_header(), 5));
    }
}
