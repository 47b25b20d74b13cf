//! Scalar chain executor.
//!
//! Stage 0 absorbs the 80-byte header; every later stage absorbs the previous
//! stage's output, zero-extended to the pass buffer length. The digest is the
//! low 32 bytes of the last output.

use std::fmt;
use std::marker::PhantomData;

use super::order::{AlgoOrder, OrderRule};
use super::pipeline::Pipeline;
use super::primitive::{self, PrimitiveSuite, StageState};
use super::{Algo, BundledSuite, HashAlgorithm, Variant};
use crate::lanes::MAX_LANE_LEN;
use crate::mining::{header_with_nonce, HEADER_LEN};

/// Header bytes a midstate has absorbed
pub const MIDSTATE_PREFIX_LEN: usize = 64;

/// A stage-0 context that already absorbed `header[0..64]`.
///
/// Only valid for the header prefix and algorithm it was built from.
pub struct Midstate<S: PrimitiveSuite> {
    algo: Algo,
    prefix: [u8; MIDSTATE_PREFIX_LEN],
    state: StageState<S>,
}

impl<S: PrimitiveSuite> Midstate<S> {
    /// `None` when `algo`'s block length does not divide the 64-byte prefix
    pub fn new(algo: Algo, header: &[u8; HEADER_LEN]) -> Option<Self> {
        if !primitive::midstate_capable::<S>(algo) {
            return None;
        }
        let mut prefix = [0u8; MIDSTATE_PREFIX_LEN];
        prefix.copy_from_slice(&header[..MIDSTATE_PREFIX_LEN]);
        let mut state = StageState::init(algo);
        state.update(&prefix);
        Some(Self { algo, prefix, state })
    }

    pub fn algo(&self) -> Algo {
        self.algo
    }

    pub fn state(&self) -> &StageState<S> {
        &self.state
    }

    pub fn matches(&self, algo: Algo, header: &[u8; HEADER_LEN]) -> bool {
        self.algo == algo && self.prefix[..] == header[..MIDSTATE_PREFIX_LEN]
    }

    /// Clone the context and absorb the header tail
    pub fn finish(&self, header: &[u8; HEADER_LEN], out: &mut [u8; 64]) {
        let mut ctx = self.state.clone();
        ctx.update(&header[MIDSTATE_PREFIX_LEN..]);
        ctx.close(out);
    }
}

impl<S: PrimitiveSuite> Clone for Midstate<S> {
    fn clone(&self) -> Self {
        Self {
            algo: self.algo,
            prefix: self.prefix,
            state: self.state.clone(),
        }
    }
}

impl<S: PrimitiveSuite> fmt::Debug for Midstate<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Midstate")
            .field("algo", &self.algo)
            .field("prefix", &hex::encode(self.prefix))
            .finish()
    }
}

/// Digest plus the primitive each stage ran
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainTrace {
    pub digest: [u8; 32],
    pub stages: Vec<Algo>,
}

/// A chain variant bound to a primitive suite
pub struct Chain<S: PrimitiveSuite = BundledSuite> {
    name: &'static str,
    rule: OrderRule,
    pipeline: Pipeline,
    _suite: PhantomData<fn() -> S>,
}

impl<S: PrimitiveSuite> Chain<S> {
    pub fn new(variant: Variant) -> Self {
        Self::custom(variant.name(), variant.order_rule(), variant.pipeline())
    }

    pub fn custom(name: &'static str, rule: OrderRule, pipeline: Pipeline) -> Self {
        Self {
            name,
            rule,
            pipeline,
            _suite: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn order_rule(&self) -> OrderRule {
        self.rule
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn order_for(&self, header: &[u8; HEADER_LEN]) -> AlgoOrder {
        AlgoOrder::from_header(self.rule, header)
    }

    /// Midstate for the primitive that absorbs `header` under `order`, if it qualifies
    pub fn midstate(&self, header: &[u8; HEADER_LEN], order: &AlgoOrder) -> Option<Midstate<S>> {
        Midstate::new(self.pipeline.header_consumer(order), header)
    }

    /// Digest of `header` with `nonce` written into bytes 76..80
    pub fn hash_chain(&self, header: &[u8; HEADER_LEN], nonce: u32) -> [u8; 32] {
        let header = header_with_nonce(header, nonce);
        let order = self.order_for(&header);
        self.hash_with(&header, &order, None)
    }

    pub fn hash_with(&self, header: &[u8; HEADER_LEN], order: &AlgoOrder, midstate: Option<&Midstate<S>>) -> [u8; 32] {
        truncate(&self.run(header, order, midstate, None))
    }

    pub fn trace(&self, header: &[u8; HEADER_LEN], order: &AlgoOrder) -> ChainTrace {
        let mut stages = Vec::with_capacity(self.pipeline.stage_count());
        let out = self.run(header, order, None, Some(&mut stages));
        ChainTrace {
            digest: truncate(&out),
            stages,
        }
    }

    /// Output of stage 0 alone
    pub fn stage0_output(&self, header: &[u8; HEADER_LEN], order: &AlgoOrder, midstate: Option<&Midstate<S>>) -> [u8; 64] {
        let mut out = [0u8; 64];
        self.absorb_header(self.pipeline.first_algo(order), header, midstate, &mut out);
        out
    }

    fn run(
        &self,
        header: &[u8; HEADER_LEN],
        order: &AlgoOrder,
        midstate: Option<&Midstate<S>>,
        mut trace: Option<&mut Vec<Algo>>,
    ) -> [u8; 64] {
        let mut buf = [0u8; MAX_LANE_LEN];
        let mut chain_start = true;

        for pass in self.pipeline.passes() {
            for stage in 0..pass.stage_count() {
                let algo = pass.select(stage, order, &buf, chain_start);
                if let Some(stages) = trace.as_deref_mut() {
                    stages.push(algo);
                }

                let mut out = [0u8; 64];
                if chain_start {
                    self.absorb_header(algo, header, midstate, &mut out);
                    chain_start = false;
                } else {
                    self.absorb(algo, &buf[..pass.buffer_len], &mut out);
                }
                buf[..64].copy_from_slice(&out);
                buf[64..].fill(0);
            }
        }

        let mut last = [0u8; 64];
        last.copy_from_slice(&buf[..64]);
        last
    }

    /// Stage 0: hash the header with `algo`, through the midstate when it matches
    pub(crate) fn absorb_header(
        &self,
        algo: Algo,
        header: &[u8; HEADER_LEN],
        midstate: Option<&Midstate<S>>,
        out: &mut [u8; 64],
    ) {
        let consumer = if self.pipeline.tiger_prefixed(algo) {
            Algo::Tiger
        } else {
            algo
        };

        match midstate {
            Some(mid) if mid.matches(consumer, header) => mid.finish(header, out),
            _ => StageState::<S>::digest(consumer, header, out),
        }

        if consumer != algo {
            let prefixed = *out;
            StageState::<S>::digest(algo, &prefixed, out);
        }
    }

    /// Stages after the first: hash `input` with `algo`
    pub(crate) fn absorb(&self, algo: Algo, input: &[u8], out: &mut [u8; 64]) {
        if self.pipeline.tiger_prefixed(algo) {
            let mut prefixed = [0u8; 64];
            StageState::<S>::digest(Algo::Tiger, input, &mut prefixed);
            StageState::<S>::digest(algo, &prefixed, out);
        } else {
            StageState::<S>::digest(algo, input, out);
        }
    }
}

impl<S: PrimitiveSuite> Clone for Chain<S> {
    fn clone(&self) -> Self {
        Self::custom(self.name, self.rule, self.pipeline.clone())
    }
}

impl<S: PrimitiveSuite> fmt::Debug for Chain<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("name", &self.name)
            .field("rule", &self.rule)
            .field("stages", &self.pipeline.stage_count())
            .finish()
    }
}

impl<S: PrimitiveSuite> HashAlgorithm for Chain<S> {
    fn name(&self) -> &str {
        self.name
    }

    fn hash(&self, header: &[u8; 80]) -> [u8; 32] {
        let order = self.order_for(header);
        self.hash_with(header, &order, None)
    }
}

#[inline]
fn truncate(out: &[u8; 64]) -> [u8; 32] {
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&out[..32]);
    digest
}
