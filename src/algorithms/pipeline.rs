//! Stage sequences for every chain variant.

use super::order::next_algo;
use super::{Algo, AlgoOrder, X16_FUNC_COUNT};
use crate::lanes::MAX_LANE_LEN;

use Algo::*;

/// Stages preceded by tiger in x16rv2
pub const X16RV2_TIGER_PREFIXED: [Algo; 3] = [Keccak, Luffa, Sha512];

/// x16 in fixed order with skein ahead of jh, then haval-256/5
pub const X17_SEQUENCE: [Algo; 17] = [
    Blake, Bmw, Groestl, Skein, Jh, Keccak, Luffa, Cubehash, Shavite, Simd, Echo, Hamsi, Fugue, Shabal, Whirlpool,
    Sha512, Haval,
];

const SONOA_1: [Algo; 11] = [Blake, Bmw, Groestl, Skein, Jh, Keccak, Luffa, Cubehash, Shavite, Simd, Echo];
const SONOA_2: [Algo; 11] = [Bmw, Groestl, Skein, Jh, Keccak, Luffa, Cubehash, Shavite, Simd, Echo, Hamsi];
const SONOA_3: [Algo; 12] = [Bmw, Groestl, Skein, Jh, Keccak, Luffa, Cubehash, Shavite, Simd, Echo, Hamsi, Fugue];
const SONOA_4: [Algo; 16] = [
    Bmw, Groestl, Skein, Jh, Keccak, Luffa, Cubehash, Shavite, Simd, Echo, Hamsi, Fugue, Shabal, Hamsi, Echo, Shavite,
];
const SONOA_5: [Algo; 15] = [
    Bmw, Shabal, Groestl, Skein, Jh, Keccak, Luffa, Cubehash, Shavite, Simd, Echo, Hamsi, Fugue, Shabal, Whirlpool,
];
const SONOA_6: [Algo; 16] = [
    Bmw, Groestl, Skein, Jh, Keccak, Luffa, Cubehash, Shavite, Simd, Echo, Hamsi, Fugue, Shabal, Whirlpool, Sha512,
    Whirlpool,
];
const SONOA_7: [Algo; 16] = [
    Bmw, Groestl, Skein, Jh, Keccak, Luffa, Cubehash, Shavite, Simd, Echo, Hamsi, Fugue, Shabal, Whirlpool, Sha512,
    Haval,
];

/// Seven passes over the growing x17 prefix
pub const SONOA_PASSES: [&[Algo]; 7] = [&SONOA_1, &SONOA_2, &SONOA_3, &SONOA_4, &SONOA_5, &SONOA_6, &SONOA_7];

/// Where a pass gets its per-stage primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOrder {
    /// Fixed sequence
    Fixed(&'static [Algo]),
    /// The header-derived [`AlgoOrder`]
    Ordered,
    /// Stage 0 of the chain from the [`AlgoOrder`], every later stage from the previous output
    Feedback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pass {
    pub order: PassOrder,
    /// Bytes fed to every stage after the first (64 or 128)
    pub buffer_len: usize,
}

impl Pass {
    pub fn new(order: PassOrder, buffer_len: usize) -> Self {
        assert!(
            buffer_len >= 64 && buffer_len <= MAX_LANE_LEN && buffer_len % 16 == 0,
            "pass buffer length {} unsupported",
            buffer_len
        );
        if let PassOrder::Fixed(stages) = order {
            assert!(!stages.is_empty(), "fixed pass without stages");
        }
        Self { order, buffer_len }
    }

    pub fn stage_count(&self) -> usize {
        match self.order {
            PassOrder::Fixed(stages) => stages.len(),
            PassOrder::Ordered | PassOrder::Feedback => X16_FUNC_COUNT,
        }
    }

    /// Primitive for `stage` of this pass. `prev` is the previous stage output;
    /// `chain_start` marks the first stage of the whole pipeline.
    #[inline]
    pub fn select(&self, stage: usize, order: &AlgoOrder, prev: &[u8], chain_start: bool) -> Algo {
        match self.order {
            PassOrder::Fixed(stages) => stages[stage],
            PassOrder::Ordered => order.stage(stage),
            PassOrder::Feedback if chain_start => order.stage(0),
            PassOrder::Feedback => next_algo(prev),
        }
    }
}

/// Ordered list of passes plus the x16rv2 tiger-prefix rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    passes: Vec<Pass>,
    tiger_prefixed: &'static [Algo],
}

impl Pipeline {
    pub fn new(passes: Vec<Pass>) -> Self {
        assert!(!passes.is_empty(), "pipeline without passes");
        Self {
            passes,
            tiger_prefixed: &[],
        }
    }

    /// One 16-stage pass driven by the header order (x16r, x16s)
    pub fn ordered() -> Self {
        Self::new(vec![Pass::new(PassOrder::Ordered, 64)])
    }

    /// One 16-stage self-referential pass (hex)
    pub fn feedback() -> Self {
        Self::new(vec![Pass::new(PassOrder::Feedback, 64)])
    }

    pub fn x17() -> Self {
        Self::new(vec![Pass::new(PassOrder::Fixed(&X17_SEQUENCE), 64)])
    }

    pub fn sonoa() -> Self {
        Self::new(SONOA_PASSES.iter().map(|stages| Pass::new(PassOrder::Fixed(*stages), 64)).collect())
    }

    /// Two x17 passes over a 128-byte buffer
    pub fn xevan() -> Self {
        Self::new(vec![
            Pass::new(PassOrder::Fixed(&X17_SEQUENCE), 128),
            Pass::new(PassOrder::Fixed(&X17_SEQUENCE), 128),
        ])
    }

    /// Run tiger over the stage input before each of `algos`
    pub fn with_tiger_prefix(mut self, algos: &'static [Algo]) -> Self {
        self.tiger_prefixed = algos;
        self
    }

    pub fn passes(&self) -> &[Pass] {
        &self.passes
    }

    pub fn stage_count(&self) -> usize {
        self.passes.iter().map(Pass::stage_count).sum()
    }

    #[inline]
    pub fn tiger_prefixed(&self, algo: Algo) -> bool {
        self.tiger_prefixed.contains(&algo)
    }

    /// Whether any pass reads the header-derived order
    pub fn uses_order(&self) -> bool {
        self.passes.iter().any(|p| !matches!(p.order, PassOrder::Fixed(_)))
    }

    /// Primitive of the first stage (before any tiger prefix)
    pub fn first_algo(&self, order: &AlgoOrder) -> Algo {
        self.passes[0].select(0, order, &[], true)
    }

    /// Primitive that actually absorbs the 80-byte header
    pub fn header_consumer(&self, order: &AlgoOrder) -> Algo {
        let first = self.first_algo(order);
        if self.tiger_prefixed(first) {
            Tiger
        } else {
            first
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sonoa_pass_lengths() {
        let lengths: Vec<usize> = Pipeline::sonoa().passes().iter().map(Pass::stage_count).collect();
        assert_eq!(lengths, vec![11, 11, 12, 16, 15, 16, 16]);
        assert_eq!(Pipeline::sonoa().stage_count(), 97);
    }

    #[test]
    fn test_x17_and_xevan() {
        assert_eq!(Pipeline::x17().stage_count(), 17);
        assert_eq!(X17_SEQUENCE[3], Skein);
        assert_eq!(X17_SEQUENCE[16], Haval);

        let xevan = Pipeline::xevan();
        assert_eq!(xevan.stage_count(), 34);
        assert!(xevan.passes().iter().all(|p| p.buffer_len == 128));
        assert!(!xevan.uses_order());
    }

    #[test]
    fn test_header_consumer_with_tiger_prefix() {
        let keccak_first: AlgoOrder = "4000000000000000".parse().unwrap();
        let plain = Pipeline::ordered();
        let v2 = Pipeline::ordered().with_tiger_prefix(&X16RV2_TIGER_PREFIXED);
        assert_eq!(plain.header_consumer(&keccak_first), Keccak);
        assert_eq!(v2.header_consumer(&keccak_first), Tiger);
        assert_eq!(v2.first_algo(&keccak_first), Keccak);
    }

    #[test]
    fn test_feedback_selection() {
        let order: AlgoOrder = "5000000000000000".parse().unwrap();
        let pass = Pass::new(PassOrder::Feedback, 64);
        assert_eq!(pass.select(0, &order, &[0x03], true), Skein);
        assert_eq!(pass.select(1, &order, &[0x03], false), Jh);
    }

    #[test]
    #[should_panic(expected = "unsupported")]
    fn test_odd_buffer_length_is_fatal() {
        Pass::new(PassOrder::Ordered, 72);
    }
}
