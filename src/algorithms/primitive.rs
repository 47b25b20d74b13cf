//! Uniform contract over the hash primitives a chain can call.

use super::Algo;
use crate::lanes::{LaneBatch, Layout, MAX_LANE_LEN};

/// Element width a primitive's N-way form keeps its lanes interleaved at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneWidth {
    Scalar,
    Bits32,
    Bits64,
    Bits128,
}

impl LaneWidth {
    pub fn layout(self) -> Layout {
        match self {
            LaneWidth::Scalar => Layout::Linear,
            LaneWidth::Bits32 => Layout::X32,
            LaneWidth::Bits64 => Layout::X64,
            LaneWidth::Bits128 => Layout::X128,
        }
    }
}

/// A 512-bit (or shorter) hash primitive.
///
/// `close` always writes 64 bytes: digests shorter than 64 bytes are
/// zero-padded.
pub trait Primitive: Clone + Send + 'static {
    /// Internal absorb granularity in bytes
    const BLOCK_LEN: usize;
    /// Digest length before padding
    const OUTPUT_LEN: usize = 64;
    const LANE_WIDTH: LaneWidth;

    fn new() -> Self;
    fn update(&mut self, data: &[u8]);
    fn close(self, out: &mut [u8; 64]);

    /// True when a context that absorbed the first 64 header bytes can be
    /// cloned and finished with the last 16.
    fn midstate_capable() -> bool {
        Self::BLOCK_LEN <= 64 && 64 % Self::BLOCK_LEN == 0
    }

    /// N-way form over the primitive's native layout.
    ///
    /// Every lane of `input` is absorbed from byte `skip` on into a clone of
    /// `seed`; each 64-byte digest is written to the same lane of `output`,
    /// zero-extended to `output.lane_len()`.
    ///
    /// # Panics
    /// Panics if either batch is not in `Self::LANE_WIDTH`'s layout or the lane
    /// counts differ.
    fn hash_lanes(seed: &Self, skip: usize, input: &LaneBatch, output: &mut LaneBatch) {
        let layout = Self::LANE_WIDTH.layout();
        assert!(
            input.is_in(layout) && output.is_in(layout),
            "lane layout mismatch: primitive wants {:?}, got {:?} -> {:?}",
            layout,
            input.layout(),
            output.layout()
        );
        assert_eq!(input.lanes(), output.lanes(), "lane count mismatch");

        let mut lane = [0u8; MAX_LANE_LEN];
        let mut digest = [0u8; MAX_LANE_LEN];
        let data = &mut lane[..input.lane_len()];
        for l in 0..input.lanes().count() {
            input.read_lane(l, data);
            let mut ctx = seed.clone();
            ctx.update(&data[skip..]);
            let mut out = [0u8; 64];
            ctx.close(&mut out);
            digest[..64].copy_from_slice(&out);
            output.write_lane(l, &digest[..output.lane_len()]);
        }
    }
}

/// One concrete primitive type per algorithm id
pub trait PrimitiveSuite: Send + 'static {
    type Blake: Primitive;
    type Bmw: Primitive;
    type Groestl: Primitive;
    type Jh: Primitive;
    type Keccak: Primitive;
    type Skein: Primitive;
    type Luffa: Primitive;
    type Cubehash: Primitive;
    type Shavite: Primitive;
    type Simd: Primitive;
    type Echo: Primitive;
    type Hamsi: Primitive;
    type Fugue: Primitive;
    type Shabal: Primitive;
    type Whirlpool: Primitive;
    type Sha512: Primitive;
    type Haval: Primitive;
    type Tiger: Primitive;
}

macro_rules! suite_dispatch {
    ($($name:ident),* $(,)?) => {
        /// A live primitive context, one variant per algorithm of suite `S`
        pub enum StageState<S: PrimitiveSuite> {
            $($name(S::$name),)*
        }

        impl<S: PrimitiveSuite> StageState<S> {
            pub fn init(algo: Algo) -> Self {
                match algo {
                    $(Algo::$name => Self::$name(<S::$name as Primitive>::new()),)*
                }
            }

            pub fn algo(&self) -> Algo {
                match self {
                    $(Self::$name(_) => Algo::$name,)*
                }
            }

            pub fn update(&mut self, data: &[u8]) {
                match self {
                    $(Self::$name(ctx) => ctx.update(data),)*
                }
            }

            pub fn close(self, out: &mut [u8; 64]) {
                match self {
                    $(Self::$name(ctx) => ctx.close(out),)*
                }
            }
        }

        impl<S: PrimitiveSuite> Clone for StageState<S> {
            fn clone(&self) -> Self {
                match self {
                    $(Self::$name(ctx) => Self::$name(ctx.clone()),)*
                }
            }
        }

        pub fn lane_width<S: PrimitiveSuite>(algo: Algo) -> LaneWidth {
            match algo {
                $(Algo::$name => <S::$name as Primitive>::LANE_WIDTH,)*
            }
        }

        pub fn midstate_capable<S: PrimitiveSuite>(algo: Algo) -> bool {
            match algo {
                $(Algo::$name => <S::$name as Primitive>::midstate_capable(),)*
            }
        }

        /// Run `algo`'s N-way form; `seed` defaults to a fresh context.
        ///
        /// # Panics
        /// Panics if `seed` holds a different algorithm's context.
        pub fn hash_lanes<S: PrimitiveSuite>(
            algo: Algo,
            seed: Option<&StageState<S>>,
            skip: usize,
            input: &LaneBatch,
            output: &mut LaneBatch,
        ) {
            match algo {
                $(Algo::$name => {
                    let fresh;
                    let seed = match seed {
                        Some(StageState::$name(ctx)) => ctx,
                        Some(other) => panic!("seed context is {:?}, stage wants {:?}", other.algo(), algo),
                        None => {
                            fresh = <S::$name as Primitive>::new();
                            &fresh
                        }
                    };
                    <S::$name as Primitive>::hash_lanes(seed, skip, input, output)
                })*
            }
        }
    };
}

suite_dispatch!(
    Blake, Bmw, Groestl, Jh, Keccak, Skein, Luffa, Cubehash, Shavite, Simd, Echo, Hamsi, Fugue, Shabal,
    Whirlpool, Sha512, Haval, Tiger,
);

impl<S: PrimitiveSuite> StageState<S> {
    /// Hash `data` in one shot with a fresh `algo` context
    pub fn digest(algo: Algo, data: &[u8], out: &mut [u8; 64]) {
        let mut ctx = Self::init(algo);
        ctx.update(data);
        ctx.close(out);
    }
}

impl<S: PrimitiveSuite> std::fmt::Debug for StageState<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StageState({})", self.algo())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::{BundledSuite, X16_ALGOS};
    use crate::lanes::Lanes;

    type State = StageState<BundledSuite>;

    #[test]
    fn test_init_tags_every_algorithm() {
        for algo in X16_ALGOS.iter().copied().chain([Algo::Haval, Algo::Tiger]) {
            assert_eq!(State::init(algo).algo(), algo);
        }
    }

    #[test]
    fn test_split_update_matches_one_shot() {
        let data: Vec<u8> = (0..80u8).collect();
        for algo in X16_ALGOS {
            let mut split = State::init(algo);
            split.update(&data[..64]);
            split.update(&data[64..]);
            let mut a = [0u8; 64];
            split.close(&mut a);

            let mut b = [0u8; 64];
            State::digest(algo, &data, &mut b);
            assert_eq!(a, b, "{}", algo);
        }
    }

    #[test]
    fn test_hash_lanes_matches_scalar() {
        let lanes: Vec<Vec<u8>> = (0..4u8).map(|l| vec![l.wrapping_mul(37); 64]).collect();
        let refs: Vec<&[u8]> = lanes.iter().map(|v| v.as_slice()).collect();
        let input = LaneBatch::interleave(Layout::X64, &refs);
        let mut output = LaneBatch::new(Lanes::Four, 64, Layout::X64);

        hash_lanes::<BundledSuite>(Algo::Keccak, None, 0, &input, &mut output);

        for (l, data) in lanes.iter().enumerate() {
            let mut expected = [0u8; 64];
            State::digest(Algo::Keccak, data, &mut expected);
            let mut got = [0u8; 64];
            output.read_lane(l, &mut got);
            assert_eq!(got, expected);
        }
    }

    #[test]
    #[should_panic(expected = "lane layout mismatch")]
    fn test_hash_lanes_rejects_wrong_layout() {
        let input = LaneBatch::new(Lanes::Four, 64, Layout::X32);
        let mut output = LaneBatch::new(Lanes::Four, 64, Layout::X32);
        hash_lanes::<BundledSuite>(Algo::Keccak, None, 0, &input, &mut output);
    }

    #[test]
    #[should_panic(expected = "seed context")]
    fn test_hash_lanes_rejects_foreign_seed() {
        let seed = State::init(Algo::Jh);
        let input = LaneBatch::new(Lanes::Four, 64, Layout::X64);
        let mut output = LaneBatch::new(Lanes::Four, 64, Layout::X64);
        hash_lanes::<BundledSuite>(Algo::Skein, Some(&seed), 0, &input, &mut output);
    }
}
