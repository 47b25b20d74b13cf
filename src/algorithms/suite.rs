//! The primitive suite shipped with the miner.
//!
//! Slots with a published Rust implementation (RustCrypto crates, plus
//! `blake-hash` on the older `digest` 0.9 trait) wrap that crate directly.
//! The others are filled by stand-ins: SHA-512 keyed with a per-slot label,
//! declaring the block length and lane width of the primitive they replace. A deployment that needs bit-exact digests for
//! those slots provides its own [`PrimitiveSuite`].

use sha2::digest::consts::U64;
use sha2::{Digest, Sha512};

use super::primitive::{LaneWidth, Primitive, PrimitiveSuite};

macro_rules! digest_primitive {
    ($(#[$doc:meta])* $name:ident($inner:ty) via $digest:path, block = $block:expr, out = $out:expr, width = $width:ident) => {
        $(#[$doc])*
        #[derive(Clone)]
        pub struct $name($inner);

        impl Primitive for $name {
            const BLOCK_LEN: usize = $block;
            const OUTPUT_LEN: usize = $out;
            const LANE_WIDTH: LaneWidth = LaneWidth::$width;

            fn new() -> Self {
                Self(<$inner as $digest>::new())
            }

            #[inline]
            fn update(&mut self, data: &[u8]) {
                <$inner as $digest>::update(&mut self.0, data);
            }

            fn close(self, out: &mut [u8; 64]) {
                let digest = <$inner as $digest>::finalize(self.0);
                out[..$out].copy_from_slice(&digest[..$out]);
                out[$out..].fill(0);
            }
        }
    };
    ($(#[$doc:meta])* $name:ident($inner:ty), block = $block:expr, out = $out:expr, width = $width:ident) => {
        digest_primitive!($(#[$doc])* $name($inner) via Digest, block = $block, out = $out, width = $width);
    };
}

macro_rules! stand_in_primitive {
    ($(#[$doc:meta])* $name:ident, $label:literal, block = $block:expr, out = $out:expr, width = $width:ident) => {
        $(#[$doc])*
        #[derive(Clone)]
        pub struct $name(Sha512);

        impl Primitive for $name {
            const BLOCK_LEN: usize = $block;
            const OUTPUT_LEN: usize = $out;
            const LANE_WIDTH: LaneWidth = LaneWidth::$width;

            fn new() -> Self {
                let mut inner = Sha512::new();
                inner.update($label);
                Self(inner)
            }

            #[inline]
            fn update(&mut self, data: &[u8]) {
                self.0.update(data);
            }

            fn close(self, out: &mut [u8; 64]) {
                let digest = self.0.finalize();
                out[..$out].copy_from_slice(&digest[..$out]);
                out[$out..].fill(0);
            }
        }
    };
}

digest_primitive!(
    /// BLAKE-512 (14 rounds); the crate is on the `digest` 0.9 trait
    Blake512(blake_hash::Blake512) via blake_hash::Digest,
    block = 128,
    out = 64,
    width = Bits64
);
digest_primitive!(Groestl512(groestl::Groestl512), block = 128, out = 64, width = Bits128);
digest_primitive!(Jh512(jh::Jh512), block = 64, out = 64, width = Bits64);
digest_primitive!(Keccak512(sha3::Keccak512), block = 72, out = 64, width = Bits64);
digest_primitive!(Skein512(skein::Skein512<U64>), block = 64, out = 64, width = Bits64);
digest_primitive!(Shabal512(shabal::Shabal512), block = 64, out = 64, width = Bits32);
digest_primitive!(Whirlpool(whirlpool::Whirlpool), block = 64, out = 64, width = Scalar);
digest_primitive!(Sha512Primitive(sha2::Sha512), block = 128, out = 64, width = Bits64);
digest_primitive!(
    /// 24-byte digest, zero-padded to 64
    Tiger(tiger::Tiger),
    block = 64,
    out = 24,
    width = Scalar
);

stand_in_primitive!(BmwStandIn, b"x16-miner/bmw512", block = 128, out = 64, width = Bits64);
stand_in_primitive!(LuffaStandIn, b"x16-miner/luffa512", block = 32, out = 64, width = Bits128);
stand_in_primitive!(CubehashStandIn, b"x16-miner/cubehash512", block = 32, out = 64, width = Bits128);
stand_in_primitive!(ShaviteStandIn, b"x16-miner/shavite512", block = 128, out = 64, width = Bits128);
stand_in_primitive!(SimdStandIn, b"x16-miner/simd512", block = 128, out = 64, width = Bits128);
stand_in_primitive!(EchoStandIn, b"x16-miner/echo512", block = 128, out = 64, width = Bits128);
stand_in_primitive!(HamsiStandIn, b"x16-miner/hamsi512", block = 8, out = 64, width = Bits64);
stand_in_primitive!(FugueStandIn, b"x16-miner/fugue512", block = 4, out = 64, width = Scalar);
stand_in_primitive!(
    /// 32-byte digest, zero-padded to 64
    HavalStandIn,
    b"x16-miner/haval256_5",
    block = 128,
    out = 32,
    width = Bits32
);

/// Crate-backed primitives plus SHA-512 stand-ins for the remaining slots
#[derive(Debug, Clone, Copy, Default)]
pub struct BundledSuite;

impl PrimitiveSuite for BundledSuite {
    type Blake = Blake512;
    type Bmw = BmwStandIn;
    type Groestl = Groestl512;
    type Jh = Jh512;
    type Keccak = Keccak512;
    type Skein = Skein512;
    type Luffa = LuffaStandIn;
    type Cubehash = CubehashStandIn;
    type Shavite = ShaviteStandIn;
    type Simd = SimdStandIn;
    type Echo = EchoStandIn;
    type Hamsi = HamsiStandIn;
    type Fugue = FugueStandIn;
    type Shabal = Shabal512;
    type Whirlpool = Whirlpool;
    type Sha512 = Sha512Primitive;
    type Haval = HavalStandIn;
    type Tiger = Tiger;
}
