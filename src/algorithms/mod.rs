/// Hash chain algorithms: primitive ids, chain variants and the hasher trait
pub mod chain;
pub mod order;
pub mod pipeline;
pub mod primitive;
pub mod suite;

use std::fmt;
use std::str::FromStr;

use crate::mining::Target;

pub use chain::{Chain, ChainTrace, Midstate};
pub use order::{next_algo, select_order, AlgoOrder, OrderCache, OrderRule};
pub use pipeline::{Pass, PassOrder, Pipeline};
pub use primitive::{LaneWidth, Primitive, PrimitiveSuite, StageState};
pub use suite::BundledSuite;

/// Number of primitives selectable by an order nibble
pub const X16_FUNC_COUNT: usize = 16;

/// Errors raised while parsing algorithm names or order strings
#[derive(Debug, thiserror::Error)]
pub enum AlgoError {
    #[error("Unknown algorithm: {0}. Supported: x16r, x16s, x16rv2, hex, x17, sonoa, xevan")]
    UnknownVariant(String),

    #[error("Invalid order symbol '{0}' (expected 0-9 or A-F)")]
    InvalidSymbol(char),

    #[error("Order string must have 16 symbols, got {0}")]
    OrderLength(usize),
}

/// Hash primitive identifiers.
///
/// The first sixteen follow the x16 nibble enumeration. `Haval` and `Tiger`
/// only appear in fixed pipelines and in the x16rv2 tiger prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Algo {
    Blake = 0,
    Bmw,
    Groestl,
    Jh,
    Keccak,
    Skein,
    Luffa,
    Cubehash,
    Shavite,
    Simd,
    Echo,
    Hamsi,
    Fugue,
    Shabal,
    Whirlpool,
    Sha512,
    Haval,
    Tiger,
}

/// The sixteen primitives addressed by an order nibble, in nibble order
pub const X16_ALGOS: [Algo; X16_FUNC_COUNT] = [
    Algo::Blake,
    Algo::Bmw,
    Algo::Groestl,
    Algo::Jh,
    Algo::Keccak,
    Algo::Skein,
    Algo::Luffa,
    Algo::Cubehash,
    Algo::Shavite,
    Algo::Simd,
    Algo::Echo,
    Algo::Hamsi,
    Algo::Fugue,
    Algo::Shabal,
    Algo::Whirlpool,
    Algo::Sha512,
];

impl Algo {
    /// Map an order nibble to its primitive.
    ///
    /// # Panics
    /// Panics if `nibble` is outside 0..16; callers only ever pass masked nibbles.
    pub fn from_nibble(nibble: u8) -> Self {
        match X16_ALGOS.get(nibble as usize) {
            Some(algo) => *algo,
            None => panic!("algorithm id {} is outside the x16 set", nibble),
        }
    }

    /// Parse one order-string symbol (`0`-`9`, `A`-`F`, case-insensitive)
    pub fn from_symbol(symbol: char) -> Result<Self, AlgoError> {
        symbol
            .to_digit(16)
            .map(|d| Self::from_nibble(d as u8))
            .ok_or(AlgoError::InvalidSymbol(symbol))
    }

    pub fn id(self) -> u8 {
        self as u8
    }

    /// Order-string symbol; auxiliary primitives have none
    pub fn symbol(self) -> Option<char> {
        if (self.id() as usize) < X16_FUNC_COUNT {
            char::from_digit(self.id() as u32, 16).map(|c| c.to_ascii_uppercase())
        } else {
            None
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Algo::Blake => "blake512",
            Algo::Bmw => "bmw512",
            Algo::Groestl => "groestl512",
            Algo::Jh => "jh512",
            Algo::Keccak => "keccak512",
            Algo::Skein => "skein512",
            Algo::Luffa => "luffa512",
            Algo::Cubehash => "cubehash512",
            Algo::Shavite => "shavite512",
            Algo::Simd => "simd512",
            Algo::Echo => "echo512",
            Algo::Hamsi => "hamsi512",
            Algo::Fugue => "fugue512",
            Algo::Shabal => "shabal512",
            Algo::Whirlpool => "whirlpool",
            Algo::Sha512 => "sha512",
            Algo::Haval => "haval256_5",
            Algo::Tiger => "tiger",
        }
    }
}

impl fmt::Display for Algo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Chain variants known to the miner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    X16r,
    X16s,
    X16rv2,
    Hex,
    X17,
    Sonoa,
    Xevan,
}

impl Variant {
    pub const ALL: [Variant; 7] = [
        Variant::X16r,
        Variant::X16s,
        Variant::X16rv2,
        Variant::Hex,
        Variant::X17,
        Variant::Sonoa,
        Variant::Xevan,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Variant::X16r => "x16r",
            Variant::X16s => "x16s",
            Variant::X16rv2 => "x16rv2",
            Variant::Hex => "hex",
            Variant::X17 => "x17",
            Variant::Sonoa => "sonoa",
            Variant::Xevan => "xevan",
        }
    }

    /// How the deterministic order is derived from the header window
    pub fn order_rule(self) -> OrderRule {
        match self {
            Variant::X16s => OrderRule::Shuffled,
            _ => OrderRule::Plain,
        }
    }

    pub fn pipeline(self) -> Pipeline {
        match self {
            Variant::X16r | Variant::X16s => Pipeline::ordered(),
            Variant::X16rv2 => Pipeline::ordered().with_tiger_prefix(&pipeline::X16RV2_TIGER_PREFIXED),
            Variant::Hex => Pipeline::feedback(),
            Variant::X17 => Pipeline::x17(),
            Variant::Sonoa => Pipeline::sonoa(),
            Variant::Xevan => Pipeline::xevan(),
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Variant {
    type Err = AlgoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Variant::ALL
            .iter()
            .copied()
            .find(|v| v.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AlgoError::UnknownVariant(s.to_string()))
    }
}

/// Trait for mining hash algorithms
pub trait HashAlgorithm {
    /// Get the algorithm name
    fn name(&self) -> &str;

    /// Compute the 32-byte digest of an 80-byte block header
    fn hash(&self, header: &[u8; 80]) -> [u8; 32];

    /// Check a digest against a target (little-endian 256-bit comparison, `hash <= target`)
    fn meets_target(&self, hash: &[u8; 32], target: &Target) -> bool {
        target.is_met_by(hash)
    }
}
