use std::fmt;

/// Block header length
pub const HEADER_LEN: usize = 80;
/// Offset of the little-endian timestamp
pub const NTIME_OFFSET: usize = 68;
/// Offset of the little-endian nonce
pub const NONCE_OFFSET: usize = 76;

/// Errors raised while building work from external input
#[derive(Debug, thiserror::Error)]
pub enum WorkError {
    #[error("Invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("Expected {expected} bytes for {field}, got {actual}")]
    Length {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Mining statistics
#[derive(Debug, Clone, Default)]
pub struct MiningStats {
    pub hashes: u64,
    pub candidates_found: u64,
    pub bench_hits: u64,
}

impl MiningStats {
    pub fn new() -> Self {
        Self::default()
    }
}

/// 256-bit difficulty threshold, stored as little-endian 64-bit words
/// (`words[3]` most significant).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Target([u64; 4]);

impl Target {
    pub const MAX: Target = Target([u64::MAX; 4]);

    pub fn from_words(words: [u64; 4]) -> Self {
        Self(words)
    }

    /// Target as hashed digests are stored: little-endian bytes
    pub fn from_le_bytes(bytes: [u8; 32]) -> Self {
        let mut words = [0u64; 4];
        for (i, word) in words.iter_mut().enumerate() {
            let mut chunk = [0u8; 8];
            chunk.copy_from_slice(&bytes[i * 8..i * 8 + 8]);
            *word = u64::from_le_bytes(chunk);
        }
        Self(words)
    }

    /// Target as pools and explorers display it: big-endian bytes
    pub fn from_be_bytes(bytes: [u8; 32]) -> Self {
        let mut le = bytes;
        le.reverse();
        Self::from_le_bytes(le)
    }

    pub fn to_be_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        for (i, word) in self.0.iter().rev().enumerate() {
            out[i * 8..i * 8 + 8].copy_from_slice(&word.to_be_bytes());
        }
        out
    }

    /// Parse a 64-digit big-endian hex target (optional `0x` prefix)
    pub fn from_hex(hex_str: &str) -> Result<Self, WorkError> {
        let bytes = hex_to_bytes_be(hex_str)?;
        let actual = bytes.len();
        let array: [u8; 32] = bytes.try_into().map_err(|_| WorkError::Length {
            field: "target",
            expected: 32,
            actual,
        })?;
        Ok(Self::from_be_bytes(array))
    }

    /// Loose benchmark target: most significant 32-bit word `0x00000cff`
    pub fn bench() -> Self {
        Self([u64::MAX, u64::MAX, u64::MAX, 0x0000_0cff_ffff_ffff])
    }

    /// Most significant 32-bit word, compared against digest word 7 by the pre-filter
    #[inline]
    pub fn top_word(&self) -> u32 {
        (self.0[3] >> 32) as u32
    }

    /// `digest <= target`, both read as little-endian 256-bit integers
    pub fn is_met_by(&self, digest: &[u8; 32]) -> bool {
        for i in (0..4).rev() {
            let mut chunk = [0u8; 8];
            chunk.copy_from_slice(&digest[i * 8..i * 8 + 8]);
            let word = u64::from_le_bytes(chunk);
            if word != self.0[i] {
                return word < self.0[i];
            }
        }
        true
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Target({})", hex::encode(self.to_be_bytes()))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.to_be_bytes()))
    }
}

/// Digest word 7 (bytes 28..32), the most significant 32 bits
#[inline]
pub fn digest_top_word(digest: &[u8; 32]) -> u32 {
    u32::from_le_bytes([digest[28], digest[29], digest[30], digest[31]])
}

/// Header template and target snapshot a scan works on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Work {
    pub header: [u8; HEADER_LEN],
    pub target: Target,
}

impl Work {
    pub fn new(header: [u8; HEADER_LEN], target: Target) -> Self {
        Self { header, target }
    }

    pub fn from_hex(header_hex: &str, target_hex: &str) -> Result<Self, WorkError> {
        let bytes = hex_to_bytes_be(header_hex)?;
        let actual = bytes.len();
        let header: [u8; HEADER_LEN] = bytes.try_into().map_err(|_| WorkError::Length {
            field: "header",
            expected: HEADER_LEN,
            actual,
        })?;
        Ok(Self::new(header, Target::from_hex(target_hex)?))
    }

    pub fn nonce(&self) -> u32 {
        read_u32_le(&self.header, NONCE_OFFSET)
    }

    pub fn set_nonce(&mut self, nonce: u32) {
        self.header[NONCE_OFFSET..NONCE_OFFSET + 4].copy_from_slice(&nonce.to_le_bytes());
    }

    pub fn ntime(&self) -> u32 {
        read_u32_le(&self.header, NTIME_OFFSET)
    }
}

/// Copy of `header` with `nonce` in bytes 76..80
pub fn header_with_nonce(header: &[u8; HEADER_LEN], nonce: u32) -> [u8; HEADER_LEN] {
    let mut out = *header;
    out[NONCE_OFFSET..NONCE_OFFSET + 4].copy_from_slice(&nonce.to_le_bytes());
    out
}

fn read_u32_le(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]])
}

/// Convert hex string to big-endian bytes
pub fn hex_to_bytes_be(hex_str: &str) -> Result<Vec<u8>, WorkError> {
    let hex_str = hex_str.trim().trim_start_matches("0x");
    Ok(hex::decode(hex_str)?)
}
