//! Multi-lane buffers and the interleave transcoder.
//!
//! A [`LaneBatch`] holds N equal-length lanes in one [`Layout`]. Byte `p` of
//! lane `l` (lane length `len`) lives at:
//!
//! * `Linear`: `l * len + p`
//! * `X32` / `X64` (element `e` = 4 / 8): `((p / e) * N + l) * e + p % e`
//! * `X128`: two groups of `N / 2` lanes interleaved at 16 bytes, group
//!   `g = l / (N / 2)` stored after the `g` groups before it
//!
//! With a single lane every layout is `Linear`.

pub mod engine;

pub use engine::LaneEngine;

use std::fmt;

/// Longest lane a batch can carry (xevan's 128-byte working buffer)
pub const MAX_LANE_LEN: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lanes {
    One,
    Four,
    Eight,
}

impl Lanes {
    #[inline]
    pub fn count(self) -> usize {
        match self {
            Lanes::One => 1,
            Lanes::Four => 4,
            Lanes::Eight => 8,
        }
    }

    pub fn from_count(count: usize) -> Option<Self> {
        match count {
            1 => Some(Lanes::One),
            4 => Some(Lanes::Four),
            8 => Some(Lanes::Eight),
            _ => None,
        }
    }

    /// Widest lane count the running CPU has registers for
    pub fn detect() -> Self {
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        {
            if std::arch::is_x86_feature_detected!("avx512f") {
                return Lanes::Eight;
            }
            if std::arch::is_x86_feature_detected!("avx2") {
                return Lanes::Four;
            }
        }
        Lanes::One
    }
}

impl fmt::Display for Lanes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.count())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layout {
    Linear,
    X32,
    X64,
    X128,
}

impl Layout {
    pub const ALL: [Layout; 4] = [Layout::Linear, Layout::X32, Layout::X64, Layout::X128];

    /// Interleave element size in bytes, `None` for `Linear`
    pub fn element_len(self) -> Option<usize> {
        match self {
            Layout::Linear => None,
            Layout::X32 => Some(4),
            Layout::X64 => Some(8),
            Layout::X128 => Some(16),
        }
    }

    #[inline]
    fn normalized(self, lanes: Lanes) -> Layout {
        if lanes == Lanes::One {
            Layout::Linear
        } else {
            self
        }
    }
}

/// Shape of a batch; `Copy` so offsets can be computed while the data is borrowed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Geometry {
    lanes: Lanes,
    lane_len: usize,
    layout: Layout,
}

impl Geometry {
    fn new(lanes: Lanes, lane_len: usize, layout: Layout) -> Self {
        let layout = layout.normalized(lanes);
        assert!(
            lane_len > 0 && lane_len <= MAX_LANE_LEN,
            "lane length {} outside 1..={}",
            lane_len,
            MAX_LANE_LEN
        );
        if let Some(e) = layout.element_len() {
            assert!(
                lane_len % e == 0,
                "lane length {} is not a multiple of the {:?} element width",
                lane_len,
                layout
            );
        }
        Self { lanes, lane_len, layout }
    }

    fn total_len(&self) -> usize {
        self.lanes.count() * self.lane_len
    }

    /// Bytes of one lane stored contiguously
    fn run_len(&self) -> usize {
        self.layout.element_len().unwrap_or(self.lane_len)
    }

    #[inline]
    fn offset(&self, lane: usize, pos: usize) -> usize {
        let n = self.lanes.count();
        debug_assert!(lane < n && pos < self.lane_len);
        match self.layout {
            Layout::Linear => lane * self.lane_len + pos,
            Layout::X32 => interleaved(n, 4, lane, pos),
            Layout::X64 => interleaved(n, 8, lane, pos),
            Layout::X128 => {
                let half = n / 2;
                let group = lane / half;
                group * half * self.lane_len + interleaved(half, 16, lane % half, pos)
            }
        }
    }

    /// Contiguous runs `(batch offset, range offset, len)` covering bytes `start..start + len` of a lane
    fn runs(self, lane: usize, start: usize, len: usize) -> impl Iterator<Item = (usize, usize, usize)> {
        assert!(
            start + len <= self.lane_len,
            "range {}..{} past lane length {}",
            start,
            start + len,
            self.lane_len
        );
        let run = self.run_len();
        let end = start + len;
        let mut pos = start;
        std::iter::from_fn(move || {
            if pos >= end {
                return None;
            }
            let n = (run - pos % run).min(end - pos);
            let item = (self.offset(lane, pos), pos - start, n);
            pos += n;
            Some(item)
        })
    }
}

#[inline]
fn interleaved(n: usize, element: usize, lane: usize, pos: usize) -> usize {
    ((pos / element) * n + lane) * element + pos % element
}

/// N lanes of equal length in one interleave layout
#[derive(Clone, PartialEq, Eq)]
pub struct LaneBatch {
    geometry: Geometry,
    data: Vec<u8>,
}

impl LaneBatch {
    /// Zero-filled batch.
    ///
    /// # Panics
    /// Panics if `lane_len` exceeds [`MAX_LANE_LEN`] or is not a multiple of
    /// the layout's element width.
    pub fn new(lanes: Lanes, lane_len: usize, layout: Layout) -> Self {
        let geometry = Geometry::new(lanes, lane_len, layout);
        Self {
            data: vec![0u8; geometry.total_len()],
            geometry,
        }
    }

    /// Interleave linear lanes into `layout`.
    ///
    /// # Panics
    /// Panics unless there are 1, 4 or 8 lanes of equal length.
    pub fn interleave(layout: Layout, lanes: &[&[u8]]) -> Self {
        let count = match Lanes::from_count(lanes.len()) {
            Some(count) => count,
            None => panic!("unsupported lane count {}", lanes.len()),
        };
        let lane_len = lanes[0].len();
        let mut batch = Self::new(count, lane_len, layout);
        for (l, data) in lanes.iter().enumerate() {
            assert_eq!(data.len(), lane_len, "lane {} length differs", l);
            batch.write_lane(l, data);
        }
        batch
    }

    /// Split back into linear lanes
    pub fn deinterleave(&self) -> Vec<Vec<u8>> {
        (0..self.lanes().count())
            .map(|l| {
                let mut lane = vec![0u8; self.lane_len()];
                self.read_lane(l, &mut lane);
                lane
            })
            .collect()
    }

    /// Change shape in place, zero-filling the contents
    pub fn reshape(&mut self, lanes: Lanes, lane_len: usize, layout: Layout) {
        self.geometry = Geometry::new(lanes, lane_len, layout);
        self.data.clear();
        self.data.resize(self.geometry.total_len(), 0);
    }

    #[inline]
    pub fn lanes(&self) -> Lanes {
        self.geometry.lanes
    }

    #[inline]
    pub fn lane_len(&self) -> usize {
        self.geometry.lane_len
    }

    #[inline]
    pub fn layout(&self) -> Layout {
        self.geometry.layout
    }

    /// Whether the batch is stored as `layout` (every layout matches for one lane)
    #[inline]
    pub fn is_in(&self, layout: Layout) -> bool {
        self.geometry.layout == layout.normalized(self.geometry.lanes)
    }

    pub fn read_lane(&self, lane: usize, out: &mut [u8]) {
        assert_eq!(out.len(), self.lane_len(), "lane buffer length");
        self.read_lane_range(lane, 0, out);
    }

    pub fn write_lane(&mut self, lane: usize, data: &[u8]) {
        assert_eq!(data.len(), self.lane_len(), "lane buffer length");
        self.write_lane_range(lane, 0, data);
    }

    pub fn read_lane_range(&self, lane: usize, start: usize, out: &mut [u8]) {
        for (off, at, n) in self.geometry.runs(lane, start, out.len()) {
            out[at..at + n].copy_from_slice(&self.data[off..off + n]);
        }
    }

    /// Overwrite bytes `start..start + data.len()` of one lane (nonce injection)
    pub fn write_lane_range(&mut self, lane: usize, start: usize, data: &[u8]) {
        let geometry = self.geometry;
        for (off, at, n) in geometry.runs(lane, start, data.len()) {
            self.data[off..off + n].copy_from_slice(&data[at..at + n]);
        }
    }

    /// Leading `B` bytes of one lane
    pub fn extract_lane<const B: usize>(&self, lane: usize) -> [u8; B] {
        let mut out = [0u8; B];
        self.read_lane_range(lane, 0, &mut out);
        out
    }

    /// Little-endian 32-bit word `word` of a lane, read in place
    #[inline]
    pub fn lane_u32(&self, lane: usize, word: usize) -> u32 {
        let mut bytes = [0u8; 4];
        // a 4-byte aligned word never straddles an element boundary
        let off = self.geometry.offset(lane, word * 4);
        bytes.copy_from_slice(&self.data[off..off + 4]);
        u32::from_le_bytes(bytes)
    }

    pub fn reinterleave(&self, to: Layout) -> LaneBatch {
        let mut dst = LaneBatch::new(self.lanes(), self.lane_len(), to);
        self.reinterleave_into(&mut dst, to);
        dst
    }

    /// Convert into `dst` (reshaped to `to`) at the granularity of the narrower element
    pub fn reinterleave_into(&self, dst: &mut LaneBatch, to: Layout) {
        dst.reshape(self.lanes(), self.lane_len(), to);
        let src = self.geometry;
        let geo = dst.geometry;
        let step = src.run_len().min(geo.run_len());
        for lane in 0..src.lanes.count() {
            for pos in (0..src.lane_len).step_by(step) {
                let from = src.offset(lane, pos);
                let to = geo.offset(lane, pos);
                dst.data[to..to + step].copy_from_slice(&self.data[from..from + step]);
            }
        }
    }
}

impl fmt::Debug for LaneBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LaneBatch")
            .field("lanes", &self.lanes().count())
            .field("lane_len", &self.lane_len())
            .field("layout", &self.layout())
            .finish()
    }
}
