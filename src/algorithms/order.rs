//! Per-stage algorithm order.
//!
//! The deterministic order is read from the 8-byte window `header[4..12]`
//! (the low bytes of the previous block hash). Stage `j` takes byte
//! `(15 - j) >> 1` of the window: the high nibble for even `j`, the low
//! nibble for odd `j`.

use std::fmt;
use std::str::FromStr;

use tracing::debug;

use super::{Algo, AlgoError, X16_FUNC_COUNT};
use crate::mining::{NTIME_OFFSET, HEADER_LEN};

/// Header bytes that seed the deterministic order
pub const ORDER_WINDOW: std::ops::Range<usize> = 4..12;

/// How the 16 window nibbles turn into an order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderRule {
    /// Nibble j selects stage j directly (x16r, x16rv2, hex).
    Plain,
    /// Nibble j moves that position of the running order to the front (x16s).
    Shuffled,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct AlgoOrder([Algo; X16_FUNC_COUNT]);

impl AlgoOrder {
    pub fn new(stages: [Algo; X16_FUNC_COUNT]) -> Self {
        Self(stages)
    }

    pub fn select(rule: OrderRule, window: &[u8; 8]) -> Self {
        match rule {
            OrderRule::Plain => select_order(window),
            OrderRule::Shuffled => shuffled_order(window),
        }
    }

    pub fn from_header(rule: OrderRule, header: &[u8; HEADER_LEN]) -> Self {
        Self::select(rule, &window_of(header))
    }

    #[inline]
    pub fn stage(&self, index: usize) -> Algo {
        self.0[index]
    }

    pub fn as_slice(&self) -> &[Algo] {
        &self.0
    }
}

impl fmt::Display for AlgoOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for algo in self.0 {
            // every x16 algo has a symbol
            write!(f, "{}", algo.symbol().unwrap_or('?'))?;
        }
        Ok(())
    }
}

impl fmt::Debug for AlgoOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AlgoOrder({})", self)
    }
}

impl FromStr for AlgoOrder {
    type Err = AlgoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let symbols: Vec<char> = s.trim().chars().collect();
        if symbols.len() != X16_FUNC_COUNT {
            return Err(AlgoError::OrderLength(symbols.len()));
        }
        let mut stages = [Algo::Blake; X16_FUNC_COUNT];
        for (slot, symbol) in stages.iter_mut().zip(symbols) {
            *slot = Algo::from_symbol(symbol)?;
        }
        Ok(Self(stages))
    }
}

#[inline]
fn stage_nibble(window: &[u8; 8], stage: usize) -> u8 {
    let byte = window[(15 - stage) >> 1];
    if stage & 1 == 1 {
        byte & 0x0F
    } else {
        byte >> 4
    }
}

pub fn window_of(header: &[u8; HEADER_LEN]) -> [u8; 8] {
    let mut window = [0u8; 8];
    window.copy_from_slice(&header[ORDER_WINDOW]);
    window
}

/// Deterministic order: stage j runs the primitive named by nibble j of the window
pub fn select_order(window: &[u8; 8]) -> AlgoOrder {
    let mut stages = [Algo::Blake; X16_FUNC_COUNT];
    for (j, slot) in stages.iter_mut().enumerate() {
        *slot = Algo::from_nibble(stage_nibble(window, j));
    }
    AlgoOrder(stages)
}

fn shuffled_order(window: &[u8; 8]) -> AlgoOrder {
    let mut stages: [u8; X16_FUNC_COUNT] = std::array::from_fn(|i| i as u8);
    for j in 0..X16_FUNC_COUNT {
        let pos = stage_nibble(window, j) as usize;
        let picked = stages[pos];
        stages.copy_within(0..pos, 1);
        stages[0] = picked;
    }
    AlgoOrder(stages.map(Algo::from_nibble))
}

/// Self-referential rule: the next primitive is named by the low nibble of the previous output's first byte
#[inline]
pub fn next_algo(prev: &[u8]) -> Algo {
    Algo::from_nibble(prev[0] & 0x0F)
}

/// Per-worker cache of the deterministic order.
///
/// Keyed by value on the header timestamp and order window; recomputed only
/// when either changes.
#[derive(Debug, Clone)]
pub struct OrderCache {
    rule: OrderRule,
    entry: Option<(u32, [u8; 8], AlgoOrder)>,
}

impl OrderCache {
    pub fn new(rule: OrderRule) -> Self {
        Self { rule, entry: None }
    }

    pub fn current(&self) -> Option<AlgoOrder> {
        self.entry.map(|(_, _, order)| order)
    }

    /// Return the order for `header`, recomputing it if the key changed
    pub fn refresh(&mut self, header: &[u8; HEADER_LEN]) -> AlgoOrder {
        let ntime = u32::from_le_bytes([
            header[NTIME_OFFSET],
            header[NTIME_OFFSET + 1],
            header[NTIME_OFFSET + 2],
            header[NTIME_OFFSET + 3],
        ]);
        let window = window_of(header);

        match self.entry {
            Some((cached_ntime, cached_window, order)) if cached_ntime == ntime && cached_window == window => order,
            _ => {
                let order = AlgoOrder::select(self.rule, &window);
                debug!("hash order {} ({:08x})", order, ntime);
                self.entry = Some((ntime, window, order));
                order
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: [u8; 8] = [0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD, 0xEF];

    #[test]
    fn test_fixed_window_vector() {
        assert_eq!(select_order(&WINDOW).to_string(), "EFCDAB8967452301");
    }

    #[test]
    fn test_order_string_parses_back() {
        let order: AlgoOrder = "EFCDAB8967452301".parse().unwrap();
        assert_eq!(order, select_order(&WINDOW));
        assert_eq!(order.stage(0), Algo::Whirlpool);
        assert_eq!(order.stage(15), Algo::Bmw);
        assert!(matches!("0123".parse::<AlgoOrder>(), Err(AlgoError::OrderLength(4))));
    }

    #[test]
    fn test_shuffled_is_permutation() {
        let order = AlgoOrder::select(OrderRule::Shuffled, &WINDOW);
        let mut seen = [false; X16_FUNC_COUNT];
        for algo in order.as_slice() {
            seen[algo.id() as usize] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn test_shuffled_zero_window() {
        // every nibble 0: position 0 moves to the front each time, identity stays
        let order = AlgoOrder::select(OrderRule::Shuffled, &[0u8; 8]);
        assert_eq!(order.to_string(), "0123456789ABCDEF");
    }

    #[test]
    fn test_shuffled_first_step() {
        // stage 0 reads the high nibble of window[7]: 0xF0 moves F to the front,
        // the remaining zero nibbles then keep it there
        let mut window = [0u8; 8];
        window[7] = 0xF0;
        let order = AlgoOrder::select(OrderRule::Shuffled, &window);
        assert_eq!(order.to_string(), "F0123456789ABCDE");
    }

    #[test]
    fn test_next_algo_uses_low_nibble() {
        assert_eq!(next_algo(&[0x00]), Algo::Blake);
        assert_eq!(next_algo(&[0x1F, 0xAA]), Algo::Sha512);
        assert_eq!(next_algo(&[0xE3]), Algo::Jh);
    }

    #[test]
    fn test_cache_recomputes_on_key_change() {
        let mut header = [0u8; HEADER_LEN];
        header[ORDER_WINDOW].copy_from_slice(&WINDOW);
        let mut cache = OrderCache::new(OrderRule::Plain);
        assert!(cache.current().is_none());

        let first = cache.refresh(&header);
        assert_eq!(first.to_string(), "EFCDAB8967452301");

        // nonce changes do not touch the key
        header[76] = 0xFF;
        assert_eq!(cache.refresh(&header), first);

        header[4] = 0x10;
        let second = cache.refresh(&header);
        assert_ne!(second, first);
        assert_eq!(cache.current(), Some(second));
    }
}
