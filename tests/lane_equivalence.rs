use std::sync::atomic::AtomicBool;

use test_case::test_case;
use x16_miner::algorithms::{Chain, Variant};
use x16_miner::lanes::Lanes;
use x16_miner::mining::{Target, Work};
use x16_miner::scanner::{ScanMode, ScanStatus, Scanner};

fn template() -> [u8; 80] {
    let mut header = [0u8; 80];
    for (i, byte) in header.iter_mut().enumerate() {
        *byte = (i as u8).wrapping_mul(53).wrapping_add(11);
    }
    header
}

// every nonce passes Target::MAX, so every lane digest is extracted and re-verified
fn assert_scan_matches_scalar(variant: Variant, lanes: Lanes) {
    let chain: Chain = Chain::new(variant);
    let mut scanner = Scanner::new(chain.clone(), lanes, ScanMode::Live);
    let header = template();
    let mut work = Work::new(header, Target::MAX);
    let start = 5_000u32;
    let end = start + 3 * lanes.count() as u32 + 1;
    work.set_nonce(start);

    let outcome = scanner.scan(&mut work, end, &AtomicBool::new(false));

    assert_eq!(outcome.status, ScanStatus::Exhausted);
    assert_eq!(outcome.hashes_done, (end - start) as u64);
    assert_eq!(outcome.candidates.len(), (end - start) as usize);
    for (candidate, nonce) in outcome.candidates.iter().zip(start..end) {
        assert_eq!(candidate.nonce, nonce);
        assert_eq!(candidate.digest, chain.hash_chain(&header, nonce), "{} x{} nonce {}", variant, lanes, nonce);
    }
}

#[test_case(Variant::X16r ; "x16r")]
#[test_case(Variant::X16s ; "x16s")]
#[test_case(Variant::X16rv2 ; "x16rv2")]
#[test_case(Variant::Hex ; "hex")]
#[test_case(Variant::X17 ; "x17")]
#[test_case(Variant::Sonoa ; "sonoa")]
#[test_case(Variant::Xevan ; "xevan")]
fn test_four_lanes_match_scalar(variant: Variant) {
    assert_scan_matches_scalar(variant, Lanes::Four);
}

#[test_case(Variant::X16r ; "x16r")]
#[test_case(Variant::X16s ; "x16s")]
#[test_case(Variant::X16rv2 ; "x16rv2")]
#[test_case(Variant::Hex ; "hex")]
#[test_case(Variant::X17 ; "x17")]
#[test_case(Variant::Sonoa ; "sonoa")]
#[test_case(Variant::Xevan ; "xevan")]
fn test_eight_lanes_match_scalar(variant: Variant) {
    assert_scan_matches_scalar(variant, Lanes::Eight);
}

#[test_case(Variant::X16r ; "x16r")]
#[test_case(Variant::X16rv2 ; "x16rv2")]
#[test_case(Variant::Xevan ; "xevan")]
fn test_single_lane_matches_scalar(variant: Variant) {
    assert_scan_matches_scalar(variant, Lanes::One);
}

#[test]
fn test_orders_across_many_windows() {
    // sweep the order window so most primitives land on stage 0, including midstate-capable ones
    let chain: Chain = Chain::new(Variant::X16r);
    for seed in 0u8..16 {
        let mut header = template();
        header[4..12].copy_from_slice(&[seed.wrapping_mul(0x11); 8]);
        let mut scanner = Scanner::new(chain.clone(), Lanes::Eight, ScanMode::Live);
        let mut work = Work::new(header, Target::MAX);
        work.set_nonce(0);
        let outcome = scanner.scan(&mut work, 8, &AtomicBool::new(false));
        for candidate in &outcome.candidates {
            assert_eq!(candidate.digest, chain.hash_chain(&header, candidate.nonce));
        }
    }
}
