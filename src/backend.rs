/// Hashing backend abstraction layer (Port)
/// Lets the worker drive any chain variant, lane width or primitive suite
/// through one object-safe interface.

use std::sync::atomic::AtomicBool;

use crate::algorithms::primitive::PrimitiveSuite;
use crate::algorithms::{BundledSuite, Chain, Variant};
use crate::lanes::Lanes;
use crate::mining::Work;
use crate::scanner::{ScanMode, ScanOutcome, Scanner};

/// Backend trait - abstract interface for a nonce scanner
pub trait HashBackend: Send {
    /// Scan from `work.nonce()` up to `max_nonce`, stopping early when `restart` is raised
    fn scan(&mut self, work: &mut Work, max_nonce: u32, restart: &AtomicBool) -> ScanOutcome;

    /// Get the algorithm name (e.g., "x16r", "sonoa")
    fn algorithm_name(&self) -> &str;

    /// Nonces hashed per batch
    fn lanes(&self) -> Lanes;

    fn mode(&self) -> ScanMode;
}

impl<S: PrimitiveSuite> HashBackend for Scanner<S> {
    fn scan(&mut self, work: &mut Work, max_nonce: u32, restart: &AtomicBool) -> ScanOutcome {
        Scanner::scan(self, work, max_nonce, restart)
    }

    fn algorithm_name(&self) -> &str {
        self.chain().name()
    }

    fn lanes(&self) -> Lanes {
        Scanner::lanes(self)
    }

    fn mode(&self) -> ScanMode {
        Scanner::mode(self)
    }
}

/// Create a backend for `variant` on the bundled primitive suite
pub fn create_backend(variant: Variant, lanes: Lanes, mode: ScanMode) -> Box<dyn HashBackend> {
    Box::new(Scanner::new(Chain::<BundledSuite>::new(variant), lanes, mode))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mining::Target;

    #[test]
    fn test_backend_trait_object() {
        let mut backend = create_backend(Variant::X17, Lanes::Four, ScanMode::Live);
        assert_eq!(backend.algorithm_name(), "x17");
        assert_eq!(backend.lanes(), Lanes::Four);

        let mut work = Work::new([1u8; 80], Target::from_words([0; 4]));
        work.set_nonce(0);
        let outcome = backend.scan(&mut work, 10, &AtomicBool::new(false));
        assert_eq!(outcome.hashes_done, 10);
        assert_eq!(work.nonce(), 10);
    }
}
