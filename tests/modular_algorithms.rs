#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;

    use x16_miner::algorithms::{BundledSuite, Chain, HashAlgorithm, Variant};
    use x16_miner::backend::{create_backend, HashBackend};
    use x16_miner::lanes::Lanes;
    use x16_miner::mining::{Target, Work};
    use x16_miner::scanner::ScanMode;

    #[test]
    fn test_every_variant_hashes() {
        let header = [0x42u8; 80];
        for variant in Variant::ALL {
            let chain = Chain::<BundledSuite>::new(variant);
            let digest = chain.hash(&header);
            println!("{:<8} {}", chain.name(), hex::encode(digest));
            assert_eq!(digest, chain.hash(&header));
        }
    }

    #[test]
    fn test_variants_produce_distinct_digests() {
        let header = [0x42u8; 80];
        let digests: Vec<[u8; 32]> = Variant::ALL
            .iter()
            .map(|v| Chain::<BundledSuite>::new(*v).hash(&header))
            .collect();
        for (i, a) in digests.iter().enumerate() {
            for b in &digests[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_hash_algorithm_trait_object() {
        let algos: Vec<Box<dyn HashAlgorithm>> = vec![
            Box::new(Chain::<BundledSuite>::new(Variant::X16r)),
            Box::new(Chain::<BundledSuite>::new(Variant::Xevan)),
        ];
        let names: Vec<&str> = algos.iter().map(|a| a.name()).collect();
        assert_eq!(names, vec!["x16r", "xevan"]);

        let digest = algos[0].hash(&[0u8; 80]);
        assert!(algos[0].meets_target(&digest, &Target::MAX));
    }

    #[test]
    fn test_backend_trait_object_creation() {
        let mut backends: Vec<Box<dyn HashBackend>> = vec![
            create_backend(Variant::Hex, Lanes::Eight, ScanMode::Live),
            create_backend(Variant::Sonoa, Lanes::One, ScanMode::Bench),
        ];
        for backend in backends.iter_mut() {
            let mut work = Work::new([7u8; 80], Target::MAX);
            work.set_nonce(0);
            let outcome = backend.scan(&mut work, 8, &AtomicBool::new(false));
            assert_eq!(outcome.hashes_done, 8);
        }
    }

    #[test]
    fn test_algorithm_name_recognition() {
        for name in ["x16r", "x16s", "x16rv2", "hex", "x17", "sonoa", "xevan"] {
            assert_eq!(name.parse::<Variant>().unwrap().to_string(), name);
        }
        assert!("scrypt".parse::<Variant>().is_err());
        assert!("sha256d".parse::<Variant>().is_err());
    }
}
