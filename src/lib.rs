// Library interface for the binary, tests and benches
pub mod algorithms;
pub mod backend;
pub mod config;
pub mod lanes;
pub mod mining;
pub mod scanner;
pub mod worker;
