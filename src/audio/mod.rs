pub mod decode;
pub mod dna;
pub mod signal;
