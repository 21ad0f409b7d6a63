pub mod chain;
pub mod dynamics;
pub mod filter;
pub mod noise;
