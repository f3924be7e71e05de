pub mod ata;
pub mod dev;
pub mod pass;
pub mod prng;
pub mod sgio;
pub mod sim;
