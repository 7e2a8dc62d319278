pub mod devnet;
pub mod factory;
pub mod wallet;
