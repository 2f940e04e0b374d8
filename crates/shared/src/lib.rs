pub mod models;
pub mod utils;
pub mod web3;
