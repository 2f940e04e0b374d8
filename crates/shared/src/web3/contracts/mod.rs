pub mod core;
pub mod implementations;
