pub mod api;
pub mod cli;
pub mod dispatcher;
pub mod error;
pub mod evaluator;
pub mod events;
pub mod gateway;
pub mod locks;
pub mod price;
pub mod scheduler;
pub mod utils;


pub use cli::{setup_logging, Cli};
pub use error::KeeperError;
