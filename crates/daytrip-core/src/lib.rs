pub mod catalog;
pub mod config;
pub mod error;
pub mod generation;
pub mod ledger;
pub mod planner;
pub mod search;
pub mod session;
pub mod storage;

pub use catalog::*;
pub use config::*;
pub use error::*;
pub use generation::*;
pub use ledger::*;
pub use planner::*;
pub use search::*;
pub use session::*;
pub use storage::*;
