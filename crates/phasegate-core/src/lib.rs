pub mod config;
pub mod error;
pub mod executor;
pub mod gate;
pub mod io;
pub mod notify;
pub mod order;
pub mod paths;
pub mod runner;
pub mod store;
pub mod task;
pub mod title;
pub mod types;

pub use error::{PhasegateError, Result};
