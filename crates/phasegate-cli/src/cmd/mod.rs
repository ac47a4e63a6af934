pub mod config;
pub mod gate;
pub mod init;
pub mod next;
pub mod order;
pub mod run;
pub mod task;
