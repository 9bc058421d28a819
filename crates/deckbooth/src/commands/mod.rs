pub mod cache;
pub mod completion;
pub mod config;
