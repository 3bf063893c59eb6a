pub mod chunking;
pub mod config;
pub mod error;
pub mod extract;
pub mod upload;
