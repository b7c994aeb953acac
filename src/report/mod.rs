pub mod aggregate;
pub mod dataset;
pub mod export;
pub mod filter;
pub mod pipeline;
pub mod progress;
pub mod table;
