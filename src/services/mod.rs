pub mod cache;
pub mod catalog;
pub mod classifier;
pub mod loader;
pub mod m3u_parser;
pub mod metrics;
pub mod upstream;
