//! Document source implementations.

pub mod http;

pub use http::HttpSource;
