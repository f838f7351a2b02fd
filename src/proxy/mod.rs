//! Reverse proxy to a single plain-HTTP upstream.

pub mod upstream;

pub use upstream::ProxyHandler;
