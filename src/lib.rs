//! wirehttp - HTTP/1.1 over raw TCP
//!
//! An incremental request parser and an order-enforcing response writer built
//! directly on byte streams, plus the small server, routes and proxy that
//! exercise them.

pub mod config;
pub mod http;
pub mod proxy;
pub mod routes;
pub mod server;
