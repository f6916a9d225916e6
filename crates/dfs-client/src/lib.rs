//! # dfs-client
//!
//! Client library for the dfs file server: a framed TCP [`Connection`], a
//! line-translating [`Client`] and its read [`ResponseCache`].

pub mod cache;
pub mod client;
pub mod connection;
pub mod constants;

pub use cache::ResponseCache;
pub use client::{Client, Response, translate};
pub use connection::{ClientError, Connection, Framing};
