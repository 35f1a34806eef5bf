//! Clients for NOAA climate and ocean data services.
//!
//! Every fetcher goes through a [`NoaaClient`], which owns the HTTP client and
//! the on-disk response cache. Decoded data comes back as Arrow record batches
//! that [`output::save_batch`] writes to Parquet.

pub mod buoy;
pub mod cache;
pub mod client;
pub mod config;
pub mod deserialise;
pub mod download;
pub mod erddap;
pub mod error;
pub mod fixed_width;
pub mod ghcnd;
pub mod homr;
pub mod isd;
pub mod legacy;
pub mod output;
pub mod storms;
pub mod table;

#[cfg(test)]
mod test_support;

pub use client::NoaaClient;
pub use config::Config;
pub use error::{Error, Result};
