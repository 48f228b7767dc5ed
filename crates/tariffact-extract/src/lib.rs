//! Extraction layer: HTTP client for the tariff-fact inference service.

mod client;
pub use client::{ExtractClient, ExtractError};
