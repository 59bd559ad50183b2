//! # segment-api
//!
//! Blocking client for the Segment Config API.
//!
//! This crate provides:
//! - Wire types for sources, destinations, destination filters, source
//!   schema configuration and tracking plans
//! - Parsing and building of hierarchical resource names
//! - Classification of API errors into not-found and fatal outcomes
//! - A [`Client`] trait with an HTTP implementation and an in-memory mock
//!
//! ## Example
//!
//! ```no_run
//! use segment_api::{Client, HttpClient};
//!
//! let client = HttpClient::new("token", "acme");
//! match client.get_source("ios") {
//!     Ok(source) => println!("{} ({})", source.name, source.catalog_name),
//!     Err(err) if err.is_absent() => println!("source is gone"),
//!     Err(err) => eprintln!("error: {err}"),
//! }
//! ```

#![warn(clippy::all)]

pub mod client;
pub mod error;
pub mod names;
pub mod types;

pub use client::{Client, HttpClient, MockClient, Propagation};
pub use error::{ApiError, Error, ErrorClass, Result};
pub use names::NameError;
pub use types::*;
