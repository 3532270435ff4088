//! REST API client module for the Flickr photo services.
//!
//! This module provides the `FlickrClient` for searching photos near a
//! coordinate and downloading their images, along with the `IndexFetcher`
//! and `ImageFetcher` traits that album sessions are written against.
//!
//! Searches are authenticated with an API key passed as a query parameter;
//! image downloads from the static farm hosts need no credentials.

pub mod client;
pub mod error;
pub mod fetcher;

pub use client::{FlickrClient, SearchResult};
pub use error::{ApiError, ErrorKind};
pub use fetcher::{ImageFetcher, IndexFetcher};
