//! Core library for pinalbum.
//!
//! Drop a pin, search Flickr for photos taken near it, and download them
//! into a local cache one page at a time:
//!
//! - [`api`]: Flickr search and image download client
//! - [`models`]: pins, coordinates and photo descriptors
//! - [`cache`]: the in-memory photo cache observed by the UI
//! - [`album`]: album sessions that drive page loads
//! - [`store`]: on-disk pins and albums for offline browsing
//! - [`config`]: application configuration

pub mod album;
pub mod api;
pub mod cache;
pub mod config;
pub mod models;
pub mod store;

pub use album::{AlbumSession, LoadOutcome, LoadReport, SessionNotice, SessionState};
pub use api::{ApiError, FlickrClient};
pub use cache::PhotoCache;
pub use config::Config;
pub use models::{Coordinate, Pin};
pub use store::AlbumStore;
