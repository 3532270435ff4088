//! In-memory photo cache for the album currently on screen.
//!
//! This module provides the `PhotoCache`, a keyed store mapping photo
//! identifiers to image bytes. Entries start as pending placeholders that
//! reserve their slot in the album order and are filled in as downloads
//! complete. Observers can subscribe to `CacheEvent`s instead of polling.

pub mod photo_cache;

pub use photo_cache::{CacheEntry, CacheEvent, PhotoCache, PutResult};
