use std::future::Future;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};

use pinalbum_core::cache::CacheEvent;
use pinalbum_core::store::CachedData;
use pinalbum_core::store::StoredAlbum;
use pinalbum_core::{
    AlbumSession, AlbumStore, Config, Coordinate, FlickrClient, LoadOutcome, LoadReport,
    PhotoCache, Pin, SessionNotice,
};

use crate::format::{format_bytes, truncate};

/// Longest photo id shown in the album listing
const MAX_ID_WIDTH: usize = 24;

// ===== Pins =====

pub fn add_pin(store: &AlbumStore, latitude: f64, longitude: f64) -> Result<()> {
    let pin = Pin::new(Coordinate::new(latitude, longitude)).map_err(anyhow::Error::msg)?;
    let id = pin.id.clone();
    if store.add_pin(pin)? {
        println!("Dropped pin {}", id);
    } else {
        println!("Pin {} already exists", id);
    }
    Ok(())
}

pub fn list_pins(store: &AlbumStore) -> Result<()> {
    let pins = store.load_pins()?;
    if pins.is_empty() {
        println!("No pins yet. Drop one with `pinalbum pins add <lat> <lon>`.");
        return Ok(());
    }

    for pin in pins {
        let album = match store.load_album(&pin.id)? {
            Some(cached) => format!(
                "page {}, {} photos, updated {}",
                cached.data.page,
                cached.data.photos.len(),
                cached.age_display()
            ),
            None => "no album yet".to_string(),
        };
        println!("{}  ({})  {}", pin.id, pin.coordinate, album);
    }
    Ok(())
}

pub fn remove_pin(store: &AlbumStore, pin_id: &str) -> Result<()> {
    if store.remove_pin(pin_id)? {
        println!("Removed pin {}", pin_id);
        Ok(())
    } else {
        bail!("No pin with id {}", pin_id)
    }
}

// ===== Albums =====

fn find_pin(store: &AlbumStore, pin_id: &str) -> Result<Pin> {
    store
        .find_pin(pin_id)?
        .with_context(|| format!("No pin with id {}", pin_id))
}

fn open_session(config: &Config, pin: &Pin) -> Result<AlbumSession> {
    let client = FlickrClient::new(config).context(
        "Flickr API key required: pass --api-key or set FLICKR_API_KEY",
    )?;
    let cache = Arc::new(PhotoCache::new());
    Ok(AlbumSession::with_client(pin.coordinate, client, cache)
        .with_max_concurrent(config.fetch_concurrency()))
}

/// Load the stored album into the session's cache and settle on its page.
fn restore_album(store: &AlbumStore, session: &AlbumSession, album: &CachedData<StoredAlbum>) -> Result<()> {
    let photos = store.list_photos(&album.data.pin_id)?;
    let restored = session
        .cache()
        .restore(photos.into_iter().map(|p| (p.record.id, p.bytes)));
    session.restore(album.data.page);
    debug!(restored, page = album.data.page, "Restored stored album");
    Ok(())
}

/// Drive a load while printing cache progress as it happens.
async fn load_with_progress<F>(session: &AlbumSession, load: F) -> LoadReport
where
    F: Future<Output = LoadReport>,
{
    let mut events = session.cache().subscribe();
    tokio::pin!(load);

    loop {
        tokio::select! {
            report = &mut load => {
                while let Ok(event) = events.try_recv() {
                    print_event(&event);
                }
                return report;
            }
            event = events.recv() => match event {
                Ok(event) => print_event(&event),
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "Progress output lagged"),
                Err(RecvError::Closed) => return load.await,
            }
        }
    }
}

fn print_event(event: &CacheEvent) {
    match event {
        CacheEvent::Updated { key, pending: false } => eprintln!("  ✓ {}", key),
        CacheEvent::Removed { keys } => eprintln!("  removed {} photos", keys.len()),
        _ => {}
    }
}

/// Turn a load report into output, saving the album when the page loaded.
fn finish_load(store: &AlbumStore, pin: &Pin, session: &AlbumSession, report: LoadReport) -> Result<()> {
    match report.outcome {
        LoadOutcome::Completed(summary) => {
            eprintln!(
                "Loaded {}/{} photos{}",
                summary.succeeded,
                summary.total,
                if summary.failed > 0 {
                    format!(" ({} failed)", summary.failed)
                } else {
                    String::new()
                }
            );
        }
        LoadOutcome::Empty => eprintln!("No images were found for page {}", report.page),
        LoadOutcome::IndexFailed(e) => {
            if store.load_album(&pin.id)?.is_none() {
                return Err(anyhow::Error::new(e).context("Failed to load photo list"));
            }
            // Keep showing what is already stored
            let notice = session.notice().unwrap_or_else(|| SessionNotice::from(&e));
            eprintln!("{}; showing the stored album", notice);
            return print_album(store, &pin.id);
        }
        LoadOutcome::Superseded => bail!("Load was superseded"),
    }

    store.save_album(&pin.id, report.page, &session.cache().list())?;
    info!(pin_id = %pin.id, page = report.page, "Album saved");
    print_album(store, &pin.id)
}

fn print_album(store: &AlbumStore, pin_id: &str) -> Result<()> {
    let Some(album) = store.load_album(pin_id)? else {
        println!("No album for {}", pin_id);
        return Ok(());
    };

    println!(
        "Album for {} - page {} ({} photos, updated {})",
        pin_id,
        album.data.page,
        album.data.photos.len(),
        album.age_display()
    );
    for (i, photo) in store.list_photos(pin_id)?.iter().enumerate() {
        let size = photo
            .bytes
            .as_ref()
            .map(|b| format_bytes(b.len()))
            .unwrap_or_else(|| "pending".to_string());
        println!(
            "{:>3}. {:<width$}  {}",
            i + 1,
            truncate(&photo.record.id, MAX_ID_WIDTH),
            size,
            width = MAX_ID_WIDTH
        );
    }
    Ok(())
}

pub async fn show_album(
    config: &Config,
    store: &AlbumStore,
    pin_id: &str,
    page: Option<u32>,
    refresh: bool,
) -> Result<()> {
    let pin = find_pin(store, pin_id)?;
    let stored = store.load_album(&pin.id)?;

    if let Some(cached) = &stored {
        let same_page = page.map_or(true, |p| p == cached.data.page);
        if same_page && !refresh && !cached.is_stale() {
            return print_album(store, &pin.id);
        }
    }

    let page = page
        .or_else(|| stored.as_ref().map(|c| c.data.page))
        .unwrap_or(1);
    let session = open_session(config, &pin)?;
    if let Some(cached) = &stored {
        restore_album(store, &session, cached)?;
    }

    eprintln!("Loading page {} for {}...", page, session.coordinate());
    let report = load_with_progress(&session, session.load_page(page)).await;
    finish_load(store, &pin, &session, report)
}

pub async fn new_collection(config: &Config, store: &AlbumStore, pin_id: &str) -> Result<()> {
    let pin = find_pin(store, pin_id)?;
    let session = open_session(config, &pin)?;
    load_new_collection(store, &pin, &session).await
}

/// Replace the stored album with the page after it, or page 1 if there is none.
async fn load_new_collection(store: &AlbumStore, pin: &Pin, session: &AlbumSession) -> Result<()> {
    let page = match store.load_album(&pin.id)? {
        Some(cached) => {
            restore_album(store, session, &cached)?;
            cached.data.page.saturating_add(1)
        }
        None => 1,
    };

    eprintln!("Loading new collection (page {}) for {}...", page, session.coordinate());
    let report = load_with_progress(session, session.reset_and_load(page)).await;
    finish_load(store, pin, session, report)
}

pub fn delete_photos(store: &AlbumStore, pin_id: &str, photo_ids: &[String]) -> Result<()> {
    let pin = find_pin(store, pin_id)?;
    let removed = store.delete_photos(&pin.id, photo_ids)?;
    if removed == 0 {
        bail!("None of the given photos are in the album for {}", pin.id);
    }
    println!("Deleted {} of {} photos", removed, photo_ids.len());
    print_album(store, &pin.id)
}
