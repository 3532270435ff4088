use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::CacheEntry;
use crate::models::Pin;

/// Consider a stored album stale after a week.
const ALBUM_STALE_MINUTES: i64 = 7 * 24 * 60;

const PINS_FILE: &str = "pins";
const ALBUMS_DIR: &str = "albums";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        let now = Utc::now();
        (now - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            format!("{}h ago", (minutes + 30) / 60)
        } else {
            format!("{}d ago", (minutes + 720) / 1440)
        }
    }

    pub fn is_stale(&self) -> bool {
        self.age_minutes() > ALBUM_STALE_MINUTES
    }
}

/// Persisted metadata for one photo. The bytes live in a sibling `.jpg` file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoRecord {
    pub id: String,
    pub pin_id: String,
    pub created_at: DateTime<Utc>,
    pub has_image: bool,
}

/// A photo record together with its image bytes, if downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPhoto {
    pub record: PhotoRecord,
    pub bytes: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredAlbum {
    pub pin_id: String,
    pub page: u32,
    /// Records in album order.
    pub photos: Vec<PhotoRecord>,
}

/// On-disk store for pins and their photo albums.
///
/// Layout under the store directory:
/// - `pins.json`
/// - `albums/{pin_id}.json`
/// - `albums/{pin_id}/{photo_id}.jpg`
pub struct AlbumStore {
    store_dir: PathBuf,
}

impl AlbumStore {
    pub fn new(store_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(store_dir.join(ALBUMS_DIR))
            .with_context(|| format!("Failed to create store dir: {}", store_dir.display()))?;
        Ok(Self { store_dir })
    }

    fn json_path(&self, name: &str) -> PathBuf {
        self.store_dir.join(format!("{}.json", name))
    }

    fn album_path(&self, pin_id: &str) -> PathBuf {
        self.store_dir.join(ALBUMS_DIR).join(format!("{}.json", pin_id))
    }

    fn images_dir(&self, pin_id: &str) -> PathBuf {
        self.store_dir.join(ALBUMS_DIR).join(pin_id)
    }

    fn image_path(&self, pin_id: &str, photo_id: &str) -> PathBuf {
        self.images_dir(pin_id).join(format!("{}.jpg", photo_id))
    }

    fn load<T: DeserializeOwned>(path: &Path) -> Result<Option<CachedData<T>>> {
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read store file: {}", path.display()))?;

        let cached: CachedData<T> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse store file: {}", path.display()))?;

        Ok(Some(cached))
    }

    fn save<T: Serialize>(path: &Path, data: &T) -> Result<()> {
        let cached = CachedData::new(data);
        let contents = serde_json::to_string_pretty(&cached)?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write store file: {}", path.display()))?;
        Ok(())
    }

    /// Ids become file names; refuse anything that could escape the store.
    fn check_name(kind: &str, name: &str) -> Result<()> {
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains(['/', '\\'])
        {
            bail!("Invalid {} id: {:?}", kind, name);
        }
        Ok(())
    }

    // ===== Pins =====

    pub fn load_pins(&self) -> Result<Vec<Pin>> {
        Ok(Self::load::<Vec<Pin>>(&self.json_path(PINS_FILE))?
            .map(|c| c.data)
            .unwrap_or_default())
    }

    pub fn save_pins(&self, pins: &[Pin]) -> Result<()> {
        Self::save(&self.json_path(PINS_FILE), &pins)
    }

    pub fn find_pin(&self, pin_id: &str) -> Result<Option<Pin>> {
        Ok(self.load_pins()?.into_iter().find(|p| p.id == pin_id))
    }

    /// Add a pin. Returns `false` if a pin with the same id already exists.
    pub fn add_pin(&self, pin: Pin) -> Result<bool> {
        Self::check_name("pin", &pin.id)?;
        let mut pins = self.load_pins()?;
        if pins.iter().any(|p| p.id == pin.id) {
            return Ok(false);
        }
        debug!(pin_id = %pin.id, "Adding pin");
        pins.push(pin);
        self.save_pins(&pins)?;
        Ok(true)
    }

    /// Remove a pin along with its album and images.
    pub fn remove_pin(&self, pin_id: &str) -> Result<bool> {
        Self::check_name("pin", pin_id)?;
        let mut pins = self.load_pins()?;
        let before = pins.len();
        pins.retain(|p| p.id != pin_id);
        if pins.len() == before {
            return Ok(false);
        }
        self.save_pins(&pins)?;
        self.remove_album(pin_id)?;
        Ok(true)
    }

    // ===== Albums =====

    pub fn load_album(&self, pin_id: &str) -> Result<Option<CachedData<StoredAlbum>>> {
        Self::check_name("pin", pin_id)?;
        Self::load(&self.album_path(pin_id))
    }

    fn write_album(&self, album: &StoredAlbum) -> Result<()> {
        std::fs::create_dir_all(self.images_dir(&album.pin_id))?;
        Self::save(&self.album_path(&album.pin_id), album)
    }

    /// Replace the stored album for `pin_id` with the cache's current entries.
    ///
    /// Records keep their original `created_at`; image files for photos no
    /// longer in the album are removed. A pending entry keeps an image that
    /// was stored for it earlier.
    pub fn save_album(&self, pin_id: &str, page: u32, entries: &[CacheEntry]) -> Result<()> {
        Self::check_name("pin", pin_id)?;
        for entry in entries {
            Self::check_name("photo", &entry.key)?;
        }

        let previous: HashMap<String, PhotoRecord> = self
            .load_album(pin_id)?
            .map(|c| c.data.photos)
            .unwrap_or_default()
            .into_iter()
            .map(|r| (r.id.clone(), r))
            .collect();

        std::fs::create_dir_all(self.images_dir(pin_id))?;
        let now = Utc::now();
        let mut photos = Vec::with_capacity(entries.len());
        for entry in entries {
            let previous_record = previous.get(&entry.key);
            let has_image = match &entry.payload {
                Some(bytes) => {
                    std::fs::write(self.image_path(pin_id, &entry.key), bytes)
                        .with_context(|| format!("Failed to write image {}", entry.key))?;
                    true
                }
                None => {
                    // A failed re-download keeps the image stored earlier
                    let kept = previous_record.is_some_and(|r| r.has_image)
                        && self.image_path(pin_id, &entry.key).exists();
                    if !kept {
                        self.remove_image(pin_id, &entry.key);
                    }
                    kept
                }
            };
            photos.push(PhotoRecord {
                id: entry.key.clone(),
                pin_id: pin_id.to_string(),
                created_at: previous_record.map_or(now, |r| r.created_at),
                has_image,
            });
        }

        for id in previous.keys().filter(|id| !photos.iter().any(|p| &p.id == *id)) {
            self.remove_image(pin_id, id);
        }

        debug!(pin_id, page, count = photos.len(), "Saving album");
        self.write_album(&StoredAlbum {
            pin_id: pin_id.to_string(),
            page,
            photos,
        })
    }

    /// Insert or update one photo. New photos go to the end of the album.
    pub fn upsert_photo(&self, pin_id: &str, photo_id: &str, bytes: Option<&[u8]>) -> Result<()> {
        Self::check_name("pin", pin_id)?;
        Self::check_name("photo", photo_id)?;

        let mut album = self
            .load_album(pin_id)?
            .map(|c| c.data)
            .unwrap_or_else(|| StoredAlbum {
                pin_id: pin_id.to_string(),
                page: 1,
                photos: Vec::new(),
            });

        std::fs::create_dir_all(self.images_dir(pin_id))?;
        if let Some(bytes) = bytes {
            std::fs::write(self.image_path(pin_id, photo_id), bytes)
                .with_context(|| format!("Failed to write image {}", photo_id))?;
        }

        match album.photos.iter().position(|r| r.id == photo_id) {
            Some(i) => album.photos[i].has_image |= bytes.is_some(),
            None => album.photos.push(PhotoRecord {
                id: photo_id.to_string(),
                pin_id: pin_id.to_string(),
                created_at: Utc::now(),
                has_image: bytes.is_some(),
            }),
        }
        self.write_album(&album)
    }

    /// Delete photos from a pin's album, returning how many were present.
    pub fn delete_photos<K: AsRef<str>>(&self, pin_id: &str, photo_ids: &[K]) -> Result<usize> {
        let Some(cached) = self.load_album(pin_id)? else {
            return Ok(0);
        };
        let mut album = cached.data;

        let before = album.photos.len();
        album
            .photos
            .retain(|r| !photo_ids.iter().any(|id| id.as_ref() == r.id));
        let removed = before - album.photos.len();

        for id in photo_ids {
            if Self::check_name("photo", id.as_ref()).is_ok() {
                self.remove_image(pin_id, id.as_ref());
            }
        }
        if removed > 0 {
            self.write_album(&album)?;
        }
        Ok(removed)
    }

    /// Photos of a pin's album in order, with their bytes.
    pub fn list_photos(&self, pin_id: &str) -> Result<Vec<StoredPhoto>> {
        let Some(cached) = self.load_album(pin_id)? else {
            return Ok(Vec::new());
        };

        cached
            .data
            .photos
            .into_iter()
            .map(|record| {
                let bytes = if record.has_image {
                    let path = self.image_path(pin_id, &record.id);
                    match std::fs::read(&path) {
                        Ok(bytes) => Some(bytes),
                        Err(e) => {
                            warn!(photo_id = %record.id, error = %e, "Stored image missing, treating as pending");
                            None
                        }
                    }
                } else {
                    None
                };
                Ok(StoredPhoto { record, bytes })
            })
            .collect()
    }

    fn remove_image(&self, pin_id: &str, photo_id: &str) {
        let path = self.image_path(pin_id, photo_id);
        if path.exists() {
            if let Err(e) = std::fs::remove_file(&path) {
                warn!(path = %path.display(), error = %e, "Failed to remove image file");
            }
        }
    }

    fn remove_album(&self, pin_id: &str) -> Result<()> {
        let album = self.album_path(pin_id);
        if album.exists() {
            std::fs::remove_file(&album)?;
        }
        let images = self.images_dir(pin_id);
        if images.exists() {
            std::fs::remove_dir_all(&images)?;
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
