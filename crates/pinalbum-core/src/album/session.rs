use std::collections::HashSet;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::{FlickrClient, ImageFetcher, IndexFetcher};
use crate::cache::PhotoCache;
use crate::models::{Coordinate, PhotoDescriptor};

use super::{
    AlbumPage, FetchSummary, LoadOutcome, LoadReport, SessionError, SessionNotice, SessionState,
};

/// Image downloads in flight per page unless configured otherwise.
const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 25;

/// How one dispatched image fetch ended.
enum Completion {
    Stored,
    Failed,
    Discarded,
}

struct Shared {
    generation: u64,
    state: SessionState,
    page: Option<AlbumPage>,
    /// Last page number a load was started for.
    requested_page: u32,
    notice: Option<SessionNotice>,
    last_summary: Option<FetchSummary>,
}

/// Loads pages of photos for one pin into a `PhotoCache`.
///
/// All methods take `&self`; wrap the session in an `Arc` to start a new
/// load from another task while one is still downloading. The newer load
/// wins: the older call returns `LoadOutcome::Superseded` and none of its
/// late downloads reach the cache.
pub struct AlbumSession {
    coordinate: Coordinate,
    index: Arc<dyn IndexFetcher>,
    images: Arc<dyn ImageFetcher>,
    cache: Arc<PhotoCache>,
    max_concurrent: usize,
    shared: Mutex<Shared>,
    generation_tx: watch::Sender<u64>,
}

impl AlbumSession {
    pub fn new(
        coordinate: Coordinate,
        index: Arc<dyn IndexFetcher>,
        images: Arc<dyn ImageFetcher>,
        cache: Arc<PhotoCache>,
    ) -> Self {
        let (generation_tx, _) = watch::channel(0);
        Self {
            coordinate,
            index,
            images,
            cache,
            max_concurrent: DEFAULT_MAX_CONCURRENT_FETCHES,
            shared: Mutex::new(Shared {
                generation: 0,
                state: SessionState::Idle,
                page: None,
                requested_page: 0,
                notice: None,
                last_summary: None,
            }),
            generation_tx,
        }
    }

    /// Session backed by Flickr for both the photo list and the images.
    pub fn with_client(coordinate: Coordinate, client: FlickrClient, cache: Arc<PhotoCache>) -> Self {
        let client = Arc::new(client);
        Self::new(coordinate, client.clone(), client, cache)
    }

    /// Limit the number of image downloads in flight at once (minimum 1).
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    // ===== Accessors =====

    pub fn coordinate(&self) -> Coordinate {
        self.coordinate
    }

    pub fn cache(&self) -> &Arc<PhotoCache> {
        &self.cache
    }

    pub fn state(&self) -> SessionState {
        self.shared.lock().state
    }

    pub fn generation(&self) -> u64 {
        self.shared.lock().generation
    }

    pub fn current_page(&self) -> Option<AlbumPage> {
        self.shared.lock().page.clone()
    }

    /// Notice from the most recent settled load, if it has one to show.
    pub fn notice(&self) -> Option<SessionNotice> {
        self.shared.lock().notice.clone()
    }

    pub fn last_summary(&self) -> Option<FetchSummary> {
        self.shared.lock().last_summary
    }

    // ===== Loading =====

    /// Load page `page`, replacing the current page once its photo list arrives.
    pub async fn load_page(&self, page: u32) -> LoadReport {
        self.run_load(page, false).await
    }

    /// Load the page after the one last requested.
    pub async fn next_page(&self) -> LoadReport {
        let page = self.shared.lock().requested_page.saturating_add(1);
        self.run_load(page, false).await
    }

    /// Drop the current page's photos from the cache, then load `page`.
    pub async fn reset_and_load(&self, page: u32) -> LoadReport {
        self.run_load(page, true).await
    }

    /// Adopt the cache's current entries as page `page` and settle.
    ///
    /// Used after an album has been read back from the persisted store.
    pub fn restore(&self, page: u32) {
        let mut shared = self.shared.lock();
        shared.generation += 1;
        shared.page = Some(AlbumPage::new(page, self.cache.keys()));
        shared.requested_page = page;
        shared.state = SessionState::Settled;
        shared.notice = None;
        self.generation_tx.send_replace(shared.generation);
        debug!(page, generation = shared.generation, "Album restored from cache");
    }

    /// Remove `keys` from the cache and the current page. Only allowed once settled.
    pub fn delete_selected<K: AsRef<str>>(&self, keys: &[K]) -> Result<usize, SessionError> {
        let mut shared = self.shared.lock();
        if shared.state != SessionState::Settled {
            return Err(SessionError::NotSettled(shared.state));
        }
        if let Some(page) = shared.page.as_mut() {
            page.remove(keys);
        }
        let removed = self.cache.delete(keys);
        info!(removed, "Deleted selected photos");
        Ok(removed)
    }

    async fn run_load(&self, page: u32, reset: bool) -> LoadReport {
        let generation = self.begin(page, reset);
        info!(coordinate = %self.coordinate, page, generation, reset, "Loading album page");

        let result = self.index.fetch_index(self.coordinate, page).await;

        let descriptors = {
            let mut shared = self.shared.lock();
            if shared.generation != generation {
                debug!(generation, "Photo list arrived for a superseded load");
                return Self::report(generation, page, LoadOutcome::Superseded);
            }

            let descriptors = match result {
                Ok(descriptors) => descriptors,
                Err(e) => {
                    warn!(page, error = %e, "Failed to fetch photo list");
                    shared.state = SessionState::Settled;
                    shared.notice = Some(SessionNotice::from(&e));
                    return Self::report(generation, page, LoadOutcome::IndexFailed(e));
                }
            };

            shared.state = SessionState::PopulatingPlaceholders;
            let descriptors = Self::dedupe(descriptors);

            // The new page replaces the old one only now that it is known
            if let Some(old) = shared.page.take() {
                self.cache.delete(&old.keys);
            }
            for photo in &descriptors {
                self.cache.put_placeholder(&photo.id);
            }
            shared.page = Some(AlbumPage::new(
                page,
                descriptors.iter().map(|p| p.id.clone()).collect(),
            ));

            if descriptors.is_empty() {
                info!(page, "No photos found");
                shared.state = SessionState::Settled;
                shared.notice = Some(SessionNotice::EmptyResult);
                shared.last_summary = Some(FetchSummary::default());
                return Self::report(generation, page, LoadOutcome::Empty);
            }

            shared.state = SessionState::FetchingImages;
            descriptors
        };

        debug!(count = descriptors.len(), max_concurrent = self.max_concurrent, "Fetching images");

        // Build the futures before streaming them; a mapping closure over borrowed
        // descriptors keeps the load future from being spawned
        let fetches: Vec<_> = descriptors
            .iter()
            .map(|photo| self.fetch_one(generation, photo))
            .collect();
        let completions: Vec<Completion> = stream::iter(fetches)
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;

        let mut summary = FetchSummary {
            total: descriptors.len(),
            ..FetchSummary::default()
        };
        let mut discarded = 0;
        for completion in completions {
            match completion {
                Completion::Stored => summary.succeeded += 1,
                Completion::Failed => summary.failed += 1,
                Completion::Discarded => discarded += 1,
            }
        }

        let mut shared = self.shared.lock();
        if shared.generation != generation || discarded > 0 {
            debug!(generation, discarded, "Load superseded while fetching images");
            return Self::report(generation, page, LoadOutcome::Superseded);
        }

        shared.state = SessionState::Settled;
        shared.last_summary = Some(summary);
        if summary.failed > 0 {
            warn!(page, failed = summary.failed, total = summary.total, "Some images failed to load");
        }
        info!(
            page,
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Album page settled"
        );
        Self::report(generation, page, LoadOutcome::Completed(summary))
    }

    /// Start a new generation. Returns its tag.
    fn begin(&self, page: u32, reset: bool) -> u64 {
        let mut shared = self.shared.lock();
        shared.generation += 1;
        shared.state = SessionState::LoadingIndex;
        shared.requested_page = page;
        shared.notice = None;

        if reset {
            if let Some(old) = shared.page.take() {
                let removed = self.cache.delete(&old.keys);
                debug!(page = old.number, removed, "Cleared album before reload");
            }
        }

        self.generation_tx.send_replace(shared.generation);
        shared.generation
    }

    async fn fetch_one(&self, generation: u64, photo: &PhotoDescriptor) -> Completion {
        let mut rx = self.generation_tx.subscribe();
        let result = tokio::select! {
            result = self.images.fetch_image(photo) => result,
            _ = Self::superseded(&mut rx, generation) => {
                debug!(photo_id = %photo.id, "Image fetch cancelled");
                return Completion::Discarded;
            }
        };

        match result {
            Ok(bytes) => {
                if self.commit(generation, &photo.id, bytes) {
                    Completion::Stored
                } else {
                    Completion::Discarded
                }
            }
            Err(e) => {
                debug!(photo_id = %photo.id, error = %e, "Image fetch failed");
                Completion::Failed
            }
        }
    }

    /// Write a downloaded image if its load is still current and the photo
    /// is still on the page.
    fn commit(&self, generation: u64, key: &str, bytes: Vec<u8>) -> bool {
        let shared = self.shared.lock();
        if shared.generation != generation {
            debug!(photo_id = key, generation, "Discarding stale image");
            return false;
        }
        if !shared.page.as_ref().is_some_and(|p| p.contains(key)) {
            return false;
        }
        self.cache.put(key, Some(bytes));
        true
    }

    /// Resolves once the session's generation moves past `generation`.
    async fn superseded(rx: &mut watch::Receiver<u64>, generation: u64) {
        loop {
            if *rx.borrow_and_update() != generation {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    fn dedupe(descriptors: Vec<PhotoDescriptor>) -> Vec<PhotoDescriptor> {
        let mut seen = HashSet::new();
        let before = descriptors.len();
        let unique: Vec<PhotoDescriptor> = descriptors
            .into_iter()
            .filter(|p| seen.insert(p.id.clone()))
            .collect();
        if unique.len() != before {
            warn!(duplicates = before - unique.len(), "Photo list contained duplicate ids");
        }
        unique
    }

    fn report(generation: u64, page: u32, outcome: LoadOutcome) -> LoadReport {
        LoadReport {
            generation,
            page,
            outcome,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
