//! API client for communicating with the Flickr REST API.
//!
//! This module provides the `FlickrClient` struct for searching photos
//! around a coordinate and fetching the image bytes of each result.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::{debug, warn};

use crate::config::Config;
use crate::models::{Coordinate, PhotoDescriptor, PhotosResponse};

use super::{ApiError, ImageFetcher, IndexFetcher};

// ============================================================================
// Constants
// ============================================================================

/// Search method name passed in the `method` query parameter
const SEARCH_METHOD: &str = "flickr.photos.search";

/// Default image host; `{farm}` is replaced with the photo's farm number.
const IMAGE_HOST_TEMPLATE: &str = "https://farm{farm}.staticflickr.com";

/// One page of search results with the paging metadata Flickr reported.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub page: u32,
    pub pages: u32,
    pub total: u64,
    pub photos: Vec<PhotoDescriptor>,
}

/// API client for Flickr.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct FlickrClient {
    client: Client,
    api_key: Arc<str>,
    api_base_url: Url,
    image_base_url: Option<Arc<str>>,
    per_page: u32,
}

impl FlickrClient {
    /// Create a new API client from the application config.
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let api_key = config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ApiError::InvalidRequest("no Flickr API key configured".to_string()))?;

        if config.per_page == 0 {
            return Err(ApiError::InvalidRequest("per_page must be at least 1".to_string()));
        }
        if config.request_timeout_secs == 0 {
            return Err(ApiError::InvalidRequest(
                "request_timeout_secs must be at least 1".to_string(),
            ));
        }

        let api_base_url = Url::parse(&config.api_base_url).map_err(|e| {
            ApiError::InvalidRequest(format!("bad API base URL {}: {}", config.api_base_url, e))
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key: Arc::from(api_key),
            api_base_url,
            image_base_url: config
                .image_base_url
                .as_deref()
                .map(|u| Arc::from(u.trim_end_matches('/'))),
            per_page: config.per_page,
        })
    }

    /// Build the search URL for a coordinate and page, validating both first.
    pub fn search_url(&self, coordinate: Coordinate, page: u32) -> Result<Url, ApiError> {
        coordinate.validate().map_err(ApiError::InvalidRequest)?;
        if page == 0 {
            return Err(ApiError::InvalidRequest("page numbers start at 1".to_string()));
        }

        let mut url = self.api_base_url.clone();
        url.query_pairs_mut()
            .append_pair("method", SEARCH_METHOD)
            .append_pair("api_key", &self.api_key)
            .append_pair("lat", &coordinate.latitude.to_string())
            .append_pair("lon", &coordinate.longitude.to_string())
            .append_pair("per_page", &self.per_page.to_string())
            .append_pair("page", &page.to_string())
            .append_pair("format", "json")
            .append_pair("nojsoncallback", "1");
        Ok(url)
    }

    /// Image URL: `https://farm{farm}.staticflickr.com/{server}/{id}_{secret}.jpg`
    pub fn image_url(&self, photo: &PhotoDescriptor) -> String {
        let host = match &self.image_base_url {
            Some(base) => base.to_string(),
            None => IMAGE_HOST_TEMPLATE.replace("{farm}", &photo.farm.to_string()),
        };
        format!("{}/{}/{}", host, photo.server, photo.image_file_name())
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Search for photos near `coordinate`.
    ///
    /// A page past the last advertised page yields an empty result rather
    /// than an error, and results are capped at the configured page size.
    pub async fn search_photos(
        &self,
        coordinate: Coordinate,
        page: u32,
    ) -> Result<SearchResult, ApiError> {
        let url = self.search_url(coordinate, page)?;
        debug!(%coordinate, page, "Searching photos");

        let response = self.client.get(url).send().await?;
        let response = Self::check_response(response).await?;
        let text = response.text().await?;

        let parsed: PhotosResponse = serde_json::from_str(&text)?;
        if !parsed.is_ok() {
            return Err(ApiError::RemoteFailure {
                code: parsed.code.unwrap_or(-1),
                message: parsed
                    .message
                    .unwrap_or_else(|| format!("stat={}", parsed.stat)),
            });
        }

        let listing = parsed
            .photos
            .ok_or_else(|| ApiError::Decode("response has no `photos` object".to_string()))?;

        if listing.pages > 0 && page > listing.pages {
            debug!(page, pages = listing.pages, "Requested page past the last page");
            return Ok(SearchResult {
                page,
                pages: listing.pages,
                total: listing.total,
                photos: Vec::new(),
            });
        }

        let mut photos = listing.photo;
        let limit = self.per_page as usize;
        if photos.len() > limit {
            warn!(returned = photos.len(), per_page = limit, "More photos than requested, truncating");
            photos.truncate(limit);
        }

        debug!(page = listing.page, pages = listing.pages, count = photos.len(), "Search results received");

        Ok(SearchResult {
            page: listing.page,
            pages: listing.pages,
            total: listing.total,
            photos,
        })
    }

    /// Download the image bytes for one photo.
    pub async fn download_image(&self, photo: &PhotoDescriptor) -> Result<Vec<u8>, ApiError> {
        let url = self.image_url(photo);
        let response = self.client.get(&url).send().await?;
        let response = Self::check_response(response).await?;
        let bytes = response.bytes().await?;
        debug!(photo_id = %photo.id, size = bytes.len(), "Image downloaded");
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl IndexFetcher for FlickrClient {
    async fn fetch_index(
        &self,
        coordinate: Coordinate,
        page: u32,
    ) -> Result<Vec<PhotoDescriptor>, ApiError> {
        Ok(self.search_photos(coordinate, page).await?.photos)
    }
}

#[async_trait]
impl ImageFetcher for FlickrClient {
    async fn fetch_image(&self, photo: &PhotoDescriptor) -> Result<Vec<u8>, ApiError> {
        self.download_image(photo).await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ErrorKind;

    fn test_client() -> FlickrClient {
        let config = Config {
            api_key: Some("test-key".to_string()),
            ..Config::default()
        };
        FlickrClient::new(&config).expect("failed to create client")
    }

    fn photo() -> PhotoDescriptor {
        PhotoDescriptor {
            id: "50140235857".to_string(),
            owner: "12345678@N02".to_string(),
            secret: "a1b2c3d4e5".to_string(),
            server: "65535".to_string(),
            farm: 66,
            title: "Bay".to_string(),
            is_public: true,
            is_friend: false,
            is_family: false,
        }
    }

    #[test]
    fn test_image_url() {
        assert_eq!(
            test_client().image_url(&photo()),
            "https://farm66.staticflickr.com/65535/50140235857_a1b2c3d4e5.jpg"
        );
    }

    #[test]
    fn test_search_url_params() {
        let url = test_client()
            .search_url(Coordinate::new(-2.5, -74.25), 3)
            .expect("valid url");
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        let get = |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(url.host_str(), Some("www.flickr.com"));
        assert_eq!(get("method"), Some("flickr.photos.search"));
        assert_eq!(get("api_key"), Some("test-key"));
        assert_eq!(get("lat"), Some("-2.5"));
        assert_eq!(get("lon"), Some("-74.25"));
        assert_eq!(get("per_page"), Some("25"));
        assert_eq!(get("page"), Some("3"));
        assert_eq!(get("format"), Some("json"));
        assert_eq!(get("nojsoncallback"), Some("1"));
    }

    #[test]
    fn test_search_url_rejects_bad_input() {
        let client = test_client();
        let err = client.search_url(Coordinate::new(0.0, 0.0), 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);

        let err = client.search_url(Coordinate::new(f64::NAN, 0.0), 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);

        let err = client.search_url(Coordinate::new(0.0, 200.0), 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[test]
    fn test_new_requires_api_key() {
        assert!(matches!(
            FlickrClient::new(&Config::default()),
            Err(ApiError::InvalidRequest(_))
        ));
        let blank = Config {
            api_key: Some("  ".to_string()),
            ..Config::default()
        };
        assert!(FlickrClient::new(&blank).is_err());
    }

    #[test]
    fn test_new_rejects_zero_limits() {
        let no_timeout = Config {
            api_key: Some("test-key".to_string()),
            request_timeout_secs: 0,
            ..Config::default()
        };
        assert!(matches!(
            FlickrClient::new(&no_timeout),
            Err(ApiError::InvalidRequest(_))
        ));

        let no_page = Config {
            api_key: Some("test-key".to_string()),
            per_page: 0,
            ..Config::default()
        };
        assert!(FlickrClient::new(&no_page).is_err());
    }
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use crate::api::ErrorKind;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_client(mock_server: &MockServer, per_page: u32) -> FlickrClient {
        let config = Config {
            api_key: Some("test-key".to_string()),
            per_page,
            request_timeout_secs: 1,
            api_base_url: format!("{}/services/rest/", mock_server.uri()),
            image_base_url: Some(mock_server.uri()),
            ..Config::default()
        };
        FlickrClient::new(&config).expect("failed to create client")
    }

    fn photo_json(id: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id, "owner": "owner@N01", "secret": "s3cr3t", "server": "7",
            "farm": 8, "title": format!("Photo {}", id),
            "ispublic": 1, "isfriend": 0, "isfamily": 0
        })
    }

    fn search_body(page: u32, pages: u32, ids: &[&str]) -> serde_json::Value {
        serde_json::json!({
            "photos": {
                "page": page, "pages": pages, "perpage": 25,
                "total": (pages * 25).to_string(),
                "photo": ids.iter().map(|id| photo_json(id)).collect::<Vec<_>>()
            },
            "stat": "ok"
        })
    }

    #[tokio::test]
    async fn test_search_photos_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/services/rest/"))
            .and(query_param("method", "flickr.photos.search"))
            .and(query_param("api_key", "test-key"))
            .and(query_param("lat", "40.7"))
            .and(query_param("lon", "-74"))
            .and(query_param("page", "2"))
            .and(query_param("per_page", "25"))
            .and(query_param("format", "json"))
            .and(query_param("nojsoncallback", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(search_body(2, 4, &["a", "b", "c"])))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server, 25);
        let result = client
            .search_photos(Coordinate::new(40.7, -74.0), 2)
            .await
            .expect("search failed");

        assert_eq!(result.page, 2);
        assert_eq!(result.pages, 4);
        assert_eq!(result.total, 100);
        let ids: Vec<_> = result.photos.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_page_past_end_is_empty() {
        let mock_server = MockServer::start().await;

        // Flickr repeats the last page's content for out-of-range pages
        Mock::given(method("GET"))
            .and(path("/services/rest/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(search_body(3, 3, &["x", "y"])))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server, 25);
        let photos = client
            .fetch_index(Coordinate::new(1.0, 1.0), 9)
            .await
            .expect("should not error");
        assert!(photos.is_empty());
    }

    #[tokio::test]
    async fn test_results_capped_at_page_size() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/services/rest/"))
            .and(query_param("per_page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(search_body(1, 1, &["a", "b", "c"])))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server, 2);
        let photos = client
            .fetch_index(Coordinate::new(1.0, 1.0), 1)
            .await
            .expect("search failed");
        assert_eq!(photos.len(), 2);
        assert_eq!(photos[1].id, "b");
    }

    #[tokio::test]
    async fn test_stat_fail_is_decode_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/services/rest/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "stat": "fail", "code": 100, "message": "Invalid API Key (Key has invalid format)"
            })))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server, 25);
        let err = client
            .fetch_index(Coordinate::new(1.0, 1.0), 1)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
        assert!(matches!(err, ApiError::RemoteFailure { code: 100, .. }));
    }

    #[tokio::test]
    async fn test_malformed_body_is_decode_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/services/rest/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("jsonFlickrApi({\"stat\":\"ok\"})"))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server, 25);
        let err = client
            .fetch_index(Coordinate::new(1.0, 1.0), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[tokio::test]
    async fn test_server_error_is_network_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/services/rest/"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server, 25);
        let err = client
            .fetch_index(Coordinate::new(1.0, 1.0), 1)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
        assert!(matches!(err, ApiError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_invalid_input_sends_nothing() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server, 25);
        let err = client
            .fetch_index(Coordinate::new(95.0, 0.0), 1)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/services/rest/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(search_body(1, 1, &["a"]))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server, 25);
        let err = client
            .fetch_index(Coordinate::new(1.0, 1.0), 1)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
    }

    #[tokio::test]
    async fn test_download_image() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/7/p1_s3cr3t.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xFF, 0xD8, 0xFF, 0xE0]))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server, 25);
        let descriptor: PhotoDescriptor =
            serde_json::from_value(photo_json("p1")).expect("descriptor");
        let bytes = client.fetch_image(&descriptor).await.expect("download failed");
        assert_eq!(bytes, vec![0xFF, 0xD8, 0xFF, 0xE0]);
    }

    #[tokio::test]
    async fn test_download_image_not_found() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server, 25);
        let descriptor: PhotoDescriptor =
            serde_json::from_value(photo_json("gone")).expect("descriptor");
        let err = client.fetch_image(&descriptor).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
    }
}
