use serde::{Deserialize, Deserializer, Serialize};

/// One photo as listed by `flickr.photos.search`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoDescriptor {
    pub id: String,
    pub owner: String,
    pub secret: String,
    pub server: String,
    pub farm: i64,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "ispublic", deserialize_with = "bool_from_int", default)]
    pub is_public: bool,
    #[serde(rename = "isfriend", deserialize_with = "bool_from_int", default)]
    pub is_friend: bool,
    #[serde(rename = "isfamily", deserialize_with = "bool_from_int", default)]
    pub is_family: bool,
}

impl PhotoDescriptor {
    /// File name of the image, `{id}_{secret}.jpg`.
    pub fn image_file_name(&self) -> String {
        format!("{}_{}.jpg", self.id, self.secret)
    }
}

/// Top-level search response: `{ photos: {...}, stat }`.
///
/// On failure Flickr omits `photos` and sends `code`/`message` instead.
#[derive(Debug, Clone, Deserialize)]
pub struct PhotosResponse {
    pub photos: Option<PhotoPage>,
    pub stat: String,
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
}

impl PhotosResponse {
    pub fn is_ok(&self) -> bool {
        self.stat == "ok"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhotoPage {
    pub page: u32,
    pub pages: u32,
    pub perpage: u32,
    #[serde(deserialize_with = "u64_from_string_or_number")]
    pub total: u64,
    #[serde(default)]
    pub photo: Vec<PhotoDescriptor>,
}

fn bool_from_int<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Int(i64),
        Bool(bool),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Int(n) => n != 0,
        Flag::Bool(b) => b,
    })
}

// Flickr sends `total` as a string on some endpoints and a number on others
fn u64_from_string_or_number<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Total {
        Number(u64),
        Text(String),
    }

    match Total::deserialize(deserializer)? {
        Total::Number(n) => Ok(n),
        Total::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH_JSON: &str = r#"{"photos":{"page":1,"pages":12,"perpage":25,"total":"289","photo":[{"id":"50140235857","owner":"12345678@N02","secret":"a1b2c3d4e5","server":"65535","farm":66,"title":"Sunset over the bay","ispublic":1,"isfriend":0,"isfamily":0}]},"stat":"ok"}"#;

    #[test]
    fn test_parse_search_response() {
        let resp: PhotosResponse =
            serde_json::from_str(SEARCH_JSON).expect("Failed to parse search test JSON");
        assert!(resp.is_ok());

        let page = resp.photos.expect("photos present");
        assert_eq!(page.page, 1);
        assert_eq!(page.pages, 12);
        assert_eq!(page.total, 289);
        assert_eq!(page.photo.len(), 1);

        let p = &page.photo[0];
        assert_eq!(p.id, "50140235857");
        assert_eq!(p.farm, 66);
        assert!(p.is_public);
        assert!(!p.is_friend);
        assert!(!p.is_family);
        assert_eq!(p.image_file_name(), "50140235857_a1b2c3d4e5.jpg");
    }

    #[test]
    fn test_parse_numeric_total() {
        let json = r#"{"photos":{"page":3,"pages":3,"perpage":25,"total":51,"photo":[]},"stat":"ok"}"#;
        let resp: PhotosResponse = serde_json::from_str(json).expect("parse");
        assert_eq!(resp.photos.expect("photos").total, 51);
    }

    #[test]
    fn test_parse_failure_response() {
        let json = r#"{"stat":"fail","code":100,"message":"Invalid API Key (Key has invalid format)"}"#;
        let resp: PhotosResponse = serde_json::from_str(json).expect("parse");
        assert!(!resp.is_ok());
        assert!(resp.photos.is_none());
        assert_eq!(resp.code, Some(100));
    }
}
