//! Random image acquisition from a paged, tag-filtered post collection.
//!
//! A tick picks a random page, then a random post on that page, so the
//! sample is spread over the whole collection without knowing its size.
//! Every failure is logged and reported as `None`.

mod error;
mod transport;

pub use error::AcquireError;
pub use transport::{HttpTransport, Transport};

use bytes::Bytes;
use rand::Rng;
use reqwest::Url;
use serde_json::Value;
use tracing::{debug, warn};

use crate::composite::RawImage;
use crate::settings::SourceSettings;

/// Upper bound the remote API accepts for `limit`
pub const MAX_PAGE_SIZE: u32 = 100;

pub struct AcquisitionClient<T> {
    transport: T,
    source: SourceSettings,
}

impl<T: Transport> AcquisitionClient<T> {
    pub fn new(transport: T, source: SourceSettings) -> Self {
        Self { transport, source }
    }

    pub fn source(&self) -> &SourceSettings {
        &self.source
    }

    /// Query URL for one page of the tag listing, with the tag form-encoded
    pub fn page_url(&self, page: u32) -> Result<Url, AcquireError> {
        let endpoint = format!("{}/post.json", self.source.base_url.trim_end_matches('/'));
        let limit = self.source.page_size.clamp(1, MAX_PAGE_SIZE).to_string();
        let page = page.to_string();

        Url::parse_with_params(
            &endpoint,
            &[
                ("tags", self.source.tag.as_str()),
                ("limit", limit.as_str()),
                ("page", page.as_str()),
            ],
        )
        .map_err(|e| AcquireError::InvalidUrl {
            url: endpoint,
            reason: e.to_string(),
        })
    }

    /// Pick a random post and return its full-resolution image URL
    pub async fn fetch_random_image_url<R>(&self, rng: &mut R) -> Option<String>
    where
        R: Rng + Send + ?Sized,
    {
        match self.random_image_url(rng).await {
            Ok(url) => {
                debug!(%url, "picked image");
                Some(url)
            }
            Err(e @ AcquireError::EmptyPage { .. }) => {
                debug!(error = %e, "no image this tick");
                None
            }
            Err(e) => {
                warn!(error = %e, "no image this tick");
                None
            }
        }
    }

    /// Download the encoded bytes behind an image URL
    pub async fn fetch_image_bytes(&self, url: &str) -> Option<Bytes> {
        match self.transport.get(url).await {
            Ok(bytes) => {
                debug!(%url, len = bytes.len(), "downloaded image");
                Some(bytes)
            }
            Err(e) => {
                warn!(%url, error = %e, "image download failed");
                None
            }
        }
    }

    async fn random_image_url<R>(&self, rng: &mut R) -> Result<String, AcquireError>
    where
        R: Rng + Send + ?Sized,
    {
        let page = rng.gen_range(0..self.source.max_page.max(1));
        let url = self.page_url(page)?;
        let body = self.transport.get(url.as_str()).await?;
        let posts = parse_page(&body, page)?;

        let index = rng.gen_range(0..posts.len());
        posts[index]
            .get("file_url")
            .and_then(Value::as_str)
            .filter(|url| !url.is_empty())
            .map(normalize_url)
            .ok_or(AcquireError::MissingFileUrl { page, index })
    }
}

/// Parse a page body into its posts; an empty page is an error
fn parse_page(body: &[u8], page: u32) -> Result<Vec<Value>, AcquireError> {
    if body.trim_ascii_start().first() != Some(&b'[') {
        return Err(AcquireError::NotAnArray { page });
    }

    let posts: Vec<Value> =
        serde_json::from_slice(body).map_err(|source| AcquireError::Json { page, source })?;
    if posts.is_empty() {
        return Err(AcquireError::EmptyPage { page });
    }
    Ok(posts)
}

/// Resolve schema-relative URLs (`//host/path`) to https
pub fn normalize_url(url: &str) -> String {
    if url.starts_with("//") {
        format!("https:{url}")
    } else {
        url.to_string()
    }
}

/// Decode downloaded bytes into an RGBA bitmap
pub fn decode_image(bytes: &[u8]) -> Result<RawImage, AcquireError> {
    let image = image::load_from_memory(bytes)?.to_rgba8();
    if image.width() == 0 || image.height() == 0 {
        return Err(AcquireError::EmptyImage);
    }
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::io::Cursor;
    use std::sync::Mutex;

    /// Serves one canned reply for every URL and records what was asked for
    struct StubTransport {
        reply: Result<&'static str, u16>,
        requests: Mutex<Vec<String>>,
    }

    impl StubTransport {
        fn body(body: &'static str) -> Self {
            Self {
                reply: Ok(body),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn status(status: u16) -> Self {
            Self {
                reply: Err(status),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    impl Transport for StubTransport {
        async fn get(&self, url: &str) -> Result<Bytes, AcquireError> {
            self.requests.lock().unwrap().push(url.to_string());
            match self.reply {
                Ok(body) => Ok(Bytes::from_static(body.as_bytes())),
                Err(status) => Err(AcquireError::Status {
                    url: url.to_string(),
                    status,
                }),
            }
        }
    }

    fn client(transport: StubTransport) -> AcquisitionClient<StubTransport> {
        AcquisitionClient::new(transport, SourceSettings::default())
    }

    async fn pick(body: &'static str) -> Option<String> {
        let mut rng = StdRng::seed_from_u64(7);
        client(StubTransport::body(body))
            .fetch_random_image_url(&mut rng)
            .await
    }

    #[tokio::test]
    async fn test_empty_page_yields_nothing() {
        assert_eq!(pick("[]").await, None);
    }

    #[tokio::test]
    async fn test_schema_relative_url_gets_https() {
        assert_eq!(
            pick(r#"[{"file_url": "//example.com/a.jpg"}]"#).await,
            Some("https://example.com/a.jpg".to_string())
        );
    }

    #[tokio::test]
    async fn test_absolute_url_is_kept() {
        assert_eq!(
            pick(r#"[{"id": 1, "file_url": "http://files.example.com/b.png"}]"#).await,
            Some("http://files.example.com/b.png".to_string())
        );
    }

    #[tokio::test]
    async fn test_malformed_replies_yield_nothing() {
        assert_eq!(pick("<html>rate limited</html>").await, None);
        assert_eq!(pick("[{\"file_url\": ").await, None);
        assert_eq!(pick(r#"{"file_url": "//example.com/a.jpg"}"#).await, None);
        assert_eq!(pick(r#"[{"id": 3}]"#).await, None);
        assert_eq!(pick(r#"[{"file_url": 42}]"#).await, None);
        assert_eq!(pick(r#"[{"file_url": ""}]"#).await, None);
    }

    #[tokio::test]
    async fn test_http_error_yields_nothing() {
        let client = client(StubTransport::status(503));
        let mut rng = StdRng::seed_from_u64(1);

        assert_eq!(client.fetch_random_image_url(&mut rng).await, None);
        assert_eq!(client.fetch_image_bytes("https://example.com/x.jpg").await, None);
    }

    #[tokio::test]
    async fn test_requested_page_is_in_range() {
        let client = client(StubTransport::body("[]"));
        let mut rng = StdRng::seed_from_u64(99);

        for _ in 0..50 {
            client.fetch_random_image_url(&mut rng).await;
        }

        let requests = client.transport.requests.lock().unwrap();
        assert_eq!(requests.len(), 50);
        for url in requests.iter() {
            let page: u32 = url.rsplit("page=").next().unwrap().parse().unwrap();
            assert!(page < client.source().max_page);
            assert!(url.starts_with("https://yande.re/post.json?tags=feet&limit=100&page="));
        }
    }

    #[tokio::test]
    async fn test_same_seed_picks_same_post() {
        let body = r#"[{"file_url": "//a/1.jpg"}, {"file_url": "//a/2.jpg"}, {"file_url": "//a/3.jpg"},
                       {"file_url": "//a/4.jpg"}, {"file_url": "//a/5.jpg"}, {"file_url": "//a/6.jpg"}]"#;

        let mut first = Vec::new();
        let mut second = Vec::new();
        for (out, seed) in [(&mut first, 42), (&mut second, 42)] {
            let client = client(StubTransport::body(body));
            let mut rng = StdRng::seed_from_u64(seed);
            for _ in 0..8 {
                out.push(client.fetch_random_image_url(&mut rng).await);
            }
        }

        assert_eq!(first, second);
        assert!(first.iter().all(Option::is_some));
    }

    #[test]
    fn test_page_url_clamps_page_size() {
        let source = SourceSettings {
            base_url: "https://booru.example/".to_string(),
            tag: "landscape".to_string(),
            page_size: 500,
            ..SourceSettings::default()
        };
        let client = AcquisitionClient::new(StubTransport::body("[]"), source);

        assert_eq!(
            client.page_url(12).unwrap().as_str(),
            "https://booru.example/post.json?tags=landscape&limit=100&page=12"
        );
    }

    #[test]
    fn test_page_url_encodes_tag() {
        let source = SourceSettings {
            tag: "blue sky&rating:safe+x".to_string(),
            ..SourceSettings::default()
        };
        let client = AcquisitionClient::new(StubTransport::body("[]"), source);

        let url = client.page_url(3).unwrap();

        assert_eq!(
            url.as_str(),
            "https://yande.re/post.json?tags=blue+sky%26rating%3Asafe%2Bx&limit=100&page=3"
        );
        let tags = url.query_pairs().find(|(k, _)| k == "tags").map(|(_, v)| v.into_owned());
        assert_eq!(tags.as_deref(), Some("blue sky&rating:safe+x"));
    }

    #[tokio::test]
    async fn test_invalid_base_url_yields_nothing() {
        let source = SourceSettings {
            base_url: "not a url".to_string(),
            ..SourceSettings::default()
        };
        let client = AcquisitionClient::new(StubTransport::body("[]"), source);
        let mut rng = StdRng::seed_from_u64(5);

        assert_eq!(client.fetch_random_image_url(&mut rng).await, None);
        assert!(client.transport.requests.lock().unwrap().is_empty());
    }

    #[test]
    fn test_parse_page_accepts_leading_whitespace() {
        let posts = parse_page(b"\n  [{\"file_url\": \"x\"}]", 0).unwrap();
        assert_eq!(posts.len(), 1);
    }

    #[test]
    fn test_decode_image_reads_png() {
        let source = RawImage::from_pixel(3, 2, image::Rgba([10, 20, 30, 255]));
        let mut encoded = Cursor::new(Vec::new());
        source
            .write_to(&mut encoded, image::ImageFormat::Png)
            .unwrap();

        let decoded = decode_image(encoded.get_ref()).unwrap();

        assert_eq!(decoded, source);
    }

    #[test]
    fn test_decode_image_rejects_garbage() {
        assert!(matches!(
            decode_image(b"definitely not an image"),
            Err(AcquireError::Decode(_))
        ));
    }
}
