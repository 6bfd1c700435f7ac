//! Republishing of legacy-hosted assets.
//!
//! For every `src='…'` reference under the legacy prefix the migrator makes
//! sure a copy exists in the asset store, then points the markup at it. A
//! reference that cannot be migrated keeps its original URL.

use std::collections::HashSet;
use std::io::Cursor;
use std::sync::{Arc, LazyLock};

use chrono::{Duration, Utc};
use image::{DynamicImage, ImageFormat};
use regex::Regex;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::ports::{AssetFetcher, AssetStore, AssetUpload, FetchError};

/// Lifetime of republished assets in caches.
pub const ASSET_CACHE_DAYS: i64 = 100;

/// Longest extension accepted as a format hint.
const MAX_EXTENSION_LEN: usize = 4;

static SRC_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"src\s*=\s*(?:'([^']*)'|"([^"]*)")"#).expect("valid regex")
});

/// Why a single asset stayed unmigrated.
#[derive(Debug, thiserror::Error)]
enum AssetFailure {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("not a decodable image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("upload failed: {0}")]
    Upload(#[from] crate::ports::AssetError),
}

pub struct AssetMigrator {
    store: Arc<dyn AssetStore>,
    fetcher: Arc<dyn AssetFetcher>,
    legacy_prefix: String,
}

impl AssetMigrator {
    pub fn new(
        store: Arc<dyn AssetStore>,
        fetcher: Arc<dyn AssetFetcher>,
        legacy_prefix: impl Into<String>,
    ) -> Self {
        Self {
            store,
            fetcher,
            legacy_prefix: legacy_prefix.into(),
        }
    }

    /// Rewrite every migratable asset reference in `markup`.
    #[instrument(skip_all, fields(job_id = %job_id, file = %file_name))]
    pub fn migrate(&self, job_id: &str, file_name: &str, markup: &str) -> String {
        let mut rewritten = markup.to_string();

        for url in asset_urls(markup) {
            if !url.starts_with(&self.legacy_prefix) {
                continue;
            }
            let Some(key) = destination_key(&url) else {
                warn!(asset = %url, "asset url has no file name; left in place");
                continue;
            };

            match self.publish(&url, key) {
                Ok(public_url) => {
                    rewritten = rewritten.replace(&url, &public_url);
                }
                Err(error) => {
                    warn!(asset = %url, %error, "asset not migrated; original reference kept");
                }
            }
        }

        rewritten
    }

    /// Make sure `key` exists in the store and return its public URL.
    fn publish(&self, url: &str, key: &str) -> Result<String, AssetFailure> {
        let public_url = self.store.public_url(key);

        match self.store.exists(key) {
            Ok(true) => {
                debug!(asset = %url, key, "asset already published");
                return Ok(public_url);
            }
            Ok(false) => {}
            Err(error) => warn!(asset = %url, %error, "existence probe failed; uploading anyway"),
        }

        let bytes = self.fetch(url)?;
        let format = output_format(key);
        let body = reencode(&bytes, format)?;

        self.store.put(
            key,
            AssetUpload {
                body,
                content_type: format.to_mime_type().to_string(),
                cache_control: format!("max-age={}", ASSET_CACHE_DAYS * 24 * 60 * 60),
                expires: Utc::now() + Duration::days(ASSET_CACHE_DAYS),
                public_read: true,
            },
        )?;

        info!(asset = %url, %public_url, "asset republished");
        Ok(public_url)
    }

    /// Fetch the percent-encoded form first; on an HTTP error retry once with
    /// the URL exactly as written in the markup.
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let encoded = percent_encoded(url).unwrap_or_else(|| url.to_string());
        match self.fetcher.fetch(&encoded) {
            Ok(bytes) => Ok(bytes),
            Err(error) if error.is_http() && encoded != url => {
                debug!(asset = %url, %error, "encoded fetch failed; retrying raw url");
                self.fetcher.fetch(url)
            }
            Err(error) => Err(error),
        }
    }
}

/// Distinct URLs referenced through `src` attributes, in document order.
pub fn asset_urls(markup: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    SRC_ATTRIBUTE
        .captures_iter(markup)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str().trim().to_string())
        .filter(|url| !url.is_empty() && seen.insert(url.clone()))
        .collect()
}

/// Final path segment of the URL, without query or fragment.
pub fn destination_key(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().filter(|key| !key.is_empty())
}

/// Encoding to re-encode into, chosen from the key's extension.
pub fn output_format(key: &str) -> ImageFormat {
    let ext = key
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    if ext.len() > MAX_EXTENSION_LEN {
        return ImageFormat::Png;
    }
    match ext.as_str() {
        "jpg" | "jpeg" => ImageFormat::Jpeg,
        "gif" => ImageFormat::Gif,
        _ => ImageFormat::Png,
    }
}

fn reencode(bytes: &[u8], format: ImageFormat) -> Result<Vec<u8>, image::ImageError> {
    let decoded = image::load_from_memory(bytes)?;
    // JPEG has no alpha channel.
    let decoded = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(decoded.to_rgb8()),
        _ => decoded,
    };
    let mut out = Cursor::new(Vec::new());
    decoded.write_to(&mut out, format)?;
    Ok(out.into_inner())
}

/// Percent-encode every path segment of `raw` (including literal `%`).
fn percent_encoded(raw: &str) -> Option<String> {
    let mut url = Url::parse(raw).ok()?;
    let after_scheme = raw.split_once("://")?.1;
    let path = after_scheme
        .find('/')
        .map(|idx| &after_scheme[idx + 1..])
        .unwrap_or_default();
    let path = path.split(['?', '#']).next().unwrap_or_default();

    url.path_segments_mut().ok()?.clear().extend(path.split('/'));
    Some(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::LEGACY_ASSET_PREFIX;
    use crate::ports::{InMemoryAssetStore, StaticAssetFetcher};

    const STORE_URL: &str = "https://s3.eu-central-1.amazonaws.com/stekpad";

    fn png_bytes() -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(image::RgbaImage::new(2, 2));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn legacy(name: &str) -> String {
        format!("{LEGACY_ASSET_PREFIX}{name}")
    }

    fn migrator(
        fetcher: StaticAssetFetcher,
    ) -> (AssetMigrator, Arc<InMemoryAssetStore>, Arc<StaticAssetFetcher>) {
        let store = Arc::new(InMemoryAssetStore::new(STORE_URL));
        let fetcher = Arc::new(fetcher);
        let migrator = AssetMigrator::new(store.clone(), fetcher.clone(), LEGACY_ASSET_PREFIX);
        (migrator, store, fetcher)
    }

    #[test]
    fn migrating_twice_uploads_once_and_rewrites_identically() {
        let url = legacy("hackpad.com_abc_p.1_cat.png");
        let (migrator, store, _) = migrator(StaticAssetFetcher::new().with(&url, png_bytes()));
        let markup = format!("<p><img src='{url}'/></p><p><img src='{url}'/></p>");

        let first = migrator.migrate("job", "a.html", &markup);
        let second = migrator.migrate("job", "a.html", &markup);

        assert_eq!(store.uploads(), vec!["hackpad.com_abc_p.1_cat.png"]);
        assert_eq!(first, second);
        assert_eq!(
            first,
            format!(
                "<p><img src='{STORE_URL}/hackpad.com_abc_p.1_cat.png'/></p><p><img src='{STORE_URL}/hackpad.com_abc_p.1_cat.png'/></p>"
            )
        );
    }

    #[test]
    fn foreign_urls_are_left_alone() {
        let (migrator, store, fetcher) = migrator(StaticAssetFetcher::new());
        let markup = "<img src='https://d3q75yzwz0mnvh.cloudfront.net/images/hero.jpg'/>";

        assert_eq!(migrator.migrate("job", "a.html", markup), markup);
        assert!(store.uploads().is_empty());
        assert!(fetcher.requests().is_empty());
    }

    #[test]
    fn raw_url_is_retried_after_encoded_404() {
        let url = legacy("my%20image.png");
        let (migrator, store, fetcher) = migrator(StaticAssetFetcher::new().with(&url, png_bytes()));

        let out = migrator.migrate("job", "a.html", &format!("<img src=\"{url}\">"));

        assert_eq!(
            fetcher.requests(),
            vec![legacy("my%2520image.png"), url.clone()]
        );
        assert_eq!(store.uploads(), vec!["my%20image.png"]);
        assert_eq!(out, format!("<img src=\"{STORE_URL}/my%20image.png\">"));
    }

    #[test]
    fn unreachable_asset_keeps_reference_and_others_still_migrate() {
        let good = legacy("good.png");
        let gone = legacy("gone.png");
        let (migrator, store, _) = migrator(StaticAssetFetcher::new().with(&good, png_bytes()));
        let markup = format!("<img src='{gone}'><img src='{good}'>");

        let out = migrator.migrate("job", "a.html", &markup);

        assert_eq!(out, format!("<img src='{gone}'><img src='{STORE_URL}/good.png'>"));
        assert_eq!(store.uploads(), vec!["good.png"]);
    }

    #[test]
    fn undecodable_asset_is_left_in_place() {
        let url = legacy("broken.png");
        let (migrator, store, _) =
            migrator(StaticAssetFetcher::new().with(&url, b"not an image".to_vec()));
        let markup = format!("<img src='{url}'>");

        assert_eq!(migrator.migrate("job", "a.html", &markup), markup);
        assert!(store.uploads().is_empty());
    }

    #[test]
    fn jpg_is_uploaded_as_jpeg_with_cache_headers() {
        let url = legacy("photo.jpg");
        let (migrator, store, _) = migrator(StaticAssetFetcher::new().with(&url, png_bytes()));

        migrator.migrate("job", "a.html", &format!("<img src='{url}'>"));

        let object = store.object("photo.jpg").unwrap();
        assert_eq!(object.content_type, "image/jpeg");
        assert_eq!(object.cache_control, "max-age=8640000");
        assert!(object.public_read);
        assert!(object.expires > Utc::now() + Duration::days(99));
        assert_eq!(image::guess_format(&object.body).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn long_or_missing_extension_falls_back_to_png() {
        assert_eq!(output_format("a.jpg"), ImageFormat::Jpeg);
        assert_eq!(output_format("a.JPEG"), ImageFormat::Jpeg);
        assert_eq!(output_format("a.gif"), ImageFormat::Gif);
        assert_eq!(output_format("a.png&amp;width=200"), ImageFormat::Png);
        assert_eq!(output_format("noextension"), ImageFormat::Png);
    }

    #[test]
    fn collects_distinct_urls_from_both_quote_styles() {
        let markup = r#"<img src='a.png'><img src="b.png"><img src='a.png'>"#;
        assert_eq!(asset_urls(markup), vec!["a.png", "b.png"]);
    }

    #[test]
    fn key_is_last_path_segment() {
        assert_eq!(destination_key("https://h/x/y/z.png?sig=1"), Some("z.png"));
        assert_eq!(destination_key("https://h/x/"), None);
    }
}
