use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use lru::LruCache;
use std::io::Cursor;
use std::num::NonZeroUsize;
use tokio::sync::Mutex;

use crate::config::CoverConfig;
use crate::error::{Error, Result};

/// An inlined cover and the color the card's bars take from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cover {
    pub data_url: String,
    /// Average color as `#RRGGBB`; `None` when the image did not decode.
    pub accent: Option<String>,
}

/// Downloads cover art and inlines it as `data:` URLs.
///
/// Thumbnail URLs carry the server credential, so the card embeds the image
/// bytes instead of linking to it.
pub struct CoverArtCache {
    http: reqwest::Client,
    max_dimension: u32,
    /// Inlined covers keyed by source URL (bounded to prevent memory exhaustion)
    covers: Mutex<LruCache<String, Cover>>,
}

impl CoverArtCache {
    pub fn new(http: reqwest::Client, config: &CoverConfig) -> Self {
        let cap = NonZeroUsize::new(config.cache_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            http,
            max_dimension: config.max_dimension.max(1),
            covers: Mutex::new(LruCache::new(cap)),
        }
    }

    /// Inlined cover for `url`, or `None` when it cannot be downloaded.
    pub async fn cover(&self, url: &str) -> Option<Cover> {
        if let Some(cached) = self.covers.lock().await.get(url) {
            return Some(cached.clone());
        }

        let bytes = match self.download(url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                // The URL carries the credential; log the failure only.
                tracing::warn!("Failed to download cover art: {}", e);
                return None;
            }
        };

        let cover = inline(&bytes, self.max_dimension);
        self.covers.lock().await.put(url.to_string(), cover.clone());
        Some(cover)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::fetch("cover", e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::fetch("cover", format!("HTTP {status}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::fetch("cover", e.without_url()))?;
        if bytes.is_empty() {
            return Err(Error::fetch("cover", "empty body"));
        }
        Ok(bytes.to_vec())
    }
}

/// Downscale to fit `max_dimension` and re-encode as JPEG. Bytes that do not
/// decode are inlined as they are, without an accent.
pub fn inline(bytes: &[u8], max_dimension: u32) -> Cover {
    match downscale(bytes, max_dimension) {
        Ok((jpeg, accent)) => Cover {
            data_url: format!("data:image/jpeg;base64,{}", STANDARD.encode(jpeg)),
            accent: Some(accent),
        },
        Err(e) => {
            tracing::debug!("Cover art not decodable, inlining raw bytes: {}", e);
            let mime = image::guess_format(bytes)
                .map(|f| f.to_mime_type())
                .unwrap_or("image/jpeg");
            Cover {
                data_url: format!("data:{};base64,{}", mime, STANDARD.encode(bytes)),
                accent: None,
            }
        }
    }
}

fn downscale(bytes: &[u8], max_dimension: u32) -> image::ImageResult<(Vec<u8>, String)> {
    let mut img = image::load_from_memory(bytes)?;
    if img.width() > max_dimension || img.height() > max_dimension {
        img = img.thumbnail(max_dimension, max_dimension);
    }

    // JPEG has no alpha channel
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let accent = average_color(&rgb);
    let mut out = Cursor::new(Vec::new());
    rgb.write_to(&mut out, ImageFormat::Jpeg)?;
    Ok((out.into_inner(), accent))
}

/// Average color of `img` as `#RRGGBB`.
pub fn average_color(img: &DynamicImage) -> String {
    let pixel = img.resize_exact(1, 1, FilterType::Triangle).to_rgb8();
    let [r, g, b] = pixel.get_pixel(0, 0).0;
    format!("#{r:02X}{g:02X}{b:02X}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba([200, 40, 160, 255]));
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    fn decode(cover: &Cover) -> Vec<u8> {
        let data_url = &cover.data_url;
        let b64 = data_url.split_once(";base64,").unwrap().1;
        STANDARD.decode(b64).unwrap()
    }

    #[test]
    fn test_large_cover_is_downscaled_to_jpeg() {
        let cover = inline(&png(400, 200), 160);
        assert!(cover.data_url.starts_with("data:image/jpeg;base64,"));

        let img = image::load_from_memory(&decode(&cover)).unwrap();
        assert_eq!((img.width(), img.height()), (160, 80));
    }

    #[test]
    fn test_small_cover_keeps_its_size() {
        let cover = inline(&png(64, 64), 160);
        let img = image::load_from_memory(&decode(&cover)).unwrap();
        assert_eq!((img.width(), img.height()), (64, 64));
    }

    #[test]
    fn test_undecodable_bytes_are_inlined_raw() {
        let cover = inline(b"definitely not an image", 160);
        assert!(cover.data_url.starts_with("data:image/jpeg;base64,"));
        assert_eq!(decode(&cover), b"definitely not an image");
        assert_eq!(cover.accent, None);
    }

    #[test]
    fn test_solid_cover_accent_is_its_color() {
        let cover = inline(&png(300, 300), 160);
        assert_eq!(cover.accent.as_deref(), Some("#C828A0"));
    }

    #[test]
    fn test_average_color_of_two_halves() {
        let img = image::RgbImage::from_fn(2, 1, |x, _| {
            if x == 0 {
                image::Rgb([0, 0, 0])
            } else {
                image::Rgb([200, 100, 50])
            }
        });
        assert_eq!(average_color(&DynamicImage::ImageRgb8(img)), "#643219");
    }

    #[tokio::test]
    async fn test_covers_are_cached_by_url() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/library/metadata/1/thumb")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "image/png")
            .with_body(png(32, 32))
            .expect(1)
            .create_async()
            .await;

        let covers = CoverArtCache::new(reqwest::Client::new(), &CoverConfig::default());
        let url = format!("{}/library/metadata/1/thumb?X-Plex-Token=abc", server.url());

        let first = covers.cover(&url).await.unwrap();
        let second = covers.cover(&url).await.unwrap();
        assert_eq!(first, second);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_cover_yields_none() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/thumb")
            .with_status(404)
            .create_async()
            .await;

        let covers = CoverArtCache::new(reqwest::Client::new(), &CoverConfig::default());
        assert!(covers.cover(&format!("{}/thumb", server.url())).await.is_none());
    }
}
