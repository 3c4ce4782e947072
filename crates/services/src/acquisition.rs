//! Image acquisition: turn an image URL into base64 bytes.
//!
//! Two strategies, tried in order:
//! 1. direct fetch: plain GET with no cookies attached, raw bytes base64'd;
//! 2. render fallback: load the image through the hosting surface's native
//!    image primitive (cache-busted, anonymous cross-origin mode, one retry
//!    without cross-origin mode) and export the raster as JPEG.
//!
//! The second only runs when the first fails; if both fail the acquisition
//! reports `Unavailable`. Neither strategy enforces its own timeout beyond
//! the platform's; a stalled image load stalls the acquisition until the
//! hover is superseded or abandoned.

use std::io::Cursor;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::DynamicImage;
use shared::error::AcquisitionError;
use tracing::{debug, warn};

/// JPEG export quality for the render fallback, matching a canvas export at 0.8.
const JPEG_QUALITY: u8 = 80;

/// Something that can produce base64 image bytes for a URL.
#[async_trait]
pub trait ImageAcquirer: Send + Sync {
    async fn acquire(&self, url: &str) -> Result<String, AcquisitionError>;
}

/// Cross-origin mode for a surface load, mirroring an image element's
/// `crossorigin` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossOriginMode {
    /// CORS request without credentials. Fails when the server does not
    /// opt in, but the resulting surface is always readable.
    Anonymous,
    /// No CORS handshake. Always loads, but a cross-origin response leaves
    /// the surface tainted and unreadable.
    Unset,
}

/// A decoded raster held by the rendering surface.
pub struct Surface {
    pub image: DynamicImage,
    /// A tainted surface cannot be exported; trying is a `RenderFailed`.
    pub tainted: bool,
}

/// The hosting surface's native image-loading primitive.
#[async_trait]
pub trait SurfaceLoader: Send + Sync {
    async fn load(&self, url: &str, mode: CrossOriginMode) -> Result<Surface, AcquisitionError>;
}

/// Default loader: fetches and decodes the image itself, applying browser-like
/// CORS rules. Anonymous loads require the server's opt-in header; loads
/// without cross-origin mode succeed but come back tainted when that header
/// is missing.
pub struct NativeSurfaceLoader {
    http: reqwest::Client,
}

impl NativeSurfaceLoader {
    pub fn new() -> Self {
        Self { http: reqwest::Client::new() }
    }
}

impl Default for NativeSurfaceLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SurfaceLoader for NativeSurfaceLoader {
    async fn load(&self, url: &str, mode: CrossOriginMode) -> Result<Surface, AcquisitionError> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| AcquisitionError::RenderFailed(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(AcquisitionError::RenderFailed(format!(
                "image load returned status {}",
                resp.status()
            )));
        }

        let cors_readable = resp.headers().contains_key("access-control-allow-origin");
        if mode == CrossOriginMode::Anonymous && !cors_readable {
            return Err(AcquisitionError::RenderFailed(
                "anonymous cross-origin load refused by server".into(),
            ));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| AcquisitionError::RenderFailed(e.to_string()))?;
        let image = image::load_from_memory(&bytes)
            .map_err(|e| AcquisitionError::RenderFailed(format!("decode failed: {e}")))?;

        Ok(Surface {
            image,
            tainted: mode == CrossOriginMode::Unset && !cors_readable,
        })
    }
}

/// The two-strategy acquisition pipeline.
pub struct ImageAcquisition {
    http: reqwest::Client,
    loader: Arc<dyn SurfaceLoader>,
}

impl ImageAcquisition {
    pub fn new(loader: Arc<dyn SurfaceLoader>) -> Self {
        Self { http: reqwest::Client::new(), loader }
    }

    async fn direct_fetch(&self, url: &str) -> Result<String, AcquisitionError> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| AcquisitionError::NetworkFailed(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(AcquisitionError::NetworkFailed(format!(
                "status {}",
                resp.status()
            )));
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| AcquisitionError::NetworkFailed(e.to_string()))?;
        Ok(BASE64.encode(&bytes))
    }

    async fn render_fallback(&self, url: &str) -> Result<String, AcquisitionError> {
        let surface = match self.loader.load(&cache_busted(url), CrossOriginMode::Anonymous).await {
            Ok(surface) => surface,
            Err(e) => {
                // Last resort: load without cross-origin mode. The surface
                // may come back tainted, in which case the export fails.
                debug!("anonymous image load failed, retrying without cross-origin mode: {e}");
                self.loader.load(url, CrossOriginMode::Unset).await?
            }
        };
        export_jpeg(&surface)
    }
}

#[async_trait]
impl ImageAcquirer for ImageAcquisition {
    async fn acquire(&self, url: &str) -> Result<String, AcquisitionError> {
        match self.direct_fetch(url).await {
            Ok(data) => Ok(data),
            Err(fetch_err) => {
                debug!("direct fetch failed, trying render fallback: {fetch_err}");
                match self.render_fallback(url).await {
                    Ok(data) => Ok(data),
                    Err(render_err) => {
                        warn!("image acquisition failed for {url}: {render_err}");
                        Err(AcquisitionError::Unavailable)
                    }
                }
            }
        }
    }
}

/// Append a timestamp query parameter so the load bypasses any stale cache
/// entry that lacks CORS headers.
fn cache_busted(url: &str) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let sep = if url.contains('?') { '&' } else { '?' };
    format!("{url}{sep}_cb={millis}")
}

/// Export a surface as base64 JPEG. Tainted surfaces refuse export.
fn export_jpeg(surface: &Surface) -> Result<String, AcquisitionError> {
    if surface.tainted {
        return Err(AcquisitionError::RenderFailed(
            "surface is tainted and cannot be exported".into(),
        ));
    }
    let rgb = surface.image.to_rgb8();
    let mut buf = Cursor::new(Vec::new());
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY);
    encoder
        .encode_image(&rgb)
        .map_err(|e| AcquisitionError::RenderFailed(format!("JPEG export failed: {e}")))?;
    Ok(BASE64.encode(buf.into_inner()))
}
