//! Circular photo icons for points of interest.
//!
//! Fetching, decoding and compositing run on the tokio runtime; results come
//! back over a channel that the render thread drains before touching any
//! marker.

use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use image::imageops::FilterType;
use image::{DynamicImage, RgbaImage};
use tiny_skia::{ColorU8, FillRule, Mask, Path, Pixmap, PixmapPaint, Transform};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

use super::{IconFactory, MarkerIcon};
use crate::error::ImageError;
use crate::surface::ThumbnailSource;

/// Photo diameter inside the white ring (px)
pub const THUMBNAIL_DIAMETER: u32 = 24;
/// White ring width (px)
pub const THUMBNAIL_BORDER: u32 = 2;
/// Finished icons (and broken URLs) remembered before the oldest is dropped
pub const THUMBNAIL_CACHE_LIMIT: usize = 512;

type FetchFuture = Pin<Box<dyn Future<Output = Result<Vec<u8>, ImageError>> + Send>>;
type FetchFn = Arc<dyn Fn(String) -> FetchFuture + Send + Sync>;

/// Crop to the centered square and scale it to `diameter`
pub fn crop_square(img: &DynamicImage, diameter: u32) -> Result<RgbaImage, ImageError> {
    let (w, h) = (img.width(), img.height());
    let side = w.min(h);
    if side == 0 || diameter == 0 {
        return Err(ImageError::Empty);
    }
    let square = img.crop_imm((w - side) / 2, (h - side) / 2, side, side).to_rgba8();
    Ok(image::imageops::resize(&square, diameter, diameter, FilterType::Triangle))
}

/// Straight-alpha RGBA into a premultiplied pixmap
pub fn rgba_to_pixmap(img: &RgbaImage) -> Result<Pixmap, ImageError> {
    let mut pixmap = Pixmap::new(img.width(), img.height()).ok_or(ImageError::Empty)?;
    for (dst, px) in pixmap.pixels_mut().iter_mut().zip(img.pixels()) {
        let [r, g, b, a] = px.0;
        *dst = ColorU8::from_rgba(r, g, b, a).premultiply();
    }
    Ok(pixmap)
}

/// Mask the square photo to a circle and composite it on a white ring.
/// `backing` and `clip` are origin-centered circles of radius
/// `diameter / 2 + border` and `diameter / 2`.
pub fn compose_thumbnail(square: &RgbaImage, border: u32, backing: &Path, clip: &Path) -> Result<MarkerIcon, ImageError> {
    let photo = rgba_to_pixmap(square)?;
    let side = square.width() + 2 * border;
    let center = side as f32 / 2.0;
    let to_center = Transform::from_translate(center, center);

    let mut canvas = Pixmap::new(side, side).ok_or(ImageError::Empty)?;
    canvas.fill_path(backing, &super::solid([255, 255, 255], 255), FillRule::Winding, to_center, None);

    let mut mask = Mask::new(side, side).ok_or(ImageError::Empty)?;
    mask.fill_path(clip, FillRule::Winding, true, to_center);
    canvas.draw_pixmap(
        border as i32,
        border as i32,
        photo.as_ref(),
        &PixmapPaint::default(),
        Transform::identity(),
        Some(&mask),
    );

    Ok(MarkerIcon {
        pixmap: canvas,
        label: None,
        tint: average_color(square),
    })
}

/// Decode raw bytes and build the finished icon
pub fn render_thumbnail(bytes: &[u8], backing: &Path, clip: &Path) -> Result<MarkerIcon, ImageError> {
    let img = image::load_from_memory(bytes)?;
    let square = crop_square(&img, THUMBNAIL_DIAMETER)?;
    compose_thumbnail(&square, THUMBNAIL_BORDER, backing, clip)
}

fn average_color(img: &RgbaImage) -> [u8; 3] {
    let mut sum = [0u64; 3];
    let mut n = 0u64;
    for px in img.pixels() {
        sum[0] += px.0[0] as u64;
        sum[1] += px.0[1] as u64;
        sum[2] += px.0[2] as u64;
        n += 1;
    }
    if n == 0 {
        return [255, 255, 255];
    }
    [(sum[0] / n) as u8, (sum[1] / n) as u8, (sum[2] / n) as u8]
}

/// A finished thumbnail job
#[derive(Debug)]
pub struct ThumbnailResult {
    pub url: String,
    pub outcome: Result<Arc<MarkerIcon>, ImageError>,
}

/// Where a thumbnail currently stands
#[derive(Clone, Debug)]
pub enum ThumbnailState {
    Ready(Arc<MarkerIcon>),
    Pending,
    Failed,
}

/// Fetches thumbnails off-thread and caches finished icons by URL
pub struct ThumbnailLoader {
    fetch: FetchFn,
    runtime: Handle,
    tx: UnboundedSender<ThumbnailResult>,
    rx: UnboundedReceiver<ThumbnailResult>,
    ready: HashMap<String, Arc<MarkerIcon>>,
    /// `ready` keys, oldest first
    ready_order: VecDeque<String>,
    pending: HashSet<String>,
    /// Broken URLs are not retried while remembered
    failed: HashSet<String>,
    failed_order: VecDeque<String>,
    limit: usize,
    backing: Path,
    clip: Path,
}

impl ThumbnailLoader {
    /// `None` if the factory cannot produce the ring geometry
    pub fn new<T: ThumbnailSource>(source: T, runtime: Handle, factory: &mut IconFactory) -> Option<Self> {
        let ring = (THUMBNAIL_DIAMETER / 2 + THUMBNAIL_BORDER) as f32;
        let backing = factory.circle(ring)?.clone();
        let clip = factory.circle((THUMBNAIL_DIAMETER / 2) as f32)?.clone();

        let source = Arc::new(source);
        let fetch: FetchFn = Arc::new(move |url: String| -> FetchFuture {
            let source = Arc::clone(&source);
            Box::pin(async move { source.fetch_thumbnail(&url).await })
        });

        let (tx, rx) = mpsc::unbounded_channel();
        Some(Self {
            fetch,
            runtime,
            tx,
            rx,
            ready: HashMap::new(),
            ready_order: VecDeque::new(),
            pending: HashSet::new(),
            failed: HashSet::new(),
            failed_order: VecDeque::new(),
            limit: THUMBNAIL_CACHE_LIMIT,
            backing,
            clip,
        })
    }

    /// Keep at most `limit` finished icons and `limit` broken URLs
    pub fn with_cache_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }

    /// Cached icon for `url`, starting a background job on first sight
    pub fn lookup(&mut self, url: &str) -> ThumbnailState {
        if let Some(icon) = self.ready.get(url) {
            return ThumbnailState::Ready(icon.clone());
        }
        if self.failed.contains(url) {
            return ThumbnailState::Failed;
        }
        if self.pending.insert(url.to_string()) {
            self.spawn(url.to_string());
        }
        ThumbnailState::Pending
    }

    fn spawn(&self, url: String) {
        let fetch = Arc::clone(&self.fetch);
        let tx = self.tx.clone();
        let backing = self.backing.clone();
        let clip = self.clip.clone();

        self.runtime.spawn(async move {
            let outcome = match fetch(url.clone()).await {
                Ok(bytes) => tokio::task::spawn_blocking(move || render_thumbnail(&bytes, &backing, &clip))
                    .await
                    .unwrap_or_else(|e| Err(ImageError::Decode(e.to_string())))
                    .map(Arc::new),
                Err(e) => Err(e),
            };
            // Receiver gone means the engine shut down
            let _ = tx.send(ThumbnailResult { url, outcome });
        });
    }

    /// Move finished jobs into the cache. Returns the URLs that became ready.
    pub fn drain(&mut self) -> Vec<(String, Arc<MarkerIcon>)> {
        let mut landed = Vec::new();
        while let Ok(result) = self.rx.try_recv() {
            self.pending.remove(&result.url);
            match result.outcome {
                Ok(icon) => {
                    debug!(url = %result.url, "thumbnail ready");
                    if self.ready.insert(result.url.clone(), icon.clone()).is_none() {
                        self.ready_order.push_back(result.url.clone());
                    }
                    landed.push((result.url, icon));
                }
                Err(e) => {
                    warn!(url = %result.url, error = %e, "thumbnail unavailable, keeping bare marker");
                    if self.failed.insert(result.url.clone()) {
                        self.failed_order.push_back(result.url);
                    }
                }
            }
        }
        self.evict();
        landed
    }

    fn evict(&mut self) {
        while self.ready_order.len() > self.limit {
            if let Some(url) = self.ready_order.pop_front() {
                self.ready.remove(&url);
            }
        }
        while self.failed_order.len() > self.limit {
            if let Some(url) = self.failed_order.pop_front() {
                self.failed.remove(&url);
            }
        }
    }

    /// Forget finished and broken URLs. Jobs in flight still land.
    pub fn clear(&mut self) {
        self.ready.clear();
        self.ready_order.clear();
        self.failed.clear();
        self.failed_order.clear();
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn cached_count(&self) -> usize {
        self.ready.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use std::time::Duration;

    fn ring_paths() -> (Path, Path) {
        let mut factory = IconFactory::new();
        let backing = factory.circle(14.0).unwrap().clone();
        let clip = factory.circle(12.0).unwrap().clone();
        (backing, clip)
    }

    #[test]
    fn test_crop_square_centers_landscape() {
        let mut img = RgbaImage::from_pixel(30, 10, image::Rgba([0, 0, 0, 255]));
        // Paint the middle 10x10 red; the crop must keep only that
        for x in 10..20 {
            for y in 0..10 {
                img.put_pixel(x, y, image::Rgba([255, 0, 0, 255]));
            }
        }
        let square = crop_square(&DynamicImage::ImageRgba8(img), 10).unwrap();
        assert_eq!(square.dimensions(), (10, 10));
        assert!(square.pixels().all(|p| p.0 == [255, 0, 0, 255]));
    }

    #[test]
    fn test_crop_rejects_empty() {
        let img = DynamicImage::ImageRgba8(RgbaImage::new(0, 5));
        assert_eq!(crop_square(&img, 24), Err(ImageError::Empty));
    }

    #[test]
    fn test_render_thumbnail_ring_and_mask() {
        let (backing, clip) = ring_paths();
        let icon = render_thumbnail(&png_bytes(40, 20, [0, 0, 255, 255]), &backing, &clip).unwrap();
        assert_eq!(icon.width(), THUMBNAIL_DIAMETER + 2 * THUMBNAIL_BORDER);

        let c = icon.width() / 2;
        let center = icon.pixmap.pixel(c, c).unwrap();
        assert!(center.red() <= 5 && center.blue() >= 250);

        // Ring pixel between clip and backing radius is white
        let ring = icon.pixmap.pixel(c, 1).unwrap();
        assert_eq!((ring.red(), ring.green(), ring.blue()), (255, 255, 255));

        // Corners stay transparent
        assert_eq!(icon.alpha_at(0, 0), 0);
        assert!(icon.tint[2] >= 250 && icon.tint[0] <= 5);
    }

    #[test]
    fn test_render_thumbnail_rejects_garbage() {
        let (backing, clip) = ring_paths();
        assert!(matches!(render_thumbnail(b"not an image", &backing, &clip), Err(ImageError::Decode(_))));
    }

    #[tokio::test]
    async fn test_loader_fetches_once_and_caches() {
        let mut thumbs = HashMap::new();
        thumbs.insert("a.png".to_string(), png_bytes(8, 8, [10, 200, 10, 255]));
        let mut factory = IconFactory::new();
        let mut loader = ThumbnailLoader::new(MapThumbnails(thumbs), Handle::current(), &mut factory).unwrap();

        assert!(matches!(loader.lookup("a.png"), ThumbnailState::Pending));
        assert!(matches!(loader.lookup("a.png"), ThumbnailState::Pending));
        assert!(matches!(loader.lookup("missing.png"), ThumbnailState::Pending));
        assert_eq!(loader.pending_count(), 2);

        let mut landed = Vec::new();
        for _ in 0..200 {
            landed.extend(loader.drain());
            if loader.pending_count() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert_eq!(landed.len(), 1);
        assert_eq!(landed[0].0, "a.png");
        assert!(matches!(loader.lookup("a.png"), ThumbnailState::Ready(_)));
        assert!(matches!(loader.lookup("missing.png"), ThumbnailState::Failed));
        assert_eq!(loader.cached_count(), 1);
    }

    async fn drain_all(loader: &mut ThumbnailLoader) -> Vec<(String, Arc<MarkerIcon>)> {
        let mut landed = Vec::new();
        for _ in 0..200 {
            landed.extend(loader.drain());
            if loader.pending_count() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        landed
    }

    #[tokio::test]
    async fn test_cache_drops_oldest_past_limit() {
        let mut thumbs = HashMap::new();
        for name in ["a.png", "b.png", "c.png"] {
            thumbs.insert(name.to_string(), png_bytes(8, 8, [200, 10, 10, 255]));
        }
        let mut factory = IconFactory::new();
        let mut loader = ThumbnailLoader::new(MapThumbnails(thumbs), Handle::current(), &mut factory)
            .unwrap()
            .with_cache_limit(2);

        loader.lookup("a.png");
        drain_all(&mut loader).await;
        loader.lookup("b.png");
        loader.lookup("gone-1.png");
        drain_all(&mut loader).await;
        loader.lookup("c.png");
        loader.lookup("gone-2.png");
        loader.lookup("gone-3.png");
        drain_all(&mut loader).await;

        assert_eq!(loader.cached_count(), 2);
        assert_eq!(loader.failed_count(), 2);
        assert!(matches!(loader.lookup("c.png"), ThumbnailState::Ready(_)));
        // Evicted: fetched again on next sight
        assert!(matches!(loader.lookup("a.png"), ThumbnailState::Pending));
        assert!(matches!(loader.lookup("gone-1.png"), ThumbnailState::Pending));
    }

    #[tokio::test]
    async fn test_clear_forgets_icons_and_failures() {
        let mut thumbs = HashMap::new();
        thumbs.insert("a.png".to_string(), png_bytes(8, 8, [10, 10, 200, 255]));
        let mut factory = IconFactory::new();
        let mut loader = ThumbnailLoader::new(MapThumbnails(thumbs), Handle::current(), &mut factory).unwrap();

        loader.lookup("a.png");
        loader.lookup("missing.png");
        drain_all(&mut loader).await;
        assert_eq!((loader.cached_count(), loader.failed_count()), (1, 1));

        loader.clear();
        assert_eq!((loader.cached_count(), loader.failed_count()), (0, 0));
        assert!(matches!(loader.lookup("missing.png"), ThumbnailState::Pending));
    }
}
