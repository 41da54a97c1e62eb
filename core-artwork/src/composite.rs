//! Composite Renderer
//!
//! Builds a 2x2 mosaic for a collection (genre, playlist, ...) out of up to
//! four member albums, or a single full-size tile when only one member is
//! available. The result is persisted under the `ROUNDED` category keyed by
//! the collection's synthetic name.
//!
//! Rendering honours a [`CancellationToken`]: member fetches already in
//! flight finish, but once the token is cancelled no tile is painted and
//! nothing is written.

use bridge_traits::image::PixelBuffer;
use core_runtime::events::{ArtworkEvent, CoreEvent, EventBus};
use futures::future::join_all;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::cache::{ArtworkCache, ArtworkRequest};
use crate::derived::DerivedCache;
use crate::error::Result;
use crate::identity::ArtworkIdentity;
use crate::key::CacheKey;
use crate::transform::TransformFlags;
use crate::workers::TransformPool;

/// Tile origins in tile units: top-left, top-right, bottom-left, bottom-right.
const TILE_ORIGINS: [(u32, u32); 4] = [(0, 0), (1, 0), (0, 1), (1, 1)];

const BACKGROUND: [u8; 4] = [255, 255, 255, 255];

#[derive(Debug, Clone)]
pub struct CompositeRequest {
    /// Synthetic identity name, e.g. `genre_jazz`
    pub name: String,
    /// Candidate members in the order they should be placed
    pub members: Vec<ArtworkIdentity>,
    /// Logical edge length of the square composite
    pub size: u32,
    pub scale_factor: u32,
    /// Clear the corners outside a quarter-size radius
    pub rounded: bool,
    pub skip_cache_read: bool,
}

impl CompositeRequest {
    pub fn new(name: impl Into<String>, members: Vec<ArtworkIdentity>, size: u32) -> Self {
        Self {
            name: name.into(),
            members,
            size,
            scale_factor: 1,
            rounded: true,
            skip_cache_read: false,
        }
    }

    pub fn with_scale_factor(mut self, scale_factor: u32) -> Self {
        self.scale_factor = scale_factor;
        self
    }

    pub fn with_rounded(mut self, rounded: bool) -> Self {
        self.rounded = rounded;
        self
    }

    pub fn with_skip_cache_read(mut self, skip: bool) -> Self {
        self.skip_cache_read = skip;
        self
    }

    pub fn identity(&self) -> ArtworkIdentity {
        ArtworkIdentity::rounded(self.name.clone())
    }
}

#[derive(Debug, Clone)]
pub enum CompositeOutcome {
    Cached(Arc<PixelBuffer>),
    Rendered(Arc<PixelBuffer>),
    /// No member was supplied.
    NoMembers,
    Cancelled,
}

impl CompositeOutcome {
    pub fn into_buffer(self) -> Option<Arc<PixelBuffer>> {
        match self {
            CompositeOutcome::Cached(buffer) | CompositeOutcome::Rendered(buffer) => Some(buffer),
            CompositeOutcome::NoMembers | CompositeOutcome::Cancelled => None,
        }
    }
}

/// Member index painted at each tile position.
///
/// Two members alternate diagonally, three members repeat the first in the
/// last corner, and a single member fills the whole canvas.
pub fn tile_layout(members: usize) -> Vec<usize> {
    match members {
        0 => Vec::new(),
        1 => vec![0],
        2 => vec![0, 1, 1, 0],
        3 => vec![0, 1, 2, 0],
        _ => vec![0, 1, 2, 3],
    }
}

/// Make the pixels outside a circle of `radius` in each corner transparent.
pub fn round_corners(buffer: &mut PixelBuffer, radius: u32) {
    let (width, height) = buffer.dimensions();
    let radius = radius.min(width / 2).min(height / 2);
    if radius == 0 {
        return;
    }

    let r = radius as f64;
    for y in 0..radius {
        for x in 0..radius {
            let dx = r - x as f64 - 0.5;
            let dy = r - y as f64 - 0.5;
            if dx * dx + dy * dy <= r * r {
                continue;
            }
            for (px, py) in [
                (x, y),
                (width - 1 - x, y),
                (x, height - 1 - y),
                (width - 1 - x, height - 1 - y),
            ] {
                if let Some([red, green, blue, _]) = buffer.pixel(px, py) {
                    buffer.set_pixel(px, py, [red, green, blue, 0]);
                }
            }
        }
    }
}

pub struct CompositeRenderer {
    cache: Arc<ArtworkCache>,
    derived: Arc<DerivedCache>,
    pool: TransformPool,
    event_bus: Option<EventBus>,
}

impl CompositeRenderer {
    pub fn new(cache: Arc<ArtworkCache>, derived: Arc<DerivedCache>, pool: TransformPool) -> Self {
        Self {
            cache,
            derived,
            pool,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Render on a separate task.
    pub fn spawn(
        self: &Arc<Self>,
        request: CompositeRequest,
        token: CancellationToken,
    ) -> JoinHandle<Result<CompositeOutcome>> {
        let renderer = Arc::clone(self);
        tokio::spawn(async move { renderer.render(request, token).await })
    }

    #[instrument(skip(self, request, token), fields(name = %request.name, members = request.members.len()))]
    pub async fn render(&self, request: CompositeRequest, token: CancellationToken) -> Result<CompositeOutcome> {
        let (device, _) = ArtworkRequest::new(request.size, request.size)
            .with_scale_factor(request.scale_factor)
            .device_size()?;
        let identity = request.identity();
        let key = CacheKey::new(&identity.name, identity.prefix(), device, device);

        if !request.skip_cache_read {
            if let Some(buffer) = self.derived.read(&key).await? {
                return Ok(CompositeOutcome::Cached(buffer));
            }
        }

        let layout = tile_layout(request.members.len());
        if layout.is_empty() {
            return Ok(CompositeOutcome::NoMembers);
        }

        let tile_size = if layout.len() == 1 {
            request.size
        } else {
            (request.size / 2).max(1)
        };
        let tiles = self.fetch_tiles(&request, &layout, tile_size).await;

        if token.is_cancelled() {
            debug!("Composite cancelled before painting");
            return Ok(CompositeOutcome::Cancelled);
        }

        let tile_device = tile_size.saturating_mul(request.scale_factor);
        let rounded = request.rounded;
        let paint_token = token.clone();
        let painted = self
            .pool
            .run(move || {
                let mut canvas = PixelBuffer::filled(device, device, BACKGROUND);
                for (position, member) in layout.iter().enumerate() {
                    if paint_token.is_cancelled() {
                        return Ok(None);
                    }
                    let Some(tile) = tiles.get(member).and_then(|t| t.as_ref()) else {
                        continue;
                    };
                    let (column, row) = TILE_ORIGINS[position];
                    canvas.blit(tile, column * tile_device, row * tile_device);
                }
                if rounded {
                    round_corners(&mut canvas, device / 4);
                }
                Ok(Some(canvas))
            })
            .await?;

        let Some(canvas) = painted else {
            debug!("Composite cancelled while painting");
            return Ok(CompositeOutcome::Cancelled);
        };
        if token.is_cancelled() {
            debug!("Composite cancelled before persisting");
            return Ok(CompositeOutcome::Cancelled);
        }

        let canvas = Arc::new(canvas);
        match self.derived.write(&key, canvas.clone()).await {
            Ok(_) => {
                info!(size = device, "Stored composite artwork");
                if let Some(bus) = &self.event_bus {
                    bus.emit(CoreEvent::Artwork(ArtworkEvent::CompositeStored {
                        name: identity.name.clone(),
                        width: device,
                        height: device,
                    }))
                    .ok();
                }
            }
            Err(e) => warn!(error = %e, "Failed to persist composite"),
        }

        Ok(CompositeOutcome::Rendered(canvas))
    }

    /// Fetch every member the layout uses, in parallel. A member that has no
    /// artwork or fails to load leaves its tiles blank.
    async fn fetch_tiles(
        &self,
        request: &CompositeRequest,
        layout: &[usize],
        tile_size: u32,
    ) -> BTreeMap<usize, Option<Arc<PixelBuffer>>> {
        let used: BTreeSet<usize> = layout.iter().copied().collect();
        let tile_request = ArtworkRequest::new(tile_size, tile_size)
            .with_scale_factor(request.scale_factor)
            .with_flags(TransformFlags::default().with_write_through(true));

        let fetches = used.into_iter().map(|index| {
            let member = &request.members[index];
            async move {
                let tile = match self.cache.get(member, tile_request).await {
                    Ok(lookup) => lookup.into_buffer(),
                    Err(e) => {
                        warn!(member = %member, error = %e, "Skipping composite member");
                        None
                    }
                };
                if tile.is_none() {
                    debug!(member = %member, "Composite member has no artwork");
                }
                (index, tile)
            }
        });

        join_all(fetches).await.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_layout() {
        assert!(tile_layout(0).is_empty());
        assert_eq!(tile_layout(1), vec![0]);
        assert_eq!(tile_layout(2), vec![0, 1, 1, 0]);
        assert_eq!(tile_layout(3), vec![0, 1, 2, 0]);
        assert_eq!(tile_layout(4), vec![0, 1, 2, 3]);
        assert_eq!(tile_layout(9), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_round_corners_clears_only_corners() {
        let mut buffer = PixelBuffer::filled(40, 40, [10, 20, 30, 255]);
        round_corners(&mut buffer, 10);

        for (x, y) in [(0, 0), (39, 0), (0, 39), (39, 39)] {
            assert_eq!(buffer.pixel(x, y), Some([10, 20, 30, 0]));
        }
        assert_eq!(buffer.pixel(20, 20), Some([10, 20, 30, 255]));
        assert_eq!(buffer.pixel(20, 0), Some([10, 20, 30, 255]));
        assert_eq!(buffer.pixel(0, 20), Some([10, 20, 30, 255]));
        assert_eq!(buffer.pixel(9, 9), Some([10, 20, 30, 255]));
    }

    #[test]
    fn test_round_corners_zero_radius_is_noop() {
        let mut buffer = PixelBuffer::filled(4, 4, [1, 1, 1, 255]);
        let before = buffer.clone();
        round_corners(&mut buffer, 0);
        assert_eq!(buffer, before);
    }

    #[test]
    fn test_request_defaults() {
        let request = CompositeRequest::new("genre_jazz", Vec::new(), 200);
        assert_eq!(request.identity(), ArtworkIdentity::rounded("genre_jazz"));
        assert!(request.rounded);
        assert_eq!(request.scale_factor, 1);
    }
}
