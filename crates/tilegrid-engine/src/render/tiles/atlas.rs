//! Atlas texture: placeholder first, decoded image later.
//!
//! Decoding and mip generation happen on a loader thread. The finished image
//! comes back over a one-shot channel and is uploaded on the render thread
//! the next time the atlas is polled.

use std::path::PathBuf;
use std::sync::Arc;

use image::imageops::FilterType;
use image::RgbaImage;

/// 1x1 opaque texel bound until the real atlas arrives.
pub const PLACEHOLDER_TEXEL: [u8; 4] = [0, 0, 255, 255];

const ATLAS_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// Where the atlas image comes from.
#[derive(Debug, Clone)]
pub enum AtlasSource {
    Path(PathBuf),
    /// Encoded image bytes (PNG etc.), e.g. from `include_bytes!`.
    Bytes(Arc<[u8]>),
}

impl AtlasSource {
    fn describe(&self) -> String {
        match self {
            AtlasSource::Path(p) => p.display().to_string(),
            AtlasSource::Bytes(b) => format!("<{} bytes>", b.len()),
        }
    }
}

/// Decoded atlas with its full mip chain, level 0 first.
#[derive(Debug, Clone)]
pub struct AtlasImage {
    levels: Vec<RgbaImage>,
}

impl AtlasImage {
    pub fn decode(source: &AtlasSource) -> Result<Self, image::ImageError> {
        let image = match source {
            AtlasSource::Path(p) => image::open(p)?,
            AtlasSource::Bytes(b) => image::load_from_memory(b)?,
        };
        Ok(Self::from_rgba(image.to_rgba8()))
    }

    pub fn from_rgba(base: RgbaImage) -> Self {
        Self { levels: build_mip_chain(base) }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.levels[0].width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.levels[0].height()
    }

    #[inline]
    pub fn levels(&self) -> &[RgbaImage] {
        &self.levels
    }
}

/// Number of mip levels down to 1x1.
#[inline]
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

/// Halves `base` repeatedly (each edge floored at 1) until 1x1.
pub fn build_mip_chain(base: RgbaImage) -> Vec<RgbaImage> {
    let count = mip_level_count(base.width(), base.height()) as usize;
    let mut levels = Vec::with_capacity(count);
    levels.push(base);

    while levels.len() < count {
        let prev = &levels[levels.len() - 1];
        let w = (prev.width() / 2).max(1);
        let h = (prev.height() / 2).max(1);
        let next = image::imageops::resize(prev, w, h, FilterType::Triangle);
        levels.push(next);
    }

    levels
}

/// Background decode of one atlas image.
///
/// One-shot: yields at most one image, then reports itself finished.
#[derive(Debug)]
pub struct AtlasLoader {
    rx: Option<flume::Receiver<AtlasImage>>,
}

impl AtlasLoader {
    pub fn spawn(source: AtlasSource) -> Self {
        let (tx, rx) = flume::bounded(1);

        let spawned = std::thread::Builder::new()
            .name("tilegrid-atlas".to_string())
            .spawn(move || match AtlasImage::decode(&source) {
                Ok(image) => {
                    log::debug!(
                        "atlas decoded: {} ({}x{}, {} mips)",
                        source.describe(),
                        image.width(),
                        image.height(),
                        image.levels().len()
                    );
                    if tx.send(image).is_err() {
                        log::debug!("atlas decoded after its renderer went away; dropping it");
                    }
                }
                Err(e) => {
                    log::warn!("atlas load failed for {}: {e}; keeping placeholder", source.describe());
                }
            });

        if let Err(e) = spawned {
            log::warn!("failed to start atlas loader thread: {e}; keeping placeholder");
            return Self { rx: None };
        }

        Self { rx: Some(rx) }
    }

    /// Returns the decoded image once it is ready. Never blocks.
    pub fn poll(&mut self) -> Option<AtlasImage> {
        let rx = self.rx.as_ref()?;
        match rx.try_recv() {
            Ok(image) => {
                self.rx = None;
                Some(image)
            }
            Err(flume::TryRecvError::Empty) => None,
            Err(flume::TryRecvError::Disconnected) => {
                self.rx = None;
                None
            }
        }
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.rx.is_none()
    }
}

/// GPU atlas texture + sampler.
///
/// `generation` bumps whenever the texture is replaced so dependents know to
/// rebuild their bind groups.
pub struct TileAtlas {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
    generation: u64,
    placeholder: bool,
    loader: Option<AtlasLoader>,
}

impl TileAtlas {
    /// Binds the placeholder immediately and starts loading `source`, if any.
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, source: Option<AtlasSource>) -> Self {
        let placeholder = RgbaImage::from_raw(1, 1, PLACEHOLDER_TEXEL.to_vec())
            .map(AtlasImage::from_rgba)
            .unwrap_or_else(|| AtlasImage::from_rgba(RgbaImage::new(1, 1)));
        let texture = upload(device, queue, &placeholder, "tilegrid atlas placeholder");
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("tilegrid atlas sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });

        Self {
            texture,
            view,
            sampler,
            generation: 0,
            placeholder: true,
            loader: source.map(AtlasLoader::spawn),
        }
    }

    /// Swaps in the decoded atlas if it has arrived. Returns `true` on swap.
    ///
    /// Must run on the thread that owns `device`/`queue`.
    pub fn poll(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) -> bool {
        let Some(loader) = self.loader.as_mut() else { return false };

        let Some(image) = loader.poll() else {
            if loader.is_finished() {
                self.loader = None;
            }
            return false;
        };
        self.loader = None;

        self.install(device, queue, &image)
    }

    /// Uploads `image` and makes it current. An image the device cannot hold
    /// is dropped and the current texture stays bound.
    fn install(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, image: &AtlasImage) -> bool {
        let max = device.limits().max_texture_dimension_2d;
        if !fits_texture_limit(image, max) {
            log::warn!(
                "atlas {}x{} exceeds the device limit of {max}px per side; keeping current texture",
                image.width(),
                image.height()
            );
            return false;
        }

        let scope = device.push_error_scope(wgpu::ErrorFilter::Validation);
        let texture = upload(device, queue, image, "tilegrid atlas");
        if let Some(err) = pollster::block_on(scope.pop()) {
            log::warn!("atlas upload rejected: {err}; keeping current texture");
            texture.destroy();
            return false;
        }

        self.texture = texture;
        self.view = self.texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.generation += 1;
        self.placeholder = false;

        log::info!("atlas ready ({}x{})", image.width(), image.height());
        true
    }

    #[inline]
    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    #[inline]
    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    #[inline]
    pub fn is_loading(&self) -> bool {
        self.loader.is_some()
    }
}

#[inline]
fn fits_texture_limit(image: &AtlasImage, max_dimension: u32) -> bool {
    image.width() <= max_dimension && image.height() <= max_dimension
}

fn upload(device: &wgpu::Device, queue: &wgpu::Queue, image: &AtlasImage, label: &str) -> wgpu::Texture {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: image.width(),
            height: image.height(),
            depth_or_array_layers: 1,
        },
        mip_level_count: image.levels().len() as u32,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: ATLAS_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    for (level, pixels) in image.levels().iter().enumerate() {
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: level as u32,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels.as_raw(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(pixels.width() * 4),
                rows_per_image: Some(pixels.height()),
            },
            wgpu::Extent3d {
                width: pixels.width(),
                height: pixels.height(),
                depth_or_array_layers: 1,
            },
        );
    }

    texture
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(w: u32, h: u32) -> Arc<[u8]> {
        let img = RgbaImage::from_pixel(w, h, image::Rgba([10, 20, 30, 255]));
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner().into()
    }

    fn wait(loader: &AtlasLoader) -> Option<AtlasImage> {
        loader.rx.as_ref().and_then(|rx| rx.recv().ok())
    }

    // ── mip chain ─────────────────────────────────────────────────────────

    #[test]
    fn mip_count_reaches_one_by_one() {
        assert_eq!(mip_level_count(1, 1), 1);
        assert_eq!(mip_level_count(2, 1), 2);
        assert_eq!(mip_level_count(384, 256), 9);
        assert_eq!(mip_level_count(0, 0), 1);
    }

    #[test]
    fn mip_chain_halves_each_level() {
        let levels = build_mip_chain(RgbaImage::new(384, 256));
        let sizes: Vec<(u32, u32)> = levels.iter().map(|l| l.dimensions()).collect();
        assert_eq!(
            sizes,
            vec![
                (384, 256),
                (192, 128),
                (96, 64),
                (48, 32),
                (24, 16),
                (12, 8),
                (6, 4),
                (3, 2),
                (1, 1),
            ]
        );
    }

    #[test]
    fn placeholder_is_single_level() {
        let img = AtlasImage::from_rgba(RgbaImage::from_raw(1, 1, PLACEHOLDER_TEXEL.to_vec()).unwrap());
        assert_eq!(img.levels().len(), 1);
        assert_eq!(img.levels()[0].as_raw().as_slice(), &PLACEHOLDER_TEXEL);
    }

    // ── decode ────────────────────────────────────────────────────────────

    #[test]
    fn decodes_png_bytes() {
        let img = AtlasImage::decode(&AtlasSource::Bytes(png_bytes(24, 16))).unwrap();
        assert_eq!((img.width(), img.height()), (24, 16));
        assert_eq!(img.levels().len(), 5);
        assert_eq!(img.levels()[0].get_pixel(3, 3).0, [10, 20, 30, 255]);
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let bytes: Arc<[u8]> = vec![1u8, 2, 3, 4].into();
        assert!(AtlasImage::decode(&AtlasSource::Bytes(bytes)).is_err());
    }

    // ── loader ────────────────────────────────────────────────────────────

    #[test]
    fn loader_delivers_once() {
        let mut loader = AtlasLoader::spawn(AtlasSource::Bytes(png_bytes(8, 8)));
        let img = wait(&loader).expect("decoded image");
        assert_eq!((img.width(), img.height()), (8, 8));

        // Sender is gone after the single message.
        assert!(loader.poll().is_none());
        assert!(loader.is_finished());
    }

    #[test]
    fn loader_failure_leaves_nothing() {
        let mut loader = AtlasLoader::spawn(AtlasSource::Path(PathBuf::from("/nonexistent/atlas.png")));
        assert!(wait(&loader).is_none());
        assert!(loader.poll().is_none());
        assert!(loader.is_finished());
    }

    #[test]
    fn loader_outliving_its_receiver_exits_quietly() {
        let loader = AtlasLoader::spawn(AtlasSource::Bytes(png_bytes(8, 8)));
        drop(loader);
    }

    // ── device upload ─────────────────────────────────────────────────────

    /// Polls until the loader has delivered or given up.
    fn settle(atlas: &mut TileAtlas, device: &wgpu::Device, queue: &wgpu::Queue) -> bool {
        for _ in 0..2000 {
            if atlas.poll(device, queue) {
                return true;
            }
            if !atlas.is_loading() {
                return false;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn texture_limit_is_inclusive() {
        let img = AtlasImage::from_rgba(RgbaImage::new(64, 16));
        assert!(fits_texture_limit(&img, 64));
        assert!(!fits_texture_limit(&img, 63));
    }

    #[test]
    fn starts_on_placeholder() {
        let (device, queue) = crate::tiles::test_device::noop();
        let atlas = TileAtlas::new(&device, &queue, None);
        assert!(atlas.is_placeholder());
        assert!(!atlas.is_loading());
        assert_eq!(atlas.generation(), 0);
    }

    #[test]
    fn decoded_atlas_replaces_placeholder() {
        let (device, queue) = crate::tiles::test_device::noop();
        let mut atlas = TileAtlas::new(&device, &queue, Some(AtlasSource::Bytes(png_bytes(24, 16))));
        assert!(settle(&mut atlas, &device, &queue));
        assert!(!atlas.is_placeholder());
        assert_eq!(atlas.generation(), 1);
    }

    #[test]
    fn oversized_atlas_keeps_placeholder() {
        let (device, queue) = crate::tiles::test_device::noop();
        let too_wide = device.limits().max_texture_dimension_2d + 1;
        let mut atlas = TileAtlas::new(&device, &queue, Some(AtlasSource::Bytes(png_bytes(too_wide, 1))));

        assert!(!settle(&mut atlas, &device, &queue));
        assert!(!atlas.is_loading());
        assert!(atlas.is_placeholder());
        assert_eq!(atlas.generation(), 0);
    }
}
