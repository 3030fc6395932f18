//! Texture resolution: HTTP fetch + decode into a ready-to-bind [`Image`].
//!
//! [`fetch_decoded`] is the blocking half — it downloads the image bytes with
//! `ureq`, decodes them to RGBA8 with the `image` crate, and validates the
//! dimensions.  It is meant to run on the private [`worker_pool`], never on
//! the main thread.  [`decoded_to_image`] is the main-thread half: it wraps
//! the pixel buffer in a Bevy [`Image`] carrying the fixed sampler the
//! reskinning material expects (repeat wrap on both axes, nearest filtering,
//! no mipmap chain — nearest filtering never samples one).
//!
//! A single attempt per URL, no retry.  The caller decides whether to retry
//! by requesting the URL again.

use std::io::Read;
use std::sync::OnceLock;

use bevy::{
    asset::RenderAssetUsages,
    image::{Image, ImageAddressMode, ImageFilterMode, ImageSampler, ImageSamplerDescriptor},
    render::render_resource::{Extent3d, TextureDimension, TextureFormat},
};

/// Maximum number of fetch/decode and prompt-generation tasks that run
/// concurrently.
///
/// Additional tasks are queued inside the rayon pool rather than spawning new
/// OS threads, bounding both socket and memory usage.
const MAX_WORKER_THREADS: usize = 4;

/// Upper bound on a single texture download.
///
/// Reads past this limit produce a truncated buffer, which fails decoding.
/// A square-HD PNG from the generation service is ~2 MB; 32 MB leaves ample
/// headroom without letting a misbehaving host exhaust memory.
const MAX_DOWNLOAD_BYTES: u64 = 32 * 1024 * 1024;

/// Maximum allowed texture dimension (per side).
///
/// Capped at 4096 to bound peak memory usage: at 8192 a single RGBA8 decode
/// is 256 MB before upload, and with four concurrent fetches that exceeds
/// 1 GB for texture traffic alone.
pub const MAX_DIMENSION: u32 = 4096;

/// Returns the library-private rayon thread pool used for texture fetches
/// and remote generation calls.
///
/// Isolated from the application's global rayon pool so blocking network
/// I/O does not starve unrelated parallel workloads, and the concurrency cap
/// is enforced regardless of the calling application's rayon configuration.
pub(crate) fn worker_pool() -> &'static rayon::ThreadPool {
    static POOL: OnceLock<rayon::ThreadPool> = OnceLock::new();
    POOL.get_or_init(|| {
        rayon::ThreadPoolBuilder::new()
            .num_threads(MAX_WORKER_THREADS)
            .thread_name(|i| format!("reskin-worker-{i}"))
            .build()
            .expect("failed to build reskin worker thread pool")
    })
}

/// Error returned when a texture URL cannot be turned into a usable image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// The server answered with a non-2xx status.
    Http { url: String, status: u16 },
    /// The request never produced a response (DNS, connect, read failure).
    Transport { url: String, message: String },
    /// The response body was not a decodable PNG or JPEG.
    Decode { url: String, message: String },
    /// The decoded image had a zero dimension, which is not a valid wgpu
    /// texture size.
    ZeroDimension { url: String, width: u32, height: u32 },
    /// One or both decoded dimensions exceeded [`MAX_DIMENSION`].
    DimensionTooLarge {
        url: String,
        width: u32,
        height: u32,
        max: u32,
    },
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::Http { url, status } => {
                write!(f, "texture fetch from {url} failed with status {status}")
            }
            LoadError::Transport { url, message } => {
                write!(f, "texture fetch from {url} failed: {message}")
            }
            LoadError::Decode { url, message } => {
                write!(f, "could not decode texture from {url}: {message}")
            }
            LoadError::ZeroDimension { url, width, height } => write!(
                f,
                "texture from {url} has a zero dimension ({width}×{height})"
            ),
            LoadError::DimensionTooLarge {
                url,
                width,
                height,
                max,
            } => write!(
                f,
                "texture from {url} is {width}×{height}, exceeding MAX_DIMENSION={max}"
            ),
        }
    }
}

impl std::error::Error for LoadError {}

/// RGBA8 pixels decoded from a texture URL, tagged with their source.
#[derive(Debug)]
pub struct DecodedTexture {
    /// URL the pixels were fetched from.
    pub url: String,
    /// RGBA8 pixels, row-major, `width * height * 4` bytes.
    pub rgba: Vec<u8>,
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
}

/// Dimension guard for decoded textures.
///
/// Rejects zero-sized images (invalid wgpu resources) and dimensions that
/// exceed [`MAX_DIMENSION`].
#[inline]
pub fn validate_dimensions(url: &str, width: u32, height: u32) -> Result<(), LoadError> {
    if width == 0 || height == 0 {
        return Err(LoadError::ZeroDimension {
            url: url.to_owned(),
            width,
            height,
        });
    }
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(LoadError::DimensionTooLarge {
            url: url.to_owned(),
            width,
            height,
            max: MAX_DIMENSION,
        });
    }
    Ok(())
}

/// Fetch `url` and decode the response body into RGBA8 pixels.
///
/// Blocking — run it on [`worker_pool`].  One attempt; any failure is
/// reported as a [`LoadError`] and the caller decides whether to re-request.
pub fn fetch_decoded(url: &str) -> Result<DecodedTexture, LoadError> {
    let response = ureq::get(url).call().map_err(|e| match e {
        ureq::Error::Status(status, _) => LoadError::Http {
            url: url.to_owned(),
            status,
        },
        other => LoadError::Transport {
            url: url.to_owned(),
            message: other.to_string(),
        },
    })?;

    let mut bytes = Vec::new();
    response
        .into_reader()
        .take(MAX_DOWNLOAD_BYTES)
        .read_to_end(&mut bytes)
        .map_err(|e| LoadError::Transport {
            url: url.to_owned(),
            message: e.to_string(),
        })?;

    decode_bytes(url, &bytes)
}

/// Decode raw PNG/JPEG bytes into a validated [`DecodedTexture`].
pub fn decode_bytes(url: &str, bytes: &[u8]) -> Result<DecodedTexture, LoadError> {
    let decoded = image::load_from_memory(bytes).map_err(|e| LoadError::Decode {
        url: url.to_owned(),
        message: e.to_string(),
    })?;
    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    validate_dimensions(url, width, height)?;
    Ok(DecodedTexture {
        url: url.to_owned(),
        rgba: rgba.into_raw(),
        width,
        height,
    })
}

/// Wrap decoded pixels in a Bevy [`Image`] with the fixed reskinning sampler.
///
/// Takes the texture by value to move the pixel buffer directly into the
/// `Image` asset, avoiding a copy of `width * height * 4` bytes.  The
/// sampler repeats on both axes with nearest filtering, so the pattern tiles
/// crisply across the UV-mapped skin regions.
pub fn decoded_to_image(decoded: DecodedTexture) -> Image {
    let mut image = Image::new(
        Extent3d {
            width: decoded.width,
            height: decoded.height,
            depth_or_array_layers: 1,
        },
        TextureDimension::D2,
        decoded.rgba,
        TextureFormat::Rgba8UnormSrgb,
        RenderAssetUsages::default(),
    );
    image.sampler = ImageSampler::Descriptor(ImageSamplerDescriptor {
        address_mode_u: ImageAddressMode::Repeat,
        address_mode_v: ImageAddressMode::Repeat,
        mag_filter: ImageFilterMode::Nearest,
        min_filter: ImageFilterMode::Nearest,
        ..Default::default()
    });
    image
}

/// Encode a solid-color RGBA PNG for tests.
#[cfg(test)]
pub(crate) fn test_png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([200, 40, 40, 255]));
    let mut bytes = Vec::new();
    img.write_to(
        &mut std::io::Cursor::new(&mut bytes),
        image::ImageFormat::Png,
    )
    .expect("png encode failed");
    bytes
}
