// Constants module - centralized default values for configuration
//
// Every configurable knob has its default here so the config layer, the
// providers and the tests agree on the same numbers.

use http::HeaderName;

// =============================================================================
// Server defaults
// =============================================================================

/// Default listen address
pub const DEFAULT_ADDRESS: &str = "0.0.0.0";

/// Default listen port
pub const DEFAULT_PORT: u16 = 8080;

/// Default number of worker threads
pub const DEFAULT_THREADS: usize = 4;

/// Default request timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default maximum upload body size (10 MB)
pub const DEFAULT_MAX_BODY_SIZE: usize = 10 << 20;

// =============================================================================
// Storage defaults
// =============================================================================

/// Default root directory of the filesystem source provider
pub const DEFAULT_SOURCE_PATH: &str = "/var/lib/hyperpic/source";

/// Default root directory of the filesystem cache provider
pub const DEFAULT_CACHE_PATH: &str = "/var/lib/hyperpic/cache";

/// Default lifetime of a cached derivative (24 hours)
pub const DEFAULT_CACHE_LIFE_TIME_SECS: u64 = 24 * 60 * 60;

/// Default interval between two eviction sweeps (1 hour)
pub const DEFAULT_CACHE_CLEAN_INTERVAL_SECS: u64 = 60 * 60;

/// Default memory budget of the memory cache provider in MB
pub const DEFAULT_MEMORY_LIMIT_MB: u64 = 256;

// =============================================================================
// Image defaults
// =============================================================================

/// Extensions accepted by the extension filter
pub const DEFAULT_SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "webp", "png", "tiff"];

/// Quality forced by `Save-Data: on`
pub const DEFAULT_SAVE_DATA_QUALITY: u8 = 65;

/// Quality used by lossy encoders when the request does not set one
pub const DEFAULT_ENCODE_QUALITY: u8 = 80;

/// Maximum number of transforms running at the same time
pub const DEFAULT_MAX_CONCURRENT_TRANSFORMS: usize = 8;

/// Largest output width, after the device pixel ratio
pub const DEFAULT_MAX_WIDTH: u32 = 4096;

/// Largest output height, after the device pixel ratio
pub const DEFAULT_MAX_HEIGHT: u32 = 4096;

/// Largest pixel count of any image allocated while transforming
pub const DEFAULT_MAX_PIXELS: u64 = 4096 * 4096;

/// MIME types offered during `Accept` negotiation, in server preference order
pub const NEGOTIABLE_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/webp",
    "image/png",
    "image/tiff",
    "image/gif",
];

/// MIME type of uploads whose content could not be identified
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Multipart field carrying an uploaded image
pub const UPLOAD_FIELD_NAME: &str = "image";

// =============================================================================
// Response headers
// =============================================================================

/// Header telling clients whether the body came from the cache or the source
pub const X_IMAGE_FROM: HeaderName = HeaderName::from_static("x-image-from");

/// Header echoing the device pixel ratio applied to the image
pub const CONTENT_DPR: HeaderName = HeaderName::from_static("content-dpr");

// =============================================================================
// Logging defaults
// =============================================================================

/// Default log level when `RUST_LOG` is not set
pub const DEFAULT_LOG_LEVEL: &str = "info";
