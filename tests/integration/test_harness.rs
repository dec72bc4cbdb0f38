// Test harness: an orchestrator wired to filesystem providers in a temp dir

use http::Method;
use hyperpic::cache::{EvictionPolicy, FilesystemCache};
use hyperpic::image_optimizer::ImageProcessor;
use hyperpic::metrics::Metrics;
use hyperpic::pipeline::{ImageRequest, NegotiationPipeline};
use hyperpic::proxy::{ImageResponse, ImageService};
use hyperpic::source::FilesystemSource;
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub const SECRET: &str = "integration-secret";

pub struct Harness {
    pub service: ImageService,
    pub source_root: PathBuf,
    pub cache_root: PathBuf,
    _dir: TempDir,
}

impl Harness {
    /// Must be called inside a Tokio runtime (the cache starts its sweeper)
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let source_root = dir.path().join("source");
        let cache_root = dir.path().join("cache");

        let policy = EvictionPolicy {
            life_time: Duration::from_secs(3600),
            clean_interval: Duration::from_secs(3600),
        };

        let service = ImageService::new(
            NegotiationPipeline::new(["jpg", "jpeg", "png", "webp"], 65, SECRET),
            Arc::new(FilesystemSource::new(&source_root)),
            Arc::new(FilesystemCache::new(&cache_root, policy)),
            Arc::new(ImageProcessor::new(2)),
            Arc::new(Metrics::new().unwrap()),
        );

        Self {
            service,
            source_root,
            cache_root,
            _dir: dir,
        }
    }

    pub async fn get(&self, path: &str, query: &str) -> ImageResponse {
        self.service
            .handle(ImageRequest::new(Method::GET, path).with_query(query))
            .await
    }

    pub async fn upload(&self, path: &str, body: Vec<u8>) -> ImageResponse {
        self.service
            .handle(
                ImageRequest::new(Method::POST, path)
                    .with_header("authorization", &format!("Bearer {}", SECRET))
                    .with_header("content-type", "image/jpeg")
                    .with_body(body),
            )
            .await
    }

    pub async fn delete(&self, path: &str, query: &str) -> ImageResponse {
        self.service
            .handle(
                ImageRequest::new(Method::DELETE, path)
                    .with_query(query)
                    .with_header("authorization", &format!("Bearer {}", SECRET)),
            )
            .await
    }

    /// Number of derivative files stored for `path`
    pub fn cached_derivatives(&self, path: &str) -> usize {
        let dir = self.cache_root.join(path.trim_start_matches('/'));
        std::fs::read_dir(dir)
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .filter(|e| e.path().is_file())
                    .filter(|e| !e.file_name().to_string_lossy().ends_with(".tmp"))
                    .count()
            })
            .unwrap_or(0)
    }

    /// Wait for the detached cache write of a derivative of `path`
    pub async fn wait_for_cache(&self, path: &str, expected: usize) {
        for _ in 0..200 {
            if self.cached_derivatives(path) >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("cache for {} never reached {} derivatives", path, expected);
    }
}

/// A small gradient image encoded as JPEG
pub fn sample_jpeg(width: u32, height: u32) -> Vec<u8> {
    encode_sample(width, height, ImageOutputFormat::Jpeg(90))
}

/// A small gradient image encoded as PNG
pub fn sample_png(width: u32, height: u32) -> Vec<u8> {
    encode_sample(width, height, ImageOutputFormat::Png)
}

fn encode_sample(width: u32, height: u32, format: ImageOutputFormat) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 255 / width) as u8, (y * 255 / height) as u8, 128])
    });
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, format)
        .unwrap();
    out.into_inner()
}

pub fn decoded_dimensions(body: &[u8]) -> (u32, u32) {
    let img = image::load_from_memory(body).unwrap();
    (img.width(), img.height())
}
