// Contract checks shared by every source and cache provider

use bytes::Bytes;
use hyperpic::cache::{CacheProvider, EvictionPolicy, FilesystemCache, MemoryCache};
use hyperpic::image_optimizer::Options;
use hyperpic::resource::Resource;
use hyperpic::source::{FilesystemSource, MemorySource, SourceError, SourceProvider};
use rstest::rstest;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

#[derive(Debug, Clone, Copy)]
enum Backend {
    Filesystem,
    Memory,
}

fn policy() -> EvictionPolicy {
    EvictionPolicy {
        life_time: Duration::from_secs(3600),
        clean_interval: Duration::from_secs(3600),
    }
}

fn cache_for(backend: Backend, dir: &TempDir) -> Box<dyn CacheProvider> {
    match backend {
        Backend::Filesystem => Box::new(FilesystemCache::new(dir.path(), policy())),
        Backend::Memory => Box::new(MemoryCache::new(1 << 20, policy())),
    }
}

fn source_for(backend: Backend, dir: &TempDir) -> Box<dyn SourceProvider> {
    match backend {
        Backend::Filesystem => Box::new(FilesystemSource::new(dir.path())),
        Backend::Memory => Box::new(MemorySource::new()),
    }
}

fn derivative(path: &str, query: &str, body: &'static [u8]) -> Resource {
    Resource::new(path)
        .with_options(Arc::new(Options::from_query(query).unwrap()))
        .with_body(Bytes::from_static(body))
}

#[rstest]
#[case::filesystem(Backend::Filesystem)]
#[case::memory(Backend::Memory)]
#[tokio::test]
async fn test_cache_set_then_get(#[case] backend: Backend) {
    let dir = TempDir::new().unwrap();
    let cache = cache_for(backend, &dir);

    let entry = derivative("/photos/a.jpg", "w=10", b"derived");
    cache.set(&entry).await.unwrap();

    let hit = cache
        .get(&derivative("/photos/a.jpg", "w=10", b""))
        .await
        .unwrap();
    assert_eq!(&hit.body()[..], b"derived");
    assert_eq!(hit.size(), 7);
    cache.shutdown();
}

#[rstest]
#[case::filesystem(Backend::Filesystem)]
#[case::memory(Backend::Memory)]
#[tokio::test]
async fn test_cache_never_set_is_miss(#[case] backend: Backend) {
    let dir = TempDir::new().unwrap();
    let cache = cache_for(backend, &dir);

    let err = cache
        .get(&derivative("/a.jpg", "w=10", b""))
        .await
        .unwrap_err();
    assert!(err.is_miss());

    let err = cache.get(&Resource::new("/a.jpg")).await.unwrap_err();
    assert!(err.is_miss());
}

#[rstest]
#[case::filesystem(Backend::Filesystem)]
#[case::memory(Backend::Memory)]
#[tokio::test]
async fn test_cache_derivatives_coexist_and_delete_as_family(#[case] backend: Backend) {
    let dir = TempDir::new().unwrap();
    let cache = cache_for(backend, &dir);

    cache.set(&derivative("/a.jpg", "w=10", b"small")).await.unwrap();
    cache.set(&derivative("/a.jpg", "w=20", b"large")).await.unwrap();
    cache.set(&derivative("/b.jpg", "w=10", b"other")).await.unwrap();

    let small = cache.get(&derivative("/a.jpg", "w=10", b"")).await.unwrap();
    let large = cache.get(&derivative("/a.jpg", "w=20", b"")).await.unwrap();
    assert_eq!(&small.body()[..], b"small");
    assert_eq!(&large.body()[..], b"large");

    cache.del("/a.jpg").await.unwrap();
    assert!(cache.get(&derivative("/a.jpg", "w=10", b"")).await.is_err());
    assert!(cache.get(&derivative("/a.jpg", "w=20", b"")).await.is_err());
    assert!(cache.get(&derivative("/b.jpg", "w=10", b"")).await.is_ok());
}

#[rstest]
#[case::filesystem(Backend::Filesystem)]
#[case::memory(Backend::Memory)]
#[tokio::test]
async fn test_cache_rejects_traversal(#[case] backend: Backend) {
    let dir = TempDir::new().unwrap();
    let cache = cache_for(backend, &dir);

    let hostile = derivative("/../../etc/passwd", "w=1", b"x");
    assert!(!cache.get(&hostile).await.unwrap_err().is_miss());
    assert!(cache.set(&hostile).await.is_err());
    assert!(cache.del("/../../etc").await.is_err());
}

#[rstest]
#[case::filesystem(Backend::Filesystem)]
#[case::memory(Backend::Memory)]
#[tokio::test]
async fn test_source_round_trip_and_errors(#[case] backend: Backend) {
    let dir = TempDir::new().unwrap();
    let source = source_for(backend, &dir);

    source
        .set(&Resource::new("/nested/dir/a.jpg").with_body(Bytes::from_static(b"jpeg")))
        .await
        .unwrap();
    let original = source.get("/nested/dir/a.jpg").await.unwrap();
    assert_eq!(&original.body()[..], b"jpeg");
    assert_eq!(original.name(), "a.jpg");

    assert!(matches!(
        source.get("/missing.jpg").await,
        Err(SourceError::NotFound { .. })
    ));
    assert!(matches!(
        source.get("/../secret.jpg").await,
        Err(SourceError::InvalidPath { .. })
    ));
    assert!(matches!(
        source.del("/a/../../secret.jpg").await,
        Err(SourceError::InvalidPath { .. })
    ));

    source.del("/nested/dir/a.jpg").await.unwrap();
    assert!(matches!(
        source.del("/nested/dir/a.jpg").await,
        Err(SourceError::NotFound { .. })
    ));
}

#[test]
fn test_memory_cache_budget_outside_async_test() {
    tokio_test::block_on(async {
        let cache = MemoryCache::new(8, policy());
        cache.set(&derivative("/a.jpg", "w=1", b"12345")).await.unwrap();
        assert!(cache.set(&derivative("/b.jpg", "w=1", b"12345")).await.is_err());
        assert_eq!(cache.used_bytes(), 5);
        cache.shutdown();
    });
}
