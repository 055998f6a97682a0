//! Integration tests for `Shimmer::apply`.

// Enable Clippy lints that are disabled by default.
// https://rust-lang.github.io/rust-clippy/stable/index.html
#![warn(clippy::pedantic)]

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use indoc::indoc;
use libshimmer::descriptor::read_descriptor;
use libshimmer::http::{DownloadError, Downloader, HttpDownloader};
use libshimmer::resolver::{ResolveError, Resolver, SourceResolver};
use libshimmer::sources::LocalDirectorySource;
use libshimmer::tar::{ExtractError, Extractor, TarballExtractor};
use libshimmer::{
    Buildpack, BuildpackOrigin, CancellationToken, Shimmer, ShimmerConfig, ShimmerError,
    UnpackedBuildpack,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::{tempdir, TempDir};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SHIM_FILES: &[(&str, &str)] = &[
    ("bin/detect", "#!/usr/bin/env bash\n# shim detect\n"),
    ("bin/build", "#!/usr/bin/env bash\n# shim build\n"),
    ("bin/release", "#!/usr/bin/env bash\n# shim release\n"),
];

fn shim_tarball() -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));

    for (path, contents) in SHIM_FILES {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder
            .append_data(&mut header, path, contents.as_bytes())
            .unwrap();
    }

    builder.into_inner().unwrap().finish().unwrap()
}

/// Serves a shim tarball and records every download.
#[derive(Clone, Default)]
struct FakeDownloader {
    downloads: Arc<Mutex<Vec<(String, PathBuf)>>>,
}

impl FakeDownloader {
    fn downloads(&self) -> Vec<(String, PathBuf)> {
        self.downloads.lock().unwrap().clone()
    }
}

#[async_trait]
impl Downloader for FakeDownloader {
    async fn download(&self, url: &str, destination: &Path) -> Result<(), DownloadError> {
        self.downloads
            .lock()
            .unwrap()
            .push((url.to_string(), destination.to_path_buf()));
        fs::write(destination, shim_tarball())
            .map_err(|error| DownloadError::WriteFile(destination.to_path_buf(), url.into(), error))
    }
}

struct FailingDownloader;

#[async_trait]
impl Downloader for FailingDownloader {
    async fn download(&self, url: &str, destination: &Path) -> Result<(), DownloadError> {
        Err(DownloadError::WriteFile(
            destination.to_path_buf(),
            url.to_string(),
            std::io::Error::other("connection reset"),
        ))
    }
}

/// Returns a fixed list of buildpacks and counts how often it was asked.
#[derive(Clone)]
struct FakeResolver {
    buildpacks: Vec<Buildpack>,
    calls: Arc<AtomicUsize>,
}

impl FakeResolver {
    fn new(buildpacks: Vec<Buildpack>) -> Self {
        Self {
            buildpacks,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Resolver for FakeResolver {
    async fn resolve(
        &self,
        _references: &[String],
        _cancellation: &CancellationToken,
    ) -> Result<Vec<Buildpack>, ResolveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.buildpacks.clone())
    }
}

/// Extracts with the real extractor, but fails on the given call.
#[derive(Clone)]
struct CountingExtractor {
    calls: Arc<AtomicUsize>,
    fail_on: Option<usize>,
}

impl CountingExtractor {
    fn new(fail_on: Option<usize>) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            fail_on,
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Extractor for CountingExtractor {
    fn extract(&self, archive: &Path, destination: &Path) -> Result<(), ExtractError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if Some(call) == self.fail_on {
            return Err(ExtractError::Unpack(
                archive.to_path_buf(),
                destination.to_path_buf(),
                std::io::Error::other("no space left on device"),
            ));
        }
        TarballExtractor.extract(archive, destination)
    }
}

fn unpacked(root: &TempDir, dir: &str, canonical: &str, original: &str) -> Buildpack {
    let local_dir = root.path().join(dir);
    fs::create_dir_all(local_dir.join("bin")).unwrap();
    fs::write(local_dir.join("bin").join("compile"), "classic compile").unwrap();

    Buildpack::Unpacked(UnpackedBuildpack::new(
        local_dir,
        BuildpackOrigin::new(canonical, original),
    ))
}

fn references(count: usize) -> Vec<String> {
    (0..count).map(|index| format!("buildpack-{index}")).collect()
}

#[tokio::test]
async fn apply_writes_descriptor_with_defaults() {
    let root = tempdir().unwrap();
    let resolver = FakeResolver::new(vec![unpacked(
        &root,
        "nodejs",
        "https://github.com/heroku/heroku-buildpack-nodejs",
        "heroku/nodejs",
    )]);
    let downloader = FakeDownloader::default();
    let shimmer = Shimmer::with_resolver(ShimmerConfig::default(), resolver)
        .downloader(downloader.clone());

    let (buildpacks, ids) = shimmer
        .apply(&CancellationToken::new(), &references(1))
        .await
        .unwrap();

    let downloads = downloader.downloads();
    assert_eq!(downloads.len(), 1);
    assert_eq!(
        downloads[0].0,
        "https://github.com/heroku/cnb-shim/releases/download/v0.2/cnb-shim-v0.2.tgz"
    );

    let local_dir = root.path().join("nodejs");
    assert_eq!(
        fs::read_to_string(local_dir.join("buildpack.toml")).unwrap(),
        indoc! {r#"
            api = "0.4"

            [buildpack]
            id = "github.com/heroku/heroku-buildpack-nodejs"
            version = "0.1"
            name = "heroku/nodejs"

            [[stacks]]
            id = "heroku-18"

            [[stacks]]
            id = "heroku-20"
        "#}
    );

    assert_eq!(buildpacks.len(), 1);
    let shimmed = buildpacks[0].as_shimmed().unwrap();
    assert_eq!(shimmed.buildpack_toml_path(), local_dir.join("buildpack.toml"));
    assert_eq!(
        ids.get("heroku/nodejs").map(String::as_str),
        Some("github.com/heroku/heroku-buildpack-nodejs")
    );
}

#[tokio::test]
async fn apply_overlays_shim_files() {
    let root = tempdir().unwrap();
    let resolver = FakeResolver::new(vec![unpacked(&root, "ruby", "local:ruby", "ruby")]);
    let shimmer = Shimmer::with_resolver(ShimmerConfig::default(), resolver)
        .downloader(FakeDownloader::default());

    shimmer
        .apply(&CancellationToken::new(), &references(1))
        .await
        .unwrap();

    let bin = root.path().join("ruby").join("bin");
    for (path, contents) in SHIM_FILES {
        assert_eq!(
            fs::read_to_string(root.path().join("ruby").join(path)).unwrap(),
            *contents
        );
    }
    assert_eq!(
        fs::read_to_string(bin.join("compile")).unwrap(),
        "classic compile"
    );
}

#[tokio::test]
async fn apply_uses_configured_values() {
    let root = tempdir().unwrap();
    let Buildpack::Unpacked(mut go) = unpacked(&root, "go", "local:go", "Go") else {
        unreachable!()
    };
    go.origin = go.origin.with_requested_version("3.1.4");
    let resolver = FakeResolver::new(vec![Buildpack::Unpacked(go)]);
    let downloader = FakeDownloader::default();
    let config = ShimmerConfig {
        api_version: String::from("0.6"),
        stacks: vec![String::from("heroku-22")],
        shim_version: String::from("0.3"),
        shim_release_url: String::from("https://mirror.example.tld/cnb-shim/"),
    };
    let shimmer = Shimmer::with_resolver(config, resolver).downloader(downloader.clone());
    assert_eq!(shimmer.config().cnb_shim_version(), "0.3");

    shimmer
        .apply(&CancellationToken::new(), &references(1))
        .await
        .unwrap();

    assert_eq!(
        downloader.downloads()[0].0,
        "https://mirror.example.tld/cnb-shim/v0.3/cnb-shim-v0.3.tgz"
    );
    let descriptor = read_descriptor(&root.path().join("go")).unwrap();
    assert_eq!(descriptor.api, "0.6");
    assert_eq!(descriptor.buildpack.id, "local_go");
    assert_eq!(descriptor.buildpack.version, "3.1.4");
    assert_eq!(descriptor.buildpack.name, "Go");
    assert_eq!(descriptor.stacks.len(), 1);
    assert_eq!(descriptor.stacks[0].id, "heroku-22");
}

#[tokio::test]
async fn apply_passes_through_unresolved_buildpacks() {
    let root = tempdir().unwrap();
    let resolver = FakeResolver::new(vec![
        Buildpack::Unresolved(String::from("heroku/procfile")),
        unpacked(&root, "php", "local:php", "php"),
        Buildpack::Unresolved(String::from("docker://example/buildpack")),
    ]);
    let shimmer = Shimmer::with_resolver(ShimmerConfig::default(), resolver)
        .downloader(FakeDownloader::default());

    let (buildpacks, ids) = shimmer
        .apply(&CancellationToken::new(), &references(3))
        .await
        .unwrap();

    assert_eq!(
        buildpacks[0],
        Buildpack::Unresolved(String::from("heroku/procfile"))
    );
    assert!(buildpacks[1].as_shimmed().is_some());
    assert_eq!(
        buildpacks[2],
        Buildpack::Unresolved(String::from("docker://example/buildpack"))
    );
    assert_eq!(ids.len(), 1);
    assert_eq!(ids.get("php").map(String::as_str), Some("local_php"));
}

#[tokio::test]
async fn apply_stops_at_first_failure() {
    let root = tempdir().unwrap();
    let resolver = FakeResolver::new(vec![
        unpacked(&root, "first", "local:first", "first"),
        unpacked(&root, "second", "local:second", "second"),
        unpacked(&root, "third", "local:third", "third"),
    ]);
    let extractor = CountingExtractor::new(Some(2));
    let shimmer = Shimmer::with_resolver(ShimmerConfig::default(), resolver)
        .downloader(FakeDownloader::default())
        .extractor(extractor.clone());

    let error = shimmer
        .apply(&CancellationToken::new(), &references(3))
        .await
        .unwrap_err();

    match error {
        ShimmerError::Overlay(name, _) => assert_eq!(name, "second"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(extractor.calls(), 2);
    assert!(root.path().join("first").join("buildpack.toml").is_file());
    assert!(root.path().join("first").join("bin").join("build").is_file());
    assert!(!root.path().join("third").join("buildpack.toml").exists());
}

#[tokio::test]
async fn apply_removes_shim_archive_after_success() {
    let root = tempdir().unwrap();
    let resolver = FakeResolver::new(vec![unpacked(&root, "a", "local:a", "a")]);
    let downloader = FakeDownloader::default();
    let shimmer =
        Shimmer::with_resolver(ShimmerConfig::default(), resolver).downloader(downloader.clone());

    shimmer
        .apply(&CancellationToken::new(), &references(1))
        .await
        .unwrap();

    let archive = &downloader.downloads()[0].1;
    assert!(archive
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("cnb-shim-"));
    assert!(!archive.exists());
}

#[tokio::test]
async fn apply_removes_shim_archive_after_failure() {
    let root = tempdir().unwrap();
    let resolver = FakeResolver::new(vec![unpacked(&root, "a", "local:a", "a")]);
    let downloader = FakeDownloader::default();
    let shimmer = Shimmer::with_resolver(ShimmerConfig::default(), resolver)
        .downloader(downloader.clone())
        .extractor(CountingExtractor::new(Some(1)));

    let result = shimmer
        .apply(&CancellationToken::new(), &references(1))
        .await;

    assert!(result.is_err());
    assert!(!downloader.downloads()[0].1.exists());
}

#[tokio::test]
async fn fetch_failure_skips_resolution() {
    let root = tempdir().unwrap();
    let resolver = FakeResolver::new(vec![unpacked(&root, "a", "local:a", "a")]);
    let shimmer = Shimmer::with_resolver(ShimmerConfig::default(), resolver.clone())
        .downloader(FailingDownloader);

    let error = shimmer
        .apply(&CancellationToken::new(), &references(1))
        .await
        .unwrap_err();

    assert!(matches!(error, ShimmerError::Fetch(_)));
    assert_eq!(resolver.calls(), 0);
    assert!(!root.path().join("a").join("buildpack.toml").exists());
}

#[tokio::test]
async fn resolver_must_return_one_buildpack_per_reference() {
    let root = tempdir().unwrap();
    let resolver = FakeResolver::new(vec![unpacked(&root, "a", "local:a", "a")]);
    let shimmer = Shimmer::with_resolver(ShimmerConfig::default(), resolver)
        .downloader(FakeDownloader::default());

    let error = shimmer
        .apply(&CancellationToken::new(), &references(2))
        .await
        .unwrap_err();

    match error {
        ShimmerError::ResolvedCountMismatch { expected, actual } => {
            assert_eq!(expected, 2);
            assert_eq!(actual, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!root.path().join("a").join("buildpack.toml").exists());
}

#[tokio::test]
async fn colliding_ids_keep_both_entries() {
    let root = tempdir().unwrap();
    let resolver = FakeResolver::new(vec![
        unpacked(&root, "one", "a:b", "first"),
        unpacked(&root, "two", "a_b", "second"),
    ]);
    let shimmer = Shimmer::with_resolver(ShimmerConfig::default(), resolver)
        .downloader(FakeDownloader::default());

    let (_, ids) = shimmer
        .apply(&CancellationToken::new(), &references(2))
        .await
        .unwrap();

    assert_eq!(ids.get("first").map(String::as_str), Some("a_b"));
    assert_eq!(ids.get("second").map(String::as_str), Some("a_b"));
    assert_eq!(read_descriptor(&root.path().join("two")).unwrap().buildpack.id, "a_b");
}

#[tokio::test]
async fn apply_shims_every_unpacked_buildpack() {
    let root = tempdir().unwrap();
    let resolver = FakeResolver::new(vec![
        unpacked(&root, "ruby", "https://github.com/heroku/heroku-buildpack-ruby", "ruby"),
        Buildpack::Unresolved(String::from("heroku/procfile")),
        unpacked(&root, "python", "https://github.com/heroku/heroku-buildpack-python", "python"),
    ]);
    let shimmer = Shimmer::with_resolver(ShimmerConfig::default(), resolver)
        .downloader(FakeDownloader::default());

    let (buildpacks, ids) = shimmer
        .apply(&CancellationToken::new(), &references(3))
        .await
        .unwrap();

    assert_eq!(buildpacks.len(), 3);
    for (index, dir) in [(0, "ruby"), (2, "python")] {
        let shimmed = buildpacks[index].as_shimmed().unwrap();
        assert_eq!(shimmed.unpacked.local_dir, root.path().join(dir));
        assert!(shimmed.buildpack_toml_path().is_file());
        assert!(shimmed.unpacked.local_dir.join("bin").join("detect").is_file());
    }
    assert_eq!(
        buildpacks[1],
        Buildpack::Unresolved(String::from("heroku/procfile"))
    );

    assert_eq!(ids.len(), 2);
    assert_eq!(
        ids.get("ruby").map(String::as_str),
        Some("github.com/heroku/heroku-buildpack-ruby")
    );
    assert_eq!(
        ids.get("python").map(String::as_str),
        Some("github.com/heroku/heroku-buildpack-python")
    );
}

#[tokio::test]
async fn apply_with_no_references() {
    let downloader = FakeDownloader::default();
    let shimmer = Shimmer::with_resolver(ShimmerConfig::default(), FakeResolver::new(Vec::new()))
        .downloader(downloader.clone());

    let (buildpacks, ids) = shimmer.apply(&CancellationToken::new(), &[]).await.unwrap();

    assert!(buildpacks.is_empty());
    assert!(ids.is_empty());
    assert_eq!(downloader.downloads().len(), 1);
}

#[tokio::test]
async fn apply_respects_cancellation() {
    let root = tempdir().unwrap();
    let resolver = FakeResolver::new(vec![unpacked(&root, "a", "local:a", "a")]);
    let shimmer = Shimmer::with_resolver(ShimmerConfig::default(), resolver.clone())
        .downloader(FakeDownloader::default());
    let cancellation = CancellationToken::new();
    cancellation.cancel();

    let error = shimmer
        .apply(&cancellation, &references(1))
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        ShimmerError::Fetch(libshimmer::fetch::FetchError::Cancelled)
    ));
    assert_eq!(resolver.calls(), 0);
}

#[tokio::test]
async fn shims_local_directories_with_downloaded_shim() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/releases/v0.2/cnb-shim-v0.2.tgz"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(shim_tarball()))
        .expect(1)
        .mount(&server)
        .await;

    let buildpack_dir = tempdir().unwrap();
    fs::create_dir_all(buildpack_dir.path().join("bin")).unwrap();
    fs::write(buildpack_dir.path().join("bin").join("compile"), "compile").unwrap();
    let work_dir = tempdir().unwrap();

    let config = ShimmerConfig {
        shim_release_url: format!("{}/releases", server.uri()),
        ..ShimmerConfig::default()
    };
    let resolver = SourceResolver::new(work_dir.path()).with_source(LocalDirectorySource);
    let shimmer =
        Shimmer::with_resolver(config, resolver).downloader(HttpDownloader::new().max_retries(0));

    let local_reference = buildpack_dir.path().to_string_lossy().to_string();
    let references = vec![local_reference.clone(), String::from("heroku/procfile")];

    let (buildpacks, ids) = shimmer
        .apply(&CancellationToken::new(), &references)
        .await
        .unwrap();

    let shimmed = buildpacks[0].as_shimmed().unwrap();
    assert_eq!(shimmed.unpacked.local_dir, work_dir.path().join("buildpack-0"));
    assert!(shimmed.buildpack_toml_path().is_file());
    assert!(shimmed.unpacked.local_dir.join("bin").join("detect").is_file());
    assert!(shimmed.unpacked.local_dir.join("bin").join("compile").is_file());
    assert!(!buildpack_dir.path().join("buildpack.toml").exists());
    assert_eq!(
        buildpacks[1],
        Buildpack::Unresolved(String::from("heroku/procfile"))
    );

    let descriptor = read_descriptor(&shimmed.unpacked.local_dir).unwrap();
    assert_eq!(descriptor.buildpack.name, local_reference);
    assert_eq!(
        ids.get(&local_reference),
        Some(&descriptor.buildpack.id)
    );
}

#[tokio::test]
async fn apply_twice_into_same_work_dir() {
    let buildpack_dir = tempdir().unwrap();
    fs::create_dir_all(buildpack_dir.path().join("bin")).unwrap();
    fs::write(buildpack_dir.path().join("bin").join("compile"), "compile").unwrap();
    let work_dir = tempdir().unwrap();
    let resolver = SourceResolver::new(work_dir.path()).with_source(LocalDirectorySource);
    let shimmer = Shimmer::with_resolver(ShimmerConfig::default(), resolver)
        .downloader(FakeDownloader::default());
    let references = vec![buildpack_dir.path().to_string_lossy().to_string()];

    shimmer
        .apply(&CancellationToken::new(), &references)
        .await
        .unwrap();
    fs::write(buildpack_dir.path().join("bin").join("compile"), "updated").unwrap();

    let (buildpacks, ids) = shimmer
        .apply(&CancellationToken::new(), &references)
        .await
        .unwrap();

    let shimmed = buildpacks[0].as_shimmed().unwrap();
    assert_eq!(shimmed.unpacked.local_dir, work_dir.path().join("buildpack-0"));
    assert_eq!(
        fs::read_to_string(shimmed.unpacked.local_dir.join("bin").join("compile")).unwrap(),
        "updated"
    );
    assert!(shimmed.buildpack_toml_path().is_file());
    assert_eq!(ids.len(), 1);
}
