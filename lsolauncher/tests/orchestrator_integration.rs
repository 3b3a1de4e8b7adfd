//! End-to-end install flows through the orchestrator with fake downloads.

use std::collections::HashMap;
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

use lsolauncher::component::{ArchiveLayout, Catalog, Component, PipelineShape};
use lsolauncher::config::{InstallRootPreference, LocalRegistry};
use lsolauncher::discovery::{Discovery, FileStore};
use lsolauncher::drives::StaticDrives;
use lsolauncher::manager::{
    DirectCopy, Downloader, ErrorClass, InstallError, ManagerConfig, Pipeline, PipelineError,
    PipelineResult, ProgressCounters, Stage,
};
use lsolauncher::orchestrator::{
    DirectoryPrompt, InstallEvent, InstallOptions, InstallOutcome, NetworkProbe, Orchestrator,
};

const TSO_URL: &str = "https://downloads.test/tso.zip";
const LSO_URL: &str = "https://downloads.test/lso.zip";
const RMS_URL: &str = "https://downloads.test/rms.zip";

// ============================================================================
// Fakes
// ============================================================================

/// Serves payloads by URL and counts calls.
#[derive(Default)]
struct FakeDownloader {
    payloads: HashMap<String, Vec<u8>>,
    calls: AtomicUsize,
    delay: Duration,
}

impl FakeDownloader {
    fn serve(mut self, url: &str, bytes: Vec<u8>) -> Self {
        self.payloads.insert(url.to_string(), bytes);
        self
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Downloader for FakeDownloader {
    fn download(&self, url: &str, dest: &Path, counters: &ProgressCounters) -> PipelineResult<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        let bytes = self.payloads.get(url).ok_or_else(|| PipelineError::NetworkFailure {
            url: url.to_string(),
            reason: "404 Not Found".to_string(),
        })?;
        counters.set_expected(bytes.len() as u64);
        fs::write(dest, bytes).map_err(|e| PipelineError::io(dest, e))?;
        counters.add_received(bytes.len() as u64);
        Ok(bytes.len() as u64)
    }
}

/// Lets tests keep a handle on a downloader owned by the pipeline.
struct Shared(Arc<FakeDownloader>);

impl Downloader for Shared {
    fn download(&self, url: &str, dest: &Path, counters: &ProgressCounters) -> PipelineResult<u64> {
        self.0.download(url, dest, counters)
    }
}

struct FixedProbe(bool);

impl NetworkProbe for FixedProbe {
    fn is_online(&self) -> BoxFuture<'_, bool> {
        let online = self.0;
        async move { online }.boxed()
    }
}

/// Answers with a fixed directory and records that it was asked.
struct FixedPrompt {
    answer: Option<PathBuf>,
    asked: Mutex<Vec<String>>,
}

impl DirectoryPrompt for FixedPrompt {
    fn choose_directory(&self, component: &Component, _suggested: Option<&Path>) -> Option<PathBuf> {
        self.asked.lock().push(component.code().to_string());
        self.answer.clone()
    }
}

// ============================================================================
// Fixtures
// ============================================================================

fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in entries {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

fn tso_zip() -> Vec<u8> {
    zip_bytes(&[
        ("The Sims Online/TSOClient/TSOClient.exe", b"MZ"),
        ("The Sims Online/TSOClient/packingslips/avatar.dat", b"data"),
    ])
}

fn lso_zip() -> Vec<u8> {
    zip_bytes(&[
        ("LegacySO Client/LegacySO.exe", b"MZ"),
        ("LegacySO Client/Content/config.ini", b"[x]"),
    ])
}

fn rms_zip() -> Vec<u8> {
    zip_bytes(&[
        ("FreeSO Remesh Package/MeshReplace/remeshes-4.json", b"{}"),
        ("FreeSO Remesh Package/MeshReplace/chair.obj", b"v 0 0 0"),
    ])
}

fn catalog() -> Catalog {
    Catalog::new(vec![
        Component::new("TSO", "The Sims Online")
            .with_network(true)
            .with_executables(["TSOClient/TSOClient.exe"])
            .with_layout(ArchiveLayout::nested("The Sims Online"))
            .with_download_url(TSO_URL),
        Component::new("LSO", "LegacySO")
            .with_dependencies(["TSO"])
            .with_network(true)
            .with_executables(["LegacySO.exe"])
            .with_layout(ArchiveLayout::nested("LegacySO Client"))
            .with_download_url(LSO_URL)
            .with_install_dir_name("LegacySO"),
        Component::new("RMS", "Remesh Package")
            .with_dependencies(["LSO"])
            .with_network(true)
            .with_shape(PipelineShape::SimpleDrop {
                parent: "LSO".to_string(),
                subdir: "Content/MeshReplace".into(),
                also_into: Vec::new(),
            })
            .with_executables(["remeshes-*.json"])
            .with_layout(ArchiveLayout::nested("FreeSO Remesh Package/MeshReplace"))
            .with_download_url(RMS_URL),
    ])
    .unwrap()
}

struct Harness {
    temp: TempDir,
    downloader: Arc<FakeDownloader>,
    prompt: Arc<FixedPrompt>,
    orchestrator: Orchestrator,
}

impl Harness {
    fn games(&self) -> PathBuf {
        self.temp.path().join("games")
    }

    fn scratch_root(&self) -> PathBuf {
        self.temp.path().join("scratch")
    }

    fn registry(&self) -> LocalRegistry {
        LocalRegistry::new(self.temp.path().join("launcher.ini"))
    }

    fn scratch_is_empty(&self) -> bool {
        match fs::read_dir(self.scratch_root()) {
            Ok(mut entries) => entries.next().is_none(),
            Err(_) => true,
        }
    }
}

struct HarnessBuilder {
    downloader: FakeDownloader,
    online: bool,
    install_root: Option<InstallRootPreference>,
    prompt_answer: Option<PathBuf>,
}

impl HarnessBuilder {
    fn new() -> Self {
        Self {
            downloader: FakeDownloader::default()
                .serve(TSO_URL, tso_zip())
                .serve(LSO_URL, lso_zip())
                .serve(RMS_URL, rms_zip()),
            online: true,
            install_root: None,
            prompt_answer: None,
        }
    }

    fn downloader(mut self, downloader: FakeDownloader) -> Self {
        self.downloader = downloader;
        self
    }

    fn offline(mut self) -> Self {
        self.online = false;
        self
    }

    fn install_root(mut self, preference: InstallRootPreference) -> Self {
        self.install_root = Some(preference);
        self
    }

    fn prompt_answer(mut self, answer: Option<PathBuf>) -> Self {
        self.prompt_answer = answer;
        self
    }

    fn build(self) -> Harness {
        let temp = TempDir::new().unwrap();
        let games = temp.path().join("games");
        fs::create_dir_all(&games).unwrap();

        let downloader = Arc::new(self.downloader);
        let prompt = Arc::new(FixedPrompt {
            answer: self.prompt_answer,
            asked: Mutex::new(Vec::new()),
        });

        let config = ManagerConfig::new()
            .with_temp_dir(temp.path().join("scratch"))
            .with_progress_interval(Duration::from_millis(5))
            .with_install_root(
                self.install_root
                    .unwrap_or_else(|| InstallRootPreference::Fixed(games.clone())),
            );
        let pipeline = Pipeline::new(config)
            .with_downloader(Arc::new(Shared(Arc::clone(&downloader))))
            .with_copier(Arc::new(DirectCopy));

        let drives = Arc::new(StaticDrives(Vec::new()));
        let discovery = Discovery::new(
            Arc::new(FileStore::new(temp.path().join("registry.ini"))),
            LocalRegistry::new(temp.path().join("launcher.ini")),
            drives.clone(),
        );

        let orchestrator = Orchestrator::new(catalog(), discovery, pipeline)
            .with_probe(Arc::new(FixedProbe(self.online)))
            .with_prompt(prompt.clone())
            .with_drives(drives)
            .with_components_dir(temp.path().join("components"));

        Harness {
            temp,
            downloader,
            prompt,
            orchestrator,
        }
    }
}

fn harness() -> Harness {
    HarnessBuilder::new().build()
}

// ============================================================================
// Single installs
// ============================================================================

#[tokio::test]
async fn test_install_then_resolve_round_trip() {
    let h = harness();
    let expected = h.games().join("The Sims Online");

    let outcome = h
        .orchestrator
        .install("TSO", InstallOptions::standalone())
        .await
        .unwrap();

    assert_eq!(outcome, InstallOutcome::Installed(Some(expected.clone())));
    assert!(expected.join("TSOClient/TSOClient.exe").is_file());
    assert_eq!(h.orchestrator.installed().get("TSO"), Some(expected.clone()));
    assert_eq!(h.registry().get("TSO"), Some(expected.clone()));
    assert!(!h.orchestrator.is_installing("TSO"));
    assert!(h.scratch_is_empty());

    // A fresh refresh finds the same place again, twice over.
    h.orchestrator.refresh().await;
    assert_eq!(h.orchestrator.installed().get("TSO"), Some(expected.clone()));
    h.orchestrator.refresh().await;
    assert_eq!(h.orchestrator.installed().get("TSO"), Some(expected));
}

#[tokio::test]
async fn test_missing_dependency_runs_no_pipeline() {
    let h = harness();

    let err = h
        .orchestrator
        .install("LSO", InstallOptions::standalone())
        .await
        .unwrap_err();

    match &err {
        InstallError::MissingDependency { name, missing } => {
            assert_eq!(name, "LegacySO");
            assert_eq!(missing, &vec!["The Sims Online".to_string()]);
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(err.class().exit_code(), 13);
    assert_eq!(h.downloader.calls(), 0);
    assert!(h.orchestrator.installed().get("LSO").is_none());
}

#[tokio::test]
async fn test_dependency_order_lets_dependent_install() {
    let h = harness();

    h.orchestrator
        .install("TSO", InstallOptions::standalone())
        .await
        .unwrap();
    let outcome = h
        .orchestrator
        .install("LSO", InstallOptions::standalone())
        .await
        .unwrap();

    let lso = h.games().join("LegacySO");
    assert_eq!(outcome, InstallOutcome::Installed(Some(lso.clone())));
    assert!(lso.join("LegacySO.exe").is_file());
    assert!(lso.join("Content/config.ini").is_file());
}

#[tokio::test]
async fn test_concurrent_install_of_same_component_is_rejected() {
    let h = HarnessBuilder::new()
        .downloader(
            FakeDownloader::default()
                .serve(TSO_URL, tso_zip())
                .with_delay(Duration::from_millis(200)),
        )
        .build();

    let (first, second) = tokio::join!(
        h.orchestrator.install("TSO", InstallOptions::standalone()),
        h.orchestrator.install("TSO", InstallOptions::standalone()),
    );

    let results = [first, second];
    let installed = results
        .iter()
        .filter(|r| matches!(r, Ok(InstallOutcome::Installed(_))))
        .count();
    let rejected = results
        .iter()
        .filter(|r| matches!(r, Err(InstallError::AlreadyInstalling { .. })))
        .count();
    assert_eq!((installed, rejected), (1, 1));
    assert_eq!(h.downloader.calls(), 1);
}

#[tokio::test]
async fn test_second_standalone_install_reports_already_installed() {
    let h = harness();
    h.orchestrator
        .install("TSO", InstallOptions::standalone())
        .await
        .unwrap();

    let err = h
        .orchestrator
        .install("TSO", InstallOptions::standalone())
        .await
        .unwrap_err();

    assert!(matches!(err, InstallError::AlreadyInstalled { .. }));
    assert!(err.is_informational());
    assert_eq!(err.class(), ErrorClass::AlreadyInstalled);
    assert_eq!(h.downloader.calls(), 1);
}

#[tokio::test]
async fn test_offline_install_needs_network() {
    let h = HarnessBuilder::new().offline().build();

    let err = h
        .orchestrator
        .install("TSO", InstallOptions::standalone())
        .await
        .unwrap_err();

    assert!(matches!(err, InstallError::NoInternet { .. }));
    assert_eq!(err.class().exit_code(), 10);
    assert_eq!(h.downloader.calls(), 0);
}

#[tokio::test]
async fn test_unknown_component() {
    let h = harness();
    let err = h
        .orchestrator
        .install("Nope", InstallOptions::standalone())
        .await
        .unwrap_err();
    assert!(matches!(err, InstallError::UnknownComponent(ref code) if code == "Nope"));
}

// ============================================================================
// Failing payloads
// ============================================================================

async fn assert_payload_rejected(payload: Vec<u8>) {
    let h = HarnessBuilder::new()
        .downloader(FakeDownloader::default().serve(TSO_URL, payload))
        .build();
    let mut events = h.orchestrator.subscribe();

    let err = h
        .orchestrator
        .install("TSO", InstallOptions::standalone())
        .await
        .unwrap_err();

    match &err {
        InstallError::Pipeline { source, .. } => {
            assert!(matches!(source, PipelineError::ArchiveCorrupt { .. }), "{:?}", source)
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(err.class(), ErrorClass::Validation);
    assert!(h.orchestrator.installed().get("TSO").is_none());
    assert!(h.registry().get("TSO").is_none());
    assert!(!h.games().join("The Sims Online").exists());
    assert!(h.scratch_is_empty());
    assert!(!h.orchestrator.is_installing("TSO"));

    let mut failed = false;
    while let Ok(event) = events.try_recv() {
        if let InstallEvent::Failed { class, .. } = event {
            assert_eq!(class, ErrorClass::Validation);
            failed = true;
        }
    }
    assert!(failed, "a Failed event is broadcast");
}

#[tokio::test]
async fn test_empty_payload_is_rejected() {
    assert_payload_rejected(Vec::new()).await;
}

#[tokio::test]
async fn test_non_zip_payload_is_rejected() {
    assert_payload_rejected(b"<html>Service Unavailable</html>".to_vec()).await;
}

#[tokio::test]
async fn test_archive_without_expected_layout_is_rejected() {
    assert_payload_rejected(zip_bytes(&[("TSOClient/TSOClient.exe", b"MZ")])).await;
}

#[tokio::test]
async fn test_download_failure_is_network_class() {
    let h = HarnessBuilder::new()
        .downloader(FakeDownloader::default())
        .build();

    let err = h
        .orchestrator
        .install("TSO", InstallOptions::standalone())
        .await
        .unwrap_err();

    assert_eq!(err.class(), ErrorClass::Network);
    assert!(err.to_string().contains("The Sims Online"));
    assert!(h.scratch_is_empty());
}

// ============================================================================
// Target selection
// ============================================================================

#[tokio::test]
async fn test_target_dir_option_wins() {
    let h = harness();
    let custom = h.temp.path().join("elsewhere");

    let outcome = h
        .orchestrator
        .install("TSO", InstallOptions::standalone().with_target_dir(&custom))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        InstallOutcome::Installed(Some(custom.join("The Sims Online")))
    );
}

#[tokio::test]
async fn test_ask_preference_uses_prompt() {
    let temp_answer = TempDir::new().unwrap();
    let h = HarnessBuilder::new()
        .install_root(InstallRootPreference::Ask)
        .prompt_answer(Some(temp_answer.path().to_path_buf()))
        .build();

    let outcome = h
        .orchestrator
        .install("TSO", InstallOptions::standalone())
        .await
        .unwrap();

    assert_eq!(
        outcome,
        InstallOutcome::Installed(Some(temp_answer.path().join("The Sims Online")))
    );
    assert_eq!(h.prompt.asked.lock().as_slice(), ["TSO".to_string()]);
}

#[tokio::test]
async fn test_cancelled_prompt_is_a_no_op() {
    let h = HarnessBuilder::new()
        .install_root(InstallRootPreference::Ask)
        .prompt_answer(None)
        .build();

    let outcome = h
        .orchestrator
        .install("TSO", InstallOptions::standalone())
        .await
        .unwrap();

    assert_eq!(outcome, InstallOutcome::Cancelled);
    assert_eq!(h.downloader.calls(), 0);
    assert!(!h.orchestrator.is_installing("TSO"));
}

#[tokio::test]
async fn test_auto_preference_outside_windows_uses_components_dir() {
    if cfg!(windows) {
        return;
    }
    let h = HarnessBuilder::new()
        .install_root(InstallRootPreference::Auto)
        .build();

    let outcome = h
        .orchestrator
        .install("TSO", InstallOptions::standalone())
        .await
        .unwrap();

    assert_eq!(
        outcome,
        InstallOutcome::Installed(Some(h.temp.path().join("components/The Sims Online")))
    );
}

// ============================================================================
// Overrides
// ============================================================================

#[tokio::test]
async fn test_override_records_existing_install() {
    let h = harness();
    let existing = h.temp.path().join("old/The Sims Online");
    fs::create_dir_all(existing.join("TSOClient")).unwrap();
    fs::write(existing.join("TSOClient/TSOClient.exe"), b"MZ").unwrap();

    let outcome = h
        .orchestrator
        .install(
            "TSO",
            InstallOptions::standalone().with_override(existing.join("TSOClient/TSOClient.exe")),
        )
        .await
        .unwrap();

    assert_eq!(outcome, InstallOutcome::Overridden(existing.clone()));
    assert_eq!(h.orchestrator.installed().get("TSO"), Some(existing.clone()));
    assert_eq!(h.registry().get("TSO"), Some(existing));
    assert_eq!(h.downloader.calls(), 0);
}

#[tokio::test]
async fn test_override_with_invalid_path_is_rejected() {
    let h = harness();
    let empty = h.temp.path().join("empty");
    fs::create_dir_all(&empty).unwrap();

    let err = h
        .orchestrator
        .install("TSO", InstallOptions::standalone().with_override(&empty))
        .await
        .unwrap_err();

    assert!(matches!(err, InstallError::InvalidOverride { .. }));
    assert_eq!(err.class(), ErrorClass::Validation);
    assert!(h.orchestrator.installed().get("TSO").is_none());
}

// ============================================================================
// Drop-ins and batches
// ============================================================================

#[tokio::test]
async fn test_drop_in_lands_in_parent() {
    let h = harness();
    for code in ["TSO", "LSO"] {
        h.orchestrator
            .install(code, InstallOptions::standalone())
            .await
            .unwrap();
    }

    let outcome = h
        .orchestrator
        .install("RMS", InstallOptions::standalone())
        .await
        .unwrap();

    let mesh = h.games().join("LegacySO/Content/MeshReplace");
    assert_eq!(outcome, InstallOutcome::Installed(Some(mesh.clone())));
    assert!(mesh.join("remeshes-4.json").is_file());
    assert!(mesh.join("chair.obj").is_file());
    // The client's own content is kept.
    assert!(h.games().join("LegacySO/Content/config.ini").is_file());
}

#[tokio::test]
async fn test_drop_in_ignores_target_dir() {
    let h = harness();
    for code in ["TSO", "LSO"] {
        h.orchestrator
            .install(code, InstallOptions::standalone())
            .await
            .unwrap();
    }
    let elsewhere = h.temp.path().join("elsewhere");

    let outcome = h
        .orchestrator
        .install("RMS", InstallOptions::standalone().with_target_dir(&elsewhere))
        .await
        .unwrap();

    let mesh = h.games().join("LegacySO/Content/MeshReplace");
    assert_eq!(outcome, InstallOutcome::Installed(Some(mesh.clone())));
    assert!(mesh.join("remeshes-4.json").is_file());
    assert!(!elsewhere.exists());
}

#[tokio::test]
async fn test_full_install_batch() {
    let h = harness();
    let mut events = h.orchestrator.subscribe();

    let report = h
        .orchestrator
        .install_batch("LSO", Some(h.games()))
        .await
        .unwrap();

    assert!(report.is_success(), "{:?}", report);
    assert_eq!(report.installed, vec!["TSO", "LSO", "RMS"]);
    assert!(report.skipped.is_empty());
    assert!(h
        .games()
        .join("LegacySO/Content/MeshReplace/remeshes-4.json")
        .is_file());

    let mut done = Vec::new();
    let mut saw_download = false;
    while let Ok(event) = events.try_recv() {
        match event {
            InstallEvent::Done { component, .. } => done.push(component),
            InstallEvent::Progress { stage, .. } if stage == Stage::Downloading => {
                saw_download = true
            }
            _ => {}
        }
    }
    assert_eq!(done, vec!["TSO", "LSO", "RMS"]);
    assert!(saw_download);

    // Running the batch again installs nothing.
    let again = h
        .orchestrator
        .install_batch("LSO", Some(h.games()))
        .await
        .unwrap();
    assert!(again.installed.is_empty());
    assert_eq!(again.skipped, vec!["TSO", "LSO", "RMS"]);
    assert_eq!(h.downloader.calls(), 3);
}

#[tokio::test]
async fn test_batch_keeps_going_after_a_failure() {
    let h = HarnessBuilder::new()
        .downloader(FakeDownloader::default().serve(TSO_URL, tso_zip()))
        .build();

    let report = h
        .orchestrator
        .install_batch("LSO", Some(h.games()))
        .await
        .unwrap();

    assert_eq!(report.installed, vec!["TSO"]);
    let failed: Vec<&str> = report.failed.iter().map(|(c, _)| c.as_str()).collect();
    assert_eq!(failed, vec!["LSO", "RMS"]);
    assert_eq!(report.first_failure_class(), Some(ErrorClass::Network));
    assert!(!report.is_success());
}
