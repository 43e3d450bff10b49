use chromium_updater::core::UpdaterError;
use chromium_updater::install::{InstalledVersionRecord, LOCK_FILE_NAME};
use chromium_updater::release::GithubReleaseIndex;
use chromium_updater::test_utils::fixtures::release_json;
use chromium_updater::test_utils::{FakeArchiveTool, StaticProcessInspector, init_test_logging};
use chromium_updater::updater::{UpdateOrchestrator, UpdateOutcome, UpdateState};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{FileAssert, RELEASES_PATH, TestInstall, dir_entries};

const ROOT_V12: &str = "ungoogled-chromium_12.3.0-1.1_windows";
const ROOT_V13: &str = "ungoogled-chromium_13.0.1-1.1_windows";

async fn serve_release(env: &TestInstall, id: u64, tag: &str, asset: &str) {
    Mock::given(method("GET"))
        .and(path(RELEASES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            release_json(id, "Ungoogled Chromium", tag, &[(id * 10, asset)], &env.download_base()),
            release_json(id - 1, "Chromium stable", tag, &[(id * 10 - 1, asset)], &env.download_base()),
        ])))
        .mount(&env.server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/download/{asset}")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"7z\xbc\xaf\x27\x1c archive".to_vec()))
        .mount(&env.server)
        .await;
}

fn orchestrator(
    env: &TestInstall,
    archive_tool: FakeArchiveTool,
    processes: StaticProcessInspector,
) -> UpdateOrchestrator {
    let config = env.config();
    let releases = Arc::new(GithubReleaseIndex::new(&config).unwrap());
    UpdateOrchestrator::new(config, releases, Arc::new(processes), Arc::new(archive_tool))
}

fn v12_payload() -> FakeArchiveTool {
    FakeArchiveTool::for_payload(
        ROOT_V12,
        "12.3.0",
        &[("chrome.exe", "chrome 12"), ("locales/en-US.pak", "en-US 12")],
    )
}

#[tokio::test]
async fn test_fresh_install() {
    init_test_logging(None);
    let env = TestInstall::new().await.unwrap();
    serve_release(&env, 500, "v12.3.0-1.1", "ungoogled-12.3.0-win64.7z").await;

    let mut updater = orchestrator(&env, v12_payload(), StaticProcessInspector::default());
    let outcome = updater.run().await.unwrap();

    match outcome {
        UpdateOutcome::Updated { previous_release_id, record } => {
            assert_eq!(previous_release_id, 0);
            assert_eq!(record.release_id, 500);
            assert_eq!(record.tag_version, "12.3.0");
            assert_eq!(record.asset_name, "ungoogled-12.3.0-win64.7z");
            assert!(record.archive_sha256.unwrap().starts_with("sha256:"));
        }
        other => panic!("expected an update, got {other:?}"),
    }
    assert_eq!(updater.state(), UpdateState::Done);

    let install_dir = env.install_dir();
    FileAssert::equals(install_dir.join("chrome.exe"), "chrome 12");
    FileAssert::equals(install_dir.join("locales").join("en-US.pak"), "en-US 12");
    FileAssert::exists(install_dir.join("12.3.0.manifest"));
    FileAssert::not_exists(install_dir.join("zipped_tmp.7z"));
    FileAssert::not_exists(install_dir.join(ROOT_V12));
    assert_eq!(
        dir_entries(install_dir),
        vec![LOCK_FILE_NAME, "12.3.0.manifest", "chrome.exe", "github_asset_info", "locales"]
    );

    let record = InstalledVersionRecord::load(&install_dir.join("github_asset_info")).unwrap().unwrap();
    assert_eq!(record.release_id, 500);
    assert_eq!(record.tag_name, "v12.3.0-1.1");
}

#[tokio::test]
async fn test_second_run_is_up_to_date() {
    let env = TestInstall::new().await.unwrap();
    serve_release(&env, 500, "v12.3.0-1.1", "ungoogled-12.3.0-win64.7z").await;

    orchestrator(&env, v12_payload(), StaticProcessInspector::default()).run().await.unwrap();
    let chrome = env.install_dir().join("chrome.exe");
    let modified = std::fs::metadata(&chrome).unwrap().modified().unwrap();

    let tool = v12_payload();
    let mut updater = orchestrator(&env, tool, StaticProcessInspector::default());
    let outcome = updater.run().await.unwrap();

    assert!(matches!(outcome, UpdateOutcome::UpToDate { release_id: 500, .. }));
    assert_eq!(updater.state(), UpdateState::UpToDate);
    assert_eq!(env.requests_to("/download/ungoogled-12.3.0-win64.7z").await, 1);
    assert_eq!(env.requests_to(RELEASES_PATH).await, 2);
    assert_eq!(std::fs::metadata(&chrome).unwrap().modified().unwrap(), modified);
}

#[tokio::test]
async fn test_newer_release_replaces_previous_files() {
    let env = TestInstall::new().await.unwrap();
    serve_release(&env, 500, "v12.3.0-1.1", "ungoogled-12.3.0-win64.7z").await;
    orchestrator(&env, v12_payload(), StaticProcessInspector::default()).run().await.unwrap();

    env.server.reset().await;
    serve_release(&env, 600, "v13.0.1-1.1", "ungoogled-13.0.1-win64.7z").await;
    let v13 = FakeArchiveTool::for_payload(ROOT_V13, "13.0.1", &[("chrome.exe", "chrome 13")]);

    let outcome = orchestrator(&env, v13, StaticProcessInspector::default()).run().await.unwrap();

    assert!(matches!(outcome, UpdateOutcome::Updated { previous_release_id: 500, .. }));
    let install_dir = env.install_dir();
    FileAssert::equals(install_dir.join("chrome.exe"), "chrome 13");
    FileAssert::not_exists(install_dir.join("locales"));
    FileAssert::not_exists(install_dir.join("12.3.0.manifest"));
    FileAssert::exists(install_dir.join("13.0.1.manifest"));

    let record = InstalledVersionRecord::load(&install_dir.join("github_asset_info")).unwrap().unwrap();
    assert_eq!(record.release_id, 600);
}

#[tokio::test]
async fn test_manifest_mismatch_leaves_install_untouched() {
    let env = TestInstall::new().await.unwrap();
    serve_release(&env, 500, "v12.3.0-1.1", "ungoogled-12.3.0-win64.7z").await;
    env.write_installed("chrome.exe", "chrome 11").unwrap();
    env.write_installed("locales/en-US.pak", "en-US 11").unwrap();

    // The archive carries a manifest for a different version than the tag.
    let wrong = FakeArchiveTool::for_payload(ROOT_V12, "12.2.9", &[("chrome.exe", "chrome 12")]);
    let mut updater = orchestrator(&env, wrong, StaticProcessInspector::default());
    let err = updater.run().await.unwrap_err();

    assert!(matches!(
        err.downcast_ref::<UpdaterError>(),
        Some(UpdaterError::CorruptArchive { .. })
    ));
    assert_eq!(updater.state(), UpdateState::Failed);

    let install_dir = env.install_dir();
    FileAssert::equals(install_dir.join("chrome.exe"), "chrome 11");
    FileAssert::equals(install_dir.join("locales").join("en-US.pak"), "en-US 11");
    FileAssert::not_exists(install_dir.join("zipped_tmp.7z"));
    FileAssert::not_exists(install_dir.join("github_asset_info"));
    assert_eq!(dir_entries(install_dir), vec![LOCK_FILE_NAME, "chrome.exe", "locales"]);
}

#[tokio::test]
async fn test_running_browser_blocks_before_network() {
    let env = TestInstall::new().await.unwrap();
    serve_release(&env, 500, "v12.3.0-1.1", "ungoogled-12.3.0-win64.7z").await;
    let chrome = env.write_installed("chrome.exe", "chrome 11").unwrap();

    let mut updater = orchestrator(&env, v12_payload(), StaticProcessInspector::running(&chrome));
    let err = updater.run().await.unwrap_err();

    assert!(matches!(
        err.downcast_ref::<UpdaterError>(),
        Some(UpdaterError::AlreadyRunning { .. })
    ));
    assert!(env.server.received_requests().await.unwrap_or_default().is_empty());
    FileAssert::equals(&chrome, "chrome 11");
    FileAssert::not_exists(env.install_dir().join(LOCK_FILE_NAME));
}

#[tokio::test]
async fn test_browser_elsewhere_does_not_block() {
    let env = TestInstall::new().await.unwrap();
    serve_release(&env, 500, "v12.3.0-1.1", "ungoogled-12.3.0-win64.7z").await;
    let other = env.root().join("Other Chromium").join("chrome.exe");

    let outcome = orchestrator(&env, v12_payload(), StaticProcessInspector::running(&other))
        .run()
        .await
        .unwrap();

    assert!(matches!(outcome, UpdateOutcome::Updated { .. }));
}

#[tokio::test]
async fn test_no_matching_asset_is_not_found() {
    let env = TestInstall::new().await.unwrap();
    serve_release(&env, 500, "v12.3.0-1.1", "ungoogled-12.3.0-linux.tar.xz").await;

    let err = orchestrator(&env, v12_payload(), StaticProcessInspector::default())
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err.downcast_ref::<UpdaterError>(), Some(UpdaterError::NotFound { .. })));
    assert_eq!(env.requests_to("/download/ungoogled-12.3.0-linux.tar.xz").await, 0);
}

#[tokio::test]
async fn test_index_server_error_is_network_error() {
    let env = TestInstall::new().await.unwrap();
    Mock::given(method("GET"))
        .and(path(RELEASES_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&env.server)
        .await;

    let err = orchestrator(&env, v12_payload(), StaticProcessInspector::default())
        .run()
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<UpdaterError>(),
        Some(UpdaterError::NetworkError { .. })
    ));
}

#[tokio::test]
async fn test_failed_download_leaves_no_archive() {
    let env = TestInstall::new().await.unwrap();
    Mock::given(method("GET"))
        .and(path(RELEASES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([release_json(
            500,
            "Ungoogled Chromium",
            "v12.3.0-1.1",
            &[(5000, "ungoogled-12.3.0-win64.7z")],
            &env.download_base(),
        )])))
        .mount(&env.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/download/ungoogled-12.3.0-win64.7z"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&env.server)
        .await;

    let err = orchestrator(&env, v12_payload(), StaticProcessInspector::default())
        .run()
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<UpdaterError>(),
        Some(UpdaterError::NetworkError { .. })
    ));
    FileAssert::not_exists(env.install_dir().join("zipped_tmp.7z"));
    FileAssert::not_exists(env.install_dir().join("github_asset_info"));
}
