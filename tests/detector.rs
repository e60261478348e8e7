#![cfg(unix)]

use std::{path::PathBuf, time::Duration};

use autoparts_api::{
    config::DetectorConfig,
    dto::products::UploadedImage,
    services::diagnose_service::{
        DetectorError, ScratchFile, UNAVAILABLE_MESSAGE, diagnose, run_detector,
    },
};
use uuid::Uuid;

fn scratch_root() -> PathBuf {
    std::env::temp_dir().join(format!("autoparts-detector-test-{}", Uuid::new_v4()))
}

/// Writes a shell script standing in for the Python detector.
fn detector(root: &PathBuf, body: &str, timeout: Duration) -> DetectorConfig {
    std::fs::create_dir_all(root).unwrap();
    let script = root.join("detector.sh");
    std::fs::write(&script, body).unwrap();
    DetectorConfig {
        program: "sh".into(),
        script,
        timeout,
        api_key: Some("test-key".into()),
        scratch_dir: root.join("scratch"),
    }
}

fn photo() -> UploadedImage {
    UploadedImage {
        file_name: "bumper.jpg".into(),
        content_type: "image/jpeg".into(),
        bytes: vec![0xFF, 0xD8, 0xFF, 0xE0],
    }
}

fn scratch_is_empty(config: &DetectorConfig) -> bool {
    std::fs::read_dir(&config.scratch_dir)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(true)
}

#[tokio::test]
async fn detector_result_is_last_json_line() {
    let root = scratch_root();
    let config = detector(
        &root,
        "echo 'warming up'\necho \"{\\\"detected\\\": true, \\\"key\\\": \\\"$GEMINI_API_KEY\\\", \\\"file\\\": \\\"$1\\\"}\"\n",
        Duration::from_secs(10),
    );

    let response = diagnose(&config, Some(photo())).await.unwrap();
    let data = response.data.unwrap();
    assert_eq!(data["detected"], true);
    assert_eq!(data["key"], "test-key");
    assert!(data["file"].as_str().unwrap().ends_with("-bumper.jpg"));
    assert!(scratch_is_empty(&config));

    let _ = std::fs::remove_dir_all(root);
}

#[tokio::test]
async fn non_zero_exit_reports_stderr() {
    let root = scratch_root();
    let config = detector(&root, "echo 'model missing' >&2\nexit 3\n", Duration::from_secs(10));
    let image = root.join("input.jpg");
    std::fs::write(&image, b"x").unwrap();

    let err = run_detector(&config, &image).await.unwrap_err();
    match err {
        DetectorError::Exit { code, stderr } => {
            assert_eq!(code, Some(3));
            assert_eq!(stderr, "model missing");
        }
        other => panic!("unexpected error: {other}"),
    }

    let _ = std::fs::remove_dir_all(root);
}

#[tokio::test]
async fn slow_detector_times_out() {
    let root = scratch_root();
    let config = detector(&root, "sleep 5\necho '{}'\n", Duration::from_millis(200));
    let image = root.join("input.jpg");
    std::fs::write(&image, b"x").unwrap();

    let err = run_detector(&config, &image).await.unwrap_err();
    assert!(matches!(err, DetectorError::Timeout(_)));

    let _ = std::fs::remove_dir_all(root);
}

#[tokio::test]
async fn failures_fall_back_to_empty_diagnosis() {
    let root = scratch_root();
    let config = detector(&root, "echo 'not json'\n", Duration::from_secs(10));

    let response = diagnose(&config, Some(photo())).await.unwrap();
    assert_eq!(response.message, UNAVAILABLE_MESSAGE);
    let data = response.data.unwrap();
    assert_eq!(data["detected"], false);
    assert_eq!(data["products"], serde_json::json!([]));
    assert!(scratch_is_empty(&config));

    let _ = std::fs::remove_dir_all(root);
}

#[tokio::test]
async fn missing_program_falls_back() {
    let root = scratch_root();
    let mut config = detector(&root, "", Duration::from_secs(10));
    config.program = "/nonexistent/python3".into();

    let response = diagnose(&config, Some(photo())).await.unwrap();
    assert_eq!(response.data.unwrap()["detected"], false);

    let _ = std::fs::remove_dir_all(root);
}

#[tokio::test]
async fn empty_upload_is_rejected() {
    let root = scratch_root();
    let config = detector(&root, "echo '{}'\n", Duration::from_secs(10));

    assert!(diagnose(&config, None).await.is_err());
    let empty = UploadedImage {
        bytes: Vec::new(),
        ..photo()
    };
    assert!(diagnose(&config, Some(empty)).await.is_err());

    let _ = std::fs::remove_dir_all(root);
}

#[tokio::test]
async fn cancelled_request_still_removes_scratch_image() {
    let root = scratch_root();
    let config = detector(&root, "sleep 30\necho '{}'\n", Duration::from_secs(60));
    let scratch_dir = config.scratch_dir.clone();

    let task = tokio::spawn(async move { diagnose(&config, Some(photo())).await });

    // Wait until the upload has been written, then drop the request mid-detection.
    let mut written = false;
    for _ in 0..100 {
        if std::fs::read_dir(&scratch_dir).is_ok_and(|mut e| e.next().is_some()) {
            written = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(written, "scratch image was never written");
    // Let the write finish so the detector is the one running.
    tokio::time::sleep(Duration::from_millis(200)).await;

    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());
    assert!(std::fs::read_dir(&scratch_dir).unwrap().next().is_none());

    let _ = std::fs::remove_dir_all(root);
}

#[tokio::test]
async fn scratch_file_is_removed_on_drop() {
    let root = scratch_root();
    let scratch = ScratchFile::create(&root, &photo()).await.unwrap();
    let path = scratch.path().to_path_buf();
    assert!(path.exists());
    assert!(path.file_name().unwrap().to_string_lossy().ends_with("-bumper.jpg"));

    drop(scratch);
    assert!(!path.exists());

    let _ = std::fs::remove_dir_all(root);
}
