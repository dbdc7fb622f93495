#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use facevote::{
    common::{Config, VoteError},
    core::{BiometricComparator, Encoding},
    service::{build_state, router, AppState},
    Result,
};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tower::ServiceExt;

pub const BOUNDARY: &str = "facevote-test-boundary";
pub const UPLOAD_LIMIT: usize = 64 * 1024;

/// Stand-in for the face model. Images are text: `face:alice` holds one
/// face, `face:alice,bob` two, `face:` none, and `broken` makes the model fail.
pub struct FakeComparator;

impl FakeComparator {
    fn encoding_for(label: &str) -> Encoding {
        let mut encoding: Encoding = label.bytes().take(8).map(f32::from).collect();
        encoding.resize(8, 0.0);
        encoding
    }
}

impl BiometricComparator for FakeComparator {
    fn encode(&self, image: &[u8]) -> Result<Vec<Encoding>> {
        let text = std::str::from_utf8(image)
            .map_err(|_| VoteError::Comparator("not a test image".into()))?;

        let Some(labels) = text.strip_prefix("face:") else {
            return Err(VoteError::Model(format!("cannot decode {:?}", text)));
        };

        Ok(labels
            .split(',')
            .filter(|label| !label.is_empty())
            .map(Self::encoding_for)
            .collect())
    }
}

/// [`FakeComparator`] that parks its first `encode` call until released,
/// so a test can act while a verification is in flight.
pub struct GatedComparator {
    armed: AtomicBool,
    entered: Mutex<Sender<()>>,
    release: Mutex<Receiver<()>>,
}

/// Test side of a [`GatedComparator`].
pub struct Gate {
    pub entered: Receiver<()>,
    pub release: Sender<()>,
}

impl GatedComparator {
    pub fn new() -> (Self, Gate) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let comparator = Self {
            armed: AtomicBool::new(true),
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        };
        (comparator, Gate { entered: entered_rx, release: release_tx })
    }
}

impl BiometricComparator for GatedComparator {
    fn encode(&self, image: &[u8]) -> Result<Vec<Encoding>> {
        if self.armed.swap(false, Ordering::SeqCst) {
            let _ = self.entered.lock().unwrap().send(());
            let _ = self.release.lock().unwrap().recv();
        }
        FakeComparator.encode(image)
    }
}

pub struct TestApp {
    pub dir: TempDir,
    pub state: AppState,
    pub router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_comparator(Arc::new(FakeComparator))
    }

    pub fn with_comparator(comparator: Arc<dyn BiometricComparator>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("stored_photos")).unwrap();
        fs::create_dir_all(root.join("build")).unwrap();
        fs::write(root.join("build/index.html"), "<html>facevote</html>").unwrap();
        fs::write(root.join("build/app.js"), "console.log('app');").unwrap();

        let config = Config::from_toml(&format!(
            r#"
            [server]
            static_dir = "{root}/build"

            [storage]
            database_path = "{root}/voters.db"
            photo_root = "{root}"
            capture_dir = "{root}/temp"

            [models]
            detector_path = "unused.onnx"
            recognizer_path = "unused.onnx"

            [verification]
            tolerance = 0.6
            max_upload_bytes = {limit}
            "#,
            root = root.display(),
            limit = UPLOAD_LIMIT,
        ))
        .unwrap();

        let state = build_state(&config, comparator).unwrap();
        let router = router(state.clone(), &config.server.static_dir, UPLOAD_LIMIT);

        Self { dir, state, router }
    }

    pub fn enroll(&self, voter_id: &str, reference: &str) {
        let relative = format!("stored_photos/{}.jpg", voter_id);
        fs::write(self.dir.path().join(&relative), reference).unwrap();
        assert!(self.state.store.register(voter_id, &relative).unwrap());
    }

    pub fn reference_path(&self, voter_id: &str) -> PathBuf {
        self.dir.path().join(format!("stored_photos/{}.jpg", voter_id))
    }

    pub fn capture_dir(&self) -> PathBuf {
        self.dir.path().join("temp")
    }

    pub fn captures_left(&self) -> usize {
        fs::read_dir(self.capture_dir()).unwrap().count()
    }

    pub fn has_voted(&self, voter_id: &str) -> bool {
        self.state.store.get(voter_id).unwrap().unwrap().has_voted
    }

    pub async fn check_id(&self, body: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::post("/check_id")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        send_json(&self.router, request).await
    }

    pub async fn verify_face(&self, voter_id: Option<&str>, photo: Option<&[u8]>) -> (StatusCode, serde_json::Value) {
        send_json(&self.router, verify_request(voter_id, photo)).await
    }

    pub async fn get(&self, path: &str) -> (StatusCode, String) {
        let request = Request::get(path).body(Body::empty()).unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }
}

pub async fn send_json(router: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes)
        .unwrap_or_else(|e| panic!("non-JSON body ({}): {:?}", e, String::from_utf8_lossy(&bytes)));
    (status, json)
}

pub fn verify_request(voter_id: Option<&str>, photo: Option<&[u8]>) -> Request<Body> {
    Request::post("/verify_face")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", BOUNDARY))
        .body(Body::from(multipart_body(voter_id, photo)))
        .unwrap()
}

pub fn multipart_body(voter_id: Option<&str>, photo: Option<&[u8]>) -> Vec<u8> {
    let mut body = Vec::new();
    if let Some(voter_id) = voter_id {
        body.extend_from_slice(format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"voter_id\"\r\n\r\n{voter_id}\r\n"
        ).as_bytes());
    }
    if let Some(photo) = photo {
        body.extend_from_slice(format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"photo\"; filename=\"capture.jpg\"\r\nContent-Type: image/jpeg\r\n\r\n"
        ).as_bytes());
        body.extend_from_slice(photo);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}
