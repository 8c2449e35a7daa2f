//! Common utilities for integration tests

#![allow(dead_code)]

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use tempfile::TempDir;
use tower::ServiceExt;
use vits_core::{
    Checkpoint, HParams, InferenceEngine, InferenceHandle, ModelCache, ModelLayout, ModelManifest,
    TtsService, VitsLoader, Waveform,
};
use vits_server::{build_app, config::ServerConfig, AppState};

pub const CONFIG: &str = r#"{
    "train": { "epochs": 100 },
    "data": {
        "sampling_rate": 22050,
        "text_cleaners": ["cjke_cleaners2"],
        "add_blank": true,
        "n_speakers": 1
    },
    "symbols": ["_", ",", ".", "!", "?", " ", "a", "e", "h", "l", "o", "r", "w"],
    "speakers": { "alice_voice": 0 }
}"#;

/// Emits 100 samples per token; counts instantiations.
#[derive(Default)]
pub struct FakeEngine {
    pub instances: AtomicUsize,
}

struct FakeVoice;

impl InferenceHandle for FakeVoice {
    fn synthesize(&self, tokens: &[i64], _speaker_id: i64, speed: f32) -> anyhow::Result<Waveform> {
        let len = (tokens.len() as f32 * 100.0 / speed) as usize;
        Ok(Waveform {
            sample_rate: 22050,
            samples: (0..len).map(|i| (i as f32 / 10.0).sin() * 0.5).collect(),
        })
    }
}

impl InferenceEngine for FakeEngine {
    fn instantiate(
        &self,
        _checkpoint: &Checkpoint,
        _hparams: &HParams,
    ) -> anyhow::Result<Arc<dyn InferenceHandle>> {
        self.instances.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakeVoice))
    }
}

pub struct TestEnv {
    pub dir: TempDir,
    pub engine: Arc<FakeEngine>,
    pub state: AppState,
}

impl TestEnv {
    pub fn manifest_path(&self) -> PathBuf {
        self.dir.path().join("models.json")
    }

    pub fn app(&self) -> Router {
        build_app(self.state.clone()).unwrap()
    }
}

/// Lay out a model directory with a checkpoint and config.
pub fn write_model(root: &Path, name: &str, checkpoint: &[u8]) -> PathBuf {
    let model_dir = root.join(name);
    let layout = ModelLayout::new(&model_dir);
    fs::create_dir_all(layout.checkpoint_path().parent().unwrap()).unwrap();
    fs::write(layout.checkpoint_path(), checkpoint).unwrap();
    fs::write(layout.config_path(), CONFIG).unwrap();
    model_dir
}

/// A server with one installed model named "alice".
pub fn create_test_env() -> TestEnv {
    let dir = tempfile::tempdir().unwrap();
    let model_dir = write_model(dir.path(), "alice", b"alice weights v1");

    let manifest_path = dir.path().join("models.json");
    let manifest = serde_json::json!([
        { "name": "alice", "description": "test voice", "path": model_dir }
    ]);
    fs::write(&manifest_path, manifest.to_string()).unwrap();

    let sound_dir = dir.path().join("sounds");
    fs::create_dir_all(&sound_dir).unwrap();

    let engine = Arc::new(FakeEngine::default());
    let loader = VitsLoader::new(engine.clone());
    let config = ServerConfig {
        manifest_path: manifest_path.clone(),
        sound_dir: sound_dir.clone(),
        ..ServerConfig::default()
    };
    let service = TtsService::new(
        ModelManifest::load(&manifest_path),
        ModelCache::with_reload_period(Arc::new(loader), config.reload_period),
        sound_dir,
    );

    TestEnv {
        dir,
        engine,
        state: AppState::new(service, config),
    }
}

pub async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}
