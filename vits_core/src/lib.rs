pub mod cache;
pub mod checkpoint;
pub mod engine;
pub mod error;
pub mod hparams;
pub mod loader;
pub mod manifest;
pub mod text;
mod wav;

use std::path::{Path, PathBuf};

use tracing::{debug, error};
use uuid::Uuid;

pub use cache::{CacheStats, ModelCache, ModelLease, RELOAD_PERIOD};
pub use checkpoint::{Checkpoint, Fingerprint, ModelLayout};
pub use engine::{InferenceEngine, InferenceHandle, OnnxEngine, Waveform};
pub use error::ModelError;
pub use hparams::{HParams, SpeakerTable};
pub use loader::{ModelLoader, VitsLoader, Voice};
pub use manifest::{ModelDescriptor, ModelManifest};
pub use text::{Language, TextNormalizer};

/// Longest accepted input, in characters.
pub const MAX_TEXT_LEN: usize = 100;
/// URL prefix under which generated files are served.
pub const SOUND_URL_PREFIX: &str = "/static/sounds";

/// A synthesized utterance written to the sound directory.
#[derive(Debug, Clone)]
pub struct GeneratedSound {
    pub file_name: String,
    pub path: PathBuf,
    pub url: String,
    pub sample_rate: u32,
    pub duration_ms: u64,
}

/// Text-to-speech front door: manifest lookup, cached models, WAV output.
pub struct TtsService {
    manifest: ModelManifest,
    cache: ModelCache,
    sound_dir: PathBuf,
    max_text_len: usize,
}

impl TtsService {
    pub fn new(manifest: ModelManifest, cache: ModelCache, sound_dir: impl Into<PathBuf>) -> Self {
        Self {
            manifest,
            cache,
            sound_dir: sound_dir.into(),
            max_text_len: MAX_TEXT_LEN,
        }
    }

    pub fn with_max_text_len(mut self, max_text_len: usize) -> Self {
        self.max_text_len = max_text_len;
        self
    }

    pub fn manifest(&self) -> &ModelManifest {
        &self.manifest
    }

    pub fn cache(&self) -> &ModelCache {
        &self.cache
    }

    pub fn sound_dir(&self) -> &Path {
        &self.sound_dir
    }

    /// Refresh the manifest and list installed model names.
    pub fn list_models(&self) -> Vec<String> {
        self.manifest
            .refresh()
            .into_iter()
            .map(|m| m.name)
            .collect()
    }

    /// Synthesize `text` with `model_name` and write a new WAV file into the
    /// sound directory. `speaker` defaults to the model's first speaker.
    ///
    /// Over-long text is rejected before any model is looked up. Blocking:
    /// may hash and load a checkpoint and always runs inference.
    pub fn synthesize(
        &self,
        text: &str,
        model_name: &str,
        speaker: Option<&str>,
        language: Language,
        speed: f32,
    ) -> Result<GeneratedSound, ModelError> {
        self.manifest.refresh();

        let len = text.chars().count();
        if len > self.max_text_len {
            error!("text too long: {len} characters");
            return Err(ModelError::TextTooLong {
                len,
                max: self.max_text_len,
            });
        }

        let model = self.manifest.resolve(model_name).ok_or_else(|| {
            error!("model {model_name} not found");
            ModelError::ModelNotFound(model_name.to_string())
        })?;

        let lease = self.cache.get(&model.path)?;
        let speaker = speaker.unwrap_or(&lease.default_speaker);
        let wave = lease.voice.speak(text, speaker, language, speed)?;
        debug!(
            "tts result: {} samples, sampling_rate: {}",
            wave.samples.len(),
            wave.sample_rate
        );

        let file_name = format!("{}.wav", Uuid::new_v4());
        let path = self.sound_dir.join(&file_name);
        wav::write_wav(&path, &wave).map_err(|source| ModelError::Output {
            path: path.clone(),
            source,
        })?;

        Ok(GeneratedSound {
            url: format!("{SOUND_URL_PREFIX}/{file_name}"),
            file_name,
            path,
            sample_rate: wave.sample_rate,
            duration_ms: wave.duration_ms(),
        })
    }
}
