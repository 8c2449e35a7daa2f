use std::{fmt, sync::Arc};

use tracing::info;

use crate::{
    checkpoint::{Checkpoint, ModelLayout},
    engine::{InferenceEngine, InferenceHandle, OnnxEngine, Waveform},
    error::ModelError,
    hparams::{HParams, SpeakerTable},
    text::{Language, TextNormalizer},
};

/// A model that is ready to speak: weights, speakers and text frontend.
pub struct Voice {
    handle: Arc<dyn InferenceHandle>,
    speakers: SpeakerTable,
    normalizer: TextNormalizer,
    sample_rate: u32,
}

impl Voice {
    pub fn new(
        handle: Arc<dyn InferenceHandle>,
        speakers: SpeakerTable,
        normalizer: TextNormalizer,
        sample_rate: u32,
    ) -> Self {
        Self {
            handle,
            speakers,
            normalizer,
            sample_rate,
        }
    }

    pub fn speakers(&self) -> &SpeakerTable {
        &self.speakers
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Normalize `text`, resolve `speaker` and run the generator.
    pub fn speak(
        &self,
        text: &str,
        speaker: &str,
        language: Language,
        speed: f32,
    ) -> Result<Waveform, ModelError> {
        let speaker_id = self
            .speakers
            .id_of(speaker)
            .ok_or_else(|| ModelError::UnknownSpeaker(speaker.to_string()))?;
        let tokens = self.normalizer.normalize(text, language);
        self.handle
            .synthesize(&tokens, speaker_id, speed)
            .map_err(ModelError::Synthesis)
    }
}

// Manual Debug implementation since the inference handle is a trait object
impl fmt::Debug for Voice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Voice")
            .field("handle", &"<InferenceHandle>")
            .field("speakers", &self.speakers)
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

/// Turns a model directory plus checkpoint bytes into a [`Voice`].
///
/// Loaders do not cache; memoization is the job of
/// [`ModelCache`](crate::cache::ModelCache).
pub trait ModelLoader: Send + Sync {
    fn load(&self, layout: &ModelLayout, checkpoint: &Checkpoint) -> Result<Voice, ModelError>;
}

/// Loads VITS models laid out as `finetune_speaker.json` + `OUTPUT_MODEL/G_latest.pth`.
#[derive(Clone)]
pub struct VitsLoader {
    engine: Arc<dyn InferenceEngine>,
}

impl VitsLoader {
    pub fn new(engine: Arc<dyn InferenceEngine>) -> Self {
        Self { engine }
    }
}

impl Default for VitsLoader {
    fn default() -> Self {
        Self::new(Arc::new(OnnxEngine))
    }
}

impl ModelLoader for VitsLoader {
    fn load(&self, layout: &ModelLayout, checkpoint: &Checkpoint) -> Result<Voice, ModelError> {
        let root = layout.root();
        info!("Loading model from {}", root.display());

        let hps = HParams::from_file(layout.config_path()).map_err(|e| ModelError::load(root, e))?;
        let speakers = hps.speaker_table().map_err(|e| ModelError::load(root, e))?;
        if speakers.is_empty() {
            return Err(ModelError::unavailable(root, "speaker table is empty"));
        }

        let handle = self
            .engine
            .instantiate(checkpoint, &hps)
            .map_err(|e| ModelError::load(root, e))?;
        let normalizer = TextNormalizer::new(
            &hps.symbols,
            hps.data.text_cleaners.clone(),
            hps.data.add_blank,
        );

        info!("Loaded speakers in model {}: {:?}", root.display(), speakers.names());
        Ok(Voice::new(handle, speakers, normalizer, hps.data.sampling_rate))
    }
}
