//! Inference engine seam.
//!
//! The acoustic model is a black box: an [`InferenceEngine`] turns checkpoint
//! bytes into an [`InferenceHandle`], and the handle maps a token sequence to
//! a waveform. [`OnnxEngine`] runs the VITS generator exported to ONNX.

use std::sync::{Arc, Mutex};

use anyhow::Context;
use ort::{session::Session, value::Tensor};

use crate::{checkpoint::Checkpoint, hparams::HParams};

pub const NOISE_SCALE: f32 = 0.667;
pub const NOISE_SCALE_W: f32 = 0.8;

/// Mono PCM samples in `[-1.0, 1.0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub sample_rate: u32,
    pub samples: Vec<f32>,
}

impl Waveform {
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.samples.len() as f64 / self.sample_rate as f64 * 1000.0) as u64
    }
}

/// A loaded model, bound to its weights.
pub trait InferenceHandle: Send + Sync {
    fn synthesize(&self, tokens: &[i64], speaker_id: i64, speed: f32) -> anyhow::Result<Waveform>;
}

pub trait InferenceEngine: Send + Sync {
    fn instantiate(
        &self,
        checkpoint: &Checkpoint,
        hparams: &HParams,
    ) -> anyhow::Result<Arc<dyn InferenceHandle>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OnnxEngine;

impl InferenceEngine for OnnxEngine {
    fn instantiate(
        &self,
        checkpoint: &Checkpoint,
        hparams: &HParams,
    ) -> anyhow::Result<Arc<dyn InferenceHandle>> {
        let session = Session::builder()
            .context("Failed to create ORT session builder")?
            .commit_from_memory(&checkpoint.bytes)
            .context("Checkpoint is not a loadable ONNX generator")?;

        Ok(Arc::new(OnnxGenerator {
            session: Mutex::new(session),
            sample_rate: hparams.data.sampling_rate,
            multi_speaker: hparams.data.n_speakers > 0,
        }))
    }
}

struct OnnxGenerator {
    session: Mutex<Session>,
    sample_rate: u32,
    multi_speaker: bool,
}

impl InferenceHandle for OnnxGenerator {
    fn synthesize(&self, tokens: &[i64], speaker_id: i64, speed: f32) -> anyhow::Result<Waveform> {
        anyhow::ensure!(!tokens.is_empty(), "No tokens generated from text");
        anyhow::ensure!(speed > 0.0, "Speed must be positive, got {speed}");

        // Graph inputs, in export order:
        //   input          [1, T] i64
        //   input_lengths  [1]    i64
        //   scales         [3]    f32  (noise, length, noise_w)
        //   sid            [1]    i64  (multi-speaker exports only)
        let seq_len = tokens.len();
        let t_input = Tensor::<i64>::from_array(([1usize, seq_len], tokens.to_vec()))
            .context("Failed to build input tensor")?;
        let t_lengths = Tensor::<i64>::from_array(([1usize], vec![seq_len as i64]))
            .context("Failed to build input_lengths tensor")?;
        let t_scales = Tensor::<f32>::from_array((
            [3usize],
            vec![NOISE_SCALE, 1.0 / speed, NOISE_SCALE_W],
        ))
        .context("Failed to build scales tensor")?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow::anyhow!("ORT session lock poisoned"))?;
        let outputs = if self.multi_speaker {
            let t_sid = Tensor::<i64>::from_array(([1usize], vec![speaker_id]))
                .context("Failed to build sid tensor")?;
            session.run(ort::inputs![t_input, t_lengths, t_scales, t_sid])
        } else {
            session.run(ort::inputs![t_input, t_lengths, t_scales])
        }
        .context("ONNX inference failed")?;

        // Output 0 is the waveform, shape [1, 1, samples].
        let (_shape, audio) = outputs[0]
            .try_extract_tensor::<f32>()
            .context("Failed to extract audio tensor")?;

        Ok(Waveform {
            sample_rate: self.sample_rate,
            samples: audio.to_vec(),
        })
    }
}
