use std::path::Path;

use crate::engine::Waveform;

/// Write samples as a mono 16-bit PCM WAV file.
pub fn write_wav(path: &Path, wave: &Waveform) -> Result<(), hound::Error> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: wave.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    const I16_MAX_F32: f32 = i16::MAX as f32;

    let mut writer = hound::WavWriter::create(path, spec)?;
    for &s in &wave.samples {
        // Clamp and convert f32 [-1.0, 1.0] -> i16
        writer.write_sample((s.clamp(-1.0, 1.0) * I16_MAX_F32) as i16)?;
    }
    writer.finalize()
}
