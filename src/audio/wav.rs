//! In-memory WAV container handling.
//!
//! Both transcription passes wrap raw PCM in a minimal WAV container
//! (RIFF/WAVE header with `fmt ` and `data` sub-chunks) before provider
//! submission. The provider never sees raw PCM.

use std::io::Cursor;

/// Size of the RIFF/WAVE header produced for 16-bit mono PCM.
pub const WAV_HEADER_BYTES: usize = 44;

/// Bytes per sample for 16-bit PCM.
pub const BYTES_PER_SAMPLE: usize = 2;

/// Wrap raw 16-bit little-endian mono PCM in a WAV container.
///
/// A trailing odd byte (half a sample) is ignored.
pub fn wrap_pcm_as_wav(pcm: &[u8], sample_rate: u32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(pcm.len() + WAV_HEADER_BYTES));
    {
        // Writing i16 samples to an in-memory cursor cannot fail.
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .expect("WAV writer over in-memory cursor");
        for sample in pcm.chunks_exact(BYTES_PER_SAMPLE) {
            let value = i16::from_le_bytes([sample[0], sample[1]]);
            writer.write_sample(value).expect("write sample to memory");
        }
        writer.finalize().expect("finalize in-memory WAV");
    }
    cursor.into_inner()
}

/// Duration of a PCM byte sequence, derived from the byte count.
///
/// The byte count is exact where provider-reported durations drift on
/// malformed chunk boundaries, so all stitching math uses this.
pub fn pcm_duration_secs(byte_len: usize, sample_rate: u32) -> f64 {
    byte_len as f64 / (sample_rate as f64 * BYTES_PER_SAMPLE as f64)
}
