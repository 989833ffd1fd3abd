pub mod framer;
pub mod wav;

pub use framer::{AudioData, AudioFramer};
pub use wav::{pcm_duration_secs, wrap_pcm_as_wav, WAV_HEADER_BYTES};
