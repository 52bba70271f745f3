//! Audio primitives: buffers, level matching, tone synthesis, time
//! stretching and container I/O.
//!
//! # Editing data flow
//!
//! ```text
//! bytes ─► codec::decode ─► AudioBuffer ─┬─► slice original segment ─► LoudnessMatcher::measure
//!                                        │
//! replacement (silence / tone / speech) ─┴─► resample::conform ─► DurationFitter ─► match_gain
//!                                                                                        │
//!                             codec::encode ◄─ splice(original, start, end, replacement) ◄┘
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use sound_filter::audio::{splice, AudioBuffer, SampleFormat};
//!
//! let original = AudioBuffer::new(vec![0.5; 1_000], 1_000, 1, SampleFormat::PCM16);
//! let silence = AudioBuffer::silence(200, 1_000, 1, SampleFormat::PCM16);
//! let muted = splice(&original, 400, 600, &silence);
//!
//! assert_eq!(muted.frames(), 1_000);
//! assert_eq!(muted.samples[500], 0.0);
//! ```

pub mod buffer;
pub mod codec;
pub mod fit;
pub mod loudness;
pub mod resample;
pub mod stretch;
pub mod tone;

pub use buffer::{secs_to_frames, splice, AudioBuffer, SampleFormat};
pub use codec::{decode_wav, encode_wav, Codec, CodecError, EncodedAudio, OutputFormat};
pub use fit::{DurationFitter, FitError, DEFAULT_TOLERANCE_MS};
pub use loudness::{GainOutcome, Loudness, LoudnessError, LoudnessMatcher};
pub use resample::{
    conform, downmix, remap_channels, resample, resample_linear, to_mono_at, ResampleError,
};
pub use stretch::{TimeStretch, Wsola};
pub use tone::{fade_ms_for, ToneGenerator};
