//! Container decode / encode.
//!
//! WAV is read and written in-process with `hound`.  Every other container
//! goes through an FFmpeg process (`ffmpeg-sidecar`): compressed input is
//! transcoded to a temporary WAV first, and compressed output is produced
//! from a temporary WAV.
//!
//! | Format | FFmpeg muxer / codec | Content type |
//! |--------|----------------------|--------------|
//! | wav    | (in-process)         | `audio/wav`  |
//! | mp3    | `mp3` / libmp3lame   | `audio/mpeg` |
//! | flac   | `flac`               | `audio/flac` |
//! | ogg    | `ogg` / libvorbis    | `audio/ogg`  |
//! | aac    | `adts` / aac         | `audio/aac`  |
//! | m4a    | `mp4` / aac          | `audio/mp4`  |
//!
//! RIFF input that `hound` cannot read (mu-law, A-law, ADPCM) is handed to
//! FFmpeg as well.
//!
//! AAC output falls back to an MP4 container (reported as m4a) when the
//! ADTS muxer fails.

use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::str::FromStr;

use ffmpeg_sidecar::command::FfmpegCommand;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::buffer::{AudioBuffer, SampleFormat};

// ---------------------------------------------------------------------------
// CodecError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("could not decode audio: {0}")]
    Decode(String),

    #[error("could not encode audio as {format}: {message}")]
    Encode { format: OutputFormat, message: String },

    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("ffmpeg failed: {0}")]
    Ffmpeg(String),
}

// ---------------------------------------------------------------------------
// OutputFormat
// ---------------------------------------------------------------------------

/// Container written by [`Codec::encode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Wav,
    Mp3,
    Flac,
    Ogg,
    Aac,
    M4a,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 6] = [
        OutputFormat::Wav,
        OutputFormat::Mp3,
        OutputFormat::Flac,
        OutputFormat::Ogg,
        OutputFormat::Aac,
        OutputFormat::M4a,
    ];

    /// File extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Wav => "wav",
            OutputFormat::Mp3 => "mp3",
            OutputFormat::Flac => "flac",
            OutputFormat::Ogg => "ogg",
            OutputFormat::Aac => "aac",
            OutputFormat::M4a => "m4a",
        }
    }

    /// MIME type reported alongside encoded bytes.
    pub fn content_type(self) -> &'static str {
        match self {
            OutputFormat::Wav => "audio/wav",
            OutputFormat::Mp3 => "audio/mpeg",
            OutputFormat::Flac => "audio/flac",
            OutputFormat::Ogg => "audio/ogg",
            OutputFormat::Aac => "audio/aac",
            OutputFormat::M4a => "audio/mp4",
        }
    }

    /// FFmpeg output arguments (everything between the input and the output
    /// path).
    fn ffmpeg_args(self) -> &'static [&'static str] {
        match self {
            OutputFormat::Wav => &["-f", "wav"],
            OutputFormat::Mp3 => &["-c:a", "libmp3lame", "-b:a", "192k", "-f", "mp3"],
            OutputFormat::Flac => &["-c:a", "flac", "-f", "flac"],
            OutputFormat::Ogg => &["-c:a", "libvorbis", "-f", "ogg"],
            OutputFormat::Aac => &["-c:a", "aac", "-b:a", "192k", "-f", "adts"],
            OutputFormat::M4a => &["-c:a", "aac", "-b:a", "192k", "-f", "mp4"],
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().trim_start_matches('.').to_lowercase();
        OutputFormat::ALL
            .into_iter()
            .find(|f| f.extension() == lower)
            .ok_or_else(|| CodecError::UnsupportedFormat(s.to_string()))
    }
}

/// Encoded bytes plus the format they actually ended up in.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedAudio {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
    pub content_type: &'static str,
}

impl EncodedAudio {
    fn new(bytes: Vec<u8>, format: OutputFormat) -> Self {
        Self {
            bytes,
            format,
            content_type: format.content_type(),
        }
    }
}

// ---------------------------------------------------------------------------
// WAV (in-process)
// ---------------------------------------------------------------------------

/// Returns `true` when `bytes` start with a RIFF/WAVE header.
pub fn is_wav(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE"
}

/// Decode a WAV file held in memory.
pub fn decode_wav(bytes: &[u8]) -> Result<AudioBuffer, CodecError> {
    let mut reader =
        hound::WavReader::new(Cursor::new(bytes)).map_err(|e| CodecError::Decode(e.to_string()))?;
    let spec = reader.spec();
    if spec.channels == 0 || spec.sample_rate == 0 {
        return Err(CodecError::Decode(format!(
            "invalid WAV header: {} channels @ {} Hz",
            spec.channels, spec.sample_rate
        )));
    }

    let (samples, format) = match spec.sample_format {
        hound::SampleFormat::Float => {
            let samples = reader
                .samples::<f32>()
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| CodecError::Decode(e.to_string()))?;
            (samples, SampleFormat::Float)
        }
        hound::SampleFormat::Int => {
            let format = SampleFormat::Int {
                bits: spec.bits_per_sample,
            };
            let samples = reader
                .samples::<i32>()
                .map(|s| s.map(|v| format.from_int(v)))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| CodecError::Decode(e.to_string()))?;
            (samples, format)
        }
    };

    Ok(AudioBuffer::new(samples, spec.sample_rate, spec.channels, format))
}

/// Encode `buffer` as WAV at its own sample format.
pub fn encode_wav(buffer: &AudioBuffer) -> Result<Vec<u8>, CodecError> {
    let encode_err = |e: hound::Error| CodecError::Encode {
        format: OutputFormat::Wav,
        message: e.to_string(),
    };

    let spec = match buffer.format {
        SampleFormat::Float => hound::WavSpec {
            channels: buffer.channels,
            sample_rate: buffer.sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        },
        SampleFormat::Int { bits } => hound::WavSpec {
            channels: buffer.channels,
            sample_rate: buffer.sample_rate,
            bits_per_sample: bits,
            sample_format: hound::SampleFormat::Int,
        },
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).map_err(encode_err)?;
        match buffer.format {
            SampleFormat::Float => {
                for &s in &buffer.samples {
                    writer.write_sample(s).map_err(encode_err)?;
                }
            }
            format @ SampleFormat::Int { .. } => {
                for &s in &buffer.samples {
                    writer.write_sample(format.to_int(s)).map_err(encode_err)?;
                }
            }
        }
        writer.finalize().map_err(encode_err)?;
    }
    Ok(cursor.into_inner())
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Decoder / encoder for every supported container.
#[derive(Debug, Clone, Default)]
pub struct Codec {
    /// Explicit FFmpeg binary; `None` uses ffmpeg-sidecar's resolution
    /// (next to the executable, then `PATH`).
    pub ffmpeg_path: Option<PathBuf>,
}

impl Codec {
    pub fn new(ffmpeg_path: Option<PathBuf>) -> Self {
        Self { ffmpeg_path }
    }

    /// Decode any supported container into an [`AudioBuffer`].
    pub fn decode(&self, bytes: &[u8]) -> Result<AudioBuffer, CodecError> {
        if bytes.is_empty() {
            return Err(CodecError::Decode("input is empty".into()));
        }
        if !is_wav(bytes) {
            return self.decode_with_ffmpeg(bytes);
        }

        // hound only reads PCM and float WAV; companded and ADPCM variants
        // still carry a RIFF header.
        let wav_err = match decode_wav(bytes) {
            Ok(buffer) => return Ok(buffer),
            Err(e) => e,
        };
        log::debug!("in-process WAV decode failed ({wav_err}), retrying with FFmpeg");
        self.decode_with_ffmpeg(bytes).map_err(|e| match e {
            CodecError::Ffmpeg(message) => {
                CodecError::Ffmpeg(format!("{message} (in-process: {wav_err})"))
            }
            other => other,
        })
    }

    fn decode_with_ffmpeg(&self, bytes: &[u8]) -> Result<AudioBuffer, CodecError> {
        let dir = tempfile::tempdir().map_err(|e| CodecError::Decode(e.to_string()))?;
        let input = dir.path().join("input");
        let output = dir.path().join("decoded.wav");
        std::fs::write(&input, bytes).map_err(|e| CodecError::Decode(e.to_string()))?;

        self.run_ffmpeg(&input, &["-c:a", "pcm_s16le", "-f", "wav"], &output)?;
        let wav = std::fs::read(&output).map_err(|e| CodecError::Decode(e.to_string()))?;
        decode_wav(&wav)
    }

    /// Encode `buffer` into `format`.
    pub fn encode(&self, buffer: &AudioBuffer, format: OutputFormat) -> Result<EncodedAudio, CodecError> {
        let wav = encode_wav(buffer)?;
        if format == OutputFormat::Wav {
            return Ok(EncodedAudio::new(wav, format));
        }
        self.transcode_wav(&wav, format)
    }

    /// Decode `bytes` and re-encode them as `format`.
    pub fn convert(&self, bytes: &[u8], format: OutputFormat) -> Result<EncodedAudio, CodecError> {
        let buffer = self.decode(bytes)?;
        self.encode(&buffer, format)
    }

    fn transcode_wav(&self, wav: &[u8], format: OutputFormat) -> Result<EncodedAudio, CodecError> {
        let dir = tempfile::tempdir().map_err(|e| CodecError::Encode {
            format,
            message: e.to_string(),
        })?;
        let input = dir.path().join("input.wav");
        std::fs::write(&input, wav).map_err(|e| CodecError::Encode {
            format,
            message: e.to_string(),
        })?;

        let output = dir.path().join(format!("output.{}", format.extension()));
        let (path, written) = match self.run_ffmpeg(&input, format.ffmpeg_args(), &output) {
            Ok(()) => (output, format),
            Err(err) if format == OutputFormat::Aac => {
                log::warn!("ADTS encoding failed ({err}), falling back to an MP4 container");
                let alt = dir.path().join("output.m4a");
                self.run_ffmpeg(&input, OutputFormat::M4a.ffmpeg_args(), &alt)?;
                (alt, OutputFormat::M4a)
            }
            Err(err) => return Err(err),
        };

        let bytes = std::fs::read(&path).map_err(|e| CodecError::Encode {
            format: written,
            message: e.to_string(),
        })?;
        Ok(EncodedAudio::new(bytes, written))
    }

    fn command(&self) -> FfmpegCommand {
        match &self.ffmpeg_path {
            Some(path) => FfmpegCommand::new_with_path(path),
            None => FfmpegCommand::new(),
        }
    }

    /// `ffmpeg -y -i <input> <args…> <output>`, blocking until it exits.
    fn run_ffmpeg(&self, input: &Path, args: &[&str], output: &Path) -> Result<(), CodecError> {
        let mut command = self.command();
        command
            .args(["-hide_banner", "-loglevel", "error", "-y"])
            .arg("-i")
            .arg(input.to_string_lossy().to_string())
            .args(args.iter().copied())
            .arg(output.to_string_lossy().to_string());

        let inner = command.as_inner_mut();
        inner.stdin(Stdio::null());
        inner.stdout(Stdio::null());
        inner.stderr(Stdio::piped());

        let result = inner
            .output()
            .map_err(|e| CodecError::Ffmpeg(format!("failed to start FFmpeg: {e}")))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let message = match stderr.lines().last() {
                Some(line) if !line.trim().is_empty() => line.trim().to_string(),
                _ => format!("exit code {:?}", result.status.code()),
            };
            return Err(CodecError::Ffmpeg(message));
        }
        log::debug!("ffmpeg wrote {}", output.display());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_types_follow_the_format() {
        assert_eq!(OutputFormat::Mp3.content_type(), "audio/mpeg");
        assert_eq!(OutputFormat::M4a.content_type(), "audio/mp4");
        assert_eq!(OutputFormat::Flac.content_type(), "audio/flac");
        assert_eq!(OutputFormat::Aac.content_type(), "audio/aac");
    }

    #[test]
    fn parses_known_formats_case_insensitively() {
        assert_eq!("MP3".parse::<OutputFormat>().unwrap(), OutputFormat::Mp3);
        assert_eq!(".m4a".parse::<OutputFormat>().unwrap(), OutputFormat::M4a);
        assert!(matches!(
            "opus".parse::<OutputFormat>(),
            Err(CodecError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn pcm16_wav_keeps_samples_and_layout() {
        let mut buf = AudioBuffer::new(
            vec![0.0, 0.25, -0.5, 0.75, 1.0, -1.0],
            22_050,
            2,
            SampleFormat::PCM16,
        );
        buf.quantize();
        let bytes = encode_wav(&buf).unwrap();
        assert!(is_wav(&bytes));

        let back = Codec::default().decode(&bytes).unwrap();
        assert_eq!(back.sample_rate, 22_050);
        assert_eq!(back.channels, 2);
        assert_eq!(back.format, SampleFormat::PCM16);
        for (a, b) in back.samples.iter().zip(&buf.samples) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn float_wav_is_lossless() {
        let buf = AudioBuffer::mono(vec![0.123, -0.456, 0.789], 8_000);
        let back = decode_wav(&encode_wav(&buf).unwrap()).unwrap();
        assert_eq!(back, buf);
    }

    #[test]
    fn wav_encode_needs_no_ffmpeg() {
        let codec = Codec::new(Some(PathBuf::from("/nonexistent/ffmpeg")));
        let buf = AudioBuffer::silence(10, 8_000, 1, SampleFormat::PCM16);
        let encoded = codec.encode(&buf, OutputFormat::Wav).unwrap();
        assert_eq!(encoded.content_type, "audio/wav");
        assert_eq!(encoded.format, OutputFormat::Wav);
    }

    #[test]
    fn missing_ffmpeg_is_reported() {
        let codec = Codec::new(Some(PathBuf::from("/nonexistent/ffmpeg")));
        let buf = AudioBuffer::silence(10, 8_000, 1, SampleFormat::PCM16);
        assert!(matches!(
            codec.encode(&buf, OutputFormat::Mp3),
            Err(CodecError::Ffmpeg(_))
        ));
        assert!(matches!(
            codec.decode(b"ID3 not really an mp3"),
            Err(CodecError::Ffmpeg(_))
        ));
    }

    /// RIFF/WAVE header for 8-bit mu-law mono at 8 kHz, followed by `data`.
    fn mulaw_wav(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(4 + 26 + 8 + data.len() as u32).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&18u32.to_le_bytes());
        out.extend_from_slice(&7u16.to_le_bytes()); // WAVE_FORMAT_MULAW
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&8_000u32.to_le_bytes());
        out.extend_from_slice(&8_000u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&8u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(data);
        out
    }

    #[test]
    fn unreadable_riff_falls_through_to_ffmpeg() {
        let bytes = mulaw_wav(&[0xFF; 64]);
        assert!(is_wav(&bytes));
        assert!(decode_wav(&bytes).is_err());

        let codec = Codec::new(Some(PathBuf::from("/nonexistent/ffmpeg")));
        match codec.decode(&bytes) {
            Err(CodecError::Ffmpeg(message)) => assert!(message.contains("in-process")),
            other => panic!("expected the FFmpeg path to be tried, got {other:?}"),
        }
    }

    #[test]
    fn empty_input_is_a_decode_error() {
        assert!(matches!(
            Codec::default().decode(&[]),
            Err(CodecError::Decode(_))
        ));
    }
}
