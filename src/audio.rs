//! WAV audio I/O
//!
//! Probing of the conversion input plus the read/resample/write helpers used
//! by the local backend. Samples are held as de-interleaved 32-bit float.

use std::io::Read;
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use serde::{Deserialize, Serialize};

use crate::error::{Result, RvcError};

/// Header information of a WAV file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioInfo {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub frames: u32,
    pub duration_secs: f64,
}

/// Decoded audio, one `Vec` per channel
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub samples: Vec<Vec<f32>>,
    pub sample_rate: u32,
}

impl AudioClip {
    pub fn num_channels(&self) -> usize {
        self.samples.len()
    }

    pub fn num_frames(&self) -> usize {
        self.samples.first().map_or(0, Vec::len)
    }

    pub fn duration_secs(&self) -> f64 {
        self.num_frames() as f64 / self.sample_rate as f64
    }

    /// Average all channels into one
    pub fn to_mono(&self) -> AudioClip {
        if self.num_channels() <= 1 {
            return self.clone();
        }

        let scale = 1.0 / self.num_channels() as f32;
        let mono = (0..self.num_frames())
            .map(|i| self.samples.iter().map(|ch| ch[i]).sum::<f32>() * scale)
            .collect();

        AudioClip {
            samples: vec![mono],
            sample_rate: self.sample_rate,
        }
    }

    /// Resample every channel to `target_rate`
    pub fn resample(&self, target_rate: u32) -> AudioClip {
        if target_rate == self.sample_rate {
            return self.clone();
        }

        let ratio = target_rate as f64 / self.sample_rate as f64;
        AudioClip {
            samples: self
                .samples
                .iter()
                .map(|channel| resample_linear(channel, ratio))
                .collect(),
            sample_rate: target_rate,
        }
    }
}

/// Read the header of a WAV file and check it is usable as conversion input.
///
/// # Errors
/// * `FileNotFound` - If the file does not exist
/// * `InvalidAudio` - If the file is not a valid WAV file
/// * `UnsupportedFormat` - If the header declares no channels
/// * `EmptyAudio` - If the file holds no frames
pub fn probe(path: &Path) -> Result<AudioInfo> {
    let reader = open(path)?;
    let spec = reader.spec();

    check_channels(spec.channels)?;

    let frames = reader.duration();
    if frames == 0 {
        return Err(RvcError::EmptyAudio);
    }

    Ok(AudioInfo {
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        bits_per_sample: spec.bits_per_sample,
        frames,
        duration_secs: frames as f64 / spec.sample_rate as f64,
    })
}

/// Decode a WAV file into float samples at its native rate
pub fn read_wav(path: &Path) -> Result<AudioClip> {
    let reader = open(path)?;
    let spec = reader.spec();
    check_channels(spec.channels)?;

    let interleaved = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)?;
    if interleaved.is_empty() {
        return Err(RvcError::EmptyAudio);
    }

    Ok(AudioClip {
        samples: deinterleave(&interleaved, spec.channels as usize),
        sample_rate: spec.sample_rate,
    })
}

/// Write a clip as PCM (16 or 24 bit) or float (32 bit) WAV.
///
/// An unsupported bit depth is rejected before the file is created.
pub fn write_wav(clip: &AudioClip, path: &Path, bit_depth: u16) -> Result<()> {
    let sample_format = match bit_depth {
        16 | 24 => SampleFormat::Int,
        32 => SampleFormat::Float,
        _ => {
            return Err(RvcError::UnsupportedFormat {
                format: format!("{}-bit audio (only 16, 24, 32 supported)", bit_depth),
            });
        }
    };
    let spec = WavSpec {
        channels: clip.num_channels() as u16,
        sample_rate: clip.sample_rate,
        bits_per_sample: bit_depth,
        sample_format,
    };

    let mut writer = WavWriter::create(path, spec).map_err(hound_to_io)?;
    for sample in interleave(&clip.samples) {
        match bit_depth {
            16 => {
                let scaled = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
                writer.write_sample(scaled).map_err(hound_to_io)?;
            }
            24 => {
                // 24-bit stored as i32 in hound
                let scaled = (sample * 8388607.0).clamp(-8388608.0, 8388607.0) as i32;
                writer.write_sample(scaled).map_err(hound_to_io)?;
            }
            _ => writer.write_sample(sample).map_err(hound_to_io)?,
        }
    }

    writer.finalize().map_err(hound_to_io)?;
    Ok(())
}

/// Generate a mono sine wave, handy for fixtures
pub fn generate_test_tone(frequency: f32, duration_secs: f32, sample_rate: u32) -> AudioClip {
    let num_samples = (duration_secs * sample_rate as f32) as usize;
    let angular_freq = 2.0 * std::f32::consts::PI * frequency / sample_rate as f32;

    AudioClip {
        samples: vec![(0..num_samples)
            .map(|i| (angular_freq * i as f32).sin() * 0.5)
            .collect()],
        sample_rate,
    }
}

// ============================================================================
// Internal helper functions
// ============================================================================

fn open(path: &Path) -> Result<WavReader<std::io::BufReader<std::fs::File>>> {
    if !path.exists() {
        return Err(RvcError::FileNotFound {
            path: path.display().to_string(),
            source: None,
        });
    }

    WavReader::open(path).map_err(|e| RvcError::InvalidAudio {
        reason: format!("Failed to open WAV file {}: {}", path.display(), e),
        source: Some(Box::new(e)),
    })
}

fn check_channels(channels: u16) -> Result<()> {
    if channels == 0 {
        return Err(RvcError::UnsupportedFormat {
            format: "0-channel audio".to_string(),
        });
    }
    Ok(())
}

fn hound_to_io(e: hound::Error) -> RvcError {
    match e {
        hound::Error::IoError(io) => RvcError::Io(io),
        other => RvcError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            other.to_string(),
        )),
    }
}

/// Read samples from WAV reader and convert to f32
fn read_samples_as_f32<R: Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> Result<Vec<f32>> {
    let scale = match (sample_format, bits_per_sample) {
        (SampleFormat::Float, _) => {
            return reader
                .samples::<f32>()
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| invalid_samples("float", e));
        }
        (SampleFormat::Int, 8) => 128.0,
        (SampleFormat::Int, 16) => 32768.0,
        (SampleFormat::Int, 24) => 8388608.0,
        (SampleFormat::Int, 32) => 2147483648.0,
        (SampleFormat::Int, bits) => {
            return Err(RvcError::UnsupportedFormat {
                format: format!("{}-bit integer audio", bits),
            });
        }
    };

    // hound widens every integer depth into i32
    reader
        .samples::<i32>()
        .map(|s| s.map(|v| v as f32 / scale))
        .collect::<std::result::Result<Vec<f32>, _>>()
        .map_err(|e| invalid_samples(&format!("{}-bit", bits_per_sample), e))
}

fn invalid_samples(kind: &str, e: hound::Error) -> RvcError {
    RvcError::InvalidAudio {
        reason: format!("Failed to read {} samples: {}", kind, e),
        source: Some(Box::new(e)),
    }
}

/// De-interleave samples from [L,R,L,R,...] to [[L,L,...], [R,R,...]]
fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    let frames = samples.len() / channels;
    let mut result = vec![Vec::with_capacity(frames); channels];

    for (i, sample) in samples.iter().enumerate() {
        result[i % channels].push(*sample);
    }

    result
}

/// Interleave channels from [[L,L,...], [R,R,...]] to [L,R,L,R,...]
fn interleave(channels: &[Vec<f32>]) -> Vec<f32> {
    let Some(first) = channels.first() else {
        return Vec::new();
    };

    let mut result = Vec::with_capacity(first.len() * channels.len());
    for frame in 0..first.len() {
        for channel in channels {
            result.push(channel[frame]);
        }
    }

    result
}

/// Linear interpolation resampling
fn resample_linear(samples: &[f32], ratio: f64) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }

    let source_len = samples.len();
    let target_len = ((source_len as f64) * ratio).ceil() as usize;

    (0..target_len)
        .map(|i| {
            let src_pos = i as f64 / ratio;
            let src_idx = src_pos.floor() as usize;
            let frac = (src_pos - src_idx as f64) as f32;

            if src_idx + 1 < source_len {
                samples[src_idx] * (1.0 - frac) + samples[src_idx + 1] * frac
            } else if src_idx < source_len {
                samples[src_idx]
            } else {
                0.0
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use tempfile::tempdir;

    #[test]
    fn test_probe_reports_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav(&generate_test_tone(220.0, 0.5, 16000), &path, 16).unwrap();

        let info = probe(&path).unwrap();
        assert_eq!(info.sample_rate, 16000);
        assert_eq!(info.channels, 1);
        assert_eq!(info.bits_per_sample, 16);
        assert_eq!(info.frames, 8000);
        assert_abs_diff_eq!(info.duration_secs, 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_probe_nonexistent_file() {
        match probe(Path::new("/nonexistent/path/audio.wav")).unwrap_err() {
            RvcError::FileNotFound { path, .. } => assert!(path.contains("nonexistent")),
            other => panic!("Expected FileNotFound error, got: {:?}", other),
        }
    }

    #[test]
    fn test_probe_rejects_non_wav() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.wav");
        std::fs::write(&path, b"definitely not RIFF data").unwrap();

        assert!(matches!(
            probe(&path).unwrap_err(),
            RvcError::InvalidAudio { .. }
        ));
    }

    #[test]
    fn test_probe_rejects_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.wav");
        let clip = AudioClip {
            samples: vec![Vec::new()],
            sample_rate: 16000,
        };
        write_wav(&clip, &path, 16).unwrap();

        assert!(matches!(probe(&path).unwrap_err(), RvcError::EmptyAudio));
    }

    #[test]
    fn test_multichannel_input_is_accepted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("surround.wav");
        let clip = AudioClip {
            samples: vec![vec![0.3, 0.3], vec![0.0, 0.6], vec![-0.3, 0.0]],
            sample_rate: 48000,
        };
        write_wav(&clip, &path, 16).unwrap();

        assert_eq!(probe(&path).unwrap().channels, 3);
        let mono = read_wav(&path).unwrap().to_mono();
        assert_eq!(mono.num_channels(), 1);
        assert_abs_diff_eq!(mono.samples[0][0], 0.0, epsilon = 1e-3);
        assert_abs_diff_eq!(mono.samples[0][1], 0.3, epsilon = 1e-3);
    }

    #[test]
    fn test_to_mono_averages_channels() {
        let clip = AudioClip {
            samples: vec![vec![1.0, 0.5, 0.0], vec![0.0, 0.5, -1.0]],
            sample_rate: 44100,
        };
        let mono = clip.to_mono();
        assert_eq!(mono.num_channels(), 1);
        assert_eq!(mono.samples[0], vec![0.5, 0.5, -0.5]);
    }

    #[test]
    fn test_resample_changes_length() {
        let clip = generate_test_tone(440.0, 1.0, 48000);
        let resampled = clip.resample(40000);
        assert_eq!(resampled.sample_rate, 40000);
        assert!((resampled.num_frames() as i64 - 40000).abs() <= 1);
    }

    #[test]
    fn test_resample_linear_upsample() {
        let resampled = resample_linear(&[0.0, 1.0, 0.0], 2.0);
        assert_eq!(resampled.len(), 6);
        assert_abs_diff_eq!(resampled[1], 0.5, epsilon = 0.01);
    }

    #[test]
    fn test_stereo_file_reads_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let clip = AudioClip {
            samples: vec![vec![0.25, -0.25, 0.5], vec![0.1, 0.2, 0.3]],
            sample_rate: 22050,
        };
        write_wav(&clip, &path, 24).unwrap();

        let read = read_wav(&path).unwrap();
        assert_eq!(read.num_channels(), 2);
        for (orig, back) in clip.samples[1].iter().zip(&read.samples[1]) {
            assert_abs_diff_eq!(*orig, *back, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_write_rejects_unknown_bit_depth() {
        let dir = tempdir().unwrap();
        let clip = generate_test_tone(440.0, 0.1, 16000);
        let path = dir.path().join("x.wav");

        let result = write_wav(&clip, &path, 12);

        assert!(matches!(result, Err(RvcError::UnsupportedFormat { .. })));
        assert!(!path.exists());
    }
}
