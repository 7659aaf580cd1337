/// File and PCM helpers shared by the multimodal commands
///
/// Covers base64 inline media for analysis requests, the 16-bit PCM
/// conversions used by TTS and the live session, WAV output, and
/// ffmpeg-based key frame extraction for video analysis.

use anyhow::{Context, Result, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::Command;

/// Inline media ready to attach to a generation request
#[derive(Debug, Clone)]
pub struct InlineMedia {
    pub mime_type: String,
    pub data: String,
}

/// Read a file and encode it as base64 inline media, guessing the MIME type
/// from the extension
pub fn file_to_inline_media(path: &Path) -> Result<InlineMedia> {
    let bytes = fs::read(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(InlineMedia {
        mime_type: mime_for_path(path).to_string(),
        data: BASE64.encode(bytes),
    })
}

fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        _ => "application/octet-stream",
    }
}

pub fn base64_encode(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

pub fn base64_decode(data: &str) -> Result<Vec<u8>> {
    BASE64.decode(data).context("Invalid base64 audio data")
}

/// Quantize f32 samples to little-endian 16-bit PCM bytes.
///
/// Naive linear scaling, as the live protocol expects. The `as` cast
/// saturates, so over-range input clips instead of wrapping.
pub fn encode_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        let value = (sample * 32768.0) as i16;
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Decode little-endian 16-bit PCM bytes to f32 samples in [-1, 1).
/// A trailing odd byte is dropped.
pub fn decode_pcm16(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect()
}

/// Write mono 16-bit PCM samples as a WAV file
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    let pcm = encode_pcm16(samples);
    let data_len = pcm.len() as u32;

    let mut file = fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    let byte_rate = sample_rate * 2;
    file.write_all(b"RIFF")?;
    file.write_all(&(36 + data_len).to_le_bytes())?;
    file.write_all(b"WAVE")?;
    file.write_all(b"fmt ")?;
    file.write_all(&16u32.to_le_bytes())?;
    file.write_all(&1u16.to_le_bytes())?; // PCM
    file.write_all(&1u16.to_le_bytes())?; // mono
    file.write_all(&sample_rate.to_le_bytes())?;
    file.write_all(&byte_rate.to_le_bytes())?;
    file.write_all(&2u16.to_le_bytes())?; // block align
    file.write_all(&16u16.to_le_bytes())?; // bits per sample
    file.write_all(b"data")?;
    file.write_all(&data_len.to_le_bytes())?;
    file.write_all(&pcm)?;

    Ok(())
}

/// Extract `count` evenly spaced JPEG frames from a video file.
///
/// Frames are taken at duration / (count + 1) intervals, skipping the very
/// start and end. Requires ffmpeg and ffprobe on PATH.
pub fn extract_video_frames(video: &Path, count: usize) -> Result<Vec<InlineMedia>> {
    let duration = probe_duration(video)?;
    if duration <= 0.0 {
        bail!("Video has no duration: {}", video.display());
    }

    let interval = duration / (count + 1) as f64;
    let temp_dir = std::env::temp_dir();
    let mut frames = Vec::with_capacity(count);

    for i in 1..=count {
        let timestamp = i as f64 * interval;
        let frame_path = temp_dir.join(format!("gemini-workbench-frame-{}.jpg", i));

        let status = Command::new("ffmpeg")
            .arg("-y")
            .arg("-ss")
            .arg(format!("{:.3}", timestamp))
            .arg("-i")
            .arg(video)
            .arg("-frames:v")
            .arg("1")
            .arg("-q:v")
            .arg("3")
            .arg("-loglevel")
            .arg("error")
            .arg(&frame_path)
            .status()
            .context("Failed to execute ffmpeg.\n\nVideo analysis needs ffmpeg installed and on PATH.")?;

        if !status.success() {
            bail!("ffmpeg failed to extract frame at {:.1}s", timestamp);
        }

        let bytes = fs::read(&frame_path)
            .with_context(|| format!("Failed to read extracted frame {}", frame_path.display()))?;
        let _ = fs::remove_file(&frame_path);

        frames.push(InlineMedia {
            mime_type: "image/jpeg".to_string(),
            data: BASE64.encode(bytes),
        });
        println!("   Extracting frames... {}/{}", i, count);
    }

    Ok(frames)
}

fn probe_duration(video: &Path) -> Result<f64> {
    let output = Command::new("ffprobe")
        .arg("-v")
        .arg("error")
        .arg("-show_entries")
        .arg("format=duration")
        .arg("-of")
        .arg("default=noprint_wrappers=1:nokey=1")
        .arg(video)
        .output()
        .context("Failed to execute ffprobe.\n\nVideo analysis needs ffmpeg installed and on PATH.")?;

    if !output.status.success() {
        bail!("ffprobe could not read {}", video.display());
    }

    String::from_utf8_lossy(&output.stdout)
        .trim()
        .parse::<f64>()
        .context("ffprobe returned an unparsable duration")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcm16_round_trip() {
        let samples = vec![0.0, 0.5, -0.5, 0.25];
        let bytes = encode_pcm16(&samples);
        let decoded = decode_pcm16(&bytes);

        assert_eq!(decoded.len(), samples.len());
        for (a, b) in samples.iter().zip(decoded.iter()) {
            assert!((a - b).abs() < 1.0 / 32768.0 * 2.0);
        }
    }

    #[test]
    fn test_encode_pcm16_saturates_on_loud_input() {
        let bytes = encode_pcm16(&[2.0, -2.0]);
        assert_eq!(i16::from_le_bytes([bytes[0], bytes[1]]), i16::MAX);
        assert_eq!(i16::from_le_bytes([bytes[2], bytes[3]]), i16::MIN);
    }

    #[test]
    fn test_decode_pcm16_drops_trailing_odd_byte() {
        assert_eq!(decode_pcm16(&[0, 0, 7]).len(), 1);
    }

    #[test]
    fn test_mime_guess() {
        assert_eq!(mime_for_path(Path::new("a.PNG")), "image/png");
        assert_eq!(mime_for_path(Path::new("b.mov")), "video/quicktime");
        assert_eq!(mime_for_path(Path::new("noext")), "application/octet-stream");
    }
}
