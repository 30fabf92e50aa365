//! Signal helpers shared by the integration tests

use morphfx_core::domain::AudioBuffer;

pub const SAMPLE_RATE: u32 = 48000;
pub const BLOCK_SIZE: usize = 512;

/// Samples in `ms` milliseconds at `sample_rate`
pub fn ms_to_samples(ms: f32, sample_rate: u32) -> usize {
    (ms * sample_rate as f32 / 1000.0).round() as usize
}

pub fn impulse(amplitude: f32, samples: usize) -> Vec<f32> {
    let mut signal = vec![0.0; samples];
    if let Some(first) = signal.first_mut() {
        *first = amplitude;
    }
    signal
}

pub fn sine(amplitude: f32, freq: f32, sample_rate: u32, samples: usize) -> Vec<f32> {
    (0..samples)
        .map(|i| amplitude * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
        .collect()
}

pub fn constant(value: f32, samples: usize) -> Vec<f32> {
    vec![value; samples]
}

pub fn rms(signal: &[f32]) -> f32 {
    if signal.is_empty() {
        return 0.0;
    }
    (signal.iter().map(|s| s * s).sum::<f32>() / signal.len() as f32).sqrt()
}

pub fn peak(signal: &[f32]) -> f32 {
    signal.iter().fold(0.0_f32, |acc, s| acc.max(s.abs()))
}

/// Index of the largest absolute sample within `[start, end)`
pub fn argmax_abs(signal: &[f32], start: usize, end: usize) -> usize {
    let end = end.min(signal.len());
    (start..end)
        .max_by(|&a, &b| signal[a].abs().total_cmp(&signal[b].abs()))
        .unwrap_or(start)
}

/// The same signal on every channel
pub fn multichannel(signal: &[f32], channels: usize) -> AudioBuffer {
    AudioBuffer::from_channels(vec![signal.to_vec(); channels])
}

/// Split `signal` into blocks, run `process` on each, and stitch the output
pub fn process_in_blocks<F>(signal: &[f32], channels: usize, block_size: usize, mut process: F) -> Vec<f32>
where
    F: FnMut(&mut AudioBuffer),
{
    let mut output = Vec::with_capacity(signal.len());
    for chunk in signal.chunks(block_size) {
        let mut buffer = multichannel(chunk, channels);
        process(&mut buffer);
        output.extend_from_slice(buffer.channel(0));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ms_to_samples() {
        assert_eq!(ms_to_samples(300.0, SAMPLE_RATE), 14400);
        assert_eq!(ms_to_samples(10.0, 44100), 441);
    }

    #[test]
    fn test_argmax_abs() {
        let signal = [0.1, -0.9, 0.5, 0.95, -0.2];
        assert_eq!(argmax_abs(&signal, 0, 5), 3);
        assert_eq!(argmax_abs(&signal, 0, 3), 1);
    }

    #[test]
    fn test_process_in_blocks_keeps_length() {
        let out = process_in_blocks(&constant(0.5, 1000), 2, 256, |_| {});
        assert_eq!(out.len(), 1000);
        assert!(out.iter().all(|&s| s == 0.5));
    }
}
