//! Multichannel fractional delay line
//!
//! A ring buffer per channel sharing one write head. For each sample the
//! owner reads every channel, writes every channel, then calls
//! [`advance`](DelayLine::advance) once. `read(d)` returns the sample
//! written `d` ticks ago, so `read(1.0)` is the most recent write.
//!
//! Fractional delays use third-order Lagrange interpolation over four
//! neighbours, which is exact at whole-sample delays.

#[derive(Debug, Clone)]
pub struct DelayLine {
    channels: Vec<Vec<f32>>,
    write_pos: usize,
    buffer_len: usize,
}

impl DelayLine {
    /// Extra slots so the interpolator's outer taps stay inside the ring
    const GUARD: usize = 4;

    /// Empty line; call [`prepare`](Self::prepare) before use
    pub fn new() -> Self {
        Self {
            channels: Vec::new(),
            write_pos: 0,
            buffer_len: 0,
        }
    }

    /// Allocate `channels` rings able to hold `max_delay_samples`
    pub fn prepare(&mut self, channels: usize, max_delay_samples: usize) {
        self.buffer_len = max_delay_samples + Self::GUARD;
        self.channels = vec![vec![0.0; self.buffer_len]; channels];
        self.write_pos = 0;
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Longest delay that can be read
    pub fn max_delay_samples(&self) -> usize {
        self.buffer_len.saturating_sub(Self::GUARD)
    }

    #[inline]
    fn tap(&self, channel: &[f32], delay: usize) -> f32 {
        channel[(self.write_pos + self.buffer_len - delay) % self.buffer_len]
    }

    /// Read `delay_samples` behind the write head
    ///
    /// The delay is clamped to `[1, max_delay_samples]`. Unprepared
    /// channels read silence.
    #[inline]
    pub fn read(&self, channel: usize, delay_samples: f32) -> f32 {
        let Some(ring) = self.channels.get(channel) else {
            return 0.0;
        };
        let max = self.max_delay_samples().max(1) as f32;
        let delay = delay_samples.clamp(1.0, max);

        let int = delay as usize;
        let t = delay - int as f32;

        let y0 = self.tap(ring, int);
        // Zero ticks back is the slot about to be overwritten
        let ym1 = if int > 1 { self.tap(ring, int - 1) } else { y0 };
        let y1 = self.tap(ring, int + 1);
        let y2 = self.tap(ring, int + 2);

        let tp1 = t + 1.0;
        let tm1 = t - 1.0;
        let tm2 = t - 2.0;

        ym1 * (-t * tm1 * tm2 / 6.0)
            + y0 * (tp1 * tm1 * tm2 / 2.0)
            + y1 * (-tp1 * t * tm2 / 2.0)
            + y2 * (tp1 * t * tm1 / 6.0)
    }

    /// Store a sample at the write head of `channel`
    ///
    /// Does not advance the head.
    #[inline]
    pub fn write(&mut self, channel: usize, sample: f32) {
        let pos = self.write_pos;
        if let Some(ring) = self.channels.get_mut(channel) {
            ring[pos] = sample;
        }
    }

    /// Move the shared write head forward one sample
    #[inline]
    pub fn advance(&mut self) {
        if self.buffer_len > 0 {
            self.write_pos = (self.write_pos + 1) % self.buffer_len;
        }
    }

    /// Silence every ring and rewind the head, keeping the allocation
    pub fn clear(&mut self) {
        for ring in &mut self.channels {
            ring.fill(0.0);
        }
        self.write_pos = 0;
    }
}

impl Default for DelayLine {
    fn default() -> Self {
        Self::new()
    }
}
