//! Linear parameter ramps
//!
//! A [`LinearSmoother`] walks from its current value to a target in a fixed
//! number of steps. Its cursor must be advanced once per sample, whether or
//! not the value is read, so block-rate consumers draw one value and then
//! [`advance`](LinearSmoother::advance) the remainder of the block.

/// Linear ramp toward a target value
///
/// Holds `{current, target, step}` plus the number of steps left. Changing
/// the ramp time never resets `current`; only the speed toward the target
/// changes.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearSmoother {
    current: f32,
    target: f32,
    step: f32,
    countdown: usize,
    ramp_steps: usize,
}

impl LinearSmoother {
    /// Create a smoother resting at `initial` with no ramp time
    pub fn new(initial: f32) -> Self {
        Self {
            current: initial,
            target: initial,
            step: 0.0,
            countdown: 0,
            ramp_steps: 0,
        }
    }

    /// Set the ramp length in seconds at the given sample rate
    ///
    /// A no-op when the length in samples is unchanged. If a ramp is in
    /// flight it restarts from the current value with the new length.
    pub fn set_ramp_time(&mut self, sample_rate: f32, seconds: f32) {
        let steps = (sample_rate.max(0.0) * seconds.max(0.0)).round() as usize;
        if steps == self.ramp_steps {
            return;
        }
        self.ramp_steps = steps;

        if self.countdown > 0 {
            if steps == 0 {
                self.snap_to_target();
            } else {
                self.countdown = steps;
                self.step = (self.target - self.current) / steps as f32;
            }
        }
    }

    /// Start ramping toward a new target
    pub fn set_target(&mut self, target: f32) {
        if target == self.target {
            return;
        }
        self.target = target;

        if self.ramp_steps == 0 {
            self.snap_to_target();
            return;
        }

        self.countdown = self.ramp_steps;
        self.step = (self.target - self.current) / self.ramp_steps as f32;
    }

    /// Jump to `value` and stop any ramp
    pub fn set_current_and_target(&mut self, value: f32) {
        self.target = value;
        self.snap_to_target();
    }

    /// Finish the current ramp immediately
    pub fn snap_to_target(&mut self) {
        self.current = self.target;
        self.countdown = 0;
        self.step = 0.0;
    }

    /// Advance one sample and return the new value
    #[inline]
    pub fn next_value(&mut self) -> f32 {
        if self.countdown == 0 {
            return self.target;
        }

        self.countdown -= 1;
        if self.countdown == 0 {
            self.current = self.target;
        } else {
            self.current += self.step;
        }
        self.current
    }

    /// Advance `samples` steps without producing values
    #[inline]
    pub fn advance(&mut self, samples: usize) {
        if samples >= self.countdown {
            if self.countdown > 0 {
                self.snap_to_target();
            }
            return;
        }

        self.current += self.step * samples as f32;
        self.countdown -= samples;
    }

    /// Value the ramp is currently at
    #[inline]
    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    /// Whether a ramp is still in flight
    pub fn is_smoothing(&self) -> bool {
        self.countdown > 0
    }

    /// Remaining steps before the target is reached
    pub fn remaining_steps(&self) -> usize {
        self.countdown
    }
}

impl Default for LinearSmoother {
    fn default() -> Self {
        Self::new(0.0)
    }
}
