//! Expansion audio generators: VRC6 pulses and sawtooth, Sunsoft 5B tones.
//!
//! The MMC5 pulses reuse the native pulse block and are not defined here.
//! Register traffic arrives through the APU's EXT write path; the mappers
//! forward their audio-range writes there.

use serde::{Deserialize, Serialize};

/// VRC6 pulse: 4-bit volume, 3-bit duty threshold, or a digitized mode that
/// outputs the volume directly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Vrc6Pulse {
    pub(crate) enabled: bool,
    pub(crate) mode: bool,
    pub(crate) volume: u8,
    pub(crate) duty_value: u8,
    pub(crate) duty_cycle: u8,
    pub(crate) output: u8,
    pub(crate) divider: u16,
    pub(crate) frequency: u16,
}

impl Vrc6Pulse {
    pub(crate) fn step_timer(&mut self, oc_shift: u8) {
        if self.divider == 0 {
            self.divider = self.frequency.wrapping_shl(u32::from(oc_shift));

            if self.duty_value == 0 {
                self.duty_value = 15;
            } else {
                self.duty_value -= 1;
            }

            self.output = if self.enabled && (self.duty_value <= self.duty_cycle || self.mode) {
                self.volume
            } else {
                0
            };
        } else {
            self.divider -= 1;
        }
    }
}

/// VRC6 sawtooth: a 6-bit accumulation rate added every other clock, output
/// from the top five bits, reset every 14 clocks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Vrc6Saw {
    pub(crate) enabled: bool,
    pub(crate) clock: u8,
    pub(crate) accum_rate: u8,
    pub(crate) accumulator: u8,
    pub(crate) output: u8,
    pub(crate) divider: u16,
    pub(crate) frequency: u16,
}

impl Vrc6Saw {
    pub(crate) fn step_timer(&mut self, oc_shift: u8) {
        if self.divider == 0 {
            self.divider = self.frequency.wrapping_shl(u32::from(oc_shift));

            if self.clock == 0 {
                self.accumulator = 0;
            } else if self.clock & 1 == 0 {
                self.accumulator = self.accumulator.wrapping_add(self.accum_rate);
                self.output = if self.enabled {
                    (self.accumulator & 0xF8) >> 3
                } else {
                    0
                };
            }

            self.clock += 1;
            if self.clock == 14 {
                self.clock = 0;
            }
        } else {
            self.divider -= 1;
        }
    }
}

/// One Sunsoft 5B tone channel: a square generator behind a /16 prescaler
/// with a 4-bit volume mapped to a pseudo-logarithmic level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Ss5b {
    pub(crate) disable: bool,
    pub(crate) output: u8,
    pub(crate) flip: bool,
    pub(crate) volume: u8,
    pub(crate) frequency: u16,
    pub(crate) counter: u16,
    pub(crate) divider: u16,
}

impl Ss5b {
    pub(crate) fn step_timer(&mut self, oc_shift: u8) {
        self.divider += 1;
        if self.divider == 16 {
            self.counter += 1;
            if self.counter >= self.frequency.wrapping_shl(u32::from(oc_shift)) {
                self.flip = !self.flip;
                self.output = if self.flip && !self.disable {
                    (self.volume << 1) + u8::from(self.volume > 0)
                } else {
                    0
                };
                self.counter = 0;
            }

            self.divider = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vrc6_pulse_duty_threshold_gates_output() {
        let mut p = Vrc6Pulse {
            enabled: true,
            volume: 9,
            duty_cycle: 7,
            frequency: 0,
            ..Vrc6Pulse::default()
        };

        let mut highs = 0;
        for _ in 0..16 {
            p.step_timer(0);
            if p.output == 9 {
                highs += 1;
            }
        }
        // Threshold 7 keeps the output high for 8 of 16 steps.
        assert_eq!(highs, 8);
    }

    #[test]
    fn vrc6_digitized_mode_is_always_high() {
        let mut p = Vrc6Pulse {
            enabled: true,
            mode: true,
            volume: 5,
            frequency: 0,
            ..Vrc6Pulse::default()
        };
        for _ in 0..20 {
            p.step_timer(0);
            assert_eq!(p.output, 5);
        }
    }

    #[test]
    fn saw_ramps_and_resets_every_seven_additions() {
        let mut s = Vrc6Saw {
            enabled: true,
            accum_rate: 8,
            frequency: 0,
            ..Vrc6Saw::default()
        };
        let mut peak = 0;
        for _ in 0..28 {
            s.step_timer(0);
            peak = peak.max(s.output);
        }
        // Six additions of 8 reach 48; the top five bits give 6.
        assert_eq!(peak, 6);
    }

    #[test]
    fn ss5b_output_scales_with_volume() {
        let mut c = Ss5b {
            volume: 0x0F,
            frequency: 1,
            ..Ss5b::default()
        };
        let mut peak = 0;
        for _ in 0..200 {
            c.step_timer(0);
            peak = peak.max(c.output);
        }
        assert_eq!(peak, 0x1F);
    }
}
