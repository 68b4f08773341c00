//! Triangle channel.

use serde::{Deserialize, Serialize};

use super::Timer;

const TRIANGLE_TABLE: [u8; 32] = [
    15, 14, 13, 12, 11, 10, 9, 8, 7, 6, 5, 4, 3, 2, 1, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11,
    12, 13, 14, 15,
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct LinearCounter {
    pub(crate) reload: bool,
    pub(crate) period: u8,
    pub(crate) value: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Triangle {
    pub(crate) enabled: bool,
    pub(crate) output: u8,
    /// Suppresses output until the ramp first reaches its peak, avoiding the
    /// power-on click from an uninitialized sequencer position.
    pop: bool,
    pub(crate) timer: Timer,
    pub(crate) len: super::length_counter::LengthCounter,
    pub(crate) counter: LinearCounter,
    duty_value: u8,
}

impl Triangle {
    /// Timer clock (every CPU cycle).
    pub(crate) fn step_timer(&mut self, oc_shift: u8) {
        if self.timer.value == 0 {
            self.timer.value = self.timer.period.wrapping_shl(u32::from(oc_shift));

            // A period of 0 would produce ultrasonic tones; hold instead.
            if self.len.value > 0 && self.counter.value > 0 && self.timer.period > 0 {
                self.duty_value = (self.duty_value + 1) % 32;
            }

            if !self.pop && self.duty_value >= 15 {
                self.pop = true;
            }

            self.output = if self.pop {
                TRIANGLE_TABLE[usize::from(self.duty_value)]
            } else {
                0
            };
        } else {
            self.timer.value -= 1;
        }
    }

    /// Quarter-frame linear counter clock.
    pub(crate) fn step_counter(&mut self, oc_shift: u8) {
        if self.counter.reload {
            self.counter.value = self.counter.period.wrapping_shl(u32::from(oc_shift));
        } else if self.counter.value > 0 {
            self.counter.value -= 1;
        }

        if self.len.enabled {
            self.counter.reload = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_until_the_ramp_reaches_peak() {
        let mut t = Triangle {
            enabled: true,
            ..Triangle::default()
        };
        t.timer.period = 2;
        t.len.value = 100;
        t.counter.value = 100;

        let mut first_nonzero_step = None;
        for step in 0..200 {
            t.step_timer(0);
            if first_nonzero_step.is_none() && t.output != 0 {
                first_nonzero_step = Some(step);
            }
        }
        // The first audible sample appears only once duty has walked past
        // the ramp's quiet start.
        assert!(first_nonzero_step.is_some());
        assert!(first_nonzero_step.unwrap_or(0) > 10);
    }

    #[test]
    fn linear_counter_reload_holds_while_halted() {
        let mut t = Triangle::default();
        t.counter.period = 5;
        t.counter.reload = true;
        t.len.enabled = false;

        t.step_counter(0);
        assert_eq!(t.counter.value, 5);
        // Halt keeps the reload flag armed.
        t.step_counter(0);
        assert_eq!(t.counter.value, 5);

        t.len.enabled = true;
        t.step_counter(0);
        assert_eq!(t.counter.value, 5);
        t.step_counter(0);
        assert_eq!(t.counter.value, 4);
    }
}
