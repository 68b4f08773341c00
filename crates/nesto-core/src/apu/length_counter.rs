//! Length counter gate shared by the four framed channels.
//!
//! Reloads that land on the exact cycle of a half-frame clock interact with
//! the clock: a reload into a zero counter suppresses the clock that would
//! otherwise immediately eat it, and a reload into a non-zero counter loses
//! to the clock. Halt-flag changes take effect one CPU cycle late; channels
//! stage them through `next_enabled`.

use serde::{Deserialize, Serialize};

pub(crate) const LENGTH_TABLE: [u8; 32] = [
    10, 254, 20, 2, 40, 4, 80, 6, 160, 8, 60, 10, 14, 12, 26, 14, 12, 16, 24, 18, 48, 20, 96, 22,
    192, 24, 72, 26, 16, 28, 32, 30,
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct LengthCounter {
    pub(crate) enabled: bool,
    pub(crate) next_enabled: bool,
    skip_clock: bool,
    pub(crate) value: u8,
}

impl LengthCounter {
    /// Half-frame clock.
    pub(crate) fn step(&mut self) {
        if self.skip_clock {
            self.skip_clock = false;
            return;
        }

        if self.enabled && self.value > 0 {
            self.value -= 1;
        }
    }

    /// Register write reloading the counter from the length table.
    pub(crate) fn reload(
        &mut self,
        channel_enabled: bool,
        v: u8,
        in_length_cycle: bool,
        oc_shift: u8,
    ) {
        self.skip_clock = self.value == 0 && in_length_cycle;
        let ignore_reload = self.value != 0 && in_length_cycle;

        if channel_enabled && !ignore_reload {
            self.value = LENGTH_TABLE[usize::from(v >> 3)].wrapping_shl(u32::from(oc_shift));
        }
    }

    /// One-cycle-delayed halt flag propagation.
    pub(crate) fn apply_delayed_enable(&mut self) {
        self.enabled = self.next_enabled;
    }
}
