//! Envelope generator shared by the pulse and noise channels.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Envelope {
    pub(crate) constant_volume: bool,
    pub(crate) start: bool,
    pub(crate) loop_flag: bool,
    /// Volume / divider period, straight from the register low nybble.
    pub(crate) v: u8,
    divider: u8,
    decay: u8,
}

impl Envelope {
    pub(crate) fn write(&mut self, v: u8) {
        self.loop_flag = v & 0x20 != 0;
        self.constant_volume = v & 0x10 != 0;
        self.v = v & 0x0F;
    }

    /// Quarter-frame clock.
    pub(crate) fn step(&mut self, oc_shift: u8) {
        if !self.start {
            if self.divider == 0 {
                self.divider = self.v.wrapping_shl(u32::from(oc_shift));

                if self.decay == 0 {
                    if self.loop_flag {
                        self.decay = 15;
                    }
                } else {
                    self.decay -= 1;
                }
            } else {
                self.divider -= 1;
            }
        } else {
            self.start = false;
            self.decay = 15;
            self.divider = self.v.wrapping_shl(u32::from(oc_shift));
        }
    }

    /// Current amplitude contribution.
    pub(crate) fn volume(&self) -> u8 {
        if self.constant_volume { self.v } else { self.decay }
    }
}
