//! APU frame counter (the quarter/half-frame sequencer).
//!
//! NTSC timeline in CPU cycles. Four-step mode: 7457, 14913, 22371, then the
//! IRQ window across 29828-29830 with the half clock at 29829 and wrap at
//! 29830. Five-step mode: 7457, 14913, 22371, 37281, wrap at 37282. Writing
//! `$4017` schedules a counter reset 3 cycles later when the write lands on
//! an odd CPU cycle, 4 otherwise; a reset into five-step mode clocks the
//! quarter and half units immediately.

use serde::{Deserialize, Serialize};

/// Which units to clock after a frame-counter step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct FrameTick {
    pub(crate) quarter: bool,
    pub(crate) half: bool,
    /// MMC5's channels clock on a fixed cadence independent of the mode.
    pub(crate) mmc5: bool,
    pub(crate) irq: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct FrameCounter {
    pub(crate) mode5: bool,
    next_mode5: bool,
    pub(crate) irq_disabled: bool,
    delayed_reset: u8,
    counter: i64,
}

impl FrameCounter {
    /// `$4017` write. Returns true when the frame IRQ flag must be cleared.
    pub(crate) fn write(&mut self, v: u8, odd_cycle: bool) -> bool {
        self.next_mode5 = v & 0x80 != 0;
        self.irq_disabled = v & 0x40 != 0;
        self.delayed_reset = if odd_cycle { 3 } else { 4 };
        self.irq_disabled
    }

    /// True on the exact cycles where the half-frame clock fires; length
    /// reloads landing here interact with the clock.
    pub(crate) fn in_length_cycle(&self) -> bool {
        self.counter == 14913 || self.counter == if self.mode5 { 37281 } else { 29828 }
    }

    /// Advances the sequence for the current cycle. The sequencer holds
    /// still during the tail of a delayed five-step reset.
    pub(crate) fn step_sequence(&mut self) -> FrameTick {
        let mut tick = FrameTick::default();

        if self.delayed_reset > 0 && self.delayed_reset < 3 && self.mode5 {
            return tick;
        }

        match self.counter {
            7457 | 22371 => {
                tick.quarter = true;
                tick.mmc5 = true;
            }
            14913 => {
                tick.quarter = true;
                tick.half = true;
                tick.mmc5 = true;
            }
            29828 => {
                if !self.mode5 && !self.irq_disabled {
                    tick.irq = true;
                }
            }
            29829 => {
                if !self.mode5 {
                    if !self.irq_disabled {
                        tick.irq = true;
                    }
                    tick.quarter = true;
                    tick.half = true;
                }
                tick.mmc5 = true;
            }
            29830 => {
                if !self.mode5 {
                    if !self.irq_disabled {
                        tick.irq = true;
                    }
                    self.counter = 0;
                }
            }
            37281 => {
                if self.mode5 {
                    tick.quarter = true;
                    tick.half = true;
                }
            }
            37282 => {
                if self.mode5 {
                    self.counter = 0;
                }
            }
            _ => {}
        }

        tick
    }

    /// Applies the staged mode and the delayed reset countdown. Returns true
    /// when the reset lands in five-step mode, which clocks quarter and half
    /// units up front.
    pub(crate) fn finish_cycle(&mut self) -> bool {
        self.mode5 = self.next_mode5;

        if self.delayed_reset > 0 {
            self.delayed_reset -= 1;
            if self.delayed_reset == 0 {
                self.counter = 0;
                return self.mode5;
            }
        }
        false
    }

    pub(crate) fn advance(&mut self) {
        self.counter += 1;
    }

    pub(crate) fn reset(&mut self, hard: bool) {
        self.counter = 0;
        self.delayed_reset = 0;
        if hard {
            self.mode5 = false;
            self.next_mode5 = false;
            self.irq_disabled = false;
        }
    }
}
