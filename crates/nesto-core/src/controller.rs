//! Standard controllers on `$4016`/`$4017`.
//!
//! Each port holds a 32-bit state word: the primary pad in bits 0-7, the
//! famicom four-player expansion pad in bits 8-15, and a fixed signature
//! nibble in bits 16-19 (0x8 for port 1, 0x4 for port 2). A strobe
//! high-to-low edge on `$4016` latches the state words into the shift
//! registers; reads return bit 0 and shift, with a 1 forced into bit 7 on
//! every shift so reads past the first eight return 1. Those injected ones
//! reach bit 0 before the expansion bits do, so the upper slots and the
//! signature nibble are latch-side state only and never surface on the
//! serial reads.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Button bits as they appear in the shift register (A first).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Buttons: u8 {
        const A      = 0x01;
        const B      = 0x02;
        const SELECT = 0x04;
        const START  = 0x08;
        const UP     = 0x10;
        const DOWN   = 0x20;
        const LEFT   = 0x40;
        const RIGHT  = 0x80;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Controllers {
    strobe: bool,
    state: [u32; 2],
    bits: [u32; 2],
    buttons: [u8; 4],
    safe_buttons: [u8; 4],
}

impl Controllers {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Updates one button for one of the four players.
    pub(crate) fn set_button(&mut self, player: u8, button: Buttons, pressed: bool) {
        let Some(slot) = self.buttons.get_mut(player as usize) else {
            return;
        };
        if pressed {
            *slot |= button.bits();
        } else {
            *slot &= !button.bits();
        }
        self.sanitize(player);
    }

    /// Replaces the whole button byte for one player.
    pub(crate) fn set_state(&mut self, player: u8, state: u8) {
        let Some(slot) = self.buttons.get_mut(player as usize) else {
            return;
        };
        *slot = state;
        self.sanitize(player);
    }

    /// Applies the d-pad mutual-exclusion rules and refreshes the port word.
    fn sanitize(&mut self, player: u8) {
        let player = player as usize;
        let prev = self.safe_buttons[player];
        let mut state = self.buttons[player];

        // Up + down cancel out.
        if state & 0x30 == 0x30 {
            state &= 0xCF;
        }
        // Left + right cancel out.
        if state & 0xC0 == 0xC0 {
            state &= 0x3F;
        }

        self.safe_buttons[player] = state;
        if prev != state {
            self.refresh_port(player as u8, state);
        }
    }

    fn refresh_port(&mut self, player: u8, state: u8) {
        let state = u32::from(state);
        match player {
            0 => self.state[0] = (self.state[0] & 0x00FF_FF00) | (0x8 << 16) | state,
            1 => self.state[1] = (self.state[1] & 0x00FF_FF00) | (0x4 << 16) | state,
            2 => self.state[0] = (self.state[0] & 0x0000_00FF) | (0x8 << 16) | (state << 8),
            3 => self.state[1] = (self.state[1] & 0x0000_00FF) | (0x4 << 16) | (state << 8),
            _ => {}
        }
    }

    /// `$4016` write: a 1-to-0 transition of bit 0 snapshots the state words.
    pub(crate) fn write_strobe(&mut self, strobe: bool) {
        if self.strobe && !strobe {
            self.bits = self.state;
        }
        self.strobe = strobe;
    }

    /// Serial read of port `n` (0 or 1). Bits 6-7 of the value float high on
    /// the data bus; only bit 0 carries pad data.
    pub(crate) fn read(&mut self, n: usize) -> u8 {
        if self.strobe {
            return 0x40 | (self.state[n] & 1) as u8;
        }

        let r = 0x40 | (self.bits[n] & 1) as u8;
        self.bits[n] = 0x80 | (self.bits[n] >> 1);
        r
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}
