//! Save states.
//!
//! The blob is a postcard encoding of the subsystems in fixed order: CPU,
//! APU, PPU, cartridge (including its memory regions), system bus,
//! controllers, interrupt latches. Bank-window slots carry region
//! discriminators and offsets rather than pointers, so nothing needs
//! rewiring after a restore; only the derived runtime tables (palette LUTs,
//! the audio resampler) are rebuilt. Restores are all-or-nothing: a decode
//! or shape failure leaves the running state untouched.

use serde::{Deserialize, Serialize};

use crate::apu::Apu;
use crate::bus::SysState;
use crate::cartridge::Cartridge;
use crate::controller::Controllers;
use crate::cpu::Cpu;
use crate::emulator::Nes;
use crate::error::Error;
use crate::interrupt::IrqLines;
use crate::log::core_log;
use crate::ppu::Ppu;

#[derive(Serialize, Deserialize)]
struct FullState {
    cpu: Cpu,
    apu: Apu,
    ppu: Ppu,
    cart: Cartridge,
    sys: SysState,
    ctrl: Controllers,
    ints: IrqLines,
}

impl Nes {
    /// Serializes the complete machine state. `None` without a cartridge.
    pub fn get_state(&self) -> Option<Vec<u8>> {
        let cart = self.cart.as_ref()?;

        let state = FullState {
            cpu: self.cpu,
            apu: self.apu.clone(),
            ppu: self.ppu.clone(),
            cart: cart.clone(),
            sys: self.sys.clone(),
            ctrl: self.ctrl,
            ints: self.ints,
        };

        postcard::to_allocvec(&state).ok()
    }

    /// Restores a blob produced by [`Nes::get_state`].
    pub fn set_state(&mut self, blob: &[u8]) -> Result<(), Error> {
        if self.cart.is_none() {
            return Err(Error::NoCart);
        }

        let state: FullState = postcard::from_bytes(blob).map_err(|_| {
            core_log!("Save state failed to decode");
            Error::BadState
        })?;

        if !state.ppu.shape_ok() {
            core_log!("Save state has the wrong shape");
            return Err(Error::BadState);
        }

        self.cpu = state.cpu;
        self.apu = state.apu;
        self.ppu = state.ppu;
        self.cart = Some(state.cart);
        self.sys = state.sys;
        self.ctrl = state.ctrl;
        self.ints = state.ints;

        // Derived tables are not serialized.
        self.ppu.rebuild_runtime();
        self.apu.rebuild_runtime();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;

    fn machine() -> Nes {
        let rom = crate::cartridge::tests::build_rom(0, 2, 1);
        let mut nes = Nes::new(Config::default());
        nes.load_cart(&rom, None, None).expect("load");
        nes
    }

    #[test]
    fn state_requires_a_cartridge() {
        let nes = Nes::new(Config::default());
        assert!(nes.get_state().is_none());
    }

    #[test]
    fn identical_machines_produce_identical_blobs() {
        let a = machine();
        let b = machine();
        assert_eq!(a.get_state(), b.get_state());
    }

    #[test]
    fn garbage_blobs_are_rejected_and_leave_state_intact() {
        let mut nes = machine();
        let before = nes.get_state().expect("state");

        assert!(matches!(nes.set_state(&[1, 2, 3]), Err(Error::BadState)));
        assert_eq!(nes.get_state().expect("state"), before);
    }

    #[test]
    fn round_trip_restores_the_machine() {
        let mut nes = machine();
        nes.next_frame(|_| {}, |_, _| {});
        let blob = nes.get_state().expect("state");

        let mut other = machine();
        other.set_state(&blob).expect("restore");
        assert_eq!(other.get_state().expect("state"), blob);
    }
}
