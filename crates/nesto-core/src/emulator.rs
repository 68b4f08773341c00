//! The host-facing emulator aggregate.
//!
//! [`Nes`] owns every subsystem; the cartridge is optional and replaced
//! wholesale on load. Each CPU step borrows the peers into a fresh
//! [`SysBus`] view, so no subsystem ever holds a reference to another.

use crate::apu::Apu;
use crate::bus::{SysBus, SysState};
use crate::cartridge::Cartridge;
use crate::cartridge::header::CartDesc;
use crate::config::Config;
use crate::controller::{Buttons, Controllers};
use crate::cpu::Cpu;
use crate::error::Error;
use crate::interrupt::IrqLines;
use crate::ppu::Ppu;

pub struct Nes {
    pub(crate) cfg: Config,
    pub(crate) cpu: Cpu,
    pub(crate) ppu: Ppu,
    pub(crate) apu: Apu,
    pub(crate) sys: SysState,
    pub(crate) ctrl: Controllers,
    pub(crate) ints: IrqLines,
    pub(crate) cart: Option<Cartridge>,
}

impl Nes {
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            cpu: Cpu::new(),
            ppu: Ppu::new(&cfg),
            apu: Apu::new(&cfg),
            sys: SysState::new(),
            ctrl: Controllers::new(),
            ints: IrqLines::default(),
            cart: None,
        }
    }

    /// Loads a cartridge and hard-resets the machine. On failure the
    /// previously loaded cartridge (if any) stays in place.
    pub fn load_cart(
        &mut self,
        rom: &[u8],
        sram: Option<&[u8]>,
        desc: Option<CartDesc>,
    ) -> Result<(), Error> {
        let cart = Cartridge::create(rom, sram, desc)?;
        self.cart = Some(cart);
        self.reset(true);
        Ok(())
    }

    pub fn unload_cart(&mut self) {
        self.cart = None;
    }

    pub fn cart_loaded(&self) -> bool {
        self.cart.is_some()
    }

    /// Hard reset clears RAM; soft reset preserves it. Both pull the CPU
    /// reset vector. A no-op without a cartridge.
    pub fn reset(&mut self, hard: bool) {
        let Some(cart) = self.cart.as_mut() else {
            return;
        };

        self.sys.reset(hard);
        self.ctrl.reset();
        self.ints.reset();
        self.ppu.reset();
        self.apu.reset(hard);

        let mut bus = SysBus {
            sys: &mut self.sys,
            ppu: &mut self.ppu,
            apu: &mut self.apu,
            cart,
            ctrl: &mut self.ctrl,
            ints: &mut self.ints,
        };
        self.cpu.reset(&mut bus, hard);
    }

    /// Runs the machine until the PPU finishes a frame, then hands the
    /// pixel buffer and the audio batch to the callbacks (audio first).
    /// Returns the number of CPU cycles consumed.
    ///
    /// Pixels are packed ABGR (`0xFFBBGGRR` little-endian). Audio is always
    /// interleaved stereo pairs (mono duplicates the sample into both
    /// slots); the count passed to the callback is the number of pairs.
    pub fn next_frame(
        &mut self,
        mut video: impl FnMut(&[u32]),
        mut audio: impl FnMut(&[i16], u32),
    ) -> u32 {
        let Some(cart) = self.cart.as_mut() else {
            return 0;
        };

        let start = self.sys.cycle;

        while !self.ppu.new_frame() {
            let mut bus = SysBus {
                sys: &mut self.sys,
                ppu: &mut self.ppu,
                apu: &mut self.apu,
                cart,
                ctrl: &mut self.ctrl,
                ints: &mut self.ints,
            };
            self.cpu.step(&mut bus);
        }

        let samples = self.apu.frames();
        let pairs = (samples.len() / 2) as u32;
        audio(samples, pairs);
        video(self.ppu.pixels());

        (self.sys.cycle - start) as u32
    }

    /// Updates one button for one of the four players. Takes effect on the
    /// next controller latch, never mid-read.
    pub fn controller_button(&mut self, player: u8, buttons: Buttons, pressed: bool) {
        self.ctrl.set_button(player, buttons, pressed);
    }

    /// Replaces a player's whole button byte.
    pub fn controller_state(&mut self, player: u8, state: u8) {
        self.ctrl.set_state(player, state);
    }

    pub fn set_config(&mut self, cfg: Config) {
        self.cfg = cfg;
        self.ppu.set_config(&cfg);
        self.apu.set_config(&cfg);
    }

    pub fn config(&self) -> Config {
        self.cfg
    }

    /// Host hint: the measured CPU clock drifted from nominal; rebias the
    /// audio resampler to keep the host buffer centered.
    pub fn apu_clock_drift(&mut self, measured_clock: u32, over: bool) {
        self.apu.clock_drift(measured_clock, over);
    }

    /// Bytes of battery RAM written since the last check (read-and-clear).
    pub fn sram_dirty(&mut self) -> usize {
        self.cart.as_mut().map_or(0, |cart| cart.sram_dirty())
    }

    /// Copies battery RAM into `buf` and clears the dirty counter.
    pub fn get_sram(&mut self, buf: &mut [u8]) {
        if let Some(cart) = self.cart.as_mut() {
            cart.sram_copy(buf);
        }
    }

    /// Size of the battery-backed region for `get_sram` buffers.
    pub fn sram_size(&self) -> usize {
        self.cart.as_ref().map_or(0, |cart| cart.sram_size())
    }
}
