//! nesto-core: a cycle-accurate NES/Famicom emulator core.
//!
//! The machine is driven one CPU cycle at a time: every bus access advances
//! the PPU three dots and the APU one step, with DMA stalls, open-bus
//! behavior, and mapper IRQ clocking modelled at that granularity. The host
//! calls [`Nes::next_frame`] in a loop; each call runs until the PPU
//! completes a 256x240 frame and hands back pixels plus the accumulated
//! audio batch.
//!
//! ```no_run
//! use nesto_core::{Buttons, Config, Nes};
//!
//! let mut nes = Nes::new(Config::default());
//! nes.load_cart(&std::fs::read("game.nes").unwrap(), None, None).unwrap();
//! nes.controller_button(0, Buttons::START, true);
//! nes.next_frame(
//!     |pixels| { /* present 256x240 ABGR */ let _ = pixels; },
//!     |samples, pairs| { /* queue interleaved stereo */ let _ = (samples, pairs); },
//! );
//! ```

pub(crate) mod apu;
pub(crate) mod bus;
pub(crate) mod cartridge;
pub mod config;
pub(crate) mod controller;
pub(crate) mod cpu;
pub mod error;
pub(crate) mod emulator;
pub(crate) mod interrupt;
pub mod log;
pub(crate) mod mem_block;
pub(crate) mod memory;
pub(crate) mod ppu;
pub(crate) mod state;

pub use cartridge::header::{CartDesc, Mirror};
pub use config::{Channels, Config, Palette};
pub use controller::Buttons;
pub use emulator::Nes;
pub use error::Error;
pub use log::{LogCallback, set_log_callback};
pub use ppu::{FRAME_HEIGHT, FRAME_WIDTH};
