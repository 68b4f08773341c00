//! Mapper 69 (Sunsoft FME-7 / 5A / 5B).
//!
//! Sixteen command registers selected via `$8000` and written via `$A000`:
//! eight CHR banks, four PRG slots (slot 0 can be RAM with an enable bit),
//! mirroring, and a 16-bit cycle-counting IRQ. `$C000`/`$E000` drive the
//! 5B's AY-derived expansion audio through the APU's EXT inputs.

use serde::{Deserialize, Serialize};

use crate::apu::{Apu, ExtAudio};
use crate::cartridge::bank_window::Backing;
use crate::cartridge::header::Mirror;
use crate::cartridge::mapper::{CartCtx, MapperIrq};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Fme7 {
    command: u8,
    audio_command: u8,
    ram_enable: bool,
}

impl Fme7 {
    pub(crate) fn new(ctx: &mut CartCtx<'_>) -> Self {
        let last = ctx.prg_rom_last_bank(8);
        ctx.map_prg(Backing::Rom, 0xE000, last, 8);

        if !ctx.mem.prg_ram.is_empty() {
            ctx.map_prg(Backing::Ram, 0x6000, 0, 8);
        }

        ctx.map_ciram(Mirror::Vertical);

        Self {
            command: 0,
            audio_command: 0,
            ram_enable: false,
        }
    }

    pub(crate) fn prg_write(&mut self, ctx: &mut CartCtx<'_>, apu: &mut Apu, addr: u16, v: u8) {
        match addr {
            0x6000..=0x7FFF => {
                if self.ram_enable {
                    ctx.prg_window_write(addr, v);
                }
            }
            0x8000..=0x9FFF => self.command = v & 0x0F,
            0xA000..=0xBFFF => self.run_command(ctx, v),
            0xC000..=0xDFFF => self.audio_command = v & 0x0F,
            0xE000..=0xFFFF => {
                if matches!(self.audio_command, 0x00..=0x05 | 0x07..=0x0A) {
                    apu.ext_write(0xE000 | u16::from(self.audio_command), v, ExtAudio::Ss5b);
                }
            }
            _ => {}
        }
    }

    fn run_command(&mut self, ctx: &mut CartCtx<'_>, v: u8) {
        match self.command {
            0x0..=0x7 => {
                ctx.map_chr(Backing::Rom, u16::from(self.command) * 0x0400, u16::from(v), 1);
            }
            0x8 => {
                // PRG slot 0: RAM or ROM at $6000, with a chip enable.
                let ram = v & 0x40 != 0;
                self.ram_enable = v & 0x80 != 0;
                ctx.map_prg(
                    if ram { Backing::Ram } else { Backing::Rom },
                    0x6000,
                    u16::from(v) & 0x3F,
                    8,
                );

                if ram && !self.ram_enable {
                    ctx.prg.unmap(crate::cartridge::bank_window::VIEW_SPR, 0x6000);
                    ctx.prg.unmap(crate::cartridge::bank_window::VIEW_SPR, 0x7000);
                }
            }
            0x9..=0xB => {
                let addr = 0x8000 + (u16::from(self.command) - 0x9) * 0x2000;
                ctx.map_prg(Backing::Rom, addr, u16::from(v) & 0x3F, 8);
            }
            0xC => match v & 0x03 {
                0 => ctx.map_ciram(Mirror::Vertical),
                1 => ctx.map_ciram(Mirror::Horizontal),
                2 => ctx.map_ciram(Mirror::Single0),
                _ => ctx.map_ciram(Mirror::Single1),
            },
            0xD => {
                ctx.irq.enable = v & 0x01 != 0;
                ctx.irq.cycle_mode = v & 0x80 != 0;
                ctx.irq.ack = true;
            }
            0xE => ctx.irq.value = (ctx.irq.value & 0xFF00) | u16::from(v),
            _ => ctx.irq.value = (ctx.irq.value & 0x00FF) | (u16::from(v) << 8),
        }
    }

    pub(crate) fn step(&mut self, irq: &mut MapperIrq) {
        if irq.ack {
            irq.line = false;
            irq.ack = false;
        }

        if irq.cycle_mode {
            irq.value = irq.value.wrapping_sub(1);
            if irq.value == 0xFFFF && irq.enable {
                irq.line = true;
            }
        }
    }
}
