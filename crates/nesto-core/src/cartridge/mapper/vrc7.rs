//! Mapper 85 (Konami VRC7).
//!
//! Three 8 KiB PRG banks, eight 1 KiB CHR banks, mirroring, and the shared
//! VRC IRQ engine. The YM2413-derived FM synth is not modelled; writes to
//! its register pair are accepted and dropped.

use serde::{Deserialize, Serialize};

use crate::cartridge::bank_window::Backing;
use crate::cartridge::mapper::{CartCtx, vrc};
use crate::log::core_log;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Vrc7 {}

impl Vrc7 {
    pub(crate) fn new(ctx: &mut CartCtx<'_>) -> Self {
        let last = ctx.prg_rom_last_bank(8);
        ctx.map_prg(Backing::Rom, 0xE000, last, 8);

        if !ctx.mem.prg_ram.is_empty() {
            ctx.map_prg(Backing::Ram, 0x6000, 0, 8);
        }

        ctx.irq.scanline = 341;

        Self {}
    }

    pub(crate) fn prg_write(&mut self, ctx: &mut CartCtx<'_>, addr: u16, v: u8) {
        if (0x6000..0x8000).contains(&addr) {
            ctx.prg_window_write(addr, v);
            return;
        }
        if addr < 0x8000 {
            return;
        }

        // Registers decode on A12-A15 plus A3/A4 (both wirings OR together).
        let reg = (addr & 0xF000) | if addr & 0x0018 != 0 { 0x0008 } else { 0 };

        match reg {
            0x8000 => ctx.map_prg(Backing::Rom, 0x8000, u16::from(v) & 0x3F, 8),
            0x8008 => ctx.map_prg(Backing::Rom, 0xA000, u16::from(v) & 0x3F, 8),
            0x9000 => ctx.map_prg(Backing::Rom, 0xC000, u16::from(v) & 0x3F, 8),
            // FM synthesizer address/data pair.
            0x9008 => {}
            0xA000 | 0xA008 | 0xB000 | 0xB008 | 0xC000 | 0xC008 | 0xD000 | 0xD008 => {
                let slot = ((reg >> 12) - 0xA) * 2 + u16::from(reg & 8 != 0);
                ctx.map_chr(ctx.chr_backing(), slot * 0x0400, u16::from(v), 1);
            }
            0xE000 => vrc::mirror_control(ctx, v & 0x03),
            0xE008 => ctx.irq.value = u16::from(v),
            0xF000 => vrc::irq_control(ctx.irq, v),
            0xF008 => vrc::irq_ack(ctx.irq),
            _ => core_log!("Uncaught VRC7 write {addr:x}: {v:x}"),
        }
    }
}
