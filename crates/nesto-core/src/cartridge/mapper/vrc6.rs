//! Mappers 24 and 26 (Konami VRC6).
//!
//! 16 KiB + 8 KiB PRG banking, eight 1 KiB CHR banks, the shared VRC IRQ
//! engine, and the two-pulse-plus-sawtooth expansion audio routed through
//! the APU's EXT inputs. Mapper 26 swaps A0/A1 on the register decode.

use serde::{Deserialize, Serialize};

use crate::apu::{Apu, ExtAudio};
use crate::cartridge::bank_window::Backing;
use crate::cartridge::mapper::{CartCtx, vrc};
use crate::log::core_log;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Vrc6 {
    swap_a0_a1: bool,
}

impl Vrc6 {
    pub(crate) fn new(ctx: &mut CartCtx<'_>) -> Self {
        let last = ctx.prg_rom_last_bank(8);
        ctx.map_prg(Backing::Rom, 0xE000, last, 8);

        if !ctx.mem.prg_ram.is_empty() {
            ctx.map_prg(Backing::Ram, 0x6000, 0, 8);
        }

        ctx.irq.scanline = 341;

        Self {
            swap_a0_a1: ctx.desc.mapper == 26,
        }
    }

    pub(crate) fn prg_write(&mut self, ctx: &mut CartCtx<'_>, apu: &mut Apu, addr: u16, v: u8) {
        if (0x6000..0x8000).contains(&addr) {
            ctx.prg_window_write(addr, v);
            return;
        }
        if addr < 0x8000 {
            return;
        }

        let addr = if self.swap_a0_a1 {
            (addr & 0xFFFC) | ((addr & 1) << 1) | ((addr >> 1) & 1)
        } else {
            addr
        };

        match addr & 0xF003 {
            0x8000..=0x8003 => ctx.map_prg(Backing::Rom, 0x8000, u16::from(v) & 0x0F, 16),
            // Pulse and sawtooth registers live in the APU expansion block.
            0x9000..=0x9002 | 0xA000..=0xA002 | 0xB000..=0xB002 => {
                apu.ext_write(addr & 0xF003, v, ExtAudio::Vrc6);
            }
            0x9003 => {}
            0xB003 => match (v >> 2) & 0x03 {
                0 => vrc::mirror_control(ctx, 0),
                1 => vrc::mirror_control(ctx, 1),
                2 => vrc::mirror_control(ctx, 3),
                _ => vrc::mirror_control(ctx, 2),
            },
            0xC000..=0xC003 => ctx.map_prg(Backing::Rom, 0xC000, u16::from(v) & 0x1F, 8),
            0xD000..=0xD003 => {
                ctx.map_chr(Backing::Rom, (addr & 3) * 0x0400, u16::from(v), 1);
            }
            0xE000..=0xE003 => {
                ctx.map_chr(Backing::Rom, 0x1000 + (addr & 3) * 0x0400, u16::from(v), 1);
            }
            0xF000 => ctx.irq.value = u16::from(v),
            0xF001 => vrc::irq_control(ctx.irq, v),
            0xF002 => vrc::irq_ack(ctx.irq),
            _ => core_log!("Uncaught VRC6 write {addr:x}: {v:x}"),
        }
    }
}
