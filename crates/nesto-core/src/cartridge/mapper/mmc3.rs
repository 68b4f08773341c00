//! Mappers 4 and 206 (MMC3 and the Namco 108/109 predecessor).
//!
//! Eight bank registers behind a select/data register pair, mapper-controlled
//! mirroring, and the scanline IRQ counter clocked by qualified PPU A12
//! rising edges. Mapper 206 is the register-compatible predecessor without
//! mirroring control, IRQ, or the mode bits.
//!
//! Submappers 1 and 4 select the Sharp MMC3C / Rev A IRQ behaviour, which
//! only signals on a reload while the counter is already zero; the default
//! revision also signals when a decrement reaches zero.

use serde::{Deserialize, Serialize};

use crate::cartridge::bank_window::Backing;
use crate::cartridge::header::Mirror;
use crate::cartridge::mapper::{CartCtx, MapperIrq};
use crate::log::core_log;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Mmc3 {
    is_206: bool,
    rev_a: bool,
    bank_update: u8,
    prg_mode: u8,
    chr_mode: u8,
    regs: [u8; 8],
}

impl Mmc3 {
    pub(crate) fn new(ctx: &mut CartCtx<'_>) -> Self {
        let mapper = Self {
            is_206: ctx.desc.mapper == 206,
            rev_a: ctx.desc.submapper == 1 || ctx.desc.submapper == 4,
            bank_update: 0,
            prg_mode: 0,
            chr_mode: 0,
            regs: [0, 0, 0, 0, 0, 0, 0, 1],
        };

        let last = ctx.prg_rom_last_bank(8);
        ctx.map_prg(Backing::Rom, 0xE000, last, 8);
        mapper.map_prg(ctx);
        mapper.map_chr(ctx);

        if !ctx.mem.prg_ram.is_empty() {
            ctx.map_prg(Backing::Ram, 0x6000, 0, 8);
        }

        mapper
    }

    fn map_prg(&self, ctx: &mut CartCtx<'_>) {
        let b0 = u16::from(self.regs[6]);
        let b1 = ctx.prg_rom_last_bank(8).wrapping_sub(1);

        let (at_8000, at_c000) = if self.prg_mode == 0 { (b0, b1) } else { (b1, b0) };
        ctx.map_prg(Backing::Rom, 0x8000, at_8000, 8);
        ctx.map_prg(Backing::Rom, 0xA000, u16::from(self.regs[7]), 8);
        ctx.map_prg(Backing::Rom, 0xC000, at_c000, 8);
    }

    fn map_chr(&self, ctx: &mut CartCtx<'_>) {
        let backing = ctx.chr_backing();
        // CHR mode swaps the 2x2 KiB and 4x1 KiB halves.
        let double_base: u16 = if self.chr_mode == 0 { 0x0000 } else { 0x1000 };
        let single_slot: u16 = if self.chr_mode == 0 { 4 } else { 0 };

        ctx.map_chr(backing, double_base, u16::from(self.regs[0] >> 1), 2);
        ctx.map_chr(backing, double_base + 0x0800, u16::from(self.regs[1] >> 1), 2);
        for x in 0..4u16 {
            ctx.map_chr(
                backing,
                (single_slot + x) * 0x0400,
                u16::from(self.regs[2 + x as usize]),
                1,
            );
        }
    }

    pub(crate) fn prg_write(&mut self, ctx: &mut CartCtx<'_>, addr: u16, v: u8) {
        if (0x6000..=0x7FFF).contains(&addr) {
            ctx.prg_window_write(addr, v);
            return;
        }
        if addr < 0x8000 {
            return;
        }
        if self.is_206 && addr > 0x9FFF {
            return;
        }

        match addr & 0xE001 {
            0x8000 => {
                self.bank_update = v & 0x07;
                if !self.is_206 {
                    self.prg_mode = (v & 0x40) >> 6;
                    self.chr_mode = (v & 0x80) >> 7;
                }
                self.map_chr(ctx);
                self.map_prg(ctx);
            }
            0x8001 => {
                self.regs[self.bank_update as usize] = if self.is_206 { v & 0x3F } else { v };
                if self.bank_update < 6 {
                    self.map_chr(ctx);
                } else {
                    self.map_prg(ctx);
                }
            }
            0xA000 => {
                if ctx.desc.mirror != Mirror::Four {
                    ctx.map_ciram(if v & 0x01 != 0 {
                        Mirror::Horizontal
                    } else {
                        Mirror::Vertical
                    });
                }
            }
            0xA001 => {
                core_log!("MMC3 RAM protect: {v:x}");
            }
            0xC000 => ctx.irq.period = v,
            0xC001 => ctx.irq.reload = true,
            0xE000 => {
                ctx.irq.ack = true;
                ctx.irq.enable = false;
            }
            0xE001 => ctx.irq.enable = true,
            _ => {}
        }
    }

    /// A12 edges latch a pending clock, consumed by the next CPU cycle step.
    pub(crate) fn ppu_a12_rise(&mut self, irq: &mut MapperIrq) {
        irq.pending = true;
    }

    pub(crate) fn step(&mut self, irq: &mut MapperIrq) {
        if irq.ack {
            irq.line = false;
            irq.ack = false;
        }

        if irq.pending {
            let mut signal = true;

            if irq.counter == 0 || irq.reload {
                if self.rev_a {
                    signal = irq.reload;
                }
                irq.reload = false;
                irq.counter = u16::from(irq.period);
            } else {
                irq.counter -= 1;
            }

            if signal && irq.enable && irq.counter == 0 {
                irq.line = true;
            }

            irq.pending = false;
        }
    }
}
