//! Mapper 1 (MMC1): serial shift-register board.
//!
//! Five writes with bit 0 of the data bus assemble a 5-bit value; address
//! bits 13-14 of the fifth write select one of four internal registers.
//! Writes on consecutive CPU cycles are dropped (the serial port only
//! samples once per write cycle), which RMW double writes rely on.
//! 512 KiB boards (SUROM) use CHR0 bit 4 as a 256 KiB PRG page select.

use serde::{Deserialize, Serialize};

use crate::cartridge::bank_window::Backing;
use crate::cartridge::header::Mirror;
use crate::cartridge::mapper::CartCtx;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Mmc1 {
    shift: u8,
    count: u8,
    /// Control register: mirroring (0-1), PRG mode (2-3), CHR mode (4).
    control: u8,
    chr0: u8,
    chr1: u8,
    prg: u8,
    last_write_cycle: u64,
    /// PRG ROM larger than 256 KiB uses CHR0 bit 4 as an outer bank.
    use256: bool,
}

impl Mmc1 {
    pub(crate) fn new(ctx: &mut CartCtx<'_>) -> Self {
        let mapper = Self {
            shift: 0,
            count: 0,
            control: 0x0C,
            chr0: 0,
            chr1: 0,
            prg: 0,
            last_write_cycle: 0,
            use256: ctx.mem.prg_rom.len() > 0x40000,
        };

        if !ctx.mem.prg_ram.is_empty() {
            ctx.map_prg(Backing::Ram, 0x6000, 0, 8);
        }
        mapper.apply(ctx);
        mapper
    }

    fn outer_bank(&self) -> u16 {
        if self.use256 && self.chr0 & 0x10 != 0 {
            0x10
        } else {
            0
        }
    }

    fn apply(&self, ctx: &mut CartCtx<'_>) {
        ctx.map_ciram(match self.control & 0x03 {
            0 => Mirror::Single1,
            1 => Mirror::Single0,
            2 => Mirror::Vertical,
            _ => Mirror::Horizontal,
        });

        let chr = ctx.chr_backing();
        if self.control & 0x10 != 0 {
            // 4 KiB + 4 KiB CHR banks.
            ctx.map_chr(chr, 0x0000, u16::from(self.chr0) & 0x1F, 4);
            ctx.map_chr(chr, 0x1000, u16::from(self.chr1) & 0x1F, 4);
        } else {
            ctx.map_chr(chr, 0x0000, u16::from(self.chr0 >> 1) & 0x0F, 8);
        }

        let outer = self.outer_bank();
        let bank = u16::from(self.prg) & 0x0F;
        match (self.control >> 2) & 0x03 {
            0 | 1 => {
                // 32 KiB mode ignores the low PRG bit.
                ctx.map_prg(Backing::Rom, 0x8000, (bank | outer) >> 1, 32);
            }
            2 => {
                // Fixed first bank at $8000, switchable at $C000.
                ctx.map_prg(Backing::Rom, 0x8000, outer, 16);
                ctx.map_prg(Backing::Rom, 0xC000, bank | outer, 16);
            }
            _ => {
                // Switchable at $8000, fixed last bank at $C000.
                let last = ctx.prg_rom_last_bank(16) & 0x0F;
                ctx.map_prg(Backing::Rom, 0x8000, bank | outer, 16);
                ctx.map_prg(Backing::Rom, 0xC000, last | outer, 16);
            }
        }
    }

    pub(crate) fn prg_write(&mut self, ctx: &mut CartCtx<'_>, addr: u16, v: u8, cycle: u64) {
        if (0x6000..=0x7FFF).contains(&addr) {
            ctx.prg_window_write(addr, v);
            return;
        }
        if addr < 0x8000 {
            return;
        }

        // The serial port ignores the second of two back-to-back writes.
        if cycle == self.last_write_cycle.wrapping_add(1) {
            self.last_write_cycle = cycle;
            return;
        }
        self.last_write_cycle = cycle;

        if v & 0x80 != 0 {
            self.shift = 0;
            self.count = 0;
            self.control |= 0x0C;
            self.apply(ctx);
            return;
        }

        self.shift |= (v & 0x01) << self.count;
        self.count += 1;
        if self.count < 5 {
            return;
        }

        match (addr >> 13) & 0x03 {
            0 => self.control = self.shift,
            1 => self.chr0 = self.shift,
            2 => self.chr1 = self.shift,
            _ => self.prg = self.shift,
        }
        self.shift = 0;
        self.count = 0;
        self.apply(ctx);
    }
}
