//! Discrete-logic boards: NROM, UxROM, CNROM, AxROM, GxROM, and the long
//! tail of single-register minor mappers.
//!
//! These boards share one register (if any) decoded from broad address
//! ranges. Boards without a separate bus driver see writes ANDed with the
//! ROM byte at the same address (bus conflict); that set is reproduced for
//! the mappers known to need it.

use serde::{Deserialize, Serialize};

use crate::cartridge::bank_window::Backing;
use crate::cartridge::header::Mirror;
use crate::cartridge::mapper::CartCtx;

/// Mapper numbers that conflict with ROM on writes.
const BUS_CONFLICT_IDS: [u16; 4] = [2, 3, 11, 148];

const SUPPORTED: [u16; 34] = [
    0, 2, 3, 7, 11, 13, 30, 31, 34, 38, 66, 70, 71, 77, 78, 79, 87, 89, 93, 94, 97, 101, 107, 111,
    113, 140, 145, 146, 148, 149, 152, 180, 184, 185,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Discrete {
    id: u16,
    submapper: u8,
    /// Mapper 185 CHR protection latch.
    block_2007: bool,
}

impl Discrete {
    pub(crate) fn supports(id: u16) -> bool {
        SUPPORTED.contains(&id)
    }

    pub(crate) fn new(ctx: &mut CartCtx<'_>) -> Self {
        let id = ctx.desc.mapper;
        let submapper = ctx.desc.submapper;

        if !ctx.mem.prg_ram.is_empty() {
            ctx.map_prg(Backing::Ram, 0x6000, 0, 8);
        }

        match id {
            // UxROM-style boards fix the last 16 KiB bank at $C000.
            2 | 30 | 71 => {
                let last = ctx.prg_rom_last_bank(16);
                ctx.map_prg(Backing::Rom, 0xC000, last, 16);
            }
            // Mapper 97 inverts that: the last bank sits at $8000.
            97 => {
                let last = ctx.prg_rom_last_bank(16);
                ctx.map_prg(Backing::Rom, 0x8000, last, 16);
                ctx.map_prg(Backing::Rom, 0xC000, 0, 16);
            }
            // Mapper 31 exposes eight 4 KiB slots, all defaulting to the end
            // of ROM.
            31 => {
                for slot in 0..8u16 {
                    ctx.map_prg(Backing::Rom, 0x8000 + slot * 0x1000, 0xFF, 4);
                }
            }
            _ => {}
        }

        Self {
            id,
            submapper,
            block_2007: false,
        }
    }

    pub(crate) fn blocks_2007(&self) -> bool {
        self.block_2007
    }

    fn chr_backing_8k(&self, ctx: &mut CartCtx<'_>, bank: u16) {
        let backing = ctx.chr_backing();
        ctx.map_chr(backing, 0x0000, bank, 8);
    }

    fn single_screen(&self, ctx: &mut CartCtx<'_>, upper: bool) {
        ctx.map_ciram(if upper {
            Mirror::Single0
        } else {
            Mirror::Single1
        });
    }

    pub(crate) fn prg_write(&mut self, ctx: &mut CartCtx<'_>, addr: u16, v: u8) {
        // Boards with registers below $8000 decode those first.
        match self.id {
            31 if (0x5000..=0x5FFF).contains(&addr) => {
                let slot = addr & 0x0007;
                ctx.map_prg(Backing::Rom, 0x8000 + slot * 0x1000, u16::from(v), 4);
                return;
            }
            111 if (0x5000..=0x5FFF).contains(&addr) => {
                ctx.map_prg(Backing::Rom, 0x8000, u16::from(v) & 0x0F, 32);
                self.chr_backing_8k(ctx, u16::from(v >> 4) & 1);
                return;
            }
            79 | 146 if addr & 0x4100 == 0x4100 && addr < 0x6000 => {
                ctx.map_prg(Backing::Rom, 0x8000, u16::from(v >> 3) & 1, 32);
                self.chr_backing_8k(ctx, u16::from(v) & 7);
                return;
            }
            113 if addr & 0x4100 == 0x4100 && addr < 0x6000 => {
                ctx.map_prg(Backing::Rom, 0x8000, u16::from(v >> 3) & 7, 32);
                self.chr_backing_8k(ctx, u16::from(v & 7) | u16::from((v >> 3) & 8));
                ctx.map_ciram(if v & 0x80 != 0 {
                    Mirror::Vertical
                } else {
                    Mirror::Horizontal
                });
                return;
            }
            145 if addr & 0x4100 == 0x4100 && addr < 0x6000 => {
                self.chr_backing_8k(ctx, u16::from(v >> 7));
                return;
            }
            38 if (0x7000..=0x7FFF).contains(&addr) => {
                ctx.map_prg(Backing::Rom, 0x8000, u16::from(v) & 3, 32);
                self.chr_backing_8k(ctx, u16::from(v >> 2) & 3);
                return;
            }
            87 if (0x6000..=0x7FFF).contains(&addr) => {
                self.chr_backing_8k(ctx, u16::from((v & 1) << 1 | (v >> 1) & 1));
                return;
            }
            101 if (0x6000..=0x7FFF).contains(&addr) => {
                self.chr_backing_8k(ctx, u16::from(v));
                return;
            }
            140 if (0x6000..=0x7FFF).contains(&addr) => {
                ctx.map_prg(Backing::Rom, 0x8000, u16::from(v >> 4) & 3, 32);
                self.chr_backing_8k(ctx, u16::from(v) & 0x0F);
                return;
            }
            184 if (0x6000..=0x7FFF).contains(&addr) => {
                let backing = ctx.chr_backing();
                ctx.map_chr(backing, 0x0000, u16::from(v) & 7, 4);
                ctx.map_chr(backing, 0x1000, u16::from(v >> 4) & 7, 4);
                return;
            }
            34 if !ctx.mem.chr_rom.is_empty() && (0x7FFD..=0x7FFF).contains(&addr) => {
                // NINA-001 register triplet inside the PRG RAM range.
                match addr {
                    0x7FFD => ctx.map_prg(Backing::Rom, 0x8000, u16::from(v) & 1, 32),
                    0x7FFE => ctx.map_chr(Backing::Rom, 0x0000, u16::from(v) & 0x0F, 4),
                    _ => ctx.map_chr(Backing::Rom, 0x1000, u16::from(v) & 0x0F, 4),
                }
                ctx.prg_window_write(addr, v);
                return;
            }
            _ => {}
        }

        if (0x6000..=0x7FFF).contains(&addr) {
            ctx.prg_window_write(addr, v);
            return;
        }
        if addr < 0x8000 {
            return;
        }

        let v = if BUS_CONFLICT_IDS.contains(&self.id) {
            ctx.bus_conflict(addr, v)
        } else {
            v
        };

        match self.id {
            2 => ctx.map_prg(Backing::Rom, 0x8000, u16::from(v), 16),
            3 => self.chr_backing_8k(ctx, u16::from(v)),
            7 => {
                ctx.map_prg(Backing::Rom, 0x8000, u16::from(v) & 7, 32);
                self.single_screen(ctx, v & 0x10 != 0);
            }
            11 => {
                ctx.map_prg(Backing::Rom, 0x8000, u16::from(v) & 3, 32);
                self.chr_backing_8k(ctx, u16::from(v >> 4));
            }
            13 => ctx.map_chr(Backing::Ram, 0x1000, u16::from(v) & 3, 4),
            30 => {
                ctx.map_prg(Backing::Rom, 0x8000, u16::from(v) & 0x1F, 16);
                ctx.map_chr(Backing::Ram, 0x0000, u16::from(v >> 5) & 3, 8);
            }
            34 => ctx.map_prg(Backing::Rom, 0x8000, u16::from(v), 32),
            66 => {
                ctx.map_prg(Backing::Rom, 0x8000, u16::from(v >> 4) & 3, 32);
                self.chr_backing_8k(ctx, u16::from(v) & 3);
            }
            70 => {
                ctx.map_prg(Backing::Rom, 0x8000, u16::from(v >> 4), 16);
                self.chr_backing_8k(ctx, u16::from(v) & 0x0F);
            }
            71 => {
                if addr >= 0xC000 {
                    ctx.map_prg(Backing::Rom, 0x8000, u16::from(v) & 0x0F, 16);
                } else if self.submapper == 1 && addr < 0xA000 {
                    // Fire Hawk single-screen control.
                    self.single_screen(ctx, v & 0x10 != 0);
                }
            }
            77 => {
                ctx.map_prg(Backing::Rom, 0x8000, u16::from(v) & 0x0F, 32);
                ctx.map_chr(Backing::Rom, 0x0000, u16::from(v >> 4), 2);
            }
            78 => {
                ctx.map_prg(Backing::Rom, 0x8000, u16::from(v) & 7, 16);
                self.chr_backing_8k(ctx, u16::from(v >> 4));
                if self.submapper == 3 {
                    ctx.map_ciram(if v & 0x08 != 0 {
                        Mirror::Horizontal
                    } else {
                        Mirror::Vertical
                    });
                } else {
                    self.single_screen(ctx, v & 0x08 != 0);
                }
            }
            89 => {
                ctx.map_prg(Backing::Rom, 0x8000, u16::from(v >> 4) & 7, 16);
                self.chr_backing_8k(ctx, u16::from(v & 7) | u16::from((v >> 4) & 8));
                self.single_screen(ctx, v & 0x08 != 0);
            }
            93 => ctx.map_prg(Backing::Rom, 0x8000, u16::from(v >> 4), 16),
            94 => ctx.map_prg(Backing::Rom, 0x8000, u16::from(v >> 2) & 7, 16),
            97 => {
                ctx.map_prg(Backing::Rom, 0xC000, u16::from(v) & 0x0F, 16);
                match v >> 6 {
                    0 => self.single_screen(ctx, false),
                    1 => ctx.map_ciram(Mirror::Horizontal),
                    2 => ctx.map_ciram(Mirror::Vertical),
                    _ => self.single_screen(ctx, true),
                }
            }
            107 => {
                ctx.map_prg(Backing::Rom, 0x8000, u16::from(v >> 1) & 3, 32);
                self.chr_backing_8k(ctx, u16::from(v) & 7);
            }
            111 => {
                ctx.map_prg(Backing::Rom, 0x8000, u16::from(v) & 0x0F, 32);
                self.chr_backing_8k(ctx, u16::from(v >> 4) & 1);
            }
            148 => {
                ctx.map_prg(Backing::Rom, 0x8000, u16::from(v >> 3) & 1, 32);
                self.chr_backing_8k(ctx, u16::from(v) & 7);
            }
            149 => self.chr_backing_8k(ctx, u16::from(v >> 7)),
            152 => {
                ctx.map_prg(Backing::Rom, 0x8000, u16::from(v >> 4) & 7, 16);
                self.chr_backing_8k(ctx, u16::from(v) & 0x0F);
                self.single_screen(ctx, v & 0x80 != 0);
            }
            180 => ctx.map_prg(Backing::Rom, 0xC000, u16::from(v) & 7, 16),
            185 => self.block_2007 = v & 0x03 == 0,
            _ => {}
        }
    }
}
