//! Mappers 9 and 10 (MMC2/MMC4): latch-switched CHR banks.
//!
//! Each 4 KiB CHR half holds two bank registers selected by a latch, and the
//! latch flips when the PPU fetches tile $FD or $FE in that half. MMC2
//! triggers on the exact tail addresses; MMC4 widens the trigger to the full
//! 8-byte tile row. PRG banking differs: MMC2 switches one 8 KiB bank, MMC4
//! one 16 KiB bank.

use serde::{Deserialize, Serialize};

use crate::cartridge::bank_window::Backing;
use crate::cartridge::header::Mirror;
use crate::cartridge::mapper::CartCtx;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum Latch {
    Fd,
    Fe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Mmc2 {
    is_mmc4: bool,
    latch: [Latch; 2],
    chr_fd: [u8; 2],
    chr_fe: [u8; 2],
}

impl Mmc2 {
    pub(crate) fn new(ctx: &mut CartCtx<'_>) -> Self {
        let is_mmc4 = ctx.desc.mapper == 10;

        if is_mmc4 {
            let last = ctx.prg_rom_last_bank(16);
            ctx.map_prg(Backing::Rom, 0x8000, 0, 16);
            ctx.map_prg(Backing::Rom, 0xC000, last, 16);
            if !ctx.mem.prg_ram.is_empty() {
                ctx.map_prg(Backing::Ram, 0x6000, 0, 8);
            }
        } else {
            // MMC2: one switchable 8 KiB bank, the last three fixed.
            let last = ctx.prg_rom_last_bank(8);
            ctx.map_prg(Backing::Rom, 0x8000, 0, 8);
            ctx.map_prg(Backing::Rom, 0xA000, last.saturating_sub(2), 8);
            ctx.map_prg(Backing::Rom, 0xC000, last.saturating_sub(1), 8);
            ctx.map_prg(Backing::Rom, 0xE000, last, 8);
        }

        let mapper = Self {
            is_mmc4,
            latch: [Latch::Fd; 2],
            chr_fd: [0; 2],
            chr_fe: [0; 2],
        };
        mapper.apply_chr(ctx);
        mapper
    }

    fn apply_chr(&self, ctx: &mut CartCtx<'_>) {
        for half in 0..2usize {
            let bank = match self.latch[half] {
                Latch::Fd => self.chr_fd[half],
                Latch::Fe => self.chr_fe[half],
            };
            ctx.map_chr(
                Backing::Rom,
                if half == 0 { 0x0000 } else { 0x1000 },
                u16::from(bank) & 0x1F,
                4,
            );
        }
    }

    pub(crate) fn prg_write(&mut self, ctx: &mut CartCtx<'_>, addr: u16, v: u8) {
        if (0x6000..=0x7FFF).contains(&addr) {
            ctx.prg_window_write(addr, v);
            return;
        }

        match addr & 0xF000 {
            0xA000 => {
                if self.is_mmc4 {
                    ctx.map_prg(Backing::Rom, 0x8000, u16::from(v) & 0x0F, 16);
                } else {
                    ctx.map_prg(Backing::Rom, 0x8000, u16::from(v) & 0x0F, 8);
                }
            }
            0xB000 => {
                self.chr_fd[0] = v & 0x1F;
                self.apply_chr(ctx);
            }
            0xC000 => {
                self.chr_fe[0] = v & 0x1F;
                self.apply_chr(ctx);
            }
            0xD000 => {
                self.chr_fd[1] = v & 0x1F;
                self.apply_chr(ctx);
            }
            0xE000 => {
                self.chr_fe[1] = v & 0x1F;
                self.apply_chr(ctx);
            }
            0xF000 => {
                ctx.map_ciram(if v & 0x01 != 0 {
                    Mirror::Horizontal
                } else {
                    Mirror::Vertical
                });
            }
            _ => {}
        }
    }

    /// PPU pattern fetch: serves the byte, then updates the latches so the
    /// *next* fetch sees the switched bank.
    pub(crate) fn chr_read(&mut self, ctx: &mut CartCtx<'_>, addr: u16) -> u8 {
        let v = ctx
            .chr_window_read(crate::cartridge::bank_window::VIEW_SPR, addr)
            .unwrap_or(0);

        let half = usize::from(addr & 0x1000 != 0);
        let wide = self.is_mmc4 || half == 1;
        let row = addr & 0x0FF8;
        let hit_fd = if wide {
            row == 0x0FD8
        } else {
            addr & 0x1FFF == 0x0FD8
        };
        let hit_fe = if wide {
            row == 0x0FE8
        } else {
            addr & 0x1FFF == 0x0FE8
        };

        if hit_fd {
            self.latch[half] = Latch::Fd;
            self.apply_chr(ctx);
        } else if hit_fe {
            self.latch[half] = Latch::Fe;
            self.apply_chr(ctx);
        }

        v
    }
}
