//! Mapper 5 (MMC5).
//!
//! The most capable licensed board: four PRG modes mixing ROM and RAM,
//! separate sprite/background CHR maps keyed off the PPU sprite size, EXRAM
//! with four operating modes (extra nametable, attribute/bank extension,
//! CPU RAM), per-nametable remapping with a fill mode, a vertical split
//! window, an in-frame scanline IRQ derived from nametable fetch patterns,
//! an 8x8 hardware multiplier, and two extra pulse channels fed through the
//! APU's expansion inputs.

use serde::{Deserialize, Serialize};

use crate::apu::{Apu, ExtAudio};
use crate::cartridge::bank_window::{Backing, VIEW_BG, VIEW_SPR};
use crate::cartridge::ChrKind;
use crate::cartridge::mapper::{CartCtx, MapperIrq};
use crate::log::core_log;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
struct VerticalSplit {
    enable: bool,
    right: bool,
    fetch: bool,
    htile: u16,
    scroll: u16,
    scroll_reload: u8,
    tile: u8,
    bank: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Mmc5 {
    prg_mode: u8,
    chr_mode: u8,
    exram_mode: u8,
    fill_tile: u8,
    fill_attr: u8,
    exram1: u8,
    ram_banks: u8,
    multiplicand: u16,
    multiplier: u16,
    chr_bank_upper: u16,
    scanline: u16,
    /// CPU cycles since the PPU last fetched through the cart; three idle
    /// cycles mean rendering stopped and the frame state is cleared.
    last_ppu_read: u64,
    /// Which CHR map `$2007`-style data accesses use (last bank group written).
    active_map_bg: bool,
    nt_latch: bool,
    exram_latch: bool,
    large_sprites: bool,
    in_frame: bool,
    vs: VerticalSplit,
}

impl Mmc5 {
    pub(crate) fn new(ctx: &mut CartCtx<'_>) -> Self {
        let mapper = Self {
            prg_mode: 3,
            chr_mode: 0,
            exram_mode: 0,
            fill_tile: 0,
            fill_attr: 0,
            exram1: 0,
            ram_banks: if ctx.mem.prg_ram.len() <= 0x4000 { 1 } else { 4 },
            multiplicand: 0,
            multiplier: 0,
            chr_bank_upper: 0,
            scanline: 0,
            last_ppu_read: 0,
            active_map_bg: false,
            nt_latch: false,
            exram_latch: false,
            large_sprites: false,
            in_frame: false,
            vs: VerticalSplit::default(),
        };

        mapper.map_prg16(ctx, Backing::Rom, 0xC000, 0xFF);

        let chr = ctx.chr_backing();
        ctx.map_chr_view(VIEW_SPR, chr, 0x0000, 0, 8);
        ctx.map_chr_view(VIEW_BG, chr, 0x0000, 0, 8);

        if !ctx.mem.prg_ram.is_empty() {
            ctx.map_prg(Backing::Ram, 0x6000, 0, 8);
        }

        mapper
    }

    fn map_prg16(&self, ctx: &mut CartCtx<'_>, backing: Backing, addr: u16, bank: u16) {
        ctx.map_prg(backing, addr, bank & 0xFE, 8);
        ctx.map_prg(backing, addr + 0x2000, (bank & 0xFE) + 1, 8);
    }

    fn map_prg32(&self, ctx: &mut CartCtx<'_>, backing: Backing, addr: u16, bank: u16) {
        for x in 0..4 {
            ctx.map_prg(backing, addr + x * 0x2000, (bank & 0xFC) + x, 8);
        }
    }

    fn map_prg_slot(&self, ctx: &mut CartCtx<'_>, slot: u16, mut bank: u16, mut backing: Backing) {
        if slot == 0 {
            backing = Backing::Ram;
        }

        if backing == Backing::Ram {
            // RAM chips: bit 2 selects the chip, low bits the 8 KiB page.
            let banks = u16::from(self.ram_banks);
            bank = (if banks > 1 { bank & 0x3 } else { 0 }) + ((bank & 0x4) >> 2) * banks;
        }

        if slot == 0 {
            ctx.map_prg(Backing::Ram, 0x6000, bank, 8);
            return;
        }

        match self.prg_mode {
            0 => {
                if slot == 4 {
                    self.map_prg32(ctx, backing, 0x8000, bank);
                }
            }
            1 => {
                if slot == 2 {
                    self.map_prg16(ctx, backing, 0x8000, bank);
                } else if slot == 4 {
                    self.map_prg16(ctx, backing, 0xC000, bank);
                }
            }
            2 => {
                if slot == 2 {
                    self.map_prg16(ctx, backing, 0x8000, bank);
                } else if slot > 2 {
                    ctx.map_prg(backing, 0x6000 + slot * 0x2000, bank, 8);
                }
            }
            _ => ctx.map_prg(backing, 0x6000 + slot * 0x2000, bank, 8),
        }
    }

    fn map_chr_slot(&self, ctx: &mut CartCtx<'_>, view: usize, slot: u16, bank: u16) {
        let bank = bank | self.chr_bank_upper;
        let backing = ctx.chr_backing();

        match self.chr_mode {
            0 => ctx.map_chr_view(view, backing, 0x0000, bank, 8),
            1 => {
                let addr = if slot == 3 { 0x0000 } else { 0x1000 };
                ctx.map_chr_view(view, backing, addr, bank, 4);
            }
            3 => ctx.map_chr_view(view, backing, slot * 0x0400, bank, 1),
            mode => core_log!("Unsupported CHR mode {mode:x}"),
        }
    }

    pub(crate) fn prg_write(&mut self, ctx: &mut CartCtx<'_>, apu: &mut Apu, addr: u16, v: u8) {
        if (0x5C00..0x6000).contains(&addr) {
            let idx = (addr - 0x5C00) as usize;
            if let Some(b) = ctx.mem.exram.get_mut(idx) {
                *b = v;
            }
            return;
        }

        if addr >= 0x6000 {
            ctx.prg_window_write(addr, v);
            return;
        }

        match addr {
            // Expansion pulse channels live behind the APU's EXT inputs.
            0x5000 | 0x5002 | 0x5003 | 0x5004 | 0x5006 | 0x5007 | 0x5015 => {
                apu.ext_write(addr - 0x1000, v, ExtAudio::Mmc5);
            }
            // Unused pulse sweep and raw PCM registers.
            0x5001 | 0x5005 | 0x5010 | 0x5011 => {}
            0x5100 => self.prg_mode = v & 0x03,
            0x5101 => self.chr_mode = v & 0x03,
            // PRG RAM protect pair.
            0x5102 | 0x5103 => {}
            0x5104 => self.exram_mode = v & 0x03,
            0x5105 => {
                for x in 0..4u8 {
                    match (v >> (x * 2)) & 0x03 {
                        0 => ctx.map_ciram_slot(x, 0),
                        1 => ctx.map_ciram_slot(x, 1),
                        2 => ctx.map_ciram_offset(x, Backing::Exram, 0),
                        _ => ctx.unmap_ciram(x),
                    }
                }
            }
            0x5106 => self.fill_tile = v,
            0x5107 => {
                let mut attr = v & 0x03;
                attr |= attr << 2;
                attr |= attr << 4;
                self.fill_attr = attr;
            }
            0x5113..=0x5117 => {
                let slot = addr - 0x5113;
                let ram = v & 0x80 == 0 && (0x5114..=0x5116).contains(&addr);
                self.map_prg_slot(
                    ctx,
                    slot,
                    u16::from(v & 0x7F),
                    if ram { Backing::Ram } else { Backing::Rom },
                );
            }
            0x5120..=0x5127 => {
                self.active_map_bg = false;
                self.map_chr_slot(ctx, VIEW_SPR, addr - 0x5120, u16::from(v));
            }
            0x5128..=0x512B => {
                self.active_map_bg = true;
                self.map_chr_slot(ctx, VIEW_BG, addr - 0x5128, u16::from(v));
                self.map_chr_slot(ctx, VIEW_BG, (addr - 0x5128) + 4, u16::from(v));
            }
            0x5130 => self.chr_bank_upper = u16::from(v & 0x03) << 8,
            0x5200 => {
                self.vs.enable = v & 0x80 != 0;
                self.vs.right = v & 0x40 != 0;
                self.vs.tile = v & 0x1F;
            }
            0x5201 => self.vs.scroll_reload = v,
            0x5202 => self.vs.bank = v,
            0x5203 => ctx.irq.scanline = i16::from(v),
            0x5204 => ctx.irq.enable = v & 0x80 != 0,
            0x5205 => self.multiplicand = u16::from(v),
            0x5206 => self.multiplier = u16::from(v),
            // Just Breed writes here; purpose unknown.
            0x5800 => {}
            _ => core_log!("Uncaught MMC5 write {addr:x}"),
        }
    }

    pub(crate) fn prg_read(
        &mut self,
        ctx: &mut CartCtx<'_>,
        apu: &mut Apu,
        addr: u16,
    ) -> Option<u8> {
        if addr >= 0x6000 {
            return ctx.prg_window_read(addr);
        }

        if (0x5C00..0x6000).contains(&addr) {
            return ctx.mem.exram.get((addr - 0x5C00) as usize).copied();
        }

        match addr {
            0x5015 => Some(apu.ext_read_status(ExtAudio::Mmc5)),
            0x5204 => {
                let mut r = 0;
                if self.in_frame {
                    r |= 0x40;
                }
                if ctx.irq.pending {
                    r |= 0x80;
                }
                ctx.irq.pending = false;
                Some(r)
            }
            0x5205 => Some((self.multiplier.wrapping_mul(self.multiplicand) & 0xFF) as u8),
            0x5206 => Some((self.multiplier.wrapping_mul(self.multiplicand) >> 8) as u8),
            0x5000..=0x5011 | 0x5113..=0x512B => None,
            _ => {
                core_log!("Uncaught MMC5 read {addr:x}");
                None
            }
        }
    }

    /// Scanline detection: two consecutive fetches of the same nametable
    /// address mark the start-of-line attribute fetch pattern.
    fn observe_scanline(&mut self, irq: &mut MapperIrq, addr: u16) {
        if irq.counter == 2 {
            if !self.in_frame {
                self.in_frame = true;
                self.scanline = 0;
            } else {
                self.scanline += 1;
            }

            irq.pending = irq.scanline == self.scanline as i16 && irq.scanline != 0;

            self.vs.scroll = self.vs.scroll.wrapping_add(1);
            if self.scanline == 0 {
                self.vs.scroll = u16::from(self.vs.scroll_reload);
            }

            irq.counter = 0;
            irq.value = 0xFFFF;
        }

        if addr == irq.value {
            irq.counter += 1;
        }
        irq.value = addr;
    }

    /// Nametable-window read (`$2000-$3EFF`): split screen, EXRAM nametable
    /// and attribute modes, and the fill-mode fallthrough.
    pub(crate) fn nt_read(
        &mut self,
        ctx: &mut CartCtx<'_>,
        addr: u16,
        kind: ChrKind,
        nt: bool,
    ) -> u8 {
        self.last_ppu_read = 0;
        self.observe_scanline(ctx.irq, addr);

        if kind == ChrKind::Bg {
            if nt {
                self.exram_latch = false;
                self.nt_latch = false;
                self.vs.htile += 1;
                if self.vs.htile > 34 {
                    self.vs.htile = 1;
                }
            }

            let htile = if self.vs.htile >= 32 {
                self.vs.htile - 32
            } else {
                self.vs.htile + 1
            };
            let in_range = if self.vs.right {
                htile >= u16::from(self.vs.tile)
            } else {
                htile < u16::from(self.vs.tile)
            };

            self.vs.fetch = in_range && self.vs.enable && self.exram_mode <= 1;

            if self.vs.fetch {
                let mut vtile = self.vs.scroll / 8;
                if vtile >= 30 {
                    vtile -= 30;
                }

                if !self.exram_latch {
                    self.exram_latch = true;
                    let idx = (vtile * 32 + htile) as usize;
                    return ctx.mem.exram.get(idx).copied().unwrap_or(0);
                } else {
                    self.exram_latch = false;
                    let idx = (0x03C0 + vtile / 32 + htile / 4) as usize;
                    return ctx.mem.exram.get(idx).copied().unwrap_or(0);
                }
            } else if self.exram_mode == 1 {
                if !self.exram_latch {
                    self.exram_latch = true;
                    self.exram1 = ctx
                        .mem
                        .exram
                        .get((addr & 0x03FF) as usize)
                        .copied()
                        .unwrap_or(0);
                } else {
                    self.exram_latch = false;
                    let mut attr = (self.exram1 & 0xC0) >> 6;
                    attr |= attr << 2;
                    attr |= attr << 4;
                    return attr;
                }
            }
        }

        match ctx.chr_window_read(VIEW_SPR, addr) {
            Some(v) => v,
            None => {
                // Unmapped nametable slots fall through to fill mode.
                let v = if !self.nt_latch {
                    self.fill_tile
                } else {
                    self.fill_attr
                };
                self.nt_latch = true;
                v
            }
        }
    }

    /// Pattern-window read (`$0000-$1FFF`).
    pub(crate) fn chr_read(&mut self, ctx: &mut CartCtx<'_>, addr: u16, kind: ChrKind) -> u8 {
        self.last_ppu_read = 0;

        let kind = if self.exram_mode != 1 && !self.large_sprites {
            ChrKind::Spr
        } else {
            kind
        };

        match kind {
            ChrKind::Bg => {
                if self.vs.fetch {
                    let fine_y = usize::from(self.vs.scroll & 0x07);
                    let idx = usize::from(self.vs.bank) * 0x1000 + usize::from(addr & 0x0FF8) + fine_y;
                    return read_mod(&ctx.mem.chr_rom, idx);
                } else if self.exram_mode == 1 {
                    let exbank =
                        usize::from(self.chr_bank_upper >> 2) | usize::from(self.exram1 & 0x3F);
                    let idx = exbank * 0x1000 + usize::from(addr & 0x0FFF);
                    return read_mod(&ctx.mem.chr_rom, idx);
                }
                ctx.chr_window_read(VIEW_BG, addr).unwrap_or(0)
            }
            ChrKind::Spr => ctx.chr_window_read(VIEW_SPR, addr).unwrap_or(0),
            ChrKind::Data => {
                let view = if self.active_map_bg { VIEW_BG } else { VIEW_SPR };
                ctx.chr_window_read(view, addr).unwrap_or(0)
            }
        }
    }

    /// The MMC5 snoops CPU writes to the PPU registers for the sprite size.
    pub(crate) fn ppu_register_write(&mut self, addr: u16, v: u8) {
        if addr == 0x2000 {
            self.large_sprites = v & 0x20 != 0;
        }
    }

    pub(crate) fn step(&mut self, irq: &mut MapperIrq) {
        self.last_ppu_read += 1;
        if self.last_ppu_read >= 3 {
            self.in_frame = false;
        }

        irq.line = irq.pending && irq.enable && self.scanline != 0;
    }
}

fn read_mod(region: &[u8], idx: usize) -> u8 {
    if region.is_empty() {
        0
    } else {
        region[idx % region.len()]
    }
}
