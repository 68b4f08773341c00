//! Mapper state machines and their dispatch.
//!
//! Mappers are a tagged union over small per-family state structs; each entry
//! point dispatches on the variant. The bank windows and cart memory are
//! shared cartridge state, handed to the mapper through [`CartCtx`] so a
//! board mutates the same windows the bus reads through.

use serde::{Deserialize, Serialize};

use crate::apu::{Apu, ExtAudio};
use crate::cartridge::CartMemory;
use crate::cartridge::bank_window::{Backing, BankWindow, VIEW_SPR};
use crate::cartridge::header::{CartDesc, Mirror};
use crate::error::Error;
use crate::log::core_log;

pub(crate) mod discrete;
pub(crate) mod fcg;
pub(crate) mod fme7;
pub(crate) mod jaleco;
pub(crate) mod mmc1;
pub(crate) mod mmc2;
pub(crate) mod mmc3;
pub(crate) mod mmc5;
pub(crate) mod namco;
pub(crate) mod vrc;
pub(crate) mod vrc6;
pub(crate) mod vrc7;

pub(crate) use discrete::Discrete;
pub(crate) use fcg::Fcg;
pub(crate) use fme7::Fme7;
pub(crate) use jaleco::Jaleco;
pub(crate) use mmc1::Mmc1;
pub(crate) use mmc2::Mmc2;
pub(crate) use mmc3::Mmc3;
pub(crate) use mmc5::Mmc5;
pub(crate) use namco::Namco;
pub(crate) use vrc::Vrc;
pub(crate) use vrc6::Vrc6;
pub(crate) use vrc7::Vrc7;

/// IRQ block shared by the counter-based mappers. Fields are interpreted per
/// family: MMC3 uses `period`/`counter` with A12 clocking, the VRC parts use
/// `value` as an up-counting reload latch with `scanline` as the 341-dot
/// prescaler, FME-7 and the Bandai FCG count raw CPU cycles, MMC5 tracks an
/// in-frame target line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct MapperIrq {
    pub(crate) enable: bool,
    pub(crate) reload: bool,
    pub(crate) pending: bool,
    pub(crate) counter: u16,
    pub(crate) value: u16,
    pub(crate) period: u8,
    pub(crate) scanline: i16,
    pub(crate) cycle_mode: bool,
    pub(crate) ack: bool,
    /// Level currently driven onto the CPU IRQ line.
    pub(crate) line: bool,
}

/// Borrowed cartridge internals handed to mapper entry points.
pub(crate) struct CartCtx<'a> {
    pub(crate) desc: &'a CartDesc,
    pub(crate) mem: &'a mut CartMemory,
    pub(crate) prg: &'a mut BankWindow,
    pub(crate) chr: &'a mut BankWindow,
    pub(crate) irq: &'a mut MapperIrq,
    pub(crate) sram_dirty: &'a mut usize,
}

impl CartCtx<'_> {
    /// Backing used for CHR banking: ROM when present, RAM otherwise.
    pub(crate) fn chr_backing(&self) -> Backing {
        if self.mem.chr_rom.is_empty() {
            Backing::Ram
        } else {
            Backing::Rom
        }
    }

    pub(crate) fn prg_region_size(&self, backing: Backing) -> usize {
        match backing {
            Backing::Rom => self.mem.prg_rom.len(),
            _ => self.mem.prg_ram.len(),
        }
    }

    pub(crate) fn chr_region_size(&self, backing: Backing) -> usize {
        match backing {
            Backing::Rom => self.mem.chr_rom.len(),
            Backing::Ram => self.mem.chr_ram.len(),
            Backing::Ciram => self.mem.ciram.len(),
            Backing::Exram => self.mem.exram.len(),
        }
    }

    pub(crate) fn map_prg(&mut self, backing: Backing, addr: u16, bank: u16, kb: u32) {
        let size = self.prg_region_size(backing);
        self.prg.map(VIEW_SPR, backing, size, addr, bank, kb);
    }

    pub(crate) fn map_chr(&mut self, backing: Backing, addr: u16, bank: u16, kb: u32) {
        self.map_chr_view(VIEW_SPR, backing, addr, bank, kb);
    }

    pub(crate) fn map_chr_view(
        &mut self,
        view: usize,
        backing: Backing,
        addr: u16,
        bank: u16,
        kb: u32,
    ) {
        let size = self.chr_region_size(backing);
        self.chr.map(view, backing, size, addr, bank, kb);
    }

    /// Assigns the eight nametable slots from an 8-nybble CIRAM page pattern.
    pub(crate) fn map_ciram_pattern(&mut self, pattern: u32) {
        for x in 0..8u8 {
            self.map_ciram_slot(x, ((pattern >> (x * 4)) & 0xF) as u8);
        }
    }

    pub(crate) fn map_ciram(&mut self, mirror: Mirror) {
        self.map_ciram_pattern(mirror.pattern());
    }

    /// Points nametable slot `dest` (0..8) at a 1 KiB CIRAM page.
    pub(crate) fn map_ciram_slot(&mut self, dest: u8, page: u8) {
        self.map_ciram_offset(dest, Backing::Ciram, page as usize * 0x0400);
    }

    /// Aliases nametable slot `dest` to an arbitrary region offset. MMC5
    /// points slots at EXRAM; Namco 163 points them at CHR ROM.
    pub(crate) fn map_ciram_offset(&mut self, dest: u8, backing: Backing, offset: usize) {
        let size = self.chr_region_size(backing);
        let dest = dest as usize;
        self.chr.set_slot(VIEW_SPR, dest + 8, backing, size, offset);
        if dest < 4 {
            // $3000-$3EFF mirrors the first four nametable slots.
            self.chr.set_slot(VIEW_SPR, dest + 12, backing, size, offset);
        }
    }

    pub(crate) fn unmap_ciram(&mut self, dest: u8) {
        let dest = dest as usize;
        self.chr.unmap_slot(VIEW_SPR, dest + 8);
        if dest < 4 {
            self.chr.unmap_slot(VIEW_SPR, dest + 12);
        }
    }

    pub(crate) fn prg_window_read(&self, addr: u16) -> Option<u8> {
        let slot = self.prg.slot(VIEW_SPR, addr);
        if !slot.mapped {
            return None;
        }
        let region = match slot.backing {
            Backing::Rom => &self.mem.prg_rom,
            _ => &self.mem.prg_ram,
        };
        let idx = slot.offset + (addr & self.prg.mask()) as usize;
        Some(region.get(idx).copied().unwrap_or(0))
    }

    /// Writes through the PRG window; RAM hits mark the SRAM dirty counter.
    pub(crate) fn prg_window_write(&mut self, addr: u16, v: u8) {
        let slot = self.prg.slot(VIEW_SPR, addr);
        if !slot.mapped || !slot.backing.writable() {
            return;
        }
        let idx = slot.offset + (addr & self.prg.mask()) as usize;
        if let Some(b) = self.mem.prg_ram.get_mut(idx) {
            *b = v;
            *self.sram_dirty = self.mem.prg_sram;
        }
    }

    pub(crate) fn chr_window_read(&self, view: usize, addr: u16) -> Option<u8> {
        let slot = self.chr.slot(view, addr);
        if !slot.mapped {
            return None;
        }
        let region = match slot.backing {
            Backing::Rom => &self.mem.chr_rom,
            Backing::Ram => &self.mem.chr_ram,
            Backing::Ciram => &self.mem.ciram,
            Backing::Exram => &self.mem.exram,
        };
        let idx = slot.offset + (addr & self.chr.mask()) as usize;
        Some(region.get(idx).copied().unwrap_or(0))
    }

    pub(crate) fn chr_window_write(&mut self, addr: u16, v: u8) {
        let slot = self.chr.slot(VIEW_SPR, addr);
        if !slot.mapped || !slot.backing.writable() {
            return;
        }
        let idx = slot.offset + (addr & self.chr.mask()) as usize;
        let region = match slot.backing {
            Backing::Ram => &mut self.mem.chr_ram,
            Backing::Ciram => &mut self.mem.ciram,
            Backing::Exram => &mut self.mem.exram,
            Backing::Rom => return,
        };
        if let Some(b) = region.get_mut(idx) {
            *b = v;
        }
    }

    /// Discrete boards without a bus driver see the written value ANDed with
    /// the ROM byte under the same address.
    pub(crate) fn bus_conflict(&self, addr: u16, v: u8) -> u8 {
        match self.prg_window_read(addr) {
            Some(rom) => v & rom,
            None => v,
        }
    }

    pub(crate) fn prg_rom_last_bank(&self, kb: u32) -> u16 {
        let bank_bytes = kb as usize * 0x0400;
        (self.mem.prg_rom.len() / bank_bytes.max(1)).saturating_sub(1) as u16
    }
}

/// Per-family mapper state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum Mapper {
    Discrete(Discrete),
    Mmc1(Mmc1),
    Mmc2(Mmc2),
    Mmc3(Mmc3),
    Mmc5(Mmc5),
    Fcg(Fcg),
    Jaleco(Jaleco),
    Namco(Namco),
    Vrc(Vrc),
    Vrc6(Vrc6),
    Vrc7(Vrc7),
    Fme7(Fme7),
}

impl Mapper {
    /// Builds the mapper for `desc.mapper`, applying its power-on mapping.
    pub(crate) fn create(ctx: &mut CartCtx<'_>) -> Result<Self, Error> {
        let id = ctx.desc.mapper;
        let mapper = match id {
            1 => Self::Mmc1(Mmc1::new(ctx)),
            4 | 206 => Self::Mmc3(Mmc3::new(ctx)),
            5 => Self::Mmc5(Mmc5::new(ctx)),
            9 | 10 => Self::Mmc2(Mmc2::new(ctx)),
            16 | 159 => Self::Fcg(Fcg::new(ctx)),
            18 => Self::Jaleco(Jaleco::new(ctx)),
            19 | 210 => Self::Namco(Namco::new(ctx)),
            21 | 22 | 23 | 25 => Self::Vrc(Vrc::new(ctx)),
            24 | 26 => Self::Vrc6(Vrc6::new(ctx)),
            69 => Self::Fme7(Fme7::new(ctx)),
            85 => Self::Vrc7(Vrc7::new(ctx)),
            id if Discrete::supports(id) => Self::Discrete(Discrete::new(ctx)),
            other => {
                core_log!("Mapper {other} is unsupported");
                return Err(Error::UnsupportedMapper(other));
            }
        };
        Ok(mapper)
    }

    /// Mapper-decoded CPU read below the PRG window (MMC5, Namco 163
    /// registers). `None` falls through to the plain window read.
    pub(crate) fn prg_read(
        &mut self,
        ctx: &mut CartCtx<'_>,
        apu: &mut Apu,
        addr: u16,
    ) -> Option<Option<u8>> {
        match self {
            Self::Mmc5(m) => Some(m.prg_read(ctx, apu, addr)),
            Self::Namco(m) => Some(m.prg_read(ctx, addr)),
            _ => None,
        }
    }

    pub(crate) fn prg_write(
        &mut self,
        ctx: &mut CartCtx<'_>,
        apu: &mut Apu,
        addr: u16,
        v: u8,
        cycle: u64,
    ) {
        match self {
            Self::Discrete(m) => m.prg_write(ctx, addr, v),
            Self::Mmc1(m) => m.prg_write(ctx, addr, v, cycle),
            Self::Mmc2(m) => m.prg_write(ctx, addr, v),
            Self::Mmc3(m) => m.prg_write(ctx, addr, v),
            Self::Mmc5(m) => m.prg_write(ctx, apu, addr, v),
            Self::Fcg(m) => m.prg_write(ctx, addr, v),
            Self::Jaleco(m) => m.prg_write(ctx, addr, v),
            Self::Namco(m) => m.prg_write(ctx, addr, v),
            Self::Vrc(m) => m.prg_write(ctx, addr, v),
            Self::Vrc6(m) => m.prg_write(ctx, apu, addr, v),
            Self::Vrc7(m) => m.prg_write(ctx, addr, v),
            Self::Fme7(m) => m.prg_write(ctx, apu, addr, v),
        }
    }

    /// Per-CPU-cycle mapper step (IRQ engines).
    pub(crate) fn step(&mut self, ctx: &mut CartCtx<'_>) {
        match self {
            Self::Mmc3(m) => m.step(ctx.irq),
            Self::Mmc5(m) => m.step(ctx.irq),
            Self::Jaleco(m) => m.step(ctx.irq),
            Self::Namco(m) => m.step(ctx.irq),
            Self::Vrc(m) => m.step(ctx.irq),
            Self::Vrc6(_) | Self::Vrc7(_) => vrc::irq_step(ctx.irq),
            Self::Fme7(m) => m.step(ctx.irq),
            Self::Fcg(m) => m.step(ctx.irq),
            _ => {}
        }
    }

    /// Qualified PPU A12 rising edge (MMC3 IRQ clock).
    pub(crate) fn ppu_a12_rise(&mut self, irq: &mut MapperIrq) {
        if let Self::Mmc3(m) = self {
            m.ppu_a12_rise(irq);
        }
    }

    /// CPU writes to the PPU registers are visible to MMC5 (sprite size).
    pub(crate) fn ppu_register_write(&mut self, addr: u16, v: u8) {
        if let Self::Mmc5(m) = self {
            m.ppu_register_write(addr, v);
        }
    }

    /// Mapper 185 CHR protection: repeat the previous `$2007` read.
    pub(crate) fn blocks_2007(&self) -> bool {
        match self {
            Self::Discrete(m) => m.blocks_2007(),
            _ => false,
        }
    }
}
