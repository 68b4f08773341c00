#![allow(dead_code)]

//! Shared helpers for assembling in-memory test cartridges.

use anyhow::{Context, Result};
use nesto_core::{Config, Nes};

/// Boots a fresh machine with the default configuration and `rom` inserted.
pub fn boot(rom: &[u8]) -> Result<Nes> {
    let mut nes = Nes::new(Config::default());
    nes.load_cart(rom, None, None)
        .context("loading test cartridge")?;
    Ok(nes)
}

/// Builds NROM images with hand-assembled 6502 code.
pub struct RomBuilder {
    prg: Vec<u8>,
    chr: Vec<u8>,
    battery: bool,
    mapper: u16,
}

impl RomBuilder {
    pub fn new() -> Self {
        Self {
            // 32 KiB of NOPs so a wandering PC stays harmless.
            prg: vec![0xEA; 0x8000],
            chr: vec![0; 0x2000],
            battery: true,
            mapper: 0,
        }
    }

    pub fn mapper(mut self, mapper: u16) -> Self {
        self.mapper = mapper;
        self
    }

    /// Places raw bytes at a CPU address in `$8000-$FFFF`.
    pub fn code(mut self, addr: u16, bytes: &[u8]) -> Self {
        let offset = usize::from(addr - 0x8000);
        self.prg[offset..offset + bytes.len()].copy_from_slice(bytes);
        self
    }

    pub fn reset_vector(self, addr: u16) -> Self {
        let bytes = addr.to_le_bytes();
        self.code(0xFFFC, &bytes)
    }

    pub fn nmi_vector(self, addr: u16) -> Self {
        let bytes = addr.to_le_bytes();
        self.code(0xFFFA, &bytes)
    }

    pub fn irq_vector(self, addr: u16) -> Self {
        let bytes = addr.to_le_bytes();
        self.code(0xFFFE, &bytes)
    }

    pub fn build(self) -> Vec<u8> {
        let flags6 = ((self.mapper as u8) << 4) | if self.battery { 0x02 } else { 0x00 };
        let flags7 = (self.mapper & 0xF0) as u8;
        let mut rom = vec![
            b'N',
            b'E',
            b'S',
            0x1A,
            2, // 32 KiB PRG
            1, // 8 KiB CHR
            flags6,
            flags7,
            0,
            0,
            0,
            0,
            0,
            0,
            0,
            0,
        ];
        rom.extend_from_slice(&self.prg);
        rom.extend_from_slice(&self.chr);
        rom
    }
}

/// Runs `frames` video frames, discarding the outputs.
pub fn run_frames(nes: &mut nesto_core::Nes, frames: usize) {
    for _ in 0..frames {
        nes.next_frame(|_| {}, |_, _| {});
    }
}

/// Reads battery RAM into a fresh buffer.
pub fn sram(nes: &mut nesto_core::Nes) -> Vec<u8> {
    let mut buf = vec![0u8; nes.sram_size()];
    nes.get_sram(&mut buf);
    buf
}
