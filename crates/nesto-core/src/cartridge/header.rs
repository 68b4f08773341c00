//! Cartridge header parsing: archaic iNES, modern iNES, and NES 2.0.
//!
//! UNIF images are detected and rejected. The host may also bypass parsing
//! entirely by supplying a pre-filled [`CartDesc`] (used for headerless dumps
//! and database-driven frontends).

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::log::core_log;

/// Nametable mirroring as an 8-nybble pattern: nybble `x` selects the CIRAM
/// page backing 1 KiB nametable slot `x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u32)]
pub enum Mirror {
    #[default]
    Horizontal = 0x0011_0011,
    Vertical = 0x0101_0101,
    /// All slots on page 0.
    Single1 = 0x0000_0000,
    /// All slots on page 1.
    Single0 = 0x1111_1111,
    Four = 0x0123_0123,
    Four8 = 0x0123_4567,
    Four16 = 0x89AB_CDEF,
}

impl Mirror {
    pub(crate) fn pattern(self) -> u32 {
        self as u32
    }
}

/// Parsed (or host-supplied) cartridge description.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartDesc {
    /// Byte offset of PRG data within the image (header + optional trainer).
    pub offset: usize,
    pub prg_rom_size: usize,
    pub chr_rom_size: usize,
    pub prg_wram_size: usize,
    pub prg_sram_size: usize,
    pub chr_wram_size: usize,
    pub chr_sram_size: usize,
    pub mirror: Mirror,
    pub mapper: u16,
    pub submapper: u8,
    pub battery: bool,
}

pub(crate) const HEADER_LEN: usize = 16;
pub(crate) const TRAINER_LEN: usize = 512;

impl CartDesc {
    pub(crate) fn parse(rom: &[u8]) -> Result<Self, Error> {
        if rom.len() < HEADER_LEN {
            core_log!("ROM is less than {HEADER_LEN} bytes");
            return Err(Error::TooShort { actual: rom.len() });
        }

        if rom[0..4] == *b"UNIF" {
            core_log!("UNIF format unsupported");
            return Err(Error::UnifUnsupported);
        }

        if rom[0..4] != [b'N', b'E', b'S', 0x1A] {
            core_log!("Bad iNES header");
            return Err(Error::InvalidMagic);
        }

        // Archaic iNES fields are valid for every generation of the format.
        let mut desc = CartDesc {
            offset: HEADER_LEN,
            prg_rom_size: rom[4] as usize * 0x4000,
            chr_rom_size: rom[5] as usize * 0x2000,
            mirror: if rom[6] & 0x08 != 0 {
                Mirror::Four
            } else if rom[6] & 0x01 != 0 {
                Mirror::Vertical
            } else {
                Mirror::Horizontal
            },
            battery: rom[6] & 0x02 != 0,
            mapper: u16::from(rom[6] >> 4),
            ..CartDesc::default()
        };

        if rom[6] & 0x04 != 0 {
            desc.offset += TRAINER_LEN;
        }

        if rom[7] & 0x0C == 0 && rom[12] == 0 && rom[13] == 0 && rom[14] == 0 && rom[15] == 0 {
            // Modern iNES: byte 7 carries the upper mapper nibble, and the
            // reserved tail must be zero or the field is garbage.
            desc.mapper |= u16::from(rom[7] & 0xF0);
        } else if (rom[7] & 0x0C) >> 2 == 0x02 {
            // NES 2.0.
            desc.mapper |= u16::from(rom[7] & 0xF0);
            desc.mapper |= u16::from(rom[8] & 0x0F) << 8;
            desc.submapper = rom[8] >> 4;

            desc.prg_wram_size = ram_size_from_shift(rom[10] & 0x0F);
            desc.prg_sram_size = ram_size_from_shift((rom[10] & 0xF0) >> 4);
            desc.chr_wram_size = ram_size_from_shift(rom[11] & 0x0F);
            desc.chr_sram_size = ram_size_from_shift((rom[11] & 0xF0) >> 4);
        }

        Ok(desc)
    }

    pub(crate) fn log_summary(&self) {
        core_log!("PRG ROM Size: {}KB", self.prg_rom_size / 0x400);
        core_log!("CHR ROM Size: {}KB", self.chr_rom_size / 0x400);

        if self.prg_wram_size > 0
            || self.prg_sram_size > 0
            || self.chr_wram_size > 0
            || self.chr_sram_size > 0
        {
            core_log!(
                "PRG RAM V / NV: {}KB / {}KB",
                self.prg_wram_size / 0x400,
                self.prg_sram_size / 0x400
            );
            core_log!(
                "CHR RAM V / NV: {}KB / {}KB",
                self.chr_wram_size / 0x400,
                self.chr_sram_size / 0x400
            );
        }

        core_log!("Mapper: {}", self.mapper);
        if self.submapper != 0 {
            core_log!("Submapper: {:x}", self.submapper);
        }
        core_log!(
            "Mirroring: {}",
            match self.mirror {
                Mirror::Vertical => "Vertical",
                Mirror::Horizontal => "Horizontal",
                _ => "Four Screen",
            }
        );
        core_log!("Battery: {}", self.battery);
    }
}

fn ram_size_from_shift(shift: u8) -> usize {
    if shift == 0 { 0 } else { 64 << shift }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ines(prg_banks: u8, chr_banks: u8, flags6: u8, flags7: u8) -> [u8; HEADER_LEN] {
        [
            b'N', b'E', b'S', 0x1A, prg_banks, chr_banks, flags6, flags7, 0, 0, 0, 0, 0, 0, 0, 0,
        ]
    }

    #[test]
    fn parses_archaic_ines() {
        let desc = CartDesc::parse(&ines(2, 1, 0x01, 0)).expect("parse");
        assert_eq!(desc.prg_rom_size, 0x8000);
        assert_eq!(desc.chr_rom_size, 0x2000);
        assert_eq!(desc.mirror, Mirror::Vertical);
        assert_eq!(desc.mapper, 0);
        assert_eq!(desc.offset, HEADER_LEN);
    }

    #[test]
    fn trainer_moves_the_data_offset() {
        let desc = CartDesc::parse(&ines(1, 0, 0x04, 0)).expect("parse");
        assert_eq!(desc.offset, HEADER_LEN + TRAINER_LEN);
    }

    #[test]
    fn modern_ines_extends_the_mapper_number() {
        let desc = CartDesc::parse(&ines(1, 1, 0x40, 0x40)).expect("parse");
        assert_eq!(desc.mapper, 68);
    }

    #[test]
    fn dirty_tail_bytes_disable_the_upper_nibble() {
        let mut hdr = ines(1, 1, 0x40, 0x40);
        hdr[12] = b'D'; // e.g. "DiskDude!" spam
        let desc = CartDesc::parse(&hdr).expect("parse");
        assert_eq!(desc.mapper, 4);
    }

    #[test]
    fn nes2_carries_submapper_and_ram_sizes() {
        let mut hdr = ines(2, 0, 0x40, 0x08);
        hdr[8] = 0x10; // submapper 1
        hdr[10] = 0x07; // 8 KiB volatile PRG RAM
        hdr[10] |= 0x70; // 8 KiB battery PRG RAM
        let desc = CartDesc::parse(&hdr).expect("parse");
        assert_eq!(desc.mapper, 4);
        assert_eq!(desc.submapper, 1);
        assert_eq!(desc.prg_wram_size, 0x2000);
        assert_eq!(desc.prg_sram_size, 0x2000);
    }

    #[test]
    fn rejects_unif_and_garbage() {
        let mut unif = [0u8; HEADER_LEN];
        unif[0..4].copy_from_slice(b"UNIF");
        assert!(matches!(
            CartDesc::parse(&unif),
            Err(Error::UnifUnsupported)
        ));
        assert!(matches!(
            CartDesc::parse(&[0u8; HEADER_LEN]),
            Err(Error::InvalidMagic)
        ));
        assert!(matches!(
            CartDesc::parse(&[0u8; 4]),
            Err(Error::TooShort { actual: 4 })
        ));
    }
}
