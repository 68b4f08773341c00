//! Cartridge: header, memory regions, bank windows, and the mapper.
//!
//! The cart owns every byte of cartridge-side storage (PRG ROM, PRG RAM,
//! CHR ROM, CHR RAM, the console's nametable CIRAM, and MMC5 EXRAM) plus the
//! two bank windows the bus and PPU read through. The mapper mutates the
//! windows; nothing outside this module touches slot contents directly.

use serde::{Deserialize, Serialize};

use crate::apu::Apu;
use crate::cartridge::bank_window::{Backing, BankWindow, VIEW_SPR};
use crate::cartridge::header::CartDesc;
use crate::cartridge::mapper::{CartCtx, Mapper, MapperIrq};
use crate::error::Error;
use crate::log::core_log;
use crate::memory::ppu as ppu_mem;

pub(crate) mod bank_window;
pub mod header;
pub(crate) mod mapper;

/// What kind of PPU fetch is on the bus. MMC5 keeps separate CHR maps for
/// sprite and background fetches and needs to tell them apart; everything
/// else treats all three alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChrKind {
    /// CPU `$2007` data access.
    Data,
    Bg,
    Spr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct CartMemory {
    pub(crate) prg_rom: Vec<u8>,
    pub(crate) prg_ram: Vec<u8>,
    pub(crate) chr_rom: Vec<u8>,
    pub(crate) chr_ram: Vec<u8>,
    pub(crate) ciram: Vec<u8>,
    pub(crate) exram: Vec<u8>,
    /// Battery-backed prefix of `prg_ram`.
    pub(crate) prg_sram: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Cartridge {
    desc: CartDesc,
    mem: CartMemory,
    prg: BankWindow,
    chr: BankWindow,
    irq: MapperIrq,
    mapper: Mapper,
    sram_dirty: usize,
}

impl Cartridge {
    /// Builds a cartridge from a ROM image, an optional initial SRAM image,
    /// and an optional host-supplied header override.
    pub(crate) fn create(
        rom: &[u8],
        sram: Option<&[u8]>,
        desc: Option<CartDesc>,
    ) -> Result<Self, Error> {
        let desc = match desc {
            Some(desc) => desc,
            None => CartDesc::parse(rom)?,
        };

        desc.log_summary();

        // Defaults to be safe with poor iNES headers.
        let prg_sram = if desc.prg_sram_size == 0 {
            0x2000
        } else {
            desc.prg_sram_size
        };
        let prg_wram = if desc.prg_wram_size == 0 {
            0x1E000
        } else {
            desc.prg_wram_size
        };
        let chr_wram = if desc.chr_wram_size == 0 {
            0x8000
        } else {
            desc.chr_wram_size
        };

        if desc.offset + desc.prg_rom_size > rom.len() {
            core_log!("PRG ROM size is incorrect");
            return Err(Error::SectionTooShort {
                section: "PRG ROM",
                expected: desc.prg_rom_size,
                actual: rom.len().saturating_sub(desc.offset),
            });
        }
        if desc.offset + desc.prg_rom_size + desc.chr_rom_size > rom.len() {
            core_log!("CHR ROM size is incorrect");
            return Err(Error::SectionTooShort {
                section: "CHR ROM",
                expected: desc.chr_rom_size,
                actual: rom.len() - desc.offset - desc.prg_rom_size,
            });
        }

        let prg_start = desc.offset;
        let chr_start = prg_start + desc.prg_rom_size;

        let mut mem = CartMemory {
            prg_rom: rom[prg_start..prg_start + desc.prg_rom_size].to_vec(),
            prg_ram: vec![0; prg_sram + prg_wram],
            chr_rom: rom[chr_start..chr_start + desc.chr_rom_size].to_vec(),
            chr_ram: vec![0; chr_wram + desc.chr_sram_size],
            ciram: vec![0; ppu_mem::CIRAM_SIZE],
            exram: vec![0; ppu_mem::EXRAM_SIZE],
            prg_sram,
        };

        // The battery-backed region is the start of PRG RAM.
        if let Some(sram) = sram
            && !sram.is_empty()
            && sram.len() <= prg_sram
        {
            mem.prg_ram[..sram.len()].copy_from_slice(sram);
        }

        let mut prg = BankWindow::new(12);
        let mut chr = BankWindow::new(10);
        let mut irq = MapperIrq::default();
        let mut sram_dirty = 0usize;

        let mapper = {
            let mut ctx = CartCtx {
                desc: &desc,
                mem: &mut mem,
                prg: &mut prg,
                chr: &mut chr,
                irq: &mut irq,
                sram_dirty: &mut sram_dirty,
            };

            // Power-on defaults before the board takes over.
            ctx.map_prg(Backing::Rom, 0x8000, 0, 32);
            ctx.map_ciram(desc.mirror);
            let chr_backing = ctx.chr_backing();
            ctx.map_chr(chr_backing, 0x0000, 0, 8);

            Mapper::create(&mut ctx)?
        };

        Ok(Self {
            desc,
            mem,
            prg,
            chr,
            irq,
            mapper,
            sram_dirty: 0,
        })
    }

    fn with_ctx<R>(&mut self, f: impl FnOnce(&mut Mapper, &mut CartCtx<'_>) -> R) -> R {
        let Cartridge {
            desc,
            mem,
            prg,
            chr,
            irq,
            mapper,
            sram_dirty,
        } = self;
        let mut ctx = CartCtx {
            desc,
            mem,
            prg,
            chr,
            irq,
            sram_dirty,
        };
        f(mapper, &mut ctx)
    }

    /// CPU read in cartridge space (`$4020-$FFFF`). `None` is an open-bus
    /// miss.
    pub(crate) fn prg_read(&mut self, apu: &mut Apu, addr: u16) -> Option<u8> {
        self.with_ctx(|mapper, ctx| match mapper.prg_read(ctx, apu, addr) {
            Some(result) => result,
            None => ctx.prg_window_read(addr),
        })
    }

    pub(crate) fn prg_write(&mut self, apu: &mut Apu, addr: u16, v: u8, cycle: u64) {
        self.with_ctx(|mapper, ctx| mapper.prg_write(ctx, apu, addr, v, cycle));
    }

    /// Side-effect-free PRG window read (reset vectors).
    pub(crate) fn peek(&mut self, addr: u16) -> u8 {
        self.with_ctx(|_, ctx| ctx.prg_window_read(addr).unwrap_or(0))
    }

    /// PPU-side read: pattern tables below `$2000`, nametables above.
    pub(crate) fn chr_read(&mut self, addr: u16, kind: ChrKind, nt: bool) -> u8 {
        self.with_ctx(|mapper, ctx| {
            if addr <= crate::memory::ppu::PATTERN_END {
                match mapper {
                    Mapper::Mmc5(m) => m.chr_read(ctx, addr, kind),
                    Mapper::Mmc2(m) => m.chr_read(ctx, addr),
                    _ => ctx.chr_window_read(VIEW_SPR, addr).unwrap_or(0),
                }
            } else {
                match mapper {
                    Mapper::Mmc5(m) => m.nt_read(ctx, addr, kind, nt),
                    _ => ctx.chr_window_read(VIEW_SPR, addr).unwrap_or(0),
                }
            }
        })
    }

    pub(crate) fn chr_write(&mut self, addr: u16, v: u8) {
        self.with_ctx(|_, ctx| ctx.chr_window_write(addr, v));
    }

    /// Qualified A12 rising edge from the PPU address bus.
    pub(crate) fn ppu_a12_rise(&mut self) {
        let Cartridge { irq, mapper, .. } = self;
        mapper.ppu_a12_rise(irq);
    }

    /// CPU writes to `$2000-$3FFF` are also visible to the cart connector.
    pub(crate) fn ppu_register_write(&mut self, addr: u16, v: u8) {
        self.mapper.ppu_register_write(addr, v);
    }

    pub(crate) fn blocks_2007(&self) -> bool {
        self.mapper.blocks_2007()
    }

    /// Per-CPU-cycle step for the mapper IRQ engines.
    pub(crate) fn step(&mut self) {
        self.with_ctx(|mapper, ctx| mapper.step(ctx));
    }

    pub(crate) fn irq_line(&self) -> bool {
        self.irq.line
    }

    pub(crate) fn battery(&self) -> bool {
        self.desc.battery
    }

    pub(crate) fn sram_size(&self) -> usize {
        self.mem.prg_sram
    }

    /// Read-and-clear dirty counter; zero for carts without a battery.
    pub(crate) fn sram_dirty(&mut self) -> usize {
        if !self.desc.battery {
            return 0;
        }
        std::mem::take(&mut self.sram_dirty)
    }

    pub(crate) fn sram_copy(&mut self, buf: &mut [u8]) {
        let n = buf.len().min(self.mem.prg_ram.len());
        buf[..n].copy_from_slice(&self.mem.prg_ram[..n]);
        self.sram_dirty = 0;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cartridge::header::Mirror;

    pub(crate) fn build_rom(mapper: u16, prg_banks_16k: u8, chr_banks_8k: u8) -> Vec<u8> {
        let mut rom = vec![
            b'N',
            b'E',
            b'S',
            0x1A,
            prg_banks_16k,
            chr_banks_8k,
            ((mapper as u8) << 4) | 0x01,
            (mapper & 0xF0) as u8,
            0,
            0,
            0,
            0,
            0,
            0,
            0,
            0,
        ];
        for bank in 0..prg_banks_16k {
            rom.extend(std::iter::repeat_n(bank, 0x4000));
        }
        for _ in 0..chr_banks_8k {
            rom.extend((0..0x2000u32).map(|v| (v & 0xFF) as u8));
        }
        rom
    }

    #[test]
    fn nrom_maps_and_mirrors_prg() {
        let rom = build_rom(0, 1, 1);
        let mut cart = Cartridge::create(&rom, None, None).expect("create");
        let mut apu = Apu::new(&crate::Config::default());

        assert_eq!(cart.prg_read(&mut apu, 0x8000), Some(0));
        // 16 KiB PRG mirrors into the upper half.
        assert_eq!(cart.prg_read(&mut apu, 0xC000), Some(0));
    }

    #[test]
    fn prg_ram_round_trips_and_marks_sram_dirty() {
        let mut rom = build_rom(0, 1, 1);
        rom[6] |= 0x02; // battery
        let mut cart = Cartridge::create(&rom, None, None).expect("create");
        let mut apu = Apu::new(&crate::Config::default());

        cart.prg_write(&mut apu, 0x6000, 0x55, 0);
        assert_eq!(cart.prg_read(&mut apu, 0x6000), Some(0x55));
        assert_eq!(cart.sram_dirty(), 0x2000);
        assert_eq!(cart.sram_dirty(), 0);
    }

    #[test]
    fn initial_sram_image_is_restored() {
        let mut rom = build_rom(0, 1, 1);
        rom[6] |= 0x02;
        let sram = vec![0xA5; 0x2000];
        let mut cart = Cartridge::create(&rom, Some(&sram), None).expect("create");
        let mut apu = Apu::new(&crate::Config::default());
        assert_eq!(cart.prg_read(&mut apu, 0x6000), Some(0xA5));
    }

    #[test]
    fn vertical_mirroring_shares_ciram_pages() {
        let rom = build_rom(0, 1, 1);
        let mut cart = Cartridge::create(&rom, None, None).expect("create");
        assert_eq!(cart.desc.mirror, Mirror::Vertical);

        cart.chr_write(0x2000, 0x42);
        assert_eq!(cart.chr_read(0x2800, ChrKind::Data, false), 0x42);
        assert_eq!(cart.chr_read(0x2400, ChrKind::Data, false), 0x00);
    }

    #[test]
    fn chr_ram_is_writable_when_no_chr_rom() {
        let rom = build_rom(0, 1, 0);
        let mut cart = Cartridge::create(&rom, None, None).expect("create");
        cart.chr_write(0x0123, 0x99);
        assert_eq!(cart.chr_read(0x0123, ChrKind::Data, false), 0x99);
    }

    #[test]
    fn chr_rom_writes_are_dropped() {
        let rom = build_rom(0, 1, 1);
        let mut cart = Cartridge::create(&rom, None, None).expect("create");
        let before = cart.chr_read(0x0100, ChrKind::Data, false);
        cart.chr_write(0x0100, before.wrapping_add(1));
        assert_eq!(cart.chr_read(0x0100, ChrKind::Data, false), before);
    }

    #[test]
    fn unsupported_mapper_is_rejected() {
        let rom = build_rom(254, 1, 1);
        assert!(matches!(
            Cartridge::create(&rom, None, None),
            Err(Error::UnsupportedMapper(254))
        ));
    }

    #[test]
    fn short_prg_section_is_rejected() {
        let rom = build_rom(0, 2, 0);
        assert!(matches!(
            Cartridge::create(&rom[..0x2000], None, None),
            Err(Error::SectionTooShort { .. })
        ));
    }

    #[test]
    fn mmc3_irq_counts_a12_rises_and_acks() {
        let rom = build_rom(4, 8, 1);
        let mut cart = Cartridge::create(&rom, None, None).expect("create");
        let mut apu = Apu::new(&crate::Config::default());

        cart.prg_write(&mut apu, 0xC000, 5, 0); // latch
        cart.prg_write(&mut apu, 0xC001, 0, 0); // reload on next edge
        cart.prg_write(&mut apu, 0xE001, 0, 0); // enable

        // Edge 1 reloads to 5; edges 2-6 count down; the sixth fires.
        for edge in 1..=6 {
            cart.ppu_a12_rise();
            cart.step();
            if edge < 6 {
                assert!(!cart.irq_line(), "edge {edge}");
            }
        }
        assert!(cart.irq_line());

        // $E000 acknowledges and disables.
        cart.prg_write(&mut apu, 0xE000, 0, 0);
        cart.step();
        assert!(!cart.irq_line());

        // Re-enabled, the zero counter reloads from the latch on the next
        // edge and fires again six edges later.
        cart.prg_write(&mut apu, 0xE001, 0, 0);
        for edge in 1..=6 {
            cart.ppu_a12_rise();
            cart.step();
            if edge < 6 {
                assert!(!cart.irq_line(), "second pass edge {edge}");
            }
        }
        assert!(cart.irq_line());
    }

    #[test]
    fn mmc1_serial_port_loads_five_bits() {
        let rom = build_rom(1, 8, 0);
        let mut cart = Cartridge::create(&rom, None, None).expect("create");
        let mut apu = Apu::new(&crate::Config::default());

        // Select PRG bank 2 through the serial register, one bit per write,
        // spaced two cycles apart so none are dropped.
        let mut cycle = 10;
        for bit in [0, 1, 0, 0, 0] {
            cart.prg_write(&mut apu, 0xE000, bit, cycle);
            cycle += 2;
        }

        assert_eq!(cart.prg_read(&mut apu, 0x8000), Some(2));
        // Default control mode fixes the last bank at $C000.
        assert_eq!(cart.prg_read(&mut apu, 0xC000), Some(7));
    }

    #[test]
    fn mmc1_drops_back_to_back_writes() {
        let rom = build_rom(1, 8, 0);
        let mut cart = Cartridge::create(&rom, None, None).expect("create");
        let mut apu = Apu::new(&crate::Config::default());

        // Five spaced writes interleaved with consecutive-cycle writes that
        // the serial port must ignore.
        let mut cycle = 10;
        for bit in [0, 1, 0, 0, 0] {
            cart.prg_write(&mut apu, 0xE000, bit, cycle);
            cart.prg_write(&mut apu, 0xE000, 1, cycle + 1); // dropped
            cycle += 4;
        }

        assert_eq!(cart.prg_read(&mut apu, 0x8000), Some(2));
    }

    #[test]
    fn fme7_irq_counts_cpu_cycles() {
        let rom = build_rom(69, 8, 1);
        let mut cart = Cartridge::create(&rom, None, None).expect("create");
        let mut apu = Apu::new(&crate::Config::default());

        cart.prg_write(&mut apu, 0x8000, 0x0E, 0); // counter low
        cart.prg_write(&mut apu, 0xA000, 10, 0);
        cart.prg_write(&mut apu, 0x8000, 0x0F, 0); // counter high
        cart.prg_write(&mut apu, 0xA000, 0, 0);
        cart.prg_write(&mut apu, 0x8000, 0x0D, 0); // IRQ control
        cart.prg_write(&mut apu, 0xA000, 0x81, 0); // enable + cycle mode

        for _ in 0..10 {
            cart.step();
            assert!(!cart.irq_line());
        }
        // The counter fires on the wrap below zero.
        cart.step();
        assert!(cart.irq_line());
    }

    #[test]
    fn vrc_cycle_mode_counts_up_to_ff() {
        let rom = build_rom(23, 8, 1);
        let mut cart = Cartridge::create(&rom, None, None).expect("create");
        let mut apu = Apu::new(&crate::Config::default());

        cart.prg_write(&mut apu, 0xF000, 0x0A, 0); // latch low nybble
        cart.prg_write(&mut apu, 0xF001, 0x0F, 0); // latch high nybble -> $FA
        cart.prg_write(&mut apu, 0xF002, 0x06, 0); // enable, cycle mode

        for _ in 0..5 {
            cart.step();
            assert!(!cart.irq_line());
        }
        cart.step();
        assert!(cart.irq_line());

        cart.prg_write(&mut apu, 0xF003, 0, 0); // ack
        cart.step();
        assert!(!cart.irq_line());
    }

    #[test]
    fn bandai_fcg_counts_down_to_fffe() {
        let rom = build_rom(16, 8, 1);
        let mut cart = Cartridge::create(&rom, None, None).expect("create");
        let mut apu = Apu::new(&crate::Config::default());

        cart.prg_write(&mut apu, 0x600B, 3, 0); // counter low
        cart.prg_write(&mut apu, 0x600C, 0, 0); // counter high
        cart.prg_write(&mut apu, 0x600A, 1, 0); // enable

        for _ in 0..5 {
            cart.step();
            assert!(!cart.irq_line());
        }
        cart.step();
        assert!(cart.irq_line());
    }

    #[test]
    fn mmc5_multiplier_is_readable() {
        let rom = build_rom(5, 8, 1);
        let mut cart = Cartridge::create(&rom, None, None).expect("create");
        let mut apu = Apu::new(&crate::Config::default());

        cart.prg_write(&mut apu, 0x5205, 12, 0);
        cart.prg_write(&mut apu, 0x5206, 34, 0);
        let lo = cart.prg_read(&mut apu, 0x5205).expect("lo");
        let hi = cart.prg_read(&mut apu, 0x5206).expect("hi");
        assert_eq!(u16::from_le_bytes([lo, hi]), 12 * 34);
    }

    #[test]
    fn mmc5_exram_is_cpu_visible() {
        let rom = build_rom(5, 8, 1);
        let mut cart = Cartridge::create(&rom, None, None).expect("create");
        let mut apu = Apu::new(&crate::Config::default());

        cart.prg_write(&mut apu, 0x5C42, 0x77, 0);
        assert_eq!(cart.prg_read(&mut apu, 0x5C42), Some(0x77));
    }

    #[test]
    fn uxrom_banks_and_conflicts() {
        let rom = build_rom(2, 4, 0);
        let mut cart = Cartridge::create(&rom, None, None).expect("create");
        let mut apu = Apu::new(&crate::Config::default());

        // Fixed last bank at $C000.
        assert_eq!(cart.prg_read(&mut apu, 0xC000), Some(3));

        cart.prg_write(&mut apu, 0xC000, 2, 0);
        assert_eq!(cart.prg_read(&mut apu, 0x8000), Some(2));

        // No separate bus driver: the written value is ANDed with the ROM
        // byte under the register address (3 here).
        cart.prg_write(&mut apu, 0xC000, 0xFF, 0);
        assert_eq!(cart.prg_read(&mut apu, 0x8000), Some(3));
    }
}
