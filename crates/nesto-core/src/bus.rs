//! System bus: address decode, cycle accounting, and DMA orchestration.
//!
//! Every CPU bus access advances the PPU three dots (two before a read's
//! data phase, one after; all three before a write lands), steps the
//! mapper, samples the interrupt lines, and steps the APU once. OAM DMA is
//! spliced in directly after the `$4014` write; DMC DMA stalls are spliced
//! at the end of the next read cycle, with the stall length picked from
//! what the CPU was doing when the fetch was requested.

use serde::{Deserialize, Serialize};

use crate::apu::{Apu, ExtAudio};
use crate::cartridge::Cartridge;
use crate::controller::Controllers;
use crate::interrupt::{IrqLines, IrqSource};
use crate::mem_block::ByteBlock;
use crate::memory::cpu as cpu_mem;
use crate::ppu::Ppu;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct DmaState {
    pub(crate) oam_begin: bool,
    pub(crate) oam: bool,
    pub(crate) oam_cycle: u16,
    pub(crate) dmc_begin: bool,
    pub(crate) dmc_addr: u16,
    pub(crate) dmc_delay: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SysState {
    pub(crate) ram: ByteBlock<{ cpu_mem::RAM_SIZE }>,
    /// I/O open-bus latch: the last byte driven over the `$4000` region.
    pub(crate) open_bus: u8,
    /// True while a CPU write cycle is in flight (DMC stall selection).
    pub(crate) write: bool,
    pub(crate) cycle: u64,
    /// Cycle of the last `$2007` read, for the double-read glitch.
    pub(crate) cycle_2007: u64,
    pub(crate) dma: DmaState,
}

impl SysState {
    pub(crate) fn new() -> Self {
        Self {
            ram: ByteBlock::new(),
            open_bus: 0,
            write: false,
            cycle: 0,
            cycle_2007: 0,
            dma: DmaState::default(),
        }
    }

    /// Soft reset clears everything but RAM contents.
    pub(crate) fn reset(&mut self, hard: bool) {
        let ram = self.ram;
        *self = Self::new();
        if !hard {
            self.ram = ram;
        }
    }
}

/// Borrow-view over the machine, built fresh for each CPU step.
pub(crate) struct SysBus<'a> {
    pub(crate) sys: &'a mut SysState,
    pub(crate) ppu: &'a mut Ppu,
    pub(crate) apu: &'a mut Apu,
    pub(crate) cart: &'a mut Cartridge,
    pub(crate) ctrl: &'a mut Controllers,
    pub(crate) ints: &'a mut IrqLines,
}

impl SysBus<'_> {
    fn ppu_step(&mut self) {
        self.ppu.step(self.cart, self.ints);
    }

    /// Address-decoded read with no cycle side effects beyond the device's
    /// own (used inside `read_cycle` and by the DMC re-read).
    fn decode_read(&mut self, addr: u16) -> u8 {
        if addr <= cpu_mem::RAM_MIRROR_END {
            return self.sys.ram[addr as usize % cpu_mem::RAM_SIZE];
        }

        if addr <= cpu_mem::PPU_REG_MIRROR_END {
            let addr = cpu_mem::PPU_REG_BASE + addr % 8;

            // Back-to-back $2007 reads (and mapper 185's CHR protection)
            // repeat the previous read: the second access decodes as a
            // side-effect-free register read and returns the PPU open bus.
            if addr == 0x2007
                && (self.sys.cycle.wrapping_sub(self.sys.cycle_2007) == 1
                    || self.cart.blocks_2007())
            {
                return self.ppu.cpu_read(self.cart, self.ints, 0x2003);
            }

            self.sys.cycle_2007 = self.sys.cycle;
            return self.ppu.cpu_read(self.cart, self.ints, addr);
        }

        if addr == cpu_mem::APU_STATUS {
            let v = self.apu.read_status(ExtAudio::None);
            self.sys.open_bus = v;
            return v;
        }

        if addr == cpu_mem::CONTROLLER_1 || addr == cpu_mem::CONTROLLER_2 {
            let v = self.ctrl.read(usize::from(addr & 1));
            self.sys.open_bus = v;
            return v;
        }

        if addr >= cpu_mem::CART_SPACE
            && let Some(v) = self.cart.prg_read(self.apu, addr)
        {
            return v;
        }

        self.sys.open_bus
    }

    fn decode_write(&mut self, addr: u16, v: u8) {
        if addr <= cpu_mem::RAM_MIRROR_END {
            self.sys.ram[addr as usize % cpu_mem::RAM_SIZE] = v;
            return;
        }

        if addr <= cpu_mem::PPU_REG_MIRROR_END {
            let addr = cpu_mem::PPU_REG_BASE + addr % 8;
            self.ppu.cpu_write(self.cart, self.ints, addr, v);
            // MMC5 snoops PPUCTRL for the sprite size.
            self.cart.ppu_register_write(addr, v);
            return;
        }

        if addr < cpu_mem::OAM_DMA || addr == cpu_mem::APU_STATUS || addr == cpu_mem::CONTROLLER_2 {
            self.sys.open_bus = v;
            self.apu.cpu_write(addr, v, self.sys.cycle);
            return;
        }

        if addr == cpu_mem::OAM_DMA {
            self.sys.open_bus = v;
            self.sys.dma.oam_begin = true;
            return;
        }

        if addr == cpu_mem::CONTROLLER_1 {
            self.sys.open_bus = v;
            self.ctrl.write_strobe(v & 1 != 0);
            return;
        }

        if addr < cpu_mem::CART_SPACE {
            self.sys.open_bus = v;
            return;
        }

        self.cart.prg_write(self.apu, addr, v, self.sys.cycle);
    }

    /// Shared per-cycle tail: mapper step, interrupt sampling, APU step.
    fn tick(&mut self) {
        self.cart.step();
        self.ints.set(IrqSource::Mapper, self.cart.irq_line());
        self.ints.poll();

        self.apu.step(self.sys.cycle);
        if let Some(addr) = self.apu.take_dmc_request() {
            self.dmc_begin(addr);
        }
        self.ints.set(IrqSource::Apu, self.apu.frame_irq());
        self.ints.set(IrqSource::Dmc, self.apu.dmc_irq());

        self.sys.cycle += 1;
    }

    /// One CPU read cycle.
    pub(crate) fn read_cycle(&mut self, addr: u16) -> u8 {
        self.ppu_step();
        self.ppu_step();

        let v = self.decode_read(addr);

        self.ppu_step();
        self.tick();

        self.dma_dmc(addr, v)
    }

    /// One CPU write cycle.
    pub(crate) fn write_cycle(&mut self, addr: u16, v: u8) {
        self.sys.write = true;

        // DMC DMA only engages on a read cycle; each further write while it
        // waits stretches the stall.
        if self.sys.dma.dmc_begin {
            self.sys.dma.dmc_delay += 1;
        }

        self.ppu_step();
        self.ppu_step();
        self.ppu_step();

        self.decode_write(addr, v);
        self.tick();

        self.sys.write = false;

        // OAM DMA starts immediately after the $4014 write retires.
        self.dma_oam(v);
    }

    /// Internal (idle) cycle: a read of $0000 nobody looks at.
    pub(crate) fn idle_cycle(&mut self) {
        self.read_cycle(0);
    }

    /// Side-effect-free read for reset vectors.
    pub(crate) fn peek(&mut self, addr: u16) -> u8 {
        if addr <= cpu_mem::RAM_MIRROR_END {
            self.sys.ram[addr as usize % cpu_mem::RAM_SIZE]
        } else if addr >= cpu_mem::CART_SPACE {
            self.cart.peek(addr)
        } else {
            0
        }
    }

    /// Marks a DMC fetch pending, picking the stall length from the current
    /// bus activity.
    fn dmc_begin(&mut self, addr: u16) {
        self.sys.dma.dmc_begin = true;
        self.sys.dma.dmc_addr = addr;

        self.sys.dma.dmc_delay = if self.sys.dma.oam {
            match self.sys.dma.oam_cycle {
                // Aligned with the tail of OAM DMA, the fetch slots right in.
                254 => 0,
                255 => 2,
                _ => 1,
            }
        } else if self.sys.write {
            2
        } else {
            3
        };
    }

    /// Splices the pending DMC stall at the end of a read cycle.
    fn dma_dmc(&mut self, addr: u16, v: u8) -> u8 {
        if !self.sys.dma.dmc_begin {
            return v;
        }

        // The stalled CPU re-runs the read it was performing; a $2007 read
        // repeats its side effects.
        if addr == 0x2007 {
            self.sys.cycle_2007 = 0;
            self.ppu.cpu_read(self.cart, self.ints, addr);
        }

        let v = self.decode_read(addr);

        self.sys.dma.dmc_begin = false;

        let delay = self.sys.dma.dmc_delay;
        for _ in 0..delay {
            self.idle_cycle();
        }

        let byte = self.read_cycle(self.sys.dma.dmc_addr);
        self.apu.dmc_dma_finish(byte);

        v
    }

    /// 256 read/write pairs, plus one or two alignment cycles.
    fn dma_oam(&mut self, page: u8) {
        if !self.sys.dma.oam_begin {
            return;
        }

        self.sys.dma.oam_begin = false;
        self.sys.dma.oam = true;

        self.idle_cycle();
        if self.sys.cycle & 1 != 0 {
            self.idle_cycle();
        }

        self.sys.dma.oam_cycle = 0;
        while self.sys.dma.oam_cycle < 256 {
            let b = self.read_cycle(u16::from(page) * 0x0100 + self.sys.dma.oam_cycle);
            self.write_cycle(0x2014, b);
            self.sys.dma.oam_cycle += 1;
        }

        self.sys.dma.oam = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Config, Nes};

    fn machine() -> Nes {
        let rom = crate::cartridge::tests::build_rom(0, 2, 1);
        let mut nes = Nes::new(Config::default());
        nes.load_cart(&rom, None, None).expect("load");
        nes
    }

    fn with_bus<R>(nes: &mut Nes, f: impl FnOnce(&mut SysBus<'_>) -> R) -> R {
        let cart = nes.cart.as_mut().expect("cart");
        let mut bus = SysBus {
            sys: &mut nes.sys,
            ppu: &mut nes.ppu,
            apu: &mut nes.apu,
            cart,
            ctrl: &mut nes.ctrl,
            ints: &mut nes.ints,
        };
        f(&mut bus)
    }

    #[test]
    fn ram_is_mirrored_every_2k() {
        let mut nes = machine();
        with_bus(&mut nes, |bus| {
            bus.write_cycle(0x0002, 0xDE);
            assert_eq!(bus.read_cycle(0x0802), 0xDE);
            assert_eq!(bus.read_cycle(0x1002), 0xDE);
            assert_eq!(bus.read_cycle(0x1802), 0xDE);
        });
    }

    #[test]
    fn each_read_cycle_advances_three_dots_and_one_apu_step() {
        let mut nes = machine();
        let (s0, d0) = nes.ppu.position();
        let start_dots = u32::from(s0) * 341 + u32::from(d0);
        with_bus(&mut nes, |bus| {
            for _ in 0..100 {
                bus.read_cycle(0x0000);
            }
        });
        let (s1, d1) = nes.ppu.position();
        let end_dots = u32::from(s1) * 341 + u32::from(d1);
        assert_eq!(end_dots - start_dots, 300);
    }

    #[test]
    fn unmapped_reads_return_the_io_open_bus() {
        let mut nes = machine();
        with_bus(&mut nes, |bus| {
            bus.write_cycle(0x4018, 0x5A);
            assert_eq!(bus.read_cycle(0x4018), 0x5A);
            // Cartridge space below any mapped window also floats.
            assert_eq!(bus.read_cycle(0x4020), 0x5A);
        });
    }

    #[test]
    fn oam_dma_takes_513_cycles_from_an_even_write() {
        let mut nes = machine();
        with_bus(&mut nes, |bus| {
            if bus.sys.cycle & 1 == 1 {
                bus.idle_cycle();
            }
            let before = bus.sys.cycle;
            bus.write_cycle(0x4014, 0x02);
            // One trigger write cycle plus the DMA itself.
            assert_eq!(bus.sys.cycle - before, 1 + 513);
        });
    }

    #[test]
    fn oam_dma_takes_514_cycles_from_an_odd_write() {
        let mut nes = machine();
        with_bus(&mut nes, |bus| {
            if bus.sys.cycle & 1 == 0 {
                bus.idle_cycle();
            }
            let before = bus.sys.cycle;
            bus.write_cycle(0x4014, 0x02);
            assert_eq!(bus.sys.cycle - before, 1 + 514);
        });
    }

    #[test]
    fn oam_dma_copies_a_page_into_oam() {
        let mut nes = machine();
        with_bus(&mut nes, |bus| {
            for i in 0..=255u16 {
                bus.write_cycle(0x0200 + i, i as u8);
            }
            bus.write_cycle(0x2003, 0x00);
            bus.write_cycle(0x4014, 0x02);
            bus.write_cycle(0x2003, 0x05);
            assert_eq!(bus.read_cycle(0x2004), 0x05);
        });
    }

    #[test]
    fn dmc_fetch_stalls_the_next_read() {
        let mut nes = machine();
        with_bus(&mut nes, |bus| {
            bus.write_cycle(0x4012, 0x00); // sample address $C000
            bus.write_cycle(0x4013, 0x01);
            let before = bus.sys.cycle;
            // The $4015 write raises the fetch during a write cycle
            // (2-cycle stall); it lands at the end of this read.
            bus.write_cycle(0x4015, 0x10);
            bus.read_cycle(0x0000);
            // write(1) + read(1) + stall(2) + fetch read(1).
            assert_eq!(bus.sys.cycle - before, 5);
        });
    }

    #[test]
    fn back_to_back_2007_reads_do_not_advance_v_twice() {
        let mut nes = machine();
        with_bus(&mut nes, |bus| {
            // Two distinguishable nametable bytes.
            bus.write_cycle(0x2006, 0x20);
            bus.write_cycle(0x2006, 0x00);
            bus.read_cycle(0x0000);
            bus.write_cycle(0x2007, 0xAA); // $2000, V -> $2001
            bus.write_cycle(0x2007, 0xBB); // $2001, V -> $2002

            bus.write_cycle(0x2006, 0x20);
            bus.write_cycle(0x2006, 0x00);
            bus.read_cycle(0x0000);

            bus.read_cycle(0x2007); // primes the buffer with $2000, V -> $2001
            bus.read_cycle(0x2007); // glitched: decodes as a dead register read

            bus.read_cycle(0x0000);
            // Had the glitched read advanced V, this would skip $2001's byte.
            assert_eq!(bus.read_cycle(0x2007), 0xAA);
            bus.read_cycle(0x0000);
            assert_eq!(bus.read_cycle(0x2007), 0xBB);
        });
    }

    #[test]
    fn controller_strobe_and_shift_through_the_bus() {
        let mut nes = machine();
        nes.controller_state(0, 0x29); // A | START | DOWN
        with_bus(&mut nes, |bus| {
            bus.write_cycle(0x4016, 0x01);
            bus.write_cycle(0x4016, 0x00);

            let expected = [1, 0, 0, 1, 0, 1, 0, 0];
            for want in expected {
                let v = bus.read_cycle(0x4016);
                assert_eq!(v & 0x01, want);
                assert_eq!(v & 0x40, 0x40);
            }
            for _ in 0..4 {
                assert_eq!(bus.read_cycle(0x4016) & 0x01, 1);
            }
        });
    }

    #[test]
    fn apu_status_reads_land_in_the_open_bus_latch() {
        let mut nes = machine();
        with_bus(&mut nes, |bus| {
            bus.write_cycle(0x4015, 0x01);
            bus.write_cycle(0x4003, 0x08);
            let status = bus.read_cycle(0x4015);
            assert_eq!(status & 0x01, 0x01);
            assert_eq!(bus.read_cycle(0x4018), status);
        });
    }
}
