//! Mappers 16 and 159 (Bandai FCG family).
//!
//! Register block decoded at `$6000-$7FFF` (FCG-1/2) or `$8000-$FFFF`
//! (LZ93D50 boards, mapper 16 submapper 5 and mapper 159). The 16-bit IRQ
//! counter comes in two forms: direct decrement of the live counter, or a
//! reload latch copied on IRQ enable. The EEPROM on later boards is
//! accepted and ignored.

use serde::{Deserialize, Serialize};

use crate::cartridge::bank_window::Backing;
use crate::cartridge::header::Mirror;
use crate::cartridge::mapper::{CartCtx, MapperIrq};
use crate::log::core_log;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Fcg {
    /// LZ93D50: registers at `$8000+`, IRQ latch form.
    alt: bool,
}

impl Fcg {
    pub(crate) fn new(ctx: &mut CartCtx<'_>) -> Self {
        let last = ctx.prg_rom_last_bank(16);
        ctx.map_prg(Backing::Rom, 0xC000, last, 16);
        ctx.map_ciram(Mirror::Vertical);

        Self {
            alt: (ctx.desc.mapper == 16 && ctx.desc.submapper == 5) || ctx.desc.mapper == 159,
        }
    }

    pub(crate) fn prg_write(&mut self, ctx: &mut CartCtx<'_>, addr: u16, v: u8) {
        let (low, high, sub) = if self.alt {
            (0x8000u16, 0xFFFFu16, 0x2000u16)
        } else {
            (0x6000u16, 0x7FFFu16, 0x0000u16)
        };

        if !(low..=high).contains(&addr) {
            return;
        }
        let addr = (addr - sub) & 0xE00F;

        match addr {
            0x6000..=0x6007 => {
                ctx.map_chr(Backing::Rom, (addr - 0x6000) * 0x0400, u16::from(v), 1);
            }
            0x6008 => ctx.map_prg(Backing::Rom, 0x8000, u16::from(v) & 0x0F, 16),
            0x6009 => match v & 0x03 {
                0 => ctx.map_ciram(Mirror::Vertical),
                1 => ctx.map_ciram(Mirror::Horizontal),
                2 => ctx.map_ciram(Mirror::Single0),
                _ => ctx.map_ciram(Mirror::Single1),
            },
            0x600A => {
                ctx.irq.enable = v & 0x01 != 0;
                ctx.irq.ack = true;
                if self.alt {
                    ctx.irq.counter = ctx.irq.value;
                }
            }
            0x600B => {
                if self.alt {
                    ctx.irq.value = (ctx.irq.value & 0xFF00) | u16::from(v);
                } else {
                    ctx.irq.counter = (ctx.irq.counter & 0xFF00) | u16::from(v);
                }
            }
            0x600C => {
                if self.alt {
                    ctx.irq.value = (ctx.irq.value & 0x00FF) | (u16::from(v) << 8);
                } else {
                    ctx.irq.counter = (ctx.irq.counter & 0x00FF) | (u16::from(v) << 8);
                }
            }
            // EEPROM access.
            0x600D => {}
            _ => core_log!("Uncaught Bandai FCG write {addr:x}: {v:x}"),
        }
    }

    pub(crate) fn step(&mut self, irq: &mut MapperIrq) {
        if irq.ack {
            irq.line = false;
            irq.ack = false;
        }

        if irq.enable {
            if irq.counter == 0xFFFE {
                irq.line = true;
                irq.enable = false;
            } else {
                irq.counter = irq.counter.wrapping_sub(1);
            }
        }
    }
}
