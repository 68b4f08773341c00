//! Shared interrupt lines between the CPU and its peers.
//!
//! The PPU, APU, and mapper drive levels into this state word; the CPU
//! samples it once per bus cycle. IRQ is level-sensitive with a one-cycle
//! sampling delay (the value an instruction sees at retire is the level from
//! its penultimate cycle). NMI is edge-triggered on the PPU's
//! `vblank && nmi_enabled` output going high.

use serde::{Deserialize, Serialize};

/// IRQ line sources, OR'd into a single CPU-visible level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IrqSource {
    Apu,
    Dmc,
    Mapper,
}

impl IrqSource {
    fn bit(self) -> u8 {
        match self {
            Self::Apu => 0x01,
            Self::Dmc => 0x02,
            Self::Mapper => 0x04,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct IrqLines {
    lines: u8,
    nmi_line: bool,
    nmi_edge: bool,
    irq_sampled: bool,
    irq_delayed: bool,
}

impl IrqLines {
    pub(crate) fn set(&mut self, source: IrqSource, asserted: bool) {
        if asserted {
            self.lines |= source.bit();
        } else {
            self.lines &= !source.bit();
        }
    }

    /// Drives the NMI level; a low-to-high transition latches an edge.
    pub(crate) fn set_nmi(&mut self, level: bool) {
        if level && !self.nmi_line {
            self.nmi_edge = true;
        }
        self.nmi_line = level;
    }

    /// Per-cycle sample of the IRQ level.
    pub(crate) fn poll(&mut self) {
        self.irq_delayed = self.irq_sampled;
        self.irq_sampled = self.lines != 0;
    }

    /// The IRQ level as seen at instruction retire.
    pub(crate) fn irq_asserted(&self) -> bool {
        self.irq_delayed
    }

    /// Consumes a latched NMI edge.
    pub(crate) fn take_nmi(&mut self) -> bool {
        let edge = self.nmi_edge;
        self.nmi_edge = false;
        edge
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}
