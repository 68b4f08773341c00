//! 6502 processor status register.

use bitflags::bitflags;

bitflags! {
    /// The P register. `DECIMAL` is stored but the ALU always runs binary
    /// (the 2A03 has the decimal circuit disconnected).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) struct Status: u8 {
        const CARRY     = 0x01;
        const ZERO      = 0x02;
        const INTERRUPT = 0x04;
        const DECIMAL   = 0x08;
        const BREAK     = 0x10;
        const UNUSED    = 0x20;
        const OVERFLOW  = 0x40;
        const NEGATIVE  = 0x80;
    }
}

impl Status {
    /// Power-on / reset value: interrupts masked, unused bit set.
    pub(crate) const RESET: Status = Status::INTERRUPT.union(Status::UNUSED);

    pub(crate) fn set_zn(&mut self, v: u8) {
        self.set(Status::ZERO, v == 0);
        self.set(Status::NEGATIVE, v & 0x80 != 0);
    }
}

impl serde::Serialize for Status {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.bits())
    }
}

impl<'de> serde::Deserialize<'de> for Status {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        u8::deserialize(deserializer).map(Status::from_bits_retain)
    }
}
