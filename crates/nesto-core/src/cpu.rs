//! Cycle-accurate 6502 core (2A03 variant: decimal mode disconnected).
//!
//! Every cycle of every instruction is a bus transaction through
//! [`SysBus::read_cycle`]/[`SysBus::write_cycle`], including the dummy reads
//! on indexed addressing, the double writes of read-modify-write ops, and
//! the branch penalty cycles, so the PPU/APU/mapper stay in lockstep at
//! single-cycle granularity. Interrupts are sampled by the bus once per
//! cycle; the decision an instruction sees at retire is the level from its
//! penultimate cycle. The stable unofficial opcodes are implemented; the
//! JAM opcodes are logged and skipped rather than wedging the machine.

use serde::{Deserialize, Serialize};

use crate::bus::SysBus;
use crate::log::core_log;

pub(crate) mod status;
use status::Status;

const NMI_VECTOR: u16 = 0xFFFA;
const RESET_VECTOR: u16 = 0xFFFC;
const IRQ_VECTOR: u16 = 0xFFFE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Cpu {
    pub(crate) a: u8,
    pub(crate) x: u8,
    pub(crate) y: u8,
    pub(crate) s: u8,
    pub(crate) p: Status,
    pub(crate) pc: u16,
}

impl Cpu {
    pub(crate) fn new() -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            s: 0xFD,
            p: Status::RESET,
            pc: 0,
        }
    }

    /// RESET: vector fetch, S to $FD, I and U set. Soft reset keeps the
    /// registers and drops S by the three phantom pushes.
    pub(crate) fn reset(&mut self, bus: &mut SysBus<'_>, hard: bool) {
        if hard {
            self.a = 0;
            self.x = 0;
            self.y = 0;
            self.s = 0xFD;
            self.p = Status::RESET;
        } else {
            self.s = self.s.wrapping_sub(3);
            self.p.insert(Status::INTERRUPT);
        }

        let lo = bus.peek(RESET_VECTOR);
        let hi = bus.peek(RESET_VECTOR + 1);
        self.pc = u16::from_le_bytes([lo, hi]);
    }

    /// Runs one instruction (or services a pending interrupt).
    pub(crate) fn step(&mut self, bus: &mut SysBus<'_>) {
        if bus.ints.take_nmi() {
            self.interrupt(bus, NMI_VECTOR);
            return;
        }
        if bus.ints.irq_asserted() && !self.p.contains(Status::INTERRUPT) {
            self.interrupt(bus, IRQ_VECTOR);
            return;
        }

        let op = self.fetch8(bus);
        self.exec(bus, op);
    }

    // Fetch/stack primitives.

    fn fetch8(&mut self, bus: &mut SysBus<'_>) -> u8 {
        let v = bus.read_cycle(self.pc);
        self.pc = self.pc.wrapping_add(1);
        v
    }

    fn fetch16(&mut self, bus: &mut SysBus<'_>) -> u16 {
        let lo = self.fetch8(bus);
        let hi = self.fetch8(bus);
        u16::from_le_bytes([lo, hi])
    }

    fn push(&mut self, bus: &mut SysBus<'_>, v: u8) {
        bus.write_cycle(0x0100 + u16::from(self.s), v);
        self.s = self.s.wrapping_sub(1);
    }

    fn pop(&mut self, bus: &mut SysBus<'_>) -> u8 {
        self.s = self.s.wrapping_add(1);
        bus.read_cycle(0x0100 + u16::from(self.s))
    }

    /// Seven-cycle interrupt entry (NMI/IRQ).
    fn interrupt(&mut self, bus: &mut SysBus<'_>, vector: u16) {
        bus.read_cycle(self.pc);
        bus.read_cycle(self.pc);
        self.push(bus, (self.pc >> 8) as u8);
        self.push(bus, self.pc as u8);
        self.push(bus, ((self.p | Status::UNUSED) - Status::BREAK).bits());
        self.p.insert(Status::INTERRUPT);
        let lo = bus.read_cycle(vector);
        let hi = bus.read_cycle(vector + 1);
        self.pc = u16::from_le_bytes([lo, hi]);
    }

    // Addressing. `_r` helpers read the operand with exact cycle counts;
    // `_a` helpers produce the effective address for stores, always paying
    // the fix-up cycle; `rmw_*` run the read/dummy-write/write sequence.

    fn imm(&mut self, bus: &mut SysBus<'_>) -> u8 {
        self.fetch8(bus)
    }

    fn zp_a(&mut self, bus: &mut SysBus<'_>) -> u16 {
        u16::from(self.fetch8(bus))
    }

    fn zp_indexed_a(&mut self, bus: &mut SysBus<'_>, index: u8) -> u16 {
        let base = self.fetch8(bus);
        bus.read_cycle(u16::from(base));
        u16::from(base.wrapping_add(index))
    }

    fn zpx_a(&mut self, bus: &mut SysBus<'_>) -> u16 {
        let x = self.x;
        self.zp_indexed_a(bus, x)
    }

    fn zpy_a(&mut self, bus: &mut SysBus<'_>) -> u16 {
        let y = self.y;
        self.zp_indexed_a(bus, y)
    }

    fn abs_a(&mut self, bus: &mut SysBus<'_>) -> u16 {
        self.fetch16(bus)
    }

    /// Indexed absolute. Reads only pay the fix-up cycle on a page
    /// crossing; writes and RMW always do, against the partially-summed
    /// address.
    fn abs_indexed(&mut self, bus: &mut SysBus<'_>, index: u8, always_fix: bool) -> u16 {
        let base = self.fetch16(bus);
        let eff = base.wrapping_add(u16::from(index));
        if always_fix || (base & 0xFF00) != (eff & 0xFF00) {
            bus.read_cycle((base & 0xFF00) | (eff & 0x00FF));
        }
        eff
    }

    fn izx_a(&mut self, bus: &mut SysBus<'_>) -> u16 {
        let ptr = self.fetch8(bus);
        bus.read_cycle(u16::from(ptr));
        let ptr = ptr.wrapping_add(self.x);
        let lo = bus.read_cycle(u16::from(ptr));
        let hi = bus.read_cycle(u16::from(ptr.wrapping_add(1)));
        u16::from_le_bytes([lo, hi])
    }

    fn izy_base(&mut self, bus: &mut SysBus<'_>) -> u16 {
        let ptr = self.fetch8(bus);
        let lo = bus.read_cycle(u16::from(ptr));
        let hi = bus.read_cycle(u16::from(ptr.wrapping_add(1)));
        u16::from_le_bytes([lo, hi])
    }

    fn izy_a(&mut self, bus: &mut SysBus<'_>, always_fix: bool) -> u16 {
        let base = self.izy_base(bus);
        let eff = base.wrapping_add(u16::from(self.y));
        if always_fix || (base & 0xFF00) != (eff & 0xFF00) {
            bus.read_cycle((base & 0xFF00) | (eff & 0x00FF));
        }
        eff
    }

    fn zp_r(&mut self, bus: &mut SysBus<'_>) -> u8 {
        let a = self.zp_a(bus);
        bus.read_cycle(a)
    }

    fn zpx_r(&mut self, bus: &mut SysBus<'_>) -> u8 {
        let a = self.zpx_a(bus);
        bus.read_cycle(a)
    }

    fn zpy_r(&mut self, bus: &mut SysBus<'_>) -> u8 {
        let a = self.zpy_a(bus);
        bus.read_cycle(a)
    }

    fn abs_r(&mut self, bus: &mut SysBus<'_>) -> u8 {
        let a = self.abs_a(bus);
        bus.read_cycle(a)
    }

    fn absx_r(&mut self, bus: &mut SysBus<'_>) -> u8 {
        let x = self.x;
        let a = self.abs_indexed(bus, x, false);
        bus.read_cycle(a)
    }

    fn absy_r(&mut self, bus: &mut SysBus<'_>) -> u8 {
        let y = self.y;
        let a = self.abs_indexed(bus, y, false);
        bus.read_cycle(a)
    }

    fn izx_r(&mut self, bus: &mut SysBus<'_>) -> u8 {
        let a = self.izx_a(bus);
        bus.read_cycle(a)
    }

    fn izy_r(&mut self, bus: &mut SysBus<'_>) -> u8 {
        let a = self.izy_a(bus, false);
        bus.read_cycle(a)
    }

    fn rmw(&mut self, bus: &mut SysBus<'_>, addr: u16, f: fn(&mut Cpu, u8) -> u8) {
        let v = bus.read_cycle(addr);
        bus.write_cycle(addr, v);
        let r = f(self, v);
        bus.write_cycle(addr, r);
    }

    /// Dummy read for single-byte instructions.
    fn implied(&mut self, bus: &mut SysBus<'_>) {
        bus.read_cycle(self.pc);
    }

    fn branch(&mut self, bus: &mut SysBus<'_>, taken: bool) {
        let off = self.fetch8(bus) as i8;
        if taken {
            bus.read_cycle(self.pc);
            let old = self.pc;
            self.pc = old.wrapping_add(off as u16);
            if (old & 0xFF00) != (self.pc & 0xFF00) {
                bus.read_cycle((old & 0xFF00) | (self.pc & 0x00FF));
            }
        }
    }

    // ALU.

    fn lda(&mut self, v: u8) {
        self.a = v;
        self.p.set_zn(v);
    }

    fn ldx(&mut self, v: u8) {
        self.x = v;
        self.p.set_zn(v);
    }

    fn ldy(&mut self, v: u8) {
        self.y = v;
        self.p.set_zn(v);
    }

    fn ora(&mut self, v: u8) {
        self.a |= v;
        self.p.set_zn(self.a);
    }

    fn and(&mut self, v: u8) {
        self.a &= v;
        self.p.set_zn(self.a);
    }

    fn eor(&mut self, v: u8) {
        self.a ^= v;
        self.p.set_zn(self.a);
    }

    fn adc(&mut self, v: u8) {
        let carry = u16::from(self.p.contains(Status::CARRY));
        let sum = u16::from(self.a) + u16::from(v) + carry;
        let r = sum as u8;
        self.p.set(Status::CARRY, sum > 0xFF);
        self.p
            .set(Status::OVERFLOW, (self.a ^ r) & (v ^ r) & 0x80 != 0);
        self.a = r;
        self.p.set_zn(r);
    }

    fn sbc(&mut self, v: u8) {
        self.adc(v ^ 0xFF);
    }

    fn compare(&mut self, reg: u8, v: u8) {
        self.p.set(Status::CARRY, reg >= v);
        self.p.set_zn(reg.wrapping_sub(v));
    }

    fn bit(&mut self, v: u8) {
        self.p.set(Status::ZERO, self.a & v == 0);
        self.p.set(Status::NEGATIVE, v & 0x80 != 0);
        self.p.set(Status::OVERFLOW, v & 0x40 != 0);
    }

    fn op_asl(c: &mut Cpu, v: u8) -> u8 {
        c.p.set(Status::CARRY, v & 0x80 != 0);
        let r = v << 1;
        c.p.set_zn(r);
        r
    }

    fn op_lsr(c: &mut Cpu, v: u8) -> u8 {
        c.p.set(Status::CARRY, v & 0x01 != 0);
        let r = v >> 1;
        c.p.set_zn(r);
        r
    }

    fn op_rol(c: &mut Cpu, v: u8) -> u8 {
        let carry_in = u8::from(c.p.contains(Status::CARRY));
        c.p.set(Status::CARRY, v & 0x80 != 0);
        let r = (v << 1) | carry_in;
        c.p.set_zn(r);
        r
    }

    fn op_ror(c: &mut Cpu, v: u8) -> u8 {
        let carry_in = u8::from(c.p.contains(Status::CARRY)) << 7;
        c.p.set(Status::CARRY, v & 0x01 != 0);
        let r = (v >> 1) | carry_in;
        c.p.set_zn(r);
        r
    }

    fn op_inc(c: &mut Cpu, v: u8) -> u8 {
        let r = v.wrapping_add(1);
        c.p.set_zn(r);
        r
    }

    fn op_dec(c: &mut Cpu, v: u8) -> u8 {
        let r = v.wrapping_sub(1);
        c.p.set_zn(r);
        r
    }

    // Unofficial RMW combos.

    fn op_slo(c: &mut Cpu, v: u8) -> u8 {
        let r = Cpu::op_asl(c, v);
        c.ora(r);
        r
    }

    fn op_rla(c: &mut Cpu, v: u8) -> u8 {
        let r = Cpu::op_rol(c, v);
        c.and(r);
        r
    }

    fn op_sre(c: &mut Cpu, v: u8) -> u8 {
        let r = Cpu::op_lsr(c, v);
        c.eor(r);
        r
    }

    fn op_rra(c: &mut Cpu, v: u8) -> u8 {
        let r = Cpu::op_ror(c, v);
        c.adc(r);
        r
    }

    fn op_dcp(c: &mut Cpu, v: u8) -> u8 {
        let r = v.wrapping_sub(1);
        let a = c.a;
        c.compare(a, r);
        r
    }

    fn op_isc(c: &mut Cpu, v: u8) -> u8 {
        let r = v.wrapping_add(1);
        c.sbc(r);
        r
    }

    fn lax(&mut self, v: u8) {
        self.a = v;
        self.x = v;
        self.p.set_zn(v);
    }

    /// SHA/SHX/SHY family: store reg AND (high byte of the base + 1).
    fn sh_store(&mut self, bus: &mut SysBus<'_>, base: u16, index: u8, regs: u8) {
        let eff = base.wrapping_add(u16::from(index));
        bus.read_cycle((base & 0xFF00) | (eff & 0x00FF));
        let v = regs & ((base >> 8) as u8).wrapping_add(1);
        bus.write_cycle(eff, v);
    }

    #[rustfmt::skip]
    fn exec(&mut self, bus: &mut SysBus<'_>, op: u8) {
        match op {
            // Loads.
            0xA9 => { let v = self.imm(bus); self.lda(v) }
            0xA5 => { let v = self.zp_r(bus); self.lda(v) }
            0xB5 => { let v = self.zpx_r(bus); self.lda(v) }
            0xAD => { let v = self.abs_r(bus); self.lda(v) }
            0xBD => { let v = self.absx_r(bus); self.lda(v) }
            0xB9 => { let v = self.absy_r(bus); self.lda(v) }
            0xA1 => { let v = self.izx_r(bus); self.lda(v) }
            0xB1 => { let v = self.izy_r(bus); self.lda(v) }

            0xA2 => { let v = self.imm(bus); self.ldx(v) }
            0xA6 => { let v = self.zp_r(bus); self.ldx(v) }
            0xB6 => { let v = self.zpy_r(bus); self.ldx(v) }
            0xAE => { let v = self.abs_r(bus); self.ldx(v) }
            0xBE => { let v = self.absy_r(bus); self.ldx(v) }

            0xA0 => { let v = self.imm(bus); self.ldy(v) }
            0xA4 => { let v = self.zp_r(bus); self.ldy(v) }
            0xB4 => { let v = self.zpx_r(bus); self.ldy(v) }
            0xAC => { let v = self.abs_r(bus); self.ldy(v) }
            0xBC => { let v = self.absx_r(bus); self.ldy(v) }

            // Stores.
            0x85 => { let a = self.zp_a(bus); bus.write_cycle(a, self.a) }
            0x95 => { let a = self.zpx_a(bus); bus.write_cycle(a, self.a) }
            0x8D => { let a = self.abs_a(bus); bus.write_cycle(a, self.a) }
            0x9D => { let x = self.x; let a = self.abs_indexed(bus, x, true); bus.write_cycle(a, self.a) }
            0x99 => { let y = self.y; let a = self.abs_indexed(bus, y, true); bus.write_cycle(a, self.a) }
            0x81 => { let a = self.izx_a(bus); bus.write_cycle(a, self.a) }
            0x91 => { let a = self.izy_a(bus, true); bus.write_cycle(a, self.a) }

            0x86 => { let a = self.zp_a(bus); bus.write_cycle(a, self.x) }
            0x96 => { let a = self.zpy_a(bus); bus.write_cycle(a, self.x) }
            0x8E => { let a = self.abs_a(bus); bus.write_cycle(a, self.x) }

            0x84 => { let a = self.zp_a(bus); bus.write_cycle(a, self.y) }
            0x94 => { let a = self.zpx_a(bus); bus.write_cycle(a, self.y) }
            0x8C => { let a = self.abs_a(bus); bus.write_cycle(a, self.y) }

            // Transfers.
            0xAA => { self.implied(bus); let v = self.a; self.ldx(v) }
            0xA8 => { self.implied(bus); let v = self.a; self.ldy(v) }
            0xBA => { self.implied(bus); let v = self.s; self.ldx(v) }
            0x8A => { self.implied(bus); let v = self.x; self.lda(v) }
            0x98 => { self.implied(bus); let v = self.y; self.lda(v) }
            0x9A => { self.implied(bus); self.s = self.x }

            // Logic.
            0x09 => { let v = self.imm(bus); self.ora(v) }
            0x05 => { let v = self.zp_r(bus); self.ora(v) }
            0x15 => { let v = self.zpx_r(bus); self.ora(v) }
            0x0D => { let v = self.abs_r(bus); self.ora(v) }
            0x1D => { let v = self.absx_r(bus); self.ora(v) }
            0x19 => { let v = self.absy_r(bus); self.ora(v) }
            0x01 => { let v = self.izx_r(bus); self.ora(v) }
            0x11 => { let v = self.izy_r(bus); self.ora(v) }

            0x29 => { let v = self.imm(bus); self.and(v) }
            0x25 => { let v = self.zp_r(bus); self.and(v) }
            0x35 => { let v = self.zpx_r(bus); self.and(v) }
            0x2D => { let v = self.abs_r(bus); self.and(v) }
            0x3D => { let v = self.absx_r(bus); self.and(v) }
            0x39 => { let v = self.absy_r(bus); self.and(v) }
            0x21 => { let v = self.izx_r(bus); self.and(v) }
            0x31 => { let v = self.izy_r(bus); self.and(v) }

            0x49 => { let v = self.imm(bus); self.eor(v) }
            0x45 => { let v = self.zp_r(bus); self.eor(v) }
            0x55 => { let v = self.zpx_r(bus); self.eor(v) }
            0x4D => { let v = self.abs_r(bus); self.eor(v) }
            0x5D => { let v = self.absx_r(bus); self.eor(v) }
            0x59 => { let v = self.absy_r(bus); self.eor(v) }
            0x41 => { let v = self.izx_r(bus); self.eor(v) }
            0x51 => { let v = self.izy_r(bus); self.eor(v) }

            0x24 => { let v = self.zp_r(bus); self.bit(v) }
            0x2C => { let v = self.abs_r(bus); self.bit(v) }

            // Arithmetic.
            0x69 => { let v = self.imm(bus); self.adc(v) }
            0x65 => { let v = self.zp_r(bus); self.adc(v) }
            0x75 => { let v = self.zpx_r(bus); self.adc(v) }
            0x6D => { let v = self.abs_r(bus); self.adc(v) }
            0x7D => { let v = self.absx_r(bus); self.adc(v) }
            0x79 => { let v = self.absy_r(bus); self.adc(v) }
            0x61 => { let v = self.izx_r(bus); self.adc(v) }
            0x71 => { let v = self.izy_r(bus); self.adc(v) }

            0xE9 | 0xEB => { let v = self.imm(bus); self.sbc(v) }
            0xE5 => { let v = self.zp_r(bus); self.sbc(v) }
            0xF5 => { let v = self.zpx_r(bus); self.sbc(v) }
            0xED => { let v = self.abs_r(bus); self.sbc(v) }
            0xFD => { let v = self.absx_r(bus); self.sbc(v) }
            0xF9 => { let v = self.absy_r(bus); self.sbc(v) }
            0xE1 => { let v = self.izx_r(bus); self.sbc(v) }
            0xF1 => { let v = self.izy_r(bus); self.sbc(v) }

            0xC9 => { let v = self.imm(bus); let a = self.a; self.compare(a, v) }
            0xC5 => { let v = self.zp_r(bus); let a = self.a; self.compare(a, v) }
            0xD5 => { let v = self.zpx_r(bus); let a = self.a; self.compare(a, v) }
            0xCD => { let v = self.abs_r(bus); let a = self.a; self.compare(a, v) }
            0xDD => { let v = self.absx_r(bus); let a = self.a; self.compare(a, v) }
            0xD9 => { let v = self.absy_r(bus); let a = self.a; self.compare(a, v) }
            0xC1 => { let v = self.izx_r(bus); let a = self.a; self.compare(a, v) }
            0xD1 => { let v = self.izy_r(bus); let a = self.a; self.compare(a, v) }

            0xE0 => { let v = self.imm(bus); let x = self.x; self.compare(x, v) }
            0xE4 => { let v = self.zp_r(bus); let x = self.x; self.compare(x, v) }
            0xEC => { let v = self.abs_r(bus); let x = self.x; self.compare(x, v) }

            0xC0 => { let v = self.imm(bus); let y = self.y; self.compare(y, v) }
            0xC4 => { let v = self.zp_r(bus); let y = self.y; self.compare(y, v) }
            0xCC => { let v = self.abs_r(bus); let y = self.y; self.compare(y, v) }

            // Shifts.
            0x0A => { self.implied(bus); let a = self.a; self.a = Cpu::op_asl(self, a) }
            0x06 => { let a = self.zp_a(bus); self.rmw(bus, a, Cpu::op_asl) }
            0x16 => { let a = self.zpx_a(bus); self.rmw(bus, a, Cpu::op_asl) }
            0x0E => { let a = self.abs_a(bus); self.rmw(bus, a, Cpu::op_asl) }
            0x1E => { let x = self.x; let a = self.abs_indexed(bus, x, true); self.rmw(bus, a, Cpu::op_asl) }

            0x4A => { self.implied(bus); let a = self.a; self.a = Cpu::op_lsr(self, a) }
            0x46 => { let a = self.zp_a(bus); self.rmw(bus, a, Cpu::op_lsr) }
            0x56 => { let a = self.zpx_a(bus); self.rmw(bus, a, Cpu::op_lsr) }
            0x4E => { let a = self.abs_a(bus); self.rmw(bus, a, Cpu::op_lsr) }
            0x5E => { let x = self.x; let a = self.abs_indexed(bus, x, true); self.rmw(bus, a, Cpu::op_lsr) }

            0x2A => { self.implied(bus); let a = self.a; self.a = Cpu::op_rol(self, a) }
            0x26 => { let a = self.zp_a(bus); self.rmw(bus, a, Cpu::op_rol) }
            0x36 => { let a = self.zpx_a(bus); self.rmw(bus, a, Cpu::op_rol) }
            0x2E => { let a = self.abs_a(bus); self.rmw(bus, a, Cpu::op_rol) }
            0x3E => { let x = self.x; let a = self.abs_indexed(bus, x, true); self.rmw(bus, a, Cpu::op_rol) }

            0x6A => { self.implied(bus); let a = self.a; self.a = Cpu::op_ror(self, a) }
            0x66 => { let a = self.zp_a(bus); self.rmw(bus, a, Cpu::op_ror) }
            0x76 => { let a = self.zpx_a(bus); self.rmw(bus, a, Cpu::op_ror) }
            0x6E => { let a = self.abs_a(bus); self.rmw(bus, a, Cpu::op_ror) }
            0x7E => { let x = self.x; let a = self.abs_indexed(bus, x, true); self.rmw(bus, a, Cpu::op_ror) }

            // Increments/decrements.
            0xE6 => { let a = self.zp_a(bus); self.rmw(bus, a, Cpu::op_inc) }
            0xF6 => { let a = self.zpx_a(bus); self.rmw(bus, a, Cpu::op_inc) }
            0xEE => { let a = self.abs_a(bus); self.rmw(bus, a, Cpu::op_inc) }
            0xFE => { let x = self.x; let a = self.abs_indexed(bus, x, true); self.rmw(bus, a, Cpu::op_inc) }

            0xC6 => { let a = self.zp_a(bus); self.rmw(bus, a, Cpu::op_dec) }
            0xD6 => { let a = self.zpx_a(bus); self.rmw(bus, a, Cpu::op_dec) }
            0xCE => { let a = self.abs_a(bus); self.rmw(bus, a, Cpu::op_dec) }
            0xDE => { let x = self.x; let a = self.abs_indexed(bus, x, true); self.rmw(bus, a, Cpu::op_dec) }

            0xE8 => { self.implied(bus); self.x = self.x.wrapping_add(1); let x = self.x; self.p.set_zn(x) }
            0xC8 => { self.implied(bus); self.y = self.y.wrapping_add(1); let y = self.y; self.p.set_zn(y) }
            0xCA => { self.implied(bus); self.x = self.x.wrapping_sub(1); let x = self.x; self.p.set_zn(x) }
            0x88 => { self.implied(bus); self.y = self.y.wrapping_sub(1); let y = self.y; self.p.set_zn(y) }

            // Flags.
            0x18 => { self.implied(bus); self.p.remove(Status::CARRY) }
            0x38 => { self.implied(bus); self.p.insert(Status::CARRY) }
            0x58 => { self.implied(bus); self.p.remove(Status::INTERRUPT) }
            0x78 => { self.implied(bus); self.p.insert(Status::INTERRUPT) }
            0xB8 => { self.implied(bus); self.p.remove(Status::OVERFLOW) }
            0xD8 => { self.implied(bus); self.p.remove(Status::DECIMAL) }
            0xF8 => { self.implied(bus); self.p.insert(Status::DECIMAL) }

            // Stack.
            0x48 => { self.implied(bus); let a = self.a; self.push(bus, a) }
            0x08 => { self.implied(bus); let p = (self.p | Status::UNUSED | Status::BREAK).bits(); self.push(bus, p) }
            0x68 => { self.implied(bus); bus.read_cycle(0x0100 + u16::from(self.s)); let v = self.pop(bus); self.lda(v) }
            0x28 => {
                self.implied(bus);
                bus.read_cycle(0x0100 + u16::from(self.s));
                let v = self.pop(bus);
                self.p = (Status::from_bits_retain(v) - Status::BREAK) | Status::UNUSED;
            }

            // Jumps and returns.
            0x4C => { self.pc = self.fetch16(bus) }
            0x6C => {
                let ptr = self.fetch16(bus);
                let lo = bus.read_cycle(ptr);
                // Page-wrap bug: the high byte comes from the same page.
                let hi = bus.read_cycle((ptr & 0xFF00) | (ptr.wrapping_add(1) & 0x00FF));
                self.pc = u16::from_le_bytes([lo, hi]);
            }
            0x20 => {
                let lo = self.fetch8(bus);
                bus.read_cycle(0x0100 + u16::from(self.s));
                let pc = self.pc;
                self.push(bus, (pc >> 8) as u8);
                self.push(bus, pc as u8);
                let hi = self.fetch8(bus);
                self.pc = u16::from_le_bytes([lo, hi]);
            }
            0x60 => {
                self.implied(bus);
                bus.read_cycle(0x0100 + u16::from(self.s));
                let lo = self.pop(bus);
                let hi = self.pop(bus);
                self.pc = u16::from_le_bytes([lo, hi]);
                bus.read_cycle(self.pc);
                self.pc = self.pc.wrapping_add(1);
            }
            0x40 => {
                self.implied(bus);
                bus.read_cycle(0x0100 + u16::from(self.s));
                let p = self.pop(bus);
                self.p = (Status::from_bits_retain(p) - Status::BREAK) | Status::UNUSED;
                let lo = self.pop(bus);
                let hi = self.pop(bus);
                self.pc = u16::from_le_bytes([lo, hi]);
            }
            0x00 => {
                self.fetch8(bus);
                let pc = self.pc;
                self.push(bus, (pc >> 8) as u8);
                self.push(bus, pc as u8);
                self.push(bus, (self.p | Status::UNUSED | Status::BREAK).bits());
                self.p.insert(Status::INTERRUPT);
                // A pending NMI hijacks the BRK vector fetch.
                let vector = if bus.ints.take_nmi() { NMI_VECTOR } else { IRQ_VECTOR };
                let lo = bus.read_cycle(vector);
                let hi = bus.read_cycle(vector + 1);
                self.pc = u16::from_le_bytes([lo, hi]);
            }

            // Branches.
            0x10 => { let t = !self.p.contains(Status::NEGATIVE); self.branch(bus, t) }
            0x30 => { let t = self.p.contains(Status::NEGATIVE); self.branch(bus, t) }
            0x50 => { let t = !self.p.contains(Status::OVERFLOW); self.branch(bus, t) }
            0x70 => { let t = self.p.contains(Status::OVERFLOW); self.branch(bus, t) }
            0x90 => { let t = !self.p.contains(Status::CARRY); self.branch(bus, t) }
            0xB0 => { let t = self.p.contains(Status::CARRY); self.branch(bus, t) }
            0xD0 => { let t = !self.p.contains(Status::ZERO); self.branch(bus, t) }
            0xF0 => { let t = self.p.contains(Status::ZERO); self.branch(bus, t) }

            // NOPs, official and otherwise.
            0xEA | 0x1A | 0x3A | 0x5A | 0x7A | 0xDA | 0xFA => self.implied(bus),
            0x80 | 0x82 | 0x89 | 0xC2 | 0xE2 => { self.imm(bus); }
            0x04 | 0x44 | 0x64 => { self.zp_r(bus); }
            0x14 | 0x34 | 0x54 | 0x74 | 0xD4 | 0xF4 => { self.zpx_r(bus); }
            0x0C => { self.abs_r(bus); }
            0x1C | 0x3C | 0x5C | 0x7C | 0xDC | 0xFC => { self.absx_r(bus); }

            // LAX family.
            0xA7 => { let v = self.zp_r(bus); self.lax(v) }
            0xB7 => { let v = self.zpy_r(bus); self.lax(v) }
            0xAF => { let v = self.abs_r(bus); self.lax(v) }
            0xBF => { let v = self.absy_r(bus); self.lax(v) }
            0xA3 => { let v = self.izx_r(bus); self.lax(v) }
            0xB3 => { let v = self.izy_r(bus); self.lax(v) }
            0xAB => { let v = self.imm(bus); self.lax(v) }

            // SAX.
            0x87 => { let a = self.zp_a(bus); bus.write_cycle(a, self.a & self.x) }
            0x97 => { let a = self.zpy_a(bus); bus.write_cycle(a, self.a & self.x) }
            0x8F => { let a = self.abs_a(bus); bus.write_cycle(a, self.a & self.x) }
            0x83 => { let a = self.izx_a(bus); bus.write_cycle(a, self.a & self.x) }

            // SLO / RLA / SRE / RRA / DCP / ISC.
            0x07 => { let a = self.zp_a(bus); self.rmw(bus, a, Cpu::op_slo) }
            0x17 => { let a = self.zpx_a(bus); self.rmw(bus, a, Cpu::op_slo) }
            0x0F => { let a = self.abs_a(bus); self.rmw(bus, a, Cpu::op_slo) }
            0x1F => { let x = self.x; let a = self.abs_indexed(bus, x, true); self.rmw(bus, a, Cpu::op_slo) }
            0x1B => { let y = self.y; let a = self.abs_indexed(bus, y, true); self.rmw(bus, a, Cpu::op_slo) }
            0x03 => { let a = self.izx_a(bus); self.rmw(bus, a, Cpu::op_slo) }
            0x13 => { let a = self.izy_a(bus, true); self.rmw(bus, a, Cpu::op_slo) }

            0x27 => { let a = self.zp_a(bus); self.rmw(bus, a, Cpu::op_rla) }
            0x37 => { let a = self.zpx_a(bus); self.rmw(bus, a, Cpu::op_rla) }
            0x2F => { let a = self.abs_a(bus); self.rmw(bus, a, Cpu::op_rla) }
            0x3F => { let x = self.x; let a = self.abs_indexed(bus, x, true); self.rmw(bus, a, Cpu::op_rla) }
            0x3B => { let y = self.y; let a = self.abs_indexed(bus, y, true); self.rmw(bus, a, Cpu::op_rla) }
            0x23 => { let a = self.izx_a(bus); self.rmw(bus, a, Cpu::op_rla) }
            0x33 => { let a = self.izy_a(bus, true); self.rmw(bus, a, Cpu::op_rla) }

            0x47 => { let a = self.zp_a(bus); self.rmw(bus, a, Cpu::op_sre) }
            0x57 => { let a = self.zpx_a(bus); self.rmw(bus, a, Cpu::op_sre) }
            0x4F => { let a = self.abs_a(bus); self.rmw(bus, a, Cpu::op_sre) }
            0x5F => { let x = self.x; let a = self.abs_indexed(bus, x, true); self.rmw(bus, a, Cpu::op_sre) }
            0x5B => { let y = self.y; let a = self.abs_indexed(bus, y, true); self.rmw(bus, a, Cpu::op_sre) }
            0x43 => { let a = self.izx_a(bus); self.rmw(bus, a, Cpu::op_sre) }
            0x53 => { let a = self.izy_a(bus, true); self.rmw(bus, a, Cpu::op_sre) }

            0x67 => { let a = self.zp_a(bus); self.rmw(bus, a, Cpu::op_rra) }
            0x77 => { let a = self.zpx_a(bus); self.rmw(bus, a, Cpu::op_rra) }
            0x6F => { let a = self.abs_a(bus); self.rmw(bus, a, Cpu::op_rra) }
            0x7F => { let x = self.x; let a = self.abs_indexed(bus, x, true); self.rmw(bus, a, Cpu::op_rra) }
            0x7B => { let y = self.y; let a = self.abs_indexed(bus, y, true); self.rmw(bus, a, Cpu::op_rra) }
            0x63 => { let a = self.izx_a(bus); self.rmw(bus, a, Cpu::op_rra) }
            0x73 => { let a = self.izy_a(bus, true); self.rmw(bus, a, Cpu::op_rra) }

            0xC7 => { let a = self.zp_a(bus); self.rmw(bus, a, Cpu::op_dcp) }
            0xD7 => { let a = self.zpx_a(bus); self.rmw(bus, a, Cpu::op_dcp) }
            0xCF => { let a = self.abs_a(bus); self.rmw(bus, a, Cpu::op_dcp) }
            0xDF => { let x = self.x; let a = self.abs_indexed(bus, x, true); self.rmw(bus, a, Cpu::op_dcp) }
            0xDB => { let y = self.y; let a = self.abs_indexed(bus, y, true); self.rmw(bus, a, Cpu::op_dcp) }
            0xC3 => { let a = self.izx_a(bus); self.rmw(bus, a, Cpu::op_dcp) }
            0xD3 => { let a = self.izy_a(bus, true); self.rmw(bus, a, Cpu::op_dcp) }

            0xE7 => { let a = self.zp_a(bus); self.rmw(bus, a, Cpu::op_isc) }
            0xF7 => { let a = self.zpx_a(bus); self.rmw(bus, a, Cpu::op_isc) }
            0xEF => { let a = self.abs_a(bus); self.rmw(bus, a, Cpu::op_isc) }
            0xFF => { let x = self.x; let a = self.abs_indexed(bus, x, true); self.rmw(bus, a, Cpu::op_isc) }
            0xFB => { let y = self.y; let a = self.abs_indexed(bus, y, true); self.rmw(bus, a, Cpu::op_isc) }
            0xE3 => { let a = self.izx_a(bus); self.rmw(bus, a, Cpu::op_isc) }
            0xF3 => { let a = self.izy_a(bus, true); self.rmw(bus, a, Cpu::op_isc) }

            // Immediate-mode oddities.
            0x0B | 0x2B => {
                let v = self.imm(bus);
                self.and(v);
                let n = self.p.contains(Status::NEGATIVE);
                self.p.set(Status::CARRY, n);
            }
            0x4B => {
                let v = self.imm(bus);
                self.and(v);
                let a = self.a;
                self.a = Cpu::op_lsr(self, a);
            }
            0x6B => {
                let v = self.imm(bus);
                self.and(v);
                let carry_in = u8::from(self.p.contains(Status::CARRY)) << 7;
                self.a = (self.a >> 1) | carry_in;
                let a = self.a;
                self.p.set_zn(a);
                self.p.set(Status::CARRY, a & 0x40 != 0);
                self.p.set(Status::OVERFLOW, ((a >> 6) ^ (a >> 5)) & 0x01 != 0);
            }
            0x8B => {
                // XAA: only the widely agreed stable portion.
                let v = self.imm(bus);
                self.a = (self.a | 0xEE) & self.x & v;
                let a = self.a;
                self.p.set_zn(a);
            }
            0xCB => {
                let v = self.imm(bus);
                let t = self.a & self.x;
                self.p.set(Status::CARRY, t >= v);
                self.x = t.wrapping_sub(v);
                let x = self.x;
                self.p.set_zn(x);
            }

            // Stores with the address-high AND quirk.
            0x9C => { let base = self.fetch16(bus); let (x, y) = (self.x, self.y); self.sh_store(bus, base, x, y) }
            0x9E => { let base = self.fetch16(bus); let (x, y) = (self.x, self.y); self.sh_store(bus, base, y, x) }
            0x9F => { let base = self.fetch16(bus); let (y, ax) = (self.y, self.a & self.x); self.sh_store(bus, base, y, ax) }
            0x93 => { let base = self.izy_base(bus); let (y, ax) = (self.y, self.a & self.x); self.sh_store(bus, base, y, ax) }
            0x9B => {
                let base = self.fetch16(bus);
                self.s = self.a & self.x;
                let (y, s) = (self.y, self.s);
                self.sh_store(bus, base, y, s);
            }
            0xBB => {
                let v = self.absy_r(bus);
                let r = v & self.s;
                self.a = r;
                self.x = r;
                self.s = r;
                self.p.set_zn(r);
            }

            // JAM opcodes: log once per hit and move on.
            0x02 | 0x12 | 0x22 | 0x32 | 0x42 | 0x52 | 0x62 | 0x72 | 0x92 | 0xB2 | 0xD2 | 0xF2 => {
                core_log!("JAM opcode {op:02x} at {:04x}", self.pc.wrapping_sub(1));
                self.implied(bus);
            }
        }
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

    fn step(nes: &mut Nes) {
        let cart = nes.cart.as_mut().expect("cart");
        let mut bus = SysBus {
            sys: &mut nes.sys,
            ppu: &mut nes.ppu,
            apu: &mut nes.apu,
            cart,
            ctrl: &mut nes.ctrl,
            ints: &mut nes.ints,
        };
        nes.cpu.step(&mut bus);
    }

    /// Places `program` at $0200 and runs one instruction, returning the
    /// machine and the cycles it took.
    fn run_one(program: &[u8], setup: fn(&mut Cpu, &mut [u8])) -> (Nes, u64) {
        let mut nes = machine();
        nes.sys.ram.as_mut_slice()[0x0200..0x0200 + program.len()].copy_from_slice(program);
        nes.cpu.pc = 0x0200;
        setup(&mut nes.cpu, nes.sys.ram.as_mut_slice());

        let before = nes.sys.cycle;
        step(&mut nes);
        let cycles = nes.sys.cycle - before;
        (nes, cycles)
    }

    #[test]
    fn canonical_cycle_counts() {
        let cases: [(&[u8], fn(&mut Cpu, &mut [u8]), u64); 16] = [
            (&[0xA9, 0x10], |_, _| {}, 2),               // LDA #imm
            (&[0xA5, 0x10], |_, _| {}, 3),               // LDA zp
            (&[0xB5, 0x10], |_, _| {}, 4),               // LDA zp,X
            (&[0xAD, 0x00, 0x03], |_, _| {}, 4),         // LDA abs
            (&[0xBD, 0xF0, 0x02], |c, _| c.x = 0x01, 4), // LDA abs,X same page
            (&[0xBD, 0xF0, 0x02], |c, _| c.x = 0x20, 5), // LDA abs,X crossed
            (&[0x9D, 0xF0, 0x02], |c, _| c.x = 0x01, 5), // STA abs,X always fixes
            (&[0xFE, 0xF0, 0x02], |c, _| c.x = 0x01, 7), // INC abs,X
            (&[0xA1, 0x10], |_, _| {}, 6),               // LDA (zp,X)
            (&[0xB1, 0x10], |_, r| r[0x10] = 0x80, 5),   // LDA (zp),Y same page
            (
                &[0xB1, 0x10],
                |c, r| {
                    r[0x10] = 0xFF;
                    c.y = 0x02;
                },
                6,
            ), // LDA (zp),Y crossed
            (&[0x48], |_, _| {}, 3),                     // PHA
            (&[0x68], |_, _| {}, 4),                     // PLA
            (&[0x20, 0x00, 0x03], |_, _| {}, 6),         // JSR
            (&[0x4C, 0x00, 0x03], |_, _| {}, 3),         // JMP abs
            (&[0x00], |_, _| {}, 7),                     // BRK
        ];

        for (i, (program, setup, expected)) in cases.into_iter().enumerate() {
            let (_, cycles) = run_one(program, setup);
            assert_eq!(cycles, expected, "case {i}");
        }
    }

    #[test]
    fn branch_timing() {
        // Not taken: 2 cycles.
        let (_, cycles) = run_one(&[0xD0, 0x10], |c, _| c.p.insert(Status::ZERO));
        assert_eq!(cycles, 2);

        // Taken, same page: 3 cycles.
        let (_, cycles) = run_one(&[0xD0, 0x10], |c, _| c.p.remove(Status::ZERO));
        assert_eq!(cycles, 3);

        // Taken, page crossed (backwards off $02xx): 4 cycles.
        let (nes, cycles) = run_one(&[0xD0, 0x80], |c, _| c.p.remove(Status::ZERO));
        assert_eq!(cycles, 4);
        assert_eq!(nes.cpu.pc, 0x0182);
    }

    #[test]
    fn rmw_writes_the_final_value() {
        let (nes, cycles) = run_one(&[0xE6, 0x10], |_, r| r[0x10] = 0x41);
        assert_eq!(cycles, 5);
        assert_eq!(nes.sys.ram[0x10], 0x42);
    }

    #[test]
    fn adc_flags() {
        let (nes, _) = run_one(&[0x69, 0x01], |c, _| c.a = 0x7F);
        assert_eq!(nes.cpu.a, 0x80);
        assert!(nes.cpu.p.contains(Status::OVERFLOW));
        assert!(nes.cpu.p.contains(Status::NEGATIVE));
        assert!(!nes.cpu.p.contains(Status::CARRY));

        let (nes, _) = run_one(&[0x69, 0x01], |c, _| c.a = 0xFF);
        assert_eq!(nes.cpu.a, 0x00);
        assert!(nes.cpu.p.contains(Status::CARRY));
        assert!(nes.cpu.p.contains(Status::ZERO));
    }

    #[test]
    fn decimal_flag_is_stored_but_ignored() {
        let (nes, _) = run_one(&[0x69, 0x19], |c, _| {
            c.p.insert(Status::DECIMAL);
            c.a = 0x19;
        });
        // Binary sum, not BCD.
        assert_eq!(nes.cpu.a, 0x32);
        assert!(nes.cpu.p.contains(Status::DECIMAL));
    }

    #[test]
    fn sbc_borrows_like_hardware() {
        let (nes, _) = run_one(&[0xE9, 0x01], |c, _| {
            c.a = 0x10;
            c.p.insert(Status::CARRY);
        });
        assert_eq!(nes.cpu.a, 0x0F);
        assert!(nes.cpu.p.contains(Status::CARRY));
    }

    #[test]
    fn jmp_indirect_page_wrap_bug() {
        let (nes, cycles) = run_one(&[0x6C, 0xFF, 0x02], |_, r| {
            r[0x02FF] = 0x34;
            // The high byte comes from $0200, not $0300.
            r[0x0200] = 0x12;
        });
        assert_eq!(cycles, 5);
        assert_eq!(nes.cpu.pc, 0x1234);
    }

    #[test]
    fn unofficial_lax_and_sax() {
        let (nes, cycles) = run_one(&[0xA7, 0x10], |_, r| r[0x10] = 0x5A);
        assert_eq!(cycles, 3);
        assert_eq!(nes.cpu.a, 0x5A);
        assert_eq!(nes.cpu.x, 0x5A);

        let (nes, _) = run_one(&[0x87, 0x10], |c, _| {
            c.a = 0xF0;
            c.x = 0x3C;
        });
        assert_eq!(nes.sys.ram[0x10], 0x30);
    }

    #[test]
    fn unofficial_dcp_combines_dec_and_cmp() {
        let (nes, cycles) = run_one(&[0xC7, 0x10], |c, r| {
            c.a = 0x40;
            r[0x10] = 0x41;
        });
        assert_eq!(cycles, 5);
        assert_eq!(nes.sys.ram[0x10], 0x40);
        assert!(nes.cpu.p.contains(Status::ZERO));
        assert!(nes.cpu.p.contains(Status::CARRY));
    }

    #[test]
    fn unofficial_anc_copies_n_into_c() {
        let (nes, _) = run_one(&[0x0B, 0xFF], |c, _| c.a = 0x80);
        assert_eq!(nes.cpu.a, 0x80);
        assert!(nes.cpu.p.contains(Status::CARRY));
        assert!(nes.cpu.p.contains(Status::NEGATIVE));
    }

    #[test]
    fn unofficial_axs_subtracts_without_borrow() {
        let (nes, _) = run_one(&[0xCB, 0x05], |c, _| {
            c.a = 0x0F;
            c.x = 0x03;
        });
        // X = (A & X) - imm = 3 - 5.
        assert_eq!(nes.cpu.x, 0xFE);
        assert!(!nes.cpu.p.contains(Status::CARRY));
    }

    #[test]
    fn randomized_adc_sbc_match_a_reference_model() {
        use rand::{Rng, SeedableRng};

        let mut rng = rand::rngs::StdRng::seed_from_u64(0x1A53);
        let mut nes = machine();

        for _ in 0..500 {
            let a: u8 = rng.random();
            let operand: u8 = rng.random();
            let carry: bool = rng.random();
            let subtract: bool = rng.random();

            nes.sys.ram.as_mut_slice()[0x0200] = if subtract { 0xE9 } else { 0x69 };
            nes.sys.ram.as_mut_slice()[0x0201] = operand;
            nes.cpu.pc = 0x0200;
            nes.cpu.a = a;
            nes.cpu.p = Status::RESET;
            nes.cpu.p.set(Status::CARRY, carry);

            step(&mut nes);

            // Reference model in plain widened arithmetic.
            let (result, carry_out, signed) = if subtract {
                let borrow = i16::from(!carry);
                let diff = i16::from(a) - i16::from(operand) - borrow;
                let signed = i16::from(a as i8) - i16::from(operand as i8) - borrow;
                (diff as u8, diff >= 0, signed)
            } else {
                let carry_in = i16::from(carry);
                let sum = i16::from(a) + i16::from(operand) + carry_in;
                let signed = i16::from(a as i8) + i16::from(operand as i8) + carry_in;
                (sum as u8, sum > 0xFF, signed)
            };

            assert_eq!(nes.cpu.a, result, "a={a:02x} op={operand:02x} c={carry}");
            assert_eq!(nes.cpu.p.contains(Status::CARRY), carry_out);
            assert_eq!(nes.cpu.p.contains(Status::ZERO), result == 0);
            assert_eq!(nes.cpu.p.contains(Status::NEGATIVE), result & 0x80 != 0);
            assert_eq!(
                nes.cpu.p.contains(Status::OVERFLOW),
                !(-128..=127).contains(&signed),
                "V for a={a:02x} op={operand:02x} c={carry} sub={subtract}"
            );
        }
    }

    #[test]
    fn reset_loads_the_vector_and_stack() {
        let mut rom = crate::cartridge::tests::build_rom(0, 1, 1);
        // 16 KiB NROM mirrors; the vector lives at PRG offset $3FFC.
        rom[16 + 0x3FFC] = 0x00;
        rom[16 + 0x3FFD] = 0x80;

        let mut nes = Nes::new(Config::default());
        nes.load_cart(&rom, None, None).expect("load");

        assert_eq!(nes.cpu.pc, 0x8000);
        assert_eq!(nes.cpu.s, 0xFD);
        assert_eq!(nes.cpu.p.bits(), 0x24);
    }

    #[test]
    fn reset_prologue_takes_eight_cycles() {
        // SEI; CLD; LDX #$FF; TXS.
        let program = [0x78, 0xD8, 0xA2, 0xFF, 0x9A];
        let mut nes = machine();
        nes.sys.ram.as_mut_slice()[0x0200..0x0205].copy_from_slice(&program);
        nes.cpu.pc = 0x0200;

        let before = nes.sys.cycle;
        for _ in 0..4 {
            step(&mut nes);
        }

        assert_eq!(nes.sys.cycle - before, 8);
        assert_eq!(nes.cpu.s, 0xFF);
        assert!(nes.cpu.p.contains(Status::INTERRUPT));
        assert!(!nes.cpu.p.contains(Status::DECIMAL));
        assert!(nes.cpu.p.contains(Status::UNUSED));
    }

    #[test]
    fn nmi_edge_is_serviced_at_the_instruction_boundary() {
        let mut nes = machine();
        nes.sys.ram.as_mut_slice()[0x0200] = 0xEA; // NOP
        nes.cpu.pc = 0x0200;
        nes.ints.set_nmi(true);

        let before = nes.sys.cycle;
        step(&mut nes);

        // Interrupt entry is seven cycles and lands on the NMI vector
        // (which reads as the bank-1 fill byte, $01 $01).
        assert_eq!(nes.sys.cycle - before, 7);
        assert!(nes.cpu.p.contains(Status::INTERRUPT));
        assert_eq!(nes.cpu.pc, 0x0101);
    }

    #[test]
    fn irq_respects_the_interrupt_mask() {
        let mut nes = machine();
        // NOP; NOP; JMP $0200.
        nes.sys.ram.as_mut_slice()[0x0200..0x0205]
            .copy_from_slice(&[0xEA, 0xEA, 0x4C, 0x00, 0x02]);
        nes.cpu.pc = 0x0200;
        nes.cpu.p.insert(Status::INTERRUPT);

        // Run with the frame IRQ armed until the APU asserts it.
        let mut guard = 0;
        while !nes.apu.frame_irq() {
            step(&mut nes);
            guard += 1;
            assert!(guard < 40_000, "frame IRQ never fired");
        }

        // Masked: execution stays in the loop.
        step(&mut nes);
        step(&mut nes);
        assert!((0x0200..=0x0204).contains(&nes.cpu.pc));

        // Unmasked: the next boundary services it through $FFFE.
        nes.cpu.p.remove(Status::INTERRUPT);
        step(&mut nes);
        assert_eq!(nes.cpu.pc, 0x0101);
        assert!(nes.cpu.p.contains(Status::INTERRUPT));
    }
}
