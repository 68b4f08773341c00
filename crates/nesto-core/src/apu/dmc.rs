//! Delta modulation channel.
//!
//! Bit-serial output stepping a 7-bit level by ±2, fed from a one-byte
//! sample buffer that the DMC DMA engine refills. This module only raises
//! the fetch request; the bus decides when to stall the CPU and performs
//! the actual read (see the DMA section of the system bus).

use serde::{Deserialize, Serialize};

use super::Timer;

pub(crate) const DMC_TABLE: [u16; 16] = [
    214, 190, 170, 160, 143, 127, 113, 107, 95, 80, 71, 64, 53, 42, 36, 27,
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
struct OutputUnit {
    shift_register: u8,
    bits_remaining: u8,
    silence: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Dmc {
    pub(crate) enabled: bool,
    pub(crate) output: u8,
    pub(crate) timer: Timer,
    out: OutputUnit,
    pub(crate) sample_buffer_empty: bool,
    sample_buffer: u8,
    pub(crate) sample_address: u16,
    pub(crate) sample_length: u16,
    pub(crate) current_address: u16,
    pub(crate) current_length: u16,
    pub(crate) loop_flag: bool,
    pub(crate) irq_enable: bool,
    pub(crate) irq_flag: bool,
}

impl Dmc {
    pub(crate) fn restart(&mut self) {
        self.current_address = self.sample_address;
        self.current_length = self.sample_length;
    }

    /// Requests a DMA fetch when the buffer is empty and bytes remain. The
    /// address/length bookkeeping happens at request time; the fetched byte
    /// arrives later through [`Dmc::dma_finish`].
    pub(crate) fn fill_sample_buffer(&mut self, dma_request: &mut Option<u16>) {
        if self.sample_buffer_empty && self.current_length > 0 {
            *dma_request = Some(self.current_address);

            self.current_address = if self.current_address == 0xFFFF {
                0x8000
            } else {
                self.current_address + 1
            };
            self.current_length -= 1;

            if self.current_length == 0 {
                if self.loop_flag {
                    self.restart();
                } else if self.irq_enable {
                    self.irq_flag = true;
                }
            }

            self.sample_buffer_empty = false;
        }
    }

    pub(crate) fn dma_finish(&mut self, v: u8) {
        self.sample_buffer = v;
    }

    /// Timer clock (every other CPU cycle).
    pub(crate) fn step_timer(&mut self, dma_request: &mut Option<u16>, oc_shift: u8) {
        if self.timer.value > 0 {
            self.timer.value -= 1;
        }

        if self.timer.value == 0 {
            self.timer.value = self.timer.period.wrapping_shl(u32::from(oc_shift));

            if !self.out.silence {
                if self.out.shift_register & 0x01 != 0 && self.output <= 125 {
                    self.output += 2;
                } else if self.out.shift_register & 0x01 == 0 && self.output >= 2 {
                    self.output -= 2;
                }
            }

            self.out.shift_register >>= 1;

            if self.out.bits_remaining == 0 {
                self.out.bits_remaining = 8;

                if self.sample_buffer_empty {
                    self.out.silence = true;
                } else {
                    self.out.silence = false;
                    self.out.shift_register = self.sample_buffer;
                    self.sample_buffer_empty = true;
                    self.fill_sample_buffer(dma_request);
                }
            }

            self.out.bits_remaining -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_wraps_to_8000_and_length_counts_down() {
        let mut d = Dmc {
            sample_buffer_empty: true,
            current_address: 0xFFFF,
            current_length: 2,
            ..Dmc::default()
        };

        let mut req = None;
        d.fill_sample_buffer(&mut req);
        assert_eq!(req, Some(0xFFFF));
        assert_eq!(d.current_address, 0x8000);
        assert_eq!(d.current_length, 1);
    }

    #[test]
    fn end_of_sample_loops_or_raises_irq() {
        let mut d = Dmc {
            sample_buffer_empty: true,
            sample_address: 0xC000,
            sample_length: 10,
            current_address: 0xC009,
            current_length: 1,
            loop_flag: true,
            ..Dmc::default()
        };

        let mut req = None;
        d.fill_sample_buffer(&mut req);
        assert_eq!(d.current_address, 0xC000);
        assert_eq!(d.current_length, 10);
        assert!(!d.irq_flag);

        let mut d = Dmc {
            sample_buffer_empty: true,
            current_address: 0xC000,
            current_length: 1,
            irq_enable: true,
            ..Dmc::default()
        };
        let mut req = None;
        d.fill_sample_buffer(&mut req);
        assert!(d.irq_flag);
    }

    #[test]
    fn level_is_clamped_to_seven_bits() {
        let mut d = Dmc {
            output: 126,
            ..Dmc::default()
        };
        d.out.shift_register = 0xFF;
        d.out.silence = false;
        d.out.bits_remaining = 7;
        d.timer.period = 0;

        for _ in 0..4 {
            let mut req = None;
            d.step_timer(&mut req, 0);
        }
        assert_eq!(d.output, 126);
    }
}
