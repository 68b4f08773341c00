//! Non-linear channel mixing and resampling.
//!
//! Channel levels go through the documented NES mixing approximation as
//! precomputed LUTs (pulse pairs, triangle/noise/DMC, and a 5B volume
//! curve), then into the band-limited DAC as per-cycle amplitude deltas.
//! Stereo applies a fixed cross-feed matrix; mono folds everything into
//! both slots.

use nesto_dac::Dac;

use crate::config::{Channels, Config};
use crate::memory::{NTSC_CLOCK, SCANLINES};

/// Instantaneous channel levels for one CPU cycle.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ChannelLevels {
    pub(crate) pulse0: u8,
    pub(crate) pulse1: u8,
    /// MMC5 expansion pulses.
    pub(crate) mmc5_pulse0: u8,
    pub(crate) mmc5_pulse1: u8,
    pub(crate) vrc6_pulse0: u8,
    pub(crate) vrc6_pulse1: u8,
    pub(crate) ss5b0: u8,
    pub(crate) ss5b1: u8,
    pub(crate) ss5b2: u8,
    pub(crate) saw: u8,
    pub(crate) triangle: u8,
    pub(crate) noise: u8,
    pub(crate) dmc: u8,
}

#[derive(Debug, Clone)]
pub(crate) struct Mixer {
    channels: Channels,
    stereo: bool,
    pulse_lut: [i16; 32],
    tnd_lut: [i16; 203],
    ss5b_lut: [i16; 32],
    dac: Dac,
}

fn clamp_pcm(pcm: f64) -> i16 {
    (pcm * 32768.0)
        .round()
        .clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16
}

impl Mixer {
    pub(crate) fn new(cfg: &Config) -> Self {
        let mut pulse_lut = [0i16; 32];
        for (x, slot) in pulse_lut.iter_mut().enumerate().skip(1) {
            *slot = clamp_pcm(95.52 / (8128.0 / x as f64 + 100.0));
        }

        let mut tnd_lut = [0i16; 203];
        for (x, slot) in tnd_lut.iter_mut().enumerate().skip(1) {
            *slot = clamp_pcm(163.67 / (24329.0 / x as f64 + 100.0));
        }

        let mut ss5b_lut = [0i16; 32];
        for (x, slot) in ss5b_lut.iter_mut().enumerate().skip(1) {
            *slot = clamp_pcm(1.0 / 1.6f64.powf(0.5 * (31 - x) as f64));
        }

        Self {
            channels: cfg.channels,
            stereo: cfg.stereo,
            pulse_lut,
            tnd_lut,
            ss5b_lut,
            dac: Dac::new(cfg.sample_rate, effective_clock(cfg), cfg.stereo),
        }
    }

    pub(crate) fn set_config(&mut self, cfg: &Config) {
        self.channels = cfg.channels;
        self.stereo = cfg.stereo;
        self.dac = Dac::new(cfg.sample_rate, effective_clock(cfg), cfg.stereo);
    }

    /// Host clock-drift hint: rebias the resampling factor when the measured
    /// clock is plausibly ours.
    pub(crate) fn clock_drift(&mut self, cfg: &Config, measured: u32, over: bool) {
        let expected = effective_clock(cfg);
        let oc = i64::from(overclock_shift(cfg)) + 1;

        if (i64::from(measured) - i64::from(expected)).abs() < 5000 * oc {
            let bias = if over { 1000 * oc } else { -1000 * oc };
            self.dac
                .set_clock((i64::from(measured) + bias).max(1) as u32);
        }
    }

    pub(crate) fn mix(&mut self, mut lv: ChannelLevels) {
        let ch = self.channels;
        if !ch.contains(Channels::PULSE_0) {
            lv.pulse0 = 0;
        }
        if !ch.contains(Channels::PULSE_1) {
            lv.pulse1 = 0;
        }
        if !ch.contains(Channels::TRIANGLE) {
            lv.triangle = 0;
        }
        if !ch.contains(Channels::NOISE) {
            lv.noise = 0;
        }
        if !ch.contains(Channels::DMC) {
            lv.dmc = 0;
        }
        if !ch.contains(Channels::EXT_0) {
            lv.mmc5_pulse0 = 0;
            lv.vrc6_pulse0 = 0;
            lv.ss5b0 = 0;
        }
        if !ch.contains(Channels::EXT_1) {
            lv.mmc5_pulse1 = 0;
            lv.vrc6_pulse1 = 0;
            lv.ss5b1 = 0;
        }
        if !ch.contains(Channels::EXT_2) {
            lv.saw = 0;
            lv.ss5b2 = 0;
        }

        let p = |x: u8| i32::from(self.pulse_lut[usize::from(x).min(31)]);
        let tnd = |x: usize| i32::from(self.tnd_lut[x.min(202)]);
        let c = |x: u8| i32::from(self.ss5b_lut[usize::from(x).min(31)]);
        let pcm = |v: i32| v.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;

        if self.stereo {
            let l = tnd(3 * usize::from(lv.triangle) + 2 * usize::from(lv.noise))
                + p(lv.pulse0)
                - p(lv.mmc5_pulse0)
                - p(lv.vrc6_pulse0)
                + c(lv.ss5b0)
                - p(lv.saw)
                - c(lv.ss5b2);
            let r = tnd(usize::from(lv.dmc)) + p(lv.pulse1)
                - p(lv.mmc5_pulse1)
                - p(lv.vrc6_pulse1)
                - c(lv.ss5b1);

            self.dac.push(pcm(l), pcm(r));
        } else {
            let m = tnd(3 * usize::from(lv.triangle)
                + 2 * usize::from(lv.noise)
                + usize::from(lv.dmc))
                + p(lv.pulse0.saturating_add(lv.pulse1))
                - p(lv.mmc5_pulse0)
                - p(lv.vrc6_pulse0)
                - c(lv.ss5b0)
                - p(lv.saw)
                - c(lv.ss5b2)
                - p(lv.mmc5_pulse1)
                - p(lv.vrc6_pulse1)
                - c(lv.ss5b1);

            self.dac.push(pcm(m), 0);
        }
    }

    /// Drains the resampled output accumulated since the last call.
    pub(crate) fn frames(&mut self) -> &[i16] {
        self.dac.drain()
    }
}

impl Default for Mixer {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

/// CPU clock adjusted for pre/post-NMI frame stretching.
pub(crate) fn effective_clock(cfg: &Config) -> u32 {
    NTSC_CLOCK + u32::from(cfg.pre_nmi + cfg.post_nmi) * (NTSC_CLOCK / SCANLINES)
}

/// Timer shift compensating for whole-frame overclock multiples.
pub(crate) fn overclock_shift(cfg: &Config) -> u8 {
    (u32::from(cfg.pre_nmi + cfg.post_nmi) / SCANLINES) as u8
}
