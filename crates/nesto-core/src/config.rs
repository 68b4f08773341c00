//! Host-facing emulator configuration.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Built-in 64-color master palettes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Palette {
    #[default]
    Smooth,
    Classic,
    Composite,
    PvmD93,
    Pc10,
    SonyCxa,
    Wavebeam,
}

bitflags! {
    /// Mask of APU channels contributing to the mix.
    ///
    /// The three EXT bits route expansion audio: MMC5's extra pulses come in
    /// on EXT0/EXT1, VRC6's pulses on EXT0/EXT1 with the saw on EXT2, and the
    /// Sunsoft 5B's three tone channels on EXT0..EXT2.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Channels: u8 {
        const PULSE_0  = 0x01;
        const PULSE_1  = 0x02;
        const EXT_0    = 0x04;
        const EXT_1    = 0x08;
        const EXT_2    = 0x10;
        const TRIANGLE = 0x20;
        const NOISE    = 0x40;
        const DMC      = 0x80;
        const ALL      = 0xFF;
    }
}

impl Serialize for Channels {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.bits())
    }
}

impl<'de> Deserialize<'de> for Channels {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        u8::deserialize(deserializer).map(Channels::from_bits_retain)
    }
}

/// Emulator configuration. [`Config::default`] matches the stock NTSC
/// console with all channels audible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Master palette used to derive the eight emphasis LUTs.
    pub palette: Palette,
    /// Host audio sample rate in Hz.
    pub sample_rate: u32,
    /// Channels contributing to the mix.
    pub channels: Channels,
    /// Extra scanlines inserted before vblank (overclocking hack).
    pub pre_nmi: u16,
    /// Extra scanlines inserted after the pre-render line (overclocking hack).
    pub post_nmi: u16,
    /// Per-scanline sprite cap, 8..=64. Values above 8 reduce flicker by
    /// borrowing background-prefetch dots for extra sprite fetches.
    pub max_sprites: u8,
    /// Stereo output. Mono still emits interleaved pairs with both slots equal.
    pub stereo: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            palette: Palette::Smooth,
            sample_rate: 44_100,
            channels: Channels::ALL,
            pre_nmi: 0,
            post_nmi: 0,
            max_sprites: 8,
            stereo: true,
        }
    }
}

impl Config {
    /// Sprite cap clamped to the supported range.
    pub(crate) fn sprite_cap(&self) -> u8 {
        self.max_sprites.clamp(8, 64)
    }
}
