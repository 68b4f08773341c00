//! Save-state properties through the public API.

mod common;

use anyhow::Result;
use common::{RomBuilder, boot, run_frames};
use nesto_core::{Config, Error, Nes};

fn counting_rom() -> Vec<u8> {
    // Main loop continuously increments $6000; NMI increments $6001.
    RomBuilder::new()
        .code(
            0x8000,
            &[
                0xA9, 0x80, // LDA #$80
                0x8D, 0x00, 0x20, // STA $2000
                // loop:
                0xEE, 0x00, 0x60, // INC $6000
                0x4C, 0x05, 0x80, // JMP loop
            ],
        )
        .code(0x9000, &[0xEE, 0x01, 0x60, 0x40]) // INC $6001; RTI
        .reset_vector(0x8000)
        .nmi_vector(0x9000)
        .build()
}

fn machine() -> Result<Nes> {
    boot(&counting_rom())
}

#[test]
fn get_state_is_a_pure_function_of_machine_state() -> Result<()> {
    let mut a = machine()?;
    let mut b = machine()?;

    run_frames(&mut a, 3);
    run_frames(&mut b, 3);

    assert_eq!(a.get_state(), b.get_state());
    Ok(())
}

#[test]
fn state_round_trip_resumes_identically() -> Result<()> {
    let mut a = machine()?;
    run_frames(&mut a, 2);

    let blob = a.get_state().expect("state");

    // Let `a` run ahead, then drag it back.
    run_frames(&mut a, 3);
    a.set_state(&blob)?;

    // A fresh machine restored from the same blob stays in lockstep.
    let mut b = machine()?;
    b.set_state(&blob)?;

    for _ in 0..3 {
        run_frames(&mut a, 1);
        run_frames(&mut b, 1);
        assert_eq!(a.get_state(), b.get_state());
    }
    Ok(())
}

#[test]
fn restore_failure_preserves_the_running_state() -> Result<()> {
    let mut nes = machine()?;
    run_frames(&mut nes, 1);

    let before = nes.get_state().expect("state");
    assert!(matches!(
        nes.set_state(&[0xDE, 0xAD]),
        Err(Error::BadState)
    ));
    assert_eq!(nes.get_state().expect("state"), before);

    // Still runs.
    assert!(nes.next_frame(|_| {}, |_, _| {}) > 0);
    Ok(())
}

#[test]
fn set_state_requires_a_cartridge() -> Result<()> {
    let mut empty = Nes::new(Config::default());
    let blob = machine()?.get_state().expect("state");
    assert!(matches!(empty.set_state(&blob), Err(Error::NoCart)));
    Ok(())
}

#[test]
fn state_survives_cart_ram_contents() -> Result<()> {
    let mut a = machine()?;
    run_frames(&mut a, 2);
    let blob = a.get_state().expect("state");

    let mut counter = [0u8; 2];
    a.get_sram(&mut counter);

    // Restoring into a machine that ran further rewinds its work RAM.
    run_frames(&mut a, 4);
    a.set_state(&blob)?;

    let mut after = [0u8; 2];
    a.get_sram(&mut after);
    assert_eq!(counter, after);
    Ok(())
}
