//! Standard instrument library.

use crate::builder::Builder;
use crate::errors::*;
use crate::instrument::InstrumentRegistry;
use crate::param;
use crate::value::MIN;

/// The built-in instruments, in their canonical order.
pub fn standard_instruments() -> Result<InstrumentRegistry> {
    let mut instruments = InstrumentRegistry::new();
    instruments.register("Bass", bass)?;
    instruments.register("Dance Bass", dance_bass)?;
    instruments.register("Soft Lead", soft_lead)?;
    instruments.register("Pluck", pluck)?;
    Ok(instruments)
}

fn bass(b: &mut Builder<'_>) -> Result<()> {
    let p = b.params();
    b.emit("gain", &[("gain", param!(p.gadsr; MIN, 0.7, 0.2, 0.05)?)])?;
    for _ in 0..2 {
        b.emit(
            "lowpass",
            &[
                ("frequency", param!(p.fadsr; 400, 1200, 0.050, 0.5, MIN, 0.05)?),
                ("q", param!(p.dbconst; 4.0)?),
            ],
        )?;
    }
    b.emit("sawtooth", &[("frequency", param!(p.note; 0)?)])
}

fn dance_bass(b: &mut Builder<'_>) -> Result<()> {
    let p = b.params();
    b.emit("gain", &[("gain", param!(p.gadsr; 0.01, 0.5, 0.2, 0.1)?)])?;
    b.emit(
        "lowpass",
        &[
            ("frequency", param!(p.fadsr; 100, 6000, MIN, 0.2, 0.2, 0.2)?),
            ("q", param!(p.dbconst; 0)?),
        ],
    )?;
    b.emit("gain", &[("gain", param!(p.gconst; 0.5)?)])?;
    b.emit("square", &[("frequency", param!(p.note; -12)?)])?;

    // Two detuned saws panned apart, sharing the chain above.
    b.emit("pan", &[("pan", param!(p.panconst; -0.5)?)])?;
    b.emit(
        "sawtooth",
        &[
            ("frequency", param!(p.note; 0)?),
            ("detune", param!(p.random_bipolar; 10.0)?),
        ],
    )?;
    b.pop()?;
    b.emit("pan", &[("pan", param!(p.panconst; 0.5)?)])?;
    b.emit(
        "sawtooth",
        &[
            ("frequency", param!(p.note; 0)?),
            ("detune", param!(p.random_bipolar; 10.0)?),
        ],
    )
}

fn soft_lead(b: &mut Builder<'_>) -> Result<()> {
    let p = b.params();
    b.emit("gain", &[("gain", param!(p.gadsr; 0.050, 0.4, 0.3, 1.7)?)])?;
    for _ in 0..2 {
        b.emit(
            "lowpass",
            &[
                ("frequency", param!(p.fadsr; 600, 6000, 0.17, 0.4, 0.3, 1.0)?),
                ("q", param!(p.dbconst; -6.0)?),
            ],
        )?;
    }
    b.repeat(5, |b| {
        b.emit("pan", &[("pan", param!(p.random_bipolar; 0.5)?)])?;
        b.emit(
            "sawtooth",
            &[
                ("frequency", param!(p.note; 0)?),
                ("detune", param!(p.random_bipolar; 10.0)?),
            ],
        )
    })
}

fn pluck(b: &mut Builder<'_>) -> Result<()> {
    let p = b.params();
    b.emit("gain", &[("gain", param!(p.gadsr; MIN, 0.9, MIN, 0.9)?)])?;
    b.emit(
        "bandpass",
        &[("frequency", param!(p.fadsr; 600, 1800, MIN, 0.3, MIN, 0.3)?)],
    )?;
    b.emit("square", &[("frequency", param!(p.note; 0)?)])
}
