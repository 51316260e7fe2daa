//! Register-level transforms: uniform superposition and the discrete Fourier
//! transform used for phase estimation.
//!
//! Both are built entirely from [`Engine::apply`] calls, so they record into
//! an open compute scope and invert cleanly under uncompute. Register element
//! 0 is read as the most significant bit of the transform index.

use std::f64::consts::PI;

use crate::engine::{Engine, Qubit, Register};
use crate::error::Result;
use crate::gates::Gate;

/// Hadamard on every qubit of the register: k fresh qubits end with equal
/// magnitude 1/√(2^k) on each of their basis states.
pub fn uniform_superpose(engine: &mut Engine, register: &Register) -> Result<()> {
    for qubit in register.iter() {
        engine.apply(&Gate::H, &[qubit], &[])?;
    }
    Ok(())
}

/// Quantum Fourier transform |x⟩ → N^{-1/2} Σ_y e^{2πi·xy/N} |y⟩ over the
/// register, N = 2^len: the Hadamard/controlled-phase ladder followed by the
/// bit-order-reversing swaps.
pub fn frequency_transform(engine: &mut Engine, register: &Register) -> Result<()> {
    let k = register.len();
    for j in 0..k {
        engine.apply(&Gate::H, &[&register[j]], &[])?;
        for m in (j + 1)..k {
            let angle = PI / (1_usize << (m - j)) as f64;
            engine.apply(&Gate::Phase(angle), &[&register[j]], &[&register[m]])?;
        }
    }
    for i in 0..k / 2 {
        swap(engine, &register[i], &register[k - 1 - i])?;
    }
    Ok(())
}

/// Exact adjoint of [`frequency_transform`]: swaps first, then the ladder in
/// reverse with negated angles. Concentrates a periodic phase pattern onto
/// the basis index encoding its frequency.
pub fn inverse_frequency_transform(engine: &mut Engine, register: &Register) -> Result<()> {
    let k = register.len();
    for i in 0..k / 2 {
        swap(engine, &register[i], &register[k - 1 - i])?;
    }
    for j in (0..k).rev() {
        for m in ((j + 1)..k).rev() {
            let angle = -PI / (1_usize << (m - j)) as f64;
            engine.apply(&Gate::Phase(angle), &[&register[j]], &[&register[m]])?;
        }
        engine.apply(&Gate::H, &[&register[j]], &[])?;
    }
    Ok(())
}

/// Exchanges two qubits via three controlled-X gates.
pub fn swap(engine: &mut Engine, a: &Qubit, b: &Qubit) -> Result<()> {
    engine.apply(&Gate::X, &[b], &[a])?;
    engine.apply(&Gate::X, &[a], &[b])?;
    engine.apply(&Gate::X, &[b], &[a])
}
