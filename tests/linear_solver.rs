//! HHL-style solver for A·x = b with A = 1.5·I + 0.5·X and b = |0⟩.
//!
//! Phase estimation over a 2-qubit clock encodes A's eigenvalues {1, 2};
//! reversing the clock bit order maps the value to 2/λ, so a rotation linear
//! in the clock value writes amplitudes ∝ 1/λ onto the ancilla. Postselecting
//! the ancilla on 1 leaves the solution direction on the b register.

use std::f64::consts::{PI, TAU};

use anyhow::Result;
use nalgebra::{Matrix2, Vector2};
use qsim_engine::{
    inverse_frequency_transform, swap, uniform_superpose, Engine, EngineConfig, Gate, Observable,
    Pauli, PauliSum, Register, RetryController, SimError,
};

const T0: f64 = TAU;
const TIME_STEPS: f64 = 4.0;
const ROTATION_R: i32 = 4;

const HAMILTONIAN: PauliSum = PauliSum {
    i: 1.5,
    x: 0.5,
    y: 0.0,
    z: 0.0,
};

/// One full allocation/preparation/transform/measurement attempt. Returns the
/// registers on ancilla success, `None` to discard and retry.
fn solve_attempt(engine: &mut Engine) -> qsim_engine::Result<Option<(Register, Register, Register)>> {
    let b = engine.allocate(1)?;
    let clock = engine.allocate(2)?;
    let ancilla = engine.allocate(1)?;

    let scope = engine.begin_scope()?;
    uniform_superpose(engine, &clock)?;
    // Clock qubit j (MSB-first) conditions exp(i·H·t0·2^(len-1-j)/T).
    for (j, qubit) in clock.iter().enumerate() {
        let steps = 1_usize << (clock.len() - 1 - j);
        let time = -T0 * steps as f64 / TIME_STEPS;
        engine.apply(
            &Gate::Evolution {
                hamiltonian: HAMILTONIAN,
                time,
            },
            &[&b[0]],
            &[qubit],
        )?;
    }
    inverse_frequency_transform(engine, &clock)?;
    // λ ∈ {1, 2} sits in the clock; bit reversal turns it into 2/λ.
    swap(engine, &clock[0], &clock[1])?;
    engine.end_scope(scope)?;

    // Rotation linear in the clock value: bit j contributes 2^(len-1-j)
    // times the base angle π/2^(r-1).
    for (j, qubit) in clock.iter().enumerate() {
        let weight = (1_usize << (clock.len() - 1 - j)) as f64;
        let angle = weight * PI / 2.0_f64.powi(ROTATION_R - 1);
        engine.apply(&Gate::Ry(angle), &[&ancilla[0]], &[qubit])?;
    }

    engine.uncompute_scope(scope)?;

    let outcome = engine.measure(&[&ancilla[0]])?[0];
    Ok(outcome.then_some((b, clock, ancilla)))
}

/// Classical cross-check: normalized A⁻¹·b as Pauli expectation values.
fn classical_expectations() -> (f64, f64, f64) {
    let a = Matrix2::new(1.5, 0.5, 0.5, 1.5);
    let inverse = a.try_inverse().expect("A is invertible");
    let x = inverse * Vector2::new(1.0, 0.0);
    let x = x.normalize();
    (2.0 * x[0] * x[1], 0.0, x[0] * x[0] - x[1] * x[1])
}

#[test]
fn postselected_state_matches_classical_solution() -> Result<()> {
    let config = EngineConfig {
        seed: Some(5),
        ..Default::default()
    };
    let mut controller = RetryController::new(Some(2000));
    let (engine, (b, clock, ancilla)) = controller.run_until_success(&config, solve_attempt)?;
    assert!(controller.attempts() >= 1);

    // The helper clock came back to |00> and the ancilla collapsed to 1.
    assert!(engine.qubit_probability(&clock[0])? < 1e-9);
    assert!(engine.qubit_probability(&clock[1])? < 1e-9);
    assert_eq!(engine.classical_value(&ancilla[0])?, Some(true));

    let expect = |pauli: Pauli| -> qsim_engine::Result<f64> {
        let mut observable = Observable::new();
        observable.add_term(1.0, &[(pauli, &b[0])]);
        observable.expectation_value(&engine)
    };

    let (ex, ey, ez) = classical_expectations();
    assert!((expect(Pauli::X)? - ex).abs() < 0.02);
    assert!((expect(Pauli::Y)? - ey).abs() < 0.02);
    assert!((expect(Pauli::Z)? - ez).abs() < 0.02);
    Ok(())
}

#[test]
fn phase_estimation_lands_on_the_eigenvalues() -> Result<()> {
    // Run the compute block alone on the X=+1 eigenvector (λ = 2) and check
    // the clock reads the eigenvalue exactly.
    let mut engine = Engine::new(EngineConfig {
        seed: Some(6),
        ..Default::default()
    });
    let b = engine.allocate(1)?;
    let clock = engine.allocate(2)?;
    engine.apply(&Gate::H, &[&b[0]], &[])?;

    uniform_superpose(&mut engine, &clock)?;
    for (j, qubit) in clock.iter().enumerate() {
        let steps = 1_usize << (clock.len() - 1 - j);
        engine.apply(
            &Gate::Evolution {
                hamiltonian: HAMILTONIAN,
                time: -T0 * steps as f64 / TIME_STEPS,
            },
            &[&b[0]],
            &[qubit],
        )?;
    }
    inverse_frequency_transform(&mut engine, &clock)?;

    // λ = 2 is clock |10>: clock[0] (MSB) set, clock[1] clear.
    assert!((engine.qubit_probability(&clock[0])? - 1.0).abs() < 1e-9);
    assert!(engine.qubit_probability(&clock[1])? < 1e-9);
    Ok(())
}

#[test]
fn zero_attempt_budget_fails_without_touching_qubits() {
    let mut controller = RetryController::new(Some(0));
    let result = controller.run_until_success(&EngineConfig::default(), solve_attempt);
    assert!(matches!(result, Err(SimError::RetryExhausted { attempts: 0 })));
}
