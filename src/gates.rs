use std::f64::consts::{FRAC_1_SQRT_2, FRAC_PI_2, FRAC_PI_4};

use nalgebra::DMatrix;
use num_complex::Complex;

use crate::Qbit;

/// A single-qubit Hamiltonian as a weighted Pauli sum `i·I + x·X + y·Y + z·Z`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PauliSum {
    pub i: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// The closed set of operators the engine applies.
///
/// Every variant except [`Gate::Unitary`] is unitary by construction and is
/// therefore not re-checked on application. `Unitary` is the open entry point
/// for caller-supplied matrices (e.g. diagonal ±1 oracle gates) and is
/// verified against the engine's unitarity tolerance.
#[derive(Clone, Debug)]
pub enum Gate {
    H,
    X,
    Y,
    Z,
    S,
    T,
    Rx(f64),
    Ry(f64),
    Rz(f64),
    /// diag(1, e^{iθ}); `S` and `T` are the θ = π/2 and π/4 special cases.
    Phase(f64),
    /// Time evolution exp(-i·H·t) of a weighted single-qubit Pauli sum,
    /// exponentiated analytically. Negative `time` runs the evolution
    /// backwards, i.e. exp(+i·H·|t|).
    Evolution { hamiltonian: PauliSum, time: f64 },
    /// Caller-supplied 2^k x 2^k matrix over k target qubits. Target 0 is the
    /// most significant bit of the matrix index.
    Unitary(DMatrix<Qbit>),
}

impl Gate {
    /// Dense matrix realization of the gate.
    pub fn matrix(&self) -> DMatrix<Qbit> {
        let one = Complex::new(1.0, 0.0);
        let i = Complex::new(0.0, 1.0);
        match self {
            Gate::H => {
                let h = Complex::new(FRAC_1_SQRT_2, 0.0);
                DMatrix::from_row_slice(2, 2, &[h, h, h, -h])
            }
            Gate::X => DMatrix::from_row_slice(2, 2, &[Complex::ZERO, one, one, Complex::ZERO]),
            Gate::Y => DMatrix::from_row_slice(2, 2, &[Complex::ZERO, -i, i, Complex::ZERO]),
            Gate::Z => DMatrix::from_row_slice(2, 2, &[one, Complex::ZERO, Complex::ZERO, -one]),
            Gate::S => Gate::Phase(FRAC_PI_2).matrix(),
            Gate::T => Gate::Phase(FRAC_PI_4).matrix(),
            Gate::Rx(angle) => {
                let (sin, cos) = (angle / 2.0).sin_cos();
                let c = Complex::new(cos, 0.0);
                let s = Complex::new(0.0, -sin);
                DMatrix::from_row_slice(2, 2, &[c, s, s, c])
            }
            Gate::Ry(angle) => {
                let (sin, cos) = (angle / 2.0).sin_cos();
                let c = Complex::new(cos, 0.0);
                let s = Complex::new(sin, 0.0);
                DMatrix::from_row_slice(2, 2, &[c, -s, s, c])
            }
            Gate::Rz(angle) => DMatrix::from_row_slice(
                2,
                2,
                &[
                    Complex::from_polar(1.0, -angle / 2.0),
                    Complex::ZERO,
                    Complex::ZERO,
                    Complex::from_polar(1.0, angle / 2.0),
                ],
            ),
            Gate::Phase(angle) => DMatrix::from_row_slice(
                2,
                2,
                &[
                    one,
                    Complex::ZERO,
                    Complex::ZERO,
                    Complex::from_polar(1.0, *angle),
                ],
            ),
            Gate::Evolution { hamiltonian, time } => evolution_matrix(hamiltonian, *time),
            Gate::Unitary(matrix) => matrix.clone(),
        }
    }

    /// The conjugate-transpose gate, U†.
    pub fn dagger(&self) -> Gate {
        match self {
            Gate::H | Gate::X | Gate::Y | Gate::Z => self.clone(),
            Gate::S => Gate::Phase(-FRAC_PI_2),
            Gate::T => Gate::Phase(-FRAC_PI_4),
            Gate::Rx(angle) => Gate::Rx(-angle),
            Gate::Ry(angle) => Gate::Ry(-angle),
            Gate::Rz(angle) => Gate::Rz(-angle),
            Gate::Phase(angle) => Gate::Phase(-angle),
            Gate::Evolution { hamiltonian, time } => Gate::Evolution {
                hamiltonian: *hamiltonian,
                time: -time,
            },
            Gate::Unitary(matrix) => Gate::Unitary(matrix.adjoint()),
        }
    }
}

/// exp(-i·t·(aI + bX + cY + dZ)), computed in closed form:
/// e^{-iat}·(cos(ωt)·I − i·sin(ωt)·(bX + cY + dZ)/ω) with ω = √(b²+c²+d²).
fn evolution_matrix(h: &PauliSum, time: f64) -> DMatrix<Qbit> {
    let phase = Complex::from_polar(1.0, -h.i * time);
    let omega = (h.x * h.x + h.y * h.y + h.z * h.z).sqrt();
    if omega < f64::EPSILON {
        return DMatrix::from_diagonal_element(2, 2, phase);
    }

    let (sin, cos) = (omega * time).sin_cos();
    let c = Complex::new(cos, 0.0);
    let s = Complex::new(0.0, -sin / omega);
    let m = DMatrix::from_row_slice(
        2,
        2,
        &[
            c + s * h.z,
            s * Complex::new(h.x, -h.y),
            s * Complex::new(h.x, h.y),
            c - s * h.z,
        ],
    );
    m * phase
}

/// Max entry-wise deviation of U†U from the identity.
pub(crate) fn unitarity_deviation(matrix: &DMatrix<Qbit>) -> f64 {
    let product = matrix.adjoint() * matrix;
    let n = product.nrows();
    let mut deviation = 0.0_f64;
    for row in 0..n {
        for col in 0..n {
            let expected = if row == col {
                Complex::new(1.0, 0.0)
            } else {
                Complex::ZERO
            };
            deviation = deviation.max((product[(row, col)] - expected).norm());
        }
    }
    deviation
}
