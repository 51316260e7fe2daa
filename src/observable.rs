//! Pauli-sum observables, an inspection surface for verification and tests:
//! algorithmic logic goes through gates and measurement, never through this.

use nalgebra_sparse::{coo::CooMatrix, csr::CsrMatrix};
use num_complex::Complex;

use crate::engine::{Engine, Qubit};
use crate::error::Result;
use crate::Qbit;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pauli {
    I,
    X,
    Y,
    Z,
}

struct PauliTerm {
    coefficient: f64,
    /// (operator, qubit id) factors; unnamed qubits act as identity.
    factors: Vec<(Pauli, usize)>,
}

/// A weighted sum of Pauli products over named qubits.
#[derive(Default)]
pub struct Observable {
    terms: Vec<PauliTerm>,
}

impl Observable {
    pub fn new() -> Self {
        Self { terms: Vec::new() }
    }

    pub fn add_term(&mut self, coefficient: f64, factors: &[(Pauli, &Qubit)]) {
        self.terms.push(PauliTerm {
            coefficient,
            factors: factors
                .iter()
                .map(|&(pauli, qubit)| (pauli, qubit.id()))
                .collect(),
        });
    }

    /// ⟨ψ|O|ψ⟩ over the engine's current state. Read-only.
    pub fn expectation_value(&self, engine: &Engine) -> Result<f64> {
        let n = engine.num_qubits();
        let state = engine.state();
        let mut expectation = 0.0;

        for term in &self.terms {
            let mut kinds = vec![Pauli::I; n];
            for &(pauli, id) in &term.factors {
                kinds[engine.position_by_id(id)?] = pauli;
            }

            // Kronecker assembly, most significant position first.
            let mut op = CsrMatrix::identity(1);
            for kind in kinds.iter().rev() {
                op = kronecker_product(&op, &pauli_matrix(*kind));
            }

            let image = &op * state.clone_owned();
            let value: Qbit = state
                .iter()
                .zip(image.iter())
                .map(|(psi, phi)| psi.conj() * phi)
                .sum();
            expectation += term.coefficient * value.re;
        }

        Ok(expectation)
    }
}

fn pauli_matrix(kind: Pauli) -> CsrMatrix<Qbit> {
    let mut coo = CooMatrix::new(2, 2);
    match kind {
        Pauli::I => {
            coo.push(0, 0, Complex::new(1.0, 0.0));
            coo.push(1, 1, Complex::new(1.0, 0.0));
        }
        Pauli::X => {
            coo.push(0, 1, Complex::new(1.0, 0.0));
            coo.push(1, 0, Complex::new(1.0, 0.0));
        }
        Pauli::Y => {
            coo.push(0, 1, Complex::new(0.0, -1.0));
            coo.push(1, 0, Complex::new(0.0, 1.0));
        }
        Pauli::Z => {
            coo.push(0, 0, Complex::new(1.0, 0.0));
            coo.push(1, 1, Complex::new(-1.0, 0.0));
        }
    }
    CsrMatrix::from(&coo)
}

pub(crate) fn kronecker_product(x: &CsrMatrix<Qbit>, y: &CsrMatrix<Qbit>) -> CsrMatrix<Qbit> {
    let mut result = CooMatrix::new(x.nrows() * y.nrows(), x.ncols() * y.ncols());

    for (rx, cx, value_x) in x.triplet_iter() {
        for (ry, cy, value_y) in y.triplet_iter() {
            let new_row = rx * y.nrows() + ry;
            let new_col = cx * y.ncols() + cy;
            result.push(new_row, new_col, value_x * value_y);
        }
    }

    CsrMatrix::from(&result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert_approx_eq;
    use crate::engine::EngineConfig;
    use crate::error::SimError;
    use crate::gates::Gate;

    fn engine() -> Engine {
        Engine::new(EngineConfig {
            seed: Some(0),
            ..Default::default()
        })
    }

    #[test]
    fn test_1qbit_z_observable() -> Result<()> {
        let mut engine = engine();
        let reg = engine.allocate(1)?;

        let mut observable = Observable::new();
        observable.add_term(1.0, &[(Pauli::Z, &reg[0])]);

        assert_approx_eq!(1.0, observable.expectation_value(&engine)?);

        engine.apply(&Gate::H, &[&reg[0]], &[])?;
        assert_approx_eq!(0.0, observable.expectation_value(&engine)?);

        // cos²(θ/2) - sin²(θ/2) for Ry(θ) from |0>
        let mut engine = self::engine();
        let reg = engine.allocate(1)?;
        let theta = 2.0 * (1.0_f64 / 3.0).sqrt().asin();
        engine.apply(&Gate::Ry(theta), &[&reg[0]], &[])?;
        let mut observable = Observable::new();
        observable.add_term(1.0, &[(Pauli::Z, &reg[0])]);
        assert_approx_eq!(1.0 / 3.0, observable.expectation_value(&engine)?);
        Ok(())
    }

    #[test]
    fn test_1qbit_x_observable() -> Result<()> {
        let mut engine = engine();
        let reg = engine.allocate(1)?;

        let mut observable = Observable::new();
        observable.add_term(1.0, &[(Pauli::X, &reg[0])]);

        assert_approx_eq!(0.0, observable.expectation_value(&engine)?);

        engine.apply(&Gate::H, &[&reg[0]], &[])?;
        assert_approx_eq!(1.0, observable.expectation_value(&engine)?);
        Ok(())
    }

    #[test]
    fn test_1qbit_y_observable() -> Result<()> {
        let mut engine = engine();
        let reg = engine.allocate(1)?;
        // Rx(-π/2)|0> = (|0> + i|1>)/√2, the Y=+1 eigenstate.
        engine.apply(&Gate::Rx(-std::f64::consts::FRAC_PI_2), &[&reg[0]], &[])?;

        let mut observable = Observable::new();
        observable.add_term(1.0, &[(Pauli::Y, &reg[0])]);
        assert_approx_eq!(1.0, observable.expectation_value(&engine)?);
        Ok(())
    }

    #[test]
    fn test_2qbit_xz_term() -> Result<()> {
        let mut engine = engine();
        let reg = engine.allocate(2)?;

        let mut observable = Observable::new();
        observable.add_term(1.0, &[(Pauli::X, &reg[0]), (Pauli::Z, &reg[1])]);

        assert_approx_eq!(0.0, observable.expectation_value(&engine)?);

        engine.apply(&Gate::H, &[&reg[0]], &[])?;
        assert_approx_eq!(1.0, observable.expectation_value(&engine)?);

        // Flipping the Z qubit negates the product term.
        engine.apply(&Gate::X, &[&reg[1]], &[])?;
        assert_approx_eq!(-1.0, observable.expectation_value(&engine)?);
        Ok(())
    }

    #[test]
    fn test_deallocated_qubit_reference_is_rejected() -> Result<()> {
        let mut engine = engine();
        let mut reg = engine.allocate(2)?;
        let tail = reg.split_off(1);

        let mut observable = Observable::new();
        observable.add_term(1.0, &[(Pauli::Z, &tail[0])]);
        engine.deallocate(tail)?;

        assert!(matches!(
            observable.expectation_value(&engine),
            Err(SimError::InvalidQubit { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_weighted_sum_of_terms() -> Result<()> {
        let mut engine = engine();
        let reg = engine.allocate(1)?;

        let mut observable = Observable::new();
        observable.add_term(1.5, &[]);
        observable.add_term(0.5, &[(Pauli::X, &reg[0])]);

        // ⟨H⟩ on |0> for H = 1.5I + 0.5X.
        assert_approx_eq!(1.5, observable.expectation_value(&engine)?);
        engine.apply(&Gate::H, &[&reg[0]], &[])?;
        assert_approx_eq!(2.0, observable.expectation_value(&engine)?);
        Ok(())
    }
}
