//! A state-vector quantum circuit simulation engine.
//!
//! The [`Engine`] owns the complex amplitude vector for a dynamically sized
//! set of qubits. Callers allocate [`Register`]s of [`Qubit`] handles, apply
//! gates from the closed [`Gate`] set (optionally controlled), bracket helper
//! computations in compute/uncompute scopes, and measure qubits with Born-rule
//! collapse. [`RetryController`] drives repeat-until-success postselection
//! loops over fresh engines.

pub mod engine;
pub mod error;
pub mod gates;
pub mod observable;
pub mod retry;
pub mod test_util;
pub mod transform;

use num_complex::Complex;

pub type Qbit = Complex<f64>;

pub use engine::{Engine, EngineConfig, Qubit, Register, ScopeId};
pub use error::{Result, SimError};
pub use gates::{Gate, PauliSum};
pub use observable::{Observable, Pauli};
pub use retry::RetryController;
pub use transform::{frequency_transform, inverse_frequency_transform, swap, uniform_superpose};
