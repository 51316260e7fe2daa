use std::fmt::Display;
use std::ops::{Index, Range};

use nalgebra::{DMatrix, DVector};
use num_complex::Complex;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use tracing::{debug, trace};

use crate::error::{Result, SimError};
use crate::gates::{unitarity_deviation, Gate};
use crate::Qbit;

/// Construction-time parameters for an [`Engine`].
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Hard ceiling on live qubits; the state vector holds 2^n amplitudes.
    pub max_qubits: usize,
    /// Tolerance for the U†U = I check on caller-supplied matrices.
    pub unitary_tolerance: f64,
    /// Norm drift beyond this is a [`SimError::NumericalDivergence`];
    /// drift within it is corrected by renormalization at measurement time.
    pub divergence_tolerance: f64,
    /// Fixed RNG seed for reproducible measurement outcomes.
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_qubits: 24,
            unitary_tolerance: 1e-9,
            divergence_tolerance: 1e-6,
            seed: None,
        }
    }
}

/// Opaque handle to one tensor factor of the global state.
///
/// Handles are deliberately neither `Clone` nor `Copy`: a qubit has exactly
/// one owner for its lifetime, and gates borrow it.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct Qubit {
    id: usize,
}

impl Qubit {
    pub fn id(&self) -> usize {
        self.id
    }
}

/// An ordered sequence of qubit handles with no ownership semantics of its
/// own beyond holding the handles; a naming convenience over engine indices.
#[derive(Debug, Default)]
pub struct Register {
    qubits: Vec<Qubit>,
}

impl Register {
    pub fn len(&self) -> usize {
        self.qubits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.qubits.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Qubit> {
        self.qubits.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Qubit> {
        self.qubits.iter()
    }

    pub fn as_slice(&self) -> &[Qubit] {
        &self.qubits
    }

    pub fn slice(&self, range: Range<usize>) -> &[Qubit] {
        &self.qubits[range]
    }

    /// Appends `other` onto `self`; underlying qubits are unaffected.
    pub fn concat(mut self, other: Register) -> Register {
        self.qubits.extend(other.qubits);
        self
    }

    /// Splits the register at `at`, returning the tail.
    pub fn split_off(&mut self, at: usize) -> Register {
        Register {
            qubits: self.qubits.split_off(at),
        }
    }
}

impl Index<usize> for Register {
    type Output = Qubit;

    fn index(&self, index: usize) -> &Qubit {
        &self.qubits[index]
    }
}

impl From<Vec<Qubit>> for Register {
    fn from(qubits: Vec<Qubit>) -> Self {
        Self { qubits }
    }
}

/// Handle to one compute scope, returned by [`Engine::begin_scope`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScopeId(u64);

struct Slot {
    position: usize,
    /// `Some(bit)` after measurement collapsed the qubit; cleared when a
    /// later gate re-superposes it.
    classical: Option<bool>,
}

struct Operation {
    matrix: DMatrix<Qbit>,
    targets: Vec<usize>,
    controls: Vec<usize>,
}

struct Scope {
    id: ScopeId,
    open: bool,
    ops: Vec<Operation>,
}

/// The simulation context: amplitude store, gate kernel, scope recorder and
/// measurement subsystem behind one explicitly constructed, explicitly
/// passed object.
pub struct Engine {
    config: EngineConfig,
    state: DVector<Qbit>,
    slots: Vec<Option<Slot>>,
    live: usize,
    scopes: Vec<Scope>,
    retired_scopes: Vec<ScopeId>,
    next_scope_id: u64,
    rng: Box<dyn RngCore>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let rng: Box<dyn RngCore> = match config.seed {
            Some(seed) => Box::new(StdRng::seed_from_u64(seed)),
            None => Box::new(rand::rng()),
        };
        Self::with_rng(config, rng)
    }

    /// Builds an engine around an injected random source.
    pub fn with_rng(config: EngineConfig, rng: Box<dyn RngCore>) -> Self {
        let mut state = DVector::zeros(1);
        state[0] = Complex::new(1.0, 0.0);
        Self {
            config,
            state,
            slots: Vec::new(),
            live: 0,
            scopes: Vec::new(),
            retired_scopes: Vec::new(),
            next_scope_id: 0,
            rng,
        }
    }

    pub fn num_qubits(&self) -> usize {
        self.live
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ---- allocation -------------------------------------------------------

    /// Allocates `count` fresh qubits in |0…0⟩, tensored onto the most
    /// significant positions so existing amplitudes keep their basis indices.
    pub fn allocate(&mut self, count: usize) -> Result<Register> {
        if self.live + count > self.config.max_qubits {
            return Err(SimError::Capacity {
                requested: count,
                live: self.live,
                max: self.config.max_qubits,
            });
        }

        let new_len = self.state.len() << count;
        let state = std::mem::replace(&mut self.state, DVector::zeros(0));
        self.state = state.resize_vertically(new_len, Complex::ZERO);

        let mut qubits = Vec::with_capacity(count);
        for _ in 0..count {
            let id = self.slots.len();
            self.slots.push(Some(Slot {
                position: self.live,
                classical: None,
            }));
            self.live += 1;
            qubits.push(Qubit { id });
        }
        debug!(count, live = self.live, "allocated qubits");
        Ok(Register { qubits })
    }

    /// Removes qubits that hold a definite classical value (measured, or
    /// never taken out of a basis state). The surviving amplitudes are
    /// reindexed by an exact bijection.
    pub fn deallocate(&mut self, register: Register) -> Result<()> {
        if self.open_scope().is_some() {
            return Err(SimError::ScopeConflict(
                "cannot deallocate while a compute scope is open".into(),
            ));
        }

        let tolerance = self.config.divergence_tolerance;
        let mut removals = Vec::with_capacity(register.len());
        for qubit in register.iter() {
            let p_one = self.qubit_probability(qubit)?;
            let value = if p_one <= tolerance {
                false
            } else if p_one >= 1.0 - tolerance {
                true
            } else {
                return Err(SimError::InvalidState { id: qubit.id() });
            };
            removals.push((qubit.id(), self.position_by_id(qubit.id())?, value));
        }

        // Retained scope records that mention a removed qubit can never be
        // replayed again; retire them, remembering the ids so a later
        // uncompute gets a precise error instead of a stale-handle one.
        let removed: Vec<usize> = removals.iter().map(|&(id, _, _)| id).collect();
        let retired = &mut self.retired_scopes;
        self.scopes.retain(|scope| {
            let touches_removed = scope.ops.iter().any(|op| {
                op.targets
                    .iter()
                    .chain(op.controls.iter())
                    .any(|id| removed.contains(id))
            });
            if touches_removed {
                retired.push(scope.id);
            }
            !touches_removed
        });

        // Highest position first, so earlier removals leave lower bits alone.
        removals.sort_by(|a, b| b.1.cmp(&a.1));
        for (id, position, value) in removals {
            self.state = remove_bit(&self.state, position, value);
            self.slots[id] = None;
            for slot in self.slots.iter_mut().flatten() {
                if slot.position > position {
                    slot.position -= 1;
                }
            }
            self.live -= 1;
        }

        let norm = self.norm();
        if norm > 0.0 {
            self.state.unscale_mut(norm);
        }
        debug!(live = self.live, "deallocated qubits");
        Ok(())
    }

    // ---- inspection -------------------------------------------------------

    /// Amplitude of the given basis index. Bit k of the index corresponds to
    /// the qubit at position k (see [`Engine::bit_position`]).
    pub fn amplitude(&self, index: usize) -> Result<Qbit> {
        if index >= self.state.len() {
            return Err(SimError::InvalidIndex {
                index,
                qubits: self.live,
            });
        }
        Ok(self.state[index])
    }

    pub fn probability(&self, index: usize) -> Result<f64> {
        Ok(self.amplitude(index)?.norm_sqr())
    }

    /// Current bit position of a handle within basis indices.
    pub fn bit_position(&self, qubit: &Qubit) -> Result<usize> {
        self.position_by_id(qubit.id())
    }

    /// Marginal probability of measuring the qubit as 1.
    pub fn qubit_probability(&self, qubit: &Qubit) -> Result<f64> {
        let mask = 1_usize << self.bit_position(qubit)?;
        Ok(self
            .state
            .iter()
            .enumerate()
            .filter(|(index, _)| index & mask != 0)
            .map(|(_, amplitude)| amplitude.norm_sqr())
            .sum())
    }

    /// The classical value a measured qubit collapsed to, if any.
    pub fn classical_value(&self, qubit: &Qubit) -> Result<Option<bool>> {
        Ok(self.slot(qubit)?.classical)
    }

    pub fn norm(&self) -> f64 {
        self.state
            .iter()
            .map(|amplitude| amplitude.norm_sqr())
            .sum::<f64>()
            .sqrt()
    }

    pub(crate) fn state(&self) -> &DVector<Qbit> {
        &self.state
    }

    pub(crate) fn position_by_id(&self, id: usize) -> Result<usize> {
        self.slots
            .get(id)
            .and_then(|slot| slot.as_ref())
            .map(|slot| slot.position)
            .ok_or(SimError::InvalidQubit { id })
    }

    fn slot(&self, qubit: &Qubit) -> Result<&Slot> {
        self.slots
            .get(qubit.id())
            .and_then(|slot| slot.as_ref())
            .ok_or(SimError::InvalidQubit { id: qubit.id() })
    }

    // ---- gate application -------------------------------------------------

    /// Applies `gate` to `targets`, conditioned on every `controls` bit
    /// being 1. Records the operation into the open scope, if any.
    pub fn apply(&mut self, gate: &Gate, targets: &[&Qubit], controls: &[&Qubit]) -> Result<()> {
        let target_positions = self.resolve(targets)?;
        let control_positions = self.resolve(controls)?;
        self.check_disjoint(targets, controls)?;

        let matrix = gate.matrix();
        let expected = 1_usize << targets.len();
        if matrix.nrows() != expected || matrix.ncols() != expected {
            return Err(SimError::Dimension {
                targets: targets.len(),
                expected,
                rows: matrix.nrows(),
                cols: matrix.ncols(),
            });
        }
        if let Gate::Unitary(_) = gate {
            let deviation = unitarity_deviation(&matrix);
            if deviation > self.config.unitary_tolerance {
                return Err(SimError::NotUnitary {
                    deviation,
                    tolerance: self.config.unitary_tolerance,
                });
            }
        }

        apply_matrix(
            &mut self.state,
            &matrix,
            &target_positions,
            &control_positions,
        );

        // A gate on a collapsed qubit explicitly re-superposes it.
        for qubit in targets {
            if let Some(slot) = self.slots.get_mut(qubit.id()).and_then(|s| s.as_mut()) {
                slot.classical = None;
            }
        }

        if let Some(scope) = self.open_scope_mut() {
            scope.ops.push(Operation {
                matrix,
                targets: targets.iter().map(|q| q.id()).collect(),
                controls: controls.iter().map(|q| q.id()).collect(),
            });
        }
        Ok(())
    }

    fn resolve(&self, qubits: &[&Qubit]) -> Result<Vec<usize>> {
        qubits
            .iter()
            .map(|qubit| self.bit_position(qubit))
            .collect()
    }

    fn check_disjoint(&self, targets: &[&Qubit], controls: &[&Qubit]) -> Result<()> {
        let mut seen = 0_usize;
        for qubit in targets.iter().chain(controls.iter()) {
            let bit = 1_usize << self.bit_position(qubit)?;
            if seen & bit != 0 {
                return Err(SimError::DuplicateQubit { id: qubit.id() });
            }
            seen |= bit;
        }
        Ok(())
    }

    // ---- compute/uncompute scopes -----------------------------------------

    /// Opens a recording scope. At most one scope may be open at a time;
    /// records of closed scopes stay available for a later uncompute.
    pub fn begin_scope(&mut self) -> Result<ScopeId> {
        if self.open_scope().is_some() {
            return Err(SimError::ScopeConflict(
                "a compute scope is already open".into(),
            ));
        }
        let id = ScopeId(self.next_scope_id);
        self.next_scope_id += 1;
        self.scopes.push(Scope {
            id,
            open: true,
            ops: Vec::new(),
        });
        trace!(scope = id.0, "opened compute scope");
        Ok(id)
    }

    /// Closes recording without inverting. The operations stay applied and
    /// the record stays available for [`Engine::uncompute_scope`].
    pub fn end_scope(&mut self, id: ScopeId) -> Result<()> {
        match self.scopes.last_mut() {
            Some(scope) if scope.open && scope.id == id => {
                scope.open = false;
                trace!(scope = id.0, ops = scope.ops.len(), "closed compute scope");
                Ok(())
            }
            _ => Err(SimError::ScopeConflict(format!(
                "scope {} is not the open scope",
                id.0
            ))),
        }
    }

    /// Replays the scope's operations adjoint-first in reverse order, then
    /// discards the record. Only the most recent scope can be uncomputed.
    pub fn uncompute_scope(&mut self, id: ScopeId) -> Result<()> {
        if self.retired_scopes.contains(&id) {
            return Err(SimError::ScopeConflict(format!(
                "scope {} was retired when a qubit it touched was deallocated",
                id.0
            )));
        }
        match self.scopes.last() {
            Some(scope) if scope.id == id => {}
            _ => {
                return Err(SimError::ScopeConflict(format!(
                    "scope {} is not the most recent scope",
                    id.0
                )))
            }
        }
        let scope = self.scopes.pop().ok_or_else(|| {
            SimError::ScopeConflict(format!("scope {} is not the most recent scope", id.0))
        })?;

        for op in scope.ops.iter().rev() {
            let targets = self.resolve_ids(&op.targets)?;
            let controls = self.resolve_ids(&op.controls)?;
            let adjoint = op.matrix.adjoint();
            apply_matrix(&mut self.state, &adjoint, &targets, &controls);
        }
        debug!(scope = id.0, ops = scope.ops.len(), "uncomputed scope");
        Ok(())
    }

    fn resolve_ids(&self, ids: &[usize]) -> Result<Vec<usize>> {
        ids.iter().map(|&id| self.position_by_id(id)).collect()
    }

    fn open_scope(&self) -> Option<&Scope> {
        self.scopes.last().filter(|scope| scope.open)
    }

    fn open_scope_mut(&mut self) -> Option<&mut Scope> {
        self.scopes.last_mut().filter(|scope| scope.open)
    }

    // ---- measurement ------------------------------------------------------

    /// Measures each qubit in turn by the Born rule, collapsing and
    /// renormalizing after every draw. Sequential conditioning realizes the
    /// joint distribution, so the order within a batch cannot change it.
    pub fn measure(&mut self, qubits: &[&Qubit]) -> Result<Vec<bool>> {
        if self.open_scope().is_some() {
            return Err(SimError::ScopeConflict(
                "cannot measure inside an open compute scope".into(),
            ));
        }

        let norm = self.norm();
        if (norm - 1.0).abs() > self.config.divergence_tolerance {
            return Err(SimError::NumericalDivergence { norm });
        }
        // In-tolerance drift is corrected here rather than treated as error.
        self.state.unscale_mut(norm);

        // Validate the whole batch before collapsing anything.
        let mut seen = 0_usize;
        for qubit in qubits {
            let slot = self.slot(qubit)?;
            if slot.classical.is_some() {
                return Err(SimError::AlreadyMeasured { id: qubit.id() });
            }
            let bit = 1_usize << slot.position;
            if seen & bit != 0 {
                return Err(SimError::DuplicateQubit { id: qubit.id() });
            }
            seen |= bit;
        }

        let mut outcomes = Vec::with_capacity(qubits.len());
        for qubit in qubits {
            let mask = 1_usize << self.slot(qubit)?.position;

            let p_one: f64 = self
                .state
                .iter()
                .enumerate()
                .filter(|(index, _)| index & mask != 0)
                .map(|(_, amplitude)| amplitude.norm_sqr())
                .sum();
            let outcome = self.rng.random::<f64>() < p_one;
            let retained = if outcome { p_one } else { 1.0 - p_one };
            let scale = 1.0 / retained.sqrt();

            for (index, amplitude) in self.state.iter_mut().enumerate() {
                if (index & mask != 0) != outcome {
                    *amplitude = Complex::ZERO;
                } else {
                    *amplitude *= scale;
                }
            }

            if let Some(slot) = self.slots.get_mut(qubit.id()).and_then(|s| s.as_mut()) {
                slot.classical = Some(outcome);
            }
            trace!(qubit = qubit.id(), outcome, p_one, "measured qubit");
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }
}

impl Display for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let width = self.live;
        for (index, value) in self.state.iter().enumerate() {
            writeln!(f, "|{:0width$b}>: {}", index, value, width = width)?;
        }
        Ok(())
    }
}

/// Multiplies the 2^k sub-blocks selected by `targets` with `matrix`, for
/// every basis state whose `controls` bits are all 1. `targets[0]` is the
/// most significant bit of the matrix index.
fn apply_matrix(
    state: &mut DVector<Qbit>,
    matrix: &DMatrix<Qbit>,
    targets: &[usize],
    controls: &[usize],
) {
    let dim = 1_usize << targets.len();
    let target_mask: usize = targets.iter().map(|&p| 1_usize << p).sum();
    let control_mask: usize = controls.iter().map(|&p| 1_usize << p).sum();
    let mut scratch = vec![Complex::ZERO; dim];

    for base in 0..state.len() {
        if base & target_mask != 0 || base & control_mask != control_mask {
            continue;
        }
        for (sub, value) in scratch.iter_mut().enumerate() {
            *value = state[base | spread(sub, targets)];
        }
        for row in 0..dim {
            let mut acc = Complex::ZERO;
            for (col, value) in scratch.iter().enumerate() {
                acc += matrix[(row, col)] * value;
            }
            state[base | spread(row, targets)] = acc;
        }
    }
}

/// Scatters the bits of a sub-block index onto the target bit positions,
/// reading `targets[0]` as the most significant bit of `sub`.
fn spread(sub: usize, targets: &[usize]) -> usize {
    let k = targets.len();
    let mut index = 0;
    for (j, &position) in targets.iter().enumerate() {
        if sub & (1_usize << (k - 1 - j)) != 0 {
            index |= 1_usize << position;
        }
    }
    index
}

/// Drops bit `position` from every basis index, keeping the `value` branch.
fn remove_bit(state: &DVector<Qbit>, position: usize, value: bool) -> DVector<Qbit> {
    let half = state.len() / 2;
    let low_mask = (1_usize << position) - 1;
    let mut out = DVector::zeros(half);
    for index in 0..half {
        let low = index & low_mask;
        let high = (index >> position) << (position + 1);
        out[index] = state[high | ((value as usize) << position) | low];
    }
    out
}
