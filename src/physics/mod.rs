pub mod assembler;
pub mod flux;
pub mod mapping;
pub mod quantity;
pub mod state;

use serde::{Deserialize, Serialize};

use crate::physics::flux::FluxScheme;
use crate::physics::quantity::QuantityId;
use crate::symbolic::{Equation, Expr};

/// Per-quantity solve options.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QuantityOptions {
    pub name: String,
    /// Use the positivity-preserving update (carrier densities).
    pub geometric_update: bool,
    /// Diagonal stabilisation term, evaluated per cell.
    #[serde(skip)]
    pub damping_term: Option<Expr>,
    pub flux_scheme: FluxScheme,
}

impl QuantityOptions {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_geometric_update(mut self, on: bool) -> Self {
        self.geometric_update = on;
        self
    }

    pub fn with_damping_term(mut self, term: Expr) -> Self {
        self.damping_term = Some(term);
        self
    }

    pub fn with_flux_scheme(mut self, scheme: FluxScheme) -> Self {
        self.flux_scheme = scheme;
        self
    }
}

/// One balance equation and the unknown it is solved for.
#[derive(Clone, Debug, PartialEq)]
pub struct Pde {
    pub equation: Equation,
    pub unknown: QuantityId,
    pub options: QuantityOptions,
}

/// Ordered set of PDEs. The order is the solve order of every pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PdeSystem {
    pdes: Vec<Pde>,
}

impl PdeSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a PDE and return its index.
    pub fn add(&mut self, equation: Equation, unknown: QuantityId, options: QuantityOptions) -> usize {
        self.pdes.push(Pde {
            equation,
            unknown,
            options,
        });
        self.pdes.len() - 1
    }

    pub fn with(mut self, equation: Equation, unknown: QuantityId, options: QuantityOptions) -> Self {
        self.add(equation, unknown, options);
        self
    }

    pub fn len(&self) -> usize {
        self.pdes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pdes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Pde> {
        self.pdes.get(index)
    }

    /// Options stay mutable until a solve starts.
    pub fn options_mut(&mut self, index: usize) -> Option<&mut QuantityOptions> {
        self.pdes.get_mut(index).map(|p| &mut p.options)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Pde> {
        self.pdes.iter()
    }

    pub fn unknowns(&self) -> impl Iterator<Item = QuantityId> + '_ {
        self.pdes.iter().map(|p| p.unknown)
    }

    /// First unknown that is claimed by more than one PDE.
    pub fn duplicate_unknown(&self) -> Option<QuantityId> {
        let mut seen = std::collections::HashSet::new();
        self.unknowns().find(|q| !seen.insert(*q))
    }
}

impl<'a> IntoIterator for &'a PdeSystem {
    type Item = &'a Pde;
    type IntoIter = std::slice::Iter<'a, Pde>;

    fn into_iter(self) -> Self::IntoIter {
        self.pdes.iter()
    }
}
