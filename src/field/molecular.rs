//! Fields computed by an external evaluator over the whole molecule:
//! molecular orbitals and electrostatic potentials.

use std::{fmt, sync::Arc};

use ndarray::Array3;

use crate::{
    error::{Result, SurfaceError},
    grid::VolumetricGrid,
    types::{Atom, Value},
};

use super::{FieldContext, FieldKind, GeneratedField, ScalarField, grid_around_atoms};

/// Everything an evaluator gets to fill a grid with.
#[derive(Clone, Copy, Debug)]
pub struct OrbitalRequest<'a> {
    pub atoms: &'a [Atom],
    /// MO coefficients, or one partial charge per atom for a potential.
    pub coefficients: &'a [Value],
}

/// Fills a dense array from per-atom data, e.g. a basis-set evaluator.
pub trait OrbitalEvaluator: fmt::Debug + Send + Sync {
    fn fill(
        &self,
        request: &OrbitalRequest<'_>,
        grid: &VolumetricGrid,
        values: &mut Array3<Value>,
    ) -> Result<()>;
}

/// Point-charge potential `Σ qᵢ / rᵢ`, with `r` floored at 0.01 Å.
#[derive(Clone, Copy, Debug, Default)]
pub struct CoulombPotential;

impl OrbitalEvaluator for CoulombPotential {
    fn fill(
        &self,
        request: &OrbitalRequest<'_>,
        grid: &VolumetricGrid,
        values: &mut Array3<Value>,
    ) -> Result<()> {
        let charges: Vec<Value> = if request.coefficients.len() == request.atoms.len() {
            request.coefficients.to_vec()
        } else {
            request.atoms.iter().map(|a| a.charge).collect()
        };
        for ((x, y, z), value) in values.indexed_iter_mut() {
            let p = grid.lattice_to_world(x, y, z);
            *value = request
                .atoms
                .iter()
                .zip(&charges)
                .map(|(atom, q)| q / (p - atom.position).norm().max(0.01))
                .sum();
        }
        Ok(())
    }
}

fn evaluate(
    evaluator: &dyn OrbitalEvaluator,
    request: &OrbitalRequest<'_>,
    grid: &VolumetricGrid,
) -> Result<ScalarField> {
    let [nx, ny, nz] = grid.counts();
    let mut values = Array3::zeros((nx, ny, nz));
    evaluator.fill(request, grid, &mut values)?;
    Ok(ScalarField::Dense(values))
}

#[derive(Clone, Debug, Default)]
pub struct MolecularOrbitalConfig {
    pub label: String,
    pub coefficients: Vec<Value>,
    pub evaluator: Option<Arc<dyn OrbitalEvaluator>>,
}

impl MolecularOrbitalConfig {
    pub fn new(coefficients: Vec<Value>, evaluator: Arc<dyn OrbitalEvaluator>) -> Self {
        Self {
            label: String::new(),
            coefficients,
            evaluator: Some(evaluator),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub(super) fn validate(&self, ctx: &FieldContext) -> Result<()> {
        if ctx.atoms.is_empty() {
            return Err(SurfaceError::MissingAtoms);
        }
        if self.coefficients.is_empty() {
            return Err(SurfaceError::MissingCoefficients);
        }
        if self.evaluator.is_none() {
            return Err(SurfaceError::MissingEvaluator);
        }
        Ok(())
    }

    pub(super) fn fill_on(&self, ctx: &FieldContext, grid: &VolumetricGrid) -> Result<ScalarField> {
        let evaluator = self.evaluator.as_deref().ok_or(SurfaceError::MissingEvaluator)?;
        let request = OrbitalRequest {
            atoms: &ctx.atoms,
            coefficients: &self.coefficients,
        };
        evaluate(evaluator, &request, grid)
    }

    pub(super) fn generate(&self, kind: &FieldKind, ctx: &FieldContext) -> Result<GeneratedField> {
        let grid = grid_around_atoms(&ctx.atoms, 2.0, kind.points_per_unit(ctx), kind.hard_cap())?;
        let field = self.fill_on(ctx, &grid)?;
        Ok(GeneratedField {
            title: [
                format!("molecular orbital {}", self.label),
                format!("{} coefficients", self.coefficients.len()),
            ],
            grid,
            field,
            atoms: ctx.atoms.clone(),
            transform: None,
        })
    }
}

/// Molecular electrostatic potential from partial charges.
#[derive(Clone, Debug, Default)]
pub struct MepConfig {
    /// One per atom; empty means "use the atoms' own charges".
    pub charges: Vec<Value>,
    /// Defaults to [`CoulombPotential`].
    pub evaluator: Option<Arc<dyn OrbitalEvaluator>>,
}

impl MepConfig {
    pub fn with_charges(mut self, charges: Vec<Value>) -> Self {
        self.charges = charges;
        self
    }

    pub fn with_evaluator(mut self, evaluator: Arc<dyn OrbitalEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    fn charges(&self, atoms: &[Atom]) -> Vec<Value> {
        if self.charges.is_empty() {
            atoms.iter().map(|a| a.charge).collect()
        } else {
            self.charges.clone()
        }
    }

    pub(super) fn validate(&self, ctx: &FieldContext) -> Result<()> {
        if ctx.atoms.is_empty() {
            return Err(SurfaceError::MissingAtoms);
        }
        let charges = self.charges(&ctx.atoms);
        if charges.len() != ctx.atoms.len() || charges.iter().all(|q| *q == 0.0) {
            return Err(SurfaceError::MissingCharges);
        }
        Ok(())
    }

    pub(super) fn fill_on(&self, ctx: &FieldContext, grid: &VolumetricGrid) -> Result<ScalarField> {
        let charges = self.charges(&ctx.atoms);
        let request = OrbitalRequest {
            atoms: &ctx.atoms,
            coefficients: &charges,
        };
        match self.evaluator.as_deref() {
            Some(evaluator) => evaluate(evaluator, &request, grid),
            None => evaluate(&CoulombPotential, &request, grid),
        }
    }

    pub(super) fn generate(&self, kind: &FieldKind, ctx: &FieldContext) -> Result<GeneratedField> {
        let grid = grid_around_atoms(&ctx.atoms, 2.0, kind.points_per_unit(ctx), kind.hard_cap())?;
        let field = self.fill_on(ctx, &grid)?;
        Ok(GeneratedField {
            title: [
                "molecular electrostatic potential".to_string(),
                format!("{} point charges", ctx.atoms.len()),
            ],
            grid,
            field,
            atoms: ctx.atoms.clone(),
            transform: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Point;
    use approx::assert_relative_eq;

    fn water() -> Vec<Atom> {
        vec![
            Atom::new(8, Point::new(0.0, 0.0, 0.0), 1.52).with_charge(-0.8),
            Atom::new(1, Point::new(0.96, 0.0, 0.0), 1.1).with_charge(0.4),
            Atom::new(1, Point::new(-0.24, 0.93, 0.0), 1.1).with_charge(0.4),
        ]
    }

    #[test]
    fn coulomb_potential_sums_point_charges() {
        let atoms = water();
        let grid = VolumetricGrid::axis_aligned(
            Point::new(-2.0, -2.0, -2.0),
            Point::new(2.0, 2.0, 2.0),
            [3, 3, 3],
        )
        .unwrap();
        let ctx = FieldContext {
            atoms: atoms.clone(),
            ..FieldContext::default()
        };
        let field = MepConfig::default().fill_on(&ctx, &grid).unwrap();
        let p = grid.lattice_to_world(2, 2, 2);
        let expected: Value = atoms
            .iter()
            .map(|a| a.charge / (p - a.position).norm())
            .sum();
        assert_relative_eq!(field.get(2, 2, 2), expected, epsilon = 1e-5);
    }

    #[test]
    fn missing_data_is_a_configuration_error() {
        let ctx = FieldContext {
            atoms: vec![Atom::new(6, Point::origin(), 1.7)],
            ..FieldContext::default()
        };
        assert!(matches!(
            MepConfig::default().validate(&ctx),
            Err(SurfaceError::MissingCharges)
        ));
        assert!(matches!(
            MolecularOrbitalConfig::default().validate(&ctx),
            Err(SurfaceError::MissingCoefficients)
        ));
        let no_evaluator = MolecularOrbitalConfig {
            coefficients: vec![1.0],
            ..MolecularOrbitalConfig::default()
        };
        assert!(matches!(
            no_evaluator.validate(&ctx),
            Err(SurfaceError::MissingEvaluator)
        ));
    }
}
