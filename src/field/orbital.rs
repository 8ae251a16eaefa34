use std::f64::consts::PI;

use crate::{
    error::{Result, SurfaceError},
    types::{Value, Vector},
};

/// Bohr radius in Angstroms.
const BOHR: f64 = 0.52918;

/// Amplitudes below this are snapped to zero.
const ZERO_AMPLITUDE: f64 = 1e-7;

const MAX_N: i32 = 9;

/// Quantum numbers and nuclear charge of a hydrogen-like orbital.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuantumNumbers {
    pub n: i32,
    pub l: i32,
    pub m: i32,
    pub z: Value,
}

impl QuantumNumbers {
    pub fn new(n: i32, l: i32, m: i32, z: Value) -> Self {
        Self { n, l, m, z }
    }

    /// Requires `|m| <= l < n <= 9` and a positive nuclear charge.
    pub fn validate(&self) -> Result<()> {
        let Self { n, l, m, z } = *self;
        if n < 1 || n > MAX_N || l < 0 || l >= n || m.abs() > l {
            return Err(SurfaceError::InvalidQuantumNumbers { n, l, m });
        }
        if !(z.is_finite() && z > 0.0) {
            return Err(SurfaceError::InvalidNuclearCharge(z));
        }
        Ok(())
    }
}

fn factorial(n: i32) -> f64 {
    (1..=n).fold(1.0, |acc, k| acc * k as f64)
}

/// Closed-form hydrogen-like wavefunction with real spherical harmonics.
///
/// Series coefficients are computed once; evaluation is a pair of short
/// polynomial sums.
#[derive(Clone, Debug)]
pub struct HydrogenOrbital {
    numbers: QuantumNumbers,
    /// `2Z / (n·a₀)`, so `ρ = rho_scale · r`.
    rho_scale: f64,
    radial_norm: f64,
    angular_norm: f64,
    /// Coefficients of `L_{n−l−1}^{2l+1}(ρ)` by ascending power.
    laguerre: Vec<f64>,
    /// `(coefficient, power of cos θ)` terms of `P_l^{|m|}` without the `sin^{|m|} θ` factor.
    legendre: Vec<(f64, i32)>,
}

impl HydrogenOrbital {
    pub fn new(numbers: QuantumNumbers) -> Result<Self> {
        numbers.validate()?;
        let QuantumNumbers { n, l, m, z } = numbers;
        let m = m.abs();
        let rho_scale = 2.0 * z as f64 / (n as f64 * BOHR);

        let radial_norm = (rho_scale.powi(3) * factorial(n - l - 1)
            / (2.0 * n as f64 * factorial(n + l)))
            .sqrt();
        let k = n - l - 1;
        let alpha = 2 * l + 1;
        let laguerre = (0..=k)
            .map(|p| {
                let sign = if p % 2 == 0 { 1.0 } else { -1.0 };
                sign * factorial(k + alpha) / (factorial(k - p) * factorial(alpha + p) * factorial(p))
            })
            .collect();

        let mut angular_norm =
            ((2 * l + 1) as f64 / (4.0 * PI) * factorial(l - m) / factorial(l + m)).sqrt();
        if m != 0 {
            angular_norm *= 2f64.sqrt();
        }
        let legendre = (0..=(l - m) / 2)
            .map(|p| {
                let sign = if p % 2 == 0 { 1.0 } else { -1.0 };
                let c = sign * factorial(2 * l - 2 * p)
                    / (2f64.powi(l) * factorial(p) * factorial(l - p) * factorial(l - 2 * p - m));
                (c, l - 2 * p - m)
            })
            .collect();

        Ok(Self {
            numbers,
            rho_scale,
            radial_norm,
            angular_norm,
            laguerre,
            legendre,
        })
    }

    pub fn numbers(&self) -> &QuantumNumbers {
        &self.numbers
    }

    /// `R_nl(r)` for `r` in Angstroms.
    pub fn radial(&self, r: f64) -> f64 {
        let rho = self.rho_scale * r;
        let poly = self
            .laguerre
            .iter()
            .rev()
            .fold(0.0, |acc, c| acc * rho + c);
        self.radial_norm * (-rho / 2.0).exp() * rho.powi(self.numbers.l) * poly
    }

    fn legendre(&self, cos_theta: f64, sin_theta: f64) -> f64 {
        let sum: f64 = self
            .legendre
            .iter()
            .map(|&(c, power)| c * cos_theta.powi(power))
            .sum();
        sum * sin_theta.powi(self.numbers.m.abs())
    }

    /// Angular factor for the direction of `(x, y, z)`; the origin is treated as +z.
    pub fn angular(&self, x: f64, y: f64, z: f64) -> f64 {
        let r = (x * x + y * y + z * z).sqrt();
        let (cos_theta, sin_theta) = if r < 1e-12 {
            (1.0, 0.0)
        } else {
            (z / r, (x * x + y * y).sqrt() / r)
        };
        let m = self.numbers.m;
        let phase = match m.signum() {
            0 => 1.0,
            1 => (m as f64 * y.atan2(x)).cos(),
            _ => (m.abs() as f64 * y.atan2(x)).sin(),
        };
        self.angular_norm * self.legendre(cos_theta, sin_theta) * phase
    }

    /// `ψ` at a point given relative to the nucleus.
    pub fn value(&self, v: &Vector) -> Value {
        let (x, y, z) = (v.x as f64, v.y as f64, v.z as f64);
        let r = (x * x + y * y + z * z).sqrt();
        let psi = self.radial(r) * self.angular(x, y, z);
        if psi.abs() < ZERO_AMPLITUDE {
            0.0
        } else {
            psi as Value
        }
    }

    /// Upper bound of the angular factor over all directions.
    fn angular_max(&self) -> f64 {
        (0..=180)
            .map(|i| {
                let theta = PI * i as f64 / 180.0;
                (self.angular_norm * self.legendre(theta.cos(), theta.sin())).abs()
            })
            .fold(0.0, f64::max)
    }

    /// Radius beyond which `|ψ|` stays below `threshold`, searched out to 50 Å.
    pub fn extent(&self, threshold: Value) -> Value {
        let angular_max = self.angular_max();
        let threshold = threshold.abs().max(1e-6) as f64;
        let mut last = 0.0;
        for i in 1..=1000 {
            let r = i as f64 * 0.05;
            if self.radial(r).abs() * angular_max >= threshold {
                last = r;
            }
        }
        (last as Value).max(0.5)
    }
}
