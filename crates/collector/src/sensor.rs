//! Simulação dos sensores de temperatura e umidade da cabine.

use nave_core::flush::round_to;
use rand::{Rng, SeedableRng, rngs::StdRng};
use std::ops::RangeInclusive;

/// Faixa simulada de temperatura (°C).
pub const TEMPERATURE_RANGE: RangeInclusive<f64> = 10.0..=40.0;
/// Faixa simulada de umidade relativa (%).
pub const HUMIDITY_RANGE: RangeInclusive<f64> = 20.0..=90.0;

/// Fonte de medidas do DC.
pub trait Sensor {
    /// Temperatura arredondada para `precision` casas.
    fn temperature(&mut self, precision: u32) -> f64;
    /// Umidade arredondada para `precision` casas.
    fn humidity(&mut self, precision: u32) -> f64;
}

/// Sensor simulado com distribuição uniforme.
pub struct SimulatedSensor<R> {
    rng: R,
}

impl SimulatedSensor<StdRng> {
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    #[cfg(test)]
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> SimulatedSensor<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    fn sample(&mut self, range: RangeInclusive<f64>, precision: u32) -> f64 {
        let value = self.rng.gen_range(range.clone());
        // O arredondamento não pode sair da faixa
        round_to(value, precision).clamp(*range.start(), *range.end())
    }
}

impl<R: Rng> Sensor for SimulatedSensor<R> {
    fn temperature(&mut self, precision: u32) -> f64 {
        self.sample(TEMPERATURE_RANGE, precision)
    }

    fn humidity(&mut self, precision: u32) -> f64 {
        self.sample(HUMIDITY_RANGE, precision)
    }
}
