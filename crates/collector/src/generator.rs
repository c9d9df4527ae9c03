//! Gerador de leituras do DC.

use crate::sensor::Sensor;
use nave_core::config::CollectorConfig;
use nave_core::types::{Observation, Reading};

/// Monta uma [`Reading`] por ciclo, numerando a partir de 1.
pub struct ReadingGenerator<S> {
    cabin: u32,
    deck: u32,
    sensor_name: String,
    identity: String,
    sequence: u64,
    sensor: S,
}

impl<S: Sensor> ReadingGenerator<S> {
    pub fn new(config: &CollectorConfig, sensor: S) -> Self {
        Self {
            cabin: config.cabin,
            deck: config.deck,
            sensor_name: config.sensor.clone(),
            identity: config.identity.clone(),
            sequence: 0,
            sensor,
        }
    }

    /// Última sequência emitida (0 antes da primeira leitura).
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Lê o sensor e retorna a próxima leitura.
    pub fn collect(&mut self, precision: u32) -> Reading {
        self.sequence += 1;
        Reading {
            cabin: self.cabin,
            deck: self.deck,
            sensor: self.sensor_name.clone(),
            identity: self.identity.clone(),
            observation: Observation {
                sequence: self.sequence,
                temperature: self.sensor.temperature(precision),
                humidity: self.sensor.humidity(precision),
            },
        }
    }
}
