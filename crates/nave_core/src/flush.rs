//! Ciclo de envio: janela de tempo tumbling avaliada a cada leitura válida.
//!
//! Não há timer dedicado. Quem recebe as leituras chama
//! [`FlushScheduler::poll`] depois de cada registro; se o intervalo desde
//! o último envio já passou, todos os dispositivos com amostras geram um
//! [`AggregateRecord`] e têm as listas esvaziadas.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::buffer::DeviceRegistry;
use crate::types::AggregateRecord;

/// Arredonda `value` para `decimals` casas decimais, empate para o par.
///
/// O arredondamento é feito sobre o valor binário exato via formatação
/// decimal: `20.125` (exato) vira `20.12`, `2.675` (na verdade
/// `2.67499…`) vira `2.67`.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    format!("{:.*}", decimals as usize, value)
        .parse()
        .unwrap_or(value)
}

/// Resultado de um ciclo de envio.
#[derive(Debug, Clone, PartialEq)]
pub struct FlushCycle {
    pub sequence: u64,
    pub timestamp: u64,
    pub records: Vec<AggregateRecord>,
}

/// Estado do agendador de envios.
#[derive(Debug, Clone)]
pub struct FlushScheduler {
    interval: Duration,
    last_flush: SystemTime,
    sequence: u64,
    precision: u32,
    identity: String,
}

impl FlushScheduler {
    /// `started_at` é o início da primeira janela (normalmente o boot do DA).
    pub fn new(
        interval: Duration,
        started_at: SystemTime,
        precision: u32,
        identity: impl Into<String>,
    ) -> Self {
        Self {
            interval,
            last_flush: started_at,
            sequence: 0,
            precision,
            identity: identity.into(),
        }
    }

    /// Ciclos executados até agora.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn last_flush(&self) -> SystemTime {
        self.last_flush
    }

    /// A janela expirou? Relógio voltando no tempo nunca dispara.
    pub fn is_due(&self, now: SystemTime) -> bool {
        now.duration_since(self.last_flush)
            .is_ok_and(|elapsed| elapsed >= self.interval)
    }

    /// Executa um ciclo se a janela expirou.
    ///
    /// O número do ciclo avança uma vez por execução, mesmo que nenhum
    /// dispositivo tenha amostras. Dispositivos com temperatura ou
    /// umidade sem amostras ficam intocados.
    pub fn poll(&mut self, now: SystemTime, devices: &mut DeviceRegistry) -> Option<FlushCycle> {
        if !self.is_due(now) {
            return None;
        }

        self.sequence += 1;
        self.last_flush = now;

        let timestamp = epoch_secs(now);
        let sequence = self.sequence;
        let precision = self.precision;
        let aggregator = &self.identity;

        let records = devices
            .iter_mut()
            .filter_map(|(identity, buffer)| {
                let temperature = buffer.mean_temperature()?;
                let humidity = buffer.mean_humidity()?;
                let record = AggregateRecord {
                    flush_sequence: sequence,
                    cabin: buffer.cabin,
                    deck: buffer.deck,
                    temperature: round_to(temperature, precision),
                    humidity: round_to(humidity, precision),
                    timestamp,
                    aggregator: aggregator.clone(),
                    device: identity.to_owned(),
                };
                buffer.clear();
                Some(record)
            })
            .collect();

        Some(FlushCycle {
            sequence,
            timestamp,
            records,
        })
    }
}

/// Segundos desde a epoch (0 se anterior a 1970).
pub fn epoch_secs(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
