//! Despacho de um ciclo de envio: cifra → uplink, e arquivo local em claro.

use nave_core::cipher::Cipher;
use nave_core::flush::FlushCycle;
use nave_core::sink::{RecordSink, Uplink};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, warn};

/// Destinos de cada [`FlushCycle`].
pub struct Pipeline {
    cipher: Box<dyn Cipher>,
    uplink: Box<dyn Uplink>,
    archive: Box<dyn RecordSink>,
    /// Ciclos concluídos, lido pelo handler de CTRL+C
    flush_count: Arc<AtomicU64>,
}

/// Contagem de um despacho.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub forwarded: usize,
    pub archived: usize,
}

impl Pipeline {
    pub fn new(
        cipher: Box<dyn Cipher>,
        uplink: Box<dyn Uplink>,
        archive: Box<dyn RecordSink>,
        flush_count: Arc<AtomicU64>,
    ) -> Self {
        Self {
            cipher,
            uplink,
            archive,
            flush_count,
        }
    }

    /// Envia todos os registros do ciclo.
    ///
    /// Falha em um destino é registrada e não interrompe os demais
    /// registros; não há nova tentativa.
    pub fn dispatch(&mut self, cycle: &FlushCycle) -> DispatchReport {
        self.flush_count.store(cycle.sequence, Ordering::SeqCst);
        info!(
            "Envio #{}: {} registro(s)",
            cycle.sequence,
            cycle.records.len()
        );

        let mut report = DispatchReport::default();
        for record in &cycle.records {
            match serde_json::to_string(record) {
                Ok(json) => {
                    let encrypted = self.cipher.encrypt(&json);
                    match self.uplink.forward(&encrypted) {
                        Ok(()) => report.forwarded += 1,
                        Err(e) => warn!("Falha no envio de {}: {e}", record.device),
                    }
                }
                Err(e) => warn!("Falha ao serializar registro de {}: {e}", record.device),
            }

            match self.archive.append(record) {
                Ok(()) => report.archived += 1,
                Err(e) => warn!("Falha ao gravar registro de {}: {e}", record.device),
            }
        }
        report
    }
}
