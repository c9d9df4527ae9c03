//! Destinos dos registros agregados.
//!
//! - [`RecordSink`]: caminho local, registro em claro (arquivo `iotdata.dbt`)
//! - [`Uplink`]: caminho de envio, texto já cifrado rumo à IoT Platform

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use tracing::info;

use crate::types::AggregateRecord;

/// Erros de persistência.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Erro de I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("Erro de serialização: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Destino local dos registros agregados.
pub trait RecordSink {
    fn append(&mut self, record: &AggregateRecord) -> Result<(), SinkError>;
}

/// Transporte do registro cifrado.
pub trait Uplink {
    fn forward(&mut self, payload: &str) -> Result<(), SinkError>;
}

/// Arquivo append-only, um JSON por linha.
pub struct ArchiveFile {
    file: File,
}

impl ArchiveFile {
    /// Abre (ou cria) o arquivo, criando o diretório pai se preciso.
    pub fn open(path: &Path) -> Result<Self, SinkError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        info!("Arquivo local: {}", path.display());
        Ok(Self { file })
    }

    /// Lê todos os registros de um arquivo existente.
    pub fn read_all(path: &Path) -> Result<Vec<AggregateRecord>, SinkError> {
        let reader = BufReader::new(File::open(path)?);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }
        Ok(records)
    }
}

impl RecordSink for ArchiveFile {
    fn append(&mut self, record: &AggregateRecord) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        self.file.write_all(&line)?;
        self.file.flush()?;
        Ok(())
    }
}

/// Uplink simulado: o payload cifrado vai para o log.
#[derive(Debug, Default)]
pub struct LogUplink {
    sent: u64,
}

impl LogUplink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }
}

impl Uplink for LogUplink {
    fn forward(&mut self, payload: &str) -> Result<(), SinkError> {
        self.sent += 1;
        info!("Para IoT Platform (cifrado): {payload}");
        Ok(())
    }
}
