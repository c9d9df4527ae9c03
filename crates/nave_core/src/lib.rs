//! # Nave Core
//!
//! Crate compartilhada do sistema de telemetria da nave: registros do
//! protocolo DC ↔ DA, codec de linha JSON, configuração, buffers por
//! dispositivo e o ciclo de envio do DA.
//!
//! ## Módulos
//! - [`types`] – Leituras, parâmetros iniciais e registros agregados
//! - [`protocol`] – Framing `\n` + JSON com limite de linha
//! - [`config`] – `parametri.conf` (DA) e `configurazionedc.conf` (DC)
//! - [`buffer`] – Acumulação de medidas por identidade
//! - [`flush`] – Janela de envio e cálculo das médias
//! - [`sink`] – Arquivo local e uplink
//! - [`cipher`] – Cifragem do envio

pub mod types;
pub mod protocol;
pub mod config;
pub mod buffer;
pub mod flush;
pub mod sink;
pub mod cipher;

// Re-exports convenientes
pub use types::{AggregateRecord, InitialParams, Reading, ReceivedReading};
pub use protocol::{FrameReader, ProtocolError, write_frame};
pub use config::{AggregatorConfig, CollectorConfig, ConfigError};
pub use buffer::DeviceRegistry;
pub use flush::{FlushCycle, FlushScheduler};
