//! Definição dos registros trocados entre DC, DA e o arquivo da IoT Platform.
//!
//! As chaves JSON seguem o protocolo original (italiano); os campos Rust
//! usam nomes descritivos com `#[serde(rename)]`.

use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};

/// Identidade usada quando o DC não envia `identita`.
pub const UNKNOWN_IDENTITY: &str = "UNKNOWN";

// ──────────────────────────────────────────────
// DA → DC
// ──────────────────────────────────────────────

/// Parâmetros iniciais enviados pelo DA logo após aceitar a conexão.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct InitialParams {
    /// Intervalo entre leituras do DC (segundos)
    #[serde(rename = "TEMPO_RILEVAZIONE")]
    pub collection_interval_secs: u64,
    /// Casas decimais das medidas
    #[serde(rename = "N_DECIMALI")]
    pub precision: u32,
}

// ──────────────────────────────────────────────
// DC → DA
// ──────────────────────────────────────────────

/// Uma observação do sensor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Observation {
    /// Número sequencial da leitura na sessão (começa em 1)
    #[serde(rename = "rilevazione")]
    pub sequence: u64,
    /// Temperatura (°C)
    #[serde(rename = "temperatura")]
    pub temperature: f64,
    /// Umidade relativa (%)
    #[serde(rename = "umidita")]
    pub humidity: f64,
}

/// Leitura completa enviada pelo DC (formato estrito, lado emissor).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reading {
    #[serde(rename = "cabina")]
    pub cabin: u32,
    #[serde(rename = "ponte")]
    pub deck: u32,
    #[serde(rename = "sensore")]
    pub sensor: String,
    #[serde(rename = "identita")]
    pub identity: String,
    #[serde(rename = "osservazione")]
    pub observation: Observation,
}

/// Observação como o DA a recebe: cada medida é opcional.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ReceivedObservation {
    #[serde(rename = "rilevazione", default, deserialize_with = "lenient")]
    pub sequence: Option<u64>,
    #[serde(rename = "temperatura", default, deserialize_with = "lenient")]
    pub temperature: Option<f64>,
    #[serde(rename = "umidita", default, deserialize_with = "lenient")]
    pub humidity: Option<f64>,
}

/// Leitura como o DA a recebe.
///
/// Campos ausentes ou de tipo errado viram `None` em vez de invalidar o
/// registro inteiro; só um JSON que não seja objeto é rejeitado (ver
/// [`crate::protocol::decode_reading`]).
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ReceivedReading {
    /// Só inteiro não negativo. `"3"`, `-1` ou `3.5` contam como cabine
    /// ausente e chegam ao arquivo como `null`.
    #[serde(rename = "cabina", default, deserialize_with = "lenient")]
    pub cabin: Option<u32>,
    /// Mesma regra de [`Self::cabin`].
    #[serde(rename = "ponte", default, deserialize_with = "lenient")]
    pub deck: Option<u32>,
    #[serde(rename = "sensore", default, deserialize_with = "lenient")]
    pub sensor: Option<String>,
    #[serde(rename = "identita", default, deserialize_with = "lenient")]
    pub identity: Option<String>,
    #[serde(rename = "osservazione", default, deserialize_with = "lenient")]
    pub observation: Option<ReceivedObservation>,
}

impl ReceivedReading {
    /// Identidade do dispositivo, ou [`UNKNOWN_IDENTITY`].
    pub fn identity(&self) -> &str {
        self.identity.as_deref().unwrap_or(UNKNOWN_IDENTITY)
    }

    pub fn temperature(&self) -> Option<f64> {
        self.observation.as_ref().and_then(|o| o.temperature)
    }

    pub fn humidity(&self) -> Option<f64> {
        self.observation.as_ref().and_then(|o| o.humidity)
    }
}

/// Aceita qualquer valor JSON; devolve `None` se não converter para `T`.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

// ──────────────────────────────────────────────
// DA → IoT Platform
// ──────────────────────────────────────────────

/// Registro agregado de um dispositivo em um ciclo de envio.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AggregateRecord {
    /// Número do ciclo de envio (global, começa em 1)
    #[serde(rename = "invionumero")]
    pub flush_sequence: u64,
    #[serde(rename = "cabina")]
    pub cabin: Option<u32>,
    #[serde(rename = "ponte")]
    pub deck: Option<u32>,
    /// Média das temperaturas, arredondada
    #[serde(rename = "temperatura")]
    pub temperature: f64,
    /// Média das umidades, arredondada
    #[serde(rename = "umidita")]
    pub humidity: f64,
    /// Epoch (segundos) do ciclo
    #[serde(rename = "dateora")]
    pub timestamp: u64,
    /// Identidade do DA (`IDENTITA_GIOT`)
    #[serde(rename = "identita")]
    pub aggregator: String,
    /// Identidade do DC de origem
    #[serde(rename = "dc")]
    pub device: String,
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
