//! Configuração do DA (`parametri.conf`) e do DC (`configurazionedc.conf`).
//!
//! Os arquivos `.conf` originais são JSON; arquivos `.toml` também são
//! aceitos com as mesmas chaves. Qualquer erro de leitura, parse ou
//! validação é fatal na inicialização.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::types::InitialParams;

/// Nome padrão do arquivo de configuração do DA.
pub const AGGREGATOR_CONFIG_FILE: &str = "parametri.conf";
/// Nome padrão do arquivo de configuração do DC.
pub const COLLECTOR_CONFIG_FILE: &str = "configurazionedc.conf";

/// Casas decimais máximas aceitas.
pub const MAX_PRECISION: u32 = 10;

/// Erros de configuração.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Erro ao ler {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Erro ao parsear {}: {reason}", .path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("Configuração inválida em {}: {}", .path.display(), .problems.join("; "))]
    Invalid { path: PathBuf, problems: Vec<String> },
}

fn default_archive() -> PathBuf {
    PathBuf::from("IOTP").join("iotdata.dbt")
}

fn default_cipher_key() -> String {
    "GIOT".into()
}

/// Configuração do Data Aggregator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AggregatorConfig {
    /// Intervalo de leitura repassado aos DC (segundos)
    #[serde(rename = "TEMPO_RILEVAZIONE")]
    pub collection_interval_secs: u64,
    /// Casas decimais das médias
    #[serde(rename = "N_DECIMALI")]
    pub precision: u32,
    /// Identidade do DA nos registros enviados
    #[serde(rename = "IDENTITA_GIOT")]
    pub identity: String,
    /// Intervalo entre envios (minutos)
    #[serde(rename = "TEMPO_INVIO")]
    pub flush_interval_mins: u64,
    /// IP de escuta
    #[serde(rename = "IP_SERVER")]
    pub listen_ip: String,
    /// Porta TCP de escuta
    #[serde(rename = "PORTA_SERVER")]
    pub listen_port: u16,
    /// Arquivo local dos registros (relativo ao diretório da configuração)
    #[serde(rename = "ARCHIVIO", default = "default_archive")]
    pub archive: PathBuf,
    /// Chave da cifragem do envio
    #[serde(rename = "CHIAVE_CIFRATURA", default = "default_cipher_key")]
    pub cipher_key: String,
}

impl AggregatorConfig {
    /// Carrega e valida a configuração.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config: Self = load_document(path)?;
        check(path, config.validate())?;
        info!("Configuração do DA carregada de {}", path.display());
        Ok(config)
    }

    /// `parametri.conf` ao lado do executável.
    pub fn default_path() -> PathBuf {
        exe_dir().join(AGGREGATOR_CONFIG_FILE)
    }

    /// Intervalo de envio convertido para segundos.
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_mins.saturating_mul(60))
    }

    /// Parâmetros enviados a cada DC na conexão.
    pub fn initial_params(&self) -> InitialParams {
        InitialParams {
            collection_interval_secs: self.collection_interval_secs,
            precision: self.precision,
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.listen_ip, self.listen_port)
    }

    /// Caminho do arquivo local, resolvido contra `config_dir` se relativo.
    pub fn archive_path(&self, config_dir: &Path) -> PathBuf {
        if self.archive.is_absolute() {
            self.archive.clone()
        } else {
            config_dir.join(&self.archive)
        }
    }

    /// Leituras esperadas por dispositivo em uma janela de envio.
    pub fn samples_per_window(&self) -> usize {
        let secs = self.flush_interval().as_secs();
        let per_window = secs / self.collection_interval_secs.max(1);
        usize::try_from(per_window).unwrap_or(usize::MAX).saturating_add(1)
    }

    /// Valida a configuração e retorna lista de erros.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.listen_port == 0 {
            errors.push("PORTA_SERVER não pode ser 0".into());
        }
        if self.collection_interval_secs == 0 {
            errors.push("TEMPO_RILEVAZIONE deve ser maior que 0".into());
        }
        if self.precision > MAX_PRECISION {
            errors.push(format!(
                "N_DECIMALI inválido: {} (0–{MAX_PRECISION})",
                self.precision
            ));
        }
        if self.identity.trim().is_empty() {
            errors.push("IDENTITA_GIOT não pode ser vazia".into());
        }
        if self.cipher_key.is_empty() {
            errors.push("CHIAVE_CIFRATURA não pode ser vazia".into());
        }

        errors
    }
}

/// Configuração do Data Collector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectorConfig {
    /// IP do DA
    #[serde(rename = "IPServer")]
    pub server_ip: String,
    /// Porta TCP do DA
    #[serde(rename = "portaServer")]
    pub server_port: u16,
    #[serde(rename = "cabina")]
    pub cabin: u32,
    #[serde(rename = "ponte")]
    pub deck: u32,
    /// Nome do sensor
    #[serde(rename = "sensore")]
    pub sensor: String,
    /// Identidade do DC (chave do buffer no DA)
    #[serde(rename = "identita")]
    pub identity: String,
}

impl CollectorConfig {
    /// Carrega e valida a configuração.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config: Self = load_document(path)?;
        check(path, config.validate())?;
        info!("Configuração do DC carregada de {}", path.display());
        Ok(config)
    }

    /// `configurazionedc.conf` ao lado do executável.
    pub fn default_path() -> PathBuf {
        exe_dir().join(COLLECTOR_CONFIG_FILE)
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_ip, self.server_port)
    }

    /// Valida a configuração e retorna lista de erros.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.server_port == 0 {
            errors.push("portaServer não pode ser 0".into());
        }
        if self.server_ip.trim().is_empty() {
            errors.push("IPServer não pode ser vazio".into());
        }
        if self.identity.trim().is_empty() {
            errors.push("identita não pode ser vazia".into());
        }

        errors
    }
}

/// Lê um documento chave–valor: TOML se a extensão for `.toml`, senão JSON.
pub fn load_document<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let parsed = if path.extension().is_some_and(|ext| ext == "toml") {
        toml::from_str(&content).map_err(|e| e.to_string())
    } else {
        serde_json::from_str(&content).map_err(|e| e.to_string())
    };

    parsed.map_err(|reason| ConfigError::Parse {
        path: path.to_path_buf(),
        reason,
    })
}

fn check(path: &Path, problems: Vec<String>) -> Result<(), ConfigError> {
    if problems.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            path: path.to_path_buf(),
            problems,
        })
    }
}

fn exe_dir() -> PathBuf {
    std::env::current_exe()
        .map(|p| p.parent().unwrap_or(Path::new(".")).to_path_buf())
        .unwrap_or_else(|_| PathBuf::from("."))
}
