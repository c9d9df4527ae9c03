//! # Nave Aggregator (DA / GIOT)
//!
//! Servidor TCP que recebe as leituras dos DC, acumula por dispositivo e
//! a cada `TEMPO_INVIO` minutos gera as médias: cifradas para a IoT
//! Platform e em claro no arquivo local `iotdata.dbt`.
//!
//! ## Uso
//! ```bash
//! nave_aggregator                       # parametri.conf ao lado do executável
//! nave_aggregator /etc/nave/parametri.conf
//! ```
//!
//! `CTRL+C` encerra e mostra o número de envios realizados.

mod pipeline;
mod session;

use nave_core::buffer::DeviceRegistry;
use nave_core::cipher::XorCipher;
use nave_core::config::AggregatorConfig;
use nave_core::flush::FlushScheduler;
use nave_core::sink::{ArchiveFile, LogUplink};
use pipeline::Pipeline;
use session::AggregatorState;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;
use tracing::{error, info, warn};

fn main() -> ExitCode {
    // ── Logging ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // ── Carregar config ──
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(AggregatorConfig::default_path);
    let config = match AggregatorConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    let config_dir = config_path.parent().unwrap_or(Path::new("."));

    // ── Arquivo local ──
    let archive_path = config.archive_path(config_dir);
    let archive = match ArchiveFile::open(&archive_path) {
        Ok(archive) => archive,
        Err(e) => {
            error!("Falha ao abrir {}: {e}", archive_path.display());
            return ExitCode::FAILURE;
        }
    };

    // ── Socket TCP ──
    let listen_addr = config.listen_addr();
    let listener = match TcpListener::bind(&listen_addr) {
        Ok(listener) => listener,
        Err(e) => {
            error!("Falha ao escutar em {listen_addr}: {e}");
            return ExitCode::FAILURE;
        }
    };
    info!("DA escutando em {listen_addr}");

    // ── Encerramento (CTRL+C) ──
    let flush_count = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&flush_count);
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("Encerramento do DA pelo teclado.");
        println!("Envios realizados para a IoT Platform: {}", counter.load(Ordering::SeqCst));
        std::process::exit(0);
    }) {
        warn!("Não foi possível instalar handler de CTRL+C: {e}");
    }

    // ── Banner ──
    println!();
    println!("══════════════════════════════════════════════");
    println!("   DATA AGGREGATOR (GIOT) – ATIVO");
    println!("══════════════════════════════════════════════");
    println!("  Escuta:     {listen_addr}");
    println!("  Identidade: {}", config.identity);
    println!("  Leitura DC: {}s", config.collection_interval_secs);
    println!("  Envio:      {} min", config.flush_interval_mins);
    println!("  Arquivo:    {}", archive_path.display());
    println!("══════════════════════════════════════════════");
    println!("  CTRL+C para terminar.");
    println!();

    let mut state = AggregatorState::new(
        DeviceRegistry::new(config.samples_per_window()),
        FlushScheduler::new(
            config.flush_interval(),
            SystemTime::now(),
            config.precision,
            config.identity.clone(),
        ),
    );
    let mut pipeline = Pipeline::new(
        Box::new(XorCipher::new(&config.cipher_key)),
        Box::new(LogUplink::new()),
        Box::new(archive),
        flush_count,
    );

    session::serve(&listener, &config.initial_params(), &mut state, &mut pipeline);
    ExitCode::SUCCESS
}
