//! # Nave Collector (DC)
//!
//! Simula o sensor de uma cabine: conecta ao DA via TCP, recebe os
//! parâmetros de leitura e envia uma medida de temperatura/umidade a cada
//! `TEMPO_RILEVAZIONE` segundos.
//!
//! ## Uso
//! ```bash
//! nave_collector                          # configurazionedc.conf ao lado do executável
//! nave_collector /etc/nave/dc-cabina3.conf
//! ```

mod generator;
mod sensor;
mod session;

use generator::ReadingGenerator;
use nave_core::config::CollectorConfig;
use sensor::SimulatedSensor;
use session::Interrupt;
use std::net::TcpStream;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
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
        .unwrap_or_else(CollectorConfig::default_path);
    let config = match CollectorConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    // ── Encerramento (CTRL+C) ──
    // Antes dos parâmetros sai na hora; no loop, o primeiro sinal encerra
    // após a leitura em curso e o segundo força a saída
    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
    let streaming = Arc::new(AtomicBool::new(false));
    let phase = Arc::clone(&streaming);
    if let Err(e) = ctrlc::set_handler(move || match session::on_interrupt(&phase, &shutdown_tx) {
        Interrupt::ExitNow => {
            println!();
            println!("DC encerrado pelo teclado.");
            println!("Leituras enviadas: 0");
            std::process::exit(0);
        }
        Interrupt::Signalled => {}
        Interrupt::Force => std::process::exit(130),
    }) {
        warn!("Não foi possível instalar handler de CTRL+C: {e}");
    }

    // ── Conexão TCP ──
    let server_addr = config.server_addr();
    let stream = match TcpStream::connect(&server_addr) {
        Ok(stream) => stream,
        Err(e) => {
            error!("Falha ao conectar em {server_addr}: {e}");
            return ExitCode::FAILURE;
        }
    };
    info!("Conectado ao DA em {server_addr}");

    // ── Banner ──
    println!();
    println!("══════════════════════════════════════════════");
    println!("   DATA COLLECTOR – ATIVO");
    println!("══════════════════════════════════════════════");
    println!("  DA:         {server_addr}");
    println!("  Identidade: {}", config.identity);
    println!("  Cabine:     {}  Ponte: {}", config.cabin, config.deck);
    println!("  Sensor:     {}", config.sensor);
    println!("══════════════════════════════════════════════");
    println!();

    let mut generator = ReadingGenerator::new(&config, SimulatedSensor::from_entropy());

    match session::run(stream, &mut generator, &shutdown_rx, &streaming) {
        Ok(summary) => {
            println!();
            println!("DC encerrado pelo teclado.");
            println!(
                "Leituras enviadas: {} (a cada {}s)",
                summary.readings_sent, summary.params.collection_interval_secs
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Sessão encerrada após a leitura #{}: {e}", generator.sequence());
            ExitCode::FAILURE
        }
    }
}
