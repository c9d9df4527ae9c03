//! Sessão do DC: parâmetros iniciais e loop de envio.

use crate::generator::ReadingGenerator;
use crate::sensor::Sensor;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use nave_core::protocol::{FrameReader, ProtocolError, decode_params, write_frame};
use nave_core::types::InitialParams;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info};

/// Erros fatais da sessão.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("DA fechou a conexão antes dos parâmetros iniciais")]
    ServerClosed,

    #[error("Parâmetros iniciais inválidos: {0}")]
    InvalidParams(ProtocolError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Resumo de uma sessão encerrada por interrupção.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub params: InitialParams,
    pub readings_sent: u64,
}

/// O que fazer com um CTRL+C.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    /// Ainda sem parâmetros (conectando ou na fila do DA): sair já.
    ExitNow,
    /// Loop de envio avisado; encerra após a leitura em curso.
    Signalled,
    /// Aviso anterior ainda pendente: forçar a saída.
    Force,
}

/// Decide a reação a um CTRL+C conforme a fase da sessão.
///
/// `streaming` só fica `true` depois que os parâmetros chegam; antes disso
/// a sessão está bloqueada numa leitura que o canal não acorda.
pub fn on_interrupt(streaming: &AtomicBool, shutdown: &Sender<()>) -> Interrupt {
    if !streaming.load(Ordering::SeqCst) {
        return Interrupt::ExitNow;
    }
    match shutdown.try_send(()) {
        Ok(()) => Interrupt::Signalled,
        Err(_) => Interrupt::Force,
    }
}

/// Lê os parâmetros iniciais (bloqueante). Qualquer falha é fatal.
pub fn receive_params<S: Read>(frames: &mut FrameReader<S>) -> Result<InitialParams, SessionError> {
    let line = frames.read_frame()?.ok_or(SessionError::ServerClosed)?;
    let params = decode_params(&line).map_err(SessionError::InvalidParams)?;
    info!(
        "Parâmetros do DA: leitura a cada {}s, {} casas decimais",
        params.collection_interval_secs, params.precision
    );
    Ok(params)
}

/// Executa a sessão até `shutdown` sinalizar ou o socket falhar.
///
/// A espera entre leituras é `recv_timeout` no canal de encerramento,
/// então uma interrupção acorda a sessão imediatamente. `streaming` passa a
/// `true` assim que os parâmetros iniciais são aceitos.
pub fn run<S, T>(
    stream: S,
    generator: &mut ReadingGenerator<T>,
    shutdown: &Receiver<()>,
    streaming: &AtomicBool,
) -> Result<SessionSummary, SessionError>
where
    S: Read + Write,
    T: Sensor,
{
    let mut frames = FrameReader::new(stream);
    let params = receive_params(&mut frames)?;
    streaming.store(true, Ordering::SeqCst);
    let interval = Duration::from_secs(params.collection_interval_secs);

    let mut readings_sent = 0;
    loop {
        let reading = generator.collect(params.precision);
        let sent = write_frame(frames.get_mut(), &reading)?;
        readings_sent += 1;

        info!(
            "→ #{} {} bytes | cabina {} ponte {} | {}°C {}%",
            reading.observation.sequence,
            sent,
            reading.cabin,
            reading.deck,
            reading.observation.temperature,
            reading.observation.humidity,
        );

        match shutdown.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => continue,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                debug!("Encerramento solicitado");
                break;
            }
        }
    }

    Ok(SessionSummary {
        params,
        readings_sent,
    })
}
