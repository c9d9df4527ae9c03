//! Sessão do DA: loop de accept serial e loop de recepção por conexão.
//!
//! Só um DC é atendido por vez: o próximo `accept` acontece apenas depois
//! que a conexão atual termina. Não há timeout de leitura, então um DC
//! conectado e mudo bloqueia o DA até desconectar.

use crate::pipeline::Pipeline;
use nave_core::buffer::DeviceRegistry;
use nave_core::flush::{FlushCycle, FlushScheduler};
use nave_core::protocol::{FrameReader, ProtocolError, decode_reading, write_frame};
use nave_core::types::{InitialParams, ReceivedReading};
use std::io::{Read, Write};
use std::net::TcpListener;
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Estado do DA que sobrevive às conexões.
pub struct AggregatorState {
    pub devices: DeviceRegistry,
    pub scheduler: FlushScheduler,
}

impl AggregatorState {
    pub fn new(devices: DeviceRegistry, scheduler: FlushScheduler) -> Self {
        Self { devices, scheduler }
    }

    /// Acumula a leitura e avalia a janela de envio.
    pub fn ingest(&mut self, reading: &ReceivedReading, now: SystemTime) -> Option<FlushCycle> {
        self.devices.record(
            reading.identity(),
            reading.cabin,
            reading.deck,
            reading.temperature(),
            reading.humidity(),
        );
        self.scheduler.poll(now, &mut self.devices)
    }
}

/// Motivo do fim de uma conexão.
#[derive(Debug)]
pub enum ConnectionEnd {
    /// DC fechou a conexão (fim de stream)
    PeerClosed,
    /// Erro de I/O ou linha acima do limite
    Failed(ProtocolError),
}

/// Contadores de uma conexão.
#[derive(Debug)]
pub struct ConnectionReport {
    pub readings: u64,
    pub malformed: u64,
    pub flushes: u64,
    pub end: ConnectionEnd,
}

/// Atende conexões para sempre, uma de cada vez.
pub fn serve(
    listener: &TcpListener,
    params: &InitialParams,
    state: &mut AggregatorState,
    pipeline: &mut Pipeline,
) {
    loop {
        match listener.accept() {
            Ok((stream, addr)) => {
                let peer = addr.to_string();
                info!("DC conectado: {peer}");
                let report = handle_connection(stream, &peer, params, state, pipeline);
                match &report.end {
                    ConnectionEnd::PeerClosed => info!(
                        "DC desconectado: {peer} ({} leituras, {} malformadas, {} envios)",
                        report.readings, report.malformed, report.flushes
                    ),
                    ConnectionEnd::Failed(e) => warn!(
                        "Conexão com {peer} encerrada por erro: {e} ({} leituras)",
                        report.readings
                    ),
                }
            }
            Err(e) => warn!("Erro no accept: {e}"),
        }
    }
}

/// Atende uma conexão até o DC desconectar.
///
/// Envia os parâmetros iniciais, depois processa uma linha por vez:
/// linhas malformadas são descartadas sem fechar a conexão.
pub fn handle_connection<S: Read + Write>(
    mut stream: S,
    peer: &str,
    params: &InitialParams,
    state: &mut AggregatorState,
    pipeline: &mut Pipeline,
) -> ConnectionReport {
    let mut report = ConnectionReport {
        readings: 0,
        malformed: 0,
        flushes: 0,
        end: ConnectionEnd::PeerClosed,
    };

    if let Err(e) = write_frame(&mut stream, params) {
        report.end = ConnectionEnd::Failed(e);
        return report;
    }

    let mut frames = FrameReader::new(stream);
    loop {
        let line = match frames.read_frame() {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                report.end = ConnectionEnd::Failed(e);
                break;
            }
        };

        if line.is_empty() {
            debug!("Linha vazia de {peer}, ignorando");
            continue;
        }

        let reading = match decode_reading(&line) {
            Ok(reading) => reading,
            Err(e) => {
                report.malformed += 1;
                warn!("Recebido não-JSON de {peer}: {line:?} ({e})");
                continue;
            }
        };

        report.readings += 1;
        debug!("Recebido de {peer}: {reading:?}");

        if let Some(cycle) = state.ingest(&reading, SystemTime::now()) {
            let sent = pipeline.dispatch(&cycle);
            debug!(
                "Envio #{}: {} cifrado(s), {} arquivado(s)",
                cycle.sequence, sent.forwarded, sent.archived
            );
            report.flushes += 1;
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tests::memory_pipeline;
    use nave_core::protocol::MAX_FRAME_LEN;
    use nave_core::types::{Observation, Reading};
    use std::io::{self, BufRead, BufReader, Cursor};
    use std::net::TcpStream;
    use std::sync::atomic::Ordering;
    use std::time::{Duration, UNIX_EPOCH};

    const PARAMS: InitialParams = InitialParams {
        collection_interval_secs: 5,
        precision: 2,
    };

    /// Stream em memória: entrada fixa, saída capturada.
    struct MockStream {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl MockStream {
        fn new(input: &[u8]) -> Self {
            Self {
                input: Cursor::new(input.to_vec()),
                output: Vec::new(),
            }
        }
    }

    impl Read for MockStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for MockStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Janela que nunca expira durante o teste.
    fn idle_state() -> AggregatorState {
        AggregatorState::new(
            DeviceRegistry::new(0),
            FlushScheduler::new(Duration::from_secs(3600), SystemTime::now(), 2, "GIOT-1"),
        )
    }

    /// Janela já expirada: a primeira leitura dispara um envio.
    fn expired_state() -> AggregatorState {
        AggregatorState::new(
            DeviceRegistry::new(0),
            FlushScheduler::new(Duration::from_secs(3600), UNIX_EPOCH, 2, "GIOT-1"),
        )
    }

    fn reading_line(identity: &str, seq: u64, temperature: f64, humidity: f64) -> String {
        let reading = Reading {
            cabin: 3,
            deck: 2,
            sensor: "DHT22".into(),
            identity: identity.into(),
            observation: Observation {
                sequence: seq,
                temperature,
                humidity,
            },
        };
        format!("{}\n", serde_json::to_string(&reading).unwrap())
    }

    #[test]
    fn sends_params_first() {
        let (mut pipeline, ..) = memory_pipeline();
        let mut state = idle_state();
        let mut stream = MockStream::new(b"");
        handle_connection(&mut stream, "teste", &PARAMS, &mut state, &mut pipeline);
        assert_eq!(
            stream.output,
            b"{\"TEMPO_RILEVAZIONE\":5,\"N_DECIMALI\":2}\n"
        );
    }

    #[test]
    fn malformed_line_is_skipped_and_connection_continues() {
        let (mut pipeline, ..) = memory_pipeline();
        let mut state = idle_state();
        let input = format!("not-json\n{}", reading_line("D1", 1, 20.0, 50.0));
        let mut stream = MockStream::new(input.as_bytes());

        let report = handle_connection(&mut stream, "teste", &PARAMS, &mut state, &mut pipeline);
        assert_eq!(report.malformed, 1);
        assert_eq!(report.readings, 1);
        assert!(matches!(report.end, ConnectionEnd::PeerClosed));

        let buffer = state.devices.get("D1").unwrap();
        assert_eq!(buffer.temperatures(), &[20.0]);
        assert_eq!(buffer.humidities(), &[50.0]);
    }

    #[test]
    fn blank_lines_are_ignored() {
        let (mut pipeline, ..) = memory_pipeline();
        let mut state = idle_state();
        let input = format!("\n  \n{}", reading_line("D1", 1, 20.0, 50.0));
        let mut stream = MockStream::new(input.as_bytes());

        let report = handle_connection(&mut stream, "teste", &PARAMS, &mut state, &mut pipeline);
        assert_eq!(report.malformed, 0);
        assert_eq!(report.readings, 1);
    }

    #[test]
    fn disconnect_without_readings_emits_nothing() {
        let (mut pipeline, archive, uplink, count) = memory_pipeline();
        let mut state = expired_state();
        let mut stream = MockStream::new(b"");

        let report = handle_connection(&mut stream, "teste", &PARAMS, &mut state, &mut pipeline);
        assert!(matches!(report.end, ConnectionEnd::PeerClosed));
        assert_eq!(report.readings, 0);
        assert!(state.devices.is_empty());
        assert!(archive.borrow().is_empty());
        assert!(uplink.borrow().is_empty());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn expired_window_flushes_on_next_reading() {
        let (mut pipeline, archive, uplink, count) = memory_pipeline();
        let mut state = expired_state();
        let input = format!(
            "{}{}",
            reading_line("D1", 1, 20.0, 50.0),
            reading_line("D1", 2, 22.0, 52.0)
        );
        let mut stream = MockStream::new(input.as_bytes());

        let report = handle_connection(&mut stream, "teste", &PARAMS, &mut state, &mut pipeline);
        assert_eq!(report.flushes, 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        let archived = archive.borrow();
        assert_eq!(archived.len(), 1);
        assert_eq!(archived[0].flush_sequence, 1);
        assert_eq!(archived[0].temperature, 20.0);
        assert_eq!(archived[0].device, "D1");
        assert_eq!(uplink.borrow().len(), 1);

        // A segunda leitura caiu na nova janela
        assert_eq!(state.devices.get("D1").unwrap().temperatures(), &[22.0]);
    }

    #[test]
    fn oversized_line_closes_connection() {
        let (mut pipeline, ..) = memory_pipeline();
        let mut state = idle_state();
        let input = vec![b'x'; MAX_FRAME_LEN + 10];
        let mut stream = MockStream::new(&input);

        let report = handle_connection(&mut stream, "teste", &PARAMS, &mut state, &mut pipeline);
        assert!(matches!(
            report.end,
            ConnectionEnd::Failed(ProtocolError::FrameTooLong(_))
        ));
    }

    #[test]
    fn ingest_scenario_three_readings() {
        let mut state = idle_state();
        let now = SystemTime::now();
        for (seq, (t, h)) in [(20.0, 50.0), (22.0, 52.0), (21.0, 51.0)].into_iter().enumerate() {
            let line = reading_line("D1", seq as u64 + 1, t, h);
            let reading = decode_reading(line.trim_end()).unwrap();
            assert!(state.ingest(&reading, now).is_none());
        }
        let cycle = state
            .ingest(&decode_reading("{\"identita\":\"D1\"}").unwrap(), now + Duration::from_secs(3600))
            .unwrap();
        assert_eq!(cycle.records[0].temperature, 21.0);
        assert_eq!(cycle.records[0].humidity, 51.0);
    }

    #[test]
    fn reconnect_resumes_same_buffer_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (mut pipeline, ..) = memory_pipeline();
        let mut state = idle_state();

        let client = std::thread::spawn(move || {
            for seq in 1..=2u64 {
                let stream = TcpStream::connect(addr).unwrap();
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut params = String::new();
                reader.read_line(&mut params).unwrap();
                assert_eq!(params, "{\"TEMPO_RILEVAZIONE\":5,\"N_DECIMALI\":2}\n");

                let mut writer = stream;
                writer
                    .write_all(reading_line("D1", seq, 20.0 + seq as f64, 50.0).as_bytes())
                    .unwrap();
                // Fecha a conexão ao sair do escopo
            }
        });

        for _ in 0..2 {
            let (stream, peer) = listener.accept().unwrap();
            let report = handle_connection(
                stream,
                &peer.to_string(),
                &PARAMS,
                &mut state,
                &mut pipeline,
            );
            assert!(matches!(report.end, ConnectionEnd::PeerClosed));
            assert_eq!(report.readings, 1);
        }
        client.join().unwrap();

        assert_eq!(state.devices.len(), 1);
        let buffer = state.devices.get("D1").unwrap();
        assert_eq!(buffer.temperatures(), &[21.0, 22.0]);
        assert_eq!(buffer.cabin, Some(3));
    }

    /// Lê a linha de parâmetros de uma conexão nova.
    fn read_params(stream: &TcpStream, timeout: Duration) -> io::Result<String> {
        stream.set_read_timeout(Some(timeout))?;
        let mut reader = BufReader::new(stream.try_clone()?);
        let mut line = String::new();
        reader.read_line(&mut line)?;
        Ok(line)
    }

    #[test]
    fn serve_accepts_one_dc_at_a_time_and_survives_failures() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        // Thread fica viva até o fim do processo de teste
        std::thread::spawn(move || {
            let (mut pipeline, ..) = memory_pipeline();
            let mut state = idle_state();
            serve(&listener, &PARAMS, &mut state, &mut pipeline);
        });

        let params = "{\"TEMPO_RILEVAZIONE\":5,\"N_DECIMALI\":2}\n";
        let wait = Duration::from_secs(5);

        // A é atendido; B fica na fila sem parâmetros
        let first = TcpStream::connect(addr).unwrap();
        assert_eq!(read_params(&first, wait).unwrap(), params);

        let queued = TcpStream::connect(addr).unwrap();
        let blocked = read_params(&queued, Duration::from_millis(300)).unwrap_err();
        assert!(matches!(
            blocked.kind(),
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
        ));

        // A desconecta: B é atendido
        drop(first);
        assert_eq!(read_params(&queued, wait).unwrap(), params);

        // Linha acima do limite encerra B com erro; o accept continua
        let mut writer = queued;
        let _ = writer.write_all(&vec![b'x'; MAX_FRAME_LEN + 16]);
        let _ = writer.flush();

        let last = TcpStream::connect(addr).unwrap();
        assert_eq!(read_params(&last, wait).unwrap(), params);
        drop(writer);
    }
}
