//! Protocolo de linha entre DC e DA.
//!
//! Cada registro é um JSON compacto terminado por um único `\n`:
//!
//! ```text
//! {"TEMPO_RILEVAZIONE":5,"N_DECIMALI":2}\n          DA → DC (uma vez)
//! {"cabina":3,"ponte":2,...,"osservazione":{...}}\n  DC → DA (repetido)
//! ```
//!
//! A leitura é bufferizada e limitada a [`MAX_FRAME_LEN`] bytes por linha.
//! Fim de stream (`Ok(None)`) e registro malformado
//! ([`ProtocolError::Malformed`]) são sinais distintos.

use crate::types::{InitialParams, ReceivedReading};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::{BufRead, BufReader, Read, Write};
use tracing::debug;

/// Delimitador de registro.
pub const DELIMITER: u8 = b'\n';

/// Tamanho máximo de uma linha (sem o `\n`).
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// Erros do protocolo.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Erro de I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("Linha excede {0} bytes sem delimitador")]
    FrameTooLong(usize),

    #[error("Registro malformado: {0}")]
    Malformed(String),

    #[error("Erro de serialização: {0}")]
    Serialize(String),
}

/// Codifica um registro como JSON compacto + `\n`.
pub fn encode_frame<T: Serialize>(value: &T) -> Result<Vec<u8>, ProtocolError> {
    let mut frame =
        serde_json::to_vec(value).map_err(|e| ProtocolError::Serialize(e.to_string()))?;
    frame.push(DELIMITER);
    Ok(frame)
}

/// Codifica e escreve um registro no stream. Retorna os bytes enviados.
pub fn write_frame<W: Write, T: Serialize>(
    writer: &mut W,
    value: &T,
) -> Result<usize, ProtocolError> {
    let frame = encode_frame(value)?;
    writer.write_all(&frame)?;
    writer.flush()?;
    Ok(frame.len())
}

/// Leitor de linhas sobre um stream de bytes.
pub struct FrameReader<R> {
    inner: BufReader<R>,
    max_len: usize,
    buf: Vec<u8>,
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_max_len(inner, MAX_FRAME_LEN)
    }

    pub fn with_max_len(inner: R, max_len: usize) -> Self {
        Self {
            inner: BufReader::new(inner),
            max_len,
            buf: Vec::new(),
        }
    }

    /// Lê a próxima linha.
    ///
    /// - `Ok(Some(texto))`: linha completa, sem `\n`, com espaços aparados
    /// - `Ok(None)`: peer fechou a conexão antes de um `\n`
    /// - `Err(FrameTooLong)`: mais de `max_len` bytes sem delimitador
    pub fn read_frame(&mut self) -> Result<Option<String>, ProtocolError> {
        self.buf.clear();
        let limit = self.max_len as u64 + 1;
        let read = (&mut self.inner)
            .take(limit)
            .read_until(DELIMITER, &mut self.buf)?;

        if self.buf.last() == Some(&DELIMITER) {
            self.buf.pop();
            let text = String::from_utf8_lossy(&self.buf);
            return Ok(Some(text.trim().to_owned()));
        }

        if read == 0 {
            return Ok(None);
        }

        if self.buf.len() > self.max_len {
            return Err(ProtocolError::FrameTooLong(self.max_len));
        }

        debug!("EOF após {} bytes sem delimitador, descartando", self.buf.len());
        Ok(None)
    }

    /// Acesso ao stream subjacente (para escrita em sockets bidirecionais).
    pub fn get_mut(&mut self) -> &mut R {
        self.inner.get_mut()
    }
}

/// Decodifica uma linha recebida pelo DA.
///
/// A linha precisa ser um objeto JSON; os campos internos são tolerantes
/// (ver [`ReceivedReading`]).
pub fn decode_reading(line: &str) -> Result<ReceivedReading, ProtocolError> {
    let value: serde_json::Value =
        serde_json::from_str(line).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
    if !value.is_object() {
        return Err(ProtocolError::Malformed(format!(
            "esperado objeto JSON, recebido {}",
            json_kind(&value)
        )));
    }
    serde_json::from_value(value).map_err(|e| ProtocolError::Malformed(e.to_string()))
}

/// Decodifica os parâmetros iniciais recebidos pelo DC (estrito).
pub fn decode_params(line: &str) -> Result<InitialParams, ProtocolError> {
    decode_strict(line)
}

/// Decodifica uma linha em `T` sem tolerância a campos inválidos.
pub fn decode_strict<T: DeserializeOwned>(line: &str) -> Result<T, ProtocolError> {
    serde_json::from_str(line).map_err(|e| ProtocolError::Malformed(e.to_string()))
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "booleano",
        serde_json::Value::Number(_) => "número",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "objeto",
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Observation, Reading};
    use std::io::Cursor;

    fn sample_reading() -> Reading {
        Reading {
            cabin: 12,
            deck: 4,
            sensor: "SHT31".into(),
            identity: "DC-12-4".into(),
            observation: Observation {
                sequence: 1,
                temperature: 25.5,
                humidity: 60.25,
            },
        }
    }

    #[test]
    fn frame_ends_with_single_newline() {
        let frame = encode_frame(&sample_reading()).unwrap();
        assert_eq!(frame.last(), Some(&b'\n'));
        assert_eq!(frame.iter().filter(|b| **b == b'\n').count(), 1);
        assert!(!frame.contains(&b' '), "JSON deveria ser compacto");
    }

    #[test]
    fn reads_consecutive_frames() {
        let mut bytes = Vec::new();
        write_frame(&mut bytes, &sample_reading()).unwrap();
        bytes.extend_from_slice(b"not-json\n");

        let mut reader = FrameReader::new(Cursor::new(bytes));
        let first = reader.read_frame().unwrap().unwrap();
        let decoded = decode_reading(&first).unwrap();
        assert_eq!(decoded.identity(), "DC-12-4");
        assert_eq!(decoded.temperature(), Some(25.5));

        let second = reader.read_frame().unwrap().unwrap();
        assert_eq!(second, "not-json");
        assert!(reader.read_frame().unwrap().is_none());
    }

    #[test]
    fn empty_stream_is_end_of_stream() {
        let mut reader = FrameReader::new(Cursor::new(Vec::new()));
        assert!(reader.read_frame().unwrap().is_none());
    }

    #[test]
    fn partial_line_at_eof_is_end_of_stream() {
        let mut reader = FrameReader::new(Cursor::new(b"{\"cabina\":1".to_vec()));
        assert!(reader.read_frame().unwrap().is_none());
    }

    #[test]
    fn strips_carriage_return_and_spaces() {
        let mut reader = FrameReader::new(Cursor::new(b"  {\"a\":1}\r\n".to_vec()));
        assert_eq!(reader.read_frame().unwrap().unwrap(), "{\"a\":1}");
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let mut reader = FrameReader::new(Cursor::new(vec![b'a', 0xFF, b'b', b'\n']));
        assert_eq!(reader.read_frame().unwrap().unwrap(), "a\u{FFFD}b");
    }

    #[test]
    fn rejects_oversized_line() {
        let mut reader = FrameReader::with_max_len(Cursor::new(vec![b'x'; 32]), 16);
        assert!(matches!(
            reader.read_frame(),
            Err(ProtocolError::FrameTooLong(16))
        ));
    }

    #[test]
    fn accepts_line_at_exact_limit() {
        let mut bytes = vec![b'x'; 16];
        bytes.push(b'\n');
        let mut reader = FrameReader::with_max_len(Cursor::new(bytes), 16);
        assert_eq!(reader.read_frame().unwrap().unwrap().len(), 16);
    }

    #[test]
    fn non_json_is_malformed() {
        assert!(matches!(
            decode_reading("not-json"),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn non_object_json_is_malformed() {
        assert!(matches!(
            decode_reading("[1,2,3]"),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            decode_reading("42"),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn params_roundtrip() {
        let frame = encode_frame(&InitialParams {
            collection_interval_secs: 5,
            precision: 2,
        })
        .unwrap();
        assert_eq!(frame, b"{\"TEMPO_RILEVAZIONE\":5,\"N_DECIMALI\":2}\n");

        let mut reader = FrameReader::new(Cursor::new(frame));
        let line = reader.read_frame().unwrap().unwrap();
        let params = decode_params(&line).unwrap();
        assert_eq!(params.collection_interval_secs, 5);
        assert_eq!(params.precision, 2);
    }

    #[test]
    fn params_missing_key_is_malformed() {
        assert!(matches!(
            decode_params(r#"{"TEMPO_RILEVAZIONE":5}"#),
            Err(ProtocolError::Malformed(_))
        ));
    }
}
