//! Cifragem do registro enviado à IoT Platform.
//!
//! O conteúdo cifrado é opaco para o resto do sistema. [`XorCipher`] é
//! apenas uma simulação (XOR com chave repetida + hex), sem valor de
//! segurança.

/// Erros de decifragem.
#[derive(Debug, thiserror::Error)]
pub enum CipherError {
    #[error("Texto cifrado não é hex válido: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("Texto decifrado não é UTF-8")]
    Utf8,
}

/// Transforma o JSON do registro em texto opaco.
pub trait Cipher {
    fn encrypt(&self, plain: &str) -> String;
}

/// XOR byte a byte com chave repetida, codificado em hex.
#[derive(Debug, Clone)]
pub struct XorCipher {
    key: Vec<u8>,
}

impl XorCipher {
    pub fn new(key: impl AsRef<[u8]>) -> Self {
        Self {
            key: key.as_ref().to_vec(),
        }
    }

    pub fn decrypt(&self, encrypted: &str) -> Result<String, CipherError> {
        let bytes = self.apply(&hex::decode(encrypted)?);
        String::from_utf8(bytes).map_err(|_| CipherError::Utf8)
    }

    fn apply(&self, data: &[u8]) -> Vec<u8> {
        if self.key.is_empty() {
            return data.to_vec();
        }
        data.iter()
            .zip(self.key.iter().cycle())
            .map(|(b, k)| b ^ k)
            .collect()
    }
}

impl Cipher for XorCipher {
    fn encrypt(&self, plain: &str) -> String {
        hex::encode(self.apply(plain.as_bytes()))
    }
}
