//! Buffers de medidas por dispositivo.
//!
//! Um [`DeviceBuffer`] é criado na primeira leitura de uma identidade e
//! nunca é removido: reconexões do mesmo DC continuam acumulando no mesmo
//! buffer.

use std::collections::BTreeMap;

/// Acumulador de um dispositivo entre dois envios.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceBuffer {
    /// Cabine informada na primeira leitura
    pub cabin: Option<u32>,
    /// Ponte informada na primeira leitura
    pub deck: Option<u32>,
    temperatures: Vec<f64>,
    humidities: Vec<f64>,
}

impl DeviceBuffer {
    fn new(cabin: Option<u32>, deck: Option<u32>, capacity: usize) -> Self {
        Self {
            cabin,
            deck,
            temperatures: Vec::with_capacity(capacity),
            humidities: Vec::with_capacity(capacity),
        }
    }

    pub fn temperatures(&self) -> &[f64] {
        &self.temperatures
    }

    pub fn humidities(&self) -> &[f64] {
        &self.humidities
    }

    /// Média das temperaturas; `None` se não houver amostras.
    pub fn mean_temperature(&self) -> Option<f64> {
        mean(&self.temperatures)
    }

    /// Média das umidades; `None` se não houver amostras.
    pub fn mean_humidity(&self) -> Option<f64> {
        mean(&self.humidities)
    }

    pub fn is_empty(&self) -> bool {
        self.temperatures.is_empty() && self.humidities.is_empty()
    }

    /// Esvazia as duas listas, mantendo cabine/ponte.
    pub fn clear(&mut self) {
        self.temperatures.clear();
        self.humidities.clear();
    }
}

/// Média aritmética; `None` para lista vazia.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Conjunto de buffers indexado pela identidade do dispositivo.
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    devices: BTreeMap<String, DeviceBuffer>,
    capacity_hint: usize,
}

impl DeviceRegistry {
    /// `capacity_hint`: amostras esperadas por dispositivo em uma janela.
    pub fn new(capacity_hint: usize) -> Self {
        Self {
            devices: BTreeMap::new(),
            capacity_hint,
        }
    }

    /// Registra uma leitura.
    ///
    /// Identidade nova cria o buffer com a cabine/ponte desta leitura;
    /// para identidades conhecidas cabine/ponte são ignoradas. Medidas
    /// ausentes (não numéricas) são descartadas de forma independente.
    pub fn record(
        &mut self,
        identity: &str,
        cabin: Option<u32>,
        deck: Option<u32>,
        temperature: Option<f64>,
        humidity: Option<f64>,
    ) -> &DeviceBuffer {
        let capacity = self.capacity_hint;
        let buffer = self
            .devices
            .entry(identity.to_owned())
            .or_insert_with(|| DeviceBuffer::new(cabin, deck, capacity));

        if let Some(t) = temperature {
            buffer.temperatures.push(t);
        }
        if let Some(h) = humidity {
            buffer.humidities.push(h);
        }

        buffer
    }

    pub fn get(&self, identity: &str) -> Option<&DeviceBuffer> {
        self.devices.get(identity)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut DeviceBuffer)> {
        self.devices.iter_mut().map(|(id, buf)| (id.as_str(), buf))
    }
}
