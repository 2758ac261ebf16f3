//! Configuração de uma execução do pipeline.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::estimator::{EstimationMode, DEFAULT_EMISSION_FLOOR};

/// Parâmetros de uma execução: divisão, estimação e decodificação.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PosConfig {
    /// Ignora a sequência de sorteios persistida e divide o corpus de novo.
    pub force_fresh_random: bool,
    pub estimation_mode: EstimationMode,
    /// Piso de P(palavra | tag) para pares nunca vistos.
    pub emission_floor: f64,
    /// Arquivo JSON da sequência de sorteios; `None` mantém só em memória.
    pub split_store_path: Option<PathBuf>,
}

impl Default for PosConfig {
    fn default() -> Self {
        Self {
            force_fresh_random: false,
            estimation_mode: EstimationMode::default(),
            emission_floor: DEFAULT_EMISSION_FLOOR,
            split_store_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PosConfig = serde_json::from_str(r#"{"estimation_mode": "incremental"}"#).unwrap();
        assert_eq!(config.estimation_mode, EstimationMode::Incremental);
        assert_eq!(config.emission_floor, DEFAULT_EMISSION_FLOOR);
        assert!(!config.force_fresh_random);
        assert_eq!(config.split_store_path, None);
    }
}
