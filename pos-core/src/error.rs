//! # Erros do pipeline POS
//!
//! Apenas condições realmente excepcionais viram erro. Probabilidades ausentes
//! **não** são erro: a transição ausente vale 0 e a emissão ausente recebe o
//! piso de suavização (ver [`crate::estimator::ParameterTables`]).

use thiserror::Error;

/// Erros que podem ocorrer no núcleo do etiquetador.
#[derive(Debug, Error)]
pub enum PosError {
    /// O texto do treebank não pôde ser obtido. Aborta a execução.
    #[error("falha ao obter o corpus de {source_name}: {reason}")]
    CorpusFetch {
        /// Caminho ou URL de origem.
        source_name: String,
        /// Descrição da falha.
        reason: String,
    },

    /// Linha do treebank com menos colunas que o formato exige.
    #[error("registro malformado na linha {line}: {columns} coluna(s), esperado ao menos {expected}")]
    MalformedRecord {
        /// Linha (base 1) no texto original.
        line: usize,
        /// Número de colunas encontradas.
        columns: usize,
        /// Número mínimo de colunas exigido.
        expected: usize,
    },

    /// Falha ao ler ou gravar a sequência de sorteios persistida.
    #[error("falha no armazenamento da divisão treino/teste: {0}")]
    SplitStore(String),

    /// O vocabulário não contém nenhuma tag comum (só sentinelas).
    #[error("vocabulário de tags vazio: treine com ao menos uma sentença não vazia")]
    EmptyVocabulary,
}

/// Alias de `Result` para as operações do crate.
pub type Result<T> = std::result::Result<T, PosError>;
