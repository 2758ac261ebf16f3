//! # pos-core — Etiquetador Morfossintático (POS) com HMM
//!
//! Este crate implementa um etiquetador de classes gramaticais para o turco,
//! treinado sobre o treebank METU-Sabancı no formato CoNLL. É um **Hidden
//! Markov Model** de primeira ordem, estimado por frequência relativa e
//! decodificado com o algoritmo de Viterbi.
//!
//! ## Arquitetura do Sistema
//!
//! O dado flui e é transformado passo a passo:
//!
//! 1.  **Entrada**: Texto do treebank (String), uma palavra por linha.
//! 2.  **Parsing** ([`corpus`]): Linhas viram sentenças de pares (palavra, tag).
//! 3.  **Divisão** ([`split`]): ~10% das sentenças vão para teste; a sequência
//!     de sorteios é persistida para que a divisão seja reprodutível.
//! 4.  **Estimação** ([`estimator`]): Tabelas de transição `P(tag | tag anterior)`
//!     e de emissão `P(palavra | tag)`, com estados sentinela `start` e `end`.
//! 5.  **Decodificação** ([`viterbi`]): Melhor sequência de tags por sentença.
//! 6.  **Avaliação** ([`evaluator`]): Acurácia por token e por sentença.
//!
//! ## Exemplo de Uso
//!
//! ```rust
//! use pos_core::{corpus::demo_treebank, MemorySplitStore, PosPipeline};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! // 1. Instancia o pipeline com a configuração padrão
//! let pipeline = PosPipeline::default();
//!
//! // 2. Onde a divisão treino/teste fica guardada
//! let mut store = MemorySplitStore::new();
//! let mut rng = StdRng::seed_from_u64(7);
//!
//! // 3. Executa parsing, divisão, estimação e avaliação
//! let report = pipeline.run(&demo_treebank(), &mut store, &mut rng).unwrap();
//!
//! // 4. Exibe o resultado
//! println!("{}", report.evaluation);
//! ```
//!
//! ## Módulos Principais
//!
//! - [`pipeline`]: Orquestrador que conecta todos os estágios.
//! - [`corpus`]: Leitura do formato CoNLL e corpus de demonstração.
//! - [`estimator`]: Contagens e probabilidades do HMM.
//! - [`viterbi`]: Programação dinâmica em log-space.

pub mod config;
pub mod corpus;
pub mod error;
pub mod estimator;
pub mod evaluator;
pub mod pipeline;
pub mod split;
pub mod viterbi;

pub use config::PosConfig;
pub use corpus::{parse_corpus, TaggedSentence};
pub use error::{PosError, Result};
pub use estimator::{estimate, EstimationMode, ParameterTables, TagVocabulary};
pub use evaluator::{evaluate, Evaluation, EvaluationSummary};
pub use pipeline::{open_split_store, PipelineEvent, PipelineReport, PosPipeline};
pub use split::{split_corpus, JsonFileSplitStore, MemorySplitStore, SplitStore};
pub use viterbi::{decode, Decoder, Decoding};
