//! # Pipeline POS — Orquestrador com Eventos Observáveis
//!
//! Coordena os módulos na ordem
//! parsing → divisão → estimação → avaliação, e emite eventos em cada passo
//! via um canal Rust (`mpsc`), permitindo que a camada web acompanhe o
//! progresso.
//!
//! O resultado, [`PipelineReport`], guarda tudo o que a apresentação precisa:
//! tabela de transição, tabela de emissão de uma sentença, matriz de Viterbi
//! e resumo da avaliação. Nada aqui renderiza coisa alguma.

use std::sync::mpsc;
use std::time::Instant;

use rand::Rng;
use serde::Serialize;
use tracing::{error, info};

use crate::config::PosConfig;
use crate::corpus::{parse_corpus, sentence_text, tag_text, MalformedRecord, TaggedSentence};
use crate::error::Result;
use crate::estimator::{estimate, EmissionTable, ParameterTables, TagVocabulary, TransitionTable};
use crate::evaluator::{evaluate, Evaluation, EvaluationSummary};
use crate::split::{split_corpus, JsonFileSplitStore, MemorySplitStore, Split, SplitStore, SplitSummary};
use crate::viterbi::{decode, Decoding};

/// Eventos emitidos pelo pipeline durante o processamento.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum PipelineEvent {
    /// **Passo 1**: treebank convertido em sentenças.
    ParseDone { sentences: usize, malformed: usize },
    /// **Passo 2**: corpus dividido.
    SplitDone { train: usize, test: usize, draws: Vec<usize> },
    /// **Passo 3**: tabelas estimadas.
    TrainingDone { tags: Vec<String>, words: usize },
    /// **Passo 4**: uma sentença de teste decodificada (em ordem).
    SentenceDecoded {
        index: usize,
        sentence: String,
        gold: String,
        predicted: String,
        correct: usize,
        total: usize,
    },
    /// **Conclusão**: resumo da avaliação.
    Done { summary: EvaluationSummary, processing_ms: u64 },
    /// **Falha**: erro irrecuperável.
    Error { message: String },
}

/// Dados de inspeção de uma sentença: emissões e traço do Viterbi.
#[derive(Debug, Clone, Serialize)]
pub struct Inspection {
    pub sentence: TaggedSentence,
    pub emissions: EmissionTable,
    pub decoding: Decoding,
}

/// Tudo o que uma execução produz.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub config: PosConfig,
    pub malformed: Vec<MalformedRecord>,
    pub split: Split,
    pub tables: ParameterTables,
    pub vocab: TagVocabulary,
    pub evaluation: Evaluation,
}

impl PipelineReport {
    pub fn transition_table(&self) -> TransitionTable {
        TransitionTable::new(&self.tables, &self.vocab)
    }

    pub fn emission_table(&self, words: &[String]) -> EmissionTable {
        EmissionTable::new(&self.tables, &self.vocab, words)
    }

    pub fn summary(&self) -> EvaluationSummary {
        self.evaluation.summary()
    }

    pub fn split_summary(&self) -> SplitSummary {
        SplitSummary::new(&self.split)
    }

    /// Decodifica uma sentença avulsa (sem referência).
    pub fn tag(&self, words: &[String]) -> Result<Decoding> {
        decode(&self.tables, &self.vocab, words, None, self.config.emission_floor)
    }

    /// Emissões e matriz de Viterbi da `index`-ésima sentença de teste.
    pub fn inspect_test(&self, index: usize) -> Result<Option<Inspection>> {
        let Some(sentence) = self.split.test.get(index) else {
            return Ok(None);
        };
        let decoding = decode(
            &self.tables,
            &self.vocab,
            sentence.words(),
            Some(sentence.tags()),
            self.config.emission_floor,
        )?;
        Ok(Some(Inspection {
            sentence: sentence.clone(),
            emissions: self.emission_table(sentence.words()),
            decoding,
        }))
    }
}

/// Abre o armazenamento da divisão indicado na configuração.
pub fn open_split_store(config: &PosConfig) -> Box<dyn SplitStore + Send> {
    match &config.split_store_path {
        Some(path) => Box::new(JsonFileSplitStore::new(path)),
        None => Box::new(MemorySplitStore::new()),
    }
}

/// O pipeline principal.
///
/// # Modos de Uso
/// - **Sync**: [`PosPipeline::run`] para scripts e chamadas diretas.
/// - **Streaming**: [`PosPipeline::run_streaming`] para acompanhar cada passo.
#[derive(Debug, Clone, Default)]
pub struct PosPipeline {
    pub config: PosConfig,
}

impl PosPipeline {
    pub fn new(config: PosConfig) -> Self {
        Self { config }
    }

    /// Executa o pipeline completo sobre o texto do treebank.
    pub fn run<R: Rng>(&self, text: &str, store: &mut dyn SplitStore, rng: &mut R) -> Result<PipelineReport> {
        let (tx, _rx) = mpsc::channel();
        self.run_streaming(text, store, rng, tx)
    }

    /// Executa o pipeline enviando eventos de progresso por `tx`.
    ///
    /// # Fluxo de Eventos
    /// 1. `ParseDone`
    /// 2. `SplitDone`
    /// 3. `TrainingDone`
    /// 4. `SentenceDecoded` (uma por sentença de teste)
    /// 5. `Done`, ou `Error` se algo falhar
    pub fn run_streaming<R: Rng>(
        &self,
        text: &str,
        store: &mut dyn SplitStore,
        rng: &mut R,
        tx: mpsc::Sender<PipelineEvent>,
    ) -> Result<PipelineReport> {
        let result = self.run_stages(text, store, rng, &tx);
        if let Err(err) = &result {
            error!(%err, "pipeline interrompido");
            let _ = tx.send(PipelineEvent::Error { message: err.to_string() });
        }
        result
    }

    fn run_stages<R: Rng>(
        &self,
        text: &str,
        store: &mut dyn SplitStore,
        rng: &mut R,
        tx: &mpsc::Sender<PipelineEvent>,
    ) -> Result<PipelineReport> {
        let start = Instant::now();

        // === Passo 1: Parsing ===
        let parsed = parse_corpus(text);
        let _ = tx.send(PipelineEvent::ParseDone {
            sentences: parsed.sentences.len(),
            malformed: parsed.malformed.len(),
        });

        // === Passo 2: Divisão treino/teste ===
        let split = split_corpus(&parsed.sentences, self.config.force_fresh_random, store, rng)?;
        let _ = tx.send(PipelineEvent::SplitDone {
            train: split.train.len(),
            test: split.test.len(),
            draws: split.draws.clone(),
        });

        // === Passo 3: Estimação ===
        let tables = estimate(&split.train, self.config.estimation_mode);
        let vocab = TagVocabulary::from_tables(&tables);
        let _ = tx.send(PipelineEvent::TrainingDone {
            tags: vocab.tags().to_vec(),
            words: tables.vocabulary_size(),
        });

        // === Passo 4: Avaliação ===
        let evaluation = evaluate(&split.test, &tables, &vocab, self.config.emission_floor)?;
        for (result, sentence) in evaluation.sentences.iter().zip(&split.test) {
            let _ = tx.send(PipelineEvent::SentenceDecoded {
                index: result.index,
                sentence: sentence_text(sentence),
                gold: tag_text(sentence),
                predicted: result.predicted.join(" "),
                correct: result.correct,
                total: sentence.len(),
            });
        }

        let processing_ms = start.elapsed().as_millis() as u64;
        info!(processing_ms, "pipeline concluído");
        let _ = tx.send(PipelineEvent::Done { summary: evaluation.summary(), processing_ms });

        Ok(PipelineReport {
            config: self.config.clone(),
            malformed: parsed.malformed,
            split,
            tables,
            vocab,
            evaluation,
        })
    }
}
