//! # Algoritmo de Viterbi — Decodificação de Sequências de Tags
//!
//! O algoritmo de Viterbi é um método de **programação dinâmica** que encontra
//! a sequência de tags mais provável de forma eficiente.
//!
//! ## Intuição
//!
//! Com M tags possíveis por palavra, uma busca exaustiva custaria `O(M^N)`
//! para N palavras. O Viterbi explora que a **melhor sequência até a palavra j
//! com tag t** depende apenas da **melhor sequência até a palavra j-1 com
//! alguma tag anterior** → `O(N × M²)`.
//!
//! ## Algoritmo
//!
//! As linhas da matriz são `[start, t1, …, tM, end]`; as colunas, as palavras.
//!
//! ```text
//! Inicialização: v[i][0] = P(tag_i | start) · e(w_0, tag_i)
//!
//! Recursão:      v[i][j] = max_{k ≥ 1} v[k][j-1] · P(tag_i | tag_k) · e(w_j, tag_i)
//!
//! Terminação:    melhor linha comum da última coluna, depois backtracking
//! ```
//!
//! `e(w, t)` é P(w | t) com piso de suavização para pares nunca vistos.
//! A linha `start` só participa da coluna 0. Empates ficam com o menor índice.
//!
//! ## Log-space
//!
//! Os produtos são acumulados como somas de logaritmos para não zerar por
//! underflow em sentenças longas. Probabilidade 0 vira `-inf`; a ordem entre
//! os caminhos é a mesma da formulação com produtos.

use std::time::Instant;

use serde::Serialize;
use tracing::debug;

use crate::error::{PosError, Result};
use crate::estimator::{ParameterTables, TagVocabulary};

/// Uma célula da matriz de Viterbi.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViterbiCell {
    /// Tag representada pela linha.
    pub tag: String,
    /// Palavra representada pela coluna.
    pub word: String,
    /// Log da probabilidade máxima de caminho até esta célula.
    pub log_prob: f64,
    /// Linha da coluna anterior que gerou o máximo; `None` na coluna 0.
    pub backpointer: Option<usize>,
}

impl ViterbiCell {
    /// Probabilidade de caminho fora do log-space.
    pub fn prob(&self) -> f64 {
        self.log_prob.exp()
    }
}

/// Matriz M×N completa, para inspeção passo a passo.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViterbiMatrix {
    /// Linhas: `[start, t1, …, tM, end]`.
    pub states: Vec<String>,
    /// Colunas.
    pub words: Vec<String>,
    /// `cells[linha][coluna]`.
    pub cells: Vec<Vec<ViterbiCell>>,
}

/// Score de uma tag numa coluna (para visualização)
#[derive(Debug, Clone, Serialize)]
pub struct TagScore {
    pub tag: String,
    pub log_prob: f64,
    /// Tag da coluna anterior que gerou este score ótimo
    pub best_prev: Option<String>,
}

/// Estado do Viterbi numa coluna (para visualização passo a passo)
#[derive(Debug, Clone, Serialize)]
pub struct ViterbiColumn {
    pub index: usize,
    pub word: String,
    /// Um score por tag comum (sem as sentinelas).
    pub scores: Vec<TagScore>,
    /// A tag com maior score nesta coluna
    pub best_tag: String,
    pub best_log_prob: f64,
}

impl ViterbiMatrix {
    /// Resumo coluna a coluna, só com as linhas de tags comuns.
    pub fn columns(&self) -> Vec<ViterbiColumn> {
        let ordinary = 1..self.states.len().saturating_sub(1);
        (0..self.words.len())
            .map(|j| {
                let scores: Vec<TagScore> = ordinary
                    .clone()
                    .map(|i| {
                        let cell = &self.cells[i][j];
                        TagScore {
                            tag: cell.tag.clone(),
                            log_prob: cell.log_prob,
                            best_prev: cell.backpointer.map(|k| self.states[k].clone()),
                        }
                    })
                    .collect();
                let best = best_row(ordinary.clone().map(|i| self.cells[i][j].log_prob));
                let (best_tag, best_log_prob) = match best {
                    Some(offset) => (scores[offset].tag.clone(), scores[offset].log_prob),
                    None => (String::new(), f64::NEG_INFINITY),
                };
                ViterbiColumn {
                    index: j,
                    word: self.words[j].clone(),
                    scores,
                    best_tag,
                    best_log_prob,
                }
            })
            .collect()
    }
}

/// Resultado da decodificação de uma sentença.
#[derive(Debug, Clone, Serialize)]
pub struct Decoding {
    /// Uma tag atribuída por palavra.
    pub tags: Vec<String>,
    /// Posições em que a tag atribuída coincide com a tag de referência.
    pub correct: usize,
    /// Log da probabilidade do melhor caminho (`0` para sentença vazia).
    pub log_prob: f64,
    /// Linha escolhida em cada coluna.
    pub path: Vec<usize>,
    pub matrix: ViterbiMatrix,
    pub elapsed_us: u64,
}

/// Decodificador ligado a um conjunto de tabelas já estimadas.
///
/// Pré-calcula o log das transições entre todas as linhas; as tabelas são
/// apenas lidas, então um mesmo decodificador pode ser usado por várias
/// threads ao mesmo tempo.
#[derive(Debug)]
pub struct Decoder<'a> {
    tables: &'a ParameterTables,
    states: Vec<String>,
    log_transition: Vec<Vec<f64>>,
    emission_floor: f64,
}

impl<'a> Decoder<'a> {
    pub fn new(tables: &'a ParameterTables, vocab: &TagVocabulary, emission_floor: f64) -> Result<Self> {
        if vocab.is_empty() {
            return Err(PosError::EmptyVocabulary);
        }

        let states = vocab.with_sentinels();
        let log_transition = states
            .iter()
            .map(|from| states.iter().map(|to| tables.transition_prob(from, to).ln()).collect())
            .collect();

        Ok(Self { tables, states, log_transition, emission_floor })
    }

    /// Linhas da matriz: `[start, t1, …, tM, end]`.
    pub fn states(&self) -> &[String] {
        &self.states
    }

    fn log_emissions(&self, word: &str) -> Vec<f64> {
        self.states
            .iter()
            .map(|tag| self.tables.emission_or_floor(word, tag, self.emission_floor).ln())
            .collect()
    }

    /// Decodifica `words`. Se `gold` for informado, conta os acertos.
    ///
    /// As tags de referência nunca influenciam a decodificação.
    pub fn decode(&self, words: &[String], gold: Option<&[String]>) -> Decoding {
        let started = Instant::now();
        let n = words.len();
        let m = self.states.len();

        let mut cells: Vec<Vec<ViterbiCell>> = self
            .states
            .iter()
            .map(|tag| {
                words
                    .iter()
                    .map(|word| ViterbiCell {
                        tag: tag.clone(),
                        word: word.clone(),
                        log_prob: f64::NEG_INFINITY,
                        backpointer: None,
                    })
                    .collect()
            })
            .collect();

        if n == 0 {
            return Decoding {
                tags: Vec::new(),
                correct: 0,
                log_prob: 0.0,
                path: Vec::new(),
                matrix: self.matrix(words, cells),
                elapsed_us: started.elapsed().as_micros() as u64,
            };
        }

        // === Inicialização (coluna 0) ===
        let emissions = self.log_emissions(&words[0]);
        for i in 0..m {
            cells[i][0].log_prob = self.log_transition[0][i] + emissions[i];
        }

        // === Recursão (colunas 1..N-1) ===
        for j in 1..n {
            let emissions = self.log_emissions(&words[j]);
            for i in 0..m {
                // `start` (k = 0) só existe na coluna 0.
                let mut best_prev = 1;
                let mut best_score = f64::NEG_INFINITY;
                for k in 1..m {
                    let score = cells[k][j - 1].log_prob + self.log_transition[k][i];
                    if k == 1 || improves(score, best_score) {
                        best_prev = k;
                        best_score = score;
                    }
                }
                cells[i][j].log_prob = best_score + emissions[i];
                cells[i][j].backpointer = Some(best_prev);
            }
        }

        // === Terminação: melhor linha comum da última coluna ===
        let last = best_row((1..m - 1).map(|i| cells[i][n - 1].log_prob)).map_or(1, |offset| offset + 1);
        let log_prob = cells[last][n - 1].log_prob;

        // === Backtracking ===
        let mut path = vec![0usize; n];
        path[n - 1] = last;
        for j in (1..n).rev() {
            path[j - 1] = cells[path[j]][j].backpointer.unwrap_or(path[j]);
        }

        let tags: Vec<String> = path.iter().map(|&row| self.states[row].clone()).collect();
        let correct = gold.map_or(0, |gold| {
            tags.iter().zip(gold).filter(|(predicted, expected)| predicted == expected).count()
        });

        let elapsed_us = started.elapsed().as_micros() as u64;
        debug!(words = n, correct, log_prob, elapsed_us, "sentença decodificada");

        Decoding {
            tags,
            correct,
            log_prob,
            path,
            matrix: self.matrix(words, cells),
            elapsed_us,
        }
    }

    fn matrix(&self, words: &[String], cells: Vec<Vec<ViterbiCell>>) -> ViterbiMatrix {
        ViterbiMatrix {
            states: self.states.clone(),
            words: words.to_vec(),
            cells,
        }
    }
}

/// Decodifica uma sentença avulsa.
pub fn decode(
    tables: &ParameterTables,
    vocab: &TagVocabulary,
    words: &[String],
    gold: Option<&[String]>,
    emission_floor: f64,
) -> Result<Decoding> {
    Ok(Decoder::new(tables, vocab, emission_floor)?.decode(words, gold))
}

/// Tolerância relativa abaixo da qual dois log-scores contam como empate.
///
/// Caminhos com o mesmo produto podem somar logs que diferem em alguns ulps.
const LOG_TIE_TOLERANCE: f64 = 1e-12;

/// `score` supera `best` por mais que a tolerância de empate.
fn improves(score: f64, best: f64) -> bool {
    if best == f64::NEG_INFINITY {
        return score > best;
    }
    score > best + LOG_TIE_TOLERANCE * best.abs().max(1.0)
}

/// Índice do maior valor; em caso de empate, o primeiro.
fn best_row(scores: impl Iterator<Item = f64>) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, score) in scores.enumerate() {
        match best {
            Some((_, current)) if !improves(score, current) => {}
            _ => best = Some((i, score)),
        }
    }
    best.map(|(i, _)| i)
}
