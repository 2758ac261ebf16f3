//! # Avaliação sobre o conjunto de teste
//!
//! Cada sentença de teste é decodificada de forma independente contra as
//! tabelas (somente leitura), então o laço roda em paralelo com Rayon.
//!
//! Duas medidas principais:
//! - **Acurácia por token**: `100 · tokens corretos / tokens`
//! - **Acurácia por sentença**: `100 · sentenças inteiramente corretas / sentenças`
//!
//! Com conjunto de teste vazio as razões são indefinidas e saem como `None`.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use rayon::prelude::*;
use serde::Serialize;
use tracing::info;

use crate::corpus::TaggedSentence;
use crate::error::Result;
use crate::estimator::{ParameterTables, TagVocabulary};
use crate::viterbi::Decoder;

/// Resultado de uma sentença de teste.
#[derive(Debug, Clone, Serialize)]
pub struct SentenceResult {
    /// Posição da sentença no conjunto de teste.
    pub index: usize,
    pub words: Vec<String>,
    pub gold: Vec<String>,
    pub predicted: Vec<String>,
    pub correct: usize,
}

impl SentenceResult {
    /// A sequência prevista é idêntica à de referência.
    pub fn is_exact(&self) -> bool {
        self.predicted == self.gold
    }
}

/// Contagens de uma tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LabelMeasure {
    /// Previsões corretas.
    pub correct: usize,
    /// Ocorrências na referência.
    pub observed: usize,
    /// Vezes em que a tag foi prevista.
    pub predicted: usize,
}

impl LabelMeasure {
    pub fn precision(&self) -> Option<f64> {
        ratio(self.correct, self.predicted)
    }

    pub fn recall(&self) -> Option<f64> {
        ratio(self.correct, self.observed)
    }

    pub fn fmeasure(&self) -> Option<f64> {
        let (p, r) = (self.precision()?, self.recall()?);
        if p + r > 0.0 {
            Some(2.0 * p * r / (p + r))
        } else {
            Some(0.0)
        }
    }
}

fn ratio(numerator: usize, denominator: usize) -> Option<f64> {
    (denominator > 0).then(|| numerator as f64 / denominator as f64)
}

/// Agregado da avaliação.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Evaluation {
    pub total_tokens: usize,
    pub correct_tokens: usize,
    pub total_sentences: usize,
    pub correct_sentences: usize,
    /// Desempenho por tag.
    pub per_tag: BTreeMap<String, LabelMeasure>,
    pub sentences: Vec<SentenceResult>,
}

impl Evaluation {
    pub fn accumulate(&mut self, result: SentenceResult) {
        for (gold, predicted) in result.gold.iter().zip(&result.predicted) {
            self.per_tag.entry(gold.clone()).or_default().observed += 1;
            self.per_tag.entry(predicted.clone()).or_default().predicted += 1;
            if gold == predicted {
                self.per_tag.entry(gold.clone()).or_default().correct += 1;
            }
        }

        self.total_tokens += result.gold.len();
        self.correct_tokens += result.correct;
        self.total_sentences += 1;
        if result.is_exact() {
            self.correct_sentences += 1;
        }
        self.sentences.push(result);
    }

    /// Percentual de tokens corretos; `None` sem tokens.
    pub fn token_accuracy(&self) -> Option<f64> {
        ratio(self.correct_tokens, self.total_tokens).map(|r| 100.0 * r)
    }

    /// Percentual de sentenças inteiramente corretas; `None` sem sentenças.
    pub fn sentence_accuracy(&self) -> Option<f64> {
        ratio(self.correct_sentences, self.total_sentences).map(|r| 100.0 * r)
    }

    pub fn summary(&self) -> EvaluationSummary {
        EvaluationSummary {
            token_accuracy: self.token_accuracy(),
            sentence_accuracy: self.sentence_accuracy(),
            correct_tokens: self.correct_tokens,
            total_tokens: self.total_tokens,
            correct_sentences: self.correct_sentences,
            total_sentences: self.total_sentences,
        }
    }
}

/// Resumo serializável para a camada de apresentação.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EvaluationSummary {
    pub token_accuracy: Option<f64>,
    pub sentence_accuracy: Option<f64>,
    pub correct_tokens: usize,
    pub total_tokens: usize,
    pub correct_sentences: usize,
    pub total_sentences: usize,
}

fn percent(value: Option<f64>) -> String {
    value.map_or_else(|| "indefinida".to_string(), |v| format!("{v:.4}"))
}

impl Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Desempenho por tag (#corretas, #previstas, #referência) (precisão, revocação, F1):")?;
        for (tag, m) in &self.per_tag {
            match (m.precision(), m.recall(), m.fmeasure()) {
                (Some(p), Some(r), Some(f1)) => writeln!(
                    f,
                    "\t{}: ({}, {}, {}) ({:.4}, {:.4}, {:.4})",
                    tag, m.correct, m.predicted, m.observed, p, r, f1
                )?,
                _ => writeln!(
                    f,
                    "\t{}: ({}, {}, {}) (******, ******, ******)",
                    tag, m.correct, m.predicted, m.observed
                )?,
            }
        }
        writeln!(
            f,
            "Acurácia por token: {}/{} => {}",
            self.correct_tokens,
            self.total_tokens,
            percent(self.token_accuracy())
        )?;
        writeln!(
            f,
            "Acurácia por sentença: {}/{} => {}",
            self.correct_sentences,
            self.total_sentences,
            percent(self.sentence_accuracy())
        )
    }
}

/// Decodifica todo o conjunto de teste e agrega as medidas.
pub fn evaluate(
    test: &[TaggedSentence],
    tables: &ParameterTables,
    vocab: &TagVocabulary,
    emission_floor: f64,
) -> Result<Evaluation> {
    if test.is_empty() {
        info!("conjunto de teste vazio; acurácias indefinidas");
        return Ok(Evaluation::default());
    }

    let decoder = Decoder::new(tables, vocab, emission_floor)?;
    let results: Vec<SentenceResult> = test
        .par_iter()
        .enumerate()
        .map(|(index, sentence)| {
            let decoding = decoder.decode(sentence.words(), Some(sentence.tags()));
            SentenceResult {
                index,
                words: sentence.words().to_vec(),
                gold: sentence.tags().to_vec(),
                predicted: decoding.tags,
                correct: decoding.correct,
            }
        })
        .collect();

    let mut evaluation = Evaluation::default();
    for result in results {
        evaluation.accumulate(result);
    }

    info!(
        sentences = evaluation.total_sentences,
        tokens = evaluation.total_tokens,
        token_accuracy = ?evaluation.token_accuracy(),
        sentence_accuracy = ?evaluation.sentence_accuracy(),
        "avaliação concluída"
    );
    Ok(evaluation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{demo_treebank, parse_corpus};
    use crate::estimator::{estimate, EstimationMode, DEFAULT_EMISSION_FLOOR};

    fn demo_model() -> (Vec<TaggedSentence>, ParameterTables, TagVocabulary) {
        let corpus = parse_corpus(&demo_treebank()).sentences;
        let tables = estimate(&corpus, EstimationMode::RelativeFrequency);
        let vocab = TagVocabulary::from_tables(&tables);
        (corpus, tables, vocab)
    }

    #[test]
    fn test_single_perfect_sentence() {
        let (corpus, tables, vocab) = demo_model();
        let evaluation = evaluate(&corpus[..1], &tables, &vocab, DEFAULT_EMISSION_FLOOR).unwrap();

        assert_eq!(evaluation.token_accuracy(), Some(100.0));
        assert_eq!(evaluation.sentence_accuracy(), Some(100.0));
        assert_eq!(evaluation.total_sentences, 1);
        assert_eq!(evaluation.correct_tokens, corpus[0].len());
    }

    #[test]
    fn test_empty_test_set_is_undefined() {
        let (_, tables, vocab) = demo_model();
        let evaluation = evaluate(&[], &tables, &vocab, DEFAULT_EMISSION_FLOOR).unwrap();
        assert_eq!(evaluation.token_accuracy(), None);
        assert_eq!(evaluation.sentence_accuracy(), None);
        assert!(evaluation.to_string().contains("indefinida"));
    }

    #[test]
    fn test_partial_credit() {
        let (_, tables, vocab) = demo_model();
        // "kitap" só foi visto como Noun; aqui a referência diz Adj.
        let test = vec![
            TaggedSentence::from_pairs([("Ali", "Noun"), ("kitap", "Adj"), ("okudu", "Verb"), (".", "Punc")]),
            TaggedSentence::from_pairs([("Kedi", "Noun"), ("süt", "Noun"), ("içti", "Verb"), (".", "Punc")]),
        ];
        let evaluation = evaluate(&test, &tables, &vocab, DEFAULT_EMISSION_FLOOR).unwrap();

        assert_eq!(evaluation.total_tokens, 8);
        assert_eq!(evaluation.correct_tokens, 7);
        assert_eq!(evaluation.correct_sentences, 1);
        assert_eq!(evaluation.token_accuracy(), Some(87.5));
        assert_eq!(evaluation.sentence_accuracy(), Some(50.0));

        let adj = evaluation.per_tag["Adj"];
        assert_eq!(adj, LabelMeasure { correct: 0, observed: 1, predicted: 0 });
        assert_eq!(adj.precision(), None);
        assert_eq!(adj.recall(), Some(0.0));

        // Resultados seguem a ordem do conjunto de teste.
        assert_eq!(evaluation.sentences[0].index, 0);
        assert_eq!(evaluation.sentences[1].index, 1);
        assert!(!evaluation.sentences[0].is_exact());
    }

    #[test]
    fn test_empty_sentence_does_not_divide_by_zero() {
        let (_, tables, vocab) = demo_model();
        let evaluation = evaluate(&[TaggedSentence::new()], &tables, &vocab, DEFAULT_EMISSION_FLOOR).unwrap();
        assert_eq!(evaluation.total_tokens, 0);
        assert_eq!(evaluation.token_accuracy(), None);
        assert_eq!(evaluation.sentence_accuracy(), Some(100.0));
    }

    #[test]
    fn test_summary_matches_evaluation() {
        let (corpus, tables, vocab) = demo_model();
        let evaluation = evaluate(&corpus, &tables, &vocab, DEFAULT_EMISSION_FLOOR).unwrap();
        let summary = evaluation.summary();
        assert_eq!(summary.total_sentences, corpus.len());
        assert_eq!(summary.token_accuracy, evaluation.token_accuracy());
        assert!(evaluation.to_string().contains("Acurácia por token"));
    }
}
