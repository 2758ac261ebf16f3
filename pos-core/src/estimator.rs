//! # Estimação dos parâmetros do HMM
//!
//! Implementação clássica de HMM de primeira ordem onde:
//! - **Estados Ocultos**: tags POS (Noun, Verb, Adj, ...) mais as sentinelas `start`/`end`
//! - **Observações**: palavras
//!
//! O estimador aprende, apenas a partir do conjunto de treino:
//! 1. Contagem de tags: `pos_counts[t]`
//! 2. Probabilidade de Transição: P(tag_atual | tag_anterior), incluindo
//!    `start → t` (a sentença começa com `t`) e `t → end` (a sentença termina em `t`)
//! 3. Probabilidade de Emissão: P(palavra | tag)
//!
//! As tabelas são esparsas: transição ausente vale 0 e emissão ausente recebe
//! o piso de suavização no momento da decodificação.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::corpus::TaggedSentence;

/// Sentinela de início de sentença.
pub const START: &str = "start";
/// Sentinela de fim de sentença.
pub const END: &str = "end";
/// Piso aplicado a P(palavra | tag) quando o par nunca foi visto.
pub const DEFAULT_EMISSION_FLOOR: f64 = 1e-6;

type Table = BTreeMap<String, BTreeMap<String, f64>>;
type Counts = BTreeMap<String, BTreeMap<String, usize>>;

/// Como as contagens viram probabilidades.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimationMode {
    /// Frequência relativa: `count(a → b) / count(a)`, dividida uma única vez
    /// ao final. `start` e `end` são tratados como estados comuns, então cada
    /// linha da tabela de transição soma 1.
    #[default]
    RelativeFrequency,
    /// Atualização incremental a cada ocorrência: primeira vez `1 / D`, depois
    /// `(valor · D + 1) / D`. `D` é o tamanho do treino para `start → t` e
    /// `t → end`, e `pos_counts` da tag de origem nos demais casos.
    /// Mantida para comparar resultados com execuções antigas.
    Incremental,
}

/// Tabelas de parâmetros do HMM.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterTables {
    /// `transition[a][b]` = P(b | a).
    pub transition: Table,
    /// `emission[palavra][tag]` = P(palavra | tag).
    pub emission: Table,
    /// Ocorrências de cada tag no treino.
    pub pos_counts: BTreeMap<String, usize>,
    /// Número de sentenças de treino (inclusive vazias).
    pub train_size: usize,
}

impl ParameterTables {
    /// P(to | from), ou 0 quando a transição nunca foi observada.
    pub fn transition_prob(&self, from: &str, to: &str) -> f64 {
        self.transition
            .get(from)
            .and_then(|row| row.get(to))
            .copied()
            .unwrap_or(0.0)
    }

    /// P(word | tag) observada, se existir.
    pub fn emission_prob(&self, word: &str, tag: &str) -> Option<f64> {
        self.emission.get(word).and_then(|row| row.get(tag)).copied()
    }

    /// P(word | tag), trocando ausência (ou zero) por `floor`.
    ///
    /// Palavras desconhecidas ficam com o mesmo peso para todas as tags e a
    /// decisão passa a depender só das transições.
    pub fn emission_or_floor(&self, word: &str, tag: &str, floor: f64) -> f64 {
        match self.emission_prob(word, tag) {
            Some(p) if p > 0.0 => p,
            _ => floor,
        }
    }

    /// Palavras vistas no treino.
    pub fn vocabulary_size(&self) -> usize {
        self.emission.len()
    }
}

/// Estima as tabelas a partir das sentenças de treino.
pub fn estimate(train: &[TaggedSentence], mode: EstimationMode) -> ParameterTables {
    let pos_counts = count_tags(train);

    let (transition, emission) = match mode {
        EstimationMode::RelativeFrequency => relative_frequency(train, &pos_counts),
        EstimationMode::Incremental => incremental(train, &pos_counts),
    };

    let tables = ParameterTables {
        transition,
        emission,
        pos_counts,
        train_size: train.len(),
    };

    info!(
        ?mode,
        sentences = tables.train_size,
        tags = tables.pos_counts.len(),
        words = tables.vocabulary_size(),
        "parâmetros do HMM estimados"
    );
    tables
}

/// Passo 1: contagem exata de cada tag em todo o treino.
fn count_tags(train: &[TaggedSentence]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for sentence in train {
        for tag in sentence.tags() {
            *counts.entry(tag.clone()).or_insert(0) += 1;
        }
    }
    counts
}

fn tag_count(pos_counts: &BTreeMap<String, usize>, tag: &str) -> f64 {
    pos_counts.get(tag).copied().unwrap_or_default().max(1) as f64
}

fn bump(counts: &mut Counts, from: &str, to: &str) {
    *counts
        .entry(from.to_string())
        .or_default()
        .entry(to.to_string())
        .or_insert(0) += 1;
}

fn relative_frequency(train: &[TaggedSentence], pos_counts: &BTreeMap<String, usize>) -> (Table, Table) {
    let mut transitions = Counts::new();
    let mut emissions = Counts::new();
    let mut started = 0usize;

    for sentence in train.iter().filter(|s| !s.is_empty()) {
        let tags = sentence.tags();
        started += 1;

        bump(&mut transitions, START, &tags[0]);
        for pair in tags.windows(2) {
            bump(&mut transitions, &pair[0], &pair[1]);
        }
        bump(&mut transitions, &tags[tags.len() - 1], END);

        for (word, tag) in sentence.pairs() {
            bump(&mut emissions, word, tag);
        }
    }

    let transition = transitions
        .into_iter()
        .map(|(from, row)| {
            let denominator = if from == START { started.max(1) as f64 } else { tag_count(pos_counts, &from) };
            let row = row
                .into_iter()
                .map(|(to, count)| (to, count as f64 / denominator))
                .collect();
            (from, row)
        })
        .collect();

    let emission = emissions
        .into_iter()
        .map(|(word, row)| {
            let row = row
                .into_iter()
                .map(|(tag, count)| {
                    let p = count as f64 / tag_count(pos_counts, &tag);
                    (tag, p)
                })
                .collect();
            (word, row)
        })
        .collect();

    (transition, emission)
}

/// Regra incremental: `1` na primeira ocorrência, `valor · D + 1` nas
/// seguintes; em ambos os casos o resultado é dividido por `D`.
fn update_incremental(table: &mut Table, from: &str, to: &str, denominator: f64) {
    let row = table.entry(from.to_string()).or_default();
    let raw = match row.get(to) {
        None => 1.0,
        Some(value) => value * denominator + 1.0,
    };
    row.insert(to.to_string(), raw / denominator);
}

fn incremental(train: &[TaggedSentence], pos_counts: &BTreeMap<String, usize>) -> (Table, Table) {
    let mut transition = Table::new();
    let mut emission = Table::new();
    let sentences = train.len().max(1) as f64;

    for sentence in train.iter().filter(|s| !s.is_empty()) {
        let tags = sentence.tags();

        update_incremental(&mut transition, START, &tags[0], sentences);
        for pair in tags.windows(2) {
            update_incremental(&mut transition, &pair[0], &pair[1], tag_count(pos_counts, &pair[0]));
        }
        update_incremental(&mut transition, &tags[tags.len() - 1], END, sentences);

        for (word, tag) in sentence.pairs() {
            update_incremental(&mut emission, word, tag, tag_count(pos_counts, tag));
        }
    }

    (transition, emission)
}

/// Conjunto ordenado das tags comuns presentes na tabela de transição.
///
/// As sentinelas nunca fazem parte da lista; [`TagVocabulary::with_sentinels`]
/// as acrescenta nas pontas para formar as linhas da matriz de Viterbi.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagVocabulary {
    tags: Vec<String>,
}

impl TagVocabulary {
    /// Coleta origens e destinos da tabela de transição.
    pub fn from_tables(tables: &ParameterTables) -> Self {
        let seen = tables
            .transition
            .iter()
            .flat_map(|(from, row)| std::iter::once(from).chain(row.keys()));
        Self::from_tags(seen)
    }

    /// Ordena, remove duplicatas e descarta as sentinelas.
    pub fn from_tags<S: AsRef<str>>(tags: impl IntoIterator<Item = S>) -> Self {
        let set: BTreeSet<String> = tags
            .into_iter()
            .map(|t| t.as_ref().to_string())
            .filter(|t| t != START && t != END)
            .collect();
        Self { tags: set.into_iter().collect() }
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// `[start, t1, …, tM, end]`.
    pub fn with_sentinels(&self) -> Vec<String> {
        let mut states = Vec::with_capacity(self.tags.len() + 2);
        states.push(START.to_string());
        states.extend(self.tags.iter().cloned());
        states.push(END.to_string());
        states
    }
}

/// Matriz de transição pronta para exibição.
///
/// Linhas: `start` e as tags comuns. Colunas: as tags comuns e `end`.
/// Transições ausentes aparecem como 0.
#[derive(Debug, Clone, Serialize)]
pub struct TransitionTable {
    pub rows: Vec<String>,
    pub columns: Vec<String>,
    pub values: Vec<Vec<f64>>,
}

impl TransitionTable {
    pub fn new(tables: &ParameterTables, vocab: &TagVocabulary) -> Self {
        let states = vocab.with_sentinels();
        let rows: Vec<String> = states[..states.len() - 1].to_vec();
        let columns: Vec<String> = states[1..].to_vec();
        let values = rows
            .iter()
            .map(|from| columns.iter().map(|to| tables.transition_prob(from, to)).collect())
            .collect();
        Self { rows, columns, values }
    }
}

/// P(palavra | tag) das palavras de uma sentença contra todas as tags.
///
/// Mostra o valor observado, sem piso: pares nunca vistos aparecem como 0.
#[derive(Debug, Clone, Serialize)]
pub struct EmissionTable {
    /// Colunas.
    pub words: Vec<String>,
    /// Linhas.
    pub tags: Vec<String>,
    /// `values[tag][palavra]`.
    pub values: Vec<Vec<f64>>,
}

impl EmissionTable {
    pub fn new(tables: &ParameterTables, vocab: &TagVocabulary, words: &[String]) -> Self {
        let values = vocab
            .tags()
            .iter()
            .map(|tag| {
                words
                    .iter()
                    .map(|word| tables.emission_prob(word, tag).unwrap_or(0.0))
                    .collect()
            })
            .collect();
        Self {
            words: words.to_vec(),
            tags: vocab.tags().to_vec(),
            values,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{demo_treebank, parse_corpus};

    fn two_sentences() -> Vec<TaggedSentence> {
        vec![
            TaggedSentence::from_pairs([("koştu", "Verb")]),
            TaggedSentence::from_pairs([("koştu", "Verb"), ("hızlı", "Adv")]),
        ]
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }

    #[test]
    fn test_two_sentence_example() {
        for mode in [EstimationMode::RelativeFrequency, EstimationMode::Incremental] {
            let tables = estimate(&two_sentences(), mode);
            assert_eq!(tables.pos_counts["Verb"], 2);
            assert_eq!(tables.pos_counts["Adv"], 1);
            assert!(tables.transition_prob("Verb", "Adv") > 0.0);
            assert_eq!(tables.train_size, 2);
        }
    }

    #[test]
    fn test_relative_frequency_values() {
        let tables = estimate(&two_sentences(), EstimationMode::RelativeFrequency);
        assert_close(tables.transition_prob(START, "Verb"), 1.0);
        assert_close(tables.transition_prob("Verb", "Adv"), 0.5);
        assert_close(tables.transition_prob("Verb", END), 0.5);
        assert_close(tables.transition_prob("Adv", END), 1.0);
        assert_close(tables.emission_prob("koştu", "Verb").unwrap(), 1.0);
        assert_close(tables.emission_prob("hızlı", "Adv").unwrap(), 1.0);
    }

    #[test]
    fn test_incremental_values() {
        let tables = estimate(&two_sentences(), EstimationMode::Incremental);
        // start e end usam o número de sentenças como denominador.
        assert_close(tables.transition_prob(START, "Verb"), 1.0);
        assert_close(tables.transition_prob("Verb", END), 0.5);
        assert_close(tables.transition_prob("Adv", END), 0.5);
        assert_close(tables.transition_prob("Verb", "Adv"), 0.5);
        assert_close(tables.emission_prob("koştu", "Verb").unwrap(), 1.0);
    }

    #[test]
    fn test_relative_frequency_rows_sum_to_one() {
        let corpus = parse_corpus(&demo_treebank()).sentences;
        let tables = estimate(&corpus, EstimationMode::RelativeFrequency);

        for (from, row) in &tables.transition {
            let total: f64 = row.values().sum();
            assert!((total - 1.0).abs() < 1e-9, "linha {from} soma {total}");
        }

        // Emissões também: para cada tag, soma sobre as palavras = 1.
        let vocab = TagVocabulary::from_tables(&tables);
        for tag in vocab.tags() {
            let total: f64 = tables.emission.values().filter_map(|row| row.get(tag)).sum();
            assert!((total - 1.0).abs() < 1e-9, "emissões de {tag} somam {total}");
        }
    }

    #[test]
    fn test_incremental_matches_counts_inside_sentences() {
        let corpus = parse_corpus(&demo_treebank()).sentences;
        let exact = estimate(&corpus, EstimationMode::RelativeFrequency);
        let legacy = estimate(&corpus, EstimationMode::Incremental);

        assert_close(exact.transition_prob("Noun", "Verb"), legacy.transition_prob("Noun", "Verb"));
        assert_close(exact.transition_prob(START, "Noun"), legacy.transition_prob(START, "Noun"));
        assert_close(
            exact.emission_prob("kitap", "Noun").unwrap(),
            legacy.emission_prob("kitap", "Noun").unwrap(),
        );

        // Fora das sentenças as regras divergem: `t → end` é relativo a
        // count(t) numa e ao tamanho do treino na outra.
        let exact = estimate(&two_sentences(), EstimationMode::RelativeFrequency);
        let legacy = estimate(&two_sentences(), EstimationMode::Incremental);
        assert_close(exact.transition_prob("Adv", END), 1.0);
        assert_close(legacy.transition_prob("Adv", END), 0.5);
    }

    #[test]
    fn test_missing_lookups_use_defaults() {
        let tables = estimate(&two_sentences(), EstimationMode::RelativeFrequency);
        assert_eq!(tables.transition_prob("Adv", "Verb"), 0.0);
        assert_eq!(tables.transition_prob("Nope", "Verb"), 0.0);
        assert_eq!(tables.emission_prob("yok", "Verb"), None);
        assert_eq!(tables.emission_or_floor("yok", "Verb", DEFAULT_EMISSION_FLOOR), DEFAULT_EMISSION_FLOOR);
        assert_eq!(tables.emission_or_floor("koştu", "Verb", DEFAULT_EMISSION_FLOOR), 1.0);
    }

    #[test]
    fn test_empty_sentences_are_ignored() {
        let mut train = two_sentences();
        train.push(TaggedSentence::new());
        let tables = estimate(&train, EstimationMode::RelativeFrequency);
        assert_eq!(tables.train_size, 3);
        assert_close(tables.transition_prob(START, "Verb"), 1.0);
    }

    #[test]
    fn test_vocabulary_excludes_sentinels() {
        let tables = estimate(&two_sentences(), EstimationMode::RelativeFrequency);
        let vocab = TagVocabulary::from_tables(&tables);
        assert_eq!(vocab.tags(), &["Adv", "Verb"]);
        assert_eq!(vocab.with_sentinels(), vec![START, "Adv", "Verb", END]);

        let empty = TagVocabulary::from_tables(&estimate(&[], EstimationMode::RelativeFrequency));
        assert!(empty.is_empty());
    }

    #[test]
    fn test_display_tables() {
        let train = two_sentences();
        let tables = estimate(&train, EstimationMode::RelativeFrequency);
        let vocab = TagVocabulary::from_tables(&tables);

        let transitions = TransitionTable::new(&tables, &vocab);
        assert_eq!(transitions.rows, vec![START, "Adv", "Verb"]);
        assert_eq!(transitions.columns, vec!["Adv", "Verb", END]);
        assert_close(transitions.values[2][0], 0.5);

        let emissions = EmissionTable::new(&tables, &vocab, train[1].words());
        assert_eq!(emissions.tags, vec!["Adv", "Verb"]);
        assert_eq!(emissions.values[0], vec![0.0, 1.0]);
        assert_eq!(emissions.values[1], vec![1.0, 0.0]);
    }
}
