//! # Divisão treino/teste
//!
//! Sorteia `round(N/10)` sentenças para teste, uma por vez, removendo cada
//! sorteada do conjunto restante (embaralhamento parcial à la Fisher–Yates).
//! Os índices sorteados são relativos ao conjunto **já encolhido**, por isso
//! a sequência de sorteios só reproduz a divisão quando aplicada na mesma
//! ordem sobre o mesmo corpus.
//!
//! A sequência usada é gravada num [`SplitStore`] sob a chave
//! [`SPLIT_STORE_KEY`] para que a próxima execução possa repetir a divisão.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use rand::Rng;
use serde::Serialize;
use tracing::{info, warn};

use crate::corpus::{sentence_text, tag_text, TaggedSentence};
use crate::error::{PosError, Result};

/// Chave sob a qual a última sequência de sorteios é persistida.
pub const SPLIT_STORE_KEY: &str = "randSequence";

/// Armazenamento chave-valor da sequência de sorteios.
///
/// A ausência da chave é um estado válido ("nenhuma divisão anterior").
pub trait SplitStore {
    fn load(&self, key: &str) -> Result<Option<Vec<usize>>>;
    fn save(&mut self, key: &str, draws: &[usize]) -> Result<()>;
}

/// Armazenamento em memória, útil para testes e execuções efêmeras.
#[derive(Debug, Clone, Default)]
pub struct MemorySplitStore {
    entries: HashMap<String, Vec<usize>>,
}

impl MemorySplitStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SplitStore for MemorySplitStore {
    fn load(&self, key: &str) -> Result<Option<Vec<usize>>> {
        Ok(self.entries.get(key).cloned())
    }

    fn save(&mut self, key: &str, draws: &[usize]) -> Result<()> {
        self.entries.insert(key.to_string(), draws.to_vec());
        Ok(())
    }
}

/// Armazenamento num arquivo JSON (`{"randSequence": [3, 17, ...]}`).
///
/// Arquivo inexistente equivale a um armazenamento vazio.
#[derive(Debug, Clone)]
pub struct JsonFileSplitStore {
    path: PathBuf,
}

impl JsonFileSplitStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn store_error(&self, action: &str, err: impl std::fmt::Display) -> PosError {
        PosError::SplitStore(format!("{action} {}: {err}", self.path.display()))
    }

    fn read_all(&self) -> Result<HashMap<String, Vec<usize>>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let raw = fs::read_to_string(&self.path).map_err(|err| self.store_error("lendo", err))?;
        if raw.trim().is_empty() {
            return Ok(HashMap::new());
        }
        serde_json::from_str(&raw).map_err(|err| self.store_error("interpretando", err))
    }
}

impl SplitStore for JsonFileSplitStore {
    fn load(&self, key: &str) -> Result<Option<Vec<usize>>> {
        Ok(self.read_all()?.remove(key))
    }

    fn save(&mut self, key: &str, draws: &[usize]) -> Result<()> {
        let mut entries = self.read_all()?;
        entries.insert(key.to_string(), draws.to_vec());
        let json = serde_json::to_string_pretty(&entries).map_err(|err| self.store_error("serializando", err))?;
        fs::write(&self.path, json).map_err(|err| self.store_error("gravando", err))
    }
}

/// Partição disjunta do corpus.
#[derive(Debug, Clone, Default)]
pub struct Split {
    pub train: Vec<TaggedSentence>,
    pub test: Vec<TaggedSentence>,
    /// Índices efetivamente sorteados, na ordem de sorteio.
    pub draws: Vec<usize>,
}

/// Quantidade de sentenças de teste: 10% do corpus, arredondado.
pub fn test_size(corpus_len: usize) -> usize {
    (corpus_len as f64 / 10.0).round() as usize
}

/// Divide o corpus em treino e teste sem alterar a entrada.
///
/// Com `force_fresh_random == false` reaproveita a sequência persistida, se
/// houver uma compatível com este corpus; caso contrário sorteia com `rng`.
/// Em ambos os casos a sequência usada é regravada em `store`.
pub fn split_corpus<R: Rng>(
    corpus: &[TaggedSentence],
    force_fresh_random: bool,
    store: &mut dyn SplitStore,
    rng: &mut R,
) -> Result<Split> {
    let k = test_size(corpus.len());

    let previous = if force_fresh_random { None } else { store.load(SPLIT_STORE_KEY)? };
    let replay = previous.filter(|draws| {
        let usable = replays_cleanly(draws, corpus.len(), k);
        if !usable {
            warn!(
                stored = draws.len(),
                needed = k,
                corpus = corpus.len(),
                "sequência de sorteios persistida incompatível; sorteando novamente"
            );
        }
        usable
    });

    let mut pool: Vec<TaggedSentence> = corpus.to_vec();
    let mut test = Vec::with_capacity(k);
    let mut draws = Vec::with_capacity(k);

    for i in 0..k {
        let index = match &replay {
            Some(previous) => previous[i],
            None => rng.gen_range(0..pool.len()),
        };
        draws.push(index);
        test.push(pool.remove(index));
    }

    store.save(SPLIT_STORE_KEY, &draws)?;

    info!(
        train = pool.len(),
        test = test.len(),
        reproduced = replay.is_some(),
        "corpus dividido em treino e teste"
    );

    Ok(Split { train: pool, test, draws })
}

/// Uma sequência só é reaproveitada se tiver `k` índices válidos para o
/// conjunto que encolhe a cada sorteio.
fn replays_cleanly(draws: &[usize], corpus_len: usize, k: usize) -> bool {
    draws.len() >= k && draws.iter().take(k).enumerate().all(|(i, &index)| index < corpus_len - i)
}

/// Visão serializável da divisão, para a camada de apresentação.
#[derive(Debug, Clone, Serialize)]
pub struct SplitSummary {
    pub train: Vec<SentenceLine>,
    pub test: Vec<SentenceLine>,
}

/// Uma sentença como texto: palavras e tags unidas por espaço.
#[derive(Debug, Clone, Serialize)]
pub struct SentenceLine {
    pub sentence: String,
    pub tags: String,
}

impl SentenceLine {
    fn of(sentence: &TaggedSentence) -> Self {
        Self { sentence: sentence_text(sentence), tags: tag_text(sentence) }
    }
}

impl SplitSummary {
    pub fn new(split: &Split) -> Self {
        Self {
            train: split.train.iter().map(SentenceLine::of).collect(),
            test: split.test.iter().map(SentenceLine::of).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn numbered_corpus(n: usize) -> Vec<TaggedSentence> {
        (0..n)
            .map(|i| TaggedSentence::from_pairs([(format!("w{i}"), "Noun")]))
            .collect()
    }

    #[test]
    fn test_split_sizes() {
        for n in [0, 1, 4, 5, 14, 15, 25, 103] {
            let corpus = numbered_corpus(n);
            let mut store = MemorySplitStore::new();
            let mut rng = StdRng::seed_from_u64(7);
            let split = split_corpus(&corpus, true, &mut store, &mut rng).unwrap();

            assert_eq!(split.test.len(), test_size(n));
            assert_eq!(split.train.len() + split.test.len(), n);
            assert_eq!(split.draws.len(), split.test.len());
        }
        assert_eq!(test_size(5), 1);
        assert_eq!(test_size(4), 0);
        assert_eq!(test_size(15), 2);
    }

    #[test]
    fn test_split_is_disjoint_and_input_untouched() {
        let corpus = numbered_corpus(30);
        let mut store = MemorySplitStore::new();
        let mut rng = StdRng::seed_from_u64(1);
        let split = split_corpus(&corpus, true, &mut store, &mut rng).unwrap();

        assert_eq!(corpus.len(), 30);
        let mut seen: Vec<String> = split
            .train
            .iter()
            .chain(split.test.iter())
            .map(sentence_text)
            .collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 30);
    }

    #[test]
    fn test_draw_indices_are_relative_to_shrunk_pool() {
        let corpus = numbered_corpus(20);
        let mut store = MemorySplitStore::new();
        store.save(SPLIT_STORE_KEY, &[0, 0]).unwrap();
        let mut rng = StdRng::seed_from_u64(3);

        let split = split_corpus(&corpus, false, &mut store, &mut rng).unwrap();
        // Sortear 0 duas vezes pega w0 e depois w1, que virou o índice 0.
        assert_eq!(sentence_text(&split.test[0]), "w0");
        assert_eq!(sentence_text(&split.test[1]), "w1");
        assert_eq!(split.train.len(), 18);
    }

    #[test]
    fn test_reproducible_split() {
        let corpus = numbered_corpus(40);
        let mut store = MemorySplitStore::new();
        let mut rng = StdRng::seed_from_u64(11);

        let first = split_corpus(&corpus, true, &mut store, &mut rng).unwrap();
        let second = split_corpus(&corpus, false, &mut store, &mut rng).unwrap();
        let third = split_corpus(&corpus, false, &mut store, &mut rng).unwrap();

        assert_eq!(first.test, second.test);
        assert_eq!(first.train, second.train);
        assert_eq!(second.test, third.test);
        assert_eq!(store.load(SPLIT_STORE_KEY).unwrap(), Some(first.draws));
    }

    #[test]
    fn test_incompatible_stored_sequence_falls_back_to_random() {
        let corpus = numbered_corpus(20);
        let mut store = MemorySplitStore::new();
        // Segundo índice inválido: o conjunto terá 19 sentenças.
        store.save(SPLIT_STORE_KEY, &[5, 19]).unwrap();
        let mut rng = StdRng::seed_from_u64(5);

        let split = split_corpus(&corpus, false, &mut store, &mut rng).unwrap();
        assert_eq!(split.test.len(), 2);
        assert!(split.draws[1] < 19);
    }

    #[test]
    fn test_fresh_random_ignores_and_overwrites_stored_sequence() {
        let corpus = numbered_corpus(20);
        let mut store = MemorySplitStore::new();
        store.save(SPLIT_STORE_KEY, &[0, 0]).unwrap();

        let mut expected_rng = StdRng::seed_from_u64(8);
        let expected: Vec<usize> = (0..2).map(|i| expected_rng.gen_range(0..20 - i)).collect();

        let mut rng = StdRng::seed_from_u64(8);
        let split = split_corpus(&corpus, true, &mut store, &mut rng).unwrap();
        assert_eq!(split.draws, expected);
        assert_eq!(store.load(SPLIT_STORE_KEY).unwrap(), Some(expected));
    }

    #[test]
    fn test_short_stored_sequence_falls_back_to_random() {
        let corpus = numbered_corpus(20);
        let mut store = MemorySplitStore::new();
        // k = 2, mas só há um índice guardado.
        store.save(SPLIT_STORE_KEY, &[3]).unwrap();

        let mut expected_rng = StdRng::seed_from_u64(6);
        let expected: Vec<usize> = (0..2).map(|i| expected_rng.gen_range(0..20 - i)).collect();

        let mut rng = StdRng::seed_from_u64(6);
        let split = split_corpus(&corpus, false, &mut store, &mut rng).unwrap();
        assert_eq!(split.test.len(), 2);
        assert_eq!(split.draws, expected);
        assert_eq!(store.load(SPLIT_STORE_KEY).unwrap(), Some(expected));
    }

    #[test]
    fn test_json_file_store_reports_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("split.json");
        fs::write(&path, "{ nao é json").unwrap();

        let store = JsonFileSplitStore::new(&path);
        let err = store.load(SPLIT_STORE_KEY).unwrap_err();
        assert!(matches!(err, PosError::SplitStore(ref msg) if msg.contains("split.json")));
    }

    #[test]
    fn test_json_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("split.json");

        let mut store = JsonFileSplitStore::new(&path);
        assert_eq!(store.load(SPLIT_STORE_KEY).unwrap(), None);

        store.save(SPLIT_STORE_KEY, &[4, 2, 9]).unwrap();
        let reopened = JsonFileSplitStore::new(&path);
        assert_eq!(reopened.load(SPLIT_STORE_KEY).unwrap(), Some(vec![4, 2, 9]));
    }
}
