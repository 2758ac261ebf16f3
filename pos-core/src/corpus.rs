//! # Corpus anotado no formato CoNLL (treebank METU-Sabancı)
//!
//! O treebank chega como texto puro: uma linha por registro, colunas separadas
//! por TAB, sentenças separadas por linha em branco.
//!
//! ```text
//! 1	Peşreve	peşrev	Noun	Noun	A3sg|Pnon|Dat	2	OBJECT	_	_
//! 2	başlamalı	başla	Verb	Verb	Pos|Neces|A3sg	0	ROOT	_	_
//! ```
//!
//! Só interessam a 2ª coluna (forma superficial) e a 4ª (tag POS grossa).
//! Registros cuja palavra é o marcador `_` (continuação de derivação,
//! expressões multipalavra) são descartados.

use serde::Serialize;
use tracing::{info, warn};

use crate::error::PosError;

/// Marcador de registro elidido na coluna da palavra.
pub const PLACEHOLDER: &str = "_";

const WORD_COLUMN: usize = 1;
const TAG_COLUMN: usize = 3;
const MIN_COLUMNS: usize = TAG_COLUMN + 1;

/// Uma sentença etiquetada: pares (palavra, tag) em ordem.
///
/// `words` e `tags` têm sempre o mesmo comprimento; por isso os campos são
/// privados e só crescem aos pares via [`TaggedSentence::push`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaggedSentence {
    words: Vec<String>,
    tags: Vec<String>,
}

impl TaggedSentence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Constrói a sentença a partir de pares `(palavra, tag)`.
    pub fn from_pairs<W: Into<String>, T: Into<String>>(pairs: impl IntoIterator<Item = (W, T)>) -> Self {
        let mut sentence = Self::new();
        for (word, tag) in pairs {
            sentence.push(word, tag);
        }
        sentence
    }

    pub fn push(&mut self, word: impl Into<String>, tag: impl Into<String>) {
        self.words.push(word.into());
        self.tags.push(tag.into());
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Itera sobre os pares `(palavra, tag)`.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.words.iter().map(String::as_str).zip(self.tags.iter().map(String::as_str))
    }
}

/// Palavras da sentença unidas por espaço.
pub fn sentence_text(sentence: &TaggedSentence) -> String {
    sentence.words().join(" ")
}

/// Tags da sentença unidas por espaço.
pub fn tag_text(sentence: &TaggedSentence) -> String {
    sentence.tags().join(" ")
}

/// Linha do treebank que não pôde ser interpretada.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MalformedRecord {
    /// Linha (base 1) no texto de entrada.
    pub line: usize,
    /// Quantidade de colunas encontradas.
    pub columns: usize,
}

impl From<MalformedRecord> for PosError {
    fn from(record: MalformedRecord) -> Self {
        PosError::MalformedRecord {
            line: record.line,
            columns: record.columns,
            expected: MIN_COLUMNS,
        }
    }
}

/// Resultado do parsing: as sentenças e as linhas descartadas.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ParsedCorpus {
    pub sentences: Vec<TaggedSentence>,
    pub malformed: Vec<MalformedRecord>,
}

/// Converte o texto do treebank em sentenças etiquetadas.
///
/// Linhas malformadas são puladas e contadas em [`ParsedCorpus::malformed`];
/// nunca produzem pares com campos indefinidos. Um bloco cujos registros
/// foram todos elididos vira uma sentença vazia.
pub fn parse_corpus(text: &str) -> ParsedCorpus {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut parsed = ParsedCorpus::default();
    let mut current = TaggedSentence::new();
    let mut in_block = false;

    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            if in_block {
                parsed.sentences.push(std::mem::take(&mut current));
                in_block = false;
            }
            continue;
        }

        in_block = true;
        match parse_record(line, idx + 1) {
            Ok(Some((word, tag))) => current.push(word, tag),
            Ok(None) => {}
            Err(record) => {
                warn!(line = record.line, columns = record.columns, "registro malformado ignorado");
                parsed.malformed.push(record);
            }
        }
    }

    if in_block {
        parsed.sentences.push(current);
    }

    info!(
        sentences = parsed.sentences.len(),
        malformed = parsed.malformed.len(),
        "treebank convertido em corpus"
    );
    parsed
}

/// Como [`parse_corpus`], mas falha no primeiro registro malformado.
pub fn parse_corpus_strict(text: &str) -> Result<Vec<TaggedSentence>, PosError> {
    let parsed = parse_corpus(text);
    match parsed.malformed.into_iter().next() {
        Some(record) => Err(record.into()),
        None => Ok(parsed.sentences),
    }
}

/// Interpreta uma linha: `Ok(None)` quando a palavra é o marcador `_`.
fn parse_record(line: &str, line_number: usize) -> Result<Option<(&str, &str)>, MalformedRecord> {
    let columns: Vec<&str> = line.split('\t').collect();
    if columns.len() < MIN_COLUMNS {
        return Err(MalformedRecord { line: line_number, columns: columns.len() });
    }

    let word = columns[WORD_COLUMN];
    if word == PLACEHOLDER {
        return Ok(None);
    }
    Ok(Some((word, columns[TAG_COLUMN])))
}

/// Serializa sentenças de volta no formato CoNLL de 10 colunas.
///
/// Lema, traços e dependências não são preservados pelo parser e saem como `_`.
pub fn to_conll(sentences: &[TaggedSentence]) -> String {
    let mut out = String::new();
    for (i, sentence) in sentences.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        for (id, (word, tag)) in sentence.pairs().enumerate() {
            out.push_str(&format!("{}\t{}\t_\t{}\t{}\t_\t_\t_\t_\t_\n", id + 1, word, tag, tag));
        }
    }
    out
}

/// Sentenças curtas em turco, etiquetadas com as tags grossas do METU-Sabancı.
const DEMO_SENTENCES: &[&[(&str, &str)]] = &[
    &[("Ali", "Noun"), ("okula", "Noun"), ("gitti", "Verb"), (".", "Punc")],
    &[("Ayşe", "Noun"), ("kitap", "Noun"), ("okudu", "Verb"), (".", "Punc")],
    &[("Bu", "Det"), ("ev", "Noun"), ("çok", "Adv"), ("güzel", "Adj"), (".", "Punc")],
    &[("Ben", "Pron"), ("hızlı", "Adv"), ("koştum", "Verb"), (".", "Punc")],
    &[("Çocuklar", "Noun"), ("bahçede", "Noun"), ("oynuyor", "Verb"), (".", "Punc")],
    &[("O", "Pron"), ("yeni", "Adj"), ("bir", "Det"), ("araba", "Noun"), ("aldı", "Verb"), (".", "Punc")],
    &[("Kedi", "Noun"), ("süt", "Noun"), ("içti", "Verb"), (".", "Punc")],
    &[("Biz", "Pron"), ("dün", "Adv"), ("sinemaya", "Noun"), ("gittik", "Verb"), (".", "Punc")],
    &[("Hava", "Noun"), ("çok", "Adv"), ("soğuk", "Adj"), (".", "Punc")],
    &[("Annem", "Noun"), ("ve", "Conj"), ("babam", "Noun"), ("geldi", "Verb"), (".", "Punc")],
    &[("Öğretmen", "Noun"), ("derse", "Noun"), ("geç", "Adv"), ("kaldı", "Verb"), (".", "Punc")],
    &[("Bu", "Det"), ("kitap", "Noun"), ("çok", "Adv"), ("ilginç", "Adj"), (".", "Punc")],
    &[("Sen", "Pron"), ("nereye", "Adv"), ("gidiyorsun", "Verb"), ("?", "Punc")],
    &[("Ahmet", "Noun"), ("iki", "Num"), ("elma", "Noun"), ("yedi", "Verb"), (".", "Punc")],
    &[("Köpek", "Noun"), ("hızlı", "Adv"), ("koştu", "Verb"), (".", "Punc")],
    &[("Güzel", "Adj"), ("bir", "Det"), ("gün", "Noun"), (".", "Punc")],
    &[("Onlar", "Pron"), ("okula", "Noun"), ("gitti", "Verb"), (".", "Punc")],
    &[("Deniz", "Noun"), ("çok", "Adv"), ("mavi", "Adj"), (".", "Punc")],
    &[("Ali", "Noun"), ("ile", "Conj"), ("Ayşe", "Noun"), ("konuştu", "Verb"), (".", "Punc")],
    &[("Ben", "Pron"), ("kitap", "Noun"), ("okudum", "Verb"), (".", "Punc")],
];

/// Sentença com um grupo flexional derivado: a primeira linha tem `_` como
/// palavra e deve ser descartada pelo parser.
const DEMO_DERIVED_BLOCK: &str = "1\t_\tgel\tVerb\tVerb\tPos\t2\tDERIV\t_\t_\n\
2\tgelen\t_\tAdj\tAPresPart\t_\t3\tMODIFIER\t_\t_\n\
3\tadam\tadam\tNoun\tNoun\tA3sg|Pnon|Nom\t4\tSUBJECT\t_\t_\n\
4\toturdu\totur\tVerb\tVerb\tPos|Past|A3sg\t0\tSENTENCE\t_\t_\n\
5\t.\t.\tPunc\tPunc\t_\t4\tROOT\t_\t_\n";

/// Treebank de demonstração (21 sentenças) no formato CoNLL.
pub fn demo_treebank() -> String {
    let sentences: Vec<TaggedSentence> = DEMO_SENTENCES
        .iter()
        .map(|pairs| TaggedSentence::from_pairs(pairs.iter().copied()))
        .collect();
    let mut text = to_conll(&sentences);
    text.push('\n');
    text.push_str(DEMO_DERIVED_BLOCK);
    text
}
