// Optional probability model: composer-flavored transition tables.
//
// A `TransitionModel` holds scale-degree and duration transition counts at
// orders 1 to N, plus unigram distributions. Queries use Katz-style backoff:
// the longest context that has a table wins, otherwise the next shorter
// one, down to the unigram. Contexts are keyed as comma-joined strings
// ("5,1") so the tables serialize to plain JSON objects.
//
// The model is advisory. The scorer blends `score_degree` into its weighted
// sum and the rhythm builder re-weights figures with `score_duration`;
// neither lets the model override a hard constraint.
//
// `ModelLibrary::builtin` trains small models from the themes in corpus.rs.
// Tables trained offline on a larger corpus load with `ModelLibrary::load`.

use crate::config::Composer;
use crate::corpus;
use crate::error::{MelodyError, Result};
use crate::meter::Ticks;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::Path;

/// Next value -> count (or weight). Normalized on query.
type TransitionTable<K> = BTreeMap<K, f64>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionModel {
    pub composer: String,
    /// Longest context consulted.
    pub order: usize,
    /// `degree[k]` holds the order-(k+1) degree transitions.
    pub degree: Vec<BTreeMap<String, TransitionTable<u8>>>,
    pub degree_unigram: TransitionTable<u8>,
    /// `duration[k]` holds the order-(k+1) duration transitions.
    pub duration: Vec<BTreeMap<String, TransitionTable<Ticks>>>,
    pub duration_unigram: TransitionTable<Ticks>,
}

impl TransitionModel {
    pub fn empty(composer: &str, order: usize) -> Self {
        let order = order.clamp(1, 3);
        TransitionModel {
            composer: composer.to_string(),
            order,
            degree: vec![BTreeMap::new(); order],
            degree_unigram: TransitionTable::new(),
            duration: vec![BTreeMap::new(); order],
            duration_unigram: TransitionTable::new(),
        }
    }

    /// Count transitions in a set of melodies given as (degree, duration)
    /// pairs.
    pub fn train<'a, I>(composer: &str, order: usize, melodies: I) -> Self
    where
        I: IntoIterator<Item = &'a [(u8, Ticks)]>,
    {
        let mut model = TransitionModel::empty(composer, order);
        for melody in melodies {
            let degrees: Vec<u8> = melody.iter().map(|&(d, _)| d).collect();
            let durations: Vec<Ticks> = melody.iter().map(|&(_, t)| t).collect();
            count_sequence(&mut model.degree, &mut model.degree_unigram, &degrees);
            count_sequence(&mut model.duration, &mut model.duration_unigram, &durations);
        }
        model
    }

    /// Distribution over the next scale degree after `context` (most recent
    /// last). Empty only if the model has never seen a degree.
    pub fn score_degree(&self, context: &[u8]) -> BTreeMap<u8, f64> {
        backoff(&self.degree, &self.degree_unigram, context)
    }

    /// Distribution over the next duration after `context`.
    pub fn score_duration(&self, context: &[Ticks]) -> BTreeMap<Ticks, f64> {
        backoff(&self.duration, &self.duration_unigram, context)
    }
}

fn count_sequence<K: Ord + Copy + Display>(
    orders: &mut [BTreeMap<String, TransitionTable<K>>],
    unigram: &mut TransitionTable<K>,
    seq: &[K],
) {
    for (i, &next) in seq.iter().enumerate() {
        *unigram.entry(next).or_insert(0.0) += 1.0;
        for (k, table) in orders.iter_mut().enumerate() {
            let len = k + 1;
            if i < len {
                break;
            }
            let key = context_key(&seq[i - len..i]);
            *table.entry(key).or_default().entry(next).or_insert(0.0) += 1.0;
        }
    }
}

/// Katz-style lookup: longest matching context first, unigram last.
fn backoff<K: Ord + Copy + Display>(
    orders: &[BTreeMap<String, TransitionTable<K>>],
    unigram: &TransitionTable<K>,
    context: &[K],
) -> BTreeMap<K, f64> {
    let max = orders.len().min(context.len());
    for len in (1..=max).rev() {
        let key = context_key(&context[context.len() - len..]);
        if let Some(table) = orders[len - 1].get(&key) {
            let normalized = normalize(table);
            if !normalized.is_empty() {
                return normalized;
            }
        }
    }
    normalize(unigram)
}

fn normalize<K: Ord + Copy>(table: &TransitionTable<K>) -> BTreeMap<K, f64> {
    let total: f64 = table.values().filter(|v| **v > 0.0).sum();
    if total <= 0.0 {
        return BTreeMap::new();
    }
    table
        .iter()
        .filter(|(_, v)| **v > 0.0)
        .map(|(&k, &v)| (k, v / total))
        .collect()
}

/// Encode a context as a string key for BTreeMap lookup.
fn context_key<K: Display>(context: &[K]) -> String {
    context
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Models keyed by composer name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelLibrary {
    pub models: BTreeMap<String, TransitionModel>,
}

impl ModelLibrary {
    /// Load from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let library: ModelLibrary = serde_json::from_str(&data)?;
        Ok(library)
    }

    /// Train one model per composer from the embedded themes.
    pub fn builtin(order: usize) -> Self {
        let models = Composer::ALL
            .into_iter()
            .map(|composer| {
                let themes = corpus::themes_for(composer);
                let model =
                    TransitionModel::train(composer.name(), order, themes.iter().map(|t| t.notes));
                (composer.name().to_string(), model)
            })
            .collect();
        ModelLibrary { models }
    }

    pub fn get(&self, composer: Composer) -> Result<&TransitionModel> {
        self.models
            .get(composer.name())
            .ok_or_else(|| MelodyError::UnknownComposer(composer.name().to_string()))
    }
}
