//! Cross-tabulation of ground-truth labels (e.g. vowel categories)
//! against assigned cluster labels, normalized per ground-truth value.

use std::{borrow::Cow, collections::BTreeMap, fmt::Display};

use genawaiter::rc::Gen;

use crate::{
    cluster::ClusterLabel,
    error::PipelineError,
    tables::table_view::{ColumnFormatting, ColumnHeader, Highlight, Named, TableView, Unit},
};

#[derive(Debug, Clone, PartialEq)]
pub struct ContingencyTable<T: Ord, P: Ord> {
    /// truth -> predicted -> count; only pairs that occur are present
    counts: BTreeMap<T, BTreeMap<P, usize>>,
    /// truth -> count
    totals: BTreeMap<T, usize>,
    /// All predicted values that occur, in order
    predicted: Vec<P>,
}

/// Count how the rows of each `truth` value spread over the
/// `predicted` values. The two sequences describe the same rows and
/// must have equal length.
pub fn contingency_table<T, P>(truth: &[T], predicted: &[P]) -> Result<ContingencyTable<T, P>, PipelineError>
where
    T: Ord + Clone,
    P: Ord + Clone,
{
    if truth.len() != predicted.len() {
        return Err(PipelineError::LengthMismatch {
            what: "ground truth vs. predicted labels",
            left: truth.len(),
            right: predicted.len(),
        });
    }
    let mut counts: BTreeMap<T, BTreeMap<P, usize>> = BTreeMap::new();
    let mut totals: BTreeMap<T, usize> = BTreeMap::new();
    let mut predicted_values: BTreeMap<P, ()> = BTreeMap::new();
    for (t, p) in truth.iter().zip(predicted) {
        *counts
            .entry(t.clone())
            .or_default()
            .entry(p.clone())
            .or_insert(0) += 1;
        *totals.entry(t.clone()).or_insert(0) += 1;
        predicted_values.insert(p.clone(), ());
    }
    Ok(ContingencyTable {
        counts,
        totals,
        predicted: predicted_values.into_keys().collect(),
    })
}

impl<T: Ord, P: Ord> ContingencyTable<T, P> {
    /// The ground-truth values present, ascending.
    pub fn truth_labels(&self) -> impl Iterator<Item = &T> {
        self.totals.keys()
    }

    /// The predicted values present, ascending.
    pub fn predicted_labels(&self) -> &[P] {
        &self.predicted
    }

    /// Number of rows counted.
    pub fn total(&self) -> usize {
        self.totals.values().sum()
    }

    pub fn truth_total(&self, truth: &T) -> usize {
        self.totals.get(truth).copied().unwrap_or(0)
    }

    pub fn count(&self, truth: &T, predicted: &P) -> usize {
        self.counts
            .get(truth)
            .and_then(|row| row.get(predicted))
            .copied()
            .unwrap_or(0)
    }

    /// The fraction of the rows with value `truth` that were assigned
    /// `predicted`. None if `truth` does not occur.
    pub fn fraction(&self, truth: &T, predicted: &P) -> Option<f64> {
        let total = self.truth_total(truth);
        if total == 0 {
            return None;
        }
        Some(self.count(truth, predicted) as f64 / total as f64)
    }

    /// Fractions for every predicted value (including zeros), in the
    /// order of `predicted_labels`. Sums to 1.
    pub fn row(&self, truth: &T) -> Option<Vec<f64>> {
        let total = self.truth_total(truth);
        if total == 0 {
            return None;
        }
        Some(
            self.predicted
                .iter()
                .map(|p| self.count(truth, p) as f64 / total as f64)
                .collect(),
        )
    }

    /// The predicted value most rows of `truth` went to; ties go to
    /// the lowest value.
    pub fn dominant(&self, truth: &T) -> Option<&P> {
        let row = self.counts.get(truth)?;
        let mut best: Option<(&P, usize)> = None;
        for (p, n) in row {
            match best {
                Some((_, b)) if b >= *n => (),
                _ => best = Some((p, *n)),
            }
        }
        best.map(|(p, _)| p)
    }
}

/// Predicted values that stand for "in no cluster".
pub trait NoiseLabel {
    fn is_noise(&self) -> bool;
}

impl NoiseLabel for ClusterLabel {
    fn is_noise(&self) -> bool {
        *self == ClusterLabel::Noise
    }
}

impl<'t, T, P> TableView for Named<'t, ContingencyTable<T, P>>
where
    T: Ord + Display,
    P: Ord + Display + NoiseLabel,
{
    fn table_name(&self) -> Cow<'_, str> {
        self.name.as_ref().into()
    }

    fn table_view_header(&self) -> Box<dyn AsRef<[ColumnHeader]>> {
        let mut header: Vec<ColumnHeader> = vec![(
            "category".into(),
            Unit::None,
            ColumnFormatting::String,
        )];
        for p in &self.inner.predicted {
            header.push((
                Cow::Owned(p.to_string()),
                Unit::Fraction,
                ColumnFormatting::Number,
            ));
        }
        header.push(("n".into(), Unit::Count, ColumnFormatting::Number));
        Box::new(header)
    }

    fn table_view_body<'s>(
        &'s self,
    ) -> Box<dyn Iterator<Item = Cow<'s, [(Cow<'s, str>, Highlight)]>> + 's> {
        let table: &'s ContingencyTable<T, P> = self.inner;
        Box::new(
            Gen::new(|co| async move {
                for (truth, total) in &table.totals {
                    let dominant = table.dominant(truth);
                    let mut vals: Vec<(Cow<'s, str>, Highlight)> =
                        vec![(Cow::Owned(truth.to_string()), Highlight::Neutral)];
                    for p in &table.predicted {
                        let n = table.count(truth, p);
                        let highlight = if n == 0 {
                            Highlight::Muted
                        } else if p.is_noise() {
                            Highlight::Noise
                        } else if dominant == Some(p) {
                            Highlight::Dominant
                        } else {
                            Highlight::Neutral
                        };
                        let fraction = n as f64 / *total as f64;
                        vals.push((Cow::Owned(format!("{fraction:.3}")), highlight));
                    }
                    vals.push((Cow::Owned(total.to_string()), Highlight::Neutral));
                    co.yield_(vals.into()).await;
                }
            })
            .into_iter(),
        )
    }
}
