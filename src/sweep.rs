//! Model selection over the number of clusters: fit one model per
//! candidate count and collect a scalar criterion (lower is better)
//! for each, to look for an "elbow".

use std::{borrow::Cow, ops::RangeInclusive};

use ndarray::ArrayView2;
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::{
    cluster::{AlgorithmConfig, Clusterer},
    error::PipelineError,
    info,
    tables::table_view::{ColumnFormatting, ColumnHeader, Highlight, Named, TableView, Unit},
};

/// A fitted model that reports a quality criterion, lower is
/// better: inertia for k-means, an information criterion for
/// mixtures.
pub trait SelectionCriterion {
    fn criterion_name(&self) -> &'static str;

    fn selection_criterion(&self) -> f64;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepPoint {
    pub count: usize,
    pub criterion: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sweep {
    pub criterion_name: Cow<'static, str>,
    /// Ascending by `count`, one entry per count in the swept range.
    pub points: Vec<SweepPoint>,
}

impl Sweep {
    pub fn criterion_at(&self, count: usize) -> Option<f64> {
        self.points
            .iter()
            .find(|p| p.count == count)
            .map(|p| p.criterion)
    }

    /// Decrease of the criterion from the previous count, for all
    /// points but the first.
    pub fn improvements(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.points
            .windows(2)
            .map(|w| (w[1].count, w[0].criterion - w[1].criterion))
    }

    /// The count reached by the largest single-step improvement;
    /// None with fewer than 2 points.
    pub fn elbow(&self) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (count, improvement) in self.improvements() {
            match best {
                Some((_, b)) if b >= improvement => (),
                _ => best = Some((count, improvement)),
            }
        }
        best.map(|(count, _)| count)
    }
}

/// Fit a model for every count in `counts` via `factory` (in
/// parallel, each fit is independent) and collect their criteria in
/// ascending count order. The first failing fit aborts the sweep.
pub fn criterion_sweep<M, F>(
    counts: RangeInclusive<usize>,
    factory: F,
) -> Result<Sweep, PipelineError>
where
    M: SelectionCriterion,
    F: Fn(usize) -> Result<M, PipelineError> + Sync,
{
    if counts.is_empty() {
        return Err(PipelineError::InvalidConfiguration(format!(
            "empty sweep range {}..={}",
            counts.start(),
            counts.end()
        )));
    }
    let counts: Vec<usize> = counts.collect();
    let results: Vec<(SweepPoint, &'static str)> = counts
        .into_par_iter()
        .map(|count| -> Result<_, PipelineError> {
            let model = factory(count)?;
            Ok((
                SweepPoint {
                    count,
                    criterion: model.selection_criterion(),
                },
                model.criterion_name(),
            ))
        })
        .collect::<Result<_, _>>()?;
    let criterion_name = results
        .first()
        .map(|(_, name)| *name)
        .unwrap_or("criterion");
    info!(
        "swept {} counts, {criterion_name} from {:?}",
        results.len(),
        results.first().map(|(p, _)| p.criterion)
    );
    Ok(Sweep {
        criterion_name: criterion_name.into(),
        points: results.into_iter().map(|(point, _)| point).collect(),
    })
}

/// Sweep the configured algorithm over `counts`, keeping all other
/// parameters. Only for algorithms that take a cluster count.
pub fn sweep_algorithm(
    config: &AlgorithmConfig,
    features: ArrayView2<'_, f64>,
    counts: RangeInclusive<usize>,
) -> Result<Sweep, PipelineError> {
    match config {
        AlgorithmConfig::KMeans(c) => criterion_sweep(counts, |n_clusters| {
            let mut c = c.clone();
            c.n_clusters = n_clusters;
            c.fit(features)
        }),
        AlgorithmConfig::Gmm(c) => criterion_sweep(counts, |n_components| {
            let mut c = c.clone();
            c.n_components = n_components;
            c.fit(features)
        }),
        AlgorithmConfig::Dbscan(_) => Err(PipelineError::InvalidConfiguration(
            "DBSCAN has no cluster count to sweep over".into(),
        )),
    }
}

impl<'t> TableView for Named<'t, Sweep> {
    fn table_name(&self) -> Cow<'_, str> {
        self.name.as_ref().into()
    }

    fn table_view_header(&self) -> Box<dyn AsRef<[ColumnHeader]>> {
        let header: Vec<ColumnHeader> = vec![
            ("clusters".into(), Unit::Count, ColumnFormatting::Number),
            (
                Cow::Owned(self.inner.criterion_name.to_string()),
                Unit::Named("lower is better"),
                ColumnFormatting::Number,
            ),
            (
                "improvement".into(),
                Unit::Named("decrease"),
                ColumnFormatting::Number,
            ),
        ];
        Box::new(header)
    }

    fn table_view_body<'s>(
        &'s self,
    ) -> Box<dyn Iterator<Item = Cow<'s, [(Cow<'s, str>, Highlight)]>> + 's> {
        let elbow = self.inner.elbow();
        let improvements: Vec<Option<f64>> = std::iter::once(None)
            .chain(self.inner.improvements().map(|(_, i)| Some(i)))
            .collect();
        Box::new(
            self.inner
                .points
                .iter()
                .zip(improvements)
                .map(move |(point, improvement)| {
                    let highlight = if Some(point.count) == elbow {
                        Highlight::Dominant
                    } else {
                        Highlight::Neutral
                    };
                    let row: Vec<(Cow<'s, str>, Highlight)> = vec![
                        (point.count.to_string().into(), highlight),
                        (format!("{:.3}", point.criterion).into(), highlight),
                        (
                            improvement
                                .map(|i| format!("{i:.3}"))
                                .unwrap_or_default()
                                .into(),
                            highlight,
                        ),
                    ];
                    row.into()
                }),
        )
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use super::*;

    struct Fixed(f64);

    impl SelectionCriterion for Fixed {
        fn criterion_name(&self) -> &'static str {
            "fixed"
        }

        fn selection_criterion(&self) -> f64 {
            self.0
        }
    }

    #[test]
    fn t_sweep_order_and_elbow() -> Result<()> {
        let values = [100., 20., 15., 12., 11.];
        let sweep = criterion_sweep(1..=5, |k| Ok(Fixed(values[k - 1])))?;
        assert_eq!(sweep.criterion_name, "fixed");
        assert_eq!(
            sweep.points.iter().map(|p| p.count).collect::<Vec<_>>(),
            [1, 2, 3, 4, 5]
        );
        assert_eq!(sweep.criterion_at(3), Some(15.));
        assert_eq!(sweep.criterion_at(7), None);
        assert_eq!(sweep.elbow(), Some(2));
        assert_eq!(
            sweep.improvements().collect::<Vec<_>>(),
            [(2, 80.), (3, 5.), (4, 3.), (5, 1.)]
        );
        Ok(())
    }

    #[test]
    fn t_sweep_errors() {
        let e = criterion_sweep(3..=2, |_| Ok(Fixed(0.))).unwrap_err();
        assert!(e.is_invalid_configuration());

        let e = criterion_sweep(1..=4, |k| {
            if k == 3 {
                Err(PipelineError::InvalidConfiguration("three".into()))
            } else {
                Ok(Fixed(k as f64))
            }
        })
        .unwrap_err();
        assert!(e.is_invalid_configuration());
    }

    #[test]
    fn t_single_point() -> Result<()> {
        let sweep = criterion_sweep(4..=4, |_| Ok(Fixed(1.)))?;
        assert_eq!(sweep.points.len(), 1);
        assert_eq!(sweep.elbow(), None);
        Ok(())
    }

    #[test]
    fn t_table_view() -> Result<()> {
        let values = [100., 20., 15.];
        let sweep = criterion_sweep(1..=3, |k| Ok(Fixed(values[k - 1])))?;
        let view = Named::new("sweep", &sweep);
        let header = view.table_view_header();
        let units: Vec<(String, Unit)> = (*header)
            .as_ref()
            .iter()
            .map(|(title, unit, _)| (title.to_string(), *unit))
            .collect();
        assert_eq!(
            units,
            [
                ("clusters".to_string(), Unit::Count),
                ("fixed".to_string(), Unit::Named("lower is better")),
                ("improvement".to_string(), Unit::Named("decrease")),
            ]
        );
        let rows: Vec<Vec<(String, Highlight)>> = view
            .table_view_body()
            .map(|row| row.iter().map(|(s, h)| (s.to_string(), *h)).collect())
            .collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0][2].0, "");
        assert_eq!(rows[1][1], ("20.000".to_string(), Highlight::Dominant));
        assert_eq!(rows[1][2].0, "80.000");
        Ok(())
    }
}
