use std::{cmp::Ordering, collections::BTreeMap};

use crate::error::DataError;

pub fn mean(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    Some(data.iter().sum::<f64>() / data.len() as f64)
}

/// Standard deviation with an `n - 1` denominator
pub fn sample_std(data: &[f64]) -> Option<f64> {
    if data.len() < 2 {
        return None;
    }
    let mean = mean(data)?;
    let var = data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (data.len() - 1) as f64;
    Some(var.sqrt())
}

pub fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 || !denominator.is_finite() || !numerator.is_finite() {
        return None;
    }
    Some(numerator / denominator)
}

/// Items processed per second, undefined for a non-positive elapsed time
pub fn throughput(count: f64, seconds: f64) -> Option<f64> {
    if seconds <= 0.0 {
        return None;
    }
    ratio(count, seconds)
}

/// Share of reads in a read/write mix, in percent
pub fn read_percent(reads: f64, writes: f64) -> Option<f64> {
    if reads < 0.0 || writes < 0.0 {
        return None;
    }
    ratio(100.0 * reads, reads + writes)
}

/// Slower time over faster time of a run that measured exactly two modes.
pub fn paired_speedup(times: &[f64]) -> Result<f64, DataError> {
    let [a, b] = times else {
        return Err(DataError::NotPaired(times.len()));
    };
    let (faster, slower) = if a <= b { (*a, *b) } else { (*b, *a) };
    if faster <= 0.0 || !faster.is_finite() {
        return Err(DataError::NonPositive {
            what: "Run time",
            value: faster,
        });
    }
    Ok(slower / faster)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearFit {
    pub fn at(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Ordinary least squares line through `points`
pub fn linear_fit(points: &[(f64, f64)]) -> Result<LinearFit, DataError> {
    if points.len() < 2 {
        return Err(DataError::InsufficientPoints {
            needed: 2,
            got: points.len(),
        });
    }
    let n = points.len() as f64;
    let x_mean = points.iter().map(|p| p.0).sum::<f64>() / n;
    let y_mean = points.iter().map(|p| p.1).sum::<f64>() / n;
    let (cov, var) = points.iter().fold((0.0, 0.0), |(cov, var), (x, y)| {
        let dx = x - x_mean;
        (cov + dx * (y - y_mean), var + dx * dx)
    });
    if var == 0.0 {
        return Err(DataError::DegenerateFit(x_mean));
    }
    let slope = cov / var;
    Ok(LinearFit {
        slope,
        intercept: y_mean - slope * x_mean,
    })
}

/// Float wrapper usable as an ordered grouping key
#[derive(Debug, Clone, Copy)]
pub struct F64Key(pub f64);

impl PartialEq for F64Key {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for F64Key {}

impl PartialOrd for F64Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for F64Key {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

pub fn group_by_key<T, K, F>(items: impl IntoIterator<Item = T>, key: F) -> BTreeMap<K, Vec<T>>
where
    K: Ord,
    F: Fn(&T) -> K,
{
    let mut groups: BTreeMap<K, Vec<T>> = BTreeMap::new();
    for item in items {
        groups.entry(key(&item)).or_default().push(item);
    }
    groups
}

/// Mean of `value` per key, ascending by key. Undefined values are left out
/// of the mean and keys without any defined value are dropped.
pub fn group_mean<T, K, F, V>(items: &[T], key: F, value: V) -> Vec<(K, f64)>
where
    K: Ord,
    F: Fn(&T) -> K,
    V: Fn(&T) -> Option<f64>,
{
    group_by_key(items.iter(), |item| key(item))
        .into_iter()
        .filter_map(|(k, rows)| {
            let values = rows.into_iter().filter_map(&value).collect::<Vec<_>>();
            mean(&values).map(|m| (k, m))
        })
        .collect()
}
