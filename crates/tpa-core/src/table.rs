//! Ordered technology × year tables.
//!
//! Every bookkeeping series of a run (historical capacity, ledgers, S-curve
//! bounds, cost parameters) is a [`YearTable`]: rows keyed by technology,
//! columns keyed by year, and an explicit default returned for any cell that
//! was never written. Lookups therefore never need an existence check.

use crate::capacity::round4;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct YearTable {
    #[serde(default)]
    default: f64,
    #[serde(default)]
    rows: BTreeMap<String, BTreeMap<i32, f64>>,
}

impl YearTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default(default: f64) -> Self {
        Self {
            default,
            rows: BTreeMap::new(),
        }
    }

    /// Build a single-row table from `(year, value)` pairs.
    pub fn from_row(
        technology: impl Into<String>,
        values: impl IntoIterator<Item = (i32, f64)>,
    ) -> Self {
        let mut table = Self::new();
        table.insert_row(technology, values);
        table
    }

    pub fn insert_row(
        &mut self,
        technology: impl Into<String>,
        values: impl IntoIterator<Item = (i32, f64)>,
    ) {
        self.rows
            .entry(technology.into())
            .or_default()
            .extend(values);
    }

    pub fn default_value(&self) -> f64 {
        self.default
    }

    pub fn get(&self, technology: &str, year: i32) -> f64 {
        self.try_get(technology, year).unwrap_or(self.default)
    }

    /// Stored value without falling back to the default.
    pub fn try_get(&self, technology: &str, year: i32) -> Option<f64> {
        self.rows
            .get(technology)
            .and_then(|row| row.get(&year))
            .copied()
    }

    pub fn set(&mut self, technology: &str, year: i32, value: f64) {
        self.row_entry(technology).insert(year, value);
    }

    /// Add `delta` to a cell, starting from the default when unset.
    pub fn add(&mut self, technology: &str, year: i32, delta: f64) {
        let default = self.default;
        *self.row_entry(technology).entry(year).or_insert(default) += delta;
    }

    /// Ensure a row exists so that [`contains`](Self::contains) reports it.
    pub fn ensure_row(&mut self, technology: &str) {
        self.row_entry(technology);
    }

    pub fn contains(&self, technology: &str) -> bool {
        self.rows.contains_key(technology)
    }

    pub fn row(&self, technology: &str) -> Option<&BTreeMap<i32, f64>> {
        self.rows.get(technology)
    }

    pub fn technologies(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(String::as_str)
    }

    /// Sum of a row over an inclusive year range (defaults for missing cells).
    pub fn sum_over(&self, technology: &str, years: RangeInclusive<i32>) -> f64 {
        years.map(|y| self.get(technology, y)).sum()
    }

    /// Sum of a row over every stored year.
    pub fn row_sum(&self, technology: &str) -> f64 {
        self.rows
            .get(technology)
            .map(|row| row.values().sum())
            .unwrap_or(0.0)
    }

    /// Column sum over a set of technologies.
    pub fn sum_technologies<'a>(
        &self,
        technologies: impl IntoIterator<Item = &'a str>,
        year: i32,
    ) -> f64 {
        technologies.into_iter().map(|t| self.get(t, year)).sum()
    }

    /// Round every stored value to four decimals.
    pub fn round_all(&mut self) {
        for row in self.rows.values_mut() {
            for value in row.values_mut() {
                *value = round4(*value);
            }
        }
    }

    /// Cells holding NaN, as `(technology, year)` pairs.
    pub fn undefined_cells(&self) -> Vec<(String, i32)> {
        self.rows
            .iter()
            .flat_map(|(tech, row)| {
                row.iter()
                    .filter(|(_, v)| v.is_nan())
                    .map(move |(year, _)| (tech.clone(), *year))
            })
            .collect()
    }

    /// Fill `years` in every row by linear interpolation between stored
    /// years; years outside a row's stored range take the nearest value.
    pub fn interpolate_years(&mut self, years: impl IntoIterator<Item = i32> + Clone) {
        for row in self.rows.values_mut() {
            let known: Vec<(i32, f64)> = row
                .iter()
                .filter(|(_, v)| v.is_finite())
                .map(|(y, v)| (*y, *v))
                .collect();
            if known.is_empty() {
                continue;
            }
            for year in years.clone() {
                if row.get(&year).is_some_and(|v| v.is_finite()) {
                    continue;
                }
                row.insert(year, interpolate(&known, year));
            }
        }
    }

    fn row_entry(&mut self, technology: &str) -> &mut BTreeMap<i32, f64> {
        self.rows.entry(technology.to_string()).or_default()
    }
}

fn interpolate(known: &[(i32, f64)], year: i32) -> f64 {
    let (first_year, first_value) = known[0];
    let (last_year, last_value) = known[known.len() - 1];
    if year <= first_year {
        return first_value;
    }
    if year >= last_year {
        return last_value;
    }
    for pair in known.windows(2) {
        let (y0, v0) = pair[0];
        let (y1, v1) = pair[1];
        if year >= y0 && year <= y1 {
            let t = (year - y0) as f64 / (y1 - y0) as f64;
            return v0 + t * (v1 - v0);
        }
    }
    last_value
}
