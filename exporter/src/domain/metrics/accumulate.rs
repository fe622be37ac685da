//! Per-export series accumulation
//!
//! Merges contributions by signature. Samples stay ordered by timestamp; a
//! second sample at an existing timestamp replaces the first (last write wins).

use std::collections::BTreeMap;

use super::translate::Contribution;
use crate::data::types::{Label, Sample, SeriesSignature, TimeSeries};

#[derive(Debug)]
struct SeriesEntry {
    labels: Vec<Label>,
    samples: Vec<Sample>,
}

#[derive(Debug, Default)]
pub struct SeriesAccumulator {
    series: BTreeMap<SeriesSignature, SeriesEntry>,
    samples: usize,
    overwrites: usize,
}

impl SeriesAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, contribution: Contribution) {
        let Contribution {
            signature,
            labels,
            sample,
        } = contribution;

        let entry = self.series.entry(signature).or_insert_with(|| SeriesEntry {
            labels,
            samples: Vec::new(),
        });

        match entry
            .samples
            .binary_search_by_key(&sample.timestamp_ms, |s| s.timestamp_ms)
        {
            Ok(pos) => {
                entry.samples[pos] = sample;
                self.overwrites += 1;
            }
            Err(pos) => {
                entry.samples.insert(pos, sample);
                self.samples += 1;
            }
        }
    }

    pub fn extend(&mut self, contributions: impl IntoIterator<Item = Contribution>) {
        for contribution in contributions {
            self.add(contribution);
        }
    }

    /// Number of distinct series
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Samples currently held, after overwrites
    pub fn sample_count(&self) -> usize {
        self.samples
    }

    /// Samples replaced by a later one at the same timestamp
    pub fn overwrites(&self) -> usize {
        self.overwrites
    }

    /// Finished series, ordered by signature
    pub fn finish(self) -> Vec<TimeSeries> {
        self.series
            .into_values()
            .map(|entry| TimeSeries {
                labels: entry.labels,
                samples: entry.samples,
            })
            .collect()
    }
}
