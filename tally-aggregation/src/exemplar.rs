//! Exemplar reservoirs kept inside each aggregator handle.

use std::num::NonZeroUsize;

use rand::Rng;
use tally_core::{ExemplarData, ExemplarFilter, ExplicitBucketBoundaries};

/// Storage for sampled measurements of one attribute set.
#[derive(Clone, Debug)]
pub enum ExemplarReservoir {
    /// Keeps nothing
    NoSamples,
    /// Uniform sample of at most `slots.len()` measurements (reservoir sampling)
    FixedSize {
        /// Sampled exemplars
        slots: Vec<Option<ExemplarData>>,
        /// Measurements offered so far
        seen: u64,
    },
    /// The most recent measurement of each histogram bucket
    AlignedHistogramBucket {
        /// Boundaries of the histogram the reservoir belongs to
        boundaries: ExplicitBucketBoundaries,
        /// One slot per bucket
        slots: Vec<Option<ExemplarData>>,
    },
}

impl ExemplarReservoir {
    /// Reservoir sampling `size` measurements
    pub fn fixed_size(size: NonZeroUsize) -> Self {
        Self::FixedSize {
            slots: vec![None; size.get()],
            seen: 0,
        }
    }

    /// Reservoir holding one measurement per bucket of `boundaries`
    pub fn aligned_histogram_bucket(boundaries: ExplicitBucketBoundaries) -> Self {
        let slots = vec![None; boundaries.bucket_count()];
        Self::AlignedHistogramBucket { boundaries, slots }
    }

    /// Offer a measurement
    pub fn offer(&mut self, exemplar: ExemplarData) {
        match self {
            Self::NoSamples => {}
            Self::FixedSize { slots, seen } => {
                *seen += 1;
                let slot = if *seen <= slots.len() as u64 {
                    Some(*seen as usize - 1)
                } else {
                    let candidate = rand::rng().random_range(0..*seen);
                    (candidate < slots.len() as u64).then_some(candidate as usize)
                };
                if let Some(slot) = slot {
                    slots[slot] = Some(exemplar);
                }
            }
            Self::AlignedHistogramBucket { boundaries, slots } => {
                let bucket = boundaries.bucket_index(exemplar.value.as_f64());
                slots[bucket] = Some(exemplar);
            }
        }
    }

    /// The exemplars currently held, without clearing them
    pub fn collect(&self) -> Vec<ExemplarData> {
        match self {
            Self::NoSamples => Vec::new(),
            Self::FixedSize { slots, .. } | Self::AlignedHistogramBucket { slots, .. } => {
                slots.iter().flatten().cloned().collect()
            }
        }
    }
}

/// Which measurements get sampled, and into which kind of reservoir.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ExemplarSampling {
    filter: ExemplarFilter,
    fixed_size: NonZeroUsize,
}

impl ExemplarSampling {
    pub(crate) fn new(filter: ExemplarFilter) -> Self {
        Self {
            filter,
            fixed_size: std::thread::available_parallelism().unwrap_or(NonZeroUsize::MIN),
        }
    }

    pub(crate) fn filter(&self) -> ExemplarFilter {
        self.filter
    }

    pub(crate) fn fixed_size_reservoir(&self) -> ExemplarReservoir {
        match self.filter {
            ExemplarFilter::AlwaysOff => ExemplarReservoir::NoSamples,
            _ => ExemplarReservoir::fixed_size(self.fixed_size),
        }
    }

    pub(crate) fn aligned_reservoir(
        &self,
        boundaries: &ExplicitBucketBoundaries,
    ) -> ExemplarReservoir {
        match self.filter {
            ExemplarFilter::AlwaysOff => ExemplarReservoir::NoSamples,
            _ => ExemplarReservoir::aligned_histogram_bucket(boundaries.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use assert2::check;
    use tally_core::{Attributes, ExemplarData, ExplicitBucketBoundaries, NumberValue};

    use super::ExemplarReservoir;

    fn exemplar(value: f64) -> ExemplarData {
        ExemplarData {
            value: NumberValue::Double(value),
            epoch_nanos: 0,
            filtered_attributes: Attributes::empty(),
        }
    }

    #[test]
    fn fixed_size_never_exceeds_capacity() {
        let mut reservoir = ExemplarReservoir::fixed_size(NonZeroUsize::new(3).unwrap());
        for i in 0..2 {
            reservoir.offer(exemplar(i as f64));
        }
        check!(reservoir.collect().len() == 2);
        for i in 0..1000 {
            reservoir.offer(exemplar(i as f64));
        }
        check!(reservoir.collect().len() == 3);
    }

    #[test]
    fn aligned_keeps_latest_per_bucket() {
        let boundaries = ExplicitBucketBoundaries::new([10.0]).unwrap();
        let mut reservoir = ExemplarReservoir::aligned_histogram_bucket(boundaries);
        reservoir.offer(exemplar(1.0));
        reservoir.offer(exemplar(2.0));
        reservoir.offer(exemplar(20.0));
        let values: Vec<f64> = reservoir.collect().iter().map(|e| e.value.as_f64()).collect();
        check!(values == [2.0, 20.0]);
    }

    #[test]
    fn no_samples_keeps_nothing() {
        let mut reservoir = ExemplarReservoir::NoSamples;
        reservoir.offer(exemplar(1.0));
        check!(reservoir.collect().is_empty());
    }
}
