use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::allocator::Allocation;
use super::validation::ValidationError;
use crate::workflows::accounts::domain::{CustomerId, CustomerRecord};

/// Controls which customers land in the histograms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryOptions {
    /// Count customers holding zero actions under bucket `0`.
    pub include_zero_bucket: bool,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            include_zero_bucket: true,
        }
    }
}

/// Action count -> number of customers holding exactly that count. Empty buckets are omitted.
pub type ActionHistogram = BTreeMap<u64, usize>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HistogramBucket {
    pub actions: u64,
    pub customers: usize,
}

/// Read-only aggregate over an [`Allocation`]. Recompute it instead of editing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocationSummary {
    pub total: u64,
    pub customers_with_actions: usize,
    pub histogram: ActionHistogram,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strata: Option<BTreeMap<String, ActionHistogram>>,
}

impl AllocationSummary {
    pub fn from_allocation(
        allocation: &Allocation,
        cap: i64,
        options: SummaryOptions,
    ) -> Result<Self, ValidationError> {
        let cap = validate_cap(cap)?;
        let mut histogram = ActionHistogram::new();
        for (customer, count) in allocation.iter() {
            ensure_within_cap(customer, count, cap)?;
            record_bucket(&mut histogram, count, options);
        }

        Ok(Self {
            total: allocation.total(),
            customers_with_actions: allocation.customers_with_actions(),
            histogram,
            strata: None,
        })
    }

    /// Summarizes externally supplied counts, rejecting negative or over-cap values.
    pub fn from_counts(
        counts: BTreeMap<CustomerId, i64>,
        cap: i64,
        options: SummaryOptions,
    ) -> Result<Self, ValidationError> {
        let allocation = Allocation::try_from_counts(counts)?;
        Self::from_allocation(&allocation, cap, options)
    }

    /// Summarizes `allocation` and adds one histogram per value of `segment` on `records`.
    ///
    /// Every record must belong to the summarized allocation.
    pub fn stratified(
        allocation: &Allocation,
        cap: i64,
        options: SummaryOptions,
        records: &[CustomerRecord],
        segment: &str,
    ) -> Result<Self, ValidationError> {
        let mut summary = Self::from_allocation(allocation, cap, options)?;

        let mut strata: BTreeMap<String, ActionHistogram> = BTreeMap::new();
        for record in records {
            if !allocation.as_map().contains_key(&record.id) {
                return Err(ValidationError::UnknownCustomer(record.id.clone()));
            }
            let value = record
                .segment(segment)
                .ok_or_else(|| ValidationError::MissingSegment {
                    customer: record.id.clone(),
                    segment: segment.to_string(),
                })?;
            let histogram = strata.entry(value.to_string()).or_default();
            record_bucket(histogram, allocation.get(&record.id), options);
        }

        summary.strata = Some(strata);
        Ok(summary)
    }

    /// Buckets from zero actions upward.
    pub fn buckets(&self) -> Vec<HistogramBucket> {
        self.histogram
            .iter()
            .map(|(actions, customers)| HistogramBucket {
                actions: *actions,
                customers: *customers,
            })
            .collect()
    }

    pub fn customers_tracked(&self) -> usize {
        self.histogram.values().sum()
    }
}

fn validate_cap(cap: i64) -> Result<u64, ValidationError> {
    if cap <= 0 {
        return Err(ValidationError::NonPositiveCap(cap));
    }
    Ok(cap as u64)
}

fn ensure_within_cap(customer: &CustomerId, count: u64, cap: u64) -> Result<(), ValidationError> {
    if count > cap {
        return Err(ValidationError::AllocationExceedsCap {
            customer: customer.clone(),
            count,
            cap,
        });
    }
    Ok(())
}

fn record_bucket(histogram: &mut ActionHistogram, count: u64, options: SummaryOptions) {
    if count == 0 && !options.include_zero_bucket {
        return;
    }
    *histogram.entry(count).or_insert(0) += 1;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(entries: &[(&str, i64)]) -> BTreeMap<CustomerId, i64> {
        entries
            .iter()
            .map(|(id, count)| (CustomerId::from(*id), *count))
            .collect()
    }

    #[test]
    fn summary_tracks_totals_and_histogram() {
        let summary = AllocationSummary::from_counts(
            counts(&[("C1", 5), ("C2", 1), ("C3", 0)]),
            5,
            SummaryOptions::default(),
        )
        .expect("summarizes");

        assert_eq!(summary.total, 6);
        assert_eq!(summary.customers_with_actions, 2);
        let expected: ActionHistogram = [(0, 1), (1, 1), (5, 1)].into_iter().collect();
        assert_eq!(summary.histogram, expected);
        assert_eq!(summary.customers_tracked(), 3);
        assert!(summary.strata.is_none());
    }

    #[test]
    fn zero_bucket_can_be_omitted() {
        let summary = AllocationSummary::from_counts(
            counts(&[("C1", 5), ("C2", 1), ("C3", 0)]),
            5,
            SummaryOptions {
                include_zero_bucket: false,
            },
        )
        .expect("summarizes");

        assert_eq!(summary.histogram.get(&0), None);
        assert_eq!(summary.customers_tracked(), summary.customers_with_actions);
    }

    #[test]
    fn malformed_counts_are_rejected() {
        let err = AllocationSummary::from_counts(counts(&[("C1", -2)]), 5, SummaryOptions::default())
            .expect_err("negative rejected");
        assert!(matches!(err, ValidationError::NegativeAllocation { count: -2, .. }));

        let err = AllocationSummary::from_counts(counts(&[("C1", 6)]), 5, SummaryOptions::default())
            .expect_err("over cap rejected");
        assert_eq!(
            err,
            ValidationError::AllocationExceedsCap {
                customer: "C1".into(),
                count: 6,
                cap: 5,
            }
        );

        let err = AllocationSummary::from_counts(counts(&[("C1", 1)]), 0, SummaryOptions::default())
            .expect_err("cap rejected");
        assert_eq!(err, ValidationError::NonPositiveCap(0));
    }

    #[test]
    fn empty_allocation_summarizes_to_zero() {
        let summary =
            AllocationSummary::from_allocation(&Allocation::default(), 5, SummaryOptions::default())
                .expect("summarizes");
        assert_eq!(summary.total, 0);
        assert_eq!(summary.customers_with_actions, 0);
        assert!(summary.buckets().is_empty());
    }

    fn segmented(entries: &[(&str, &str)]) -> Vec<CustomerRecord> {
        entries
            .iter()
            .map(|(id, quarter)| CustomerRecord {
                id: (*id).into(),
                company_name: String::new(),
                features: BTreeMap::new(),
                segments: [("budget_cycle_quarter".to_string(), quarter.to_string())]
                    .into_iter()
                    .collect(),
                predicted: 0.0,
                baseline: 0.0,
                attributions: BTreeMap::new(),
            })
            .collect()
    }

    #[test]
    fn strata_split_histogram_by_segment() {
        let allocation =
            Allocation::try_from_counts(counts(&[("C1", 5), ("C2", 1), ("C3", 0)])).expect("valid");
        let records = segmented(&[("C1", "Q1"), ("C2", "Q3"), ("C3", "Q1")]);

        let summary = AllocationSummary::stratified(
            &allocation,
            5,
            SummaryOptions::default(),
            &records,
            "budget_cycle_quarter",
        )
        .expect("stratifies");

        assert_eq!(summary.total, 6);
        let strata = summary.strata.expect("strata present");
        let q1: ActionHistogram = [(0, 1), (5, 1)].into_iter().collect();
        let q3: ActionHistogram = [(1, 1)].into_iter().collect();
        assert_eq!(strata.get("Q1"), Some(&q1));
        assert_eq!(strata.get("Q3"), Some(&q3));

        let err = AllocationSummary::stratified(
            &allocation,
            5,
            SummaryOptions::default(),
            &records,
            "industry",
        )
        .expect_err("missing segment");
        assert!(matches!(err, ValidationError::MissingSegment { ref segment, .. } if segment == "industry"));
    }

    #[test]
    fn strata_must_come_from_the_summarized_allocation() {
        let allocation = Allocation::try_from_counts(counts(&[("C1", 5), ("C2", 1)])).expect("valid");
        let records = segmented(&[("C1", "Q1"), ("C9", "Q2")]);

        let err = AllocationSummary::stratified(
            &allocation,
            5,
            SummaryOptions::default(),
            &records,
            "budget_cycle_quarter",
        )
        .expect_err("foreign record");
        assert_eq!(err, ValidationError::UnknownCustomer("C9".into()));

        let err = AllocationSummary::stratified(
            &allocation,
            4,
            SummaryOptions::default(),
            &segmented(&[("C1", "Q1")]),
            "budget_cycle_quarter",
        )
        .expect_err("over cap");
        assert!(matches!(err, ValidationError::AllocationExceedsCap { count: 5, cap: 4, .. }));
    }
}
