//! Resampling raw rows into model-ready series.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;

use super::{DqKind, RawRow, RawSeriesFrame, SeriesPoint, TimeSeries};
use crate::config::{AggregationFn, Frequency};
use crate::subgroups::Subgroup;

/// Builds overall, subgroup and data-quality series from one frame.
pub struct SeriesAggregator<'a> {
    frame: &'a RawSeriesFrame,
    freq: Frequency,
    aggregation: AggregationFn,
}

impl<'a> SeriesAggregator<'a> {
    pub fn new(frame: &'a RawSeriesFrame, freq: Frequency, aggregation: AggregationFn) -> Self {
        Self {
            frame,
            freq,
            aggregation,
        }
    }

    /// Every row, resampled with the KPI's aggregation.
    pub fn overall(&self) -> TimeSeries {
        resample(self.frame.rows.iter(), self.freq, self.aggregation)
    }

    /// Rows matching `subgroup`, resampled with the KPI's aggregation.
    pub fn subgroup(&self, subgroup: &Subgroup) -> TimeSeries {
        resample(
            self.frame.rows.iter().filter(|row| subgroup.matches(row)),
            self.freq,
            self.aggregation,
        )
    }

    /// Data-quality series for `kind`.
    pub fn dq(&self, kind: DqKind) -> TimeSeries {
        let aggregation = match kind {
            DqKind::Max => AggregationFn::Max,
            DqKind::Count => AggregationFn::Count,
            DqKind::Mean => AggregationFn::Mean,
            DqKind::Missing => return missing_counts(&self.frame.rows),
        };
        resample(self.frame.rows.iter(), self.freq, aggregation)
    }
}

/// Bin rows at `freq` from the first row's bin to the last row's, inclusive.
///
/// Bins without rows are kept: `sum` and `count` report zero there, every
/// other aggregation reports a missing value.
fn resample<'r>(
    rows: impl Iterator<Item = &'r RawRow>,
    freq: Frequency,
    aggregation: AggregationFn,
) -> TimeSeries {
    let mut bins: BTreeMap<NaiveDateTime, Vec<Option<f64>>> = BTreeMap::new();
    for row in rows {
        bins.entry(freq.bin_label(row.timestamp))
            .or_default()
            .push(row.metric);
    }

    let (Some(&first), Some(&last)) = (bins.keys().next(), bins.keys().next_back()) else {
        return TimeSeries::default();
    };

    let step = freq.step();
    let mut points = Vec::new();
    let mut bin = first;
    while bin <= last {
        let values = bins.get(&bin).map(Vec::as_slice).unwrap_or(&[]);
        points.push(SeriesPoint::new(bin, apply(aggregation, values)));
        bin += step;
    }

    TimeSeries { points }
}

fn apply(aggregation: AggregationFn, values: &[Option<f64>]) -> Option<f64> {
    let mut present: Vec<f64> = values.iter().flatten().copied().collect();
    match aggregation {
        AggregationFn::Sum => Some(present.iter().sum()),
        AggregationFn::Count => Some(present.len() as f64),
        _ if present.is_empty() => None,
        AggregationFn::Mean => Some(present.iter().sum::<f64>() / present.len() as f64),
        AggregationFn::Max => present.iter().copied().reduce(f64::max),
        AggregationFn::Min => present.iter().copied().reduce(f64::min),
        AggregationFn::Median => {
            present.sort_by(|a, b| a.total_cmp(b));
            let mid = present.len() / 2;
            if present.len() % 2 == 0 {
                Some((present[mid - 1] + present[mid]) / 2.0)
            } else {
                Some(present[mid])
            }
        }
    }
}

/// Null metric counts per exact timestamp, sorted. No resampling, so
/// timestamps absent from the rows produce no point.
fn missing_counts(rows: &[RawRow]) -> TimeSeries {
    let mut groups: BTreeMap<NaiveDateTime, usize> = BTreeMap::new();
    for row in rows {
        let missing = groups.entry(row.timestamp).or_insert(0);
        if row.metric.is_none() {
            *missing += 1;
        }
    }

    TimeSeries {
        points: groups
            .into_iter()
            .map(|(dt, missing)| SeriesPoint::new(dt, Some(missing as f64)))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate};

    use super::*;
    use crate::subgroups;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 1, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn row(ts: NaiveDateTime, metric: Option<f64>, region: &str) -> RawRow {
        RawRow {
            timestamp: ts,
            metric,
            dimensions: vec![Some(region.to_string())],
        }
    }

    fn frame(rows: Vec<RawRow>) -> RawSeriesFrame {
        RawSeriesFrame::new(vec!["region".to_string()], rows)
    }

    #[test]
    fn test_daily_sum_fills_gaps_with_zero() {
        let frame = frame(vec![
            row(at(1, 3), Some(2.0), "us"),
            row(at(1, 20), Some(3.0), "eu"),
            row(at(3, 1), Some(4.0), "us"),
        ]);
        let series = SeriesAggregator::new(&frame, Frequency::Daily, AggregationFn::Sum).overall();

        assert_eq!(
            series.points,
            vec![
                SeriesPoint::new(at(1, 0), Some(5.0)),
                SeriesPoint::new(at(2, 0), Some(0.0)),
                SeriesPoint::new(at(3, 0), Some(4.0)),
            ]
        );
    }

    #[test]
    fn test_mean_gap_is_missing() {
        let frame = frame(vec![
            row(at(1, 0), Some(2.0), "us"),
            row(at(1, 0), Some(4.0), "us"),
            row(at(3, 0), Some(1.0), "us"),
        ]);
        let series = SeriesAggregator::new(&frame, Frequency::Daily, AggregationFn::Mean).overall();
        assert_eq!(series.value_at(at(1, 0)), Some(Some(3.0)));
        assert_eq!(series.value_at(at(2, 0)), Some(None));
    }

    #[test]
    fn test_hourly_bins() {
        let frame = frame(vec![
            row(at(1, 0) + Duration::minutes(10), Some(1.0), "us"),
            row(at(1, 0) + Duration::minutes(50), Some(1.0), "us"),
            row(at(1, 2) + Duration::minutes(5), Some(1.0), "us"),
        ]);
        let series =
            SeriesAggregator::new(&frame, Frequency::Hourly, AggregationFn::Count).overall();
        let values: Vec<Option<f64>> = series.points.iter().map(|p| p.y).collect();
        assert_eq!(values, vec![Some(2.0), Some(0.0), Some(1.0)]);
    }

    #[test]
    fn test_weekly_bins_labeled_by_closing_sunday() {
        // 2023-01-01 and 2023-01-08 are Sundays.
        let frame = frame(vec![
            row(at(1, 9), Some(1.0), "us"),
            row(at(2, 0), Some(2.0), "us"),
            row(at(8, 23), Some(3.0), "us"),
            row(at(16, 0), Some(4.0), "us"),
        ]);
        let series =
            SeriesAggregator::new(&frame, Frequency::Weekly, AggregationFn::Sum).overall();
        assert_eq!(
            series.points,
            vec![
                SeriesPoint::new(at(1, 0), Some(1.0)),
                SeriesPoint::new(at(8, 0), Some(5.0)),
                SeriesPoint::new(at(15, 0), Some(0.0)),
                SeriesPoint::new(at(22, 0), Some(4.0)),
            ]
        );
    }

    #[test]
    fn test_subgroup_series_only_uses_matching_rows() {
        let frame = frame(vec![
            row(at(1, 0), Some(2.0), "us"),
            row(at(1, 0), Some(30.0), "eu"),
            row(at(2, 0), Some(5.0), "us"),
        ]);
        let us = subgroups::enumerate(&frame).remove(0);
        let series = SeriesAggregator::new(&frame, Frequency::Daily, AggregationFn::Sum).subgroup(&us);
        let values: Vec<Option<f64>> = series.points.iter().map(|p| p.y).collect();
        assert_eq!(values, vec![Some(2.0), Some(5.0)]);
    }

    #[test]
    fn test_dq_kinds_ignore_kpi_aggregation() {
        let frame = frame(vec![
            row(at(1, 0), Some(2.0), "us"),
            row(at(1, 0), Some(6.0), "us"),
            row(at(1, 0), None, "us"),
        ]);
        let agg = SeriesAggregator::new(&frame, Frequency::Daily, AggregationFn::Sum);
        assert_eq!(agg.dq(DqKind::Max).value_at(at(1, 0)), Some(Some(6.0)));
        assert_eq!(agg.dq(DqKind::Count).value_at(at(1, 0)), Some(Some(2.0)));
        assert_eq!(agg.dq(DqKind::Mean).value_at(at(1, 0)), Some(Some(4.0)));
    }

    #[test]
    fn test_missing_counts_per_exact_timestamp() {
        let t1 = at(1, 0);
        let t2 = at(1, 6);
        let frame = frame(vec![
            row(t1, None, "us"),
            row(t1, Some(5.0), "us"),
            row(t2, None, "us"),
        ]);
        let series = SeriesAggregator::new(&frame, Frequency::Daily, AggregationFn::Sum)
            .dq(DqKind::Missing);
        assert_eq!(
            series.points,
            vec![
                SeriesPoint::new(t1, Some(1.0)),
                SeriesPoint::new(t2, Some(1.0)),
            ]
        );
    }

    #[test]
    fn test_missing_counts_leave_gaps() {
        let frame = frame(vec![row(at(1, 0), Some(1.0), "us"), row(at(4, 0), None, "us")]);
        let series = SeriesAggregator::new(&frame, Frequency::Daily, AggregationFn::Sum)
            .dq(DqKind::Missing);
        assert_eq!(series.len(), 2);
        assert_eq!(series.value_at(at(1, 0)), Some(Some(0.0)));
        assert_eq!(series.value_at(at(2, 0)), None);
    }

    #[test]
    fn test_median() {
        assert_eq!(apply(AggregationFn::Median, &[Some(3.0), Some(1.0), Some(2.0)]), Some(2.0));
        assert_eq!(
            apply(AggregationFn::Median, &[Some(4.0), None, Some(1.0), Some(2.0), Some(3.0)]),
            Some(2.5)
        );
        assert_eq!(apply(AggregationFn::Min, &[None]), None);
    }

    #[test]
    fn test_empty_frame_gives_empty_series() {
        let frame = frame(Vec::new());
        let agg = SeriesAggregator::new(&frame, Frequency::Daily, AggregationFn::Sum);
        assert!(agg.overall().is_empty());
        assert!(agg.dq(DqKind::Missing).is_empty());
    }
}
