//! Collapses the 3-hour forecast feed into per-day summaries.
//!
//! Days are calendar days in the location's local time: the UTC offset is
//! added to every timestamp before the date is taken, so a sample at 23:30 UTC
//! for a location at UTC+2 lands on the following day.

use chrono::{DateTime, NaiveDate};

use crate::model::{DailySummary, ForecastSample};

/// Maximum number of days in a summary.
pub const MAX_DAYS: usize = 5;

const NOON_HOUR: u32 = 12;

struct DayBucket<'a> {
    date: NaiveDate,
    noon_ts: i64,
    temp_min: f64,
    temp_max: f64,
    representative: &'a ForecastSample,
}

impl<'a> DayBucket<'a> {
    fn open(date: NaiveDate, noon_ts: i64, sample: &'a ForecastSample) -> Self {
        let (lo, hi) = sample_range(sample);
        Self {
            date,
            noon_ts,
            temp_min: lo,
            temp_max: hi,
            representative: sample,
        }
    }

    fn absorb(&mut self, sample: &'a ForecastSample) {
        let (lo, hi) = sample_range(sample);
        self.temp_min = self.temp_min.min(lo);
        self.temp_max = self.temp_max.max(hi);

        // Strictly closer only: the first sample seen keeps ties.
        let current = (self.representative.dt - self.noon_ts).abs();
        let candidate = (sample.dt - self.noon_ts).abs();
        if candidate < current {
            self.representative = sample;
        }
    }

    fn finish(self, utc_offset: i32) -> DailySummary {
        DailySummary {
            date: self.date,
            temp_min: self.temp_min,
            temp_max: self.temp_max,
            description: self.representative.description.clone(),
            icon: self.representative.icon.clone(),
            dt: self.representative.dt,
            utc_offset,
        }
    }
}

/// Groups `samples` by local calendar day and returns at most [`MAX_DAYS`]
/// summaries in ascending date order.
///
/// The first five distinct days encountered are kept. Within a day the
/// temperature range spans every sample, and the sample closest to local noon
/// provides the icon, description and timestamp.
pub fn daily_summaries(samples: &[ForecastSample], utc_offset: i32) -> Vec<DailySummary> {
    let offset = i64::from(utc_offset);
    let mut buckets: Vec<DayBucket<'_>> = Vec::with_capacity(MAX_DAYS);

    for sample in samples {
        let Some(date) = local_date(sample.dt, offset) else {
            tracing::debug!(
                dt = sample.dt,
                "skipping forecast sample with unrepresentable timestamp"
            );
            continue;
        };

        if let Some(bucket) = buckets.iter_mut().find(|b| b.date == date) {
            bucket.absorb(sample);
            continue;
        }

        if buckets.len() == MAX_DAYS {
            continue;
        }

        let Some(noon_ts) = local_noon(date, offset) else {
            continue;
        };
        buckets.push(DayBucket::open(date, noon_ts, sample));
    }

    buckets.sort_by_key(|b| b.date);
    buckets
        .into_iter()
        .map(|bucket| bucket.finish(utc_offset))
        .collect()
}

fn local_date(ts: i64, offset: i64) -> Option<NaiveDate> {
    let shifted = ts.checked_add(offset)?;
    DateTime::from_timestamp(shifted, 0).map(|dt| dt.date_naive())
}

/// Epoch seconds of 12:00:00 local time on `date`.
fn local_noon(date: NaiveDate, offset: i64) -> Option<i64> {
    let noon = date.and_hms_opt(NOON_HOUR, 0, 0)?.and_utc().timestamp();
    noon.checked_sub(offset)
}

fn sample_range(sample: &ForecastSample) -> (f64, f64) {
    (
        sample.temp_min.min(sample.temp_max),
        sample.temp_max.max(sample.temp_min),
    )
}
