//! Metrics Engine
//!
//! Rate and time-series computations over a location-scoped [`DatasetView`].
//! The view is fixed at construction and never mutated; every computation
//! returns a defined default (0.0, an empty series, or `None`) when the
//! filtered set is empty.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::dataset::{
    Categorical, DatasetError, DatasetView, LocationFilter, Outcome, VentilatorySupport, YesNo,
};
use crate::utils::round_to;

pub const DEFAULT_DAILY_WINDOW_DAYS: i64 = 30;
pub const DEFAULT_MONTHLY_WINDOW: usize = 12;
/// Distinct notification dates needed before week-over-week change is reported.
pub const MIN_HISTORY_DAYS: usize = 14;
pub const MISSING_CLASSIFICATION_LABEL: &str = "Não Informado";

/// Date-indexed case counts.
pub type CaseSeries = BTreeMap<NaiveDate, u64>;

/// Age buckets used for lethality. Bounds are right-closed: (9, 19] is "10-19 anos".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AgeGroup {
    #[serde(rename = "0-9 anos")]
    From0To9,
    #[serde(rename = "10-19 anos")]
    From10To19,
    #[serde(rename = "20-29 anos")]
    From20To29,
    #[serde(rename = "30-39 anos")]
    From30To39,
    #[serde(rename = "40-49 anos")]
    From40To49,
    #[serde(rename = "50-59 anos")]
    From50To59,
    #[serde(rename = "60-69 anos")]
    From60To69,
    #[serde(rename = "70-79 anos")]
    From70To79,
    #[serde(rename = "80+ anos")]
    From80,
}

impl AgeGroup {
    pub const ALL: [AgeGroup; 9] = [
        AgeGroup::From0To9,
        AgeGroup::From10To19,
        AgeGroup::From20To29,
        AgeGroup::From30To39,
        AgeGroup::From40To49,
        AgeGroup::From50To59,
        AgeGroup::From60To69,
        AgeGroup::From70To79,
        AgeGroup::From80,
    ];

    /// Upper (inclusive) bound of each bucket, in the order of [`AgeGroup::ALL`].
    const UPPER_BOUNDS: [f64; 9] = [9.0, 19.0, 29.0, 39.0, 49.0, 59.0, 69.0, 79.0, 120.0];

    /// Bucket for an age in years. Ages outside [0, 120] have no bucket.
    pub fn for_age(age: f64) -> Option<Self> {
        if !(0.0..=120.0).contains(&age) {
            return None;
        }
        Self::UPPER_BOUNDS
            .iter()
            .position(|upper| age <= *upper)
            .map(|idx| Self::ALL[idx])
    }

    pub fn label(&self) -> &'static str {
        match self {
            AgeGroup::From0To9 => "0-9 anos",
            AgeGroup::From10To19 => "10-19 anos",
            AgeGroup::From20To29 => "20-29 anos",
            AgeGroup::From30To39 => "30-39 anos",
            AgeGroup::From40To49 => "40-49 anos",
            AgeGroup::From50To59 => "50-59 anos",
            AgeGroup::From60To69 => "60-69 anos",
            AgeGroup::From70To79 => "70-79 anos",
            AgeGroup::From80 => "80+ anos",
        }
    }
}

impl std::fmt::Display for AgeGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Every scalar and breakdown metric computed for one report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub record_count: usize,
    pub mortality_rate: f64,
    pub icu_rate: f64,
    pub vaccination_rate: f64,
    pub flu_vaccination_rate: f64,
    /// Week-over-week change in percent; `+inf` when the previous week had no cases.
    pub case_increase_rate: f64,
    /// Mean days from first symptoms to notification; `None` when unavailable.
    pub avg_notification_days: Option<f64>,
    pub case_proportions: BTreeMap<String, f64>,
    pub lethality_by_age: BTreeMap<AgeGroup, f64>,
    pub invasive_ventilation_rate: f64,
}

/// The two time series rendered as plots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaseTimeSeries {
    pub daily: CaseSeries,
    pub monthly: CaseSeries,
}

pub struct MetricsEngine {
    location: String,
    city: Option<String>,
    view: DatasetView,
}

impl MetricsEngine {
    /// Load the cleaned dataset and scope it to `location` (and `city`).
    pub fn load(path: &Path, location: &str, city: Option<&str>) -> Result<Self, DatasetError> {
        let dataset = DatasetView::load(path)?;
        Ok(Self::from_view(&dataset, location, city))
    }

    pub fn from_view(dataset: &DatasetView, location: &str, city: Option<&str>) -> Self {
        info!(location = %location, city = ?city, "Scoping dataset");
        let filter = LocationFilter::resolve(location, city);
        Self {
            location: location.to_string(),
            city: city.map(str::to_string),
            view: dataset.filter(&filter),
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn city(&self) -> Option<&str> {
        self.city.as_deref()
    }

    pub fn view(&self) -> &DatasetView {
        &self.view
    }

    pub fn compute_all(&self) -> Metrics {
        Metrics {
            record_count: self.view.len(),
            mortality_rate: self.mortality_rate(),
            icu_rate: self.icu_rate(),
            vaccination_rate: self.vaccination_rate(),
            flu_vaccination_rate: self.flu_vaccination_rate(),
            case_increase_rate: self.case_increase_rate(),
            avg_notification_days: self.avg_notification_time(),
            case_proportions: self.case_proportions(),
            lethality_by_age: self.lethality_by_age_group(),
            invasive_ventilation_rate: self.invasive_ventilation_rate(),
        }
    }

    pub fn time_series(&self) -> CaseTimeSeries {
        CaseTimeSeries {
            daily: self.daily_cases(DEFAULT_DAILY_WINDOW_DAYS),
            monthly: self.monthly_cases(DEFAULT_MONTHLY_WINDOW),
        }
    }

    fn notification_dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.view.records().iter().filter_map(|r| r.notification_date)
    }

    fn latest_notification(&self) -> Option<NaiveDate> {
        self.notification_dates().max()
    }

    /// Cases per notification date for dates `>= latest - window_days`.
    pub fn daily_cases(&self, window_days: i64) -> CaseSeries {
        let Some(last) = self.latest_notification() else {
            return CaseSeries::new();
        };
        let start = last - Duration::days(window_days);

        let mut series = CaseSeries::new();
        for date in self.notification_dates().filter(|d| *d >= start) {
            *series.entry(date).or_insert(0) += 1;
        }
        series
    }

    /// Cases per calendar month keyed by month-end date, zero-filled across the
    /// full filtered range, keeping the last `window_months` points.
    pub fn monthly_cases(&self, window_months: usize) -> CaseSeries {
        let mut counts = CaseSeries::new();
        for date in self.notification_dates() {
            *counts.entry(month_end(date)).or_insert(0) += 1;
        }

        let (Some(first), Some(last)) = (
            counts.keys().next().copied(),
            counts.keys().next_back().copied(),
        ) else {
            return CaseSeries::new();
        };

        let mut series = CaseSeries::new();
        let mut current = first;
        while current <= last {
            series.insert(current, counts.get(&current).copied().unwrap_or(0));
            match current.succ_opt() {
                Some(next) => current = month_end(next),
                None => break,
            }
        }

        let skip = series.len().saturating_sub(window_months);
        series.into_iter().skip(skip).collect()
    }

    /// Deaths over resolved outcomes (cure or death), in percent.
    pub fn mortality_rate(&self) -> f64 {
        let resolved: Vec<Outcome> = self
            .view
            .records()
            .iter()
            .filter_map(|r| r.resolved_outcome())
            .collect();
        let deaths = resolved.iter().filter(|o| **o == Outcome::Death).count();
        percentage(deaths, resolved.len())
    }

    /// ICU admissions among hospitalized cases, in percent.
    pub fn icu_rate(&self) -> f64 {
        let hospitalized: Vec<_> = self
            .view
            .records()
            .iter()
            .filter(|r| r.is_hospitalized())
            .collect();
        let icu = hospitalized.iter().filter(|r| r.is_icu()).count();
        percentage(icu, hospitalized.len())
    }

    /// COVID-vaccinated share of every filtered case.
    pub fn vaccination_rate(&self) -> f64 {
        let vaccinated = self
            .view
            .records()
            .iter()
            .filter(|r| r.covid_vaccinated == Some(YesNo::Yes))
            .count();
        percentage(vaccinated, self.view.len())
    }

    /// Influenza-vaccinated share of every filtered case.
    pub fn flu_vaccination_rate(&self) -> f64 {
        let vaccinated = self
            .view
            .records()
            .iter()
            .filter(|r| r.flu_vaccinated == Some(YesNo::Yes))
            .count();
        percentage(vaccinated, self.view.len())
    }

    /// Last 7 days against the 7 days before them, in percent.
    ///
    /// Returns 0.0 without enough history and `f64::INFINITY` when the
    /// previous week is empty.
    pub fn case_increase_rate(&self) -> f64 {
        let distinct: std::collections::BTreeSet<NaiveDate> = self.notification_dates().collect();
        if distinct.len() < MIN_HISTORY_DAYS {
            return 0.0;
        }
        let Some(last) = distinct.iter().next_back().copied() else {
            return 0.0;
        };

        let last_week_start = last - Duration::days(6);
        let prev_week_start = last - Duration::days(13);
        let prev_week_end = last - Duration::days(7);

        let last_week = self.notification_dates().filter(|d| *d >= last_week_start).count();
        let prev_week = self
            .notification_dates()
            .filter(|d| *d >= prev_week_start && *d <= prev_week_end)
            .count();

        if prev_week == 0 {
            return f64::INFINITY;
        }
        round_to(
            (last_week as f64 - prev_week as f64) / prev_week as f64 * 100.0,
            2,
        )
    }

    /// Mean days between first symptoms and notification.
    ///
    /// Negative intervals are data-entry errors and are excluded.
    pub fn avg_notification_time(&self) -> Option<f64> {
        let deltas: Vec<i64> = self
            .view
            .records()
            .iter()
            .filter_map(|r| match (r.notification_date, r.first_symptom_date) {
                (Some(notified), Some(symptoms)) => Some((notified - symptoms).num_days()),
                _ => None,
            })
            .filter(|days| *days >= 0)
            .collect();

        if deltas.is_empty() {
            return None;
        }
        let mean = deltas.iter().sum::<i64>() as f64 / deltas.len() as f64;
        Some(round_to(mean, 1))
    }

    /// Share of each final classification, in percent.
    pub fn case_proportions(&self) -> BTreeMap<String, f64> {
        if self.view.is_empty() || !self.view.has_classification() {
            return BTreeMap::new();
        }

        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for record in self.view.records() {
            let label = record
                .classification
                .map(|c| c.label())
                .unwrap_or(MISSING_CLASSIFICATION_LABEL);
            *counts.entry(label.to_string()).or_insert(0) += 1;
        }

        let total = self.view.len();
        counts
            .into_iter()
            .map(|(label, count)| (label, percentage(count, total)))
            .collect()
    }

    /// Deaths over resolved outcomes per age bucket. Every bucket is present.
    pub fn lethality_by_age_group(&self) -> BTreeMap<AgeGroup, f64> {
        let mut totals: BTreeMap<AgeGroup, (usize, usize)> =
            AgeGroup::ALL.iter().map(|g| (*g, (0, 0))).collect();

        for record in self.view.records() {
            let (Some(outcome), Some(age)) = (record.resolved_outcome(), record.age_years) else {
                continue;
            };
            let Some(group) = AgeGroup::for_age(age) else {
                continue;
            };
            if let Some((deaths, total)) = totals.get_mut(&group) {
                *total += 1;
                if outcome == Outcome::Death {
                    *deaths += 1;
                }
            }
        }

        totals
            .into_iter()
            .map(|(group, (deaths, total))| (group, percentage(deaths, total)))
            .collect()
    }

    /// Invasive ventilation among ICU cases, in percent.
    pub fn invasive_ventilation_rate(&self) -> f64 {
        let icu: Vec<_> = self.view.records().iter().filter(|r| r.is_icu()).collect();
        let invasive = icu
            .iter()
            .filter(|r| r.ventilatory_support == Some(VentilatorySupport::Invasive))
            .count();
        percentage(invasive, icu.len())
    }
}

fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round_to(part as f64 / total as f64 * 100.0, 2)
}

/// Last day of the month containing `date`.
pub fn month_end(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first_of_next| first_of_next.pred_opt())
        .unwrap_or(date)
}
