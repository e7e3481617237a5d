use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::normalize::CanonicalRow;


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
	Confirmed,
	Deaths,
	DeathRate,
	Recovered,
	Active,
}

impl Metric {
	pub fn name(&self) -> &'static str {
		match self {
			Self::Confirmed => "Confirmed",
			Self::Deaths => "Deaths",
			Self::DeathRate => "Death_Rate",
			Self::Recovered => "Recovered",
			Self::Active => "Active",
		}
	}
}


/// Population back-estimated from the reported incidence rate (cases per
/// 100k). Undefined when the rate is absent or zero.
pub fn estimated_population(row: &CanonicalRow) -> Option<f64> {
	let rate = row.incidence_rate?;
	if rate <= 0.0 {
		return None
	}
	Some(row.confirmed as f64 / (rate / 100000.0))
}


/// Numeric fields summed over a group of rows. Population is the sum of
/// the per-row estimates and stays at zero when no row carries a usable
/// incidence rate.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CaseTotals {
	pub confirmed: i64,
	pub deaths: i64,
	pub recovered: i64,
	pub active: i64,
	pub population: f64,
}

impl CaseTotals {
	pub fn add_row(&mut self, row: &CanonicalRow) {
		self.confirmed += row.confirmed;
		self.deaths += row.deaths;
		self.recovered += row.recovered;
		self.active += row.active;
		if let Some(p) = estimated_population(row) {
			self.population += p;
		}
	}

	/// Percent of confirmed cases that died. Undefined at confirmed = 0;
	/// callers filter instead of dividing.
	pub fn death_rate(&self) -> Option<f64> {
		if self.confirmed == 0 {
			return None
		}
		Some(100.0 * self.deaths as f64 / self.confirmed as f64)
	}

	pub fn per_million(&self, value: f64) -> Option<f64> {
		if self.population <= 0.0 {
			return None
		}
		Some(value / (self.population / 1_000_000.0))
	}

	pub fn metric(&self, metric: Metric) -> Option<f64> {
		match metric {
			Metric::Confirmed => Some(self.confirmed as f64),
			Metric::Deaths => Some(self.deaths as f64),
			Metric::DeathRate => self.death_rate(),
			Metric::Recovered => Some(self.recovered as f64),
			Metric::Active => Some(self.active as f64),
		}
	}
}


pub fn latest_date(table: &[CanonicalRow]) -> Option<NaiveDate> {
	table.iter().map(|r| r.date).max()
}

/// Rows belonging to the newest date in the table.
pub fn latest(table: &[CanonicalRow]) -> Vec<&CanonicalRow> {
	match latest_date(table) {
		Some(date) => table.iter().filter(|r| r.date == date).collect(),
		None => Vec::new(),
	}
}

/// Sum the numeric fields per key. Keys come out sorted.
pub fn group_sum<'r, K, F, I>(rows: I, key: F) -> BTreeMap<K, CaseTotals>
	where
		K: Ord,
		F: Fn(&CanonicalRow) -> K,
		I: IntoIterator<Item = &'r CanonicalRow>,
{
	let mut out: BTreeMap<K, CaseTotals> = BTreeMap::new();
	for row in rows {
		out.entry(key(row)).or_insert_with(CaseTotals::default).add_row(row);
	}
	out
}

/// The `n` items with the highest metric, descending. The sort is stable,
/// so ties keep their input order.
pub fn top_n<T, F: Fn(&T) -> f64>(items: &[T], metric: F, n: usize) -> Vec<&T> {
	let mut ranked: Vec<&T> = items.iter().collect();
	ranked.sort_by(|a, b| metric(b).partial_cmp(&metric(a)).unwrap_or(Ordering::Equal));
	ranked.truncate(n);
	ranked
}

/// Items whose metric lies strictly above `min_exclusive`.
pub fn filter_threshold<T, F: Fn(&T) -> f64>(items: &[T], metric: F, min_exclusive: f64) -> Vec<&T> {
	items.iter().filter(|item| metric(item) > min_exclusive).collect()
}

/// Per-date rollup of one metric, in date order. Dates where the metric
/// is undefined come out as NaN points, which the renderer skips.
pub fn series<'r, I: IntoIterator<Item = &'r CanonicalRow>>(rows: I, metric: Metric) -> (Vec<NaiveDate>, Vec<f64>) {
	let grouped = group_sum(rows, |r| r.date);
	let mut dates = Vec::with_capacity(grouped.len());
	let mut values = Vec::with_capacity(grouped.len());
	for (date, totals) in grouped {
		dates.push(date);
		values.push(totals.metric(metric).unwrap_or(f64::NAN));
	}
	(dates, values)
}

/// First difference of a cumulative series.
pub fn daily_change(values: &[f64]) -> Vec<f64> {
	values.windows(2).map(|w| w[1] - w[0]).collect()
}

/// 5-day box average; element i of the output covers input days i..i+5,
/// which lines the result up with the date axis shortened by three days
/// at the front and two at the back.
pub fn smooth5(values: &[f64]) -> Vec<f64> {
	if values.len() < 5 {
		return Vec::new()
	}
	values.windows(5).map(|w| w.iter().sum::<f64>() / 5.0).collect()
}
