use chrono::{Duration, NaiveDate};

use log::{info, warn};

use reqwest;

use super::{global_start_date, naive_today};
use super::store::{RawSnapshot, SnapshotStore, StoreError};


pub static DAILY_REPORT_BASE_URL: &str = "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_daily_reports";


/// Where daily snapshots come from. Availability is monotonic by date:
/// once a date is unavailable, all later dates are too, for this run.
pub trait SnapshotSource {
	/// `None` means the report for `date` cannot be retrieved right now.
	/// Absent resource, transport failure and unreadable payload are all
	/// the same terminal condition; the distinction only matters in logs.
	fn retrieve(&self, date: NaiveDate) -> Option<RawSnapshot>;
}


/// Retrieves daily reports over HTTP from the fixed URL template
/// `<base>/MM-DD-YYYY.csv`.
pub struct HttpSource {
	client: reqwest::blocking::Client,
	base_url: String,
}

impl HttpSource {
	pub fn new() -> Self {
		Self::with_base_url(DAILY_REPORT_BASE_URL.into())
	}

	pub fn with_base_url(base_url: String) -> Self {
		Self{
			client: reqwest::blocking::Client::new(),
			base_url,
		}
	}

	fn url_for(&self, date: NaiveDate) -> String {
		format!("{}/{}.csv", self.base_url, date.format("%m-%d-%Y"))
	}
}

impl SnapshotSource for HttpSource {
	fn retrieve(&self, date: NaiveDate) -> Option<RawSnapshot> {
		let url = self.url_for(date);
		let resp = match self.client.get(&url).send() {
			Ok(resp) => resp,
			Err(e) => {
				warn!("request for {} failed: {}", date, e);
				return None
			},
		};
		if !resp.status().is_success() {
			info!("no report published for {} (status {})", date, resp.status());
			return None
		}
		let body = match resp.text() {
			Ok(body) => body,
			Err(e) => {
				warn!("failed to read report body for {}: {}", date, e);
				return None
			},
		};
		match RawSnapshot::from_csv(body.as_bytes()) {
			Ok(snapshot) => Some(snapshot),
			Err(e) => {
				warn!("report for {} is unreadable: {}", date, e);
				None
			},
		}
	}
}


/// Fetch every daily report the store does not have yet, strictly in date
/// order, starting the day after the newest stored date (or at the global
/// start date for an empty store) and stopping at the first date the
/// source cannot deliver. Returns the number of newly stored dates; 0
/// means the dataset was already current.
pub fn fetch_missing<S: SnapshotSource + ?Sized>(source: &S, store: &mut SnapshotStore) -> Result<usize, StoreError> {
	let mut date = match store.latest_date() {
		Some(latest) => latest + Duration::days(1),
		None => global_start_date(),
	};
	let today = naive_today();
	let mut found = 0;
	while date < today {
		let snapshot = match source.retrieve(date) {
			Some(snapshot) => snapshot,
			None => break,
		};
		store.put(date, snapshot)?;
		info!("fetched report for {}", date);
		found += 1;
		date += Duration::days(1);
	}
	Ok(found)
}


#[cfg(test)]
mod tests {
	use super::*;

	use std::cell::RefCell;
	use std::collections::HashMap;
	use std::fs;
	use std::path::PathBuf;

	struct ScriptedSource {
		reports: HashMap<NaiveDate, RawSnapshot>,
		requested: RefCell<Vec<NaiveDate>>,
	}

	impl ScriptedSource {
		fn new(dates: &[NaiveDate]) -> Self {
			let reports = dates.iter().map(|d| {
				(*d, RawSnapshot::new(
					vec!["Country/Region".into(), "Confirmed".into()],
					vec![vec!["X".to_string(), "1".to_string()]],
				))
			}).collect();
			Self{reports, requested: RefCell::new(Vec::new())}
		}
	}

	impl SnapshotSource for ScriptedSource {
		fn retrieve(&self, date: NaiveDate) -> Option<RawSnapshot> {
			self.requested.borrow_mut().push(date);
			self.reports.get(&date).cloned()
		}
	}

	fn temp_store(name: &str) -> (SnapshotStore, PathBuf) {
		let mut p = std::env::temp_dir();
		p.push(format!("covid-world-fetch-{}-{}.json.gz", name, std::process::id()));
		let _ = fs::remove_file(&p);
		(SnapshotStore::open(&p).unwrap(), p)
	}

	fn d(day: u32) -> NaiveDate {
		NaiveDate::from_ymd(2020, 1, day)
	}

	#[test]
	fn empty_store_starts_at_global_start_date() {
		let (mut store, path) = temp_store("epoch");
		let source = ScriptedSource::new(&[d(22), d(23)]);
		let found = fetch_missing(&source, &mut store).unwrap();
		assert_eq!(found, 2);
		assert_eq!(source.requested.borrow()[0], global_start_date());
		assert_eq!(store.latest_date(), Some(d(23)));
		let _ = fs::remove_file(&path);
	}

	#[test]
	fn never_rerequests_stored_dates() {
		let (mut store, path) = temp_store("idempotent");
		let source = ScriptedSource::new(&[d(22), d(23), d(24)]);
		fetch_missing(&source, &mut store).unwrap();
		source.requested.borrow_mut().clear();

		let found = fetch_missing(&source, &mut store).unwrap();
		assert_eq!(found, 0);
		// only the first missing date was probed
		assert_eq!(*source.requested.borrow(), vec![d(25)]);
		let _ = fs::remove_file(&path);
	}

	#[test]
	fn second_run_without_new_data_leaves_store_unchanged() {
		let (mut store, path) = temp_store("stable");
		let source = ScriptedSource::new(&[d(22)]);
		fetch_missing(&source, &mut store).unwrap();
		let blob_before = fs::read(&path).unwrap();

		let found = fetch_missing(&source, &mut store).unwrap();
		assert_eq!(found, 0);
		assert_eq!(fs::read(&path).unwrap(), blob_before);
		let _ = fs::remove_file(&path);
	}

	#[test]
	fn stops_at_first_gap_without_skipping() {
		let (mut store, path) = temp_store("gap");
		// d(24) is missing; d(25) exists but must not be reached
		let source = ScriptedSource::new(&[d(22), d(23), d(25)]);
		let found = fetch_missing(&source, &mut store).unwrap();
		assert_eq!(found, 2);
		assert_eq!(store.latest_date(), Some(d(23)));
		assert_eq!(*source.requested.borrow(), vec![d(22), d(23), d(24)]);
		let _ = fs::remove_file(&path);
	}
}
