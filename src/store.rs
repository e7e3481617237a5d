use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info};

use chrono::NaiveDate;

use serde::{Serialize, Deserialize};

use super::ioutil::{magic_open, replace_file};


/// One day's report exactly as published: header plus string cells.
/// Never modified after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSnapshot {
	columns: Vec<String>,
	rows: Vec<Vec<String>>,
}

impl RawSnapshot {
	pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
		Self{columns, rows}
	}

	pub fn from_csv<R: io::Read>(r: R) -> Result<Self, csv::Error> {
		// flexible: some of the early reports have ragged rows
		let mut r = csv::ReaderBuilder::new().flexible(true).from_reader(r);
		let columns = r.headers()?.iter().map(|s| s.to_string()).collect();
		let mut rows = Vec::new();
		for rec in r.records() {
			let rec = rec?;
			rows.push(rec.iter().map(|s| s.to_string()).collect());
		}
		Ok(Self{columns, rows})
	}

	pub fn columns(&self) -> &[String] {
		&self.columns
	}

	pub fn rows(&self) -> std::slice::Iter<'_, Vec<String>> {
		self.rows.iter()
	}

	pub fn len(&self) -> usize {
		self.rows.len()
	}

	pub fn is_empty(&self) -> bool {
		self.rows.is_empty()
	}
}


#[derive(Debug)]
pub enum StoreError {
	Io(io::Error),
	Blob(serde_json::Error),
	NotFound(NaiveDate),
}

impl fmt::Display for StoreError {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::Io(e) => fmt::Display::fmt(e, f),
			Self::Blob(e) => write!(f, "malformed snapshot blob: {}", e),
			Self::NotFound(date) => write!(f, "no snapshot stored for {}", date),
		}
	}
}

impl From<io::Error> for StoreError {
	fn from(err: io::Error) -> Self {
		Self::Io(err)
	}
}

impl std::error::Error for StoreError {}


/// Durable mapping from calendar date to the raw snapshot fetched for that
/// date. Grows monotonically; a date is never rewritten once stored. The
/// whole map lives in one blob which is replaced atomically on every put.
pub struct SnapshotStore {
	path: PathBuf,
	snapshots: BTreeMap<NaiveDate, RawSnapshot>,
}

impl SnapshotStore {
	/// Load the blob at `path`, or start empty if there is none yet.
	pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
		let path = path.as_ref().to_path_buf();
		let snapshots = match magic_open(&path) {
			Ok(r) => serde_json::from_reader(r).map_err(StoreError::Blob)?,
			Err(e) if e.kind() == io::ErrorKind::NotFound => {
				info!("no snapshot blob at {:?}, starting empty", path);
				BTreeMap::new()
			},
			Err(e) => return Err(e.into()),
		};
		Ok(Self{path, snapshots})
	}

	pub fn has(&self, date: NaiveDate) -> bool {
		self.snapshots.contains_key(&date)
	}

	pub fn latest_date(&self) -> Option<NaiveDate> {
		self.snapshots.keys().next_back().copied()
	}

	pub fn get(&self, date: NaiveDate) -> Result<&RawSnapshot, StoreError> {
		self.snapshots.get(&date).ok_or(StoreError::NotFound(date))
	}

	/// Insert and persist before returning. The blob is written to a temp
	/// file and renamed over the old one, so earlier dates survive a crash
	/// at any point.
	pub fn put(&mut self, date: NaiveDate, snapshot: RawSnapshot) -> Result<(), StoreError> {
		debug_assert!(!self.has(date), "snapshot for {} stored twice", date);
		self.snapshots.insert(date, snapshot);
		self.persist()?;
		debug!("stored snapshot for {}, {} dates total", date, self.snapshots.len());
		Ok(())
	}

	fn persist(&self) -> Result<(), StoreError> {
		let snapshots = &self.snapshots;
		replace_file(&self.path, |w| {
			serde_json::to_writer(w, snapshots)
				.map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
		})?;
		Ok(())
	}

	pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
		self.snapshots.keys().copied()
	}

	/// Snapshots in increasing date order.
	pub fn iter(&self) -> std::collections::btree_map::Iter<'_, NaiveDate, RawSnapshot> {
		self.snapshots.iter()
	}

	pub fn len(&self) -> usize {
		self.snapshots.len()
	}

	pub fn is_empty(&self) -> bool {
		self.snapshots.is_empty()
	}
}


#[cfg(test)]
mod tests {
	use super::*;

	use std::fs;

	fn snapshot(marker: &str) -> RawSnapshot {
		RawSnapshot::new(
			vec!["Country/Region".into(), "Confirmed".into()],
			vec![vec![marker.to_string(), "1".to_string()]],
		)
	}

	fn temp_path(name: &str) -> PathBuf {
		let mut p = std::env::temp_dir();
		p.push(format!("covid-world-store-{}-{}.json.gz", name, std::process::id()));
		let _ = fs::remove_file(&p);
		p
	}

	#[test]
	fn open_missing_blob_starts_empty() {
		let path = temp_path("empty");
		let store = SnapshotStore::open(&path).unwrap();
		assert!(store.is_empty());
		assert_eq!(store.latest_date(), None);
	}

	#[test]
	fn put_then_get_and_latest() {
		let path = temp_path("putget");
		let mut store = SnapshotStore::open(&path).unwrap();
		let d1 = NaiveDate::from_ymd(2020, 1, 22);
		let d2 = NaiveDate::from_ymd(2020, 1, 23);
		store.put(d1, snapshot("a")).unwrap();
		store.put(d2, snapshot("b")).unwrap();
		assert!(store.has(d1));
		assert!(!store.has(NaiveDate::from_ymd(2020, 1, 24)));
		assert_eq!(store.latest_date(), Some(d2));
		assert_eq!(store.get(d1).unwrap(), &snapshot("a"));
		let dates: Vec<_> = store.dates().collect();
		assert_eq!(dates, vec![d1, d2]);
		let _ = fs::remove_file(&path);
	}

	#[test]
	fn get_missing_date_is_not_found() {
		let path = temp_path("notfound");
		let store = SnapshotStore::open(&path).unwrap();
		match store.get(NaiveDate::from_ymd(2020, 3, 1)) {
			Err(StoreError::NotFound(d)) => assert_eq!(d, NaiveDate::from_ymd(2020, 3, 1)),
			other => panic!("expected NotFound, got {:?}", other.map(|_| ())),
		}
	}

	#[test]
	fn blob_round_trips_through_disk() {
		let path = temp_path("roundtrip");
		let d = NaiveDate::from_ymd(2020, 2, 1);
		{
			let mut store = SnapshotStore::open(&path).unwrap();
			store.put(d, snapshot("persisted")).unwrap();
		}
		let store = SnapshotStore::open(&path).unwrap();
		assert_eq!(store.len(), 1);
		assert_eq!(store.get(d).unwrap(), &snapshot("persisted"));
		let _ = fs::remove_file(&path);
	}
}
