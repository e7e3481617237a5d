use std::io;
use std::path::Path;

use chrono::NaiveDate;

use log::info;

use serde::{Serialize, Deserialize};

use smartstring::alias::{String as SmartString};

use super::ioutil::{magic_open, replace_file};
use super::store::{RawSnapshot, SnapshotStore};


/// Column spellings the source used at some point of its lifetime, mapped
/// to the canonical names. The `Incident_Rate` entry undoes a rename the
/// source made mid-2020 and restores the older spelling.
pub static COLUMN_ALIASES: &[(&str, &str)] = &[
	("Province/State", "Province_State"),
	("Country/Region", "Country_Region"),
	("Last Update", "Last_Update"),
	("Long_", "Longitude"),
	("Lat", "Latitude"),
	("Incident_Rate", "Incidence_Rate"),
];

/// Region spellings that denote the same real-world region, mapped to one
/// canonical spelling each. Reproduced verbatim from the historical
/// cleaning table, irregular entries included, so that reruns over old
/// snapshots keep producing the same table.
pub static COUNTRY_ALIASES: &[(&str, &str)] = &[
	("Bahamas, The", "Bahamas"),
	("The Bahamas", "Bahamas"),
	("Gambia, The", "Gambia"),
	("Hong Kong SAR", "Hong Kong"),
	("Iran (Islamic Republic of)", "Iran"),
	("Macao SAR", "Macao"),
	("Mainland China", "China"),
	("Republic of Ireland", "Ireland"),
	("Republic of Korea", "South Korea"),
	("Korea, South", "South Korea"),
	("Republic of Moldova", "Moldova"),
	("Republic of the Congo", "Congo"),
	("Russian Federation", "Russia"),
	("Saint Martin:", "St. Martin"),
	("The Gambia", "Gambia"),
	("Taiwan*", "Taiwan"),
	("United Kingdom", "UK"),
	("Holy See", "Vatican City"),
	("Viet Nam", "Vietnam"),
	("occupied Palestinian territory", "Palestine"),
	(" Azerbaijan", "Azerbaijan"),
	("West Bank and Gaza", "Palestine"),
	("Taipei and environs", "Taiwan"),
	("Congo (Brazzaville)", "Congo"),
	("Congo (Kinshasa)", "Congo"),
	("Cabo Verde", "Cape Verde"),
	("Czechia", "Czech Republic"),
	("Timor-Leste", "East Timor"),
];

/// Entries that are not sovereign or regional jurisdictions and never
/// belong in the combined table.
pub static EXCLUDED_REGIONS: &[&str] = &[
	"Cruise Ship",
	"Diamond Princess",
	"MS Zaandam",
	"Others",
];


pub fn canonical_column(name: &str) -> &str {
	// the first column of some snapshots carries a UTF-8 BOM
	let name = name.trim_start_matches('\u{feff}').trim();
	for (alias, canonical) in COLUMN_ALIASES.iter() {
		if *alias == name {
			return canonical
		}
	}
	name
}

/// Exact match, no trimming: the table carries its own irregular
/// spellings (leading spaces, stray punctuation) as found in the data.
pub fn canonical_country(name: &str) -> &str {
	for (alias, canonical) in COUNTRY_ALIASES.iter() {
		if *alias == name {
			return canonical
		}
	}
	name
}


/// One normalized row of the combined longitudinal table. Field names are
/// serialized under the canonical column spellings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRow {
	#[serde(rename = "Country_Region")]
	pub country: SmartString,
	#[serde(rename = "Province_State")]
	pub province: Option<SmartString>,
	#[serde(rename = "Admin2")]
	pub admin2: Option<SmartString>,
	#[serde(rename = "Confirmed")]
	pub confirmed: i64,
	#[serde(rename = "Deaths")]
	pub deaths: i64,
	#[serde(rename = "Recovered")]
	pub recovered: i64,
	// signed: the source publishes corrections that drive Active negative
	#[serde(rename = "Active")]
	pub active: i64,
	#[serde(rename = "Case-Fatality_Ratio")]
	pub case_fatality_ratio: Option<f64>,
	#[serde(rename = "Incidence_Rate")]
	pub incidence_rate: Option<f64>,
	#[serde(rename = "Date")]
	pub date: NaiveDate,
	#[serde(rename = "Latitude")]
	pub latitude: Option<f64>,
	#[serde(rename = "Longitude")]
	pub longitude: Option<f64>,
}


struct ColumnMap {
	country: Option<usize>,
	province: Option<usize>,
	admin2: Option<usize>,
	confirmed: Option<usize>,
	deaths: Option<usize>,
	recovered: Option<usize>,
	active: Option<usize>,
	case_fatality_ratio: Option<usize>,
	incidence_rate: Option<usize>,
	latitude: Option<usize>,
	longitude: Option<usize>,
}

impl ColumnMap {
	fn new(columns: &[String]) -> Self {
		let mut map = Self{
			country: None,
			province: None,
			admin2: None,
			confirmed: None,
			deaths: None,
			recovered: None,
			active: None,
			case_fatality_ratio: None,
			incidence_rate: None,
			latitude: None,
			longitude: None,
		};
		for (i, name) in columns.iter().enumerate() {
			match canonical_column(name) {
				"Country_Region" => map.country = Some(i),
				"Province_State" => map.province = Some(i),
				"Admin2" => map.admin2 = Some(i),
				"Confirmed" => map.confirmed = Some(i),
				"Deaths" => map.deaths = Some(i),
				"Recovered" => map.recovered = Some(i),
				"Active" => map.active = Some(i),
				"Case-Fatality_Ratio" => map.case_fatality_ratio = Some(i),
				"Incidence_Rate" => map.incidence_rate = Some(i),
				"Latitude" => map.latitude = Some(i),
				"Longitude" => map.longitude = Some(i),
				_ => (),
			}
		}
		map
	}
}


fn cell<'r>(row: &'r [String], index: Option<usize>) -> Option<&'r str> {
	index.and_then(|i| row.get(i)).map(|s| s.as_str())
}

fn name_cell(row: &[String], index: Option<usize>) -> Option<SmartString> {
	match cell(row, index) {
		Some(s) if !s.trim().is_empty() => Some(s.into()),
		_ => None,
	}
}

/// Counts appear as plain integers, float-formatted integers and blanks,
/// depending on the era. Anything unreadable counts as zero, matching how
/// the sums downstream treat missing values.
fn parse_count(cell: Option<&str>) -> i64 {
	let s = match cell {
		Some(s) => s.trim(),
		None => return 0,
	};
	if s.is_empty() {
		return 0
	}
	if let Ok(v) = s.parse::<i64>() {
		return v
	}
	match s.parse::<f64>() {
		Ok(v) => v.round() as i64,
		Err(_) => 0,
	}
}

fn parse_rate(cell: Option<&str>) -> Option<f64> {
	let s = cell?.trim();
	if s.is_empty() {
		return None
	}
	s.parse::<f64>().ok()
}


/// Rewrite one raw snapshot into canonical rows: canonicalize column
/// names, canonicalize region names, tag each row with the snapshot date
/// and drop rows without a region. Row order is preserved and the
/// snapshot itself is left untouched.
pub fn normalize(snapshot: &RawSnapshot, date: NaiveDate) -> Vec<CanonicalRow> {
	let cols = ColumnMap::new(snapshot.columns());
	let country_col = match cols.country {
		Some(i) => i,
		// a snapshot without a region column has no usable rows
		None => return Vec::new(),
	};
	let mut out = Vec::with_capacity(snapshot.len());
	for row in snapshot.rows() {
		let raw_country = match row.get(country_col) {
			Some(s) => s.as_str(),
			None => continue,
		};
		let country = canonical_country(raw_country);
		if country.trim().is_empty() {
			continue
		}
		out.push(CanonicalRow{
			country: country.into(),
			province: name_cell(row, cols.province),
			admin2: name_cell(row, cols.admin2),
			confirmed: parse_count(cell(row, cols.confirmed)),
			deaths: parse_count(cell(row, cols.deaths)),
			recovered: parse_count(cell(row, cols.recovered)),
			active: parse_count(cell(row, cols.active)),
			case_fatality_ratio: parse_rate(cell(row, cols.case_fatality_ratio)),
			incidence_rate: parse_rate(cell(row, cols.incidence_rate)),
			date,
			latitude: parse_rate(cell(row, cols.latitude)),
			longitude: parse_rate(cell(row, cols.longitude)),
		});
	}
	out
}


/// Rebuild the whole longitudinal table from the store: normalize every
/// snapshot in increasing date order, concatenate, drop excluded
/// quasi-regions. The result is derived state and safe to throw away.
pub fn merge(store: &SnapshotStore) -> Vec<CanonicalRow> {
	let mut table = Vec::new();
	for (date, snapshot) in store.iter() {
		let rows = normalize(snapshot, *date);
		table.extend(rows.into_iter().filter(|r| !EXCLUDED_REGIONS.contains(&&*r.country)));
	}
	info!("merged {} snapshots into {} rows", store.len(), table.len());
	table
}


pub fn write_table<P: AsRef<Path>>(path: P, rows: &[CanonicalRow]) -> io::Result<()> {
	replace_file(path, |w| {
		let mut w = csv::Writer::from_writer(w);
		for row in rows.iter() {
			w.serialize(row).map_err(io::Error::from)?;
		}
		w.flush()
	})
}

pub fn load_table<P: AsRef<Path>>(path: P) -> Result<Vec<CanonicalRow>, csv::Error> {
	let r = magic_open(path)?;
	let mut r = csv::Reader::from_reader(r);
	let mut out = Vec::new();
	for row in r.deserialize() {
		out.push(row?);
	}
	Ok(out)
}


#[cfg(test)]
mod tests {
	use super::*;

	fn snapshot(columns: &[&str], rows: &[&[&str]]) -> RawSnapshot {
		RawSnapshot::new(
			columns.iter().map(|s| s.to_string()).collect(),
			rows.iter().map(|r| r.iter().map(|s| s.to_string()).collect()).collect(),
		)
	}

	fn date() -> NaiveDate {
		NaiveDate::from_ymd(2020, 3, 15)
	}

	#[test]
	fn early_era_columns_map_to_canonical_names() {
		let snap = snapshot(
			&["Province/State", "Country/Region", "Last Update", "Confirmed", "Deaths", "Recovered"],
			&[&["Hubei", "Mainland China", "2020-03-15T10:13:06", "67794", "3085", "54278"]],
		);
		let rows = normalize(&snap, date());
		assert_eq!(rows.len(), 1);
		assert_eq!(&*rows[0].country, "China");
		assert_eq!(rows[0].province.as_deref(), Some("Hubei"));
		assert_eq!(rows[0].confirmed, 67794);
		assert_eq!(rows[0].deaths, 3085);
		assert_eq!(rows[0].recovered, 54278);
		assert_eq!(rows[0].date, date());
		assert_eq!(rows[0].incidence_rate, None);
	}

	#[test]
	fn late_era_incident_rate_restores_old_spelling() {
		let snap = snapshot(
			&["Admin2", "Province_State", "Country_Region", "Lat", "Long_", "Confirmed", "Deaths", "Recovered", "Active", "Incident_Rate", "Case-Fatality_Ratio"],
			&[&["Abbeville", "South Carolina", "US", "34.22", "-82.46", "47", "0", "0", "47", "191.6", "0.0"]],
		);
		let rows = normalize(&snap, date());
		assert_eq!(rows.len(), 1);
		assert_eq!(rows[0].admin2.as_deref(), Some("Abbeville"));
		assert_eq!(rows[0].incidence_rate, Some(191.6));
		assert_eq!(rows[0].latitude, Some(34.22));
		assert_eq!(rows[0].longitude, Some(-82.46));
		assert_eq!(rows[0].active, 47);
	}

	#[test]
	fn region_aliases_converge_on_one_spelling() {
		let snap = snapshot(
			&["Country/Region", "Confirmed"],
			&[
				&["Republic of Korea", "10"],
				&["Korea, South", "5"],
			],
		);
		let rows = normalize(&snap, date());
		assert_eq!(rows.len(), 2);
		assert_eq!(&*rows[0].country, "South Korea");
		assert_eq!(&*rows[1].country, "South Korea");
	}

	#[test]
	fn irregular_alias_entries_match_verbatim() {
		assert_eq!(canonical_country(" Azerbaijan"), "Azerbaijan");
		assert_eq!(canonical_country("Saint Martin:"), "St. Martin");
		// unlisted spellings pass through unchanged
		assert_eq!(canonical_country("Germany"), "Germany");
	}

	#[test]
	fn rows_without_region_are_dropped() {
		let snap = snapshot(
			&["Country/Region", "Confirmed"],
			&[
				&["", "10"],
				&["France", "20"],
			],
		);
		let rows = normalize(&snap, date());
		assert_eq!(rows.len(), 1);
		assert_eq!(&*rows[0].country, "France");
	}

	#[test]
	fn normalize_keeps_input_row_order() {
		let snap = snapshot(
			&["Country/Region", "Confirmed"],
			&[&["B", "1"], &["A", "2"], &["C", "3"]],
		);
		let rows = normalize(&snap, date());
		let countries: Vec<_> = rows.iter().map(|r| &*r.country).collect();
		assert_eq!(countries, vec!["B", "A", "C"]);
	}

	#[test]
	fn count_cells_parse_leniently() {
		let snap = snapshot(
			&["Country/Region", "Confirmed", "Deaths"],
			&[&["X", "12.0", ""]],
		);
		let rows = normalize(&snap, date());
		assert_eq!(rows[0].confirmed, 12);
		assert_eq!(rows[0].deaths, 0);
	}

	#[test]
	fn merge_excludes_quasi_regions_on_every_date() {
		let mut path = std::env::temp_dir();
		path.push(format!("covid-world-merge-{}.json.gz", std::process::id()));
		let _ = std::fs::remove_file(&path);
		let mut store = SnapshotStore::open(&path).unwrap();
		for (i, day) in [22u32, 23u32].iter().enumerate() {
			let confirmed = format!("{}", (i + 1) * 10);
			let snap = snapshot(
				&["Country/Region", "Confirmed"],
				&[
					&["Diamond Princess", "100"],
					&["Italy", confirmed.as_str()],
					&["MS Zaandam", "2"],
				],
			);
			store.put(NaiveDate::from_ymd(2020, 1, *day), snap).unwrap();
		}
		let table = merge(&store);
		assert_eq!(table.len(), 2);
		assert!(table.iter().all(|r| &*r.country == "Italy"));
		// increasing date order
		assert!(table[0].date < table[1].date);
		assert_eq!(table[0].confirmed, 10);
		assert_eq!(table[1].confirmed, 20);
		let _ = std::fs::remove_file(&path);
	}

	#[test]
	fn table_round_trips_through_csv() {
		let mut path = std::env::temp_dir();
		path.push(format!("covid-world-table-{}.csv.gz", std::process::id()));
		let _ = std::fs::remove_file(&path);
		let snap = snapshot(
			&["Province/State", "Country/Region", "Confirmed", "Deaths"],
			&[
				&["", "San Marino", "8", "1"],
				&["Ontario", "Canada", "79", "0"],
			],
		);
		let rows = normalize(&snap, date());
		write_table(&path, &rows).unwrap();
		let loaded = load_table(&path).unwrap();
		assert_eq!(loaded, rows);
		let _ = std::fs::remove_file(&path);
	}
}
