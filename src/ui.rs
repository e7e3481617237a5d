use std::collections::BTreeSet;
use std::io;
use std::io::{BufRead, Write};

use chrono::NaiveDate;

use smartstring::alias::{String as SmartString};

use super::chart::{format_value, plot, ChartKind};
use super::normalize::CanonicalRow;
use super::query::{
	daily_change, filter_threshold, group_sum, latest, latest_date, series, smooth5, top_n,
	CaseTotals, Metric,
};


/// US snapshots report per-county rows only; recoveries and active counts
/// stopped being published for them.
static US_METRICS: &[Metric] = &[Metric::Confirmed, Metric::Deaths, Metric::DeathRate];
static ALL_METRICS: &[Metric] = &[Metric::Confirmed, Metric::Deaths, Metric::DeathRate, Metric::Recovered, Metric::Active];

/// Province entries of the US table that are bookkeeping artifacts, not
/// states; dropped from per-province breakdowns.
static DROPPED_PROVINCES: &[&str] = &["Recovered", "Diamond Princess", "Grand Princess"];

static MENU: &str = "
The options in this program are:
-----------------------------------
0: exit
1: Plot time-series of selected country/province/data or the World (Total and Daily)
2: Plot time-series of all data for a single country
3: Plot selected data (total and per million) for all countries with total deaths > selected
4: Print Confirmed and Deaths for all world regions/states
5: Plot selected latest data for all states/regions in a country
6: Plot top countries in selected latest data (total, and per million)
7: Print the first 5 rows of the data, along with various parameters
8: Print data for countries with no Recovered cases
9: Print data for countries where all Confirmed cases died
10: Print countries where all confirmed cases recovered
";


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
	Exit,
	PlotDaily,
	PlotAll,
	OverThreshold,
	WorldPerRegion,
	ByProvince,
	TopCountries,
	Preview,
	NoRecovered,
	AllDied,
	AllRecovered,
}

impl Command {
	pub fn from_selection(input: &str) -> Option<Self> {
		match input.trim() {
			"0" => Some(Self::Exit),
			"1" => Some(Self::PlotDaily),
			"2" => Some(Self::PlotAll),
			"3" => Some(Self::OverThreshold),
			"4" => Some(Self::WorldPerRegion),
			"5" => Some(Self::ByProvince),
			"6" => Some(Self::TopCountries),
			"7" => Some(Self::Preview),
			"8" => Some(Self::NoRecovered),
			"9" => Some(Self::AllDied),
			"10" => Some(Self::AllRecovered),
			_ => None,
		}
	}

	pub fn run(&self, table: &[CanonicalRow]) {
		match self {
			Self::Exit => (),
			Self::PlotDaily => plot_daily(table),
			Self::PlotAll => plot_all4(table),
			Self::OverThreshold => stats_for_all_over(table),
			Self::WorldPerRegion => world_per_region(table),
			Self::ByProvince => by_province_region(table),
			Self::TopCountries => top_countries(table),
			Self::Preview => preview(table),
			Self::NoRecovered => no_recover(table),
			Self::AllDied => all_died(table),
			Self::AllRecovered => all_recovered(table),
		}
	}
}

/// Show the menu and re-prompt until a valid option number comes in.
/// A closed input stream exits, like option 0.
pub fn select_command() -> Command {
	loop {
		println!("{}", MENU);
		let input = match prompt("Enter option number: ") {
			Some(input) => input,
			None => return Command::Exit,
		};
		match Command::from_selection(&input) {
			Some(cmd) => return cmd,
			None => println!("Try again..."),
		}
	}
}


/// `None` is EOF. Re-prompt loops must pass it through instead of asking
/// again, or a closed stdin spins them forever.
fn read_trimmed_line<R: BufRead>(r: &mut R) -> Option<String> {
	let mut line = String::new();
	match r.read_line(&mut line) {
		Ok(0) | Err(_) => None,
		Ok(_) => Some(line.trim().to_string()),
	}
}

fn prompt(msg: &str) -> Option<String> {
	print!("{}", msg);
	io::stdout().flush().unwrap();
	let stdin = io::stdin();
	let mut stdin = stdin.lock();
	read_trimmed_line(&mut stdin)
}

fn prompt_number(msg: &str) -> Option<u64> {
	loop {
		match prompt(msg)?.parse::<u64>() {
			Ok(v) => return Some(v),
			Err(_) => println!("Try again..."),
		}
	}
}

fn select_country(table: &[CanonicalRow]) -> Option<String> {
	let countries: BTreeSet<&str> = table.iter().map(|r| &*r.country).collect();
	loop {
		let input = prompt("Enter country name, or World (all --> print list): ")?;
		if input == "all" {
			for c in countries.iter() {
				println!("{}", c);
			}
		} else if input == "World" || countries.contains(input.as_str()) {
			return Some(input)
		} else {
			println!("try again...");
		}
	}
}

fn select_province(table: &[CanonicalRow], country: &str) -> Option<String> {
	let newest = latest(table);
	let provinces: Vec<&str> = {
		let set: BTreeSet<&str> = newest.iter()
			.filter(|r| &*r.country == country)
			.filter_map(|r| r.province.as_deref())
			.collect();
		set.into_iter().collect()
	};
	if provinces.is_empty() {
		return None
	}
	println!("Province/State list for {}:", country);
	println!("----------------------------------");
	for (i, p) in provinces.iter().enumerate() {
		println!("{} {}", i + 1, p);
	}
	loop {
		// EOF falls back to the whole country, like a bare <CR>
		let input = prompt("Select a province/state by number (or <CR> for the whole country): ")?;
		if input.is_empty() {
			return None
		}
		match input.parse::<usize>() {
			Ok(i) if i >= 1 && i <= provinces.len() => return Some(provinces[i - 1].to_string()),
			_ => println!("try again..."),
		}
	}
}

fn select_metric(country: &str) -> Option<Metric> {
	let options = if country == "US" {
		US_METRICS
	} else {
		ALL_METRICS
	};
	loop {
		println!("Available data options:");
		println!("-----------------------");
		for (i, m) in options.iter().enumerate() {
			println!("{}: {}", i + 1, m.name());
		}
		match prompt("Choose an option: ")?.parse::<usize>() {
			Ok(i) if i >= 1 && i <= options.len() => return Some(options[i - 1]),
			_ => println!("select a proper number..."),
		}
	}
}


fn rows_for<'t>(table: &'t [CanonicalRow], country: &str, province: Option<&str>) -> Vec<&'t CanonicalRow> {
	table.iter().filter(|r| {
		if country == "World" {
			return true
		}
		if &*r.country != country {
			return false
		}
		match province {
			Some(p) => r.province.as_deref() == Some(p),
			None => true,
		}
	}).collect()
}

fn latest_by_country(table: &[CanonicalRow]) -> Option<(NaiveDate, Vec<(SmartString, CaseTotals)>)> {
	let date = latest_date(table)?;
	let grouped = group_sum(latest(table), |r| r.country.clone());
	Some((date, grouped.into_iter().collect()))
}

fn date_labels(dates: &[NaiveDate]) -> Vec<String> {
	dates.iter().map(|d| d.to_string()).collect()
}


fn plot_daily(table: &[CanonicalRow]) {
	let country = match select_country(table) {
		Some(c) => c,
		None => return,
	};
	let province = if country != "World" {
		select_province(table, &country)
	} else {
		None
	};
	let metric = match select_metric(&country) {
		Some(m) => m,
		None => return,
	};

	let rows = rows_for(table, &country, province.as_deref());
	let (dates, values) = series(rows, metric);
	if dates.is_empty() {
		println!("No data for this selection");
		return
	}
	let labels = date_labels(&dates);
	let place = match &province {
		Some(p) => format!("{} {}", country, p),
		None => country.clone(),
	};
	let title = if metric == Metric::DeathRate {
		format!("{} {} vs. time (in %)", place, metric.name())
	} else {
		format!("{}: Total {} vs. time", place, metric.name())
	};
	plot(&labels, &values, ChartKind::Line, &title);

	if metric != Metric::DeathRate && values.len() >= 6 {
		let change = daily_change(&values);
		let smoothed = smooth5(&change);
		let labels = &labels[3..labels.len() - 2];
		let title = format!("{}: 5-day average of daily {} vs. time", place, metric.name());
		plot(labels, &smoothed, ChartKind::Line, &title);
	}
}

fn plot_all4(table: &[CanonicalRow]) {
	let country = match select_country(table) {
		Some(c) => c,
		None => return,
	};
	let rows = rows_for(table, &country, None);
	if rows.is_empty() {
		println!("No data for this selection");
		return
	}
	for metric in [Metric::Confirmed, Metric::Deaths, Metric::Recovered, Metric::Active].iter() {
		let (dates, values) = series(rows.iter().copied(), *metric);
		let labels = date_labels(&dates);
		plot(&labels, &values, ChartKind::Line, &format!("{}: Total {} vs. time", country, metric.name()));
	}
}

fn stats_for_all_over(table: &[CanonicalRow]) {
	let metric = match select_metric("all") {
		Some(m) => m,
		None => return,
	};
	let over = match prompt_number("Enter minimum number of deaths: ") {
		Some(v) => v,
		None => return,
	};
	let (date, entries) = match latest_by_country(table) {
		Some(v) => v,
		None => {
			println!("No data loaded");
			return
		},
	};
	let picked = filter_threshold(&entries, |(_, t)| t.deaths as f64, over as f64);
	if picked.is_empty() {
		println!("No countries found with deaths > {}", over);
		return
	}
	let labels: Vec<String> = picked.iter().map(|(c, _)| c.to_string()).collect();
	let values: Vec<f64> = picked.iter().map(|(_, t)| t.metric(metric).unwrap_or(f64::NAN)).collect();
	let when = date.format("%d-%B-%Y");
	let title = if metric == Metric::DeathRate {
		format!("{} (in %) as of {} (Deaths >{})", metric.name(), when, over)
	} else {
		format!("{} as of {} (Deaths >{})", metric.name(), when, over)
	};
	plot(&labels, &values, ChartKind::Bar, &title);

	if metric != Metric::DeathRate {
		let title = format!("{} per million, as of {} (Deaths >{})", metric.name(), when, over);
		plot_per_million(picked.iter().copied(), metric, &title);
	}
}

fn plot_per_million<'e, I: Iterator<Item = &'e (SmartString, CaseTotals)>>(entries: I, metric: Metric, title: &str) {
	let mut labels = Vec::new();
	let mut values = Vec::new();
	for (country, totals) in entries {
		let v = match totals.metric(metric).and_then(|v| totals.per_million(v)) {
			Some(v) => v,
			None => continue,
		};
		labels.push(country.to_string());
		values.push(v);
	}
	if labels.is_empty() {
		println!("No population estimates available");
		return
	}
	plot(&labels, &values, ChartKind::Bar, title);
}

/// Latest-date rollup per (country, province). Rows without a province
/// carry no place in a per-province breakdown and are left out.
fn world_breakdown(table: &[CanonicalRow]) -> Vec<((SmartString, SmartString), CaseTotals)> {
	let grouped = group_sum(
		latest(table).into_iter().filter(|r| r.province.is_some()),
		|r| (r.country.clone(), r.province.clone().unwrap_or_default()),
	);
	grouped.into_iter().collect()
}

fn world_per_region(table: &[CanonicalRow]) {
	let date = match latest_date(table) {
		Some(d) => d,
		None => {
			println!("No data loaded");
			return
		},
	};
	println!("\nCovid-19 data as of {}\n", date.format("%d-%B-%y"));
	println!("{:<24} {:<28} {:>10} {:>10} {:>10} {:>10}", "Country_Region", "Province_State", "Deaths", "Recovered", "Confirmed", "Active");
	for ((country, province), t) in world_breakdown(table).iter() {
		println!("{:<24} {:<28} {:>10} {:>10} {:>10} {:>10}", country, province, t.deaths, t.recovered, t.confirmed, t.active);
	}
}

fn by_province_region(table: &[CanonicalRow]) {
	let country = match select_country(table) {
		Some(c) => c,
		None => return,
	};
	let metric = match select_metric(&country) {
		Some(m) => m,
		None => return,
	};
	let date = match latest_date(table) {
		Some(d) => d,
		None => {
			println!("No data loaded");
			return
		},
	};
	let rows: Vec<&CanonicalRow> = latest(table).into_iter()
		.filter(|r| &*r.country == country)
		.filter(|r| match r.province.as_deref() {
			Some(p) => !DROPPED_PROVINCES.contains(&p),
			// a per-province rollup has no place for country-level rows
			None => false,
		})
		.collect();
	if rows.is_empty() {
		println!("No province data for {}", country);
		return
	}
	let grouped = group_sum(rows, |r| r.province.clone().unwrap_or_default());
	let entries: Vec<(SmartString, CaseTotals)> = grouped.into_iter().collect();
	let labels: Vec<String> = entries.iter().map(|(p, _)| p.to_string()).collect();
	let values: Vec<f64> = entries.iter().map(|(_, t)| t.metric(metric).unwrap_or(f64::NAN)).collect();
	let when = date.format("%d-%B-%Y");
	let title = if metric == Metric::DeathRate {
		format!("{} (in %) for {} as of {}", metric.name(), country, when)
	} else {
		format!("{} for {} as of {}", metric.name(), country, when)
	};
	plot(&labels, &values, ChartKind::Bar, &title);

	if metric != Metric::DeathRate {
		let title = format!("{} per million for {} as of {}", metric.name(), country, when);
		plot_per_million(entries.iter(), metric, &title);
	}
}

fn top_countries(table: &[CanonicalRow]) {
	let top = match prompt_number("Enter number of top countries: ") {
		Some(v) => v as usize,
		None => return,
	};
	let metric = match select_metric("all") {
		Some(m) => m,
		None => return,
	};
	let (date, entries) = match latest_by_country(table) {
		Some(v) => v,
		None => {
			println!("No data loaded");
			return
		},
	};
	let when = date.format("%d-%B-%Y");
	let ranked = top_n(&entries, |(_, t)| t.metric(metric).unwrap_or(f64::NEG_INFINITY), top);
	if ranked.is_empty() {
		println!("No data loaded");
		return
	}
	println!("\n{:<24} {:>14}", "Country_Region", metric.name());
	for (country, totals) in ranked.iter().copied() {
		println!("{:<24} {:>14}", country, format_value(totals.metric(metric).unwrap_or(f64::NAN)));
	}
	let labels: Vec<String> = ranked.iter().map(|(c, _)| c.to_string()).collect();
	let values: Vec<f64> = ranked.iter().map(|(_, t)| t.metric(metric).unwrap_or(f64::NAN)).collect();
	let title = if metric == Metric::DeathRate {
		format!("{} (in %) for top-{} countries, as of {}", metric.name(), top, when)
	} else {
		format!("{} for top-{} countries, as of {}", metric.name(), top, when)
	};
	plot(&labels, &values, ChartKind::Bar, &title);

	if metric != Metric::DeathRate {
		// the per-million ranking is its own ordering, not the total one
		let per_million: Vec<(SmartString, f64)> = entries.iter()
			.filter_map(|(c, t)| {
				let v = t.metric(metric).and_then(|v| t.per_million(v))?;
				Some((c.clone(), v))
			})
			.collect();
		let ranked = top_n(&per_million, |(_, v)| *v, top);
		if ranked.is_empty() {
			println!("No population estimates available");
			return
		}
		let labels: Vec<String> = ranked.iter().map(|(c, _)| c.to_string()).collect();
		let values: Vec<f64> = ranked.iter().map(|(_, v)| *v).collect();
		let title = format!("{} per million of top-{} countries, as of {}", metric.name(), top, when);
		plot(&labels, &values, ChartKind::Bar, &title);
	}
}

fn preview(table: &[CanonicalRow]) {
	println!("First 5 rows of the combined table:");
	println!("---------------------------------------");
	for row in table.iter().take(5) {
		println!("{:?}", row);
	}
	let first = table.iter().map(|r| r.date).min();
	match (first, latest_date(table)) {
		(Some(a), Some(b)) => println!("{} rows spanning {} to {}", table.len(), a, b),
		_ => println!("0 rows"),
	}
}

fn report_latest_subset<F: Fn(&CaseTotals) -> bool>(table: &[CanonicalRow], header: &str, empty_msg: &str, pred: F) {
	let (date, entries) = match latest_by_country(table) {
		Some(v) => v,
		None => {
			println!("No data loaded");
			return
		},
	};
	println!("\nCovid-19 data for countries {}, as of {}\n", header, date.format("%d-%B-%Y"));
	let picked: Vec<&(SmartString, CaseTotals)> = entries.iter().filter(|(_, t)| pred(t)).collect();
	if picked.is_empty() {
		println!("{}", empty_msg);
		return
	}
	println!("{:<24} {:>10} {:>10} {:>10} {:>10}", "Country_Region", "Confirmed", "Deaths", "Recovered", "Active");
	for (country, t) in picked.iter().copied() {
		println!("{:<24} {:>10} {:>10} {:>10} {:>10}", country, t.confirmed, t.deaths, t.recovered, t.active);
	}
}

fn no_recover(table: &[CanonicalRow]) {
	report_latest_subset(
		table,
		"with no recovered cases",
		"No countries found with number of recovered = 0",
		|t| t.recovered == 0,
	)
}

fn all_died(table: &[CanonicalRow]) {
	report_latest_subset(
		table,
		"where all confirmed cases died",
		"No countries found with number of deaths = number of confirmed cases",
		|t| t.confirmed == t.deaths,
	)
}

fn all_recovered(table: &[CanonicalRow]) {
	report_latest_subset(
		table,
		"where all confirmed cases recovered",
		"No countries found where all confirmed cases recovered",
		|t| t.confirmed == t.recovered,
	)
}
