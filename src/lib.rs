use chrono::{NaiveDate, Utc};

mod ioutil;
mod store;
mod fetch;
mod normalize;
mod query;
mod chart;
mod ui;

pub use ioutil::{magic_open, replace_file};
pub use store::*;
pub use fetch::*;
pub use normalize::*;
pub use query::*;
pub use chart::*;
pub use ui::*;


pub fn naive_today() -> NaiveDate {
	Utc::today().naive_local()
}

/// Date of the first published daily report.
pub fn global_start_date() -> NaiveDate {
	NaiveDate::from_ymd(2020, 1, 22)
}
