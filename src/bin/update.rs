use covid_world::{fetch_missing, merge, write_table, HttpSource, SnapshotStore};


static RAW_STORE_PATH: &str = "raw_data.json.gz";
static CLEAN_TABLE_PATH: &str = "cleaned_data.csv.gz";


fn main() -> Result<(), Box<dyn std::error::Error>> {
	let mut store = SnapshotStore::open(RAW_STORE_PATH)?;
	let found = fetch_missing(&HttpSource::new(), &mut store)?;
	println!("Total dates: {}, found new: {}", store.len(), found);
	if found == 0 {
		println!("dataset already current");
		return Ok(())
	}
	let table = merge(&store);
	write_table(CLEAN_TABLE_PATH, &table)?;
	match store.latest_date() {
		Some(date) => println!("combined table rebuilt: {} rows up to {}", table.len(), date),
		None => println!("no data fetched yet"),
	}
	Ok(())
}
