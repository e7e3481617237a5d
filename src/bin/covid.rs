use std::path::Path;

use covid_world::{fetch_missing, load_table, merge, select_command, write_table, Command, HttpSource, SnapshotStore};


static RAW_STORE_PATH: &str = "raw_data.json.gz";
static CLEAN_TABLE_PATH: &str = "cleaned_data.csv.gz";


fn main() -> Result<(), Box<dyn std::error::Error>> {
	println!("Welcome. You are running Covid-19 data analysis.\n");

	let mut store = SnapshotStore::open(RAW_STORE_PATH)?;
	println!("checking for new daily reports ...");
	let found = fetch_missing(&HttpSource::new(), &mut store)?;
	println!("Total dates: {}, found new: {}", store.len(), found);

	let table = if found > 0 || !Path::new(CLEAN_TABLE_PATH).exists() {
		println!("rebuilding combined table ...");
		let table = merge(&store);
		write_table(CLEAN_TABLE_PATH, &table)?;
		table
	} else {
		load_table(CLEAN_TABLE_PATH)?
	};
	println!("{} rows loaded", table.len());

	loop {
		let cmd = select_command();
		if cmd == Command::Exit {
			break
		}
		cmd.run(&table);
	}
	Ok(())
}
