use std::fs;
use std::io;
use std::io::{Read, Write};
use std::path::Path;

use flate2;


pub fn magic_open<P: AsRef<Path>>(path: P) -> io::Result<Box<dyn Read>> {
	let path = path.as_ref();
	match path.extension() {
		Some(x) if x == "gz" => {
			Ok(Box::new(flate2::read::GzDecoder::new(fs::File::open(path)?)))
		},
		_ => Ok(Box::new(fs::File::open(path)?)),
	}
}

/// Write via a sibling temp file and rename over the target, so that a
/// crash mid-write leaves the previous contents intact. Compression is
/// chosen by the extension of the final path, not the temp path.
pub fn replace_file<P: AsRef<Path>, F: FnOnce(&mut dyn Write) -> io::Result<()>>(path: P, f: F) -> io::Result<()> {
	let path = path.as_ref();
	let mut tmp = path.as_os_str().to_os_string();
	tmp.push(".tmp");
	let file = fs::File::create(&tmp)?;
	match path.extension() {
		Some(x) if x == "gz" => {
			let mut w = flate2::write::GzEncoder::new(file, flate2::Compression::default());
			f(&mut w)?;
			w.finish()?.sync_all()?;
		},
		_ => {
			let mut w = file;
			f(&mut w)?;
			w.sync_all()?;
		},
	}
	fs::rename(&tmp, path)
}
