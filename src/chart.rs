#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
	Line,
	Bar,
}

static PLOT_WIDTH: usize = 72;
static PLOT_HEIGHT: usize = 18;
static LABEL_WIDTH: usize = 24;


pub(crate) fn format_value(v: f64) -> String {
	if !v.is_finite() {
		return "n/a".into()
	}
	if v.fract() == 0.0 && v.abs() < 1e15 {
		format!("{:.0}", v)
	} else {
		format!("{:.2}", v)
	}
}

/// Render one chart onto stdout. Labels and values run in parallel; NaN
/// values are skipped rather than plotted.
pub fn plot(labels: &[String], values: &[f64], kind: ChartKind, title: &str) {
	match kind {
		ChartKind::Line => plot_line(labels, values, title),
		ChartKind::Bar => plot_bar(labels, values, title),
	}
}

fn plot_bar(labels: &[String], values: &[f64], title: &str) {
	println!("\n{}", title);
	println!("{}", "-".repeat(title.len()));
	let max = values.iter().copied().filter(|v| v.is_finite()).fold(0.0f64, f64::max);
	for (label, value) in labels.iter().zip(values.iter()) {
		// char-wise, some region names are not ASCII
		let label: String = label.chars().take(LABEL_WIDTH).collect();
		if !value.is_finite() {
			println!("{:>width$} | {}", label, format_value(*value), width = LABEL_WIDTH);
			continue
		}
		let filled = if max > 0.0 && *value > 0.0 {
			((value / max) * PLOT_WIDTH as f64).round() as usize
		} else {
			0
		};
		println!("{:>width$} |{} {}", label, "#".repeat(filled), format_value(*value), width = LABEL_WIDTH);
	}
}

fn plot_line(labels: &[String], values: &[f64], title: &str) {
	println!("\n{}", title);
	println!("{}", "-".repeat(title.len()));
	// bucket-average down to terminal width
	let ncols = values.len().min(PLOT_WIDTH);
	if ncols == 0 {
		println!("(no data)");
		return
	}
	let mut cols: Vec<f64> = Vec::with_capacity(ncols);
	for c in 0..ncols {
		let lo = c * values.len() / ncols;
		let hi = ((c + 1) * values.len() / ncols).max(lo + 1);
		let bucket: Vec<f64> = values[lo..hi].iter().copied().filter(|v| v.is_finite()).collect();
		if bucket.is_empty() {
			cols.push(f64::NAN);
		} else {
			cols.push(bucket.iter().sum::<f64>() / bucket.len() as f64);
		}
	}
	let finite: Vec<f64> = cols.iter().copied().filter(|v| v.is_finite()).collect();
	if finite.is_empty() {
		println!("(no data)");
		return
	}
	let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
	let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
	let span = if max > min { max - min } else { 1.0 };

	let mut grid = vec![vec![' '; ncols]; PLOT_HEIGHT];
	for (c, v) in cols.iter().enumerate() {
		if !v.is_finite() {
			continue
		}
		let r = ((v - min) / span * (PLOT_HEIGHT - 1) as f64).round() as usize;
		grid[PLOT_HEIGHT - 1 - r][c] = '*';
	}
	for (i, line) in grid.iter().enumerate() {
		let tag = if i == 0 {
			format_value(max)
		} else if i == PLOT_HEIGHT - 1 {
			format_value(min)
		} else {
			String::new()
		};
		let line: String = line.iter().collect();
		println!("{:>12} |{}", tag, line);
	}
	println!("{:>12} +{}", "", "-".repeat(ncols));
	match (labels.first(), labels.last()) {
		(Some(first), Some(last)) if labels.len() > 1 => {
			println!("{:>12}  {}{:>pad$}", "", first, last, pad = ncols.saturating_sub(first.len()).max(last.len()));
		},
		(Some(first), _) => {
			println!("{:>12}  {}", "", first);
		},
		_ => (),
	}
}
