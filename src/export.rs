use chrono::{DateTime, TimeZone};
use failure::{Error, ResultExt};
use std::fmt::Display;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use crate::{RankedGameRow, COLUMNS};

/// bgg_dump_<total>_<YYYYMMDDHHMMSS>.csv
pub fn file_name<Tz: TimeZone>(total: u32, at: &DateTime<Tz>) -> String
    where Tz::Offset: Display {
    format!("bgg_dump_{}_{}.csv", total, at.format("%Y%m%d%H%M%S"))
}

fn needs_quotes(field: &str) -> bool {
    field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r')
}

pub fn write_row<W: Write>(mut w: W, row: &[String]) -> Result<(), Error> {
    let mut first = true;
    for cell in row {
        if !first { write!(w, ",")?; } else { first = false; }
        if needs_quotes(cell) {
            write!(w, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            write!(w, "{}", cell)?;
        }
    }
    writeln!(w)?;
    Ok(())
}

/// Header line followed by one line per row.
pub fn write_rows<W: Write>(mut w: W, rows: &[RankedGameRow]) -> Result<(), Error> {
    let header: Vec<String> = COLUMNS.iter().map(|c| c.to_string()).collect();
    write_row(&mut w, &header)?;
    for row in rows {
        write_row(&mut w, &row.to_record())?;
    }
    Ok(())
}

pub fn write_csv(path: &Path, rows: &[RankedGameRow]) -> Result<(), Error> {
    let file = File::create(path)
        .with_context(|_| format!("Can't create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    write_rows(&mut out, rows)?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GameStats;
    use chrono::Utc;

    #[test]
    fn file_name_has_fourteen_digit_stamp() {
        let at = Utc.with_ymd_and_hms(2026, 10, 18, 9, 5, 3).unwrap();
        assert_eq!(file_name(20, &at), "bgg_dump_20_20261018090503.csv");
    }

    #[test]
    fn cells_with_separators_are_quoted() {
        let mut buf = Vec::new();
        let row = vec!["1".to_string(), "Brass, \"Lancashire\"".to_string(), String::new()];
        write_row(&mut buf, &row).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "1,\"Brass, \"\"Lancashire\"\"\",\n");
    }

    #[test]
    fn header_comes_first() {
        let rows = vec![
            RankedGameRow::new(1, GameStats { id: 224517, name: "Brass: Birmingham".into(), ..GameStats::default() }),
            RankedGameRow::new(2, GameStats { id: 161936, name: "Pandemic Legacy".into(), ..GameStats::default() })
        ];
        let mut buf = Vec::new();
        write_rows(&mut buf, &rows).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Rank,Name,Year,Rating,Weight,"));
        assert!(lines[0].ends_with(",Playing Time Min,Playing Time Max,Type"));
        assert!(lines[1].starts_with("1,Brass: Birmingham,"));
        assert!(lines[2].starts_with("2,Pandemic Legacy,"));
    }
}
