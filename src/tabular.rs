use std::path::Path;

use crate::error::{DuesError, Result};

/// Raw cells, row-major, as read from the file. Rows may be ragged.
pub type Grid = Vec<Vec<String>>;

// ---------------------------------------------------------------------------
// Reader kinds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SheetFormat {
    Csv,
    #[cfg(feature = "xlsx")]
    Spreadsheet,
}

impl SheetFormat {
    pub fn for_path(file_path: &Path) -> Self {
        let ext = file_path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            #[cfg(feature = "xlsx")]
            "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => Self::Spreadsheet,
            _ => Self::Csv,
        }
    }

    /// Strict read: any decoding problem is a detection failure.
    pub fn read(&self, file_path: &Path) -> Result<Grid> {
        match self {
            Self::Csv => read_csv(file_path),
            #[cfg(feature = "xlsx")]
            Self::Spreadsheet => read_spreadsheet(file_path),
        }
    }

    /// Best-effort read used when the strict read fails: invalid UTF-8 is replaced.
    pub fn read_lossy(&self, file_path: &Path) -> Result<Grid> {
        match self {
            Self::Csv => read_csv_lossy(file_path),
            #[cfg(feature = "xlsx")]
            Self::Spreadsheet => read_spreadsheet(file_path),
        }
    }
}

/// Pick the delimiter that shows up most in the first few non-blank lines.
fn sniff_delimiter(file_path: &Path) -> Result<u8> {
    let data = std::fs::read(file_path)?;
    let head = String::from_utf8_lossy(&data[..data.len().min(8192)]).into_owned();
    let lines: Vec<&str> = head.lines().filter(|l| !l.trim().is_empty()).take(10).collect();
    let best = [b',', b';', b'\t', b'|']
        .into_iter()
        .map(|d| {
            let count: usize = lines.iter().map(|l| l.matches(d as char).count()).sum();
            (d, count)
        })
        .max_by_key(|(_, count)| *count);
    Ok(match best {
        Some((d, count)) if count > 0 => d,
        _ => b',',
    })
}

fn csv_reader(file_path: &Path) -> Result<csv::Reader<std::io::BufReader<std::fs::File>>> {
    let delimiter = sniff_delimiter(file_path)?;
    let file = std::fs::File::open(file_path)?;
    Ok(csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(std::io::BufReader::new(file)))
}

fn read_csv(file_path: &Path) -> Result<Grid> {
    let mut rdr = csv_reader(file_path)?;
    let mut grid = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|e| DuesError::StructureDetection(format!("{}: {e}", file_path.display())))?;
        grid.push(record.iter().map(|f| f.trim().to_string()).collect());
    }
    Ok(grid)
}

fn read_csv_lossy(file_path: &Path) -> Result<Grid> {
    let mut rdr = csv_reader(file_path)?;
    let mut grid = Vec::new();
    for result in rdr.byte_records() {
        let Ok(record) = result else { continue };
        grid.push(
            record
                .iter()
                .map(|f| String::from_utf8_lossy(f).trim().to_string())
                .collect(),
        );
    }
    Ok(grid)
}

#[cfg(feature = "xlsx")]
fn read_spreadsheet(file_path: &Path) -> Result<Grid> {
    use calamine::{Data, Reader};

    let mut workbook = calamine::open_workbook_auto(file_path)
        .map_err(|e| DuesError::StructureDetection(format!("Failed to open spreadsheet: {e}")))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| DuesError::StructureDetection("Spreadsheet has no sheets".to_string()))?
        .map_err(|e| DuesError::StructureDetection(format!("Failed to read first sheet: {e}")))?;

    let grid = range
        .rows()
        .map(|row| {
            row.iter()
                .map(|cell| match cell {
                    Data::Empty => String::new(),
                    Data::String(s) => s.trim().to_string(),
                    Data::Float(f) => f.to_string(),
                    Data::Int(i) => i.to_string(),
                    Data::Bool(b) => b.to_string(),
                    Data::DateTime(dt) => crate::normalize::excel_serial_to_date(dt.as_f64())
                        .map(|d| d.format("%Y-%m-%d").to_string())
                        .unwrap_or_default(),
                    Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
                    Data::Error(_) => String::new(),
                })
                .collect()
        })
        .collect();
    Ok(grid)
}
