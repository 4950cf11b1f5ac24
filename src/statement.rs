use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::{DuesError, Result};
use crate::models::BankTransactionRow;
use crate::normalize::{parse_amount_checked, parse_date, ParsedAmount};
use crate::structure::{ColumnMap, ColumnRole, DetectedStructure};
use crate::tabular::SheetFormat;

const REQUIRED_COLUMNS: &str = "date, description, amount (or debit/credit)";

#[derive(Debug, Clone, Serialize)]
pub struct SkippedRow {
    pub row_number: usize,
    pub reason: String,
}

/// A bank export after structure detection and normalization.
#[derive(Debug, Clone)]
pub struct Statement {
    pub source: PathBuf,
    pub structure: DetectedStructure,
    /// True when the strict read failed and the file was loaded raw.
    pub fell_back: bool,
    pub rows: Vec<BankTransactionRow>,
    pub skipped: Vec<SkippedRow>,
}

impl Statement {
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let min = self.rows.iter().map(|r| r.date).min()?;
        let max = self.rows.iter().map(|r| r.date).max()?;
        Some((min, max))
    }

    pub fn row(&self, row_number: usize) -> Result<&BankTransactionRow> {
        self.rows
            .iter()
            .find(|r| r.row_number == row_number)
            .ok_or(DuesError::UnknownRow(row_number))
    }
}

/// Load a statement file. `manual` overrides detected roles column by column.
pub fn load_statement(file_path: &Path, manual: &ColumnMap) -> Result<Statement> {
    let format = SheetFormat::for_path(file_path);
    let (mut structure, fell_back) = match format.read(file_path) {
        Ok(grid) => (DetectedStructure::detect(grid), false),
        Err(DuesError::StructureDetection(reason)) => {
            tracing::warn!(file = %file_path.display(), %reason, "structure detection failed, loading raw");
            (DetectedStructure::raw(format.read_lossy(file_path)?), true)
        }
        Err(e) => return Err(e),
    };
    apply_manual_mapping(&mut structure.columns, manual);

    check_required(&structure, fell_back)?;

    let (rows, skipped) = extract_rows(&structure);
    tracing::info!(
        file = %file_path.display(),
        parsed = rows.len(),
        skipped = skipped.len(),
        "loaded statement"
    );
    Ok(Statement {
        source: file_path.to_path_buf(),
        structure,
        fell_back,
        rows,
        skipped,
    })
}

const AMOUNT_SOURCES: [ColumnRole; 3] = [ColumnRole::Amount, ColumnRole::Debit, ColumnRole::Credit];

/// Operator mapping wins over detection. Naming any amount source discards every
/// detected amount source, and a reassigned column loses its detected role.
fn apply_manual_mapping(columns: &mut ColumnMap, manual: &ColumnMap) {
    if manual.is_empty() {
        return;
    }
    if manual.keys().any(|r| AMOUNT_SOURCES.contains(r)) {
        columns.retain(|role, _| !AMOUNT_SOURCES.contains(role));
    }
    columns.retain(|_, idx| !manual.values().any(|m| *m == *idx));
    for (role, idx) in manual {
        columns.insert(*role, *idx);
    }
    tracing::debug!(?columns, "applied manual column mapping");
}

fn check_required(structure: &DetectedStructure, fell_back: bool) -> Result<()> {
    let cols = &structure.columns;
    let has_amount = AMOUNT_SOURCES.iter().any(|r| cols.contains_key(r));
    if cols.contains_key(&ColumnRole::Date) && cols.contains_key(&ColumnRole::Description) && has_amount {
        return Ok(());
    }
    if fell_back {
        return Err(DuesError::StructureDetection(format!(
            "required columns {REQUIRED_COLUMNS} not found; supply a manual column mapping"
        )));
    }
    Err(DuesError::MissingColumns {
        required: REQUIRED_COLUMNS.to_string(),
        detected: structure.describe_columns(),
    })
}

fn extract_rows(structure: &DetectedStructure) -> (Vec<BankTransactionRow>, Vec<SkippedRow>) {
    let mut rows = Vec::new();
    let mut skipped = Vec::new();

    for (idx, cells) in structure.body.iter().enumerate() {
        let row_number = idx + 1;
        if cells.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        let cell = |role: ColumnRole| {
            structure
                .columns
                .get(&role)
                .and_then(|&i| cells.get(i))
                .map(|c| c.trim())
                .unwrap_or("")
        };

        let date_raw = cell(ColumnRole::Date);
        let Some(date) = parse_date(date_raw) else {
            let reason = format!("unreadable date '{date_raw}'");
            tracing::warn!(row_number, %reason, "skipping statement row");
            skipped.push(SkippedRow { row_number, reason });
            continue;
        };
        let signed_amount = match row_amount(&cell) {
            Ok(v) => v,
            Err(reason) => {
                tracing::warn!(row_number, %reason, "skipping statement row");
                skipped.push(SkippedRow { row_number, reason });
                continue;
            }
        };

        rows.push(BankTransactionRow {
            row_number,
            date,
            description: cell(ColumnRole::Description).to_string(),
            signed_amount,
            raw_reference: cell(ColumnRole::Reference).to_string(),
        });
    }
    (rows, skipped)
}

/// Signed amount from either a single amount column or a debit/credit pair
/// (credits positive, debits negative).
fn row_amount<'a>(cell: &impl Fn(ColumnRole) -> &'a str) -> std::result::Result<f64, String> {
    let amount_raw = cell(ColumnRole::Amount);
    if !amount_raw.is_empty() {
        return match parse_amount_checked(amount_raw) {
            ParsedAmount::Parsed(v) => Ok(v),
            ParsedAmount::Unparseable(raw) => Err(format!("unreadable amount '{raw}'")),
        };
    }

    let mut total = None;
    for (role, sign) in [(ColumnRole::Credit, 1.0), (ColumnRole::Debit, -1.0)] {
        let raw = cell(role);
        if raw.is_empty() {
            continue;
        }
        match parse_amount_checked(raw) {
            ParsedAmount::Parsed(v) => *total.get_or_insert(0.0) += sign * v.abs(),
            ParsedAmount::Unparseable(raw) => return Err(format!("unreadable {role} '{raw}'")),
        }
    }
    total.ok_or_else(|| "no amount".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_statement_with_preamble() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "stmt.csv", b"\
Banco Ejemplo
Cuenta;0001-2345

Fecha;Concepto;Importe;Saldo
10/01/2025;LUZ ENERO;-1.234,56;10.000,00
13/01/2025;TRANSFERENCIA;500,00;10.500,00
Saldo final;;;10.500,00
");
        let stmt = load_statement(&path, &ColumnMap::new()).unwrap();
        assert!(!stmt.fell_back);
        assert_eq!(stmt.rows.len(), 2);
        assert_eq!(stmt.rows[0].signed_amount, -1234.56);
        assert_eq!(stmt.rows[0].description, "LUZ ENERO");
        assert_eq!(stmt.rows[0].row_number, 1);
        assert_eq!(stmt.skipped.len(), 1);
        assert_eq!(stmt.skipped[0].row_number, 3);
        assert_eq!(
            stmt.date_range(),
            Some((
                NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
                NaiveDate::from_ymd_opt(2025, 1, 13).unwrap()
            ))
        );
    }

    #[test]
    fn test_debit_credit_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "stmt.csv", b"\
Date,Description,Debit,Credit,Reference
2025-01-10,RENT,900.00,,CHK 1001
2025-01-11,REFUND,,25.50,
");
        let stmt = load_statement(&path, &ColumnMap::new()).unwrap();
        assert_eq!(stmt.rows[0].signed_amount, -900.0);
        assert_eq!(stmt.rows[0].raw_reference, "CHK 1001");
        assert_eq!(stmt.rows[1].signed_amount, 25.5);
    }

    #[test]
    fn test_unparseable_amount_is_skipped_not_zeroed() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "stmt.csv", b"\
Date,Description,Amount
2025-01-10,RENT,n/a
2025-01-11,GAS,-40
");
        let stmt = load_statement(&path, &ColumnMap::new()).unwrap();
        assert_eq!(stmt.rows.len(), 1);
        assert_eq!(stmt.skipped[0].reason, "unreadable amount 'n/a'");
    }

    #[test]
    fn test_missing_columns_lists_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "stmt.csv", b"Date,Amount\n2025-01-10,-40\n");
        match load_statement(&path, &ColumnMap::new()) {
            Err(DuesError::MissingColumns { detected, .. }) => {
                assert_eq!(detected, "date=Date, amount=Amount");
            }
            other => panic!("expected MissingColumns, got {other:?}"),
        }
    }

    #[test]
    fn test_manual_mapping_rescues_unknown_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "stmt.csv", b"When,What,HowMuch\n2025-01-10,RENT,-900\n");
        let manual = ColumnMap::from([
            (ColumnRole::Date, 0),
            (ColumnRole::Description, 1),
            (ColumnRole::Amount, 2),
        ]);
        let stmt = load_statement(&path, &manual).unwrap();
        assert_eq!(stmt.rows.len(), 1);
        assert_eq!(stmt.rows[0].signed_amount, -900.0);
    }

    #[test]
    fn test_manual_debit_credit_replaces_detected_amount() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "stmt.csv", b"\
Fecha;Detalle;Total Cuotas;Debito;Credito
10/01/2025;LUZ;3;1.234,56;
");
        let detected = load_statement(&path, &ColumnMap::new()).unwrap();
        assert_eq!(detected.structure.columns.get(&ColumnRole::Amount), Some(&2));

        let manual = ColumnMap::from([(ColumnRole::Debit, 3), (ColumnRole::Credit, 4)]);
        let stmt = load_statement(&path, &manual).unwrap();
        assert_eq!(stmt.structure.columns.get(&ColumnRole::Amount), None);
        assert_eq!(stmt.rows[0].signed_amount, -1234.56);
    }

    #[test]
    fn test_manual_mapping_frees_reassigned_column() {
        let mut columns = ColumnMap::from([
            (ColumnRole::Date, 0),
            (ColumnRole::Description, 1),
            (ColumnRole::Reference, 2),
        ]);
        apply_manual_mapping(&mut columns, &ColumnMap::from([(ColumnRole::Description, 2)]));
        assert_eq!(
            columns,
            ColumnMap::from([(ColumnRole::Date, 0), (ColumnRole::Description, 2)])
        );
    }

    #[test]
    fn test_undecodable_file_falls_back_to_raw_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "stmt.csv", b"Fecha,Descripci\xf3n,Importe\n10/01/2025,GAS,-50\n");
        match load_statement(&path, &ColumnMap::new()) {
            Err(DuesError::StructureDetection(msg)) => assert!(msg.contains("manual column mapping")),
            other => panic!("expected StructureDetection, got {other:?}"),
        }
        let manual = ColumnMap::from([
            (ColumnRole::Date, 0),
            (ColumnRole::Description, 1),
            (ColumnRole::Amount, 2),
        ]);
        let stmt = load_statement(&path, &manual).unwrap();
        assert!(stmt.fell_back);
        assert_eq!(stmt.rows[0].signed_amount, -50.0);
    }

    #[cfg(feature = "xlsx")]
    #[test]
    fn test_spreadsheet_with_preamble() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/statement.xlsx");
        let stmt = load_statement(&path, &ColumnMap::new()).unwrap();
        assert_eq!(stmt.structure.header_row, 2);
        assert!(!stmt.fell_back);
        assert!(stmt.skipped.is_empty());
        assert_eq!(stmt.rows.len(), 2);
        assert_eq!(stmt.rows[0].date, NaiveDate::from_ymd_opt(2025, 1, 10).unwrap());
        assert_eq!(stmt.rows[0].signed_amount, -1234.56);
        assert_eq!(stmt.rows[0].raw_reference, "F-1");
        assert_eq!(stmt.rows[1].description, "AGUA");
        assert_eq!(stmt.rows[1].signed_amount, -80.0);
        assert_eq!(stmt.rows[1].raw_reference, "");
    }

    #[test]
    fn test_row_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "stmt.csv", b"Date,Description,Amount\n2025-01-10,RENT,-900\n");
        let stmt = load_statement(&path, &ColumnMap::new()).unwrap();
        assert_eq!(stmt.row(1).unwrap().description, "RENT");
        assert!(matches!(stmt.row(2), Err(DuesError::UnknownRow(2))));
    }
}
