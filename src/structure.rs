//! Header-row inference and canonical column mapping for statements whose layout is
//! not known in advance.

use std::collections::BTreeMap;
use std::fmt;

use crate::normalize::fold_text;
use crate::tabular::Grid;

/// Only the first rows are considered when looking for the header.
pub const HEADER_SCAN_ROWS: usize = 20;
pub const KEYWORD_WEIGHT: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ColumnRole {
    Date,
    Description,
    Amount,
    Debit,
    Credit,
    Reference,
}

impl ColumnRole {
    /// Order in which a column's name is tested when assigning roles.
    pub const MAPPING_PRIORITY: [ColumnRole; 6] = [
        Self::Date,
        Self::Description,
        Self::Debit,
        Self::Credit,
        Self::Amount,
        Self::Reference,
    ];

    /// The roles that contribute to the header score.
    pub const SCORED: [ColumnRole; 5] = [
        Self::Date,
        Self::Description,
        Self::Amount,
        Self::Debit,
        Self::Credit,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Description => "description",
            Self::Amount => "amount",
            Self::Debit => "debit",
            Self::Credit => "credit",
            Self::Reference => "reference",
        }
    }

    /// Folded (lowercase, accent-free) keywords that identify the role.
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Self::Date => &["date", "fecha", "datum", "data", "posted"],
            Self::Description => &[
                "description", "descripcion", "concepto", "detalle", "details", "memo", "payee",
                "narrative", "movimiento", "transaction", "descricao", "libelle",
            ],
            Self::Amount => &["amount", "importe", "monto", "betrag", "montant", "total"],
            Self::Debit => &["debit", "debito", "cargo", "withdrawal", "egreso", "salida", "paid out"],
            Self::Credit => &["credit", "credito", "abono", "deposit", "ingreso", "entrada", "paid in"],
            Self::Reference => &["reference", "referencia", "ref", "comprobante", "cheque", "check", "numero"],
        }
    }

    fn matches(&self, folded: &str) -> bool {
        self.keywords().iter().any(|k| folded.contains(k))
    }
}

impl fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Role → column index. Each role maps to at most one column.
pub type ColumnMap = BTreeMap<ColumnRole, usize>;

pub fn score_row(row: &[String]) -> u32 {
    let folded = fold_text(&row.join(" "));
    ColumnRole::SCORED
        .iter()
        .filter(|role| role.matches(&folded))
        .count() as u32
        * KEYWORD_WEIGHT
}

/// Index of the header row among the first [`HEADER_SCAN_ROWS`] rows. The earliest row
/// wins a tie; row 0 when nothing scores.
pub fn detect_header_row(grid: &Grid) -> usize {
    let mut best = (0usize, 0u32);
    for (idx, row) in grid.iter().take(HEADER_SCAN_ROWS).enumerate() {
        let score = score_row(row);
        if score > best.1 {
            best = (idx, score);
        }
    }
    best.0
}

/// Assign canonical roles to header cells. A column takes the first free role it
/// matches in [`ColumnRole::MAPPING_PRIORITY`] order; the first column to claim a
/// role keeps it.
pub fn map_columns(headers: &[String]) -> ColumnMap {
    let mut map = ColumnMap::new();
    for (idx, header) in headers.iter().enumerate() {
        let folded = fold_text(header);
        if folded.trim().is_empty() {
            continue;
        }
        let role = ColumnRole::MAPPING_PRIORITY
            .into_iter()
            .find(|role| !map.contains_key(role) && role.matches(&folded));
        if let Some(role) = role {
            map.insert(role, idx);
        }
    }
    map
}

/// A statement split into its header and body, with the roles found in the header.
#[derive(Debug, Clone)]
pub struct DetectedStructure {
    pub header_row: usize,
    pub headers: Vec<String>,
    pub columns: ColumnMap,
    pub body: Grid,
}

impl DetectedStructure {
    /// Re-read `grid` using the detected header row as the schema row.
    pub fn detect(grid: Grid) -> Self {
        let header_row = detect_header_row(&grid);
        let mut rows = grid.into_iter().skip(header_row);
        let headers = rows.next().unwrap_or_default();
        let columns = map_columns(&headers);
        tracing::debug!(header_row, ?columns, "detected statement structure");
        Self {
            header_row,
            headers,
            columns,
            body: rows.collect(),
        }
    }

    /// Raw layout: row 0 is the header and no column has a role.
    pub fn raw(grid: Grid) -> Self {
        let mut rows = grid.into_iter();
        let headers = rows.next().unwrap_or_default();
        Self {
            header_row: 0,
            headers,
            columns: ColumnMap::new(),
            body: rows.collect(),
        }
    }

    pub fn describe_columns(&self) -> String {
        self.columns
            .iter()
            .map(|(role, idx)| {
                let name = self.headers.get(*idx).map(String::as_str).unwrap_or("?");
                format!("{role}={name}")
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_header_detection_picks_best_row() {
        let mut grid: Grid = (0..20).map(|i| row(&[&format!("line {i}"), "x"])).collect();
        grid[1] = row(&["Fecha de emisión", "Detalle"]);
        grid[7] = row(&["Débito", "Crédito"]);
        grid[4] = row(&["Fecha", "Descripción", "Importe", "Débito", "Crédito"]);
        assert_eq!(detect_header_row(&grid), 4);
        assert_eq!(score_row(&grid[4]), 15);
        assert_eq!(score_row(&grid[1]), 6);
    }

    #[test]
    fn test_header_detection_defaults_to_first_row() {
        let grid: Grid = vec![row(&["a", "b"]), row(&["c", "d"])];
        assert_eq!(detect_header_row(&grid), 0);
        assert_eq!(detect_header_row(&Vec::new()), 0);
    }

    #[test]
    fn test_header_detection_ignores_rows_past_scan_window() {
        let mut grid: Grid = (0..30).map(|_| row(&["noise"])).collect();
        grid[3] = row(&["Date", "Memo"]);
        grid[25] = row(&["Date", "Description", "Amount", "Debit", "Credit"]);
        assert_eq!(detect_header_row(&grid), 3);
    }

    #[test]
    fn test_header_detection_tie_keeps_earliest() {
        let grid: Grid = vec![row(&["Title"]), row(&["Date", "Amount"]), row(&["Date", "Amount"])];
        assert_eq!(detect_header_row(&grid), 1);
    }

    #[test]
    fn test_map_columns_first_column_wins() {
        let headers = row(&["Fecha Operación", "Fecha Valor", "Concepto", "Importe", "Saldo"]);
        let map = map_columns(&headers);
        assert_eq!(map.get(&ColumnRole::Date), Some(&0));
        assert_eq!(map.get(&ColumnRole::Description), Some(&2));
        assert_eq!(map.get(&ColumnRole::Amount), Some(&3));
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn test_map_columns_debit_credit_before_amount() {
        let headers = row(&["Date", "Description", "Debit Amount", "Credit Amount", "Ref"]);
        let map = map_columns(&headers);
        assert_eq!(map.get(&ColumnRole::Debit), Some(&2));
        assert_eq!(map.get(&ColumnRole::Credit), Some(&3));
        assert_eq!(map.get(&ColumnRole::Amount), None);
        assert_eq!(map.get(&ColumnRole::Reference), Some(&4));
    }

    #[test]
    fn test_detect_splits_header_and_body() {
        let grid: Grid = vec![
            row(&["Bank of Somewhere"]),
            row(&["Date", "Description", "Amount"]),
            row(&["2025-01-10", "RENT", "-900"]),
        ];
        let s = DetectedStructure::detect(grid);
        assert_eq!(s.header_row, 1);
        assert_eq!(s.body.len(), 1);
        assert_eq!(s.describe_columns(), "date=Date, description=Description, amount=Amount");
    }
}
