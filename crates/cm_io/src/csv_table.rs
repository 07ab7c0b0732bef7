//! CSV tables → `TabularDataset`.
//!
//! The first column is `Year`. Empty cells are explicit gaps; every cell of a
//! kept column must parse as a number. Which headers belong to which entity depends on the
//! layout: `<Entity>_<Column>` in a shared table, or plain column names in a
//! table per entity. Column semantics come from the manifest, never from data.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use cm_core::{ColumnId, ColumnSemantics, DataPoint, DatasetBuilder, DatasetId, EntityId, TabularDataset, Year};
use log::debug;

use crate::manifest::{Layout, ResolvedDataset};
use crate::IoError;

const MAX_TABLE_BYTES: u64 = 16 * 1024 * 1024;
const MAX_ROWS: usize = 10_000;

/// A parsed table: the year index plus the raw cells of every other header.
/// Cells are converted to numbers only for the columns a dataset keeps.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    pub years: Vec<Year>,
    pub columns: Vec<(String, Vec<String>)>,
}

impl RawTable {
    /// Numeric points of one column; empty cells are gaps.
    pub fn points(&self, name: &str, cells: &[String]) -> Result<Vec<DataPoint>, IoError> {
        self.years
            .iter()
            .zip(cells)
            .enumerate()
            .map(|(row, (&year, cell))| {
                if cell.is_empty() {
                    return Ok(DataPoint::gap(year));
                }
                cell.replace(',', "")
                    .parse::<f64>()
                    .map(|v| DataPoint::new(year, v))
                    .map_err(|_| IoError::Csv(format!("line {}, column {name}: bad number {cell:?}", row + 2)))
            })
            .collect()
    }
}

pub fn read_table(path: &Path) -> Result<RawTable, IoError> {
    let f = File::open(path).map_err(|e| IoError::Read(format!("{} ({e})", path.display())))?;
    let mut buf = Vec::new();
    f.take(MAX_TABLE_BYTES + 1)
        .read_to_end(&mut buf)
        .map_err(|e| IoError::Read(format!("{} ({e})", path.display())))?;
    if buf.len() as u64 > MAX_TABLE_BYTES {
        return Err(IoError::Limit(format!("{} exceeds {MAX_TABLE_BYTES} bytes", path.display())));
    }
    parse_table(&buf).map_err(|e| match e {
        IoError::Csv(msg) => IoError::Csv(format!("{}: {msg}", path.display())),
        other => other,
    })
}

pub fn parse_table(bytes: &[u8]) -> Result<RawTable, IoError> {
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).trim(csv::Trim::All).from_reader(bytes);

    let headers = rdr.headers()?.clone();
    let mut it = headers.iter();
    match it.next() {
        Some(h) if h.eq_ignore_ascii_case("year") => {}
        other => return Err(IoError::Csv(format!("first column must be Year, found {other:?}"))),
    }
    let mut columns: Vec<(String, Vec<String>)> = it.map(|h| (h.to_string(), Vec::new())).collect();
    let mut years = Vec::new();

    for (row, record) in rdr.records().enumerate() {
        let record = record?;
        if row >= MAX_ROWS {
            return Err(IoError::Limit(format!("more than {MAX_ROWS} rows")));
        }
        let year_cell = record.get(0).unwrap_or_default();
        let year: Year = year_cell
            .parse()
            .map_err(|_| IoError::Csv(format!("line {}: bad year {year_cell:?}", row + 2)))?;
        years.push(year);

        for (i, (_, cells)) in columns.iter_mut().enumerate() {
            cells.push(record.get(i + 1).unwrap_or_default().to_string());
        }
    }

    Ok(RawTable { years, columns })
}

/// Longest declared entity whose `<entity>_` prefixes the header.
fn split_prefixed<'a>(header: &'a str, entities: &'a [EntityId]) -> Option<(&'a EntityId, &'a str)> {
    entities
        .iter()
        .filter_map(|e| {
            let rest = header.strip_prefix(e.as_str())?.strip_prefix('_')?;
            (!rest.is_empty()).then_some((e, rest))
        })
        .max_by_key(|(e, _)| e.as_str().len())
}

fn column_id(name: &str) -> Result<ColumnId, IoError> {
    name.parse().map_err(|_| IoError::Csv(format!("column name {name:?} is not a valid token")))
}

/// Build one dataset from its resolved files.
pub fn load_dataset(spec: &ResolvedDataset) -> Result<TabularDataset, IoError> {
    let cumulative: BTreeSet<&ColumnId> = spec.cumulative_columns.iter().collect();
    let semantics = |c: &ColumnId| {
        if cumulative.contains(c) {
            ColumnSemantics::Cumulative
        } else {
            ColumnSemantics::Annual
        }
    };

    let mut b = DatasetBuilder::new(spec.id.clone());
    let mut seen: BTreeSet<(EntityId, ColumnId)> = BTreeSet::new();
    let mut add = |b: &mut DatasetBuilder, entity: &EntityId, column: ColumnId, points: Vec<DataPoint>| {
        if !seen.insert((entity.clone(), column.clone())) {
            return Err(IoError::Dataset(format!("{}: {entity}/{column} defined twice", spec.id)));
        }
        b.declare(column.clone(), semantics(&column));
        b.push_series(entity.clone(), column, points);
        Ok(())
    };

    for file in &spec.files {
        let table = read_table(&file.path)?;
        match (spec.layout, &file.entity) {
            (Layout::EntityPrefixed, _) => {
                for (header, cells) in &table.columns {
                    let Some((entity, col)) = split_prefixed(header, &spec.entities) else {
                        debug!("{}: ignoring header {header:?} in {}", spec.id, file.label);
                        continue;
                    };
                    add(&mut b, entity, column_id(col)?, table.points(header, cells)?)?;
                }
            }
            (Layout::EntityPerFile, Some(entity)) => {
                for (header, cells) in &table.columns {
                    add(&mut b, entity, column_id(header)?, table.points(header, cells)?)?;
                }
            }
            (Layout::EntityPerFile, None) => {
                return Err(IoError::Manifest(format!("{}: file {} has no entity", spec.id, file.label)));
            }
        }
    }

    let ds = b.build()?;
    if let Some(c) = spec.cumulative_columns.iter().find(|c| !ds.has_column(c)) {
        return Err(IoError::Dataset(format!("{}: cumulative column {c} not found", spec.id)));
    }
    debug!(
        "{}: loaded {} entities, {} columns",
        spec.id,
        ds.entities().count(),
        ds.columns().count()
    );
    Ok(ds)
}

/// Join two loaded datasets under a new id.
pub fn join(left: &TabularDataset, right: &TabularDataset, id: DatasetId) -> Result<TabularDataset, IoError> {
    left.join(right, id.clone())
        .map_err(|e| IoError::Dataset(format!("join {id} ({} + {}): {e}", left.id(), right.id())))
}
