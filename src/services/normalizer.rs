//! Map raw spreadsheet rows onto typed `ListingRow`s
//!
//! Column names are resolved once through `COLUMN_MAP`; everything downstream works on
//! the typed record. Numeric cells that cannot be parsed are treated as missing and
//! counted in a `CoercionReport` instead of failing the run.

use std::str::FromStr;

use calamine::Data;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::models::listing::ListingRow;
use crate::models::raw_table::{cell_to_text, RawTable};

/// Decimal places kept for prices
pub const PRICE_SCALE: u32 = 2;

/// Exclusive bound on the absolute value of a price stored as `NUMERIC(12, 2)`
pub const PRICE_LIMIT: i64 = 10_000_000_000;

/// How many unparseable cells are kept per field for diagnostics
const MAX_SAMPLES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanonicalField {
    Id,
    Integration,
    Identifier,
    Title,
    ProductSku,
    CostPrice,
    Price,
    ListingType,
}

impl CanonicalField {
    pub fn name(&self) -> &'static str {
        match self {
            CanonicalField::Id => "id",
            CanonicalField::Integration => "integration",
            CanonicalField::Identifier => "identifier",
            CanonicalField::Title => "title",
            CanonicalField::ProductSku => "product_sku",
            CanonicalField::CostPrice => "cost_price",
            CanonicalField::Price => "price",
            CanonicalField::ListingType => "listing_type",
        }
    }
}

/// Source column name -> canonical field, in export order
pub const COLUMN_MAP: [(&str, CanonicalField); 8] = [
    ("Id", CanonicalField::Id),
    ("Integração", CanonicalField::Integration),
    ("Identificador", CanonicalField::Identifier),
    ("Título", CanonicalField::Title),
    ("Produto (SKU)", CanonicalField::ProductSku),
    ("Preço de custo", CanonicalField::CostPrice),
    ("Preço", CanonicalField::Price),
    ("Tipo do anúncio", CanonicalField::ListingType),
];

pub fn source_column(field: CanonicalField) -> &'static str {
    COLUMN_MAP
        .iter()
        .find(|(_, f)| *f == field)
        .map(|(name, _)| *name)
        .unwrap_or_default()
}

/// A numeric cell that held something other than a number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoercionSample {
    /// Spreadsheet line (header is line 1)
    pub line: usize,
    pub raw: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldCoercion {
    /// Blank cells, defaulted silently
    pub empty: usize,
    /// Non-numeric cells, defaulted and reported
    pub unparseable: usize,
    pub samples: Vec<CoercionSample>,
}

impl FieldCoercion {
    fn record_unparseable(&mut self, line: usize, cell: &Data) {
        self.unparseable += 1;
        if self.samples.len() < MAX_SAMPLES {
            self.samples.push(CoercionSample {
                line,
                raw: cell_to_text(cell).unwrap_or_default(),
            });
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoercionReport {
    pub id: FieldCoercion,
    pub cost_price: FieldCoercion,
    pub price: FieldCoercion,
}

impl CoercionReport {
    pub fn total_unparseable(&self) -> usize {
        self.id.unparseable + self.cost_price.unparseable + self.price.unparseable
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedListings {
    pub rows: Vec<ListingRow>,
    pub coercion: CoercionReport,
}

/// Column positions resolved against the header row
struct ColumnIndexes {
    id: usize,
    integration: usize,
    identifier: usize,
    title: usize,
    product_sku: usize,
    cost_price: usize,
    price: usize,
    listing_type: usize,
}

fn resolve_columns(table: &RawTable) -> Result<ColumnIndexes, PipelineError> {
    let missing: Vec<String> = COLUMN_MAP
        .iter()
        .filter(|(name, _)| table.column_index(name).is_none())
        .map(|(name, _)| name.to_string())
        .collect();

    if !missing.is_empty() {
        return Err(PipelineError::Schema { missing });
    }

    let idx = |field: CanonicalField| table.column_index(source_column(field)).unwrap_or_default();

    Ok(ColumnIndexes {
        id: idx(CanonicalField::Id),
        integration: idx(CanonicalField::Integration),
        identifier: idx(CanonicalField::Identifier),
        title: idx(CanonicalField::Title),
        product_sku: idx(CanonicalField::ProductSku),
        cost_price: idx(CanonicalField::CostPrice),
        price: idx(CanonicalField::Price),
        listing_type: idx(CanonicalField::ListingType),
    })
}

/// Normalize every row of `table`.
///
/// Fails only when a mapped column is missing; the error lists all of them.
pub fn normalize(table: &RawTable) -> Result<NormalizedListings, PipelineError> {
    let cols = resolve_columns(table)?;
    let mut coercion = CoercionReport::default();
    let mut rows = Vec::with_capacity(table.len());

    for row_idx in 0..table.len() {
        // +2: one for the header, one for 1-based lines
        let line = row_idx + 2;
        let cell = |col: usize| table.cell(row_idx, col);

        let id = coerce_id(cell(cols.id), line, &mut coercion.id);
        let cost_price = coerce_price(cell(cols.cost_price), line, &mut coercion.cost_price);
        let price = coerce_price(cell(cols.price), line, &mut coercion.price);

        rows.push(ListingRow {
            id,
            integration: cell_to_text(cell(cols.integration)),
            identifier: cell_to_text(cell(cols.identifier)),
            title: cell_to_text(cell(cols.title)),
            product_sku: cell_to_text(cell(cols.product_sku)),
            cost_price,
            price,
            listing_type: cell_to_text(cell(cols.listing_type)),
        });
    }

    let unparseable = coercion.total_unparseable();
    if unparseable > 0 {
        warn!(
            unparseable,
            id = coercion.id.unparseable,
            cost_price = coercion.cost_price.unparseable,
            price = coercion.price.unparseable,
            "Non-numeric values replaced by defaults"
        );
    }

    debug!(rows = rows.len(), "Normalized listings");

    Ok(NormalizedListings { rows, coercion })
}

/// Parse a numeric cell; `Err(())` marks a value that is present but not a number.
fn parse_decimal(cell: &Data) -> Result<Option<Decimal>, ()> {
    match cell {
        Data::Empty => Ok(None),
        Data::Int(i) => Ok(Some(Decimal::from(*i))),
        Data::Float(f) => Decimal::from_f64_retain(*f).map(Some).ok_or(()),
        Data::Bool(_) | Data::Error(_) | Data::DateTime(_) => Err(()),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            Decimal::from_str(trimmed)
                .or_else(|_| Decimal::from_scientific(trimmed))
                .map(Some)
                .map_err(|_| ())
        }
    }
}

fn coerce_price(cell: &Data, line: usize, stats: &mut FieldCoercion) -> Decimal {
    let value = match parse_decimal(cell) {
        Ok(Some(value)) => value,
        Ok(None) => {
            stats.empty += 1;
            Decimal::ZERO
        }
        Err(()) => {
            debug!(line, raw = ?cell, "Unparseable price, using 0");
            stats.record_unparseable(line, cell);
            Decimal::ZERO
        }
    };

    // round_dp rounds half to even
    let mut rounded = value.round_dp(PRICE_SCALE);
    rounded.rescale(PRICE_SCALE);
    rounded
}

fn coerce_id(cell: &Data, line: usize, stats: &mut FieldCoercion) -> Option<i64> {
    match parse_decimal(cell) {
        Ok(Some(value)) if value.is_integer() => match value.to_i64() {
            Some(id) => Some(id),
            None => {
                stats.record_unparseable(line, cell);
                None
            }
        },
        Ok(Some(_)) | Err(()) => {
            debug!(line, raw = ?cell, "Unparseable id, leaving empty");
            stats.record_unparseable(line, cell);
            None
        }
        Ok(None) => {
            stats.empty += 1;
            None
        }
    }
}
