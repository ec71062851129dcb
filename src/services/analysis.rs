//! Aggregates and ad-hoc filters over in-memory listings
//!
//! Nothing here mutates its input; filters return new vectors.

use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::listing::ListingRow;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingSummary {
    pub count: usize,
    /// `None` for an empty table
    pub mean_price: Option<Decimal>,
    pub mean_profit: Option<Decimal>,
    /// `None` when the sum leaves the `Decimal` range
    pub total_profit: Option<Decimal>,
}

pub fn summarize(rows: &[ListingRow]) -> ListingSummary {
    let count = rows.len();
    let total_price = checked_total(rows.iter().map(|r| Some(r.price)));
    let total_profit = checked_total(rows.iter().map(|r| r.metrics().profit));

    let mean = |total: Option<Decimal>| {
        if count == 0 {
            None
        } else {
            total?.checked_div(Decimal::from(count))
        }
    };

    ListingSummary {
        count,
        mean_price: mean(total_price),
        mean_profit: mean(total_profit),
        total_profit,
    }
}

fn checked_total(values: impl Iterator<Item = Option<Decimal>>) -> Option<Decimal> {
    values.fold(Some(Decimal::ZERO), |acc, v| acc?.checked_add(v?))
}

/// Sorted, de-duplicated listing types, blanks excluded
pub fn distinct_listing_types(rows: &[ListingRow]) -> Vec<String> {
    rows.iter()
        .filter_map(|r| r.listing_type.as_deref())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingFilter {
    /// Exact listing type match
    ListingType(String),
    /// Exact SKU match
    Sku(String),
    /// Case-insensitive substring of the title
    TitleContains(String),
}

impl ListingFilter {
    pub fn matches(&self, row: &ListingRow) -> bool {
        match self {
            ListingFilter::ListingType(wanted) => row.listing_type.as_deref() == Some(wanted.as_str()),
            ListingFilter::Sku(wanted) => row.product_sku.as_deref() == Some(wanted.as_str()),
            ListingFilter::TitleContains(word) => {
                let needle = word.to_lowercase();
                row.title
                    .as_deref()
                    .map(|t| t.to_lowercase().contains(&needle))
                    .unwrap_or(false)
            }
        }
    }

    /// Output file name for an export of this filter's result
    pub fn export_file_name(&self) -> String {
        let (kind, value) = match self {
            ListingFilter::ListingType(v) => ("tipo", v.clone()),
            ListingFilter::Sku(v) => ("sku", v.clone()),
            ListingFilter::TitleContains(v) => ("titulo", v.to_lowercase()),
        };
        format!("filtro_{}_{}.xlsx", kind, sanitize_file_component(&value))
    }
}

pub fn apply_filter(rows: &[ListingRow], filter: &ListingFilter) -> Vec<ListingRow> {
    rows.iter().filter(|r| filter.matches(r)).cloned().collect()
}

fn sanitize_file_component(value: &str) -> String {
    let cleaned: String = value
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if cleaned.is_empty() {
        "vazio".to_string()
    } else {
        cleaned
    }
}
