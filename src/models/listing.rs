use rust_decimal::Decimal;
use serde::Serialize;

use crate::entities::anuncios;

/// One marketplace listing after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingRow {
    pub id: Option<i64>,
    pub integration: Option<String>,
    /// Natural key used for upserts
    pub identifier: Option<String>,
    pub title: Option<String>,
    pub product_sku: Option<String>,
    /// Always rounded to 2 decimal places
    pub cost_price: Decimal,
    /// Always rounded to 2 decimal places
    pub price: Decimal,
    pub listing_type: Option<String>,
}

impl ListingRow {
    /// Identifier with surrounding whitespace removed, `None` when blank
    pub fn key(&self) -> Option<&str> {
        self.identifier
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    pub fn metrics(&self) -> ListingMetrics {
        ListingMetrics::for_row(self)
    }
}

/// Rows written by other tools may carry NULL prices; they read back as zero, the
/// same value the normalizer gives a blank cell.
impl From<anuncios::Model> for ListingRow {
    fn from(model: anuncios::Model) -> Self {
        Self {
            id: model.id,
            integration: model.integracao,
            identifier: Some(model.identificador),
            title: model.titulo,
            product_sku: model.produto_sku,
            cost_price: model.preco_custo.unwrap_or_default(),
            price: model.preco.unwrap_or_default(),
            listing_type: model.tipo_anuncio,
        }
    }
}

/// Profit figures derived at analysis time; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ListingMetrics {
    /// `None` when `price - cost_price` does not fit a `Decimal`
    pub profit: Option<Decimal>,
    /// `None` when the listing has no price (margin is not defined)
    pub margin_pct: Option<Decimal>,
}

impl ListingMetrics {
    pub fn for_row(row: &ListingRow) -> Self {
        let profit = row.price.checked_sub(row.cost_price);
        let margin_pct = profit
            .and_then(|p| p.checked_div(row.price))
            .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
            .map(|m| m.normalize());

        Self { profit, margin_pct }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn row(price: Decimal, cost_price: Decimal) -> ListingRow {
        ListingRow {
            id: None,
            integration: None,
            identifier: Some("MLB1".to_string()),
            title: None,
            product_sku: None,
            cost_price,
            price,
            listing_type: None,
        }
    }

    #[test]
    fn test_profit_and_margin() {
        let a = row(dec!(100), dec!(60)).metrics();
        let b = row(dec!(50), dec!(55)).metrics();

        assert_eq!(a.profit, Some(dec!(40)));
        assert_eq!(a.margin_pct, Some(dec!(40.0)));
        assert_eq!(b.profit, Some(dec!(-5)));
        assert_eq!(b.margin_pct, Some(dec!(-10.0)));
    }

    #[test]
    fn test_zero_price_has_no_margin() {
        let metrics = row(dec!(0.00), dec!(12.50)).metrics();

        assert_eq!(metrics.profit, Some(dec!(-12.50)));
        assert_eq!(metrics.margin_pct, None);
    }

    #[test]
    fn test_profit_out_of_decimal_range() {
        let huge = Decimal::from_str_exact("70000000000000000000000000000").unwrap();
        let metrics = row(huge, -huge).metrics();

        assert_eq!(metrics.profit, None);
        assert_eq!(metrics.margin_pct, None);
    }

    #[test]
    fn test_null_prices_read_back_as_zero() {
        let model = anuncios::Model {
            id: Some(7),
            integracao: Some("Shopee".to_string()),
            identificador: "SHP-7".to_string(),
            titulo: None,
            produto_sku: Some("61461".to_string()),
            preco_custo: None,
            preco: Some(dec!(19.90)),
            tipo_anuncio: None,
            created_at: None,
        };

        let listing = ListingRow::from(model);

        assert_eq!(listing.key(), Some("SHP-7"));
        assert_eq!(listing.cost_price, Decimal::ZERO);
        assert_eq!(listing.price, dec!(19.90));
        assert_eq!(listing.metrics().profit, Some(dec!(19.90)));
    }

    #[test]
    fn test_blank_identifier_has_no_key() {
        let mut listing = row(dec!(1), dec!(1));
        assert_eq!(listing.key(), Some("MLB1"));

        listing.identifier = Some("   ".to_string());
        assert_eq!(listing.key(), None);

        listing.identifier = Some(" MLB2 ".to_string());
        assert_eq!(listing.key(), Some("MLB2"));
    }
}
