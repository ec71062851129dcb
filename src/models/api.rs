//! Request and response bodies of the read API
//!
//! Field names follow the JSON the dashboard already consumes.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::services::listing_queries::{ListingFilters, Paging, SkuGroup, SkuGroupFilter};
use crate::services::store_summary::StoreSummary;

/// Query parameters for GET /api/anuncios
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingPageQuery {
    pub tipo_anuncio: Option<String>,
    pub produto_sku: Option<String>,
    /// Case-insensitive search in the title
    pub q: Option<String>,
    pub integracao: Option<String>,
    /// 1-based page (default: 1)
    pub page: Option<i64>,
    /// Page size (default: 10, max: 100)
    pub limit: Option<i64>,
    /// id, preco, titulo or data_criacao (default: id)
    #[serde(rename = "ordenarPor")]
    pub order_by: Option<String>,
    /// ASC or DESC (default: ASC)
    #[serde(rename = "ordem")]
    pub order: Option<String>,
}

impl ListingPageQuery {
    pub fn filters(&self) -> ListingFilters {
        ListingFilters {
            tipo_anuncio: self.tipo_anuncio.clone(),
            produto_sku: self.produto_sku.clone(),
            q: self.q.clone(),
            integracao: self.integracao.clone(),
        }
    }

    pub fn paging(&self) -> Paging {
        Paging::new(self.page, self.limit)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PageQuery {
    pub fn paging(&self) -> Paging {
        Paging::new(self.page, self.limit)
    }
}

/// Query parameters for GET /api/sku/analise
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SkuAnalysisQuery {
    /// Case-insensitive search in the SKU
    pub q: Option<String>,
    /// Only SKUs shared by more than one listing
    pub duplicados: Option<bool>,
    /// Minimum listings per SKU
    pub min: Option<i64>,
    /// Maximum listings per SKU
    pub max: Option<i64>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl SkuAnalysisQuery {
    pub fn validate(&self) -> Result<(), String> {
        if let (Some(min), Some(max)) = (self.min, self.max) {
            if min > max {
                return Err("min cannot be greater than max".to_string());
            }
        }
        Ok(())
    }

    pub fn filter(&self) -> SkuGroupFilter {
        SkuGroupFilter {
            q: self.q.clone(),
            duplicated_only: self.duplicados.unwrap_or(false),
            min_listings: self.min,
            max_listings: self.max,
        }
    }

    pub fn paging(&self) -> Paging {
        Paging::new(self.page, self.limit)
    }
}

/// Response for GET /api/resumo
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryResponse {
    pub total_anuncios: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub preco_medio: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub lucro_medio: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub lucro_total: Decimal,
}

impl From<StoreSummary> for SummaryResponse {
    fn from(summary: StoreSummary) -> Self {
        Self {
            total_anuncios: summary.total_listings,
            preco_medio: summary.average_price,
            lucro_medio: summary.average_profit,
            lucro_total: summary.total_profit,
        }
    }
}

/// One page of results
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub page: u64,
    pub limit: u64,
    /// Matches across all pages
    pub total: i64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, paging: Paging, total: i64) -> Self {
        Self {
            data,
            page: paging.page,
            limit: paging.limit,
            total,
            total_pages: paging.total_pages(total),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkuAnalysisStats {
    pub total_skus: i64,
    pub total_duplicados: i64,
    pub total_pages: u64,
}

/// Response for GET /api/sku/analise
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkuAnalysisResponse {
    pub data: Vec<SkuGroup>,
    pub stats: SkuAnalysisStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
