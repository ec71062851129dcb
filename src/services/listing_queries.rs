//! Read-side queries over `anuncios` backing the HTTP API
//!
//! Every query is plain SQL with positional parameters. Filters are shared so the
//! summary and the listing page always agree on which rows they cover.

use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, DbErr, FromQueryResult, JsonValue, Statement, Value};
use serde::{Deserialize, Serialize};

use crate::entities::anuncios;

pub const DEFAULT_PAGE_LIMIT: u64 = 10;
pub const MAX_PAGE_LIMIT: u64 = 100;

/// Optional row filters; blank values are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ListingFilters {
    pub tipo_anuncio: Option<String>,
    pub produto_sku: Option<String>,
    /// Case-insensitive fragment of the title
    pub q: Option<String>,
    pub integracao: Option<String>,
}

impl ListingFilters {
    /// `WHERE` clause (empty when nothing is filtered) and its bound values,
    /// numbered from `$1`.
    pub fn where_clause(&self) -> (String, Vec<Value>) {
        let mut clauses = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        let exact = [
            ("tipo_anuncio", &self.tipo_anuncio),
            ("produto_sku", &self.produto_sku),
            ("integracao", &self.integracao),
        ];
        for (column, value) in exact {
            if let Some(v) = non_blank(value) {
                values.push(Value::from(v.to_string()));
                clauses.push(format!("{} = ${}", column, values.len()));
            }
        }
        if let Some(q) = non_blank(&self.q) {
            values.push(Value::from(q.to_string()));
            clauses.push(format!("titulo ILIKE '%' || ${} || '%'", values.len()));
        }

        if clauses.is_empty() {
            (String::new(), values)
        } else {
            (format!(" WHERE {}", clauses.join(" AND ")), values)
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// 1-based page with a bounded size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
    pub page: u64,
    pub limit: u64,
}

impl Paging {
    /// Out-of-range values are clamped rather than rejected.
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        let page = page.unwrap_or(1).max(1) as u64;
        let limit = limit
            .unwrap_or(DEFAULT_PAGE_LIMIT as i64)
            .clamp(1, MAX_PAGE_LIMIT as i64) as u64;
        Self { page, limit }
    }

    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn total_pages(&self, total: i64) -> u64 {
        (total.max(0) as u64).div_ceil(self.limit)
    }

    /// `LIMIT`/`OFFSET` clause whose parameters follow `values`
    fn clause(&self, values: &mut Vec<Value>) -> String {
        values.push(Value::from(self.limit as i64));
        values.push(Value::from(self.offset() as i64));
        format!(" LIMIT ${} OFFSET ${}", values.len() - 1, values.len())
    }
}

/// Sortable columns of the listing page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortColumn {
    #[default]
    Id,
    Price,
    Title,
    CreatedAt,
}

impl SortColumn {
    /// Unknown names fall back to `Id`.
    pub fn parse(name: Option<&str>) -> Self {
        match name.map(str::trim) {
            Some("preco") => SortColumn::Price,
            Some("titulo") => SortColumn::Title,
            Some("data_criacao") => SortColumn::CreatedAt,
            _ => SortColumn::Id,
        }
    }

    fn column(&self) -> &'static str {
        match self {
            SortColumn::Id => "id",
            SortColumn::Price => "preco",
            SortColumn::Title => "titulo",
            SortColumn::CreatedAt => "created_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(name: Option<&str>) -> Self {
        match name {
            Some(o) if o.trim().eq_ignore_ascii_case("desc") => SortOrder::Desc,
            _ => SortOrder::Asc,
        }
    }

    fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, FromQueryResult)]
struct Total {
    total: i64,
}

#[derive(Debug, FromQueryResult)]
struct Name {
    name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, FromQueryResult, Serialize)]
pub struct IntegrationCount {
    pub integracao: String,
    pub total_anuncios: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, FromQueryResult, Serialize)]
pub struct TypeCount {
    pub tipo_anuncio: Option<String>,
    pub total_anuncios: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, FromQueryResult, Serialize)]
pub struct SkuStats {
    pub produto_sku: Option<String>,
    pub total_anuncios: i64,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub preco_medio: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub lucro_medio: Option<Decimal>,
}

/// A listing of one SKU with its profit
#[derive(Debug, Clone, PartialEq, Eq, FromQueryResult, Serialize)]
pub struct SkuListing {
    pub id: Option<i64>,
    pub identificador: String,
    pub titulo: Option<String>,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub preco_custo: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub preco: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub lucro: Option<Decimal>,
    pub integracao: Option<String>,
    pub tipo_anuncio: Option<String>,
}

/// Criteria of the SKU repetition analysis
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkuGroupFilter {
    /// Case-insensitive fragment of the SKU
    pub q: Option<String>,
    /// Only SKUs used by more than one listing
    pub duplicated_only: bool,
    pub min_listings: Option<i64>,
    pub max_listings: Option<i64>,
}

/// Listings sharing one SKU
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkuGroup {
    pub sku: String,
    pub total_anuncios: i64,
    pub anuncios_ids: Vec<i64>,
    pub titulos: Vec<String>,
}

#[derive(Debug, FromQueryResult)]
struct SkuGroupRow {
    sku: String,
    total_anuncios: i64,
    anuncios_ids: JsonValue,
    titulos: JsonValue,
}

impl TryFrom<SkuGroupRow> for SkuGroup {
    type Error = DbErr;

    fn try_from(row: SkuGroupRow) -> Result<Self, Self::Error> {
        let json_err = |e: serde_json::Error| DbErr::Json(e.to_string());
        Ok(Self {
            sku: row.sku,
            total_anuncios: row.total_anuncios,
            anuncios_ids: serde_json::from_value(row.anuncios_ids).map_err(json_err)?,
            titulos: serde_json::from_value(row.titulos).map_err(json_err)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkuGroupPage {
    pub groups: Vec<SkuGroup>,
    /// SKUs matching the filter, across all pages
    pub total_skus: i64,
    /// Of those, SKUs used by more than one listing
    pub total_duplicated: i64,
}

#[derive(Debug, FromQueryResult)]
struct SkuGroupTotals {
    total: i64,
    duplicated: i64,
}

async fn total_of<C>(conn: &C, sql: String, values: Vec<Value>) -> Result<i64, DbErr>
where
    C: ConnectionTrait,
{
    let backend = conn.get_database_backend();
    Ok(Total::find_by_statement(Statement::from_sql_and_values(backend, sql, values))
        .one(conn)
        .await?
        .map(|t| t.total)
        .unwrap_or(0))
}

async fn names_of<C>(conn: &C, sql: &str) -> Result<Vec<String>, DbErr>
where
    C: ConnectionTrait,
{
    let backend = conn.get_database_backend();
    let rows = Name::find_by_statement(Statement::from_string(backend, sql))
        .all(conn)
        .await?;
    Ok(rows.into_iter().map(|r| r.name).collect())
}

/// One page of listings matching `filters`, plus the total match count.
pub async fn find_listings<C>(
    conn: &C,
    filters: &ListingFilters,
    sort: SortColumn,
    order: SortOrder,
    paging: Paging,
) -> Result<(Vec<anuncios::Model>, i64), DbErr>
where
    C: ConnectionTrait,
{
    let backend = conn.get_database_backend();
    let (where_sql, values) = filters.where_clause();

    let total = total_of(
        conn,
        format!("SELECT COUNT(*)::bigint AS total FROM anuncios{}", where_sql),
        values.clone(),
    )
    .await?;

    let mut values = values;
    let sql = format!(
        "SELECT id, integracao, identificador, titulo, produto_sku, preco_custo, preco, \
         tipo_anuncio, created_at FROM anuncios{} ORDER BY {} {}, identificador{}",
        where_sql,
        sort.column(),
        order.keyword(),
        paging.clause(&mut values)
    );
    let rows = anuncios::Model::find_by_statement(Statement::from_sql_and_values(backend, sql, values))
        .all(conn)
        .await?;

    Ok((rows, total))
}

/// Distinct listing types, sorted
pub async fn listing_types<C>(conn: &C) -> Result<Vec<String>, DbErr>
where
    C: ConnectionTrait,
{
    names_of(
        conn,
        "SELECT DISTINCT tipo_anuncio AS name FROM anuncios \
         WHERE tipo_anuncio IS NOT NULL ORDER BY tipo_anuncio",
    )
    .await
}

/// Distinct integrations, sorted
pub async fn integrations<C>(conn: &C) -> Result<Vec<String>, DbErr>
where
    C: ConnectionTrait,
{
    names_of(
        conn,
        "SELECT DISTINCT integracao AS name FROM anuncios \
         WHERE integracao IS NOT NULL ORDER BY integracao",
    )
    .await
}

/// Listing count per integration, largest first
pub async fn count_by_integration<C>(conn: &C) -> Result<Vec<IntegrationCount>, DbErr>
where
    C: ConnectionTrait,
{
    let backend = conn.get_database_backend();
    IntegrationCount::find_by_statement(Statement::from_string(
        backend,
        "SELECT integracao, COUNT(*)::bigint AS total_anuncios FROM anuncios \
         WHERE integracao IS NOT NULL GROUP BY integracao \
         ORDER BY total_anuncios DESC, integracao",
    ))
    .all(conn)
    .await
}

/// Listing count per type within one integration, largest first
pub async fn count_types_in_integration<C>(
    conn: &C,
    integration: &str,
) -> Result<Vec<TypeCount>, DbErr>
where
    C: ConnectionTrait,
{
    let backend = conn.get_database_backend();
    TypeCount::find_by_statement(Statement::from_sql_and_values(
        backend,
        "SELECT tipo_anuncio, COUNT(*)::bigint AS total_anuncios FROM anuncios \
         WHERE integracao = $1 GROUP BY tipo_anuncio \
         ORDER BY total_anuncios DESC, tipo_anuncio",
        [Value::from(integration.to_string())],
    ))
    .all(conn)
    .await
}

/// Per-SKU figures for one integration and listing type, most listed first
pub async fn sku_stats<C>(
    conn: &C,
    integration: &str,
    listing_type: &str,
    paging: Paging,
) -> Result<(Vec<SkuStats>, i64), DbErr>
where
    C: ConnectionTrait,
{
    let backend = conn.get_database_backend();
    let values = vec![
        Value::from(integration.to_string()),
        Value::from(listing_type.to_string()),
    ];

    let total = total_of(
        conn,
        "SELECT COUNT(DISTINCT produto_sku)::bigint AS total FROM anuncios \
         WHERE integracao = $1 AND tipo_anuncio = $2"
            .to_string(),
        values.clone(),
    )
    .await?;

    let mut values = values;
    let sql = format!(
        "SELECT produto_sku, COUNT(*)::bigint AS total_anuncios, \
         ROUND(AVG(preco), 2) AS preco_medio, ROUND(AVG(preco - preco_custo), 2) AS lucro_medio \
         FROM anuncios WHERE integracao = $1 AND tipo_anuncio = $2 \
         GROUP BY produto_sku ORDER BY total_anuncios DESC, produto_sku{}",
        paging.clause(&mut values)
    );
    let rows = SkuStats::find_by_statement(Statement::from_sql_and_values(backend, sql, values))
        .all(conn)
        .await?;

    Ok((rows, total))
}

/// Listings of one SKU ordered by id
pub async fn listings_for_sku<C>(
    conn: &C,
    sku: &str,
    paging: Paging,
) -> Result<(Vec<SkuListing>, i64), DbErr>
where
    C: ConnectionTrait,
{
    let backend = conn.get_database_backend();
    let values = vec![Value::from(sku.to_string())];

    let total = total_of(
        conn,
        "SELECT COUNT(*)::bigint AS total FROM anuncios WHERE produto_sku = $1".to_string(),
        values.clone(),
    )
    .await?;

    let mut values = values;
    let sql = format!(
        "SELECT id, identificador, titulo, preco_custo, preco, (preco - preco_custo) AS lucro, \
         integracao, tipo_anuncio FROM anuncios WHERE produto_sku = $1 \
         ORDER BY id, identificador{}",
        paging.clause(&mut values)
    );
    let rows = SkuListing::find_by_statement(Statement::from_sql_and_values(backend, sql, values))
        .all(conn)
        .await?;

    Ok((rows, total))
}

/// SKUs with their listing ids and titles, most repeated first.
///
/// Listings without a SKU are not grouped.
pub async fn sku_groups<C>(
    conn: &C,
    filter: &SkuGroupFilter,
    paging: Paging,
) -> Result<SkuGroupPage, DbErr>
where
    C: ConnectionTrait,
{
    let backend = conn.get_database_backend();
    let mut values: Vec<Value> = Vec::new();

    let mut inner = "produto_sku IS NOT NULL".to_string();
    if let Some(q) = non_blank(&filter.q) {
        values.push(Value::from(q.to_string()));
        inner.push_str(&format!(" AND produto_sku ILIKE '%' || ${} || '%'", values.len()));
    }

    let mut outer = Vec::new();
    if filter.duplicated_only {
        outer.push("total_anuncios > 1".to_string());
    }
    if let Some(min) = filter.min_listings {
        values.push(Value::from(min));
        outer.push(format!("total_anuncios >= ${}", values.len()));
    }
    if let Some(max) = filter.max_listings {
        values.push(Value::from(max));
        outer.push(format!("total_anuncios <= ${}", values.len()));
    }
    let outer_sql = if outer.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", outer.join(" AND "))
    };

    let groups_cte = format!(
        "WITH grupos AS (SELECT produto_sku AS sku, COUNT(*)::bigint AS total_anuncios, \
         COALESCE(JSONB_AGG(id ORDER BY id, identificador) FILTER (WHERE id IS NOT NULL), '[]'::jsonb) AS anuncios_ids, \
         COALESCE(JSONB_AGG(titulo ORDER BY id, identificador) FILTER (WHERE titulo IS NOT NULL), '[]'::jsonb) AS titulos \
         FROM anuncios WHERE {} GROUP BY produto_sku)",
        inner
    );

    let totals = SkuGroupTotals::find_by_statement(Statement::from_sql_and_values(
        backend,
        format!(
            "{} SELECT COUNT(*)::bigint AS total, \
             COUNT(*) FILTER (WHERE total_anuncios > 1)::bigint AS duplicated FROM grupos{}",
            groups_cte, outer_sql
        ),
        values.clone(),
    ))
    .one(conn)
    .await?;

    let sql = format!(
        "{} SELECT sku, total_anuncios, anuncios_ids, titulos FROM grupos{} \
         ORDER BY total_anuncios DESC, sku{}",
        groups_cte,
        outer_sql,
        paging.clause(&mut values)
    );
    let groups = SkuGroupRow::find_by_statement(Statement::from_sql_and_values(backend, sql, values))
        .all(conn)
        .await?
        .into_iter()
        .map(SkuGroup::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    let (total_skus, total_duplicated) = totals.map(|t| (t.total, t.duplicated)).unwrap_or((0, 0));
    Ok(SkuGroupPage {
        groups,
        total_skus,
        total_duplicated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::collections::BTreeMap;

    fn total_row(total: i64) -> BTreeMap<&'static str, Value> {
        BTreeMap::from([("total", Value::from(total))])
    }

    #[test]
    fn test_where_clause_numbers_parameters_and_skips_blanks() {
        let filters = ListingFilters {
            tipo_anuncio: Some("Premium".to_string()),
            produto_sku: Some("  ".to_string()),
            q: Some(" óleo ".to_string()),
            integracao: Some("Shopee".to_string()),
        };

        let (sql, values) = filters.where_clause();

        assert_eq!(
            sql,
            " WHERE tipo_anuncio = $1 AND integracao = $2 AND titulo ILIKE '%' || $3 || '%'"
        );
        assert_eq!(
            values,
            vec![
                Value::from("Premium".to_string()),
                Value::from("Shopee".to_string()),
                Value::from("óleo".to_string()),
            ]
        );
        assert_eq!(ListingFilters::default().where_clause(), (String::new(), vec![]));
    }

    #[test]
    fn test_paging_is_clamped() {
        assert_eq!(Paging::new(None, None), Paging { page: 1, limit: 10 });
        assert_eq!(Paging::new(Some(0), Some(500)), Paging { page: 1, limit: 100 });
        assert_eq!(Paging::new(Some(-3), Some(0)), Paging { page: 1, limit: 1 });

        let paging = Paging::new(Some(3), Some(20));
        assert_eq!(paging.offset(), 40);
        assert_eq!(paging.total_pages(41), 3);
        assert_eq!(paging.total_pages(0), 0);
    }

    #[test]
    fn test_sort_options_fall_back_to_id_ascending() {
        assert_eq!(SortColumn::parse(Some("preco")), SortColumn::Price);
        assert_eq!(SortColumn::parse(Some("data_criacao")), SortColumn::CreatedAt);
        assert_eq!(SortColumn::parse(Some("preco; DROP TABLE anuncios")), SortColumn::Id);
        assert_eq!(SortColumn::parse(None), SortColumn::Id);
        assert_eq!(SortOrder::parse(Some("desc")), SortOrder::Desc);
        assert_eq!(SortOrder::parse(Some("sideways")), SortOrder::Asc);
    }

    #[tokio::test]
    async fn test_find_listings_filters_sorts_and_pages() {
        let model = anuncios::Model {
            id: Some(1),
            integracao: Some("Shopee".to_string()),
            identificador: "SHP-1".to_string(),
            titulo: Some("Óleo 5W30".to_string()),
            produto_sku: Some("61461".to_string()),
            preco_custo: Some(dec!(20.00)),
            preco: Some(dec!(35.90)),
            tipo_anuncio: Some("Premium".to_string()),
            created_at: None,
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![total_row(11)]])
            .append_query_results([vec![model.clone()]])
            .into_connection();

        let filters = ListingFilters {
            q: Some("óleo".to_string()),
            ..Default::default()
        };
        let (rows, total) = find_listings(
            &db,
            &filters,
            SortColumn::Price,
            SortOrder::Desc,
            Paging::new(Some(2), Some(10)),
        )
        .await
        .unwrap();

        assert_eq!(total, 11);
        assert_eq!(rows, vec![model]);

        let log = db.into_transaction_log();
        let page = &log[1].statements()[0];
        assert!(page.sql.contains("WHERE titulo ILIKE '%' || $1 || '%'"));
        assert!(page.sql.contains("ORDER BY preco DESC, identificador LIMIT $2 OFFSET $3"));
        assert_eq!(
            page.values.as_ref().map(|v| v.0.clone()),
            Some(vec![
                Value::from("óleo".to_string()),
                Value::from(10i64),
                Value::from(10i64),
            ])
        );
    }

    #[tokio::test]
    async fn test_sku_groups_decodes_aggregates() {
        let totals: BTreeMap<&str, Value> = BTreeMap::from([
            ("total", Value::from(4i64)),
            ("duplicated", Value::from(1i64)),
        ]);
        let group: BTreeMap<&str, Value> = BTreeMap::from([
            ("sku", Value::from("61461".to_string())),
            ("total_anuncios", Value::from(2i64)),
            ("anuncios_ids", Value::from(serde_json::json!([3, 9]))),
            ("titulos", Value::from(serde_json::json!(["Filtro A", "Filtro B"]))),
        ]);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![totals]])
            .append_query_results([vec![group]])
            .into_connection();

        let filter = SkuGroupFilter {
            q: Some("614".to_string()),
            duplicated_only: true,
            min_listings: Some(2),
            max_listings: None,
        };
        let page = sku_groups(&db, &filter, Paging::new(None, None)).await.unwrap();

        assert_eq!(page.total_skus, 4);
        assert_eq!(page.total_duplicated, 1);
        assert_eq!(
            page.groups,
            vec![SkuGroup {
                sku: "61461".to_string(),
                total_anuncios: 2,
                anuncios_ids: vec![3, 9],
                titulos: vec!["Filtro A".to_string(), "Filtro B".to_string()],
            }]
        );

        let log = db.into_transaction_log();
        let sql = &log[1].statements()[0].sql;
        assert!(sql.contains("produto_sku ILIKE '%' || $1 || '%'"));
        assert!(sql.contains("WHERE total_anuncios > 1 AND total_anuncios >= $2"));
        assert!(sql.ends_with("LIMIT $3 OFFSET $4"));
    }
}
