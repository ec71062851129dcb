use listings_etl::entities::anuncios;
use listings_etl::services::schema::ensure_schema;
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, Database, DatabaseConnection, DbErr, EntityTrait, QueryFilter};
use std::env;
use tokio::sync::OnceCell;

static SCHEMA_READY: OnceCell<()> = OnceCell::const_new();

/// Set up test database connection
/// Uses TEST_DATABASE_URL; returns `None` when it is not set so the caller can skip
pub async fn setup_test_db() -> Option<DatabaseConnection> {
    let database_url = match env::var("TEST_DATABASE_URL") {
        Ok(url) if !url.trim().is_empty() => url,
        _ => {
            eprintln!("TEST_DATABASE_URL not set, skipping database test");
            return None;
        }
    };

    let db = Database::connect(&database_url)
        .await
        .expect("Failed to connect to test DB");

    // Tests run concurrently; create the table once before any writer races for it
    let conn = &db;
    SCHEMA_READY
        .get_or_try_init(|| async move { ensure_schema(conn).await })
        .await
        .expect("Failed to create anuncios table");

    Some(db)
}

/// Remove every row whose identifier starts with `prefix`
pub async fn cleanup_listings(db: &DatabaseConnection, prefix: &str) -> Result<(), DbErr> {
    anuncios::Entity::delete_many()
        .filter(anuncios::Column::Identificador.starts_with(prefix))
        .exec(db)
        .await?;
    Ok(())
}

pub async fn fetch_listings(
    db: &DatabaseConnection,
    prefix: &str,
) -> Result<Vec<anuncios::Model>, DbErr> {
    anuncios::Entity::find()
        .filter(anuncios::Column::Identificador.starts_with(prefix))
        .all(db)
        .await
}

/// Write a source spreadsheet with the marketplace export headers
pub fn write_source(path: &std::path::Path, rows: &[(&str, &str, Decimal, Decimal)]) {
    use rust_decimal::prelude::ToPrimitive;

    let mut workbook = rust_xlsxwriter::Workbook::new();
    let sheet = workbook.add_worksheet();
    let headers = [
        "Id",
        "Integração",
        "Identificador",
        "Título",
        "Produto (SKU)",
        "Preço de custo",
        "Preço",
        "Tipo do anúncio",
    ];
    for (col, name) in headers.iter().enumerate() {
        sheet.write_string(0, col as u16, *name).unwrap();
    }

    for (idx, (identifier, title, cost, price)) in rows.iter().enumerate() {
        let r = (idx + 1) as u32;
        sheet.write_number(r, 0, (idx + 1) as f64).unwrap();
        sheet.write_string(r, 1, "Mercado Livre").unwrap();
        sheet.write_string(r, 2, *identifier).unwrap();
        sheet.write_string(r, 3, *title).unwrap();
        sheet.write_string(r, 4, format!("SKU-{}", idx + 1)).unwrap();
        sheet.write_number(r, 5, cost.to_f64().unwrap()).unwrap();
        sheet.write_number(r, 6, price.to_f64().unwrap()).unwrap();
        sheet.write_string(r, 7, "Premium").unwrap();
    }

    workbook.save(path).unwrap();
}
