//! `SeaORM` Entity for the anuncios table
//!
//! The table has no surrogate key; `identificador` is the unique natural key and acts
//! as the primary key on the ORM side.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "anuncios")]
pub struct Model {
    /// Listing id from the marketplace export, if numeric
    pub id: Option<i64>,
    pub integracao: Option<String>,
    #[sea_orm(primary_key, auto_increment = false)]
    pub identificador: String,
    pub titulo: Option<String>,
    pub produto_sku: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))", nullable)]
    #[serde(with = "rust_decimal::serde::float_option")]
    pub preco_custo: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))", nullable)]
    #[serde(with = "rust_decimal::serde::float_option")]
    pub preco: Option<Decimal>,
    pub tipo_anuncio: Option<String>,
    /// Set by the database on first insert, never updated by upserts
    pub created_at: Option<DateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
