//! `KeyStore` table: one row per API consumer.
//!
//! Every helper runs exactly one bound statement on a pooled connection; the
//! connection goes back to the pool when the statement future completes or is
//! dropped.

use sea_orm::entity::prelude::*;
use sea_orm::sea_query::Expr;
use sea_orm::{DatabaseConnection, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ModelError;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "KeyStore")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_name = "ServiceId")]
    pub service_id: Uuid,
    #[sea_orm(column_name = "ServiceName", column_type = "Text")]
    pub service_name: String,
    #[sea_orm(column_name = "ApiKey", column_type = "Text")]
    pub api_key: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

fn validate(model: &Model) -> Result<(), ModelError> {
    if model.service_name.trim().is_empty() {
        return Err(ModelError::Validation("service_name required".into()));
    }
    if model.api_key.trim().is_empty() {
        return Err(ModelError::Validation("api_key required".into()));
    }
    Ok(())
}

/// Full scan of the table. Any malformed row fails the whole scan.
pub async fn list_all(db: &DatabaseConnection) -> Result<Vec<Model>, ModelError> {
    Entity::find().all(db).await.map_err(|e| ModelError::Db(e.to_string()))
}

pub async fn insert(db: &DatabaseConnection, model: &Model) -> Result<(), ModelError> {
    validate(model)?;
    let am = ActiveModel {
        service_id: Set(model.service_id),
        service_name: Set(model.service_name.clone()),
        api_key: Set(model.api_key.clone()),
    };
    Entity::insert(am)
        .exec_without_returning(db)
        .await
        .map_err(|e| ModelError::Db(e.to_string()))?;
    Ok(())
}

/// Overwrite name and key of the row with `model.service_id`; returns rows affected.
pub async fn update(db: &DatabaseConnection, model: &Model) -> Result<u64, ModelError> {
    validate(model)?;
    let res = Entity::update_many()
        .col_expr(Column::ServiceName, Expr::value(model.service_name.clone()))
        .col_expr(Column::ApiKey, Expr::value(model.api_key.clone()))
        .filter(Column::ServiceId.eq(model.service_id))
        .exec(db)
        .await
        .map_err(|e| ModelError::Db(e.to_string()))?;
    Ok(res.rows_affected)
}

/// Delete by id; returns rows affected.
pub async fn delete(db: &DatabaseConnection, service_id: Uuid) -> Result<u64, ModelError> {
    let res = Entity::delete_by_id(service_id)
        .exec(db)
        .await
        .map_err(|e| ModelError::Db(e.to_string()))?;
    Ok(res.rows_affected)
}
