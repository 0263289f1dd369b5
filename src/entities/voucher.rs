use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A redeemable gift voucher. Created exactly once per paid order; the
/// webhook pipeline never mutates it afterwards (redemption, extension and
/// voiding belong to the admin surface).
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "vouchers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Globally unique, externally presentable code (`PREFIX-YEAR-RANDOM`)
    pub code: String,

    pub service_id: Uuid,
    pub recipient_name: String,
    pub recipient_email: Option<String>,
    pub sender_name: String,
    pub message: Option<String>,

    /// Whole currency units, copied from the order at issuance time
    pub amount: i64,
    pub valid_until: DateTime<Utc>,

    pub redeemed: bool,
    pub redeemed_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
