use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, Validate)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Externally visible reference communicated to the payment gateway and
    /// echoed back in notifications.
    #[validate(length(
        min = 1,
        max = 64,
        message = "Order reference must be between 1 and 64 characters"
    ))]
    pub order_reference: String,

    pub customer_name: String,
    #[validate(email)]
    pub customer_email: String,
    pub customer_phone: String,

    pub recipient_name: String,
    pub recipient_email: Option<String>,
    pub recipient_phone: Option<String>,
    pub gift_message: Option<String>,

    /// `email`, `whatsapp` or `both`
    pub delivery_channel: String,
    /// `purchaser` or `recipient`
    pub delivery_target: String,

    pub service_id: Option<Uuid>,
    pub service_name: Option<String>,

    /// Whole currency units
    pub total_amount: i64,
    pub payment_status: String,

    /// Set exactly once, when the voucher is issued
    pub voucher_id: Option<Uuid>,

    // Gateway metadata captured for audit
    pub transaction_id: Option<String>,
    pub payment_type: Option<String>,
    pub transaction_time: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::voucher::Entity",
        from = "Column::VoucherId",
        to = "super::voucher::Column::Id"
    )]
    Voucher,
}

impl Related<super::voucher::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Voucher.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
