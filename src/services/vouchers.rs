use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::{rngs::OsRng, Rng};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait,
    DatabaseConnection, EntityTrait, QueryFilter, TransactionTrait,
};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    entities::{
        order::{self, Entity as OrderEntity, Model as OrderModel},
        voucher::{self, ActiveModel as VoucherActiveModel, Entity as VoucherEntity, Model as VoucherModel},
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

/// Unambiguous code alphabet: no I, O, 0 or 1.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_RANDOM_LEN: usize = 8;
const MAX_CODE_ATTEMPTS: usize = 5;

/// Injectable code source so tests can force collisions deterministically.
pub type CodeSource = Arc<dyn Fn() -> String + Send + Sync>;

/// Result of an issuance request.
#[derive(Debug, Clone)]
pub struct IssuedVoucher {
    pub voucher_id: Uuid,
    pub code: String,
    /// True when the order already carried a voucher and none was created
    pub already_issued: bool,
}

#[derive(Clone)]
pub struct VoucherService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
    code_prefix: String,
    validity_days: i64,
    code_source: Option<CodeSource>,
}

impl VoucherService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: EventSender,
        code_prefix: String,
        validity_days: i64,
    ) -> Self {
        Self {
            db,
            event_sender,
            code_prefix,
            validity_days,
            code_source: None,
        }
    }

    /// Replaces the random code source. Test seam for collision behavior.
    pub fn with_code_source(mut self, source: CodeSource) -> Self {
        self.code_source = Some(source);
        self
    }

    pub async fn find_by_code(&self, code: &str) -> Result<Option<VoucherModel>, ServiceError> {
        VoucherEntity::find()
            .filter(voucher::Column::Code.eq(code))
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<VoucherModel>, ServiceError> {
        VoucherEntity::find_by_id(id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Issues a voucher for an order that has reached `completed`, exactly
    /// once.
    ///
    /// The voucher insert and the back-link onto the order run in one
    /// transaction; the link is a compare-and-swap on `voucher_id IS NULL`.
    /// A concurrent issuer that loses the swap rolls its voucher back and
    /// returns the winner's voucher, so two racing webhook deliveries can
    /// never leave two vouchers behind.
    #[instrument(skip(self, order), fields(order_id = %order.id, reference = %order.order_reference))]
    pub async fn issue_for_order(&self, order: &OrderModel) -> Result<IssuedVoucher, ServiceError> {
        if let Some(voucher_id) = order.voucher_id {
            let code = self.linked_code(order.id, voucher_id).await?;
            info!(%voucher_id, "voucher already issued for order");
            return Ok(IssuedVoucher {
                voucher_id,
                code,
                already_issued: true,
            });
        }

        let service_id = order.service_id.ok_or_else(|| {
            ServiceError::ValidationError(format!(
                "order {} has no linked service; cannot issue voucher",
                order.order_reference
            ))
        })?;
        if order.recipient_name.trim().is_empty() {
            return Err(ServiceError::ValidationError(format!(
                "order {} has no recipient name; cannot issue voucher",
                order.order_reference
            )));
        }
        if order.recipient_email.is_none() && order.recipient_phone.is_none() {
            return Err(ServiceError::ValidationError(format!(
                "order {} has no recipient contact channel; cannot issue voucher",
                order.order_reference
            )));
        }

        let now = Utc::now();
        let txn = self.db.begin().await?;

        let code = self.unique_code(&txn).await?;
        let created = VoucherActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code),
            service_id: Set(service_id),
            recipient_name: Set(order.recipient_name.clone()),
            recipient_email: Set(order.recipient_email.clone()),
            sender_name: Set(order.customer_name.clone()),
            message: Set(order.gift_message.clone()),
            amount: Set(order.total_amount),
            valid_until: Set(now + Duration::days(self.validity_days)),
            redeemed: Set(false),
            redeemed_at: Set(None),
            created_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let linked = OrderEntity::update_many()
            .col_expr(order::Column::VoucherId, Expr::value(created.id))
            .col_expr(order::Column::UpdatedAt, Expr::value(now))
            .col_expr(
                order::Column::Version,
                Expr::col(order::Column::Version).add(1),
            )
            .filter(order::Column::Id.eq(order.id))
            .filter(order::Column::VoucherId.is_null())
            .exec(&txn)
            .await?;

        if linked.rows_affected == 0 {
            // A concurrent issuer linked first; discard our voucher with the
            // transaction and hand back the winner's.
            txn.rollback().await?;
            warn!("lost voucher issuance race; returning existing voucher");

            let winner = OrderEntity::find_by_id(order.id)
                .one(&*self.db)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Order {} not found", order.id))
                })?;
            let voucher_id = winner.voucher_id.ok_or_else(|| {
                ServiceError::Conflict(format!(
                    "order {} lost issuance race but carries no voucher",
                    order.id
                ))
            })?;
            let code = self.linked_code(order.id, voucher_id).await?;
            return Ok(IssuedVoucher {
                voucher_id,
                code,
                already_issued: true,
            });
        }

        txn.commit().await?;
        info!(voucher_id = %created.id, code = %created.code, "voucher issued and linked");

        self.event_sender
            .send(Event::VoucherIssued {
                order_id: order.id,
                voucher_id: created.id,
                code: created.code.clone(),
            })
            .await;

        Ok(IssuedVoucher {
            voucher_id: created.id,
            code: created.code,
            already_issued: false,
        })
    }

    /// Loads the code of an order's linked voucher. A link pointing at a
    /// missing voucher row is a store inconsistency; never hand callers an
    /// empty code for it.
    async fn linked_code(&self, order_id: Uuid, voucher_id: Uuid) -> Result<String, ServiceError> {
        match self.find_by_id(voucher_id).await? {
            Some(voucher) => Ok(voucher.code),
            None => {
                error!(%order_id, %voucher_id, "order links a voucher that does not exist");
                Err(ServiceError::Conflict(format!(
                    "order {} links voucher {} but no such voucher exists",
                    order_id, voucher_id
                )))
            }
        }
    }

    /// Draws codes until one is unused, bounded by `MAX_CODE_ATTEMPTS`.
    async fn unique_code<C: ConnectionTrait>(&self, conn: &C) -> Result<String, ServiceError> {
        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let code = match &self.code_source {
                Some(source) => source(),
                None => generate_code(&self.code_prefix),
            };

            let taken = VoucherEntity::find()
                .filter(voucher::Column::Code.eq(code.clone()))
                .one(conn)
                .await?
                .is_some();
            if !taken {
                return Ok(code);
            }
            warn!(attempt, %code, "voucher code collision; regenerating");
        }

        error!(
            attempts = MAX_CODE_ATTEMPTS,
            "exhausted voucher code generation attempts"
        );
        Err(ServiceError::VoucherIssuance(format!(
            "could not generate a unique voucher code in {} attempts",
            MAX_CODE_ATTEMPTS
        )))
    }
}

/// Generates a `PREFIX-YEAR-RANDOM` voucher code from the OS CSPRNG.
pub fn generate_code(prefix: &str) -> String {
    format!(
        "{}-{}-{}",
        prefix,
        Utc::now().format("%Y"),
        random_token(CODE_RANDOM_LEN)
    )
}

/// Random token over the unambiguous alphabet, drawn from `OsRng`.
pub(crate) fn random_token(len: usize) -> String {
    let mut rng = OsRng;
    (0..len)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}
