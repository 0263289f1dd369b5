use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection,
    EntityTrait, QueryFilter,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    entities::order::{self, ActiveModel as OrderActiveModel, Entity as OrderEntity, Model as OrderModel},
    errors::ServiceError,
    events::{Event, EventSender},
    gateway::PaymentStatus,
    services::delivery::{ChannelPreference, DeliveryTarget},
    services::vouchers::random_token,
};

const REFERENCE_RANDOM_LEN: usize = 6;

/// Gateway metadata persisted alongside a status transition, for audit.
#[derive(Debug, Clone)]
pub struct GatewayMetadata {
    pub transaction_id: String,
    pub payment_type: String,
    pub transaction_time: String,
}

/// Outcome of a guarded payment-status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The status edge was taken and written
    Applied,
    /// The order already left `pending` (terminal, failed, or a concurrent
    /// notification won the edge)
    AlreadyProcessed,
    /// `pending` notification for a still-`pending` order; no write
    Unchanged,
}

/// Input for the checkout collaborator.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub recipient_name: String,
    pub recipient_email: Option<String>,
    pub recipient_phone: Option<String>,
    pub gift_message: Option<String>,
    pub delivery_channel: ChannelPreference,
    pub delivery_target: DeliveryTarget,
    pub service_id: Uuid,
    pub service_name: Option<String>,
    pub total_amount: i64,
}

#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Creates a `pending` order and its external reference, before the
    /// gateway is ever involved.
    #[instrument(skip(self, input), fields(customer_email = %input.customer_email))]
    pub async fn create_order(&self, input: NewOrder) -> Result<OrderModel, ServiceError> {
        let id = Uuid::new_v4();
        let reference = generate_reference();
        let now = Utc::now();

        let model = OrderActiveModel {
            id: Set(id),
            order_reference: Set(reference.clone()),
            customer_name: Set(input.customer_name),
            customer_email: Set(input.customer_email),
            customer_phone: Set(input.customer_phone),
            recipient_name: Set(input.recipient_name),
            recipient_email: Set(input.recipient_email),
            recipient_phone: Set(input.recipient_phone),
            gift_message: Set(input.gift_message),
            delivery_channel: Set(input.delivery_channel.as_ref().to_string()),
            delivery_target: Set(input.delivery_target.as_ref().to_string()),
            service_id: Set(Some(input.service_id)),
            service_name: Set(input.service_name),
            total_amount: Set(input.total_amount),
            payment_status: Set(PaymentStatus::Pending.as_ref().to_string()),
            voucher_id: Set(None),
            transaction_id: Set(None),
            payment_type: Set(None),
            transaction_time: Set(None),
            created_at: Set(now),
            updated_at: Set(None),
            version: Set(1),
        };

        let created = model.insert(&*self.db).await?;
        info!(order_id = %created.id, reference = %created.order_reference, "order created");

        self.event_sender
            .send(Event::OrderCreated {
                order_id: created.id,
                reference: created.order_reference.clone(),
            })
            .await;

        Ok(created)
    }

    pub async fn find_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<OrderModel>, ServiceError> {
        OrderEntity::find()
            .filter(order::Column::OrderReference.eq(reference))
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<OrderModel>, ServiceError> {
        OrderEntity::find_by_id(id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Applies the guarded payment-status transition.
    ///
    /// The only edges this pipeline takes are `pending -> completed` and
    /// `pending -> failed`; everything else is absorbed as a no-op. The
    /// write is conditional on the row still being `pending`, which makes
    /// the check-then-write linearizable: of two concurrent notifications
    /// for the same order, exactly one observes `rows_affected == 1`.
    #[instrument(skip(self, order, metadata), fields(order_id = %order.id, target = %target))]
    pub async fn transition_payment_status(
        &self,
        order: &OrderModel,
        target: PaymentStatus,
        metadata: &GatewayMetadata,
    ) -> Result<TransitionOutcome, ServiceError> {
        let current = PaymentStatus::from_str(&order.payment_status).map_err(|_| {
            ServiceError::InvalidStatus(format!(
                "order {} carries unknown payment status {}",
                order.id, order.payment_status
            ))
        })?;

        if current != PaymentStatus::Pending {
            info!(
                current = %current,
                "notification for non-pending order absorbed"
            );
            return Ok(TransitionOutcome::AlreadyProcessed);
        }

        if target == PaymentStatus::Pending {
            // Duplicate pending/challenge callbacks generate no writes.
            return Ok(TransitionOutcome::Unchanged);
        }

        let result = OrderEntity::update_many()
            .col_expr(
                order::Column::PaymentStatus,
                Expr::value(target.as_ref()),
            )
            .col_expr(
                order::Column::TransactionId,
                Expr::value(metadata.transaction_id.clone()),
            )
            .col_expr(
                order::Column::PaymentType,
                Expr::value(metadata.payment_type.clone()),
            )
            .col_expr(
                order::Column::TransactionTime,
                Expr::value(metadata.transaction_time.clone()),
            )
            .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()))
            .col_expr(
                order::Column::Version,
                Expr::col(order::Column::Version).add(1),
            )
            .filter(order::Column::Id.eq(order.id))
            .filter(order::Column::PaymentStatus.eq(PaymentStatus::Pending.as_ref()))
            .exec(&*self.db)
            .await?;

        if result.rows_affected == 0 {
            warn!("lost the transition race; a concurrent notification was processed first");
            return Ok(TransitionOutcome::AlreadyProcessed);
        }

        info!(
            old_status = %current,
            new_status = %target,
            "payment status updated"
        );

        self.event_sender
            .send(Event::PaymentStatusChanged {
                order_id: order.id,
                reference: order.order_reference.clone(),
                old_status: current.as_ref().to_string(),
                new_status: target.as_ref().to_string(),
            })
            .await;

        Ok(TransitionOutcome::Applied)
    }
}

/// External order reference: `ORD-YYYYMMDD-RANDOM`, unique by index.
fn generate_reference() -> String {
    format!(
        "ORD-{}-{}",
        Utc::now().format("%Y%m%d"),
        random_token(REFERENCE_RANDOM_LEN)
    )
}
