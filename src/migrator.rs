use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260101_000001_create_orders_table::Migration),
            Box::new(m20260101_000002_create_vouchers_table::Migration),
        ]
    }
}

// Migration implementations

mod m20260101_000001_create_orders_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20260101_000001_create_orders_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Orders table aligned with entities::order Model
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Orders::OrderReference).string().not_null())
                        .col(ColumnDef::new(Orders::CustomerName).string().not_null())
                        .col(ColumnDef::new(Orders::CustomerEmail).string().not_null())
                        .col(ColumnDef::new(Orders::CustomerPhone).string().not_null())
                        .col(ColumnDef::new(Orders::RecipientName).string().not_null())
                        .col(ColumnDef::new(Orders::RecipientEmail).string().null())
                        .col(ColumnDef::new(Orders::RecipientPhone).string().null())
                        .col(ColumnDef::new(Orders::GiftMessage).string().null())
                        .col(ColumnDef::new(Orders::DeliveryChannel).string().not_null())
                        .col(ColumnDef::new(Orders::DeliveryTarget).string().not_null())
                        .col(ColumnDef::new(Orders::ServiceId).uuid().null())
                        .col(ColumnDef::new(Orders::ServiceName).string().null())
                        .col(
                            ColumnDef::new(Orders::TotalAmount)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Orders::PaymentStatus).string().not_null())
                        .col(ColumnDef::new(Orders::VoucherId).uuid().null())
                        .col(ColumnDef::new(Orders::TransactionId).string().null())
                        .col(ColumnDef::new(Orders::PaymentType).string().null())
                        .col(ColumnDef::new(Orders::TransactionTime).string().null())
                        .col(ColumnDef::new(Orders::CreatedAt).timestamp_with_time_zone().not_null())
                        .col(ColumnDef::new(Orders::UpdatedAt).timestamp_with_time_zone().null())
                        .col(
                            ColumnDef::new(Orders::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .to_owned(),
                )
                .await?;

            // The gateway echoes the reference back; lookups and the guarded
            // transition both key on it.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_order_reference")
                        .table(Orders::Table)
                        .col(Orders::OrderReference)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_payment_status")
                        .table(Orders::Table)
                        .col(Orders::PaymentStatus)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Orders {
        Table,
        Id,
        OrderReference,
        CustomerName,
        CustomerEmail,
        CustomerPhone,
        RecipientName,
        RecipientEmail,
        RecipientPhone,
        GiftMessage,
        DeliveryChannel,
        DeliveryTarget,
        ServiceId,
        ServiceName,
        TotalAmount,
        PaymentStatus,
        VoucherId,
        TransactionId,
        PaymentType,
        TransactionTime,
        CreatedAt,
        UpdatedAt,
        Version,
    }
}

mod m20260101_000002_create_vouchers_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20260101_000002_create_vouchers_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Vouchers::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Vouchers::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Vouchers::Code).string().not_null())
                        .col(ColumnDef::new(Vouchers::ServiceId).uuid().not_null())
                        .col(ColumnDef::new(Vouchers::RecipientName).string().not_null())
                        .col(ColumnDef::new(Vouchers::RecipientEmail).string().null())
                        .col(ColumnDef::new(Vouchers::SenderName).string().not_null())
                        .col(ColumnDef::new(Vouchers::Message).string().null())
                        .col(
                            ColumnDef::new(Vouchers::Amount)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Vouchers::ValidUntil).timestamp_with_time_zone().not_null())
                        .col(
                            ColumnDef::new(Vouchers::Redeemed)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Vouchers::RedeemedAt).timestamp_with_time_zone().null())
                        .col(ColumnDef::new(Vouchers::CreatedAt).timestamp_with_time_zone().not_null())
                        .to_owned(),
                )
                .await?;

            // Store-level backstop for code uniqueness; the issuer retries on
            // collision up to its attempt bound.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_vouchers_code")
                        .table(Vouchers::Table)
                        .col(Vouchers::Code)
                        .unique()
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Vouchers::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Vouchers {
        Table,
        Id,
        Code,
        ServiceId,
        RecipientName,
        RecipientEmail,
        SenderName,
        Message,
        Amount,
        ValidUntil,
        RedeemedAt,
        Redeemed,
        CreatedAt,
    }
}
