use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_catalog_tables::Migration),
            Box::new(m20250101_000002_create_geography_tables::Migration),
            Box::new(m20250101_000003_create_account_tables::Migration),
            Box::new(m20250101_000004_create_promo_codes_table::Migration),
            Box::new(m20250101_000005_create_cart_tables::Migration),
            Box::new(m20250101_000006_create_order_tables::Migration),
        ]
    }
}

// Migration implementations

mod m20250101_000001_create_catalog_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000001_create_catalog_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Flavors::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Flavors::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Flavors::Name)
                                .string_len(120)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Flavors::Description).text().null())
                        .col(
                            ColumnDef::new(Flavors::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Flavors::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Flavors::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Products::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Products::Name).string_len(255).not_null())
                        .col(ColumnDef::new(Products::Description).text().null())
                        .col(ColumnDef::new(Products::FlavorId).uuid().null())
                        .col(
                            ColumnDef::new(Products::Price)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Products::StockQuantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Products::ImageUrl).string_len(1024).null())
                        .col(
                            ColumnDef::new(Products::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Products::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Products::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_products_flavor_id")
                                .from(Products::Table, Products::FlavorId)
                                .to(Flavors::Table, Flavors::Id)
                                .on_delete(ForeignKeyAction::SetNull)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_products_flavor_id")
                        .table(Products::Table)
                        .col(Products::FlavorId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Flavors::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Flavors {
        Table,
        Id,
        Name,
        Description,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum Products {
        Table,
        Id,
        Name,
        Description,
        FlavorId,
        Price,
        StockQuantity,
        ImageUrl,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250101_000002_create_geography_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000002_create_geography_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Kitchens::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Kitchens::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Kitchens::Name).string_len(255).not_null())
                        .col(ColumnDef::new(Kitchens::Address).text().not_null())
                        .col(ColumnDef::new(Kitchens::Phone).string_len(32).null())
                        .col(
                            ColumnDef::new(Kitchens::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Kitchens::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Kitchens::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Cities::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Cities::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Cities::Name)
                                .string_len(120)
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Cities::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Cities::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Cities::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Zones::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Zones::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Zones::CityId).uuid().not_null())
                        .col(ColumnDef::new(Zones::Name).string_len(120).not_null())
                        .col(
                            ColumnDef::new(Zones::DeliveryFee)
                                .decimal_len(19, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Zones::KitchenId).uuid().null())
                        .col(
                            ColumnDef::new(Zones::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Zones::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Zones::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_zones_city_id")
                                .from(Zones::Table, Zones::CityId)
                                .to(Cities::Table, Cities::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_zones_kitchen_id")
                                .from(Zones::Table, Zones::KitchenId)
                                .to(Kitchens::Table, Kitchens::Id)
                                .on_delete(ForeignKeyAction::SetNull)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_zones_city_id")
                        .table(Zones::Table)
                        .col(Zones::CityId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(DeliveryMen::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(DeliveryMen::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(DeliveryMen::Name).string_len(255).not_null())
                        .col(ColumnDef::new(DeliveryMen::Phone).string_len(32).not_null())
                        .col(ColumnDef::new(DeliveryMen::KitchenId).uuid().null())
                        .col(
                            ColumnDef::new(DeliveryMen::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(DeliveryMen::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryMen::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_delivery_men_kitchen_id")
                                .from(DeliveryMen::Table, DeliveryMen::KitchenId)
                                .to(Kitchens::Table, Kitchens::Id)
                                .on_delete(ForeignKeyAction::SetNull)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(DeliveryRules::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(DeliveryRules::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryRules::Name)
                                .string_len(120)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryRules::LeadDays)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(
                            ColumnDef::new(DeliveryRules::CutoffHour)
                                .integer()
                                .not_null()
                                .default(14),
                        )
                        .col(
                            ColumnDef::new(DeliveryRules::ClosedWeekdays)
                                .string_len(64)
                                .not_null()
                                .default(""),
                        )
                        .col(
                            ColumnDef::new(DeliveryRules::MaxDaysAhead)
                                .integer()
                                .not_null()
                                .default(14),
                        )
                        .col(
                            ColumnDef::new(DeliveryRules::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(DeliveryRules::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryRules::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(DeliveryRules::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(DeliveryMen::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Zones::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Cities::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Kitchens::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Kitchens {
        Table,
        Id,
        Name,
        Address,
        Phone,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum Cities {
        Table,
        Id,
        Name,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum Zones {
        Table,
        Id,
        CityId,
        Name,
        DeliveryFee,
        KitchenId,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum DeliveryMen {
        Table,
        Id,
        Name,
        Phone,
        KitchenId,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum DeliveryRules {
        Table,
        Id,
        Name,
        LeadDays,
        CutoffHour,
        ClosedWeekdays,
        MaxDaysAhead,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250101_000003_create_account_tables {

    use super::m20250101_000002_create_geography_tables::{Kitchens, Zones};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000003_create_account_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Customers::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Customers::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Customers::Phone)
                                .string_len(32)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Customers::Name).string_len(255).null())
                        .col(ColumnDef::new(Customers::Email).string_len(255).null())
                        .col(ColumnDef::new(Customers::Address).text().null())
                        .col(ColumnDef::new(Customers::ZoneId).uuid().null())
                        .col(
                            ColumnDef::new(Customers::PhoneVerified)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Customers::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Customers::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_customers_zone_id")
                                .from(Customers::Table, Customers::ZoneId)
                                .to(Zones::Table, Zones::Id)
                                .on_delete(ForeignKeyAction::SetNull)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(StaffUsers::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StaffUsers::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StaffUsers::Email)
                                .string_len(255)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(StaffUsers::Name).string_len(255).not_null())
                        .col(
                            ColumnDef::new(StaffUsers::PasswordHash)
                                .string_len(255)
                                .not_null(),
                        )
                        .col(ColumnDef::new(StaffUsers::Role).string_len(20).not_null())
                        .col(ColumnDef::new(StaffUsers::KitchenId).uuid().null())
                        .col(
                            ColumnDef::new(StaffUsers::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(StaffUsers::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StaffUsers::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_staff_users_kitchen_id")
                                .from(StaffUsers::Table, StaffUsers::KitchenId)
                                .to(Kitchens::Table, Kitchens::Id)
                                .on_delete(ForeignKeyAction::SetNull)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OtpCodes::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(OtpCodes::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(OtpCodes::Phone).string_len(32).not_null())
                        .col(ColumnDef::new(OtpCodes::CodeHash).string_len(128).not_null())
                        .col(
                            ColumnDef::new(OtpCodes::Attempts)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(OtpCodes::ExpiresAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OtpCodes::ConsumedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(OtpCodes::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_otp_codes_phone_created_at")
                        .table(OtpCodes::Table)
                        .col(OtpCodes::Phone)
                        .col(OtpCodes::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OtpCodes::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(StaffUsers::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Customers::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Customers {
        Table,
        Id,
        Phone,
        Name,
        Email,
        Address,
        ZoneId,
        PhoneVerified,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum StaffUsers {
        Table,
        Id,
        Email,
        Name,
        PasswordHash,
        Role,
        KitchenId,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum OtpCodes {
        Table,
        Id,
        Phone,
        CodeHash,
        Attempts,
        ExpiresAt,
        ConsumedAt,
        CreatedAt,
    }
}

mod m20250101_000004_create_promo_codes_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000004_create_promo_codes_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PromoCodes::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PromoCodes::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PromoCodes::Code)
                                .string_len(64)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(PromoCodes::Description).text().null())
                        .col(
                            ColumnDef::new(PromoCodes::DiscountType)
                                .string_len(20)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PromoCodes::DiscountValue)
                                .decimal_len(19, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(PromoCodes::MinOrderAmount)
                                .decimal_len(19, 4)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PromoCodes::MaxDiscountAmount)
                                .decimal_len(19, 4)
                                .null(),
                        )
                        .col(ColumnDef::new(PromoCodes::UsageLimit).integer().null())
                        .col(
                            ColumnDef::new(PromoCodes::UsageCount)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(PromoCodes::StartsAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PromoCodes::EndsAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PromoCodes::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(PromoCodes::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PromoCodes::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PromoCodes::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum PromoCodes {
        Table,
        Id,
        Code,
        Description,
        DiscountType,
        DiscountValue,
        MinOrderAmount,
        MaxDiscountAmount,
        UsageLimit,
        UsageCount,
        StartsAt,
        EndsAt,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250101_000005_create_cart_tables {

    use super::m20250101_000001_create_catalog_tables::Products;
    use super::m20250101_000003_create_account_tables::Customers;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000005_create_cart_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Carts::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Carts::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Carts::SessionId).string_len(128).not_null())
                        .col(ColumnDef::new(Carts::CustomerId).uuid().null())
                        .col(ColumnDef::new(Carts::Status).string_len(20).not_null())
                        .col(ColumnDef::new(Carts::PromoCode).string_len(64).null())
                        .col(
                            ColumnDef::new(Carts::ExpiresAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Carts::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Carts::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_carts_customer_id")
                                .from(Carts::Table, Carts::CustomerId)
                                .to(Customers::Table, Customers::Id)
                                .on_delete(ForeignKeyAction::SetNull)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_carts_session_id")
                        .table(Carts::Table)
                        .col(Carts::SessionId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_carts_status_expires_at")
                        .table(Carts::Table)
                        .col(Carts::Status)
                        .col(Carts::ExpiresAt)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(CartItems::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(CartItems::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(CartItems::CartId).uuid().not_null())
                        .col(ColumnDef::new(CartItems::ProductId).uuid().not_null())
                        .col(ColumnDef::new(CartItems::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(CartItems::UnitPrice)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CartItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CartItems::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_cart_items_cart_id")
                                .from(CartItems::Table, CartItems::CartId)
                                .to(Carts::Table, Carts::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_cart_items_product_id")
                                .from(CartItems::Table, CartItems::ProductId)
                                .to(Products::Table, Products::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_cart_items_cart_id")
                        .table(CartItems::Table)
                        .col(CartItems::CartId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(CartItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Carts::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Carts {
        Table,
        Id,
        SessionId,
        CustomerId,
        Status,
        PromoCode,
        ExpiresAt,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum CartItems {
        Table,
        Id,
        CartId,
        ProductId,
        Quantity,
        UnitPrice,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250101_000006_create_order_tables {

    use super::m20250101_000001_create_catalog_tables::Products;
    use super::m20250101_000002_create_geography_tables::{DeliveryMen, Kitchens, Zones};
    use super::m20250101_000003_create_account_tables::Customers;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000006_create_order_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Orders::OrderNumber)
                                .string_len(32)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Orders::CustomerId).uuid().not_null())
                        .col(ColumnDef::new(Orders::ZoneId).uuid().not_null())
                        .col(ColumnDef::new(Orders::KitchenId).uuid().null())
                        .col(ColumnDef::new(Orders::DeliveryManId).uuid().null())
                        .col(ColumnDef::new(Orders::Status).string_len(20).not_null())
                        .col(
                            ColumnDef::new(Orders::PaymentMethod)
                                .string_len(20)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::PaymentStatus)
                                .string_len(20)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::PaymentReference)
                                .string_len(255)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Orders::Subtotal)
                                .decimal_len(19, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::DiscountTotal)
                                .decimal_len(19, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::DeliveryFee)
                                .decimal_len(19, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::Total)
                                .decimal_len(19, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Orders::PromoCode).string_len(64).null())
                        .col(ColumnDef::new(Orders::DeliveryAddress).text().not_null())
                        .col(ColumnDef::new(Orders::DeliveryDate).date().not_null())
                        .col(ColumnDef::new(Orders::Notes).text().null())
                        .col(
                            ColumnDef::new(Orders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_orders_customer_id")
                                .from(Orders::Table, Orders::CustomerId)
                                .to(Customers::Table, Customers::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_orders_zone_id")
                                .from(Orders::Table, Orders::ZoneId)
                                .to(Zones::Table, Zones::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_orders_kitchen_id")
                                .from(Orders::Table, Orders::KitchenId)
                                .to(Kitchens::Table, Kitchens::Id)
                                .on_delete(ForeignKeyAction::SetNull)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_orders_delivery_man_id")
                                .from(Orders::Table, Orders::DeliveryManId)
                                .to(DeliveryMen::Table, DeliveryMen::Id)
                                .on_delete(ForeignKeyAction::SetNull)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_customer_id")
                        .table(Orders::Table)
                        .col(Orders::CustomerId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_kitchen_delivery_date")
                        .table(Orders::Table)
                        .col(Orders::KitchenId)
                        .col(Orders::DeliveryDate)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_status")
                        .table(Orders::Table)
                        .col(Orders::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderItems::OrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::ProductId).uuid().not_null())
                        .col(
                            ColumnDef::new(OrderItems::ProductName)
                                .string_len(255)
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderItems::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(OrderItems::UnitPrice)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderItems::LineTotal)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_items_order_id")
                                .from(OrderItems::Table, OrderItems::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_items_product_id")
                                .from(OrderItems::Table, OrderItems::ProductId)
                                .to(Products::Table, Products::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_items_order_id")
                        .table(OrderItems::Table)
                        .col(OrderItems::OrderId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Orders {
        Table,
        Id,
        OrderNumber,
        CustomerId,
        ZoneId,
        KitchenId,
        DeliveryManId,
        Status,
        PaymentMethod,
        PaymentStatus,
        PaymentReference,
        Subtotal,
        DiscountTotal,
        DeliveryFee,
        Total,
        PromoCode,
        DeliveryAddress,
        DeliveryDate,
        Notes,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum OrderItems {
        Table,
        Id,
        OrderId,
        ProductId,
        ProductName,
        Quantity,
        UnitPrice,
        LineTotal,
        CreatedAt,
    }
}
