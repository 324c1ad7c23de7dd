use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_products_table::Migration),
            Box::new(m20240101_000002_create_user_profiles_table::Migration),
            Box::new(m20240101_000003_create_orders_table::Migration),
            Box::new(m20240101_000004_create_order_line_items_table::Migration),
        ]
    }
}

// Migration implementations

mod m20240101_000001_create_products_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_products_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Products::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Products::Sku)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(ColumnDef::new(Products::Description).text().null())
                        .col(
                            ColumnDef::new(Products::Price)
                                .decimal_len(10, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Products::HasSizes)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Products::ImageUrl).string().null())
                        .col(ColumnDef::new(Products::Rating).decimal_len(6, 2).null())
                        .col(
                            ColumnDef::new(Products::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Products {
        Table,
        Id,
        Sku,
        Name,
        Description,
        Price,
        HasSizes,
        ImageUrl,
        Rating,
        CreatedAt,
    }
}

mod m20240101_000002_create_user_profiles_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_user_profiles_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(UserProfiles::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(UserProfiles::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(UserProfiles::Username)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(UserProfiles::DefaultPhoneNumber)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(UserProfiles::DefaultStreetAddress1)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(UserProfiles::DefaultStreetAddress2)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(UserProfiles::DefaultTownOrCity)
                                .string()
                                .null(),
                        )
                        .col(ColumnDef::new(UserProfiles::DefaultCounty).string().null())
                        .col(
                            ColumnDef::new(UserProfiles::DefaultPostcode)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(UserProfiles::DefaultCountry)
                                .string_len(2)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(UserProfiles::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(UserProfiles::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(UserProfiles::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum UserProfiles {
        Table,
        Id,
        Username,
        DefaultPhoneNumber,
        DefaultStreetAddress1,
        DefaultStreetAddress2,
        DefaultTownOrCity,
        DefaultCounty,
        DefaultPostcode,
        DefaultCountry,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000003_create_orders_table {
    use sea_orm_migration::prelude::*;

    use super::m20240101_000002_create_user_profiles_table::UserProfiles;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_orders_table"
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
                        .col(ColumnDef::new(Orders::FullName).string_len(50).not_null())
                        .col(ColumnDef::new(Orders::Email).string_len(254).not_null())
                        .col(
                            ColumnDef::new(Orders::PhoneNumber)
                                .string_len(20)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Orders::Country).string_len(2).not_null())
                        .col(ColumnDef::new(Orders::Postcode).string_len(20).null())
                        .col(
                            ColumnDef::new(Orders::TownOrCity)
                                .string_len(40)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::StreetAddress1)
                                .string_len(80)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::StreetAddress2)
                                .string_len(80)
                                .null(),
                        )
                        .col(ColumnDef::new(Orders::County).string_len(80).null())
                        .col(
                            ColumnDef::new(Orders::Date)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::DeliveryCost)
                                .decimal_len(6, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::OrderTotal)
                                .decimal_len(10, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::GrandTotal)
                                .decimal_len(10, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Orders::OriginalBag).text().not_null())
                        .col(
                            ColumnDef::new(Orders::StripePid)
                                .string_len(254)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Orders::UserProfileId).uuid().null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_orders_user_profile")
                                .from(Orders::Table, Orders::UserProfileId)
                                .to(UserProfiles::Table, UserProfiles::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_orders_stripe_pid")
                        .table(Orders::Table)
                        .col(Orders::StripePid)
                        .to_owned(),
                )
                .await
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
        OrderNumber,
        FullName,
        Email,
        PhoneNumber,
        Country,
        Postcode,
        TownOrCity,
        StreetAddress1,
        StreetAddress2,
        County,
        Date,
        DeliveryCost,
        OrderTotal,
        GrandTotal,
        OriginalBag,
        StripePid,
        UserProfileId,
    }
}

mod m20240101_000004_create_order_line_items_table {
    use sea_orm_migration::prelude::*;

    use super::m20240101_000001_create_products_table::Products;
    use super::m20240101_000003_create_orders_table::Orders;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_order_line_items_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(OrderLineItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderLineItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderLineItems::OrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderLineItems::ProductId).uuid().not_null())
                        .col(
                            ColumnDef::new(OrderLineItems::ProductSize)
                                .string_len(8)
                                .null(),
                        )
                        .col(ColumnDef::new(OrderLineItems::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(OrderLineItems::LineitemTotal)
                                .decimal_len(10, 2)
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_line_items_order")
                                .from(OrderLineItems::Table, OrderLineItems::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_line_items_product")
                                .from(OrderLineItems::Table, OrderLineItems::ProductId)
                                .to(Products::Table, Products::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_order_line_items_order_id")
                        .table(OrderLineItems::Table)
                        .col(OrderLineItems::OrderId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderLineItems::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum OrderLineItems {
        Table,
        Id,
        OrderId,
        ProductId,
        ProductSize,
        Quantity,
        LineitemTotal,
    }
}
