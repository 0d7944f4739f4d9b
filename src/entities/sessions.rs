use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "sessions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// 64-char hex encoding of 32 random bytes; immutable once issued.
    #[sea_orm(unique)]
    pub token: String,

    /// Owning admin account (back-reference only).
    pub user_id: i32,

    pub issued_at: DateTimeUtc,

    pub expires_at: DateTimeUtc,

    /// Set on logout or password change; never cleared.
    pub revoked: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
