pub use entity::prelude::*;
pub use entity::{email, key_point, preference, statistics, user};
pub use sea_orm::{
    prelude::*, sea_query::Expr, ActiveValue, DatabaseConnection, DbErr, FromQueryResult,
    JoinType, Order, QueryFilter, QueryOrder, QuerySelect, RelationTrait, TransactionTrait,
};
