//! User entity.
//!
//! Only the columns the notification pipeline reads are mapped here. The
//! content subsystem owns the rest of the profile.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Display name
    #[sea_orm(nullable)]
    pub name: Option<String>,

    /// Push token registered by the user's device
    #[sea_orm(nullable)]
    pub push_token: Option<String>,

    /// Preferred language tag (e.g. "es", "en-US")
    #[sea_orm(nullable)]
    pub language: Option<String>,

    /// Label of the last known location (usually a city name)
    #[sea_orm(nullable)]
    pub last_known_location_label: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::friend::Entity")]
    Friend,
}

impl Related<super::friend::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Friend.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
