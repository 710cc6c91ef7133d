//! SeaORM entity models used by the database storage backend.
//!
//! These structs map to the SQLite tables created by `database_storage`:
//! - `events` - raw detector events, one row each
//! - `reports` - JSON-serialized `Report` per session
//! - `sessions` - JSON-serialized `SessionInfo` per session
//! - `interviews` - JSON-serialized `Interview` per join token

/// Events table entity models.
pub mod events {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "events")]
    pub struct Model {
        /// Auto-increment row id
        #[sea_orm(primary_key)]
        pub id: i32,
        pub session_id: String,
        pub event_type: String,
        /// Event time as milliseconds since the Unix epoch
        pub time_ms: i64,
        pub details: String,
        /// JSON array of detected object labels
        pub objects: Option<String>,
        /// Free-form JSON metadata
        pub meta: Option<String>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

/// Reports table entity models.
pub mod reports {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "reports")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub session_id: String,
        /// Compact JSON payload
        pub json: String,
        /// RFC3339 generation timestamp
        pub generated_at: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

/// Session info table entity models.
pub mod sessions {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "sessions")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub session_id: String,
        pub json: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

/// Interviews table entity models.
pub mod interviews {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "interviews")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub token: String,
        #[sea_orm(unique)]
        pub interview_id: String,
        pub session_id: String,
        pub json: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}
