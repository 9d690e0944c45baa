use std::sync::Arc;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use sqlx::PgPool;

mod filter;
mod memory;
mod postgres;

pub(crate) use filter::{Filter, FindOptions, SortDirection};
pub(crate) use memory::MemoryRepository;
pub(crate) use postgres::{PgRepository, PgSchema};

use super::records::{
    ChannelRecord, CommunityMessageRecord, CommunityRecord, FriendRecord, MembershipRecord,
    PermissionCatalogRecord, PrivateMessageRecord, UserRecord,
};

#[derive(Debug, thiserror::Error)]
pub(crate) enum StoreError {
    #[error("document already exists")]
    Duplicate,
    #[error("document was modified concurrently")]
    VersionConflict,
    #[error("document to replace was not found")]
    Missing,
    #[error("document encoding failed: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// A stored entity. Every document carries a version that `replace` bumps.
pub(crate) trait Document:
    Serialize + DeserializeOwned + Clone + Send + Sync + 'static
{
    const COLLECTION: &'static str;

    fn id(&self) -> String;

    fn version(&self) -> u64;

    fn set_version(&mut self, version: u64);

    /// Secondary key that must be unique within the collection.
    fn unique_key(&self) -> Option<String> {
        None
    }
}

/// Per-entity persistence contract. No transactions are exposed; `replace`
/// is a compare-and-swap on the document version.
#[async_trait]
pub(crate) trait Repository<T: Document>: Send + Sync {
    async fn find_one(&self, filter: &Filter) -> Result<Option<T>, StoreError>;

    async fn find_many(&self, filter: &Filter, options: &FindOptions)
        -> Result<Vec<T>, StoreError>;

    async fn exists(&self, filter: &Filter) -> Result<bool, StoreError>;

    async fn count(&self, filter: &Filter) -> Result<u64, StoreError>;

    async fn add(&self, document: T) -> Result<T, StoreError>;

    /// All or nothing: a duplicate anywhere in the batch inserts none of it.
    async fn add_many(&self, documents: Vec<T>) -> Result<Vec<T>, StoreError>;

    /// Replaces the first document matching `filter` when its stored version
    /// equals `document.version()`. Returns the stored copy with the bumped
    /// version.
    async fn replace(&self, filter: &Filter, document: T) -> Result<T, StoreError>;

    /// Hard-deletes every matching document.
    async fn remove(&self, filter: &Filter) -> Result<u64, StoreError>;
}

pub(crate) type Repo<T> = Arc<dyn Repository<T>>;

#[derive(Clone)]
pub(crate) struct Store {
    pub(crate) users: Repo<UserRecord>,
    pub(crate) communities: Repo<CommunityRecord>,
    pub(crate) memberships: Repo<MembershipRecord>,
    pub(crate) channels: Repo<ChannelRecord>,
    pub(crate) community_messages: Repo<CommunityMessageRecord>,
    pub(crate) friends: Repo<FriendRecord>,
    pub(crate) private_messages: Repo<PrivateMessageRecord>,
    pub(crate) permission_catalog: Repo<PermissionCatalogRecord>,
}

impl Store {
    pub(crate) fn in_memory() -> Self {
        Self {
            users: Arc::new(MemoryRepository::new()),
            communities: Arc::new(MemoryRepository::new()),
            memberships: Arc::new(MemoryRepository::new()),
            channels: Arc::new(MemoryRepository::new()),
            community_messages: Arc::new(MemoryRepository::new()),
            friends: Arc::new(MemoryRepository::new()),
            private_messages: Arc::new(MemoryRepository::new()),
            permission_catalog: Arc::new(MemoryRepository::new()),
        }
    }

    pub(crate) fn postgres(pool: PgPool) -> Self {
        let schema = Arc::new(PgSchema::new(pool));
        Self {
            users: Arc::new(PgRepository::new(Arc::clone(&schema))),
            communities: Arc::new(PgRepository::new(Arc::clone(&schema))),
            memberships: Arc::new(PgRepository::new(Arc::clone(&schema))),
            channels: Arc::new(PgRepository::new(Arc::clone(&schema))),
            community_messages: Arc::new(PgRepository::new(Arc::clone(&schema))),
            friends: Arc::new(PgRepository::new(Arc::clone(&schema))),
            private_messages: Arc::new(PgRepository::new(Arc::clone(&schema))),
            permission_catalog: Arc::new(PgRepository::new(schema)),
        }
    }
}
