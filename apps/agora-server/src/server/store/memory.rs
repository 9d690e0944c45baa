use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{Document, Filter, FindOptions, Repository, StoreError};

/// Process-local repository. Documents are kept in insertion order and
/// filtered through their JSON form, so it behaves like the Postgres backend.
pub(crate) struct MemoryRepository<T> {
    documents: RwLock<Vec<T>>,
}

impl<T> MemoryRepository<T> {
    pub(crate) fn new() -> Self {
        Self {
            documents: RwLock::new(Vec::new()),
        }
    }
}

fn matches<T: Document>(document: &T, filter: &Filter) -> Result<bool, StoreError> {
    if matches!(filter, Filter::All) {
        return Ok(true);
    }
    Ok(filter.matches(&serde_json::to_value(document)?))
}

fn conflicts<T: Document>(existing: &T, candidate: &T) -> bool {
    if existing.id() == candidate.id() {
        return true;
    }
    match (existing.unique_key(), candidate.unique_key()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

#[async_trait]
impl<T: Document> Repository<T> for MemoryRepository<T> {
    async fn find_one(&self, filter: &Filter) -> Result<Option<T>, StoreError> {
        let documents = self.documents.read().await;
        for document in documents.iter() {
            if matches(document, filter)? {
                return Ok(Some(document.clone()));
            }
        }
        Ok(None)
    }

    async fn find_many(
        &self,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<T>, StoreError> {
        let documents = self.documents.read().await;
        let mut selected: Vec<(Value, T)> = Vec::new();
        for document in documents.iter() {
            let value = serde_json::to_value(document)?;
            if filter.matches(&value) {
                selected.push((value, document.clone()));
            }
        }
        drop(documents);

        if !options.sort.is_empty() {
            selected.sort_by(|(a, _), (b, _)| options.compare(a, b));
        }
        if let Some(limit) = options.limit {
            selected.truncate(limit);
        }
        Ok(selected.into_iter().map(|(_, document)| document).collect())
    }

    async fn exists(&self, filter: &Filter) -> Result<bool, StoreError> {
        Ok(self.find_one(filter).await?.is_some())
    }

    async fn count(&self, filter: &Filter) -> Result<u64, StoreError> {
        let documents = self.documents.read().await;
        let mut count = 0_u64;
        for document in documents.iter() {
            if matches(document, filter)? {
                count += 1;
            }
        }
        Ok(count)
    }

    async fn add(&self, mut document: T) -> Result<T, StoreError> {
        let mut documents = self.documents.write().await;
        if documents.iter().any(|existing| conflicts(existing, &document)) {
            return Err(StoreError::Duplicate);
        }
        document.set_version(1);
        documents.push(document.clone());
        Ok(document)
    }

    async fn add_many(&self, documents: Vec<T>) -> Result<Vec<T>, StoreError> {
        let mut stored = self.documents.write().await;
        for (index, candidate) in documents.iter().enumerate() {
            let clashes_with_store = stored.iter().any(|existing| conflicts(existing, candidate));
            let clashes_in_batch = documents[..index]
                .iter()
                .any(|earlier| conflicts(earlier, candidate));
            if clashes_with_store || clashes_in_batch {
                return Err(StoreError::Duplicate);
            }
        }
        let mut added = Vec::with_capacity(documents.len());
        for mut document in documents {
            document.set_version(1);
            stored.push(document.clone());
            added.push(document);
        }
        Ok(added)
    }

    async fn replace(&self, filter: &Filter, mut document: T) -> Result<T, StoreError> {
        let mut documents = self.documents.write().await;
        let mut target = None;
        for (index, existing) in documents.iter().enumerate() {
            if matches(existing, filter)? {
                target = Some(index);
                break;
            }
        }
        let index = target.ok_or(StoreError::Missing)?;
        if documents[index].version() != document.version() {
            return Err(StoreError::VersionConflict);
        }
        let clashes = documents
            .iter()
            .enumerate()
            .any(|(other, existing)| other != index && conflicts(existing, &document));
        if clashes {
            return Err(StoreError::Duplicate);
        }
        document.set_version(document.version() + 1);
        documents[index] = document.clone();
        Ok(document)
    }

    async fn remove(&self, filter: &Filter) -> Result<u64, StoreError> {
        let mut documents = self.documents.write().await;
        let mut doomed = Vec::with_capacity(documents.len());
        for document in documents.iter() {
            doomed.push(matches(document, filter)?);
        }
        let removed = doomed.iter().filter(|hit| **hit).count();
        let mut verdicts = doomed.into_iter();
        documents.retain(|_| !verdicts.next().unwrap_or(false));
        Ok(u64::try_from(removed).unwrap_or(u64::MAX))
    }
}
