//! Owning-collection chain lookup

use std::collections::HashSet;

use crate::core::error::StorageError;
use crate::core::traits::CollectionRepository;
use crate::model::{Collection, CollectionId};

/// Load the collection chain starting at `owner`, nearest first
///
/// # Errors
///
/// `NotFound` for a dangling parent reference and `Corrupt` when the
/// parent references form a cycle.
pub async fn load_ancestor_chain(
    repository: &dyn CollectionRepository,
    owner: CollectionId,
) -> Result<Vec<Collection>, StorageError> {
    let mut chain = Vec::new();
    let mut visited = HashSet::new();
    let mut next = Some(owner);

    while let Some(id) = next {
        if !visited.insert(id) {
            return Err(StorageError::Corrupt {
                message: format!("collection#{} is its own ancestor", id),
            });
        }

        let collection = repository
            .find_collection(id)
            .await?
            .ok_or_else(|| StorageError::NotFound {
                entity: format!("collection#{}", id),
            })?;
        next = collection.parent;
        chain.push(collection);
    }

    Ok(chain)
}
