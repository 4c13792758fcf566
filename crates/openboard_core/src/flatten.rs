//! Row flattening for denormalized join results.
//!
//! # Responsibility
//! - Fold one-row-per-(entity, child) join output back into entities with
//!   nested child collections.
//!
//! # Invariants
//! - Output order is the order in which each entity key first appears.
//! - Children keep first-seen order and are never duplicated.
//! - A row without a child (outer join miss) adds no child.

use std::collections::HashMap;
use std::hash::Hash;

/// Entity that owns a nested child collection.
pub trait Aggregate {
    type Child: PartialEq;

    fn children_mut(&mut self) -> &mut Vec<Self::Child>;
}

/// One denormalized row: entity-scoped columns plus an optional child.
pub trait JoinRow {
    type Key: Eq + Hash;
    type Entity: Aggregate;

    fn key(&self) -> Self::Key;

    /// Splits the row into an entity with no children and the row's child.
    fn into_parts(self) -> (Self::Entity, Option<<Self::Entity as Aggregate>::Child>);
}

/// Reassembles entities from join rows in linear time.
pub fn flatten<R, I>(rows: I) -> Vec<R::Entity>
where
    R: JoinRow,
    I: IntoIterator<Item = R>,
{
    let mut index: HashMap<R::Key, usize> = HashMap::new();
    let mut entities: Vec<R::Entity> = Vec::new();

    for row in rows {
        let key = row.key();
        let (entity, child) = row.into_parts();

        let position = *index.entry(key).or_insert_with(|| {
            entities.push(entity);
            entities.len() - 1
        });

        if let Some(child) = child {
            let children = entities[position].children_mut();
            if !children.contains(&child) {
                children.push(child);
            }
        }
    }

    entities
}
