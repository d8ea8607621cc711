//! Persistence of the learner's completed topics.
//!
//! This is the front end's side of the completion set: the progress views in
//! [`crate::progress`] only ever read what is loaded here.

use crate::error::{Result, StorageError};
use crate::models::CompletionSet;
use crate::store::Store;

pub const COMPLETED_KEY: &str = "completedTopics";

fn decode(raw: Option<&str>) -> Result<Vec<String>> {
    match raw {
        None => Ok(Vec::new()),
        Some(raw) => serde_json::from_str(raw).map_err(|source| StorageError::Malformed {
            key: COMPLETED_KEY.to_string(),
            source,
        }),
    }
}

pub fn load_completed<S: Store>(store: &S) -> Result<CompletionSet> {
    let topics = decode(store.get(COMPLETED_KEY)?.as_deref())?;
    Ok(topics.into_iter().collect())
}

/// Mark or unmark a topic. Returns the set as stored afterwards.
pub fn set_completed<S: Store>(store: &S, topic: &str, completed: bool) -> Result<CompletionSet> {
    let mut result = CompletionSet::new();
    store.update(COMPLETED_KEY, &mut |current| {
        // Stored as a list so insertion order survives for the front end.
        let mut topics = decode(current)?;
        let present = topics.iter().any(|t| t == topic);
        if completed && !present {
            topics.push(topic.to_string());
        } else if !completed {
            topics.retain(|t| t != topic);
        }
        result = topics.iter().cloned().collect();
        serde_json::to_string(&topics).map_err(|source| StorageError::Encode {
            key: COMPLETED_KEY.to_string(),
            source,
        })
    })?;
    Ok(result)
}
