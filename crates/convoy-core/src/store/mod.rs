//! Store adapter boundary
//!
//! The coordination core never mutates shared state directly. Every change is
//! expressed as a list of [`Op`]s, each pairing an assertion about the current
//! document with an update, and handed to [`Store::run`]. A store applies all
//! updates iff every assertion holds, otherwise none, and reports the first op
//! whose assertion failed.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// A stored document: a JSON object keyed by field name
pub type Document = Map<String, Value>;

/// Store operation errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    /// An assertion did not hold; no update was applied
    #[error("transaction aborted on {collection}/{id}")]
    Aborted { collection: String, id: String },

    /// The backend cannot be reached
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("internal store error: {0}")]
    Internal(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// A single-field predicate
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Field equals the value
    Eq(Value),
    /// Field equals one of the values
    In(Vec<Value>),
}

/// A predicate applied to a named field
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub predicate: Predicate,
}

impl Condition {
    /// Field must equal `value`
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            predicate: Predicate::Eq(value.into()),
        }
    }

    /// Field must equal one of `values`
    pub fn one_of<V: Into<Value>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Self {
            field: field.into(),
            predicate: Predicate::In(values.into_iter().map(Into::into).collect()),
        }
    }

    /// Check the condition against a document; a missing field never matches
    pub fn matches(&self, doc: &Document) -> bool {
        let Some(actual) = doc.get(&self.field) else {
            return false;
        };
        match &self.predicate {
            Predicate::Eq(expected) => actual == expected,
            Predicate::In(candidates) => candidates.iter().any(|c| c == actual),
        }
    }
}

/// Assertion about the current state of a document
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Assert {
    /// No requirement
    #[default]
    Any,
    /// The document must exist
    Exists,
    /// The document must not exist
    Missing,
    /// The document must exist and satisfy every condition
    Matches(Vec<Condition>),
}

impl Assert {
    /// Evaluate the assertion against the current document, if any
    pub fn holds(&self, doc: Option<&Document>) -> bool {
        match (self, doc) {
            (Assert::Any, _) => true,
            (Assert::Exists, doc) => doc.is_some(),
            (Assert::Missing, doc) => doc.is_none(),
            (Assert::Matches(_), None) => false,
            (Assert::Matches(conditions), Some(doc)) => conditions.iter().all(|c| c.matches(doc)),
        }
    }
}

/// Mutation applied when every assertion in a transaction holds
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// Leave the document untouched (assert-only op)
    None,
    /// Create the document; aborts if it already exists
    Insert(Document),
    /// Overwrite the given fields of an existing document; aborts if missing
    Set(Document),
    /// Create or overwrite the given fields
    Upsert(Document),
    /// Delete the document if present
    Remove,
}

/// One element of a transaction
#[derive(Debug, Clone, PartialEq)]
pub struct Op {
    pub collection: String,
    pub id: String,
    pub assert: Assert,
    pub update: Update,
}

impl Op {
    /// Create an op with no assertion and no update
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
            assert: Assert::Any,
            update: Update::None,
        }
    }

    /// Set the assertion
    pub fn assert(mut self, assert: Assert) -> Self {
        self.assert = assert;
        self
    }

    /// Set the update
    pub fn update(mut self, update: Update) -> Self {
        self.update = update;
        self
    }

    /// Insert a new document, asserting it does not exist yet
    pub fn insert(collection: impl Into<String>, id: impl Into<String>, doc: Document) -> Self {
        Self::new(collection, id)
            .assert(Assert::Missing)
            .update(Update::Insert(doc))
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// Serialize a value into a document
pub fn to_document<T: Serialize>(value: &T) -> StoreResult<Document> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(StoreError::Serialization(format!(
            "expected an object, got {}",
            other
        ))),
        Err(e) => Err(StoreError::Serialization(e.to_string())),
    }
}

/// Deserialize a document into a typed value
pub fn from_document<T: DeserializeOwned>(doc: Document) -> StoreResult<T> {
    serde_json::from_value(Value::Object(doc)).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Build a document from field/value pairs
pub fn fields<K, V, I>(pairs: I) -> Document
where
    K: Into<String>,
    V: Into<Value>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Transactional document store shared by every agent
#[async_trait]
pub trait Store: Send + Sync {
    /// Apply all ops atomically iff every assertion holds
    async fn run(&self, ops: Vec<Op>) -> StoreResult<()>;

    /// Read one document
    async fn find(&self, collection: &str, id: &str) -> StoreResult<Option<Document>>;

    /// Read every document of a collection, ordered by id
    async fn find_all(&self, collection: &str) -> StoreResult<Vec<(String, Document)>>;

    /// Read the documents of a collection that satisfy every condition
    async fn find_matching(
        &self,
        collection: &str,
        conditions: &[Condition],
    ) -> StoreResult<Vec<(String, Document)>> {
        let docs = self.find_all(collection).await?;
        Ok(docs
            .into_iter()
            .filter(|(_, doc)| conditions.iter().all(|c| c.matches(doc)))
            .collect())
    }
}
