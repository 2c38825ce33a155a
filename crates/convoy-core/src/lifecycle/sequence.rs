//! Named counters used to allocate entity ids

use crate::error::ConvoyResult;
use crate::store::{Assert, Condition, Op, Store, Update, fields, from_document};
use serde::Deserialize;

const SEQUENCE_COLLECTION: &str = "sequence";

#[derive(Deserialize)]
struct Counter {
    counter: u64,
}

/// Read the next value of sequence `name`
///
/// The returned op claims the value; include it in the same transaction as
/// whatever consumes it so a racing allocator aborts instead of reusing it.
pub(crate) async fn next_value(store: &dyn Store, name: &str) -> ConvoyResult<(u64, Op)> {
    match store.find(SEQUENCE_COLLECTION, name).await? {
        None => Ok((
            0,
            Op::insert(SEQUENCE_COLLECTION, name, fields([("counter", 1u64)])),
        )),
        Some(doc) => {
            let Counter { counter } = from_document(doc)?;
            let op = Op::new(SEQUENCE_COLLECTION, name)
                .assert(Assert::Matches(vec![Condition::eq("counter", counter)]))
                .update(Update::Set(fields([("counter", counter + 1)])));
            Ok((counter, op))
        }
    }
}
