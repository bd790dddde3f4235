use std::fmt;

use shared::error::ApiException;
use shared::protocol::{PageEnvelope, PageQuery};

use crate::query::QuerySignature;

/// Monotonic sequence number assigned when a fetch is dispatched. The
/// controller applies a completion only while this is still the newest
/// dispatched generation, which is what makes staleness rejection strictly
/// last-dispatched-wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FetchGeneration(pub(crate) u64);

impl fmt::Display for FetchGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of one dispatched fetch: the composed query, its signature,
/// and the generation it was issued under. Travels with the fetch task and
/// comes back attached to the completion.
#[derive(Debug, Clone)]
pub struct FetchTicket {
    pub generation: FetchGeneration,
    pub signature: QuerySignature,
    pub query: PageQuery,
}

/// Exactly one of these follows every dispatched fetch.
#[derive(Debug)]
pub enum FetchOutcome<T> {
    Received(PageEnvelope<T>),
    Failed(ApiException),
}

/// The terminal signal of one fetch invocation. Applying a completion is
/// the only way a received page or transport error reaches collection
/// state; no mutation happens outside this protocol.
#[derive(Debug)]
pub struct FetchCompletion<T> {
    pub ticket: FetchTicket,
    pub outcome: FetchOutcome<T>,
}
