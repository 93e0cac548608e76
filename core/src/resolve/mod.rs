mod conflict;
mod trust;

pub use conflict::{CanonicalResult, Candidate, Conflict, ConflictResolver, ResolutionStrategy};
pub use trust::{TrustEntry, TrustTable};
