use crate::executor::types::Payload;

/// Maps a successful payload onto a comparable key (e.g. a severity bucket)
/// so redundant results can be put to a vote.
pub trait PayloadClassifier: Send + Sync {
    fn name(&self) -> &str;

    /// `None` means the payload cannot be classified; voting is skipped then.
    fn classify(&self, payload: &Payload) -> Option<String>;
}
