use async_trait::async_trait;

use crate::collaborators::{Augmentation, QueryAugmenter, UpstreamError};

/// Intent reported by [`PassthroughAugmenter`].
pub const GENERAL_INTENT: &str = "general";

/// Local augmenter that searches with the question as asked.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughAugmenter;

#[async_trait]
impl QueryAugmenter for PassthroughAugmenter {
    async fn augment(&self, question: &str) -> Result<Augmentation, UpstreamError> {
        Ok(Augmentation {
            query: question.trim().to_owned(),
            intent: GENERAL_INTENT.to_owned(),
            confidence: 1.0,
            concepts: Vec::new(),
        })
    }
}
