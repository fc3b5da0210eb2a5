//! Citation prompt templates.

use super::{ChatMessage, Role};
use crate::embeddings::ScoredChunk;

/// System instructions asking the model to tag every citation with the data point id.
pub const SYSTEM_PROMPT: &str = "
You are a helpful assistant that is helping user summarize the information with citations.

Tag all the citations with tags around it like:

```
this is some text [<id>2</id>, <id>14</id>]
```";

/// Renders retrieved chunks as numbered data points.
pub fn render_data_points(hits: &[ScoredChunk]) -> String {
    let mut out = String::new();
    for (idx, hit) in hits.iter().enumerate() {
        out.push_str(&format!("<id>[{}]</id>\n\n{}", idx, hit.payload.text));
        out.push_str("\n------\n");
    }
    out
}

/// Builds the system and user messages for one question.
pub fn build_messages(question: &str, hits: &[ScoredChunk]) -> Vec<ChatMessage> {
    let data_points = render_data_points(hits);
    let user = format!(
        "\nData points collection:\n\n{data_points}\n\n---\n\nUser has asked the following question:\n\n{question}\n"
    );
    vec![
        ChatMessage {
            role: Role::System,
            content: SYSTEM_PROMPT.to_string(),
        },
        ChatMessage {
            role: Role::User,
            content: user,
        },
    ]
}
