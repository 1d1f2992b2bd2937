//! Rendering retrieved memories into prompt context.

use tracing::debug;

use crate::types::MemoryRecord;

/// Placeholder used when a patient has nothing on record yet.
pub const NO_HISTORY: &str = "No prior history on record.";

/// Render search hits as one bullet per record, in the order given, until
/// `max_tokens` (estimated) is reached.
pub fn render_memories(records: &[MemoryRecord], max_tokens: usize) -> String {
    let mut lines = Vec::with_capacity(records.len());
    let mut token_count = 0;

    for record in records {
        let line = format_memory(record);
        let tokens = estimate_tokens(&line);
        if token_count + tokens > max_tokens {
            break;
        }
        token_count += tokens;
        lines.push(line);
    }

    debug!(
        memory_count = lines.len(),
        estimated_tokens = token_count,
        "Rendered memory context"
    );

    if lines.is_empty() {
        return NO_HISTORY.to_string();
    }
    lines.join("\n")
}

fn format_memory(record: &MemoryRecord) -> String {
    format!("- ({}) {}", record.metadata.role, record.text.trim())
}

fn estimate_tokens(text: &str) -> usize {
    // ~4 chars per token
    text.len().div_ceil(4)
}
