//! Replay of captured chunk streams
//!
//! A capture is one chunk JSON object per line. Lines copied straight out of
//! an SSE trace (`data: {...}`) are accepted too. Blank lines and `#`
//! comments are skipped; `[DONE]` ends the replay.

use std::io::BufRead;

use anyhow::{Context, Result};

use crate::manager::ComponentManager;
use crate::protocol::decoder::ChunkDecoder;
use crate::protocol::ChatStreamChunk;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplayStats {
    pub applied: usize,
    pub skipped: usize,
}

/// Feed every chunk in `reader` through the decoder into `manager`
pub fn replay_into(reader: impl BufRead, manager: &mut ComponentManager) -> Result<ReplayStats> {
    let decoder = ChunkDecoder::new();
    let mut stats = ReplayStats::default();

    for (index, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("reading line {}", index + 1))?;
        let payload = line.trim();
        let payload = payload.strip_prefix("data:").map(str::trim).unwrap_or(payload);
        if payload.is_empty() || payload.starts_with('#') {
            continue;
        }
        if payload == "[DONE]" {
            break;
        }

        let chunk: ChatStreamChunk = match serde_json::from_str(payload) {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::warn!("Line {}: not a chunk ({}), skipped", index + 1, e);
                stats.skipped += 1;
                continue;
            }
        };
        manager.apply(decoder.decode(chunk));
        stats.applied += 1;
    }

    tracing::info!(
        "Replayed {} chunks ({} skipped), {} components live",
        stats.applied,
        stats.skipped,
        manager.len()
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::ManagerDeps;
    use crate::render::{ComponentRegistry, RenderContext};
    use crate::ui_state;

    fn manager() -> ComponentManager {
        ComponentManager::new(
            ComponentRegistry::with_builtin(),
            RenderContext::default(),
            ManagerDeps::new(Box::new(ui_state::shared())),
        )
    }

    #[test]
    fn test_replays_plain_and_sse_lines() {
        let capture = r#"
# captured from a local backend
{"rich": {"id": "t", "type": "text", "data": {"content": "first"}}}
data: {"rich": {"id": "t", "type": "text", "lifecycle": "update", "data": {"content": "second"}}}
data: {"rich": {"id": "n", "type": "notification", "data": {"message": "done", "level": "success"}}}
data: [DONE]
{"rich": {"id": "late", "type": "text", "data": {"content": "never"}}}
"#;
        let mut manager = manager();
        let stats = replay_into(capture.as_bytes(), &mut manager).unwrap();
        assert_eq!(stats, ReplayStats { applied: 3, skipped: 0 });

        let text = manager.transcript_text();
        assert!(text.contains("second"));
        assert!(!text.contains("first"));
        assert!(text.contains("done"));
        assert!(!text.contains("never"));
    }

    #[test]
    fn test_bad_lines_are_skipped() {
        let capture = "not json\n{\"text\": \"hello\"}\n";
        let mut manager = manager();
        let stats = replay_into(capture.as_bytes(), &mut manager).unwrap();
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.applied, 1);
    }
}
