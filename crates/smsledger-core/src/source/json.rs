//! JSON file and JSON-lines event source.

use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{EventSource, LiveFeed, Subscription};
use crate::message::RawEvent;
use crate::{Error, Result};

/// Event source reading the inbox from a JSON array file and live events
/// from newline-delimited JSON (for example, stdin).
///
/// Malformed live lines are logged and skipped.
pub struct JsonSource<R> {
    inbox_path: Option<PathBuf>,
    live: Mutex<Option<R>>,
}

impl<R> JsonSource<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    /// Create a source. Without `inbox_path` the bulk listing is empty.
    #[must_use]
    pub fn new(inbox_path: Option<PathBuf>, live: R) -> Self {
        Self {
            inbox_path,
            live: Mutex::new(Some(live)),
        }
    }
}

impl<R> std::fmt::Debug for JsonSource<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonSource")
            .field("inbox_path", &self.inbox_path)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<R> EventSource for JsonSource<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    async fn list(&self, max_count: usize) -> Result<Vec<RawEvent>> {
        let Some(path) = &self.inbox_path else {
            return Ok(Vec::new());
        };

        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::SourceUnavailable(format!("{}: {e}", path.display())))?;
        let mut events: Vec<RawEvent> = serde_json::from_str(&contents)
            .map_err(|e| Error::SourceUnavailable(format!("{}: {e}", path.display())))?;

        // Newest first, undated last.
        events.sort_by(|a, b| b.date.cmp(&a.date));
        events.truncate(max_count);
        debug!(path = %path.display(), count = events.len(), "Read inbox listing");
        Ok(events)
    }

    async fn subscribe(&self) -> Result<LiveFeed> {
        let reader = self
            .live
            .lock()
            .ok()
            .and_then(|mut live| live.take())
            .ok_or_else(|| Error::SourceUnavailable("live feed already subscribed".into()))?;

        let (tx, events) = mpsc::unbounded_channel();
        let task = tokio::spawn(async move {
            let mut lines = reader.lines();
            let mut line_no = 0usize;
            loop {
                let line = match lines.next_line().await {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        warn!(error = %e, "Live feed read failed");
                        break;
                    }
                };
                line_no += 1;

                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<RawEvent>(line) {
                    Ok(event) => {
                        if tx.send(event).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(line = line_no, error = %e, "Skipping malformed live event"),
                }
            }
            debug!("Live feed reader finished");
        });

        let abort = task.abort_handle();
        Ok(LiveFeed {
            events,
            subscription: Subscription::new(move || abort.abort()),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write as _;

    use tokio::io::BufReader;

    use super::*;

    fn temp_inbox(contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "smsledger-inbox-{}-{}.json",
            std::process::id(),
            contents.len()
        ));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[tokio::test]
    async fn test_live_lines_skip_malformed() {
        let input = b"{\"address\":\"A\",\"body\":\"one\",\"date\":1}\nnot json\n\n{\"originatingAddress\":\"B\",\"messageBody\":\"two\",\"timestamp\":2}\n";
        let source = JsonSource::new(None, BufReader::new(&input[..]));

        let mut feed = source.subscribe().await.unwrap();
        let first = feed.events.recv().await.unwrap();
        let second = feed.events.recv().await.unwrap();
        assert_eq!(first.address.as_deref(), Some("A"));
        assert_eq!(second.body.as_deref(), Some("two"));
        assert!(feed.events.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_live_line_split_across_reads() {
        use tokio_test::io::Builder;

        let mock = Builder::new()
            .read(b"{\"address\":\"BANK\",\"bo")
            .read(b"dy\":\"otp 42\",\"date\":7}\n")
            .build();
        let source = JsonSource::new(None, BufReader::new(mock));

        let mut feed = source.subscribe().await.unwrap();
        let event = feed.events.recv().await.unwrap();
        assert_eq!(event.body.as_deref(), Some("otp 42"));
        assert_eq!(event.date, Some(7));
        assert!(feed.events.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_second_subscribe_fails() {
        let source = JsonSource::new(None, BufReader::new(&b""[..]));
        let _feed = source.subscribe().await.unwrap();

        assert!(matches!(
            source.subscribe().await,
            Err(Error::SourceUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_inbox_listing_sorted_and_capped() {
        let path = temp_inbox(
            r#"[
                {"_id": 1, "address": "A", "body": "old", "date": 100},
                {"_id": 3, "address": "B", "body": "new", "date": 300},
                {"_id": 2, "address": "A", "body": "mid", "date": 200}
            ]"#,
        );
        let source = JsonSource::new(Some(path.clone()), BufReader::new(&b""[..]));

        let listing = source.list(2).await.unwrap();
        let ids: Vec<_> = listing.iter().filter_map(|e| e.native_id.clone()).collect();
        assert_eq!(ids, ["3", "2"]);

        std::fs::remove_file(path).unwrap();
    }

    #[tokio::test]
    async fn test_missing_inbox_file() {
        let source = JsonSource::new(
            Some(PathBuf::from("/nonexistent/smsledger/inbox.json")),
            BufReader::new(&b""[..]),
        );
        assert!(matches!(
            source.list(10).await,
            Err(Error::SourceUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_no_inbox_path_lists_nothing() {
        let source = JsonSource::new(None, BufReader::new(&b""[..]));
        assert!(source.list(10).await.unwrap().is_empty());
    }
}
