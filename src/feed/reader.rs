//!
//! JSON-lines reader for transaction feeds.
//!
//! Every call to [`FeedReader::events`] opens the file again and yields its events from the top,
//! so a feed can be replayed as often as needed. Blank lines are skipped; the first unreadable
//! line ends the stream with an error.

use super::types::*;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, info};

/// Reader over a feed file
#[derive(Debug, Clone)]
pub struct FeedReader {
	/// Path of the JSON-lines file.
	path: PathBuf,
}

impl FeedReader {
	pub fn new(path: PathBuf) -> Self {
		Self { path }
	}

	/// Stream the feed's events from the start of the file.
	pub fn events(&self) -> BoxStream<'static, Result<FeedEvent, FeedError>> {
		let path = self.path.clone();
		info!("Reading transaction feed from {:?}", path);

		stream::once(async move { tokio::fs::File::open(&path).await })
			.flat_map(|opened| match opened {
				Ok(file) => parse_lines(BufReader::new(file)).left_stream(),
				Err(e) => stream::iter(vec![Err(FeedError::from(e))]).right_stream(),
			})
			.boxed()
	}
}

/// Parse each non-blank line of `reader` as a [`FeedEvent`].
pub(crate) fn parse_lines<R>(reader: R) -> impl Stream<Item = Result<FeedEvent, FeedError>>
where
	R: AsyncBufRead + Unpin + Send + 'static,
{
	stream::unfold(
		(reader.lines(), 0usize, false),
		|(mut lines, mut line_number, finished)| async move {
			if finished {
				return None;
			}

			loop {
				match lines.next_line().await {
					Ok(Some(line)) => {
						line_number += 1;
						if line.trim().is_empty() {
							continue;
						}
						return match serde_json::from_str::<FeedEvent>(&line) {
							Ok(event) => {
								debug!("Feed line {}: {:?}", line_number, event);
								Some((Ok(event), (lines, line_number, false)))
							}
							Err(source) => Some((
								Err(FeedError::JsonError {
									line: line_number,
									source,
								}),
								(lines, line_number, true),
							)),
						};
					}
					Ok(None) => return None,
					Err(e) => return Some((Err(e.into()), (lines, line_number, true))),
				}
			}
		},
	)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::primitives::BlockHash;

	fn head_line(sequence: u32) -> String {
		format!(
			r#"{{"type":"head","sequence":{},"blockHash":"{}"}}"#,
			sequence,
			"ab".repeat(32)
		)
	}

	#[tokio::test]
	async fn test_replays_file_from_start() {
		let dir = tempfile::tempdir().expect("Failed creating temp dir");
		let path = dir.path().join("feed.jsonl");
		tokio::fs::write(&path, format!("{}\n\n{}\n", head_line(1), head_line(2)))
			.await
			.unwrap();

		let reader = FeedReader::new(path);
		for _ in 0..2 {
			let events: Vec<_> = reader.events().collect().await;
			assert_eq!(events.len(), 2);
			assert_eq!(
				*events[1].as_ref().unwrap(),
				FeedEvent::Head {
					sequence: 2,
					block_hash: BlockHash([0xab; 32]),
				}
			);
		}
	}

	#[tokio::test]
	async fn test_bad_line_ends_stream() {
		let input = format!("{}\nnot json\n{}\n", head_line(1), head_line(3));
		let events: Vec<_> = parse_lines(BufReader::new(std::io::Cursor::new(input.into_bytes())))
			.collect()
			.await;

		assert_eq!(events.len(), 2);
		assert!(matches!(events[1], Err(FeedError::JsonError { line: 2, .. })));
	}

	#[tokio::test]
	async fn test_missing_file_is_io_error() {
		let reader = FeedReader::new(PathBuf::from("/nonexistent/feed.jsonl"));
		let events: Vec<_> = reader.events().collect().await;
		assert!(matches!(events.as_slice(), [Err(FeedError::IoError(_))]));
	}
}
