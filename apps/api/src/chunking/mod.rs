//! Text chunking and bounded per-chunk async processing.
//!
//! Keeps LLM calls within token and time budgets: long text is split on paragraph
//! and word boundaries, then each chunk is processed under its own deadline,
//! either strictly in order or by a fixed pool of workers.

pub mod retry;

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error};

const PARAGRAPH_SEPARATOR: &str = "\n\n";

#[derive(Debug, Error)]
pub enum ChunkError<E: std::error::Error + Send + Sync + 'static> {
    #[error("chunk {chunk} timed out after {elapsed_ms}ms")]
    Timeout { chunk: usize, elapsed_ms: u128 },

    #[error("chunk {chunk} failed after {elapsed_ms}ms: {source}")]
    Processor {
        chunk: usize,
        elapsed_ms: u128,
        #[source]
        source: E,
    },

    #[error("chunk worker stopped unexpectedly: {0}")]
    Worker(String),
}

impl<E: std::error::Error + Send + Sync + 'static> ChunkError<E> {
    /// 1-based index of the chunk that failed, when known.
    pub fn chunk(&self) -> Option<usize> {
        match self {
            ChunkError::Timeout { chunk, .. } | ChunkError::Processor { chunk, .. } => Some(*chunk),
            ChunkError::Worker(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChunkOptions {
    pub max_chunk_size: usize,
    pub parallel: bool,
    /// Worker count in parallel mode. Values below 1 are treated as 1.
    pub concurrency: usize,
    pub timeout_per_chunk: Duration,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            max_chunk_size: 5000,
            parallel: false,
            concurrency: 3,
            timeout_per_chunk: Duration::from_millis(30_000),
        }
    }
}

/// Splits `text` into chunks of at most `max_chunk_size` characters.
///
/// Paragraphs (separated by blank lines) are packed greedily and rejoined with a
/// blank line. A paragraph longer than the limit is split on whitespace into
/// space-joined runs of words. A single word longer than the limit becomes its own
/// oversized chunk. Blank paragraphs are dropped.
pub fn chunk_text(text: &str, max_chunk_size: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for paragraph in split_paragraphs(text) {
        let para_len = paragraph.chars().count();

        if current_len > 0 && current_len + PARAGRAPH_SEPARATOR.len() + para_len <= max_chunk_size {
            current.push_str(PARAGRAPH_SEPARATOR);
            current.push_str(&paragraph);
            current_len += PARAGRAPH_SEPARATOR.len() + para_len;
            continue;
        }

        if current_len > 0 {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if para_len <= max_chunk_size {
            current = paragraph;
            current_len = para_len;
            continue;
        }

        for word in paragraph.split_whitespace() {
            let word_len = word.chars().count();
            if current_len > 0 && current_len + 1 + word_len > max_chunk_size {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if current_len > 0 {
                current.push(' ');
                current_len += 1;
            }
            current.push_str(word);
            current_len += word_len;
        }
    }

    if current_len > 0 {
        chunks.push(current);
    }
    chunks
}

/// Splits on one or more blank (whitespace-only) lines.
fn split_paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut lines: Vec<&str> = Vec::new();

    for line in text.split('\n') {
        if line.trim().is_empty() {
            if !lines.is_empty() {
                paragraphs.push(lines.join("\n"));
                lines.clear();
            }
        } else {
            lines.push(line);
        }
    }
    if !lines.is_empty() {
        paragraphs.push(lines.join("\n"));
    }
    paragraphs
}

/// Applies `processor(chunk, index, total)` to every chunk of `text`.
///
/// Results are returned in chunk order in both modes. The first timeout or error
/// fails the whole call. In parallel mode the remaining workers are aborted at that
/// point; work they had already handed off (e.g. a request already sent) may still
/// complete on the other side.
pub async fn process_in_chunks<T, E, F, Fut>(
    text: &str,
    processor: F,
    options: &ChunkOptions,
) -> Result<Vec<T>, ChunkError<E>>
where
    T: Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
    F: Fn(String, usize, usize) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    let chunks = chunk_text(text, options.max_chunk_size);
    let total = chunks.len();
    debug!(
        "Processing {total} chunk(s) ({} mode)",
        if options.parallel { "parallel" } else { "sequential" }
    );

    if !options.parallel {
        let mut results = Vec::with_capacity(total);
        for (index, chunk) in chunks.into_iter().enumerate() {
            let result =
                run_chunk(&processor, chunk, index, total, options.timeout_per_chunk).await?;
            results.push(result);
        }
        return Ok(results);
    }

    let queue = Arc::new(Mutex::new(
        chunks.into_iter().enumerate().collect::<VecDeque<_>>(),
    ));
    let processor = Arc::new(processor);
    let workers = options.concurrency.max(1).min(total.max(1));
    let timeout = options.timeout_per_chunk;

    let mut set = JoinSet::new();
    for _ in 0..workers {
        let queue = Arc::clone(&queue);
        let processor = Arc::clone(&processor);
        set.spawn(async move {
            let mut done = Vec::new();
            while let Some((index, chunk)) = next_chunk(&queue) {
                let result = run_chunk(processor.as_ref(), chunk, index, total, timeout).await?;
                done.push((index, result));
            }
            Ok::<_, ChunkError<E>>(done)
        });
    }

    let mut slots: Vec<Option<T>> = std::iter::repeat_with(|| None).take(total).collect();
    while let Some(joined) = set.join_next().await {
        let finished = match joined {
            Ok(Ok(finished)) => finished,
            Ok(Err(e)) => {
                error!("Chunk processing failed: {e}");
                set.abort_all();
                return Err(e);
            }
            Err(join_error) => {
                set.abort_all();
                return Err(ChunkError::Worker(join_error.to_string()));
            }
        };
        for (index, result) in finished {
            slots[index] = Some(result);
        }
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            slot.ok_or_else(|| ChunkError::Worker(format!("chunk {} produced no result", index + 1)))
        })
        .collect()
}

fn next_chunk(queue: &Mutex<VecDeque<(usize, String)>>) -> Option<(usize, String)> {
    match queue.lock() {
        Ok(mut guard) => guard.pop_front(),
        Err(poisoned) => poisoned.into_inner().pop_front(),
    }
}

async fn run_chunk<T, E, F, Fut>(
    processor: &F,
    chunk: String,
    index: usize,
    total: usize,
    timeout: Duration,
) -> Result<T, ChunkError<E>>
where
    E: std::error::Error + Send + Sync + 'static,
    F: Fn(String, usize, usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let started = Instant::now();
    match tokio::time::timeout(timeout, processor(chunk, index, total)).await {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(source)) => Err(ChunkError::Processor {
            chunk: index + 1,
            elapsed_ms: started.elapsed().as_millis(),
            source,
        }),
        Err(_) => Err(ChunkError::Timeout {
            chunk: index + 1,
            elapsed_ms: started.elapsed().as_millis(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Error)]
    #[error("processor rejected chunk {0}")]
    struct Rejected(usize);

    fn words(text: &str) -> Vec<&str> {
        text.split_whitespace().collect()
    }

    fn sample_text(paragraphs: usize, words_per_paragraph: usize) -> String {
        (0..paragraphs)
            .map(|p| {
                (0..words_per_paragraph)
                    .map(|w| format!("word{p}x{w}"))
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        assert_eq!(chunk_text("hello world", 100), vec!["hello world".to_string()]);
    }

    #[test]
    fn test_empty_text_has_no_chunks() {
        assert!(chunk_text("", 100).is_empty());
        assert!(chunk_text("  \n\n \n", 100).is_empty());
    }

    #[test]
    fn test_paragraphs_are_packed_greedily() {
        let text = "aaaa\n\nbbbb\n\ncccc";
        // "aaaa\n\nbbbb" is exactly 10 characters.
        assert_eq!(
            chunk_text(text, 10),
            vec!["aaaa\n\nbbbb".to_string(), "cccc".to_string()]
        );
    }

    #[test]
    fn test_multiple_blank_lines_separate_paragraphs() {
        let chunks = chunk_text("one\n \n\n  \ntwo", 5);
        assert_eq!(chunks, vec!["one".to_string(), "two".to_string()]);
    }

    #[test]
    fn test_long_paragraph_splits_on_words() {
        let text = "alpha beta gamma delta epsilon";
        let chunks = chunk_text(text, 11);
        assert_eq!(chunks, vec!["alpha beta", "gamma delta", "epsilon"]);
    }

    #[test]
    fn test_oversized_word_is_left_intact() {
        let chunks = chunk_text("tiny supercalifragilistic end", 6);
        assert_eq!(chunks, vec!["tiny", "supercalifragilistic", "end"]);
    }

    #[test]
    fn test_twelve_thousand_chars_respect_limit_and_keep_words() {
        let text = sample_text(40, 40);
        assert!(text.chars().count() >= 12_000, "{}", text.len());

        let chunks = chunk_text(&text, 5000);
        assert!(chunks.len() >= 3);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 5000);
        }

        let rejoined = chunks.join(" ");
        assert_eq!(words(&rejoined), words(&text));
    }

    #[test]
    fn test_size_bound_holds_for_single_huge_paragraph() {
        let text = (0..3000).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        let chunks = chunk_text(&text, 500);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 500 || !chunk.contains(' '));
        }
        assert_eq!(words(&chunks.join(" ")), words(&text));
    }

    #[test]
    fn test_limit_counts_characters_not_bytes() {
        let chunks = chunk_text("ééééé ééééé", 5);
        assert_eq!(chunks, vec!["ééééé", "ééééé"]);
    }

    #[tokio::test]
    async fn test_sequential_results_in_order() {
        let text = sample_text(6, 10);
        let options = ChunkOptions {
            max_chunk_size: 80,
            ..Default::default()
        };

        let results = process_in_chunks(
            &text,
            |chunk, index, total| async move { Ok::<_, Rejected>((index, total, chunk.len())) },
            &options,
        )
        .await
        .unwrap();

        let total = results.len();
        assert!(total > 1);
        for (i, (index, reported_total, _)) in results.iter().enumerate() {
            assert_eq!(*index, i);
            assert_eq!(*reported_total, total);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_parallel_matches_sequential_order() {
        let text = sample_text(12, 8);
        let sequential = ChunkOptions {
            max_chunk_size: 60,
            parallel: false,
            concurrency: 1,
            timeout_per_chunk: Duration::from_secs(5),
        };

        // Later chunks finish first in parallel mode.
        let processor = |chunk: String, index: usize, total: usize| async move {
            tokio::time::sleep(Duration::from_millis(((total - index) * 10) as u64)).await;
            Ok::<_, Rejected>(chunk.to_uppercase())
        };

        let expected = process_in_chunks(&text, processor, &sequential).await.unwrap();
        for concurrency in [1, 2, 3, 8, 50] {
            let parallel = ChunkOptions {
                parallel: true,
                concurrency,
                ..sequential.clone()
            };
            let actual = process_in_chunks(&text, processor, &parallel).await.unwrap();
            assert_eq!(actual, expected, "concurrency {concurrency}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_parallel_respects_concurrency_bound() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let options = ChunkOptions {
            max_chunk_size: 20,
            parallel: true,
            concurrency: 2,
            timeout_per_chunk: Duration::from_secs(5),
        };

        let (flight, top) = (Arc::clone(&in_flight), Arc::clone(&peak));
        let results = process_in_chunks(
            &sample_text(10, 3),
            move |_chunk, index, _total| {
                let (flight, top) = (Arc::clone(&flight), Arc::clone(&top));
                async move {
                    let now = flight.fetch_add(1, Ordering::SeqCst) + 1;
                    top.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    flight.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, Rejected>(index)
                }
            },
            &options,
        )
        .await
        .unwrap();

        assert_eq!(results, (0..results.len()).collect::<Vec<_>>());
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequential_timeout_names_chunk() {
        let options = ChunkOptions {
            max_chunk_size: 5,
            timeout_per_chunk: Duration::from_millis(100),
            ..Default::default()
        };

        let err = process_in_chunks(
            "aaaa\n\nbbbb\n\ncccc",
            |_chunk, index, _total| async move {
                if index == 1 {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
                Ok::<_, Rejected>(index)
            },
            &options,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ChunkError::Timeout { chunk: 2, .. }), "{err}");
        assert!(err.to_string().contains("chunk 2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_parallel_timeout_names_chunk_and_elapsed() {
        let options = ChunkOptions {
            max_chunk_size: 5,
            parallel: true,
            concurrency: 2,
            timeout_per_chunk: Duration::from_millis(100),
        };

        let err = process_in_chunks(
            "aaaa\n\nbbbb\n\ncccc",
            |_chunk, index, _total| async move {
                if index == 2 {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
                Ok::<_, Rejected>(index)
            },
            &options,
        )
        .await
        .unwrap_err();

        match err {
            ChunkError::Timeout { chunk, elapsed_ms } => {
                assert_eq!(chunk, 3);
                assert!(elapsed_ms >= 100, "elapsed {elapsed_ms}ms");
            }
            other => panic!("expected timeout, got {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_parallel_error_propagates() {
        let options = ChunkOptions {
            max_chunk_size: 5,
            parallel: true,
            concurrency: 2,
            timeout_per_chunk: Duration::from_secs(1),
        };

        let err = process_in_chunks(
            "aaaa\n\nbbbb\n\ncccc\n\ndddd",
            |_chunk, index, _total| async move {
                if index == 2 {
                    Err(Rejected(index))
                } else {
                    Ok(index)
                }
            },
            &options,
        )
        .await
        .unwrap_err();

        assert_eq!(err.chunk(), Some(3));
        assert!(matches!(err, ChunkError::Processor { source: Rejected(2), .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_parallel_failure_aborts_siblings() {
        let finished = Arc::new(AtomicUsize::new(0));
        let options = ChunkOptions {
            max_chunk_size: 5,
            parallel: true,
            concurrency: 2,
            timeout_per_chunk: Duration::from_secs(60),
        };

        let counter = Arc::clone(&finished);
        let err = process_in_chunks(
            "aaaa\n\nbbbb",
            move |_chunk, index, _total| {
                let counter = Arc::clone(&counter);
                async move {
                    if index == 0 {
                        return Err(Rejected(index));
                    }
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(index)
                }
            },
            &options,
        )
        .await
        .unwrap_err();

        assert_eq!(err.chunk(), Some(1));
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }
}
