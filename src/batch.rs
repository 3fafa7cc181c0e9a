//! Parallel rendering of many documents on a bounded `rayon` pool.

use std::time::Instant;

use log::{debug, warn};
use rayon::prelude::*;

use crate::cache::RenderCache;
use crate::error::{RenderError, Result};
use crate::options::PrintOptions;
use crate::pipeline::{process_document, process_document_cached, Document, RenderResult, RENDER_STACK_SIZE};

/// Result for one document of a batch.
#[derive(Debug)]
pub struct BatchOutcome {
    pub id: String,
    pub result: Result<RenderResult>,
}

impl BatchOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Render `documents` with at most `performance.concurrent_jobs` running at
/// once. Outcomes come back in input order; one failing document does not
/// affect the others.
pub fn process_batch(documents: &[Document], options: &PrintOptions) -> Result<Vec<BatchOutcome>> {
    run(documents, options, None)
}

/// [`process_batch`] sharing a [`RenderCache`] across the jobs.
pub fn process_batch_cached(
    documents: &[Document],
    options: &PrintOptions,
    cache: &RenderCache,
) -> Result<Vec<BatchOutcome>> {
    run(documents, options, Some(cache))
}

fn run(documents: &[Document], options: &PrintOptions, cache: Option<&RenderCache>) -> Result<Vec<BatchOutcome>> {
    let jobs = options.performance.concurrent_jobs.max(1);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .stack_size(RENDER_STACK_SIZE)
        .thread_name(|i| format!("pforge-batch-{i}"))
        .build()
        .map_err(|e| RenderError::RenderFailed(format!("cannot start batch pool: {e}")))?;

    let start = Instant::now();
    let outcomes: Vec<BatchOutcome> = pool.install(|| {
        documents
            .par_iter()
            .map(|doc| {
                let result = match cache {
                    Some(cache) => process_document_cached(doc, options, cache),
                    None => process_document(doc, options),
                };
                if let Err(e) = &result {
                    warn!("[{}] batch render failed: {e}", doc.id);
                }
                BatchOutcome {
                    id: doc.id.clone(),
                    result,
                }
            })
            .collect()
    });

    let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
    debug!(
        "Batch: {} document(s), {} failed, {} job(s), {:?}",
        outcomes.len(),
        failed,
        jobs,
        start.elapsed()
    );
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn outcomes_keep_input_order() {
        let docs: Vec<Document> = (0..6)
            .map(|i| Document::html(format!("doc-{i}"), &format!("<p>Document {i}</p>")))
            .collect();
        let mut opts = PrintOptions::default();
        opts.performance.concurrent_jobs = 3;
        let outcomes = process_batch(&docs, &opts).unwrap();
        let ids: Vec<&str> = outcomes.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, ["doc-0", "doc-1", "doc-2", "doc-3", "doc-4", "doc-5"]);
        assert!(outcomes.iter().all(BatchOutcome::is_ok));
    }

    #[test]
    fn failures_are_isolated() {
        let docs = vec![
            Document::html("good", "<p>fine</p>"),
            Document::html("bad", r#"<a href="javascript:alert(1)">x</a>"#),
        ];
        let outcomes = process_batch(&docs, &PrintOptions::default()).unwrap();
        assert!(outcomes[0].is_ok());
        assert!(matches!(outcomes[1].result, Err(RenderError::SecurityViolation(_))));
    }

    #[test]
    fn shared_cache_hits_on_duplicates() {
        let mut opts = PrintOptions::default();
        opts.performance.enable_cache = true;
        opts.performance.concurrent_jobs = 1;
        let cache = RenderCache::new(Duration::from_secs(60));
        let docs = vec![Document::html("a", "<p>same</p>"), Document::html("b", "<p>same</p>")];
        let outcomes = process_batch_cached(&docs, &opts, &cache).unwrap();
        let hits = outcomes
            .iter()
            .filter(|o| o.result.as_ref().map(|r| r.cache_hit).unwrap_or(false))
            .count();
        assert_eq!(hits, 1);
        assert_eq!(cache.len(), 1);
    }
}
