//! Context retrieval — grounds handler prompts in the user's codebase.
//!
//! The similarity backend sits behind the `ContextIndex` trait. Callers
//! that have no index use `NullContextIndex` rather than probing for a
//! capability at runtime. `ContextRetriever` wraps whichever index is
//! configured with the non-throwing contract the pipeline relies on:
//! retrieval failure degrades to empty context, never to an error.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;

use crate::error::RetrievalError;

/// A retrieved passage of prior content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextSnippet {
    /// Where the snippet came from (relative file path, document id, ...).
    pub source_id: String,
    pub text: String,
}

/// Similarity-search collaborator.
#[async_trait]
pub trait ContextIndex: Send + Sync {
    /// Return up to `k` snippets relevant to `query`, in the backend's
    /// own ranking order.
    async fn retrieve(&self, query: &str, k: usize)
    -> Result<Vec<ContextSnippet>, RetrievalError>;
}

/// Index that always returns nothing. Used when no codebase is configured.
pub struct NullContextIndex;

#[async_trait]
impl ContextIndex for NullContextIndex {
    async fn retrieve(
        &self,
        _query: &str,
        _k: usize,
    ) -> Result<Vec<ContextSnippet>, RetrievalError> {
        Ok(Vec::new())
    }
}

/// File extensions worth indexing.
const INDEXED_EXTENSIONS: &[&str] = &["rs", "py", "md", "txt", "toml"];

/// Lexical index over a source tree.
///
/// Scores whole files by query-term overlap. No external embedding
/// service; ranking quality is proportional to how literally the query
/// names things in the code.
pub struct FileIndex {
    root: PathBuf,
}

impl FileIndex {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Recursively collect candidate files, skipping hidden dirs, build
    /// output, and test trees.
    fn collect_files<'a>(
        &'a self,
        dir: &'a Path,
        out: &'a mut Vec<PathBuf>,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<(), RetrievalError>> + Send + 'a>,
    > {
        Box::pin(async move {
            if !dir.exists() {
                return Ok(());
            }
            let mut read_dir = fs::read_dir(dir).await?;
            while let Some(entry) = read_dir.next_entry().await? {
                let path = entry.path();
                let metadata = entry.metadata().await?;
                if metadata.is_dir() {
                    let name = entry.file_name();
                    let name = name.to_string_lossy();
                    if !name.starts_with('.')
                        && name != "target"
                        && name != "node_modules"
                        && name != "tests"
                    {
                        self.collect_files(&path, out).await?;
                    }
                } else if metadata.is_file()
                    && path
                        .extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(|e| INDEXED_EXTENSIONS.contains(&e))
                {
                    out.push(path);
                }
            }
            Ok(())
        })
    }
}

#[async_trait]
impl ContextIndex for FileIndex {
    async fn retrieve(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<ContextSnippet>, RetrievalError> {
        let query_lower = query.to_lowercase();
        let terms: Vec<&str> = query_lower.split_whitespace().collect();
        if terms.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        self.collect_files(&self.root, &mut files).await?;

        let mut scored: Vec<(f32, ContextSnippet)> = Vec::new();
        for path in files {
            let Ok(content) = fs::read_to_string(&path).await else {
                // Binary or unreadable file; not a retrieval failure.
                continue;
            };
            let content_lower = content.to_lowercase();
            let matched = terms.iter().filter(|t| content_lower.contains(**t)).count();
            if matched == 0 {
                continue;
            }
            let source_id = path
                .strip_prefix(&self.root)
                .unwrap_or(&path)
                .to_string_lossy()
                .to_string();
            scored.push((
                matched as f32 / terms.len() as f32,
                ContextSnippet {
                    source_id,
                    text: content,
                },
            ));
        }

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored.into_iter().map(|(_, s)| s).collect())
    }
}

/// Non-throwing retrieval front for the pipeline.
pub struct ContextRetriever {
    index: Arc<dyn ContextIndex>,
    top_k: usize,
    enabled: bool,
}

impl ContextRetriever {
    pub fn new(index: Arc<dyn ContextIndex>, top_k: usize, enabled: bool) -> Self {
        Self {
            index,
            top_k,
            enabled,
        }
    }

    /// Retrieve context for `query`. Never fails: a disabled or failing
    /// index yields an empty sequence.
    pub async fn retrieve(&self, query: &str) -> Vec<ContextSnippet> {
        if !self.enabled {
            return Vec::new();
        }
        match self.index.retrieve(query, self.top_k).await {
            Ok(snippets) => {
                tracing::debug!(count = snippets.len(), "Retrieved context snippets");
                snippets
            }
            Err(e) => {
                tracing::warn!("Context retrieval failed, continuing without context: {}", e);
                Vec::new()
            }
        }
    }
}

/// Render snippets as fenced blocks labeled by source, each truncated to
/// `char_budget` characters. Truncation is silent.
pub fn format_context(snippets: &[ContextSnippet], char_budget: usize) -> String {
    let mut out = String::new();
    for (i, snippet) in snippets.iter().enumerate() {
        let body: String = snippet.text.chars().take(char_budget).collect();
        out.push_str(&format!(
            "## File {}: {}\n```\n{}\n```\n\n",
            i + 1,
            snippet.source_id,
            body
        ));
    }
    out
}
