//! Pattern registration, storage and confidence updates

use chrono::Utc;
use evolv_core::{InMemoryRepository, KeyedLocks, PatternConfig, Repository, Result, Signal};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::matcher::{CompiledPatterns, PatternMatch, PatternMatcher};
use crate::pattern::{ErrorPattern, PatternFields};
use crate::similarity::calculate_pattern_similarity;

/// Library of learned patterns backed by a repository
///
/// Confidence nudges are serialized per pattern id. Matching runs over a
/// snapshot in registration order (`first_occurrence`, then id), which is the
/// order used for tie-breaking. Regexes are compiled once at registration;
/// patterns placed in the repository by other means are compiled per match.
pub struct PatternLibrary {
    repository: Arc<dyn Repository<ErrorPattern>>,
    locks: KeyedLocks,
    compiled: RwLock<CompiledPatterns>,
    matcher: PatternMatcher,
}

impl PatternLibrary {
    /// Library backed by an in-memory repository
    pub fn new(config: PatternConfig) -> Self {
        Self::with_repository(Arc::new(InMemoryRepository::new()), config)
    }

    pub fn with_repository(
        repository: Arc<dyn Repository<ErrorPattern>>,
        config: PatternConfig,
    ) -> Self {
        Self {
            repository,
            locks: KeyedLocks::new(),
            compiled: RwLock::new(CompiledPatterns::new()),
            matcher: PatternMatcher::new(config),
        }
    }

    pub fn matcher(&self) -> &PatternMatcher {
        &self.matcher
    }

    /// Validate and store a pattern.
    ///
    /// Invalid regexes are rejected here so matching never has to fail.
    #[instrument(skip(self, pattern), fields(pattern = %pattern.name))]
    pub async fn register(&self, pattern: ErrorPattern) -> Result<ErrorPattern> {
        let compiled = Arc::new(pattern.compile()?);

        let _guard = self.locks.lock(&pattern.id).await;
        self.repository.put(&pattern.id, pattern.clone()).await?;
        self.compiled
            .write()
            .await
            .insert(pattern.id.clone(), compiled);
        info!(
            "Registered pattern {} ({}) with confidence {:.2}",
            pattern.name, pattern.id, pattern.confidence
        );
        Ok(pattern)
    }

    /// Get a pattern by id
    pub async fn get(&self, id: &str) -> Result<Option<ErrorPattern>> {
        self.repository.get(id).await
    }

    /// All patterns in registration order
    pub async fn list(&self) -> Result<Vec<ErrorPattern>> {
        let mut patterns = self.repository.list().await?;
        patterns.sort_by(|a, b| {
            a.first_occurrence
                .cmp(&b.first_occurrence)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(patterns)
    }

    /// Patterns currently eligible for matching
    pub async fn active(&self) -> Result<Vec<ErrorPattern>> {
        let now = Utc::now();
        let config = *self.matcher.config();
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|p| p.is_active_at(now, &config))
            .collect())
    }

    /// Best match for a signal; the chosen pattern's confidence is raised and
    /// its occurrence counted. The returned match carries the updated pattern
    /// and the score it was selected with.
    pub async fn match_signal(&self, signal: &Signal) -> Result<Option<PatternMatch>> {
        let snapshot = self.list().await?;
        let best = {
            let compiled = self.compiled.read().await;
            self.matcher.best_match(signal, &snapshot, &compiled)
        };
        let Some(mut best) = best else {
            debug!("No pattern matched signal {:?}", signal.error_type);
            return Ok(None);
        };

        let _guard = self.locks.lock(&best.pattern.id).await;
        // The pattern may have been removed since the snapshot was taken.
        if let Some(mut current) = self.repository.get(&best.pattern.id).await? {
            current.record_match(self.matcher.config(), Utc::now());
            self.repository.put(&current.id, current.clone()).await?;
            debug!(
                "Pattern {} matched, confidence now {:.2}",
                current.name, current.confidence
            );
            best.pattern = current;
        }

        Ok(Some(best))
    }

    /// Ranked matches for a signal without touching confidence
    pub async fn match_all(&self, signal: &Signal) -> Result<Vec<PatternMatch>> {
        let snapshot = self.list().await?;
        let compiled = self.compiled.read().await;
        Ok(self.matcher.ranked_matches(signal, &snapshot, &compiled))
    }

    /// Caller found the match wrong: lower the pattern's confidence
    pub async fn report_failed_match(&self, id: &str) -> Result<Option<ErrorPattern>> {
        self.update(id, |pattern, config| pattern.record_failed_match(config))
            .await
    }

    /// Enable or disable a pattern
    pub async fn set_active(&self, id: &str, active: bool) -> Result<Option<ErrorPattern>> {
        self.update(id, |pattern, _| pattern.active = active).await
    }

    async fn update<F>(&self, id: &str, apply: F) -> Result<Option<ErrorPattern>>
    where
        F: FnOnce(&mut ErrorPattern, &PatternConfig),
    {
        let _guard = self.locks.lock(id).await;
        let Some(mut pattern) = self.repository.get(id).await? else {
            return Ok(None);
        };
        apply(&mut pattern, self.matcher.config());
        self.repository.put(id, pattern.clone()).await?;
        Ok(Some(pattern))
    }

    /// Remove a pattern
    pub async fn remove(&self, id: &str) -> Result<Option<ErrorPattern>> {
        let removed = {
            let _guard = self.locks.lock(id).await;
            self.compiled.write().await.remove(id);
            self.repository.remove(id).await?
        };
        self.locks.forget(id).await;
        if removed.is_some() {
            info!("Removed pattern {}", id);
        }
        Ok(removed)
    }

    /// Other patterns at least `min_similarity` alike, most similar first.
    ///
    /// `None` if the pattern does not exist.
    pub async fn similar_patterns(
        &self,
        id: &str,
        min_similarity: f64,
    ) -> Result<Option<Vec<(ErrorPattern, f64)>>> {
        let Some(target) = self.repository.get(id).await? else {
            return Ok(None);
        };

        let mut similar: Vec<(ErrorPattern, f64)> = self
            .list()
            .await?
            .into_iter()
            .filter(|p| p.id != target.id)
            .map(|p| {
                let similarity = calculate_pattern_similarity(&target, &p);
                (p, similarity)
            })
            .filter(|(_, similarity)| *similarity >= min_similarity)
            .collect();
        similar.sort_by(|a, b| b.1.total_cmp(&a.1));
        Ok(Some(similar))
    }
}

impl Default for PatternLibrary {
    fn default() -> Self {
        Self::new(PatternConfig::default())
    }
}

/// Common failure signatures available before anything is learned
pub fn builtin_patterns(initial_confidence: f64) -> Vec<ErrorPattern> {
    vec![
        ErrorPattern::new(
            "Null Dereference",
            "runtime",
            PatternFields {
                error_type: Some(r"(?i)(NullPointerException|NullReferenceException|TypeError)".to_string()),
                message: Some(r"(?i)(null|undefined|nil)".to_string()),
                ..PatternFields::default()
            },
            initial_confidence,
        ),
        ErrorPattern::new(
            "Connection Refused",
            "network",
            PatternFields {
                error_type: Some(r"(?i)(ConnectException|ConnectionRefused|ECONNREFUSED)".to_string()),
                message: Some(r"(?i)connection refused".to_string()),
                ..PatternFields::default()
            },
            initial_confidence,
        ),
        ErrorPattern::new(
            "Operation Timeout",
            "network",
            PatternFields {
                error_type: Some(r"(?i)(Timeout|TimedOut|ETIMEDOUT)".to_string()),
                message: Some(r"(?i)timed? ?out".to_string()),
                ..PatternFields::default()
            },
            initial_confidence,
        ),
        ErrorPattern::new(
            "Out Of Memory",
            "resource",
            PatternFields {
                error_type: Some(r"(?i)(OutOfMemoryError|MemoryError|OOM)".to_string()),
                message: Some(r"(?i)(heap space|out of memory|cannot allocate)".to_string()),
                ..PatternFields::default()
            },
            initial_confidence,
        ),
    ]
}
