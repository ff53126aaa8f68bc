//! Transcoding engine contract and its lazily loaded handle.

use std::sync::Arc;
use std::time::Duration;

use gifnew_common::config::EngineConfig;
use gifnew_common::error::{GifnewError, GifnewResult};
use gifnew_common::retry::{AttemptCounter, RetryDecision, RetryPolicy};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// One entry of the engine's virtual file store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreEntry {
    pub name: String,
    pub is_dir: bool,
}

/// URLs of the engine core assets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreAssets {
    pub core_url: String,
    pub wasm_url: String,
}

impl CoreAssets {
    pub fn from_base_url(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            core_url: format!("{base}/ffmpeg-core.js"),
            wasm_url: format!("{base}/ffmpeg-core.wasm"),
        }
    }
}

/// An external transcoder with a flat file store.
///
/// `exec` runs one operation to completion; callers never overlap calls.
#[async_trait::async_trait]
pub trait TranscodeEngine: Send + Sync {
    async fn load(&self, assets: &CoreAssets) -> GifnewResult<()>;

    async fn write_file(&self, name: &str, data: &[u8]) -> GifnewResult<()>;

    async fn read_file(&self, name: &str) -> GifnewResult<Vec<u8>>;

    async fn list_dir(&self, path: &str) -> GifnewResult<Vec<StoreEntry>>;

    async fn delete_file(&self, name: &str) -> GifnewResult<()>;

    async fn exec(&self, args: &[String]) -> GifnewResult<()>;
}

/// Whether `name` is present at the root of the engine store.
pub async fn store_contains(engine: &dyn TranscodeEngine, name: &str) -> GifnewResult<bool> {
    let entries = engine.list_dir("/").await?;
    Ok(entries.iter().any(|e| !e.is_dir && e.name == name))
}

#[derive(Debug)]
struct LoadState {
    loaded: bool,
    counter: AttemptCounter,
    last_error: Option<String>,
}

/// Owns the engine instance: loads it on first use and reuses it afterwards.
///
/// Each load attempt is time-boxed. Once the attempt budget is spent every
/// call fails fast with `EngineLoadFailure` until [`EngineHandle::reset`] or
/// [`EngineHandle::retry`] is called.
pub struct EngineHandle {
    engine: Arc<dyn TranscodeEngine>,
    assets: CoreAssets,
    load_timeout: Duration,
    state: Mutex<LoadState>,
}

impl EngineHandle {
    pub fn new(
        engine: Arc<dyn TranscodeEngine>,
        assets: CoreAssets,
        load_timeout: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            engine,
            assets,
            load_timeout,
            state: Mutex::new(LoadState {
                loaded: false,
                counter: AttemptCounter::new(retry),
                last_error: None,
            }),
        }
    }

    pub fn from_config(engine: Arc<dyn TranscodeEngine>, config: &EngineConfig) -> Self {
        Self::new(
            engine,
            CoreAssets::from_base_url(&config.core_base_url),
            Duration::from_secs(config.load_timeout_secs),
            config.retry,
        )
    }

    /// The loaded engine, loading it first if needed.
    pub async fn ensure_loaded(&self) -> GifnewResult<Arc<dyn TranscodeEngine>> {
        let mut state = self.state.lock().await;
        if state.loaded {
            return Ok(Arc::clone(&self.engine));
        }
        if !state.counter.can_attempt() {
            return Err(GifnewError::EngineLoadFailure {
                attempts: state.counter.attempts(),
                message: state
                    .last_error
                    .clone()
                    .unwrap_or_else(|| "retry budget exhausted".to_string()),
            });
        }

        loop {
            let attempt = state.counter.begin_attempt();
            tracing::info!(attempt, core = %self.assets.core_url, "Loading transcoding engine");

            let outcome = match tokio::time::timeout(self.load_timeout, self.engine.load(&self.assets))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(GifnewError::EngineLoadTimeout {
                    timeout_secs: self.load_timeout.as_secs(),
                }),
            };

            match outcome {
                Ok(()) => {
                    state.loaded = true;
                    state.last_error = None;
                    tracing::info!(attempt, "Transcoding engine ready");
                    return Ok(Arc::clone(&self.engine));
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Transcoding engine load failed");
                    let message = e.to_string();
                    state.last_error = Some(message.clone());
                    match state.counter.record_failure() {
                        RetryDecision::RetryAfter(delay) => tokio::time::sleep(delay).await,
                        RetryDecision::Exhausted => {
                            tracing::error!(attempts = attempt, "Transcoding engine unavailable");
                            return Err(GifnewError::EngineLoadFailure {
                                attempts: attempt,
                                message,
                            });
                        }
                    }
                }
            }
        }
    }

    /// Clear the attempt counter so the next use loads again.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.counter.reset();
        state.last_error = None;
    }

    /// Manual retry: reset the counter and load.
    pub async fn retry(&self) -> GifnewResult<Arc<dyn TranscodeEngine>> {
        self.reset().await;
        self.ensure_loaded().await
    }

    pub async fn is_loaded(&self) -> bool {
        self.state.lock().await.loaded
    }

    /// Load attempts since the last reset.
    pub async fn attempts(&self) -> u32 {
        self.state.lock().await.counter.attempts()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `failures` loads, hanging forever if `hang` is set.
    struct FlakyEngine {
        failures: u32,
        hang: bool,
        loads: AtomicU32,
    }

    #[async_trait::async_trait]
    impl TranscodeEngine for FlakyEngine {
        async fn load(&self, _assets: &CoreAssets) -> GifnewResult<()> {
            let n = self.loads.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                if self.hang {
                    std::future::pending::<()>().await;
                }
                return Err(GifnewError::engine("core fetch failed"));
            }
            Ok(())
        }

        async fn write_file(&self, _name: &str, _data: &[u8]) -> GifnewResult<()> {
            Ok(())
        }

        async fn read_file(&self, name: &str) -> GifnewResult<Vec<u8>> {
            Err(GifnewError::FileNotFound { path: name.into() })
        }

        async fn list_dir(&self, _path: &str) -> GifnewResult<Vec<StoreEntry>> {
            Ok(Vec::new())
        }

        async fn delete_file(&self, _name: &str) -> GifnewResult<()> {
            Ok(())
        }

        async fn exec(&self, _args: &[String]) -> GifnewResult<()> {
            Ok(())
        }
    }

    fn handle(failures: u32, hang: bool) -> (Arc<FlakyEngine>, EngineHandle) {
        let engine = Arc::new(FlakyEngine {
            failures,
            hang,
            loads: AtomicU32::new(0),
        });
        let handle = EngineHandle::from_config(engine.clone(), &EngineConfig::default());
        (engine, handle)
    }

    #[tokio::test(start_paused = true)]
    async fn test_loads_once_and_reuses() {
        let (engine, handle) = handle(0, false);
        handle.ensure_loaded().await.unwrap();
        handle.ensure_loaded().await.unwrap();
        assert_eq!(engine.loads.load(Ordering::SeqCst), 1);
        assert!(handle.is_loaded().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_within_budget() {
        let (_engine, handle) = handle(2, false);
        let started = tokio::time::Instant::now();
        handle.ensure_loaded().await.unwrap();
        assert_eq!(handle.attempts().await, 3);
        assert_eq!(started.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_fails_fast_until_retry() {
        let (engine, handle) = handle(3, false);
        let err = handle.ensure_loaded().await.err().unwrap();
        assert!(matches!(err, GifnewError::EngineLoadFailure { attempts: 3, .. }));

        // No new load attempts while exhausted.
        assert!(handle.ensure_loaded().await.is_err());
        assert_eq!(engine.loads.load(Ordering::SeqCst), 3);

        handle.reset().await;
        assert_eq!(handle.attempts().await, 0);
        handle.retry().await.unwrap();
        assert_eq!(engine.loads.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_load_times_out_per_attempt() {
        let (_engine, handle) = handle(3, true);
        let started = tokio::time::Instant::now();
        let err = handle.ensure_loaded().await.err().unwrap();
        assert!(matches!(err, GifnewError::EngineLoadFailure { .. }));
        assert!(err.to_string().contains("did not load within 10s"));
        // 3 × 10s timeouts plus 2 × 2s delays.
        assert_eq!(started.elapsed(), Duration::from_secs(34));
    }

    #[test]
    fn test_core_asset_urls() {
        let assets = CoreAssets::from_base_url("https://cdn.example/core/");
        assert_eq!(assets.core_url, "https://cdn.example/core/ffmpeg-core.js");
        assert_eq!(assets.wasm_url, "https://cdn.example/core/ffmpeg-core.wasm");
    }
}
