//! Scan orchestrator.
//!
//! One cycle walks `Idle -> FetchingUniverse -> Evaluating -> Ranking ->
//! Committed`. Symbols are evaluated by a bounded pool of concurrent workers
//! sharing one rate limiter. Each worker fetches in order of cost and stops at
//! the first failing criterion:
//!
//! 1. quote, then price and gain
//! 2. daily candles, then volume spike
//! 3. profile, then float
//! 4. news, then catalyst
//! 5. remaining timeframes, then the signal grid
//!
//! A failure for one symbol only drops that symbol. When the cycle deadline
//! expires, in-flight symbols are abandoned and whatever completed is ranked.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures_util::stream::{self, StreamExt};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{CallKind, ProviderError, ScanError};
use crate::services::criteria::{CriteriaEvaluator, CriteriaFailure, RuleSet};
use crate::services::momentum::SignalClassifier;
use crate::services::notifier::ScanObserver;
use crate::services::rate_limiter::{retry_with_backoff, RateLimiter, RetryPolicy};
use crate::services::result_store::ResultSink;
use crate::sources::{MarketDataProvider, UniverseSource};
use crate::types::{
    aggregate, average_volume, Candle, Catalyst, InstrumentSnapshot, ScanPhase, ScanReport,
    ScanResult, SnapshotParts, Timeframe,
};

/// Tunables for a scan cycle.
#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub rules: RuleSet,
    pub timeframes: Vec<Timeframe>,
    /// Worker pool size.
    pub concurrency: usize,
    pub requests_per_minute: u32,
    pub retry: RetryPolicy,
    /// Deadline for the evaluation phase of one cycle.
    pub scan_timeout: Duration,
    pub top_n: usize,
    /// Rows older than this are pruned.
    pub retention: ChronoDuration,
    pub model_b_margin: f64,
    /// Daily bars averaged for the volume baseline.
    pub volume_lookback_days: usize,
    /// Share of outstanding shares assumed tradable.
    pub float_ratio: f64,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            rules: RuleSet::default(),
            timeframes: Timeframe::DEFAULT_GRID.to_vec(),
            concurrency: 4,
            requests_per_minute: 60,
            retry: RetryPolicy::default(),
            scan_timeout: Duration::from_secs(240),
            top_n: 10,
            retention: ChronoDuration::hours(24),
            model_b_margin: 5.0,
            volume_lookback_days: 50,
            float_ratio: 0.8,
        }
    }
}

impl ScanSettings {
    pub fn validate(&self) -> Result<(), ScanError> {
        let fail = |msg: &str| Err(ScanError::Configuration(msg.to_string()));
        let rules = &self.rules;

        if !(rules.min_price.is_finite() && rules.max_price.is_finite()) {
            return fail("price band must be finite");
        }
        if rules.min_price > rules.max_price {
            return fail("MIN_PRICE is greater than MAX_PRICE");
        }
        if !(rules.spike_multiplier > 0.0) {
            return fail("VOLUME_SPIKE_MULTIPLIER must be positive");
        }
        if rules.catalyst_lookback_hours <= 0 {
            return fail("CATALYST_LOOKBACK_HOURS must be positive");
        }
        if self.concurrency == 0 {
            return fail("SCAN_CONCURRENCY must be at least 1");
        }
        if self.top_n == 0 {
            return fail("TOP_N must be at least 1");
        }
        if self.timeframes.is_empty() {
            return fail("TIMEFRAMES is empty");
        }
        if self.requests_per_minute == 0 {
            return fail("REQUESTS_PER_MINUTE must be positive");
        }
        if self.scan_timeout.is_zero() {
            return fail("SCAN_TIMEOUT_SECS must be positive");
        }
        if self.volume_lookback_days == 0 {
            return fail("VOLUME_LOOKBACK_DAYS must be at least 1");
        }
        if !(self.float_ratio > 0.0 && self.float_ratio <= 1.0) {
            return fail("FLOAT_RATIO must be in (0, 1]");
        }
        Ok(())
    }
}

/// What happened to one symbol.
#[derive(Debug)]
enum SymbolOutcome {
    Passed(InstrumentSnapshot),
    Rejected(CriteriaFailure),
    Failed(ScanError),
}

/// Drives scan cycles end to end.
pub struct Scanner {
    settings: ScanSettings,
    provider: Arc<dyn MarketDataProvider>,
    universe: Arc<dyn UniverseSource>,
    sink: Arc<dyn ResultSink>,
    evaluator: CriteriaEvaluator,
    classifier: SignalClassifier,
    limiter: RateLimiter,
    observers: Vec<Arc<dyn ScanObserver>>,
    phase: RwLock<ScanPhase>,
    last_report: RwLock<Option<ScanReport>>,
    /// Held for the whole cycle so overlapping triggers run one after another.
    cycle: Mutex<()>,
}

impl Scanner {
    pub fn new(
        settings: ScanSettings,
        provider: Arc<dyn MarketDataProvider>,
        universe: Arc<dyn UniverseSource>,
        sink: Arc<dyn ResultSink>,
    ) -> Result<Self, ScanError> {
        settings.validate()?;

        let mut timeframes = settings.timeframes.clone();
        timeframes.sort();
        timeframes.dedup();

        Ok(Self {
            evaluator: CriteriaEvaluator::new(settings.rules.clone()),
            classifier: SignalClassifier::with_defaults(settings.model_b_margin),
            limiter: RateLimiter::new(provider.name().to_string(), settings.requests_per_minute),
            settings: ScanSettings {
                timeframes,
                ..settings
            },
            provider,
            universe,
            sink,
            observers: Vec::new(),
            phase: RwLock::new(ScanPhase::Idle),
            last_report: RwLock::new(None),
            cycle: Mutex::new(()),
        })
    }

    /// Register an observer notified after each commit.
    pub fn with_observer(mut self, observer: Arc<dyn ScanObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    pub fn sink(&self) -> &Arc<dyn ResultSink> {
        &self.sink
    }

    pub async fn phase(&self) -> ScanPhase {
        self.phase.read().await.clone()
    }

    pub async fn last_report(&self) -> Option<ScanReport> {
        self.last_report.read().await.clone()
    }

    async fn set_phase(&self, scan_id: Uuid, phase: ScanPhase) {
        info!(%scan_id, phase = phase.name(), "Scan phase");
        *self.phase.write().await = phase;
    }

    async fn fail(&self, scan_id: Uuid, err: ScanError) -> ScanError {
        self.set_phase(
            scan_id,
            ScanPhase::Failed {
                reason: err.to_string(),
            },
        )
        .await;
        err
    }

    /// Run one full cycle and commit its results.
    pub async fn run(&self) -> Result<ScanReport, ScanError> {
        let _cycle = self.cycle.lock().await;

        let scan_id = Uuid::new_v4();
        let started_at = Utc::now();

        self.set_phase(scan_id, ScanPhase::FetchingUniverse).await;
        let symbols = match self.fetch_universe().await {
            Ok(symbols) => symbols,
            Err(e) => return Err(self.fail(scan_id, e).await),
        };

        self.set_phase(
            scan_id,
            ScanPhase::Evaluating {
                queued: symbols.len(),
            },
        )
        .await;
        let (outcomes, timed_out) = self.evaluate_all(&symbols, started_at).await;

        let mut passed = Vec::new();
        let mut rejected = 0;
        let mut failed = 0;
        for (symbol, outcome) in outcomes.iter() {
            match outcome {
                SymbolOutcome::Passed(snapshot) => passed.push(snapshot.clone()),
                SymbolOutcome::Rejected(reason) => {
                    debug!(%scan_id, symbol = %symbol, %reason, "Rejected");
                    rejected += 1;
                }
                SymbolOutcome::Failed(e) => {
                    warn!(%scan_id, symbol = %symbol, error = %e, "Skipped symbol");
                    failed += 1;
                }
            }
        }
        let passed_count = passed.len();
        let incomplete = symbols.len() - outcomes.len();
        if timed_out {
            warn!(%scan_id, incomplete, "Scan deadline expired, ranking partial results");
        }

        self.set_phase(
            scan_id,
            ScanPhase::Ranking {
                candidates: passed_count,
            },
        )
        .await;
        let result = ScanResult::rank(passed, self.settings.top_n);

        let instruments_updated = match self.sink.upsert(&result.instruments).await {
            Ok(n) => n,
            Err(e) => return Err(self.fail(scan_id, e.into()).await),
        };

        let report = ScanReport {
            scan_id,
            started_at,
            completed_at: Utc::now(),
            universe_size: symbols.len(),
            passed: passed_count,
            rejected,
            failed,
            incomplete,
            timed_out,
            result,
            instruments_updated,
        };

        for observer in &self.observers {
            observer.on_commit(&report);
        }

        self.set_phase(scan_id, ScanPhase::Committed { instruments_updated })
            .await;
        info!(
            %scan_id,
            universe = report.universe_size,
            passed = report.passed,
            rejected = report.rejected,
            failed = report.failed,
            incomplete = report.incomplete,
            updated = instruments_updated,
            "Scan cycle complete"
        );

        *self.last_report.write().await = Some(report.clone());
        Ok(report)
    }

    /// Remove results older than the retention window.
    pub async fn prune(&self) -> Result<usize, ScanError> {
        let cutoff = Utc::now() - self.settings.retention;
        Ok(self.sink.prune(cutoff).await?)
    }

    async fn fetch_universe(&self) -> Result<Vec<String>, ScanError> {
        let symbols = self
            .call("*", CallKind::Universe, || self.universe.symbols())
            .await?;
        info!(symbols = symbols.len(), "Fetched universe");
        Ok(symbols)
    }

    /// Evaluate every symbol under the worker limit and the cycle deadline.
    ///
    /// Returns the outcomes that completed, plus whether the deadline expired.
    async fn evaluate_all(
        &self,
        symbols: &[String],
        now: DateTime<Utc>,
    ) -> (Vec<(String, SymbolOutcome)>, bool) {
        let (tx, mut rx) = mpsc::unbounded_channel();

        let work = stream::iter(symbols.iter().cloned()).for_each_concurrent(
            self.settings.concurrency,
            |symbol| {
                let tx = tx.clone();
                async move {
                    let outcome = self.evaluate_symbol(&symbol, now).await;
                    // Receiver outlives the workers.
                    let _ = tx.send((symbol, outcome));
                }
            },
        );

        let timed_out = tokio::time::timeout(self.settings.scan_timeout, work)
            .await
            .is_err();
        drop(tx);

        let mut outcomes = Vec::with_capacity(symbols.len());
        while let Ok(outcome) = rx.try_recv() {
            outcomes.push(outcome);
        }
        (outcomes, timed_out)
    }

    async fn evaluate_symbol(&self, symbol: &str, now: DateTime<Utc>) -> SymbolOutcome {
        match self.try_evaluate_symbol(symbol, now).await {
            Ok(Ok(snapshot)) => SymbolOutcome::Passed(snapshot),
            Ok(Err(reason)) => SymbolOutcome::Rejected(reason),
            Err(e) => SymbolOutcome::Failed(e),
        }
    }

    /// Outer error: the symbol could not be evaluated. Inner error: it failed a criterion.
    async fn try_evaluate_symbol(
        &self,
        symbol: &str,
        now: DateTime<Utc>,
    ) -> Result<Result<InstrumentSnapshot, CriteriaFailure>, ScanError> {
        let evaluator = &self.evaluator;

        let quote = self
            .call(symbol, CallKind::Quote, || self.provider.quote(symbol))
            .await?;
        if let Err(reason) = evaluator.check_quote(quote.current_price, quote.change_percent()) {
            return Ok(Err(reason));
        }

        let mut series: HashMap<Timeframe, Vec<Candle>> = HashMap::new();
        let daily = self.fetch_series(symbol, Timeframe::OneDay, now).await?;
        let average = volume_baseline(&daily, now, self.settings.volume_lookback_days);
        let volume = quote
            .volume
            .or_else(|| session_volume(&daily, now))
            .unwrap_or(0.0);
        if let Err(reason) = evaluator.check_volume_spike(volume, average) {
            return Ok(Err(reason));
        }
        series.insert(Timeframe::OneDay, daily);

        let profile = self
            .call(symbol, CallKind::Profile, || self.provider.profile(symbol))
            .await?;
        let estimated_float = profile.estimated_float(quote.current_price, self.settings.float_ratio);
        if let Err(reason) = evaluator.check_float(estimated_float) {
            return Ok(Err(reason));
        }

        let cutoff = evaluator.rules().catalyst_cutoff(now);
        let (from, to) = (cutoff.date_naive(), now.date_naive());
        let news = self
            .call(symbol, CallKind::News, || self.provider.news(symbol, from, to))
            .await?;
        let catalyst = Catalyst::latest(&news);
        if let Err(reason) = evaluator.check_catalyst(catalyst.as_ref(), now) {
            return Ok(Err(reason));
        }

        for timeframe in &self.settings.timeframes {
            if !series.contains_key(timeframe) {
                let candles = self.fetch_series(symbol, *timeframe, now).await?;
                series.insert(*timeframe, candles);
            }
        }
        let signal_grid = self.classifier.classify_grid(&self.settings.timeframes, &series);

        Ok(Ok(InstrumentSnapshot::new(SnapshotParts {
            symbol: symbol.to_string(),
            price: quote.current_price,
            previous_close: quote.previous_close,
            volume,
            average_volume: average,
            estimated_float,
            catalyst,
            signal_grid,
            scan_timestamp: now,
        })))
    }

    /// Candles for one timeframe over its history window.
    async fn fetch_series(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        now: DateTime<Utc>,
    ) -> Result<Vec<Candle>, ScanError> {
        let (resolution, factor) = timeframe.source_resolution();
        let to = now.timestamp();
        let from = to - timeframe.lookback_seconds();

        let candles = self
            .call(symbol, CallKind::Candles, || {
                self.provider.candles(symbol, resolution, from, to)
            })
            .await?;

        if factor > 1 {
            Ok(aggregate(&candles, timeframe.seconds()))
        } else {
            Ok(candles)
        }
    }

    /// One provider call: wait for a token, retry on rate limiting.
    async fn call<T, F, Fut>(&self, symbol: &str, kind: CallKind, mut op: F) -> Result<T, ScanError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let limiter = &self.limiter;
        let label = kind.to_string();

        retry_with_backoff(&self.settings.retry, &label, || {
            let request = op();
            async move {
                limiter.acquire().await;
                request.await
            }
        })
        .await
        .map_err(|(err, attempts)| ScanError::from_provider(symbol, kind, err, attempts))
    }
}

fn day_start(now: DateTime<Utc>) -> i64 {
    now.timestamp().div_euclid(86_400) * 86_400
}

/// Volume of the current UTC day's bar, if the provider has one yet.
///
/// A finished earlier session is never taken as today's volume.
fn session_volume(daily: &[Candle], now: DateTime<Utc>) -> Option<f64> {
    daily
        .last()
        .filter(|c| c.time >= day_start(now))
        .map(|c| c.volume)
}

/// Mean volume of the last `days` daily bars before the current UTC day.
fn volume_baseline(daily: &[Candle], now: DateTime<Utc>, days: usize) -> f64 {
    let today = day_start(now);
    let completed: Vec<Candle> = daily.iter().filter(|c| c.time < today).copied().collect();
    let start = completed.len().saturating_sub(days);
    average_volume(&completed[start..])
}
