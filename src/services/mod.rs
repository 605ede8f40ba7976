pub mod criteria;
pub mod indicators;
pub mod momentum;
pub mod notifier;
pub mod rate_limiter;
pub mod result_store;
pub mod scanner;

pub use criteria::{CriteriaEvaluator, CriteriaFailure, Criterion, MissingDataPolicy, RuleSet};
pub use momentum::{MomentumModel, SignalClassifier};
pub use notifier::{BroadcastNotifier, ScanObserver};
pub use rate_limiter::{retry_with_backoff, RateLimiter, RetryPolicy};
pub use result_store::{MemoryResultStore, ResultSink, SqliteResultStore};
pub use scanner::{ScanSettings, Scanner};
