pub mod config;
pub mod metrics;
pub mod patterns;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use metrics::{AtomicCounters, Counter, CounterSnapshot, MetricsSink};
pub use patterns::{PatternError, PatternSet, DEFAULT_PATTERNS};
