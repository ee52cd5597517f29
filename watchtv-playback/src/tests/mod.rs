//! Scenario testing module
//!
//! Drives the orchestrator against scripted fakes:
//! - Classification to engine attachment
//! - Retry budgets and the transcode fallback
//! - Stale result handling across rapid source changes
//! - Live-edge seeking and the loading indicator

pub mod scenarios;
