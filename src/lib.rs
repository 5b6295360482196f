pub mod analytics;
pub mod api;
pub mod config;
pub mod io;
pub mod logging;
pub mod report;
pub mod session;

// Re-export the main error types for convenience
pub use analytics::AggregatorError;
pub use api::ConnectError;
pub use config::ConfigError;
pub use session::SessionError;

// Re-export the core session types
pub use analytics::{
    Classification, Classifier, CombinedSummary, Completion, LexiconScorer, PolarityScorer,
    Sentiment, Snapshot, StreamAggregator,
};
pub use api::{Feed, FeedSignal, FeedSink, TopicFilter, Tweet, TweetId};
pub use session::{
    CancelHandle, CancelSignal, CombinedReport, ExecutionMode, MultiSessionOrchestrator,
    OrchestratorConfig, TargetOutcome, TargetReport, TargetSelection, TargetStatus, TopicTarget,
    WindowConfig, WindowController,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_structure() {
        // Test that the main modules are accessible
        assert!(std::any::type_name::<StreamAggregator>().contains("StreamAggregator"));
        assert!(std::any::type_name::<WindowController>().contains("WindowController"));
        assert!(std::any::type_name::<MultiSessionOrchestrator>().contains("Orchestrator"));
    }

    #[test]
    fn test_error_types_re_exported() {
        // Test that error types are available from the crate root
        let _connect = ConnectError::auth("bad token");
        let _aggregator = AggregatorError::NotOpen;
        let session: SessionError = AggregatorError::NotOpen.into();
        assert!(session.to_string().contains("Session not opened"));
    }
}
