//! Progress reporting interface.
//!
//! Long-running components receive an observer instead of writing to a
//! process-wide logger, so the pipeline stays usable as a library. Binaries
//! that want process logging can pass [`TracingObserver`].

/// Receives progress events from the pipeline.
pub trait ProgressObserver: Sync {
    /// A pipeline stage started.
    fn stage(&self, _name: &str) {}

    /// Periodic fitting report: boosting round and metric value per eval set.
    fn round(&self, _iteration: usize, _evals: &[(&str, f64)]) {}

    /// One backtest window finished with the given score.
    fn backtest_window(&self, _window: usize, _rmse: f64) {}
}

/// Observer that discards all events. The default for library use.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl ProgressObserver for NullObserver {}

/// Observer forwarding events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl ProgressObserver for TracingObserver {
    fn stage(&self, name: &str) {
        tracing::info!(stage = name, "starting");
    }

    fn round(&self, iteration: usize, evals: &[(&str, f64)]) {
        for (set, value) in evals {
            tracing::info!(iteration, set, value, "fit progress");
        }
    }

    fn backtest_window(&self, window: usize, rmse: f64) {
        tracing::info!(window, rmse, "backtest window scored");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        events: Mutex<Vec<String>>,
    }

    impl ProgressObserver for Recording {
        fn stage(&self, name: &str) {
            self.events.lock().unwrap().push(format!("stage:{name}"));
        }

        fn round(&self, iteration: usize, _evals: &[(&str, f64)]) {
            self.events.lock().unwrap().push(format!("round:{iteration}"));
        }
    }

    #[test]
    fn observers_receive_events() {
        let observer = Recording::default();
        observer.stage("train");
        observer.round(20, &[("train", 1.0)]);

        let events = observer.events.lock().unwrap();
        assert_eq!(*events, vec!["stage:train", "round:20"]);
    }

    #[test]
    fn null_observer_ignores_everything() {
        let observer = NullObserver;
        observer.stage("train");
        observer.round(1, &[]);
        observer.backtest_window(0, 1.0);
    }
}
