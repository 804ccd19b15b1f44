//! Reading metrics recorded through a debugging recorder.

use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};

/// Creates a debugging recorder and snapshotter for metrics testing.
#[must_use]
pub fn debugging_recorder_setup() -> (Snapshotter, DebuggingRecorder) {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    (snapshotter, recorder)
}

/// Recorded metrics, read once from a [`Snapshotter`].
pub struct Recorded(Vec<(String, Vec<(String, String)>, DebugValue)>);

impl Recorded {
    /// Take a snapshot of everything recorded so far.
    #[must_use]
    pub fn take(snapshotter: &Snapshotter) -> Self {
        Self(
            snapshotter
                .snapshot()
                .into_vec()
                .into_iter()
                .map(|(key, _, _, value)| {
                    let key = key.key();
                    let labels = key
                        .labels()
                        .map(|l| (l.key().to_owned(), l.value().to_owned()))
                        .collect();
                    (key.name().to_owned(), labels, value)
                })
                .collect(),
        )
    }

    /// Value of counter `name` carrying `label`, or zero if never recorded.
    #[must_use]
    pub fn counter(&self, name: &str, label: (&str, &str)) -> u64 {
        self.0
            .iter()
            .filter(|(n, labels, _)| {
                n == name && labels.iter().any(|(k, v)| k == label.0 && v == label.1)
            })
            .map(|(_, _, value)| match value {
                DebugValue::Counter(c) => *c,
                _ => 0,
            })
            .sum()
    }

    /// Value of gauge `name`, if recorded.
    #[must_use]
    pub fn gauge(&self, name: &str) -> Option<f64> {
        self.0.iter().find_map(|(n, _, value)| match value {
            DebugValue::Gauge(g) if n == name => Some(g.0),
            _ => None,
        })
    }
}
