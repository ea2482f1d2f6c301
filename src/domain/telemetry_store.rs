//! Live telemetry store.
//!
//! [`TelemetryStore`] owns the single live [`TelemetrySnapshot`] behind a
//! `watch` channel. Writers merge inbound messages with
//! [`TelemetryStore::apply_update`]; readers either take a snapshot or
//! register a [`Selection`] that wakes only when the slice they care about
//! changes.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use super::connection_state::ConnectionState;
use super::telemetry::{TelemetryFields, TelemetrySnapshot};

#[derive(Debug, Clone, Default)]
struct StoreState {
    revision: u64,
    snapshot: Option<TelemetrySnapshot>,
    updated_at: Option<DateTime<Utc>>,
}

/// Shared store for the live device snapshot.
///
/// Cheap to clone; all clones observe the same state. The connection state
/// is read-only here: the device connection manager holds the sender.
#[derive(Debug, Clone)]
pub struct TelemetryStore {
    state: Arc<watch::Sender<StoreState>>,
    connection: watch::Receiver<ConnectionState>,
}

impl TelemetryStore {
    /// Creates an empty store that reads connection state from `connection`.
    #[must_use]
    pub fn new(connection: watch::Receiver<ConnectionState>) -> Self {
        let (state, _) = watch::channel(StoreState::default());
        Self {
            state: Arc::new(state),
            connection,
        }
    }

    /// Merges `fields` into the snapshot and returns the new revision.
    ///
    /// The first call creates the snapshot. Every call bumps the revision,
    /// even if no value changed.
    pub fn apply_update(&self, fields: TelemetryFields) -> u64 {
        let mut revision = 0;
        self.state.send_modify(|state| {
            match state.snapshot.as_mut() {
                Some(snapshot) => snapshot.apply(fields),
                None => state.snapshot = Some(TelemetrySnapshot::from(fields)),
            }
            state.revision = state.revision.saturating_add(1);
            state.updated_at = Some(Utc::now());
            revision = state.revision;
        });
        revision
    }

    /// Returns a copy of the current snapshot, or `None` before the first
    /// device message.
    #[must_use]
    pub fn snapshot(&self) -> Option<TelemetrySnapshot> {
        self.state.borrow().snapshot.clone()
    }

    /// Current revision. Zero until the first update.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.state.borrow().revision
    }

    /// Time of the last applied update.
    #[must_use]
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.state.borrow().updated_at
    }

    /// Current device link state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        *self.connection.borrow()
    }

    /// Whether the device link is currently up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection_state().is_connected()
    }

    /// Returns a receiver that observes connection state transitions.
    #[must_use]
    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.connection.clone()
    }

    /// Registers a listener for the slice of the snapshot picked by
    /// `selector`. Dropping the returned [`Selection`] unsubscribes.
    pub fn subscribe<T, F>(&self, selector: F) -> Selection<T, F>
    where
        F: Fn(Option<&TelemetrySnapshot>) -> T,
        T: PartialEq + Clone,
    {
        let mut rx = self.state.subscribe();
        let (revision, current) = {
            let state = rx.borrow_and_update();
            (state.revision, selector(state.snapshot.as_ref()))
        };
        Selection {
            rx,
            selector,
            current,
            seen_revision: revision,
        }
    }

    /// Number of live [`Selection`]s.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.state.receiver_count()
    }
}

/// A narrow-interest view on a [`TelemetryStore`].
pub struct Selection<T, F> {
    rx: watch::Receiver<StoreState>,
    selector: F,
    current: T,
    seen_revision: u64,
}

impl<T, F> Selection<T, F>
where
    F: Fn(Option<&TelemetrySnapshot>) -> T,
    T: PartialEq + Clone,
{
    /// The last value yielded (or the value at subscription time).
    #[must_use]
    pub fn get(&self) -> &T {
        &self.current
    }

    /// Waits until the selected value differs from the last one yielded.
    ///
    /// Updates that leave the slice unchanged are skipped. Returns `None`
    /// once the store is gone.
    pub async fn changed(&mut self) -> Option<T> {
        loop {
            if self.rx.changed().await.is_err() {
                return None;
            }
            let (revision, next) = {
                let state = self.rx.borrow_and_update();
                (state.revision, (self.selector)(state.snapshot.as_ref()))
            };
            if revision <= self.seen_revision {
                continue;
            }
            self.seen_revision = revision;
            if next != self.current {
                self.current = next.clone();
                return Some(next);
            }
        }
    }
}

impl<T: fmt::Debug, F> fmt::Debug for Selection<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selection")
            .field("current", &self.current)
            .field("seen_revision", &self.seen_revision)
            .finish_non_exhaustive()
    }
}
