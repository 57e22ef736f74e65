use std::cell::RefCell;
use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use parking_lot::ReentrantMutex;

use super::activity::{Activity, ActivityKind};
use super::set::ActivitySet;
use crate::error::{EngineError, Result};
use crate::metrics::Summary;

/// Name of the aggregate set holding every activity in append order.
pub const ALL_ACTIVITIES: &str = "All";

/// Observer of trace mutations.
///
/// Callbacks run synchronously while the trace lock is held, after the
/// mutation is visible. The lock is re-entrant, so a listener may query the
/// trace it is attached to; it must not append to it.
pub trait TraceListener: Send + Sync {
    fn kind_registered(&self, _kind: &ActivityKind) {}

    fn activity_added(&self, _kind: &ActivityKind, _activity: &Activity) {}
}

/// Handle returned by [`Trace::add_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct TraceState {
    kinds: Vec<ActivityKind>,
    by_name: HashMap<Arc<str>, usize>,
    sets: Vec<ActivitySet>,
    all: ActivitySet,
    last_timestamp: f64,
    listeners: Vec<(ListenerId, Arc<dyn TraceListener>)>,
    next_listener: u64,
}

/// Append-only activity timeline of one ingested source (or run).
pub struct Trace {
    name: String,
    state: ReentrantMutex<RefCell<TraceState>>,
}

impl std::fmt::Debug for Trace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trace")
            .field("name", &self.name)
            .field("kinds", &self.kind_count())
            .field("activities", &self.all_len())
            .finish()
    }
}

impl Trace {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: ReentrantMutex::new(RefCell::new(TraceState {
                kinds: Vec::new(),
                by_name: HashMap::new(),
                sets: Vec::new(),
                all: ActivitySet::aggregate(ALL_ACTIVITIES),
                last_timestamp: 0.0,
                listeners: Vec::new(),
                next_listener: 0,
            })),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // ── Listeners ────────────────────────────────────────────────

    pub fn add_listener(&self, listener: Arc<dyn TraceListener>) -> ListenerId {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        let id = ListenerId(state.next_listener);
        state.next_listener += 1;
        state.listeners.push((id, listener));
        id
    }

    /// Detach a listener; false when it was not attached.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        let before = state.listeners.len();
        state.listeners.retain(|(lid, _)| *lid != id);
        state.listeners.len() != before
    }

    // ── Mutation ─────────────────────────────────────────────────

    /// Register `name` under `id`, which must equal the current kind count.
    pub fn register_kind(&self, id: usize, name: &str) -> Result<ActivityKind> {
        let guard = self.state.lock();
        let (kind, listeners) = {
            let mut state = guard.borrow_mut();
            if id != state.kinds.len() {
                tracing::error!(trace = %self.name, id, expected = state.kinds.len(), kind = name, "trace: kind registered out of order");
                return Err(EngineError::InvariantViolation(format!(
                    "{}: kind `{}` registered with id {} but {} kinds exist",
                    self.name,
                    name,
                    id,
                    state.kinds.len()
                )));
            }
            if name.is_empty() {
                return Err(EngineError::InvalidArgument("activity kind name is empty".into()));
            }
            if state.by_name.contains_key(name) {
                return Err(EngineError::InvalidArgument(format!(
                    "{}: kind `{}` already registered",
                    self.name, name
                )));
            }

            let shared: Arc<str> = Arc::from(name);
            let kind = ActivityKind::new(id, Arc::clone(&shared));
            state.kinds.push(kind.clone());
            state.by_name.insert(shared, id);
            state.sets.push(ActivitySet::per_kind(name));
            (kind, listener_snapshot(&state))
        };

        tracing::debug!(trace = %self.name, id, kind = name, "trace: kind registered");
        for listener in &listeners {
            listener.kind_registered(&kind);
        }
        Ok(kind)
    }

    /// Id of `name`, registering it with the next free id if unseen.
    pub fn ensure_kind(&self, name: &str) -> Result<usize> {
        let guard = self.state.lock();
        let next = {
            let state = guard.borrow();
            if let Some(&id) = state.by_name.get(name) {
                return Ok(id);
            }
            state.kinds.len()
        };
        self.register_kind(next, name).map(|k| k.id())
    }

    /// Append an activity of a registered kind. `overhead: None` makes it
    /// stop-the-world.
    pub fn add_activity(
        &self,
        kind_id: usize,
        start: f64,
        duration: f64,
        overhead: Option<f64>,
    ) -> Result<Activity> {
        let guard = self.state.lock();
        let name = {
            let state = guard.borrow();
            match state.kinds.get(kind_id) {
                Some(kind) => kind.shared_name(),
                None => return Err(self.unregistered(kind_id, state.kinds.len())),
            }
        };
        let activity = Activity::new(name, start, duration, overhead)?;
        self.push(kind_id, activity)
    }

    /// Append under `name`, registering the kind on first use.
    pub fn record(
        &self,
        name: &str,
        start: f64,
        duration: f64,
        overhead: Option<f64>,
    ) -> Result<Activity> {
        let _guard = self.state.lock();
        let activity = Activity::new(name, start, duration, overhead)?;
        let kind_id = self.ensure_kind(name)?;
        self.push(kind_id, activity)
    }

    /// Append a copy of an activity taken from another trace.
    pub fn append(&self, activity: &Activity) -> Result<Activity> {
        let _guard = self.state.lock();
        let kind_id = self.ensure_kind(activity.kind())?;
        self.push(kind_id, activity.clone())
    }

    fn push(&self, kind_id: usize, activity: Activity) -> Result<Activity> {
        let guard = self.state.lock();
        let (kind, listeners) = {
            let mut state = guard.borrow_mut();
            let kind = match state.kinds.get(kind_id) {
                Some(kind) if kind.name() == activity.kind() => kind.clone(),
                Some(kind) => {
                    return Err(EngineError::InvalidArgument(format!(
                        "{}: activity of kind `{}` appended to kind `{}`",
                        self.name,
                        activity.kind(),
                        kind.name()
                    )))
                }
                None => return Err(self.unregistered(kind_id, state.kinds.len())),
            };
            state.sets[kind_id].check(&activity)?;

            state.sets[kind_id].push(activity.clone());
            state.all.push(activity.clone());
            if activity.end() > state.last_timestamp {
                state.last_timestamp = activity.end();
            }
            (kind, listener_snapshot(&state))
        };

        for listener in &listeners {
            listener.activity_added(&kind, &activity);
        }
        Ok(activity)
    }

    fn unregistered(&self, kind_id: usize, count: usize) -> EngineError {
        tracing::error!(trace = %self.name, kind_id, count, "trace: activity for unregistered kind");
        EngineError::InvariantViolation(format!(
            "{}: kind id {} is not registered ({} kinds)",
            self.name, kind_id, count
        ))
    }

    // ── Queries ──────────────────────────────────────────────────

    pub fn kind_count(&self) -> usize {
        self.state.lock().borrow().kinds.len()
    }

    pub fn kinds(&self) -> Vec<ActivityKind> {
        self.state.lock().borrow().kinds.clone()
    }

    pub fn kind(&self, id: usize) -> Option<ActivityKind> {
        self.state.lock().borrow().kinds.get(id).cloned()
    }

    pub fn kind_id(&self, name: &str) -> Option<usize> {
        self.state.lock().borrow().by_name.get(name).copied()
    }

    /// Number of activities of kind `id`, `None` if unregistered.
    pub fn len(&self, id: usize) -> Option<usize> {
        self.state.lock().borrow().sets.get(id).map(ActivitySet::len)
    }

    pub fn all_len(&self) -> usize {
        self.state.lock().borrow().all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all_len() == 0
    }

    /// Latest activity end seen so far.
    pub fn last_timestamp(&self) -> f64 {
        self.state.lock().borrow().last_timestamp
    }

    /// Per-kind sizes and the aggregate size, read under one lock.
    pub fn sizes(&self) -> (Vec<usize>, usize) {
        let guard = self.state.lock();
        let state = guard.borrow();
        (state.sets.iter().map(ActivitySet::len).collect(), state.all.len())
    }

    /// Copies of the activities of kind `id` in `range`.
    pub fn activities(&self, id: usize, range: Range<usize>) -> Result<Vec<Activity>> {
        let guard = self.state.lock();
        let state = guard.borrow();
        match state.sets.get(id) {
            Some(set) => Ok(set.slice(range).to_vec()),
            None => Err(EngineError::InvalidArgument(format!(
                "{}: kind id {} is not registered",
                self.name, id
            ))),
        }
    }

    /// Copies of the aggregate set in `range`, in append order.
    pub fn all_activities(&self, range: Range<usize>) -> Vec<Activity> {
        self.state.lock().borrow().all.slice(range).to_vec()
    }

    pub fn summary(&self, id: usize) -> Option<Summary> {
        self.state.lock().borrow().sets.get(id).map(ActivitySet::summary)
    }

    pub fn all_summary(&self) -> Summary {
        self.state.lock().borrow().all.summary()
    }

    /// (kind, duration summary) for every registered kind, in id order.
    pub fn kind_summaries(&self) -> Vec<(ActivityKind, Summary)> {
        let guard = self.state.lock();
        let state = guard.borrow();
        state
            .kinds
            .iter()
            .zip(&state.sets)
            .map(|(kind, set)| (kind.clone(), set.summary()))
            .collect()
    }
}

fn listener_snapshot(state: &TraceState) -> Vec<Arc<dyn TraceListener>> {
    state.listeners.iter().map(|(_, l)| Arc::clone(l)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        kinds: Mutex<Vec<(usize, String)>>,
        added: Mutex<Vec<(String, f64)>>,
    }

    impl TraceListener for Recorder {
        fn kind_registered(&self, kind: &ActivityKind) {
            self.kinds.lock().push((kind.id(), kind.name().to_string()));
        }

        fn activity_added(&self, kind: &ActivityKind, activity: &Activity) {
            self.added.lock().push((kind.name().to_string(), activity.start()));
        }
    }

    // ── Registration ─────────────────────────────────────────────

    #[test]
    fn test_register_kind_requires_next_id() {
        let trace = Trace::new("t");
        trace.register_kind(0, "Young GC").unwrap();
        let err = trace.register_kind(2, "Full GC").unwrap_err();
        assert!(matches!(err, EngineError::InvariantViolation(_)));
        assert_eq!(trace.kind_count(), 1);
    }

    #[test]
    fn test_duplicate_kind_name_rejected() {
        let trace = Trace::new("t");
        trace.register_kind(0, "Young GC").unwrap();
        assert!(trace.register_kind(1, "Young GC").is_err());
    }

    #[test]
    fn test_ensure_kind_assigns_dense_ids() {
        let trace = Trace::new("t");
        assert_eq!(trace.ensure_kind("Young GC").unwrap(), 0);
        assert_eq!(trace.ensure_kind("Full GC").unwrap(), 1);
        assert_eq!(trace.ensure_kind("Young GC").unwrap(), 0);
        assert_eq!(trace.kind_id("Full GC"), Some(1));
    }

    // ── Appending ────────────────────────────────────────────────

    #[test]
    fn test_add_activity_updates_sets_and_last_timestamp() {
        let trace = Trace::new("t");
        let id = trace.ensure_kind("Young GC").unwrap();
        trace.add_activity(id, 1.0, 0.5, None).unwrap();
        trace.add_activity(id, 3.0, 0.25, None).unwrap();

        assert_eq!(trace.len(id), Some(2));
        assert_eq!(trace.all_len(), 2);
        assert_eq!(trace.last_timestamp(), 3.25);
        assert_eq!(trace.summary(id).unwrap().count, 2);
    }

    #[test]
    fn test_add_activity_unregistered_kind_is_invariant_violation() {
        let trace = Trace::new("t");
        let err = trace.add_activity(0, 1.0, 0.1, None).unwrap_err();
        assert!(matches!(err, EngineError::InvariantViolation(_)));
        assert!(trace.is_empty());
    }

    #[test]
    fn test_rejected_activity_leaves_trace_untouched() {
        let trace = Trace::new("t");
        let id = trace.ensure_kind("Young GC").unwrap();
        trace.add_activity(id, 5.0, 1.0, None).unwrap();
        assert!(trace.add_activity(id, 4.0, 0.1, None).is_err());
        assert!(trace.add_activity(id, 6.0, -1.0, None).is_err());
        assert_eq!(trace.all_len(), 1);
        assert_eq!(trace.last_timestamp(), 6.0);
    }

    #[test]
    fn test_rejected_record_registers_no_kind() {
        let trace = Trace::new("t");
        let recorder = Arc::new(Recorder::default());
        trace.add_listener(recorder.clone());

        assert!(trace.record("Full GC", 1.0, -0.5, None).is_err());
        assert!(trace.record("CMS-concurrent-mark", 1.0, 2.0, Some(150.0)).is_err());
        assert_eq!(trace.kind_count(), 0);
        assert_eq!(trace.kind_id("Full GC"), None);
        assert!(recorder.kinds.lock().is_empty());
    }

    #[test]
    fn test_all_set_mixes_kinds_in_append_order() {
        let trace = Trace::new("t");
        trace.record("CMS-concurrent-mark", 10.0, 2.0, Some(80.0)).unwrap();
        trace.record("Young GC", 11.0, 0.1, None).unwrap();
        let all = trace.all_activities(0..10);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].kind(), "CMS-concurrent-mark");
        assert_eq!(all[1].kind(), "Young GC");
    }

    #[test]
    fn test_append_copies_from_other_trace() {
        let source = Trace::new("src");
        source.record("Full GC", 2.0, 0.5, Some(87.5)).unwrap();
        let target = Trace::new("dst");
        let copied = target.append(&source.all_activities(0..1)[0]).unwrap();
        assert!(!copied.is_stw());
        assert_eq!(copied.overhead_percent(), 87.5);
        assert_eq!(target.kind_id("Full GC"), Some(0));
    }

    // ── Listeners ────────────────────────────────────────────────

    #[test]
    fn test_listeners_observe_in_append_order() {
        let trace = Trace::new("t");
        let recorder = Arc::new(Recorder::default());
        trace.add_listener(recorder.clone());

        trace.record("Young GC", 1.0, 0.1, None).unwrap();
        trace.record("Full GC", 2.0, 0.5, None).unwrap();
        trace.record("Young GC", 3.0, 0.1, None).unwrap();

        assert_eq!(
            *recorder.kinds.lock(),
            vec![(0, "Young GC".to_string()), (1, "Full GC".to_string())]
        );
        let added: Vec<f64> = recorder.added.lock().iter().map(|(_, s)| *s).collect();
        assert_eq!(added, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_removed_listener_is_not_called() {
        let trace = Trace::new("t");
        let recorder = Arc::new(Recorder::default());
        let id = trace.add_listener(recorder.clone());
        assert!(trace.remove_listener(id));
        assert!(!trace.remove_listener(id));
        trace.record("Young GC", 1.0, 0.1, None).unwrap();
        assert!(recorder.added.lock().is_empty());
    }

    struct Reader {
        trace: Arc<Trace>,
        seen: Mutex<Vec<usize>>,
    }

    impl TraceListener for Reader {
        fn activity_added(&self, _kind: &ActivityKind, _activity: &Activity) {
            self.seen.lock().push(self.trace.all_len());
        }
    }

    #[test]
    fn test_listener_can_read_trace_inside_callback() {
        let trace = Arc::new(Trace::new("t"));
        let reader = Arc::new(Reader {
            trace: Arc::clone(&trace),
            seen: Mutex::new(Vec::new()),
        });
        trace.add_listener(reader.clone());
        trace.record("Young GC", 1.0, 0.1, None).unwrap();
        trace.record("Young GC", 2.0, 0.1, None).unwrap();
        assert_eq!(*reader.seen.lock(), vec![1, 2]);
    }
}
