//! Single-tick coalescing for high-frequency notifications

use std::collections::HashSet;
use std::sync::Arc;
use dashmap::DashSet;
use crate::types::notification::Notification;
use crate::types::RequestId;

/// Tracks the notification methods configured for debouncing and the
/// methods with a flush already scheduled in the current cooperative tick.
///
/// A notification is debouncable only when it carries no params, no related
/// request and no related-task tag; collapsing any of those would lose data.
#[derive(Default)]
pub(crate) struct DebouncedNotifications {
    methods: HashSet<String>,
    scheduled: Arc<DashSet<String>>,
}

impl DebouncedNotifications {
    /// Creates a new debounce set for the configured `methods`
    pub(crate) fn new<T>(methods: T) -> Self
    where
        T: IntoIterator<Item = String>
    {
        Self {
            methods: methods.into_iter().collect(),
            scheduled: Arc::new(DashSet::new()),
        }
    }

    /// Returns `true` if this notification collapses within a tick
    pub(crate) fn is_debouncable(
        &self,
        notification: &Notification,
        related_request: Option<&RequestId>,
    ) -> bool {
        notification.params.is_none()
            && related_request.is_none()
            && notification.related_task().is_none()
            && self.methods.contains(&notification.method)
    }

    /// Marks a flush as scheduled for `method`.
    ///
    /// Returns `false` when one is already in flight in this tick, in which
    /// case the caller suppresses the send.
    pub(crate) fn try_schedule(&self, method: &str) -> bool {
        self.scheduled.insert(method.to_string())
    }

    /// Clears the scheduled mark for `method` right before its flush
    pub(crate) fn release(&self, method: &str) {
        self.scheduled.remove(method);
    }

    /// Drops every scheduled flush; used on session close
    pub(crate) fn clear(&self) {
        self.scheduled.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn debounced() -> DebouncedNotifications {
        DebouncedNotifications::new(["test/changed".to_string()])
    }

    #[test]
    fn it_debounces_parameterless_configured_method() {
        let set = debounced();
        let notification = Notification::new("test/changed", None);

        assert!(set.is_debouncable(&notification, None));
    }

    #[test]
    fn it_does_not_debounce_unconfigured_method() {
        let set = debounced();
        let notification = Notification::new("other/changed", None);

        assert!(!set.is_debouncable(&notification, None));
    }

    #[test]
    fn it_does_not_debounce_with_params() {
        let set = debounced();
        let notification = Notification::new("test/changed", Some(json!({ "i": 1 })));

        assert!(!set.is_debouncable(&notification, None));
    }

    #[test]
    fn it_does_not_debounce_with_related_request() {
        let set = debounced();
        let notification = Notification::new("test/changed", None);

        assert!(!set.is_debouncable(&notification, Some(&RequestId::Number(1))));
    }

    #[test]
    fn it_does_not_debounce_with_related_task() {
        let set = debounced();
        let notification = Notification::new("test/changed", None)
            .with_related_task(&"task-1".into());

        assert!(!set.is_debouncable(&notification, None));
    }

    #[test]
    fn it_schedules_one_flush_per_tick() {
        let set = debounced();

        assert!(set.try_schedule("test/changed"));
        assert!(!set.try_schedule("test/changed"));
        assert!(!set.try_schedule("test/changed"));

        set.release("test/changed");
        assert!(set.try_schedule("test/changed"));
    }

    #[test]
    fn it_clears_scheduled_flushes() {
        let set = debounced();

        assert!(set.try_schedule("test/changed"));
        set.clear();
        assert!(set.try_schedule("test/changed"));
    }
}
