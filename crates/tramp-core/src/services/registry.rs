use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::process::Child;
use tracing::warn;

use crate::models::{InstanceId, MicroServiceId};

#[derive(Default)]
struct Handles {
    by_instance: HashMap<InstanceId, Child>,
    by_service: HashMap<MicroServiceId, HashSet<InstanceId>>,
}

impl Handles {
    /// Reap launchers that already exited and forget them.
    fn prune_exited(&mut self) -> usize {
        let exited: Vec<InstanceId> = self
            .by_instance
            .iter_mut()
            .filter_map(|(id, child)| match child.try_wait() {
                Ok(Some(_)) => Some(id.clone()),
                Ok(None) => None,
                Err(e) => {
                    warn!(instance = %id, "could not poll process: {e}");
                    None
                }
            })
            .collect();
        for id in &exited {
            self.by_instance.remove(id);
        }
        self.by_service.retain(|_, instances| {
            instances.retain(|id| !exited.contains(id));
            !instances.is_empty()
        });
        exited.len()
    }
}

/// Live process handles, kept only so they can be forcibly cleaned up.
///
/// Handles are keyed by instance id; a secondary index groups them by the
/// microservice they were started from.
#[derive(Default)]
pub struct ProcessRegistry {
    handles: Mutex<Handles>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn handles(&self) -> MutexGuard<'_, Handles> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Track `child` for `instance`. A handle already tracked under the same
    /// instance id is killed first, and launchers that have exited are
    /// dropped.
    pub fn insert(&self, service: &MicroServiceId, instance: &InstanceId, child: Child) {
        let mut handles = self.handles();
        handles.prune_exited();
        if let Some(mut previous) = handles.by_instance.insert(instance.clone(), child) {
            warn!(instance = %instance, "destroying previous process");
            let _ = previous.start_kill();
        }
        handles
            .by_service
            .entry(service.clone())
            .or_default()
            .insert(instance.clone());
    }

    /// Drop and kill every handle started from `service`. Returns how many were tracked.
    pub fn remove_service(&self, service: &MicroServiceId) -> usize {
        let mut handles = self.handles();
        let Some(instances) = handles.by_service.remove(service) else {
            return 0;
        };
        let mut removed = 0;
        for instance in instances {
            if let Some(mut child) = handles.by_instance.remove(&instance) {
                let _ = child.start_kill();
                removed += 1;
            }
        }
        removed
    }

    /// Drop every handle whose process has exited. Returns how many went.
    pub fn prune_exited(&self) -> usize {
        self.handles().prune_exited()
    }

    pub fn contains_service(&self, service: &MicroServiceId) -> bool {
        self.handles()
            .by_service
            .get(service)
            .is_some_and(|instances| !instances.is_empty())
    }

    pub fn instances_of(&self, service: &MicroServiceId) -> Vec<InstanceId> {
        self.handles()
            .by_service
            .get(service)
            .map(|instances| instances.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.handles().by_instance.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
