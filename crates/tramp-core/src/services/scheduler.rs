use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::lifecycle::InstanceLifecycleManager;
use super::store::EcosystemStore;
use crate::error::{Result, TrampolineError};
use crate::models::{GroupId, Instance, MicroServiceId};

/// Progress update from a group launch.
#[derive(Debug, Clone)]
pub enum GroupProgress {
    /// Member `index` is waiting out its delay.
    Waiting {
        index: usize,
        total: usize,
        service: MicroServiceId,
        delay_secs: u64,
    },
    Started {
        index: usize,
        total: usize,
        instance: Instance,
    },
}

/// Handle to a group launch running in the background.
pub struct GroupLaunch {
    progress: mpsc::UnboundedReceiver<GroupProgress>,
    cancel: CancellationToken,
    task: JoinHandle<Result<Vec<Instance>>>,
}

impl GroupLaunch {
    /// Abort the pending starts. A member already spawned stays up.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Next progress update, or `None` once the launch has finished.
    pub async fn next_progress(&mut self) -> Option<GroupProgress> {
        self.progress.recv().await
    }

    /// Wait for every member to start. Cancellation surfaces as `InterruptedWait`.
    pub async fn wait(self) -> Result<Vec<Instance>> {
        match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(TrampolineError::InterruptedWait),
            Err(e) => std::panic::resume_unwind(e.into_panic()),
        }
    }
}

/// Starts the members of a group one after another, pacing them by their delays.
pub struct GroupScheduler {
    store: Arc<EcosystemStore>,
    lifecycle: Arc<InstanceLifecycleManager>,
}

impl GroupScheduler {
    pub fn new(store: Arc<EcosystemStore>, lifecycle: Arc<InstanceLifecycleManager>) -> Self {
        Self { store, lifecycle }
    }

    /// Queue the group's starts and return immediately.
    ///
    /// Members start strictly in list order, each on the first free port at
    /// or above its default port. The first failure abandons the rest.
    pub async fn launch_group(&self, group_id: &GroupId) -> Result<GroupLaunch> {
        let ecosystem = self.store.load().await?;
        let group = ecosystem
            .find_group(group_id)
            .ok_or_else(|| TrampolineError::GroupNotFound(group_id.to_string()))?;
        let members = group.members();
        let name = group.name.clone();

        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let lifecycle = Arc::clone(&self.lifecycle);

        info!(group = %name, members = members.len(), "launching group");
        let task = tokio::spawn(async move {
            let total = members.len();
            let mut started = Vec::with_capacity(total);
            for (index, (service, delay_secs)) in members.into_iter().enumerate() {
                if token.is_cancelled() {
                    return Err(TrampolineError::InterruptedWait);
                }
                let _ = tx.send(GroupProgress::Waiting {
                    index,
                    total,
                    service: service.clone(),
                    delay_secs,
                });

                let instance = match lifecycle
                    .start_on_free_port(&service, delay_secs, &token)
                    .await
                {
                    Ok(instance) => instance,
                    Err(e) => {
                        warn!(group = %name, service = %service, "group launch stopped: {e}");
                        return Err(e);
                    }
                };

                let _ = tx.send(GroupProgress::Started {
                    index,
                    total,
                    instance: instance.clone(),
                });
                started.push(instance);
            }
            info!(group = %name, started = started.len(), "group launched");
            Ok(started)
        });

        Ok(GroupLaunch {
            progress: rx,
            cancel,
            task,
        })
    }

    /// Launch the group and wait for all of its members.
    pub async fn start_group(&self, group_id: &GroupId) -> Result<Vec<Instance>> {
        self.launch_group(group_id).await?.wait().await
    }
}
