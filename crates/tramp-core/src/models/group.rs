use serde::{Deserialize, Serialize};

use super::ids::{GroupId, MicroServiceId};

/// An ordered set of microservices started one after another.
///
/// `microservices_ids` and `microservices_delays` are parallel lists; index
/// `i` of the delays is the pause, in seconds, before member `i` starts.
/// Documents written before delays existed have no delay list at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MicroservicesGroup {
    pub id: GroupId,
    pub name: String,
    #[serde(default)]
    pub microservices_ids: Vec<MicroServiceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub microservices_delays: Option<Vec<u64>>,
}

impl MicroservicesGroup {
    pub fn new(name: String, ids: Vec<MicroServiceId>, delays: Vec<u64>) -> Self {
        Self {
            id: GroupId::generate(),
            name,
            microservices_ids: ids,
            microservices_delays: Some(delays),
        }
    }

    /// Members in start order, paired with their delay in seconds.
    pub fn members(&self) -> Vec<(MicroServiceId, u64)> {
        let delays = self.microservices_delays.as_deref().unwrap_or_default();
        self.microservices_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), delays.get(i).copied().unwrap_or(0)))
            .collect()
    }

    /// Drop every occurrence of `id`, keeping ids and delays aligned.
    pub fn remove_member(&mut self, id: &MicroServiceId) {
        let mut index = 0;
        while index < self.microservices_ids.len() {
            if &self.microservices_ids[index] == id {
                self.microservices_ids.remove(index);
                if let Some(delays) = self.microservices_delays.as_mut() {
                    if index < delays.len() {
                        delays.remove(index);
                    }
                }
            } else {
                index += 1;
            }
        }
    }
}
