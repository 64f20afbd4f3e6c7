use std::collections::HashSet;
use std::net::{Ipv4Addr, TcpListener};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::error::{Result, TrampolineError};
use crate::models::Ecosystem;

/// Decides which ports a new instance may use.
///
/// A port is available when the OS lets us bind it and no declared instance
/// claims it. Ports handed out by [`PortAllocator::reserve_from`] stay
/// reserved until released, so two concurrent starts never pick the same
/// port while neither has been recorded yet.
pub struct PortAllocator {
    reserved: Mutex<HashSet<u16>>,
}

impl PortAllocator {
    pub fn new() -> Self {
        Self {
            reserved: Mutex::new(HashSet::new()),
        }
    }

    fn reserved(&self) -> MutexGuard<'_, HashSet<u16>> {
        self.reserved.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_available(&self, port: u16, ecosystem: &Ecosystem) -> bool {
        let reserved = self.reserved();
        Self::free(port, ecosystem, &reserved)
    }

    fn free(port: u16, ecosystem: &Ecosystem, reserved: &HashSet<u16>) -> bool {
        if ecosystem.declares_port(port) {
            debug!(port, "port claimed by a declared instance");
            return false;
        }
        if reserved.contains(&port) {
            debug!(port, "port reserved by a pending start");
            return false;
        }
        is_bindable(port)
    }

    /// Reserve the first available port at or above `start`.
    pub fn reserve_from(&self, start: u16, ecosystem: &Ecosystem) -> Result<u16> {
        let mut reserved = self.reserved();
        for port in start..=u16::MAX {
            if Self::free(port, ecosystem, &reserved) {
                reserved.insert(port);
                return Ok(port);
            }
        }
        Err(TrampolineError::PortsExhausted(start))
    }

    pub fn release(&self, port: u16) {
        self.reserved().remove(&port);
    }
}

impl Default for PortAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether the OS currently lets us listen on `port`.
pub fn is_bindable(port: u16) -> bool {
    TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).is_ok()
}
