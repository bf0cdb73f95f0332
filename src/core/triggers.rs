use dashmap::DashSet;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::error::{StudioError, StudioResult};

/// Kinds of long-running requests; each has its own trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RequestKind {
    PreparePage,
    GenerateConfig,
    ValidateSelectors,
    SaveConfig,
    RunScraper,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreparePage => "prepare-page",
            Self::GenerateConfig => "generate-config",
            Self::ValidateSelectors => "validate-selectors",
            Self::SaveConfig => "save-config",
            Self::RunScraper => "run-scraper",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks which request triggers are currently disabled
#[derive(Debug, Clone, Default)]
pub struct RequestGate {
    in_flight: Arc<DashSet<RequestKind>>,
}

impl RequestGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable the trigger for `kind` until the permit is dropped
    pub fn acquire(&self, kind: RequestKind) -> StudioResult<RequestPermit> {
        if !self.in_flight.insert(kind) {
            return Err(StudioError::RequestInFlight { kind: kind.to_string() });
        }

        debug!("Request trigger {} disabled", kind);
        Ok(RequestPermit {
            kind,
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    pub fn is_enabled(&self, kind: RequestKind) -> bool {
        !self.in_flight.contains(&kind)
    }
}

/// Re-enables its trigger on drop, whatever the outcome of the request
#[derive(Debug)]
pub struct RequestPermit {
    kind: RequestKind,
    in_flight: Arc<DashSet<RequestKind>>,
}

impl RequestPermit {
    pub fn kind(&self) -> RequestKind {
        self.kind
    }
}

impl Drop for RequestPermit {
    fn drop(&mut self) {
        self.in_flight.remove(&self.kind);
        debug!("Request trigger {} re-enabled", self.kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_request_of_same_kind_rejected() {
        let gate = RequestGate::new();
        let permit = gate.acquire(RequestKind::GenerateConfig).unwrap();

        assert!(!gate.is_enabled(RequestKind::GenerateConfig));
        assert!(matches!(
            gate.acquire(RequestKind::GenerateConfig),
            Err(StudioError::RequestInFlight { .. })
        ));
        assert!(gate.acquire(RequestKind::ValidateSelectors).is_ok());

        drop(permit);
        assert!(gate.is_enabled(RequestKind::GenerateConfig));
    }

    #[test]
    fn test_trigger_reenabled_after_failure() {
        let gate = RequestGate::new();

        let result: StudioResult<()> = (|| {
            let _permit = gate.acquire(RequestKind::SaveConfig)?;
            Err(StudioError::save("disk full"))
        })();

        assert!(result.is_err());
        assert!(gate.is_enabled(RequestKind::SaveConfig));
    }
}
