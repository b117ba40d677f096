use std::fmt;

/// Health of a pipeline service as seen from outside its task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceHealth {
    /// Registered, no completed work yet
    Starting,

    Healthy,

    /// Running but repeatedly failing; carries the latest cause
    Degraded(String),

    /// Task gone or unusable
    Unhealthy(String),
}

impl ServiceHealth {
    pub fn is_healthy(&self) -> bool {
        matches!(self, ServiceHealth::Healthy | ServiceHealth::Starting)
    }
}

impl fmt::Display for ServiceHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceHealth::Starting => write!(f, "starting"),
            ServiceHealth::Healthy => write!(f, "healthy"),
            ServiceHealth::Degraded(reason) => write!(f, "degraded ({})", reason),
            ServiceHealth::Unhealthy(reason) => write!(f, "unhealthy ({})", reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starting_counts_as_healthy() {
        assert!(ServiceHealth::Starting.is_healthy());
        assert!(!ServiceHealth::Degraded("feed timeout".to_string()).is_healthy());
    }

    #[test]
    fn test_display_carries_reason() {
        assert_eq!(
            ServiceHealth::Unhealthy("Dispatcher task exited".to_string()).to_string(),
            "unhealthy (Dispatcher task exited)"
        );
        assert_eq!(ServiceHealth::Healthy.to_string(), "healthy");
    }
}
