use std::time::Duration;

// Every outbound call is bounded; some platforms answer service calls slowly.
pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
