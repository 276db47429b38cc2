use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Point-in-time view of the link for status reporting.
#[derive(Debug, Clone)]
pub struct LinkStatus {
    pub state: LinkState,
    pub port: Option<String>,
    pub firmware: Option<String>,
    pub since_read: Duration,
    pub since_sent: Duration,
    pub sonar_cm: Option<i32>,
}
