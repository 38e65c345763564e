use chrono::{DateTime, Utc};

use super::Token;

/// Device-authorization session returned by the provider.
///
/// # Example
/// ```no_run
/// use graphkeys::auth::DeviceCodeSession;
/// use chrono::Utc;
///
/// let session = DeviceCodeSession {
///     verification_url: "https://microsoft.com/devicelogin".to_string(),
///     user_code: "ABCD-EFGH".to_string(),
///     device_code: "device-code".to_string(),
///     message: None,
///     interval_secs: 5,
///     expires_at: Utc::now(),
/// };
/// ```
#[derive(Debug, Clone)]
pub struct DeviceCodeSession {
    pub verification_url: String,
    pub user_code: String,
    pub device_code: String,
    /// Ready-made instructions for the user, when the provider sends one.
    pub message: Option<String>,
    pub interval_secs: u64,
    pub expires_at: DateTime<Utc>,
}

impl DeviceCodeSession {
    /// Text to show the user before polling starts.
    pub fn prompt(&self) -> String {
        match &self.message {
            Some(message) if !message.is_empty() => message.clone(),
            _ => format!(
                "To sign in, open {} and enter the code {}",
                self.verification_url, self.user_code
            ),
        }
    }
}

/// Polling outcome for a device-code session.
#[derive(Debug, Clone)]
pub enum DeviceCodePoll {
    Pending { interval_secs: u64 },
    SlowDown { interval_secs: u64 },
    Authorized { token: Token },
    AccessDenied,
    Expired,
}
