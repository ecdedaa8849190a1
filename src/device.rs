use crate::stack::SecurityType;

/// Receives the credentials of every connect attempt, for persistence or
/// display elsewhere in the application.
///
/// The call cannot fail from the connecting side; implementations log
/// their own errors.
pub trait DeviceConfigSink: Send + Sync {
    fn set_wifi_config(&self, ssid: &str, psk: Option<&str>, security: SecurityType);
}

/// Sink that forgets everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl DeviceConfigSink for NoopSink {
    fn set_wifi_config(&self, _ssid: &str, _psk: Option<&str>, _security: SecurityType) {}
}
