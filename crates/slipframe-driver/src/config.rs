use slipframe_codec::ErrorMode;

/// Construction-time settings for a [`Driver`](crate::Driver).
///
/// `DriverConfig::default()` is the process-wide default: no leading `END`,
/// strict decoding. Both settings stay mutable on the driver afterwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverConfig {
    /// Emit an `END` byte before every outbound packet.
    pub leading_end: bool,
    /// Decode policy for malformed escape sequences.
    pub error_mode: ErrorMode,
}

impl DriverConfig {
    pub fn with_leading_end(mut self, leading_end: bool) -> Self {
        self.leading_end = leading_end;
        self
    }

    pub fn with_error_mode(mut self, error_mode: ErrorMode) -> Self {
        self.error_mode = error_mode;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_override_defaults() {
        let cfg = DriverConfig::default()
            .with_leading_end(true)
            .with_error_mode(ErrorMode::Relaxed);
        assert!(cfg.leading_end);
        assert_eq!(cfg.error_mode, ErrorMode::Relaxed);
        assert_eq!(DriverConfig::default().error_mode, ErrorMode::Strict);
        assert!(!DriverConfig::default().leading_end);
    }
}
