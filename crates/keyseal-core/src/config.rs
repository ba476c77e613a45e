//! Protocol configuration.

/// Default key rotation interval: 1 hour.
pub const DEFAULT_ROTATION_INTERVAL_MS: u64 = 3_600_000;

/// Default session TTL: 24 hours.
pub const DEFAULT_SESSION_TTL_MS: u64 = 86_400_000;

/// Tunable protocol parameters with documented defaults.
///
/// Explicit struct rather than implicit fallback chains; every knob has
/// one place to look for its default.
#[derive(Debug, Clone)]
pub struct ProtocolConfig {
    /// Sessions rotate keys after this much time has elapsed since the
    /// last rotation. Default: [`DEFAULT_ROTATION_INTERVAL_MS`].
    pub rotation_interval_ms: u64,

    /// Sessions expire this long after their last store write.
    /// Default: [`DEFAULT_SESSION_TTL_MS`].
    pub session_ttl_ms: u64,

    /// HKDF salt used at handshake time. `None` means 32 zero bytes.
    ///
    /// Production deployments SHOULD set a per-deployment random salt to
    /// avoid key-derivation correlation across tenants. Rotation ignores
    /// this and always draws a fresh random salt.
    pub hkdf_salt: Option<[u8; 32]>,

    /// When set, sessions also rotate keys once `request_count` reaches
    /// this threshold. `None` disables volume-based rotation.
    pub rotation_volume_threshold: Option<u64>,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            rotation_interval_ms: DEFAULT_ROTATION_INTERVAL_MS,
            session_ttl_ms: DEFAULT_SESSION_TTL_MS,
            hkdf_salt: None,
            rotation_volume_threshold: None,
        }
    }
}
