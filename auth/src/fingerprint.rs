//! Deterministic device fingerprinting.
//!
//! A fingerprint is a SHA-256 hash over canonicalized stable device
//! attributes plus the user-agent. It lets the risk engine recognize
//! returning devices without persisting raw identifiers.

use crate::context::DeviceDescriptor;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

/// Placeholder for attributes the client did not report.
///
/// Canonicalizing absent fields keeps the hash stable across partial
/// descriptors.
const ABSENT: &str = "-";

/// Compute the deterministic fingerprint for a device descriptor.
///
/// The same descriptor and user-agent always produce the same value;
/// any attribute change produces an unrelated value.
#[must_use]
pub fn device_fingerprint(device: &DeviceDescriptor, user_agent: &str) -> String {
    let canonical = [
        device.platform.as_deref().unwrap_or(ABSENT),
        device.timezone.as_deref().unwrap_or(ABSENT),
        device.language.as_deref().unwrap_or(ABSENT),
        device.screen.as_deref().unwrap_or(ABSENT),
        user_agent,
    ]
    .join("\x1f");

    let digest = Sha256::digest(canonical.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn descriptor() -> DeviceDescriptor {
        DeviceDescriptor {
            platform: Some("macOS".into()),
            timezone: Some("Europe/Paris".into()),
            language: Some("fr-FR".into()),
            screen: Some("2560x1440@24".into()),
            untrusted: false,
        }
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let ua = "Mozilla/5.0 (Macintosh)";
        assert_eq!(
            device_fingerprint(&descriptor(), ua),
            device_fingerprint(&descriptor(), ua)
        );
    }

    #[test]
    fn any_attribute_change_changes_fingerprint() {
        let ua = "Mozilla/5.0 (Macintosh)";
        let base = device_fingerprint(&descriptor(), ua);

        let mut changed = descriptor();
        changed.timezone = Some("America/New_York".into());
        assert_ne!(device_fingerprint(&changed, ua), base);

        assert_ne!(device_fingerprint(&descriptor(), "other-agent"), base);
    }

    #[test]
    fn missing_fields_are_canonicalized() {
        let sparse = DeviceDescriptor::default();
        assert_eq!(
            device_fingerprint(&sparse, "ua"),
            device_fingerprint(&DeviceDescriptor::default(), "ua")
        );
    }

    #[test]
    fn trust_flag_does_not_affect_fingerprint() {
        let ua = "Mozilla/5.0";
        let mut flagged = descriptor();
        flagged.untrusted = true;
        assert_eq!(
            device_fingerprint(&flagged, ua),
            device_fingerprint(&descriptor(), ua)
        );
    }
}
