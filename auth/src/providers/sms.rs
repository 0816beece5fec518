//! SMS delivery trait.

use crate::error::Result;

/// SMS gateway collaborator.
///
/// Fire-and-forget with a success/failure result, not a stream. A
/// failed send means the code is NOT considered issued — the caller
/// must not store a code whose delivery failed.
pub trait SmsProvider: Send + Sync {
    /// Send a message to a destination number (E.164).
    ///
    /// # Errors
    ///
    /// Returns [`crate::AuthError::DeliveryFailure`] if the gateway
    /// rejects or cannot deliver the message.
    fn send(
        &self,
        destination: &str,
        message: &str,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}
