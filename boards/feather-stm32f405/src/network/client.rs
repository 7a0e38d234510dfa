#![deny(unsafe_code)]
#![deny(warnings)]
//! Network client trait
//!
//! Protocols that ride on the link (currently only SNTP) implement
//! `NetworkClient`; the link driver runs them once the stack has an address.

use super::error::NetworkError;

/// A protocol client run on demand against the network stack
///
/// Implementors log and return their errors; a failed run must leave the
/// client usable for the next one.
///
/// # Example Implementation
/// ```ignore
/// impl NetworkClient for SntpClient {
///     type Output = Timestamp;
///     async fn run(&mut self, stack: &Stack<'static>) -> Result<Timestamp, NetworkError> {
///         self.sync(stack).await
///     }
/// }
/// ```
pub trait NetworkClient {
    /// Output of one successful run
    type Output;

    /// Perform one operation (e.g. one SNTP synchronization)
    fn run(
        &mut self,
        stack: &embassy_net::Stack<'static>,
    ) -> impl core::future::Future<Output = Result<Self::Output, NetworkError>>;
}
