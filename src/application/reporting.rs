//! # Error Reporting
//!
//! Default `ErrorReporter`: logs the failure and tells the user something went wrong,
//! without leaking error details into the chat.

use async_trait::async_trait;

use crate::domain::traits::{ErrorContext, ErrorReporter};
use crate::strings::messages;

#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingErrorReporter;

#[async_trait]
impl ErrorReporter for LoggingErrorReporter {
    async fn report(&self, error: &anyhow::Error, context: &ErrorContext) {
        let target = context.invocation.as_ref().map(|i| i.target().to_string());
        tracing::error!(
            feature = %context.feature,
            method = %context.method,
            invocation = ?target,
            "Handler failed: {:#}",
            error
        );

        if let Some(invocation) = &context.invocation
            && let Err(e) = invocation
                .responder()
                .reply(messages::GENERIC_ERROR, true)
                .await
        {
            tracing::warn!(feature = %context.feature, "Failed to send error reply: {}", e);
        }
    }
}
