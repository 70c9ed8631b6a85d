//! Operator confirmation on the controlling terminal

use async_trait::async_trait;
use stackfleet_core::Confirmation;

/// Asks on the terminal; no terminal or a failed read counts as "no"
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalConfirmation;

#[async_trait]
impl Confirmation for TerminalConfirmation {
    async fn confirm(&self, prompt: &str) -> bool {
        let prompt = prompt.to_string();
        tokio::task::spawn_blocking(move || {
            dialoguer::Confirm::new()
                .with_prompt(prompt)
                .default(false)
                .interact()
                .unwrap_or(false)
        })
        .await
        .unwrap_or(false)
    }
}
