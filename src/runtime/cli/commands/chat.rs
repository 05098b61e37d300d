use std::path::PathBuf;

use clap::Args;

use crate::core::persona::Persona;
use crate::core::prompt;
use crate::runtime::cli::{AppContext, CliError};

use super::shared::stream_to_stdout;

/// Ask a persona about a document and stream the answer.
#[derive(Args, Debug)]
pub struct Chat {
    /// What to ask.
    pub message: String,
    /// designer, engineer, product_manager (pm) or user_researcher (researcher).
    #[arg(long)]
    pub persona: Option<String>,
    /// A PRD to discuss.
    #[arg(long)]
    pub context_file: Option<PathBuf>,
    /// Model id override.
    #[arg(long)]
    pub model: Option<String>,
}

impl Chat {
    pub async fn run(self, ctx: &AppContext) -> Result<(), CliError> {
        if self.message.trim().is_empty() {
            return Err("message is required".into());
        }

        if let Some(id) = self.persona.as_deref() {
            match Persona::parse(id) {
                Some(persona) => eprintln!("[{}]", persona.display_name()),
                None => {
                    let known = Persona::all()
                        .iter()
                        .map(|p| p.id())
                        .collect::<Vec<_>>()
                        .join(", ");
                    eprintln!(
                        "Unknown persona '{id}' (known: {known}), answering as a generic assistant."
                    );
                }
            }
        }

        let context = match &self.context_file {
            Some(path) => {
                let document = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
                Some(prompt::prd_context(&document))
            }
            None => None,
        };

        // An explicit persona keeps its preferred model unless --model is given.
        let model = self.model.as_deref().or_else(|| {
            self.persona
                .is_none()
                .then(|| ctx.settings.default_model())
                .flatten()
        });

        let request = prompt::chat_request(
            self.persona.as_deref(),
            &self.message,
            context.as_deref(),
            model,
        )
        .streaming();

        stream_to_stdout(&ctx.dispatcher, &request).await?;
        Ok(())
    }
}
