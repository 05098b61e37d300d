use std::path::PathBuf;

use clap::Args;

use crate::adapters::markdown;
use crate::core::prompt::{self, AppIdea};
use crate::runtime::cli::{AppContext, CliError};

use super::shared::{explain, stream_to_stdout};

/// Generate a product requirements document from an app idea.
#[derive(Args, Debug)]
pub struct Generate {
    /// App name.
    #[arg(long)]
    pub name: String,
    /// What the app does.
    #[arg(long)]
    pub description: String,
    /// Who it is for.
    #[arg(long)]
    pub audience: Option<String>,
    /// Target platform(s).
    #[arg(long)]
    pub platform: Option<String>,
    /// Primary goals.
    #[arg(long)]
    pub goals: Option<String>,
    /// Key features.
    #[arg(long)]
    pub features: Option<String>,
    /// Preferred tech stack.
    #[arg(long)]
    pub tech_stack: Option<String>,
    /// Expected timeline.
    #[arg(long)]
    pub timeline: Option<String>,
    /// Model id override.
    #[arg(long)]
    pub model: Option<String>,
    /// Output file. Defaults to `<app>-requirements-document.md`.
    #[arg(long, short)]
    pub out: Option<PathBuf>,
    /// Print the document while it is being written.
    #[arg(long)]
    pub stream: bool,
}

impl Generate {
    pub fn idea(&self) -> Result<AppIdea, CliError> {
        if self.name.trim().is_empty() || self.description.trim().is_empty() {
            return Err("app name and description are required".into());
        }
        Ok(AppIdea {
            app_name: self.name.trim().to_string(),
            description: self.description.trim().to_string(),
            target_audience: self.audience.clone(),
            platform: self.platform.clone(),
            primary_goals: self.goals.clone(),
            key_features: self.features.clone(),
            tech_stack: self.tech_stack.clone(),
            timeline: self.timeline.clone(),
        })
    }

    pub async fn run(self, ctx: &AppContext) -> Result<(), CliError> {
        let idea = self.idea()?;
        let model = self.model.as_deref().or(ctx.settings.default_model());
        let request = prompt::prd_request(&idea, model);
        log::info!("generating PRD for '{}' with {}", idea.app_name, request.model);

        let document = if self.stream {
            stream_to_stdout(&ctx.dispatcher, &request.streaming()).await?
        } else {
            let response = ctx.dispatcher.dispatch(&request).await.map_err(explain)?;
            log::debug!(
                "PRD finished: reason={} tokens={}",
                response.finish_reason.as_str(),
                response.usage.total_tokens
            );
            response.content
        };

        let out = self
            .out
            .unwrap_or_else(|| PathBuf::from(markdown::download_file_name(&idea.app_name)));
        tokio::fs::write(&out, &document).await?;

        eprintln!(
            "Wrote \"{}\" ({} sections) to {}",
            markdown::document_title(&document),
            markdown::outline(&document)
                .iter()
                .filter(|heading| heading.level == 2)
                .count(),
            out.display()
        );
        Ok(())
    }
}
