use serde::{Deserialize, Serialize};

use crate::core::persona::{self, Persona, PersonaConfig};
use crate::core::ports::llm::{ChatMessage, ChatRequest};

pub const PRD_MODEL: &str = "claude-3-5-sonnet-20241022";
pub const PRD_TEMPERATURE: f32 = 0.5;
pub const PRD_MAX_TOKENS: u32 = 4000;
pub const CHAT_MAX_TOKENS: u32 = 1000;

const NOT_SPECIFIED: &str = "Not specified";

const PRD_SECTIONS: [&str; 10] = [
    "Executive Summary",
    "Product Overview",
    "Market Analysis & Target Audience",
    "Product Goals & Success Metrics",
    "Feature Requirements & User Stories",
    "Technical Architecture & Requirements",
    "User Experience & Interface Design",
    "Implementation Timeline & Milestones",
    "Risk Assessment & Mitigation",
    "Success Metrics & KPIs",
];

/// The idea form a PRD is generated from. Only name and description are required.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppIdea {
    pub app_name: String,
    pub description: String,
    pub target_audience: Option<String>,
    pub platform: Option<String>,
    pub primary_goals: Option<String>,
    pub key_features: Option<String>,
    pub tech_stack: Option<String>,
    pub timeline: Option<String>,
}

/// System prompt, then the optional context as a second system message,
/// then the user message.
pub fn create_messages(
    system_prompt: &str,
    user_message: &str,
    context: Option<&str>,
) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::system(system_prompt)];
    if let Some(context) = context.filter(|c| !c.trim().is_empty()) {
        messages.push(ChatMessage::system(format!("Context: {context}")));
    }
    messages.push(ChatMessage::user(user_message));
    messages
}

fn or_not_specified(value: &Option<String>) -> &str {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(NOT_SPECIFIED)
}

pub fn prd_prompt(idea: &AppIdea) -> String {
    let sections = PRD_SECTIONS
        .iter()
        .enumerate()
        .map(|(i, section)| format!("{}. {section}", i + 1))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Generate a comprehensive Product Requirements Document (PRD) based on the following information:\n\
         \n\
         App Name: {}\n\
         Description: {}\n\
         Target Audience: {}\n\
         Platform: {}\n\
         Primary Goals: {}\n\
         Key Features: {}\n\
         Tech Stack: {}\n\
         Timeline: {}\n\
         \n\
         Please create a professional, detailed PRD that includes:\n\
         {sections}\n\
         \n\
         Format the response in clear markdown with proper headings and sections.",
        idea.app_name.trim(),
        idea.description.trim(),
        or_not_specified(&idea.target_audience),
        or_not_specified(&idea.platform),
        or_not_specified(&idea.primary_goals),
        or_not_specified(&idea.key_features),
        or_not_specified(&idea.tech_stack),
        or_not_specified(&idea.timeline),
    )
}

/// PRD generation speaks as the product manager but runs on the PRD model
/// and temperature unless `model` overrides it.
pub fn prd_request(idea: &AppIdea, model: Option<&str>) -> ChatRequest {
    let persona = Persona::ProductManager.config();
    ChatRequest::new(
        model.unwrap_or(PRD_MODEL),
        create_messages(persona.system_prompt, &prd_prompt(idea), None),
    )
    .with_temperature(PRD_TEMPERATURE)
    .with_max_tokens(PRD_MAX_TOKENS)
}

pub fn prd_context(prd: &str) -> String {
    format!("Here is the PRD for context:\n\n{prd}")
}

/// A persona chat turn. `model` wins over the persona's preferred model.
pub fn chat_request(
    persona_id: Option<&str>,
    message: &str,
    context: Option<&str>,
    model: Option<&str>,
) -> ChatRequest {
    let PersonaConfig {
        system_prompt,
        temperature,
        preferred_model,
    } = persona::resolve(persona_id);

    ChatRequest::new(
        model.unwrap_or(preferred_model),
        create_messages(system_prompt, message, context),
    )
    .with_temperature(temperature)
    .with_max_tokens(CHAT_MAX_TOKENS)
}

#[cfg(test)]
mod tests {
    use super::{chat_request, create_messages, prd_context, prd_prompt, prd_request, AppIdea};
    use crate::core::ports::llm::Role;

    fn idea() -> AppIdea {
        AppIdea {
            app_name: "TaskFlow".to_string(),
            description: "A shared todo list for small teams".to_string(),
            platform: Some("iOS and web".to_string()),
            tech_stack: Some("   ".to_string()),
            ..AppIdea::default()
        }
    }

    #[test]
    fn context_becomes_a_second_system_message() {
        let messages = create_messages("sys", "question", Some("the prd"));
        let roles = messages.iter().map(|m| m.role).collect::<Vec<_>>();
        assert_eq!(roles, vec![Role::System, Role::System, Role::User]);
        assert_eq!(messages[1].content, "Context: the prd");
        assert_eq!(messages[2].content, "question");

        assert_eq!(create_messages("sys", "question", None).len(), 2);
        assert_eq!(create_messages("sys", "question", Some("  ")).len(), 2);
    }

    #[test]
    fn prd_prompt_fills_missing_fields() {
        let prompt = prd_prompt(&idea());
        assert!(prompt.contains("App Name: TaskFlow\n"));
        assert!(prompt.contains("Platform: iOS and web\n"));
        assert!(prompt.contains("Target Audience: Not specified\n"));
        assert!(prompt.contains("Tech Stack: Not specified\n"));
        assert!(prompt.contains("1. Executive Summary\n"));
        assert!(prompt.contains("10. Success Metrics & KPIs\n"));
        assert!(prompt.ends_with("proper headings and sections."));
    }

    #[test]
    fn prd_request_uses_prd_defaults() {
        let request = prd_request(&idea(), None);
        assert_eq!(request.model, "claude-3-5-sonnet-20241022");
        assert_eq!(request.temperature, Some(0.5));
        assert_eq!(request.max_tokens, Some(4000));
        assert!(request.messages[0]
            .content
            .starts_with("You are an experienced Product Manager"));

        assert_eq!(prd_request(&idea(), Some("gpt-4o")).model, "gpt-4o");
    }

    #[test]
    fn chat_request_follows_persona_unless_overridden() {
        let request = chat_request(Some("engineer"), "Is this feasible?", None, None);
        assert_eq!(request.model, "gpt-4o");
        assert_eq!(request.temperature, Some(0.3));
        assert_eq!(request.max_tokens, Some(1000));

        let context = prd_context("# TaskFlow");
        let request = chat_request(None, "Hi", Some(&context), Some("sonar"));
        assert_eq!(request.model, "sonar");
        assert_eq!(request.temperature, Some(0.7));
        assert_eq!(
            request.messages[1].content,
            "Context: Here is the PRD for context:\n\n# TaskFlow"
        );
    }
}
