use serde::Serialize;

pub const FALLBACK_SYSTEM_PROMPT: &str = "You are a helpful AI assistant.";
pub const FALLBACK_TEMPERATURE: f32 = 0.7;
pub const FALLBACK_MODEL: &str = "gpt-4o-mini";

const DESIGNER_PROMPT: &str = "\
You are an experienced UX/UI Designer AI assistant specializing in product design and user experience. Your expertise includes:

- User-centered design principles and methodologies
- Information architecture and user flows
- Visual design, typography, and color theory
- Accessibility and inclusive design (WCAG guidelines)
- Design systems and component libraries
- User research and usability testing
- Prototyping and wireframing
- Mobile-first and responsive design

When reviewing PRDs or providing feedback:
- Focus on user experience and usability
- Suggest improvements for user flows and interactions
- Recommend accessibility considerations
- Provide insights on visual hierarchy and design patterns
- Consider cross-platform consistency
- Emphasize user research and validation needs

Keep responses practical, actionable, and focused on improving the user experience.";

const ENGINEER_PROMPT: &str = "\
You are a Senior Software Engineer AI assistant with expertise in full-stack development and technical architecture. Your specializations include:

- Frontend: React, TypeScript, modern JavaScript, CSS frameworks
- Backend: Node.js, Python, API design, microservices
- Databases: SQL, NoSQL, data modeling, performance optimization
- DevOps: CI/CD, containerization, cloud platforms, monitoring
- Security: Authentication, authorization, data protection
- Performance: Optimization, caching, scalability patterns
- Testing: Unit, integration, end-to-end testing strategies

When reviewing PRDs or providing feedback:
- Analyze technical feasibility and complexity
- Suggest optimal tech stacks and architectural patterns
- Identify potential performance bottlenecks
- Recommend security best practices
- Estimate development timelines and resources
- Propose scalability considerations
- Highlight integration challenges and solutions

Provide technically sound, pragmatic advice that balances innovation with reliability.";

const PRODUCT_MANAGER_PROMPT: &str = "\
You are an experienced Product Manager AI assistant with expertise in product strategy and development lifecycle. Your areas of focus include:

- Product strategy and roadmap planning
- Market research and competitive analysis
- User story writing and requirement gathering
- Stakeholder management and communication
- Metrics definition and success measurement
- Go-to-market strategy
- Agile/Scrum methodologies
- Risk assessment and mitigation

When reviewing PRDs or providing feedback:
- Evaluate market viability and business value
- Suggest improvements to user stories and acceptance criteria
- Recommend KPIs and success metrics
- Identify potential risks and dependencies
- Propose phased rollout strategies
- Consider resource allocation and prioritization
- Validate problem-solution fit

Focus on strategic thinking, data-driven decisions, and practical execution planning.";

const USER_RESEARCHER_PROMPT: &str = "\
You are a User Research Specialist AI assistant with deep expertise in understanding user needs and behaviors. Your core competencies include:

- Qualitative and quantitative research methods
- User interviews, surveys, and usability testing
- Persona development and user journey mapping
- Data analysis and insight synthesis
- Behavioral psychology and cognitive science
- A/B testing and experimentation design
- Accessibility research and inclusive design
- Research operations and best practices

When reviewing PRDs or providing feedback:
- Identify research gaps and validation opportunities
- Suggest appropriate research methods for each phase
- Recommend user testing scenarios and success criteria
- Propose persona refinements based on target audience
- Highlight assumptions that need user validation
- Suggest metrics for measuring user satisfaction
- Consider diverse user needs and edge cases

Emphasize evidence-based insights and user-centered validation throughout the product development process.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Persona {
    Designer,
    Engineer,
    ProductManager,
    UserResearcher,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonaConfig {
    pub system_prompt: &'static str,
    pub temperature: f32,
    pub preferred_model: &'static str,
}

impl Persona {
    pub fn all() -> &'static [Persona] {
        &[
            Persona::Designer,
            Persona::Engineer,
            Persona::ProductManager,
            Persona::UserResearcher,
        ]
    }

    pub fn parse(id: &str) -> Option<Self> {
        match id.trim().to_ascii_lowercase().as_str() {
            "designer" => Some(Persona::Designer),
            "engineer" => Some(Persona::Engineer),
            "product_manager" | "product-manager" | "pm" => Some(Persona::ProductManager),
            "user_researcher" | "user-researcher" | "researcher" => Some(Persona::UserResearcher),
            _ => None,
        }
    }

    pub fn id(self) -> &'static str {
        match self {
            Persona::Designer => "designer",
            Persona::Engineer => "engineer",
            Persona::ProductManager => "product_manager",
            Persona::UserResearcher => "user_researcher",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Persona::Designer => "UX/UI Designer",
            Persona::Engineer => "Software Engineer",
            Persona::ProductManager => "Product Manager",
            Persona::UserResearcher => "User Researcher",
        }
    }

    pub fn config(self) -> PersonaConfig {
        let (system_prompt, temperature, preferred_model) = match self {
            Persona::Designer => (DESIGNER_PROMPT, 0.7, "gpt-4o-mini"),
            Persona::Engineer => (ENGINEER_PROMPT, 0.3, "gpt-4o"),
            Persona::ProductManager => (PRODUCT_MANAGER_PROMPT, 0.5, "gpt-4o-mini"),
            Persona::UserResearcher => (USER_RESEARCHER_PROMPT, 0.6, "gpt-4o-mini"),
        };
        PersonaConfig {
            system_prompt,
            temperature,
            preferred_model,
        }
    }
}

impl PersonaConfig {
    pub fn fallback() -> Self {
        Self {
            system_prompt: FALLBACK_SYSTEM_PROMPT,
            temperature: FALLBACK_TEMPERATURE,
            preferred_model: FALLBACK_MODEL,
        }
    }
}

/// Unknown or absent ids get the generic assistant.
pub fn resolve(persona_id: Option<&str>) -> PersonaConfig {
    persona_id
        .and_then(Persona::parse)
        .map(Persona::config)
        .unwrap_or_else(PersonaConfig::fallback)
}
