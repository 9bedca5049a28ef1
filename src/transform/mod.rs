//! Text rewriting on both legs of the relay.

pub mod brand;
pub mod sanitize;

pub use brand::BrandRewriter;
pub use sanitize::{sanitize_reply, truncate_at_sentence, MESSAGE_CHAR_LIMIT};

use crate::config::PersonaConfig;
use anyhow::Result;

/// Request-bound and response-bound text passes, built once from config.
#[derive(Debug, Clone)]
pub struct TextPipeline {
    brand: BrandRewriter,
}

impl TextPipeline {
    pub fn new(persona: &PersonaConfig) -> Result<Self> {
        Ok(Self {
            brand: BrandRewriter::new(persona)?,
        })
    }

    /// User text → backend input.
    pub fn prepare_request(&self, text: &str) -> String {
        self.brand.to_backend(text)
    }

    /// Raw backend reply → text for the user. Sanitizes first, then rebrands.
    ///
    /// Public terms may be longer than the backend ones, so the rebranded text
    /// is held to [`MESSAGE_CHAR_LIMIT`] again.
    pub fn finish_reply(&self, raw: &str) -> String {
        let public = self.brand.to_public(&sanitize_reply(raw));
        truncate_at_sentence(&public, MESSAGE_CHAR_LIMIT).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline() -> TextPipeline {
        TextPipeline::new(&PersonaConfig::default()).unwrap()
    }

    #[test]
    fn request_leg_rebrands_user_text() {
        assert_eq!(pipeline().prepare_request("hello keiko"), "hello Mitsuku");
    }

    #[test]
    fn reply_leg_sanitizes_then_rebrands() {
        let raw = "I was made by Mousebreaker.&lt;br&gt; Ask me &quot;anything&quot;.";
        assert_eq!(
            pipeline().finish_reply(raw),
            "I was made by Insurgentes. Ask me \"anything\"."
        );
    }

    #[test]
    fn escaped_biography_is_recognised_after_sanitizing() {
        let persona = PersonaConfig::default();
        let raw = format!("{}&lt;br&gt;", persona.backend_biography);
        assert_eq!(pipeline().finish_reply(&raw), persona.public_biography);
    }

    #[test]
    fn longer_public_names_still_fit_the_message_limit() {
        let persona = PersonaConfig {
            public_name: "Keiko the Magnificent Conversational Companion".into(),
            ..PersonaConfig::default()
        };
        let pipeline = TextPipeline::new(&persona).unwrap();
        let raw = "Mitsuku here. ".repeat(45);
        assert!(raw.chars().count() <= MESSAGE_CHAR_LIMIT);

        let reply = pipeline.finish_reply(&raw);
        assert!(reply.chars().count() <= MESSAGE_CHAR_LIMIT);
        assert!(reply.ends_with('.'));
        assert!(reply.starts_with("Keiko the Magnificent Conversational Companion here."));
    }

    #[test]
    fn long_public_biography_is_held_to_the_limit() {
        let persona = PersonaConfig {
            public_biography: "x".repeat(MESSAGE_CHAR_LIMIT + 100),
            ..PersonaConfig::default()
        };
        let pipeline = TextPipeline::new(&persona).unwrap();
        let reply = pipeline.finish_reply(&persona.backend_biography);
        assert_eq!(reply.chars().count(), MESSAGE_CHAR_LIMIT);
    }
}
