//! Prompt assembly.
//!
//! A [`Prompt`] is an ordered list of text, tool and image parts. Tool
//! parts appear in the rendered text as the tool's name and make the tool
//! available to the model, so a prompt can say "use `lookup` to ..." and
//! carry `lookup` along with it:
//!
//! ```rust
//! use llm_converse::prompt::Prompt;
//! use llm_converse::tool::ToolBuilder;
//!
//! let lookup = ToolBuilder::new("lookup").sync_handler(|_| Ok("42"));
//! let assembled = Prompt::new()
//!     .text("Call ")
//!     .tool(lookup)
//!     .text(" and report the answer.")
//!     .assemble();
//!
//! assert_eq!(assembled.content.text(), "Call lookup and report the answer.");
//! assert!(assembled.tools.contains("lookup"));
//! ```

use std::fmt;
use std::sync::Arc;

use crate::chat::{ContentPart, ImageRef, MessageContent};
use crate::tool::{Tool, ToolSet};

/// One element of a prompt template.
#[derive(Clone)]
pub enum PromptPart {
    /// Literal text.
    Text(String),
    /// A tool, rendered as its name.
    Tool(Arc<dyn Tool>),
    /// An image reference.
    Image(ImageRef),
}

impl fmt::Debug for PromptPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Tool(tool) => f.debug_tuple("Tool").field(&tool.metadata().name).finish(),
            Self::Image(image) => f.debug_tuple("Image").field(image).finish(),
        }
    }
}

/// An ordered prompt template.
#[derive(Debug, Clone, Default)]
pub struct Prompt {
    parts: Vec<PromptPart>,
}

/// The content of a user turn plus the tools the prompt referenced.
#[derive(Debug, Clone)]
pub struct AssembledPrompt {
    /// Message content; plain text when the prompt has no images.
    pub content: MessageContent,
    /// Tools referenced by the prompt, last registration winning.
    pub tools: ToolSet,
}

impl Prompt {
    /// Creates an empty prompt.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends text.
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.parts.push(PromptPart::Text(text.into()));
        self
    }

    /// Appends a tool reference.
    #[must_use]
    pub fn tool(self, tool: impl Tool + 'static) -> Self {
        self.shared_tool(Arc::new(tool))
    }

    /// Appends a shared tool reference.
    #[must_use]
    pub fn shared_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.parts.push(PromptPart::Tool(tool));
        self
    }

    /// Appends an image.
    #[must_use]
    pub fn image(mut self, image: ImageRef) -> Self {
        self.parts.push(PromptPart::Image(image));
        self
    }

    /// Appends an arbitrary part.
    #[must_use]
    pub fn part(mut self, part: PromptPart) -> Self {
        self.parts.push(part);
        self
    }

    /// The parts in order.
    pub fn parts(&self) -> &[PromptPart] {
        &self.parts
    }

    /// Renders the prompt into message content and collects its tools.
    pub fn assemble(&self) -> AssembledPrompt {
        let mut content: Vec<ContentPart> = Vec::new();
        let mut tools = ToolSet::new();

        for part in &self.parts {
            match part {
                PromptPart::Text(text) => push_text(&mut content, text),
                PromptPart::Tool(tool) => {
                    push_text(&mut content, &tool.metadata().name);
                    tools.register_shared(Arc::clone(tool));
                }
                PromptPart::Image(image) => content.push(ContentPart::Image(image.clone())),
            }
        }

        let content = match <[ContentPart; 1]>::try_from(content) {
            Ok([ContentPart::Text(text)]) => MessageContent::Text(text),
            Ok([image]) => MessageContent::Parts(vec![image]),
            Err(parts) if parts.is_empty() => MessageContent::Text(String::new()),
            Err(parts) => MessageContent::Parts(parts),
        };
        AssembledPrompt { content, tools }
    }
}

fn push_text(content: &mut Vec<ContentPart>, text: &str) {
    if let Some(ContentPart::Text(last)) = content.last_mut() {
        last.push_str(text);
    } else {
        content.push(ContentPart::Text(text.to_owned()));
    }
}

impl From<&str> for Prompt {
    fn from(text: &str) -> Self {
        Self::new().text(text)
    }
}

impl From<String> for Prompt {
    fn from(text: String) -> Self {
        Self::new().text(text)
    }
}

/// System instructions: text, images for the first user turn, and tools.
#[derive(Debug, Clone, Default)]
pub struct SystemPrompt {
    /// Instruction text.
    pub text: String,
    /// Images prepended to the first user turn.
    pub images: Vec<ImageRef>,
    /// Tools referenced by the system prompt.
    pub tools: ToolSet,
}

impl SystemPrompt {
    /// Returns `true` when there is nothing to send.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.images.is_empty()
    }
}

impl From<Prompt> for SystemPrompt {
    fn from(prompt: Prompt) -> Self {
        let AssembledPrompt { content, tools } = prompt.assemble();
        let images = content
            .to_parts()
            .into_iter()
            .filter_map(|part| match part {
                ContentPart::Image(image) => Some(image),
                ContentPart::Text(_) => None,
            })
            .collect();
        Self {
            text: content.text(),
            images,
            tools,
        }
    }
}

impl From<&str> for SystemPrompt {
    fn from(text: &str) -> Self {
        Self {
            text: text.to_owned(),
            ..Self::default()
        }
    }
}

impl From<String> for SystemPrompt {
    fn from(text: String) -> Self {
        Self {
            text,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::ToolBuilder;

    #[test]
    fn test_adjacent_text_merges_to_plain_text() {
        let assembled = Prompt::new().text("Hello, ").text("world").assemble();
        assert_eq!(assembled.content, MessageContent::Text("Hello, world".into()));
        assert!(assembled.tools.is_empty());
    }

    #[test]
    fn test_images_produce_parts_in_order() {
        let image = ImageRef::from_base64("image/png", "AAAA");
        let assembled = Prompt::new()
            .text("Describe ")
            .image(image.clone())
            .text("briefly")
            .assemble();
        assert_eq!(
            assembled.content,
            MessageContent::Parts(vec![
                ContentPart::Text("Describe ".into()),
                ContentPart::Image(image),
                ContentPart::Text("briefly".into()),
            ])
        );
    }

    #[test]
    fn test_tool_parts_render_name_and_last_wins() {
        let first = ToolBuilder::new("calc").sync_handler(|_| Ok("1"));
        let second = ToolBuilder::new("calc")
            .description("newer")
            .sync_handler(|_| Ok("2"));
        let assembled = Prompt::new()
            .text("Use ")
            .tool(first)
            .text(" or ")
            .tool(second)
            .assemble();

        assert_eq!(assembled.content.text(), "Use calc or calc");
        assert_eq!(assembled.tools.len(), 1);
        assert_eq!(assembled.tools.definitions()[0].description, "newer");
    }

    #[test]
    fn test_system_prompt_splits_images() {
        let image = ImageRef::new("https://example.com/logo.png");
        let system = SystemPrompt::from(Prompt::new().text("You are helpful.").image(image.clone()));
        assert_eq!(system.text, "You are helpful.");
        assert_eq!(system.images, vec![image]);
        assert!(!system.is_empty());
        assert!(SystemPrompt::default().is_empty());
    }
}
