use serde::{Deserialize, Serialize};

/// Discord embed attached to a thread message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Embed {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A chat message in an order's thread
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadMessage {
    pub author: String,
    #[serde(default)]
    pub author_id: String,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
    pub timestamp: String,
}

/// How a message is styled relative to the viewer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStyle {
    Bot,
    CurrentUser,
    Other,
}

impl MessageStyle {
    pub fn border_class(&self) -> &'static str {
        match self {
            MessageStyle::Bot => "border-purple-500",
            MessageStyle::CurrentUser => "border-blue-500",
            MessageStyle::Other => "border-green-500",
        }
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            MessageStyle::Bot => " (Bot)",
            MessageStyle::CurrentUser => " (You)",
            MessageStyle::Other => "",
        }
    }
}

impl ThreadMessage {
    /// Bot flag wins over authorship
    pub fn style_for(&self, viewer_id: Option<&str>) -> MessageStyle {
        if self.is_bot {
            MessageStyle::Bot
        } else if viewer_id.is_some_and(|id| !id.is_empty() && id == self.author_id) {
            MessageStyle::CurrentUser
        } else {
            MessageStyle::Other
        }
    }

    /// Content followed by any embed descriptions, separated by blank lines
    pub fn display_content(&self) -> String {
        let mut content = self.content.clone();
        for description in self
            .embeds
            .iter()
            .filter_map(|e| e.description.as_deref())
            .filter(|d| !d.is_empty())
        {
            if !content.is_empty() {
                content.push_str("\n\n");
            }
            content.push_str(description);
        }
        content
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(author_id: &str, is_bot: bool) -> ThreadMessage {
        ThreadMessage {
            author: "someone".to_string(),
            author_id: author_id.to_string(),
            is_bot,
            content: "hello".to_string(),
            timestamp: "2025-01-01T00:00:00Z".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_style_for_viewer() {
        assert_eq!(message("42", true).style_for(Some("42")), MessageStyle::Bot);
        assert_eq!(message("42", false).style_for(Some("42")), MessageStyle::CurrentUser);
        assert_eq!(message("43", false).style_for(Some("42")), MessageStyle::Other);
        assert_eq!(message("", false).style_for(Some("")), MessageStyle::Other);
        assert_eq!(message("42", false).style_for(None), MessageStyle::Other);
    }

    #[test]
    fn test_display_content_appends_embeds() {
        let mut msg = message("1", true);
        msg.embeds = vec![
            Embed {
                title: Some("Status".into()),
                description: Some("Order is ready".into()),
            },
            Embed::default(),
        ];
        assert_eq!(msg.display_content(), "hello\n\nOrder is ready");

        msg.content.clear();
        assert_eq!(msg.display_content(), "Order is ready");
    }
}
