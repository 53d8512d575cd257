// Incoming-webhook message payloads
//
// Wire schema for the chat webhook:
// - Payload: top-level message, empty scalars are omitted
// - Attachment: rich block, unset fields serialize as explicit null
// - Field / Action: ordered children of an attachment

use serde::{Deserialize, Serialize};

/// Label/value pair rendered inside an attachment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub title: String,
    pub value: String,
    /// Whether the field may be rendered side by side with another
    pub short: bool,
}

impl Field {
    /// Create a new field
    pub fn new(title: impl Into<String>, value: impl Into<String>, short: bool) -> Self {
        Self {
            title: title.into(),
            value: value.into(),
            short,
        }
    }
}

/// Clickable action attached to a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
    pub url: String,
    /// Visual style (`default`, `primary`, `danger`)
    pub style: String,
}

impl Action {
    /// Create a link button with the default style
    pub fn button(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            kind: "button".to_string(),
            text: text.into(),
            url: url.into(),
            style: String::new(),
        }
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = style.into();
        self
    }
}

/// Rich content block of a message
///
/// Every optional member is written as `null` when unset, unlike the
/// scalar members of [`Payload`] which are left out entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub fallback: Option<String>,
    pub color: Option<String>,
    pub pretext: Option<String>,
    pub author_name: Option<String>,
    pub author_link: Option<String>,
    pub author_icon: Option<String>,
    pub title: Option<String>,
    pub title_link: Option<String>,
    pub text: Option<String>,
    pub image_url: Option<String>,
    pub fields: Option<Vec<Field>>,
    pub footer: Option<String>,
    pub footer_icon: Option<String>,
    /// Unix timestamp shown next to the footer
    pub ts: Option<i64>,
    /// Names of members rendered as formatted text
    pub mrkdwn_in: Option<Vec<String>>,
    pub actions: Option<Vec<Action>>,
    pub callback_id: Option<String>,
    pub thumb_url: Option<String>,
}

impl Attachment {
    /// Create an empty attachment
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field, keeping display order
    pub fn add_field(&mut self, field: Field) -> &mut Self {
        self.fields.get_or_insert_with(Vec::new).push(field);
        self
    }

    /// Append an action, keeping display order
    pub fn add_action(&mut self, action: Action) -> &mut Self {
        self.actions.get_or_insert_with(Vec::new).push(action);
        self
    }

    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = Some(fallback.into());
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = Some(footer.into());
        self
    }

    pub fn with_timestamp(mut self, ts: i64) -> Self {
        self.ts = Some(ts);
        self
    }

    /// Mark members (e.g. `"text"`, `"fields"`) as formatted text
    pub fn with_mrkdwn_in<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mrkdwn_in = Some(names.into_iter().map(Into::into).collect());
        self
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Message posted to an incoming webhook
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Payload {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub parse: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub username: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub icon_url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub icon_emoji: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub channel: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub link_names: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(skip_serializing_if = "is_false")]
    pub unfurl_links: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub unfurl_media: bool,
    #[serde(rename = "mrkdwn", skip_serializing_if = "is_false")]
    pub markdown: bool,
}

impl Payload {
    /// Create a plain text message
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    pub fn with_icon_emoji(mut self, icon_emoji: impl Into<String>) -> Self {
        self.icon_emoji = icon_emoji.into();
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }
}
