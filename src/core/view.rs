//! Framework-independent description of a message.
//!
//! Presenters build a [`View`]; the bot layer turns it into Discord embeds and
//! component rows. Keeping this free of serenity types lets the presenters be
//! tested as plain functions.

/// Button colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonStyle {
    /// Blurple
    Primary,
    /// Grey
    Secondary,
    /// Green
    Success,
    /// Red
    Danger,
}

/// A clickable button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    /// Routing token, see [`crate::core::custom_id`]
    pub custom_id: String,
    /// Text on the button
    pub label: String,
    /// Colour
    pub style: ButtonStyle,
    /// Greyed out
    pub disabled: bool,
}

impl Button {
    /// Enabled button.
    pub fn new(custom_id: impl ToString, label: impl Into<String>, style: ButtonStyle) -> Self {
        Self {
            custom_id: custom_id.to_string(),
            label: label.into(),
            style,
            disabled: false,
        }
    }

    /// Sets the disabled flag.
    #[must_use]
    pub const fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }
}

/// One entry of a select menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    /// Shown text
    pub label: String,
    /// Value sent back on selection
    pub value: String,
    /// Pre-selected
    pub default: bool,
}

impl SelectOption {
    /// Creates an option.
    pub fn new(label: impl Into<String>, value: impl Into<String>, default: bool) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            default,
        }
    }
}

/// A string select menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Select {
    /// Routing token
    pub custom_id: String,
    /// Text shown with nothing selected
    pub placeholder: String,
    /// Options, at most 25
    pub options: Vec<SelectOption>,
    /// Fewest values the user must pick
    pub min_values: u8,
    /// Most values the user may pick
    pub max_values: u8,
    /// Greyed out
    pub disabled: bool,
}

impl Select {
    /// Single-choice menu.
    pub fn single(custom_id: impl ToString, placeholder: impl Into<String>, options: Vec<SelectOption>) -> Self {
        Self {
            custom_id: custom_id.to_string(),
            placeholder: placeholder.into(),
            options,
            min_values: 1,
            max_values: 1,
            disabled: false,
        }
    }
}

/// Building block of a [`View`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// Markdown text
    Text(String),
    /// Visual break between text blocks
    Separator,
    /// One row of up to five buttons
    Buttons(Vec<Button>),
    /// One select menu on its own row
    Select(Select),
}

/// A renderable message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct View {
    /// Side colour
    pub accent_color: u32,
    /// Image shown in the corner
    pub thumbnail: Option<String>,
    /// Content in order
    pub blocks: Vec<Block>,
}

impl View {
    /// Empty view with `accent_color`.
    #[must_use]
    pub const fn new(accent_color: u32) -> Self {
        Self {
            accent_color,
            thumbnail: None,
            blocks: Vec::new(),
        }
    }

    /// Sets the thumbnail.
    #[must_use]
    pub fn thumbnail(mut self, url: impl Into<String>) -> Self {
        self.thumbnail = Some(url.into());
        self
    }

    /// Appends a text block.
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.blocks.push(Block::Text(text.into()));
        self
    }

    /// Appends a separator.
    #[must_use]
    pub fn separator(mut self) -> Self {
        self.blocks.push(Block::Separator);
        self
    }

    /// Appends a button row.
    #[must_use]
    pub fn buttons(mut self, buttons: Vec<Button>) -> Self {
        self.blocks.push(Block::Buttons(buttons));
        self
    }

    /// Appends a select menu.
    #[must_use]
    pub fn select(mut self, select: Select) -> Self {
        self.blocks.push(Block::Select(select));
        self
    }

    /// All text blocks joined, separators as blank lines.
    #[must_use]
    pub fn body(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        for block in &self.blocks {
            match block {
                Block::Text(text) => parts.push(text),
                Block::Separator => parts.push(""),
                Block::Buttons(_) | Block::Select(_) => {}
            }
        }
        parts.join("\n").trim().to_string()
    }

    /// Every button in the view.
    pub fn all_buttons(&self) -> impl Iterator<Item = &Button> {
        self.blocks.iter().flat_map(|block| match block {
            Block::Buttons(buttons) => buttons.as_slice(),
            _ => &[],
        })
    }

    /// Every select menu in the view.
    pub fn all_selects(&self) -> impl Iterator<Item = &Select> {
        self.blocks.iter().filter_map(|block| match block {
            Block::Select(select) => Some(select),
            _ => None,
        })
    }
}

/// How a handler wants its result shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Send a new message
    Fresh(View),
    /// Replace the message the interaction came from
    Edit(View),
    /// Short private reply; the original message is left alone
    Notice(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_joins_text_and_skips_components() {
        let view = View::new(0)
            .text("## Title")
            .separator()
            .buttons(vec![Button::new("a:b", "Go", ButtonStyle::Success)])
            .text("line");
        assert_eq!(view.body(), "## Title\n\nline");
        assert_eq!(view.all_buttons().count(), 1);
        assert_eq!(view.all_selects().count(), 0);
    }
}
