//! Structured message content as the application sees it.

/// Reference to an uploaded image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    /// Server-side resource id.
    pub resource_id: String,
    /// Pixel width, 0 if unknown.
    pub width: u32,
    /// Pixel height, 0 if unknown.
    pub height: u32,
}

/// A quoted reply: the origin reference plus the quoted content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteContent {
    /// Message sequence of the quoted message.
    pub origin_seq: i32,
    /// Sender of the quoted message.
    pub origin_sender: i64,
    /// The quoted message's structured content.
    pub content: Vec<MessageContent>,
}

/// One structured content unit of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageContent {
    /// Plain text run.
    Text(String),
    /// Mention of another account.
    Mention {
        /// Mentioned account id.
        target: i64,
        /// Display text, e.g. `@name`.
        display: String,
    },
    /// Built-in face/sticker.
    Face(u16),
    /// Image reference.
    Image(ImageRef),
    /// Quoted reply; recurses through the pipeline on encode/decode.
    Quote(Box<QuoteContent>),
    /// Rich-content blob. The payload is an owned copy; it never
    /// aliases an inbound frame buffer.
    Rich {
        /// Service id selecting the interpreter.
        service_id: u16,
        /// Opaque payload.
        payload: Vec<u8>,
    },
}

/// An ordered sequence of structured content units.
///
/// Equality is content equality, which is what the round-trip law
/// `decode(encode(m)) == m` is stated over.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    content: Vec<MessageContent>,
}

impl Message {
    /// Create an empty message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a message from content units.
    pub fn from_content(content: Vec<MessageContent>) -> Self {
        Self { content }
    }

    /// Append a text run.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.content.push(MessageContent::Text(text.into()));
        self
    }

    /// Append a mention.
    pub fn mention(mut self, target: i64, display: impl Into<String>) -> Self {
        self.content.push(MessageContent::Mention {
            target,
            display: display.into(),
        });
        self
    }

    /// Append a face.
    pub fn face(mut self, id: u16) -> Self {
        self.content.push(MessageContent::Face(id));
        self
    }

    /// Append an image reference.
    pub fn image(mut self, image: ImageRef) -> Self {
        self.content.push(MessageContent::Image(image));
        self
    }

    /// Append an arbitrary content unit.
    pub fn push(&mut self, content: MessageContent) {
        self.content.push(content);
    }

    /// The content units in order.
    pub fn content(&self) -> &[MessageContent] {
        &self.content
    }

    /// Whether the message has no content.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Number of content units.
    pub fn len(&self) -> usize {
        self.content.len()
    }

    /// Concatenated text of all `Text` units, for quick display/logging.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for unit in &self.content {
            if let MessageContent::Text(t) = unit {
                out.push_str(t);
            }
        }
        out
    }
}

impl IntoIterator for Message {
    type Item = MessageContent;
    type IntoIter = std::vec::IntoIter<MessageContent>;

    fn into_iter(self) -> Self::IntoIter {
        self.content.into_iter()
    }
}

impl<'a> IntoIterator for &'a Message {
    type Item = &'a MessageContent;
    type IntoIter = std::slice::Iter<'a, MessageContent>;

    fn into_iter(self) -> Self::IntoIter {
        self.content.iter()
    }
}

impl FromIterator<MessageContent> for Message {
    fn from_iter<T: IntoIterator<Item = MessageContent>>(iter: T) -> Self {
        Self {
            content: iter.into_iter().collect(),
        }
    }
}
