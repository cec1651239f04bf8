//! Tokenizer state machine definitions.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TokenizerState {
    Data,
    TagOpen,
    EndTagOpen,
    TagName,
    BeforeAttributeName,
    AttributeName,
    AfterAttributeName,
    BeforeAttributeValue,
    AttributeValueDoubleQuoted,
    AttributeValueSingleQuoted,
    AttributeValueUnquoted,
    SelfClosingStartTag,
    MarkupDeclarationOpen,
    Comment,
    BogusComment,
    Doctype,
    /// Script data and other raw text elements; only the matching end tag
    /// leaves this state.
    RawText(RawTextKind),
}

/// Elements whose content is not tokenized as markup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RawTextKind {
    Script,
    Style,
    Textarea,
    Title,
}

impl RawTextKind {
    pub(crate) fn from_tag_name(name: &str) -> Option<Self> {
        match name {
            "script" => Some(RawTextKind::Script),
            "style" => Some(RawTextKind::Style),
            "textarea" => Some(RawTextKind::Textarea),
            "title" => Some(RawTextKind::Title),
            _ => None,
        }
    }

    pub(crate) fn tag_name(self) -> &'static str {
        match self {
            RawTextKind::Script => "script",
            RawTextKind::Style => "style",
            RawTextKind::Textarea => "textarea",
            RawTextKind::Title => "title",
        }
    }
}
