//! Minimal element tree over `quick-xml`
//!
//! SOAP responses are small and read once, so they are parsed into an
//! owned tree and walked by local name. Element prefixes are dropped;
//! attributes keep theirs so `xsi:type` never shadows `type`.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

/// An XML element with its local name, attributes, text and children
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    /// Parse a document and return its root element
    pub fn parse(xml: &str) -> Result<Self, String> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(start)) => stack.push(Self::from_start(&start)?),
                Ok(Event::Empty(start)) => {
                    let element = Self::from_start(&start)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::End(_)) => {
                    let element = stack.pop().ok_or("unbalanced end tag")?;
                    attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::Text(text)) => {
                    if let Some(top) = stack.last_mut() {
                        let text = text.unescape().map_err(|e| e.to_string())?;
                        top.text.push_str(&text);
                    }
                }
                Ok(Event::CData(data)) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(format!(
                        "XML parse error at byte {}: {}",
                        reader.buffer_position(),
                        e
                    ));
                }
            }
        }

        if !stack.is_empty() {
            return Err("unexpected end of document".to_string());
        }

        root.ok_or_else(|| "empty document".to_string())
    }

    fn from_start(start: &BytesStart<'_>) -> Result<Self, String> {
        let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();

        let mut attrs = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| e.to_string())?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value().map_err(|e| e.to_string())?.into_owned();
            attrs.push((key, value));
        }

        Ok(Self {
            name,
            attrs,
            text: String::new(),
            children: Vec::new(),
        })
    }

    /// First direct child with the given local name
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All direct children with the given local name
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Attribute value by qualified name
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Text content of the element
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Move out the first direct child with the given local name
    pub fn take_child(self, name: &str) -> Option<Element> {
        self.children.into_iter().find(|c| c.name == name)
    }
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), String> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => return Err("multiple root elements".to_string()),
    }
    Ok(())
}
