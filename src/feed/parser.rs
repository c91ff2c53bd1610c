use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

/// Maximum element nesting accepted in a feed document.
const MAX_XML_DEPTH: usize = 64;

/// Errors that can occur while turning feed XML into an [`RssFeed`].
#[derive(Debug, Error)]
pub enum ParseError {
    /// The body is not well-formed XML.
    #[error("XML parse error: {0}")]
    Xml(String),

    /// The document parsed but has no `<rss><channel>` element.
    #[error("Document has no RSS <channel> element")]
    MissingChannel,

    /// Element nesting exceeds safety limit.
    #[error("XML nesting depth exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),
}

/// RSS 2.0 document, reduced to the fields gator stores.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RssFeed {
    pub channel: RssChannel,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RssChannel {
    pub title: String,
    pub link: String,
    pub description: String,
    pub items: Vec<RssItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RssItem {
    pub title: String,
    pub link: String,
    pub description: String,
    pub pub_date: String,
}

impl RssItem {
    /// Publish time as a Unix timestamp.
    ///
    /// `pubDate` is expected in RFC 1123 form with a numeric zone
    /// (`Mon, 02 Jan 2006 15:04:05 -0700`). Anything unparsable yields `None`.
    pub fn published_at(&self) -> Option<i64> {
        let raw = self.pub_date.trim();
        if raw.is_empty() {
            return None;
        }
        chrono::DateTime::parse_from_rfc2822(raw)
            .ok()
            .map(|dt| dt.timestamp())
    }
}

/// Parse an RSS document and HTML-unescape its titles and descriptions.
///
/// Only the unprefixed `title`, `link`, `description` and `pubDate`
/// children of `<channel>` and `<item>` are read, so namespaced siblings
/// such as `<atom:link>` never shadow them. XML entities are resolved by the
/// reader; HTML entities left in the text (`&amp;#8217;`, CDATA content) are
/// decoded afterwards.
pub fn parse_rss(bytes: &[u8]) -> Result<RssFeed, ParseError> {
    // quick-xml (pinned in Cargo.toml) never expands <!ENTITY> declarations;
    // unknown entities surface as errors from `unescape()`.
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut text = String::new();
    let mut channel: Option<RssChannel> = None;
    let mut item: Option<RssItem> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = e.name().as_ref().to_vec();
                let parent = path.last().map(Vec::as_slice);
                match (parent, name.as_slice()) {
                    (Some(b"rss"), b"channel") if channel.is_none() => {
                        channel = Some(RssChannel::default());
                    }
                    (Some(b"channel"), b"item") if channel.is_some() && path.len() == 2 => {
                        item = Some(RssItem::default());
                    }
                    _ => {}
                }
                path.push(name);
                if path.len() > MAX_XML_DEPTH {
                    return Err(ParseError::MaxDepthExceeded(MAX_XML_DEPTH));
                }
                text.clear();
            }
            Ok(Event::Text(t)) => {
                let unescaped = t.unescape().map_err(|e| ParseError::Xml(e.to_string()))?;
                text.push_str(&unescaped);
            }
            Ok(Event::CData(c)) => {
                text.push_str(&String::from_utf8_lossy(&c));
            }
            Ok(Event::End(_)) => {
                let Some(name) = path.pop() else {
                    return Err(ParseError::Xml("unexpected closing tag".to_string()));
                };
                let parent = path.last().map(Vec::as_slice);
                let value = std::mem::take(&mut text);

                match (parent, name.as_slice()) {
                    (Some(b"channel"), b"item") => {
                        if let (Some(ch), Some(done)) = (channel.as_mut(), item.take()) {
                            ch.items.push(done);
                        }
                    }
                    (Some(b"item"), field) => {
                        if let Some(it) = item.as_mut() {
                            match field {
                                b"title" => it.title = value,
                                b"link" => it.link = value,
                                b"description" => it.description = value,
                                b"pubDate" => it.pub_date = value,
                                _ => {}
                            }
                        }
                    }
                    (Some(b"channel"), field) if path.len() == 2 => {
                        if let Some(ch) = channel.as_mut() {
                            match field {
                                b"title" => ch.title = value,
                                b"link" => ch.link = value,
                                b"description" => ch.description = value,
                                _ => {}
                            }
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ParseError::Xml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    if !path.is_empty() {
        return Err(ParseError::Xml("unexpected end of document".to_string()));
    }

    let mut channel = channel.ok_or(ParseError::MissingChannel)?;
    channel.title = unescape_html(&channel.title);
    channel.description = unescape_html(&channel.description);
    for item in &mut channel.items {
        item.title = unescape_html(&item.title);
        item.description = unescape_html(&item.description);
    }

    Ok(RssFeed { channel })
}

fn unescape_html(s: &str) -> String {
    html_escape::decode_html_entities(s).into_owned()
}
