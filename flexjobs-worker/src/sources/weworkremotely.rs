/// WeWorkRemotely RSS feed
///
/// Item titles have the form `Company: Position`.

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use tokio_util::sync::CancellationToken;

use super::{JobSource, RawJob, ScrapeError, ScrapeResult};

pub const NAME: &str = "weworkremotely";
const LABEL: &str = "WeWorkRemotely";
const FEED_URL: &str = "https://weworkremotely.com/remote-jobs.rss";

pub struct WeWorkRemotelySource {
    client: reqwest::Client,
}

impl WeWorkRemotelySource {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Description,
    Link,
    Region,
}

#[derive(Debug, Default)]
struct Item {
    title: String,
    description: String,
    link: String,
    region: String,
}

impl Item {
    fn push(&mut self, field: Field, text: &str) {
        let target = match field {
            Field::Title => &mut self.title,
            Field::Description => &mut self.description,
            Field::Link => &mut self.link,
            Field::Region => &mut self.region,
        };
        target.push_str(text);
    }

    fn into_raw(self) -> RawJob {
        let (company, position) = split_title(&self.title);
        let non_empty = |s: String| {
            let s = s.trim().to_string();
            (!s.is_empty()).then_some(s)
        };

        RawJob {
            title: position,
            company,
            location: non_empty(self.region).or_else(|| Some("Remote".to_string())),
            description: non_empty(self.description),
            salary: None,
            url: non_empty(self.link),
            source: LABEL.to_string(),
        }
    }
}

/// `"Acme: Senior Engineer"` into `("Acme", "Senior Engineer")`
pub fn split_title(title: &str) -> (String, String) {
    match title.split_once(':') {
        Some((company, position)) if !position.trim().is_empty() => {
            (company.trim().to_string(), position.trim().to_string())
        }
        _ => ("Unknown Company".to_string(), title.trim().to_string()),
    }
}

fn field_for(tag: &[u8]) -> Option<Field> {
    match tag {
        b"title" => Some(Field::Title),
        b"description" => Some(Field::Description),
        b"link" => Some(Field::Link),
        b"region" => Some(Field::Region),
        _ => None,
    }
}

fn xml_error(e: impl std::fmt::Display) -> ScrapeError {
    ScrapeError::Parse(format!("invalid RSS: {}", e))
}

/// Extracts `<item>` entries from an RSS document
pub fn parse_feed(xml: &str) -> ScrapeResult<Vec<RawJob>> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut jobs = Vec::new();
    let mut item: Option<Item> = None;
    let mut field: Option<Field> = None;

    loop {
        match reader.read_event_into(&mut buf).map_err(xml_error)? {
            Event::Start(e) => {
                let name = e.name();
                if name.as_ref() == b"item" {
                    item = Some(Item::default());
                } else if item.is_some() {
                    field = field_for(name.as_ref());
                }
            }
            Event::End(e) => {
                if e.name().as_ref() == b"item" {
                    if let Some(done) = item.take() {
                        jobs.push(done.into_raw());
                    }
                }
                field = None;
            }
            Event::Text(e) => {
                if let (Some(current), Some(f)) = (item.as_mut(), field) {
                    current.push(f, &e.decode().map_err(xml_error)?);
                }
            }
            Event::CData(e) => {
                if let (Some(current), Some(f)) = (item.as_mut(), field) {
                    current.push(f, &e.decode().map_err(xml_error)?);
                }
            }
            Event::GeneralRef(e) => {
                if let (Some(current), Some(f)) = (item.as_mut(), field) {
                    if let Some(ch) = e.resolve_char_ref().map_err(xml_error)? {
                        current.push(f, ch.encode_utf8(&mut [0; 4]));
                    } else {
                        let name = e.decode().map_err(xml_error)?;
                        if let Some(text) = quick_xml::escape::resolve_predefined_entity(&name) {
                            current.push(f, text);
                        }
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(jobs)
}

#[async_trait]
impl JobSource for WeWorkRemotelySource {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn fetch(&self, _cancel: &CancellationToken) -> ScrapeResult<Vec<RawJob>> {
        let body = self
            .client
            .get(FEED_URL)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let jobs = parse_feed(&body)?;
        tracing::info!(count = jobs.len(), "Fetched WeWorkRemotely listings");
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>We Work Remotely</title>
    <item>
      <title>Acme Corp: Senior Rust Engineer</title>
      <region>Anywhere in the World</region>
      <description><![CDATA[<p>Build our platform.</p>]]></description>
      <link>https://weworkremotely.com/remote-jobs/acme-senior-rust-engineer</link>
    </item>
    <item>
      <title>Standalone Listing</title>
      <description>Tom &amp; Jerry</description>
      <link>https://weworkremotely.com/remote-jobs/standalone</link>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_parse_feed() {
        let jobs = parse_feed(FEED).unwrap();

        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].company, "Acme Corp");
        assert_eq!(jobs[0].title, "Senior Rust Engineer");
        assert_eq!(jobs[0].location.as_deref(), Some("Anywhere in the World"));
        assert_eq!(jobs[0].description.as_deref(), Some("<p>Build our platform.</p>"));
        assert_eq!(jobs[0].source, "WeWorkRemotely");

        assert_eq!(jobs[1].company, "Unknown Company");
        assert_eq!(jobs[1].title, "Standalone Listing");
        assert_eq!(jobs[1].location.as_deref(), Some("Remote"));
        assert_eq!(jobs[1].description.as_deref(), Some("Tom & Jerry"));
    }

    #[test]
    fn test_channel_title_ignored() {
        let jobs = parse_feed(FEED).unwrap();
        assert!(jobs.iter().all(|j| j.title != "We Work Remotely"));
    }

    #[test]
    fn test_split_title() {
        assert_eq!(
            split_title("Globex: Support Lead: EMEA"),
            ("Globex".to_string(), "Support Lead: EMEA".to_string())
        );
        assert_eq!(
            split_title("NoColon"),
            ("Unknown Company".to_string(), "NoColon".to_string())
        );
    }
}
