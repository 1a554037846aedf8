//! Boundary to the remote collaborators: hosted NLP models and the news feed.
//! Every call blocks the handling thread for at most `REQUEST_TIMEOUT` and
//! maps failures to `ServiceError`; nothing in here panics on a bad response.

use std::time::Duration;

use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Inputs longer than this are rejected before any network call.
pub const MAX_SUMMARY_WORDS: usize = 500;

const INFERENCE_BASE_URL: &str = "https://api-inference.huggingface.co/models";
const SUMMARIZATION_MODEL: &str = "t5-small";
const SENTIMENT_MODEL: &str = "distilbert-base-uncased-finetuned-sst-2-english";
const NEWS_RSS_URL: &str = "https://news.google.com/rss/search";

/// Only the first few articles are worth showing; the feed returns dozens.
const MAX_NEWS_ITEMS: usize = 5;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("no text provided")]
    EmptyInput,
    #[error("text has {0} words, the limit is {MAX_SUMMARY_WORDS}")]
    TooManyWords(usize),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected response from {0}")]
    BadResponse(&'static str),
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

#[derive(Debug, Clone)]
pub struct Sentiment {
    pub label: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsItem {
    pub title: String,
    /// Article URL; empty when the feed item carried none.
    pub link: String,
}

#[derive(Debug, Deserialize)]
struct SummaryRaw {
    summary_text: String,
}

#[derive(Debug, Deserialize)]
struct SentimentRaw {
    label: String,
    score: f64,
}

// The inference API wraps sentiment results in one more array level than
// summarization results; some model revisions do not.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SentimentResponse {
    Nested(Vec<Vec<SentimentRaw>>),
    Flat(Vec<SentimentRaw>),
}

/// Client for the NLP and news collaborators. One shared HTTP client with an
/// explicit request timeout; the API token is optional and only needed when
/// the inference endpoint rate-limits anonymous calls.
pub struct NlpClient {
    http: reqwest::blocking::Client,
    api_token: Option<String>,
}

impl NlpClient {
    pub fn new(api_token: Option<String>) -> ServiceResult<NlpClient> {
        let http = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("assistant-tui/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(NlpClient { http, api_token })
    }

    /// Summarize `text` with the hosted summarization model. Same length
    /// bounds as the original assistant: up to 500 words in, 30 to 130
    /// tokens out.
    pub fn summarize(&self, text: &str) -> ServiceResult<String> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ServiceError::EmptyInput);
        }
        let words = text.split_whitespace().count();
        if words > MAX_SUMMARY_WORDS {
            return Err(ServiceError::TooManyWords(words));
        }

        debug!(words, model = SUMMARIZATION_MODEL, "summarizing");
        let body = json!({
            "inputs": text,
            "parameters": { "max_length": 130, "min_length": 30, "do_sample": false },
        });
        let summaries: Vec<SummaryRaw> = self
            .post_model(SUMMARIZATION_MODEL, &body)?
            .json()
            .map_err(|err| {
                warn!(%err, "summarization response did not decode");
                ServiceError::BadResponse(SUMMARIZATION_MODEL)
            })?;
        summaries
            .into_iter()
            .next()
            .map(|s| s.summary_text)
            .ok_or(ServiceError::BadResponse(SUMMARIZATION_MODEL))
    }

    /// Classify the sentiment of `text`.
    pub fn sentiment(&self, text: &str) -> ServiceResult<Sentiment> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ServiceError::EmptyInput);
        }

        debug!(model = SENTIMENT_MODEL, "analyzing sentiment");
        let body = json!({ "inputs": text });
        let response: SentimentResponse = self
            .post_model(SENTIMENT_MODEL, &body)?
            .json()
            .map_err(|err| {
                warn!(%err, "sentiment response did not decode");
                ServiceError::BadResponse(SENTIMENT_MODEL)
            })?;
        let raw = match response {
            SentimentResponse::Nested(mut outer) => {
                outer.pop().and_then(|mut inner| {
                    inner.sort_by(|a, b| a.score.total_cmp(&b.score));
                    inner.pop()
                })
            }
            SentimentResponse::Flat(mut inner) => {
                inner.sort_by(|a, b| a.score.total_cmp(&b.score));
                inner.pop()
            }
        };
        raw.map(|r| Sentiment {
            label: r.label,
            score: r.score,
        })
        .ok_or(ServiceError::BadResponse(SENTIMENT_MODEL))
    }

    /// Fetch the news feed for `topic` and return the first few articles
    /// (headline plus URL).
    pub fn fetch_news(&self, topic: &str) -> ServiceResult<Vec<NewsItem>> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(ServiceError::EmptyInput);
        }

        debug!(topic, "fetching news feed");
        let body = self
            .http
            .get(NEWS_RSS_URL)
            .query(&[("q", topic)])
            .send()?
            .error_for_status()?
            .text()?;
        Ok(parse_feed_items(&body))
    }

    fn post_model(
        &self,
        model: &str,
        body: &serde_json::Value,
    ) -> ServiceResult<reqwest::blocking::Response> {
        let mut request = self
            .http
            .post(format!("{INFERENCE_BASE_URL}/{model}"))
            .json(body);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }
        Ok(request.send()?.error_for_status()?)
    }
}

/// Pull the first `MAX_NEWS_ITEMS` articles out of an RSS body. The feed's
/// own channel title is not nested in an item, so it is skipped automatically.
fn parse_feed_items(body: &str) -> Vec<NewsItem> {
    let document = Html::parse_document(body);
    // Static selectors, cannot fail to parse.
    let item_selector = Selector::parse("item").unwrap();
    let title_selector = Selector::parse("title").unwrap();

    let mut items = vec![];
    for item in document.select(&item_selector) {
        let title = item
            .select(&title_selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_default();
        if title.is_empty() {
            continue;
        }
        items.push(NewsItem {
            title,
            link: item_link(item).unwrap_or_default(),
        });
        if items.len() == MAX_NEWS_ITEMS {
            break;
        }
    }
    items
}

/// The html parser treats `<link>` as a void element, so the URL usually
/// lands in a text node right after it rather than inside it. Check both
/// places.
fn item_link(item: ElementRef<'_>) -> Option<String> {
    let link = item
        .children()
        .find(|node| {
            node.value()
                .as_element()
                .is_some_and(|el| el.name() == "link")
        })?;
    let inner: String = link
        .children()
        .filter_map(|node| node.value().as_text().map(|t| t.to_string()))
        .collect();
    let text = if inner.trim().is_empty() {
        link.next_sibling()
            .and_then(|node| node.value().as_text().map(|t| t.to_string()))
            .unwrap_or_default()
    } else {
        inner
    };
    let text = text.trim().to_string();
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summarize_rejects_empty_input_before_any_request() {
        let client = NlpClient::new(None).unwrap();
        assert!(matches!(
            client.summarize("   "),
            Err(ServiceError::EmptyInput)
        ));
    }

    #[test]
    fn summarize_rejects_overlong_input_before_any_request() {
        let client = NlpClient::new(None).unwrap();
        let text = "word ".repeat(MAX_SUMMARY_WORDS + 1);
        assert!(matches!(
            client.summarize(&text),
            Err(ServiceError::TooManyWords(n)) if n == MAX_SUMMARY_WORDS + 1
        ));
    }

    #[test]
    fn sentiment_rejects_empty_input_before_any_request() {
        let client = NlpClient::new(None).unwrap();
        assert!(matches!(
            client.sentiment(""),
            Err(ServiceError::EmptyInput)
        ));
    }

    #[test]
    fn fetch_news_rejects_empty_topic_before_any_request() {
        let client = NlpClient::new(None).unwrap();
        assert!(matches!(
            client.fetch_news(" "),
            Err(ServiceError::EmptyInput)
        ));
    }

    #[test]
    fn feed_items_come_from_items_only_with_links() {
        let body = r#"<?xml version="1.0"?>
            <rss version="2.0"><channel>
              <title>"rust" - Google News</title>
              <item><title>First headline</title><link>https://example.com/a</link><pubDate>x</pubDate></item>
              <item><title>Second headline</title></item>
              <item><title>  </title></item>
            </channel></rss>"#;
        let items = parse_feed_items(body);
        assert_eq!(
            items,
            vec![
                NewsItem {
                    title: "First headline".to_string(),
                    link: "https://example.com/a".to_string(),
                },
                NewsItem {
                    title: "Second headline".to_string(),
                    link: String::new(),
                },
            ]
        );
    }

    #[test]
    fn feed_items_cap_at_five_articles() {
        let items: String = (1..=8)
            .map(|n| format!("<item><title>Headline {n}</title><link>https://example.com/{n}</link></item>"))
            .collect();
        let body = format!(r#"<rss version="2.0"><channel><title>feed</title>{items}</channel></rss>"#);
        let parsed = parse_feed_items(&body);
        assert_eq!(parsed.len(), MAX_NEWS_ITEMS);
        assert_eq!(parsed[0].title, "Headline 1");
        assert_eq!(parsed[4].title, "Headline 5");
        assert_eq!(parsed[4].link, "https://example.com/5");
    }

    #[test]
    fn feed_items_of_garbage_body_is_empty() {
        assert!(parse_feed_items("not xml at all").is_empty());
    }

    #[test]
    fn sentiment_response_decodes_both_shapes() {
        let nested: SentimentResponse =
            serde_json::from_str(r#"[[{"label":"POSITIVE","score":0.98}]]"#).unwrap();
        assert!(matches!(nested, SentimentResponse::Nested(_)));

        let flat: SentimentResponse =
            serde_json::from_str(r#"[{"label":"NEGATIVE","score":0.75}]"#).unwrap();
        assert!(matches!(flat, SentimentResponse::Flat(_)));
    }
}
