//! Web page loading and HTML text extraction

use async_trait::async_trait;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

use super::error::{IndexError, IndexResult};

/// Title used when a page has none
pub const NO_TITLE: &str = "No title found.";

/// Visible text of a fetched page
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedPage {
    pub url: String,
    pub title: String,
    pub text: String,
}

/// Port for fetching page text
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    async fn load(&self, url: &str) -> IndexResult<LoadedPage>;
}

/// Fetches pages over HTTP and strips markup
pub struct HttpLoader {
    client: reqwest::Client,
}

impl HttpLoader {
    pub fn new(user_agent: &str, timeout_secs: u64) -> IndexResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| IndexError::Network(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl DocumentLoader for HttpLoader {
    async fn load(&self, url: &str) -> IndexResult<LoadedPage> {
        let fetch_error = |message: String| IndexError::Fetch {
            url: url.to_string(),
            message,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_error(format!("HTTP {}", status)));
        }

        let html = response.text().await.map_err(|e| fetch_error(e.to_string()))?;
        Ok(extract_page(url, &html))
    }
}

/// Loader serving fixed pages, for tests and offline seeding
#[derive(Default)]
pub struct StaticLoader {
    pages: HashMap<String, LoadedPage>,
}

impl StaticLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, title: &str, text: &str) -> Self {
        self.pages.insert(
            url.to_string(),
            LoadedPage {
                url: url.to_string(),
                title: title.to_string(),
                text: text.to_string(),
            },
        );
        self
    }
}

#[async_trait]
impl DocumentLoader for StaticLoader {
    async fn load(&self, url: &str) -> IndexResult<LoadedPage> {
        self.pages.get(url).cloned().ok_or_else(|| IndexError::Fetch {
            url: url.to_string(),
            message: "HTTP 404 Not Found".to_string(),
        })
    }
}

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap());

static HIDDEN_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?is)<script\b.*?</script\s*>",
        r"(?is)<style\b.*?</style\s*>",
        r"(?is)<noscript\b.*?</noscript\s*>",
        r"(?is)<head\b.*?</head\s*>",
        r"(?s)<!--.*?-->",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect()
});

static BLOCK_END_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<(br|/p|/div|/h[1-6]|/li|/tr|/section|/article)\b[^>]*>").unwrap()
});

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());

static SPACES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t\r\x0c]+").unwrap());

static BLANK_LINES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n(\s*\n)+").unwrap());

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

/// Pull the title and readable text out of an HTML document
pub fn extract_page(url: &str, html: &str) -> LoadedPage {
    let title = TITLE_RE
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| decode_entities(m.as_str().trim()))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| NO_TITLE.to_string());

    let mut body = html.to_string();
    for hidden in HIDDEN_RES.iter() {
        body = hidden.replace_all(&body, " ").into_owned();
    }
    body = BLOCK_END_RE.replace_all(&body, "\n").into_owned();
    body = TAG_RE.replace_all(&body, " ").into_owned();
    body = decode_entities(&body);
    body = SPACES_RE.replace_all(&body, " ").into_owned();

    let lines: Vec<&str> = body.lines().map(str::trim).collect();
    let text = BLANK_LINES_RE.replace_all(&lines.join("\n"), "\n\n").trim().to_string();

    LoadedPage {
        url: url.to_string(),
        title,
        text,
    }
}
