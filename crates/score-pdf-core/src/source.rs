//! Validated source URLs and the score job they belong to.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

/// Scheme, then a domain, `localhost` or dotted-quad IP, optional port, and
/// either no path, a bare `/`, or a `/`/`?` followed by non-whitespace.
#[allow(clippy::expect_used)] // Pattern is a literal, covered by tests
static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)^(?:http|ftp)s?://",
        r"(?:(?:[A-Z0-9](?:[A-Z0-9-]{0,61}[A-Z0-9])?\.)+(?:[A-Z]{2,6}\.?|[A-Z0-9-]{2,}\.?)",
        r"|localhost",
        r"|[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3})",
        r"(?::[0-9]+)?",
        r"(?:/?|[/?]\S+)$",
    ))
    .expect("URL pattern is valid")
});

/// A score page URL that passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceUrl(String);

impl SourceUrl {
    /// Validate `url` against the accepted URL grammar.
    pub fn parse(url: &str) -> Result<Self> {
        if URL_PATTERN.is_match(url) {
            Ok(Self(url.to_string()))
        } else {
            Err(Error::InvalidSourceUrl(url.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for SourceUrl {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for SourceUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for SourceUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One score to scrape: its viewer pages plus naming metadata.
#[derive(Debug, Clone)]
pub struct ScoreJob {
    sources: Vec<SourceUrl>,
    title: String,
    composer: String,
}

impl ScoreJob {
    pub fn new(
        sources: Vec<SourceUrl>,
        title: impl Into<String>,
        composer: impl Into<String>,
    ) -> Result<Self> {
        let title = title.into();
        let composer = composer.into();

        if sources.is_empty() {
            return Err(Error::InvalidJob("at least one source URL is required".into()));
        }
        if title.trim().is_empty() {
            return Err(Error::InvalidJob("title must not be empty".into()));
        }
        if composer.trim().is_empty() {
            return Err(Error::InvalidJob("composer must not be empty".into()));
        }

        Ok(Self {
            sources,
            title,
            composer,
        })
    }

    /// Validate raw URL strings and build a job; fails on the first bad URL.
    pub fn from_urls<S: AsRef<str>>(
        urls: &[S],
        title: impl Into<String>,
        composer: impl Into<String>,
    ) -> Result<Self> {
        let sources = urls
            .iter()
            .map(|u| SourceUrl::parse(u.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Self::new(sources, title, composer)
    }

    pub fn sources(&self) -> &[SourceUrl] {
        &self.sources
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn composer(&self) -> &str {
        &self.composer
    }

    /// `"{composer} - {title}.pdf"`, both used verbatim.
    pub fn output_file_name(&self) -> String {
        format!("{} - {}.pdf", self.composer, self.title)
    }
}
