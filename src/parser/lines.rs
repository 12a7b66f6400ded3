use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

// Parent functions only: exactly two numeric levels ("3.2"), so "3.2.1 ..." sub-items stay body text.
static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<number>\d+\.\d+)\s+(?P<title>.*)\((?P<id>(?i:CF-[A-Z0-9_]+-v\d+))\)").unwrap()
});
static FUNCTION_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i:function code):[ \t]*(?P<value>.*)").unwrap());
static DOMAIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i:domain):[ \t]*(?P<value>.*)").unwrap());
static OWNER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i:logical owner):[ \t]*(?P<value>.*)").unwrap());

static CUSTOMER_FUNCTION: LazyLock<PatternSet> = LazyLock::new(|| PatternSet {
    heading: HEADING_RE.clone(),
    function_code: FUNCTION_CODE_RE.clone(),
    domain: DOMAIN_RE.clone(),
    owner: OWNER_RE.clone(),
});

const HEADING_GROUPS: &[&str] = &["number", "title", "id"];
const FIELD_GROUPS: &[&str] = &["value"];

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("invalid {name} pattern: {source}")]
    Compile {
        name: &'static str,
        #[source]
        source: regex::Error,
    },
    #[error("{name} pattern is missing named group `{group}`")]
    MissingGroup { name: &'static str, group: &'static str },
}

/// A parsed heading line: `<number> <title> (<id>)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingMatch {
    pub number: String,
    pub title: String,
    pub function_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line<'a> {
    Heading(HeadingMatch),
    Text(&'a str),
}

/// Decides whether a raw line opens a new block.
pub trait LineClassifier {
    fn classify<'a>(&self, line: &'a str) -> Line<'a>;
}

/// The named patterns of one document dialect.
///
/// The heading pattern must expose `number`, `title` and `id` groups; the three
/// field patterns must expose a `value` group.
#[derive(Debug, Clone)]
pub struct PatternSet {
    pub heading: Regex,
    pub function_code: Regex,
    pub domain: Regex,
    pub owner: Regex,
}

impl PatternSet {
    pub fn new(
        heading: &str,
        function_code: &str,
        domain: &str,
        owner: &str,
    ) -> Result<Self, PatternError> {
        Ok(Self {
            heading: compile("heading", heading, HEADING_GROUPS)?,
            function_code: compile("function code", function_code, FIELD_GROUPS)?,
            domain: compile("domain", domain, FIELD_GROUPS)?,
            owner: compile("logical owner", owner, FIELD_GROUPS)?,
        })
    }

    /// Customer-function specifications: `3.2 Exterior Lighting Control (CF-EXTLIGHT-v1)`.
    pub fn customer_function() -> &'static PatternSet {
        &CUSTOMER_FUNCTION
    }
}

impl LineClassifier for PatternSet {
    fn classify<'a>(&self, line: &'a str) -> Line<'a> {
        let trimmed = line.trim();
        match self.heading.captures(trimmed) {
            Some(caps) => {
                // Groups are validated to exist, but an optional one may not take part.
                let group = |name: &str| caps.name(name).map_or("", |m| m.as_str());
                Line::Heading(HeadingMatch {
                    number: group("number").to_string(),
                    title: group("title").trim().to_string(),
                    function_id: group("id").to_string(),
                })
            }
            None => Line::Text(trimmed),
        }
    }
}

fn compile(
    name: &'static str,
    pattern: &str,
    groups: &[&'static str],
) -> Result<Regex, PatternError> {
    let re = Regex::new(pattern).map_err(|source| PatternError::Compile { name, source })?;
    for &group in groups {
        if !re.capture_names().flatten().any(|n| n == group) {
            return Err(PatternError::MissingGroup { name, group });
        }
    }
    Ok(re)
}
