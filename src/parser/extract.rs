use regex::Regex;

use super::lines::PatternSet;

/// Labelled metadata found in a block body. Absent labels are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionFields {
    pub function_code: String,
    pub domain: String,
    pub owner_team: String,
}

pub fn extract_fields(body: &str) -> FunctionFields {
    extract_fields_with(body, PatternSet::customer_function())
}

pub fn extract_fields_with(body: &str, patterns: &PatternSet) -> FunctionFields {
    FunctionFields {
        function_code: first_value(&patterns.function_code, body),
        domain: first_value(&patterns.domain, body),
        owner_team: first_value(&patterns.owner, body),
    }
}

fn first_value(re: &Regex, body: &str) -> String {
    re.captures(body)
        .and_then(|caps| caps.name("value"))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}
