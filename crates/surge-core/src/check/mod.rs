//! Status-code predicates deciding whether a response counts as a success.

use serde::{Deserialize, Serialize};

/// The expected-status rule applied to every response of a scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StatusCheck {
    /// The status code must equal a specific value.
    Equals { expected: u16 },
    /// The status code must fall within a range (inclusive).
    Range { min: u16, max: u16 },
    /// The status code must be one of the listed values.
    OneOf { allowed: Vec<u16> },
}

impl Default for StatusCheck {
    fn default() -> Self {
        StatusCheck::Equals { expected: 200 }
    }
}

impl StatusCheck {
    /// Evaluate the rule against a received status code.
    ///
    /// The synthetic status 0 used for transport failures never matches.
    pub fn matches(&self, status_code: u16) -> bool {
        if status_code == 0 {
            return false;
        }
        match self {
            StatusCheck::Equals { expected } => status_code == *expected,
            StatusCheck::Range { min, max } => status_code >= *min && status_code <= *max,
            StatusCheck::OneOf { allowed } => allowed.contains(&status_code),
        }
    }

    /// Describe why the rule is unusable, if it is.
    pub fn problem(&self) -> Option<String> {
        match self {
            StatusCheck::Equals { expected } if !(100..=599).contains(expected) => {
                Some(format!("expected status {expected} is not a valid HTTP status"))
            }
            StatusCheck::Range { min, max } if min > max => {
                Some(format!("status range [{min}, {max}] is empty"))
            }
            StatusCheck::OneOf { allowed } if allowed.is_empty() => {
                Some("allowed status list must not be empty".to_string())
            }
            _ => None,
        }
    }

    /// Parse the CLI form: `200`, `200-299` or `200,201,204`.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Some((min, max)) = s.split_once('-') {
            let min = min.trim().parse().ok()?;
            let max = max.trim().parse().ok()?;
            return Some(StatusCheck::Range { min, max });
        }
        if s.contains(',') {
            let allowed = s
                .split(',')
                .map(|part| part.trim().parse::<u16>())
                .collect::<Result<Vec<_>, _>>()
                .ok()?;
            return Some(StatusCheck::OneOf { allowed });
        }
        s.parse().ok().map(|expected| StatusCheck::Equals { expected })
    }
}

impl std::fmt::Display for StatusCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusCheck::Equals { expected } => write!(f, "status is {expected}"),
            StatusCheck::Range { min, max } => write!(f, "status in {min}..={max}"),
            StatusCheck::OneOf { allowed } => {
                let list: Vec<String> = allowed.iter().map(u16::to_string).collect();
                write!(f, "status in [{}]", list.join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_expects_200() {
        let check = StatusCheck::default();
        assert!(check.matches(200));
        assert!(!check.matches(201));
        assert!(!check.matches(500));
    }

    #[test]
    fn range_is_inclusive() {
        let check = StatusCheck::Range { min: 200, max: 299 };
        assert!(check.matches(200));
        assert!(check.matches(299));
        assert!(!check.matches(300));
        assert!(!check.matches(199));
    }

    #[test]
    fn one_of_matches_listed_codes() {
        let check = StatusCheck::OneOf { allowed: vec![200, 204] };
        assert!(check.matches(204));
        assert!(!check.matches(201));
    }

    #[test]
    fn transport_failure_never_matches() {
        let check = StatusCheck::Range { min: 0, max: 599 };
        assert!(!check.matches(0));
    }

    #[test]
    fn problem_detects_unusable_rules() {
        assert!(StatusCheck::Equals { expected: 42 }.problem().is_some());
        assert!(StatusCheck::Range { min: 300, max: 200 }.problem().is_some());
        assert!(StatusCheck::OneOf { allowed: vec![] }.problem().is_some());
        assert!(StatusCheck::default().problem().is_none());
    }

    #[test]
    fn parse_cli_forms() {
        assert_eq!(StatusCheck::parse("204"), Some(StatusCheck::Equals { expected: 204 }));
        assert_eq!(
            StatusCheck::parse("200-299"),
            Some(StatusCheck::Range { min: 200, max: 299 })
        );
        assert_eq!(
            StatusCheck::parse("200, 201"),
            Some(StatusCheck::OneOf { allowed: vec![200, 201] })
        );
        assert_eq!(StatusCheck::parse("ok"), None);
    }

    #[test]
    fn serde_uses_tagged_form() {
        let json = serde_json::to_string(&StatusCheck::default()).unwrap();
        assert_eq!(json, r#"{"type":"equals","expected":200}"#);
        let parsed: StatusCheck =
            serde_json::from_str(r#"{"type":"range","min":200,"max":204}"#).unwrap();
        assert_eq!(parsed, StatusCheck::Range { min: 200, max: 204 });
    }

    #[test]
    fn display_reads_like_a_check_name() {
        assert_eq!(StatusCheck::default().to_string(), "status is 200");
    }
}
