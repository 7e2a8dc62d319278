use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::resource::capitalize;

/// The lifecycle verbs every resource kind gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrudVerb {
    Create,
    Delete,
    Start,
    Stop,
    Get,
    Describe,
}

impl CrudVerb {
    pub const ALL: [CrudVerb; 6] = [
        Self::Create,
        Self::Delete,
        Self::Start,
        Self::Stop,
        Self::Get,
        Self::Describe,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Delete => "delete",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Get => "get",
            Self::Describe => "describe",
        }
    }

    /// Verbs that run a task list on the server.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::Create | Self::Delete | Self::Start | Self::Stop
        )
    }

    /// Verbs that name a single resource.
    pub fn takes_name(&self) -> bool {
        !matches!(self, Self::Get)
    }

    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Self::Create => &[],
            Self::Delete => &["rm"],
            Self::Start => &["up"],
            Self::Stop => &["down"],
            Self::Get => &["ls", "list"],
            Self::Describe => &["show"],
        }
    }

    /// "creating", "stopping".
    pub fn present_participle(&self) -> String {
        match self {
            Self::Stop => "stopping".to_string(),
            Self::Get => "getting".to_string(),
            _ => {
                let verb = self.as_str();
                match verb.strip_suffix('e') {
                    Some(stem) => format!("{stem}ing"),
                    None => format!("{verb}ing"),
                }
            }
        }
    }

    /// "created", "stopped".
    pub fn past_participle(&self) -> String {
        match self {
            Self::Stop => "stopped".to_string(),
            Self::Get => "fetched".to_string(),
            _ => {
                let verb = self.as_str();
                if verb.ends_with('e') {
                    format!("{verb}d")
                } else {
                    format!("{verb}ed")
                }
            }
        }
    }

    /// `<Verb>s a <kind> called <name>`.
    pub fn help_for(&self, kind: &str) -> String {
        format!("{}s a {kind} called <name>", capitalize(self.as_str()))
    }
}

impl fmt::Display for CrudVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CrudVerb {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|verb| verb.as_str() == s || verb.aliases().contains(&s))
            .ok_or_else(|| format!("unknown verb: {s}"))
    }
}
