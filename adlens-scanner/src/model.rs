use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TargetKind {
    Age,
    MinAge,
    MaxAge,
    Gender,
    Region,
    City,
    State,
    Retargeting,
    Interest,
    Segment,
    Language,
    Like,
    List,
    Website,
    Agency,
    Employer,
    Activity,
    EngagedWithContent,
    Advertiser,
    Unknown,
}

impl TargetKind {
    pub const ALL: [TargetKind; 20] = [
        TargetKind::Age,
        TargetKind::MinAge,
        TargetKind::MaxAge,
        TargetKind::Gender,
        TargetKind::Region,
        TargetKind::City,
        TargetKind::State,
        TargetKind::Retargeting,
        TargetKind::Interest,
        TargetKind::Segment,
        TargetKind::Language,
        TargetKind::Like,
        TargetKind::List,
        TargetKind::Website,
        TargetKind::Agency,
        TargetKind::Employer,
        TargetKind::Activity,
        TargetKind::EngagedWithContent,
        TargetKind::Advertiser,
        TargetKind::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Age => "Age",
            TargetKind::MinAge => "MinAge",
            TargetKind::MaxAge => "MaxAge",
            TargetKind::Gender => "Gender",
            TargetKind::Region => "Region",
            TargetKind::City => "City",
            TargetKind::State => "State",
            TargetKind::Retargeting => "Retargeting",
            TargetKind::Interest => "Interest",
            TargetKind::Segment => "Segment",
            TargetKind::Language => "Language",
            TargetKind::Like => "Like",
            TargetKind::List => "List",
            TargetKind::Website => "Website",
            TargetKind::Agency => "Agency",
            TargetKind::Employer => "Employer",
            TargetKind::Activity => "Activity on the Facebook Family",
            TargetKind::EngagedWithContent => "Engaged with Content",
            TargetKind::Advertiser => "Advertiser",
            TargetKind::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetKind {
    type Err = std::convert::Infallible;

    /// Labels that are not recognised map to `Unknown` rather than failing,
    /// so stored rows from newer versions still load.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(TargetKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .unwrap_or(TargetKind::Unknown))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    #[serde(rename = "target")]
    pub kind: TargetKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment: Option<String>,
}

impl Target {
    pub fn new(kind: TargetKind) -> Self {
        Self {
            kind,
            segment: None,
        }
    }

    pub fn with_segment(kind: TargetKind, segment: impl Into<String>) -> Self {
        Self {
            kind,
            segment: Some(segment.into()),
        }
    }
}

/// Opaque ad identifier pulled out of the host UI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identifier {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for Identifier {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Result of the targeting grammar for one disclosure panel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disclosure {
    pub advertiser: Option<String>,
    pub targets: Vec<Target>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdRecord {
    pub title: Option<String>,
    pub message: String,
    /// Never populated: the host does not expose who paid for an ad.
    pub paid_for_by: Option<String>,
    pub page: Option<String>,
    /// Capture time, milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub id: Option<Identifier>,
    pub advertiser: Option<String>,
    pub targets: Vec<Target>,
}

impl AdRecord {
    pub fn new(timestamp: i64) -> Self {
        Self {
            title: None,
            message: String::new(),
            paid_for_by: None,
            page: None,
            timestamp,
            id: None,
            advertiser: None,
            targets: Vec::new(),
        }
    }

    pub fn attach_disclosure(&mut self, disclosure: Disclosure) {
        self.advertiser = disclosure.advertiser;
        self.targets = disclosure.targets;
    }

    pub fn has_targeting(&self) -> bool {
        !self.targets.is_empty()
    }
}
