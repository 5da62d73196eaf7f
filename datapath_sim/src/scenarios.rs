//! Walkthrough scenarios for deterministic simulation.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// DP-001: Walk, stand still, walk on
    Dwell,

    /// DP-002: Three media along one walk
    ContentSwitch,

    /// DP-003: One corrupted timestamp in the middle SubPath
    MalformedTimestamp,

    /// DP-004: Path dropped onto rolling terrain
    GroundProjection,

    /// DP-005: Scrubbing back and forth while following
    Scrub,

    /// DP-006: Some video servers unreachable
    MediaOutage,

    /// DP-007: Long noisy random walk
    LongWalk,
}

impl ScenarioId {
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Dwell,
            ScenarioId::ContentSwitch,
            ScenarioId::MalformedTimestamp,
            ScenarioId::GroundProjection,
            ScenarioId::Scrub,
            ScenarioId::MediaOutage,
            ScenarioId::LongWalk,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Dwell => "dwell",
            ScenarioId::ContentSwitch => "content_switch",
            ScenarioId::MalformedTimestamp => "malformed_timestamp",
            ScenarioId::GroundProjection => "ground_projection",
            ScenarioId::Scrub => "scrub",
            ScenarioId::MediaOutage => "media_outage",
            ScenarioId::LongWalk => "long_walk",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Dwell => "Replay waits where the walker stood still and keeps pace with ground truth",
            ScenarioId::ContentSwitch => "Each medium gets its own contiguous SubPath, each followed to its end",
            ScenarioId::MalformedTimestamp => "A bad timestamp disables following on its SubPath only",
            ScenarioId::GroundProjection => "Anchors land on terrain and distances are recomputed",
            ScenarioId::Scrub => "Jumping to a share of the duration lands on the closest recorded point",
            ScenarioId::MediaOutage => "Unreachable videos are dropped; their SubPaths still follow",
            ScenarioId::LongWalk => "Replay of a noisy random walk stays close to ground truth",
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dwell" | "dp-001" => Ok(ScenarioId::Dwell),
            "content_switch" | "contentswitch" | "dp-002" => Ok(ScenarioId::ContentSwitch),
            "malformed_timestamp" | "malformedtimestamp" | "dp-003" => Ok(ScenarioId::MalformedTimestamp),
            "ground_projection" | "groundprojection" | "dp-004" => Ok(ScenarioId::GroundProjection),
            "scrub" | "dp-005" => Ok(ScenarioId::Scrub),
            "media_outage" | "mediaoutage" | "dp-006" => Ok(ScenarioId::MediaOutage),
            "long_walk" | "longwalk" | "dp-007" => Ok(ScenarioId::LongWalk),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}
