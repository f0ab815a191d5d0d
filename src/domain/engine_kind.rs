use serde::{Deserialize, Serialize};

/// The closed set of analysis capabilities an artifact can be routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EngineKind {
    /// Detonation sandbox (dynamic behavioral analysis)
    Sandbox,
    /// Static analyzer (unpacking, manifest and code inspection)
    StaticScan,
    /// Reputation database (multi-scanner verdict lookup)
    Reputation,
}

impl EngineKind {
    /// All engine kinds, in deterministic order
    pub const ALL: [EngineKind; 3] = [
        EngineKind::Sandbox,
        EngineKind::StaticScan,
        EngineKind::Reputation,
    ];

    /// Stable string form used in config tables and log lines
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Sandbox => "sandbox",
            EngineKind::StaticScan => "static-scan",
            EngineKind::Reputation => "reputation",
        }
    }
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sandbox" => Ok(EngineKind::Sandbox),
            "static-scan" | "static_scan" | "static" => Ok(EngineKind::StaticScan),
            "reputation" => Ok(EngineKind::Reputation),
            other => Err(format!("unknown engine kind: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_str() {
        for kind in EngineKind::ALL {
            assert_eq!(kind.as_str().parse::<EngineKind>(), Ok(kind));
        }
    }

    #[test]
    fn serde_uses_kebab_case() {
        let json = serde_json::to_string(&EngineKind::StaticScan).unwrap();
        assert_eq!(json, "\"static-scan\"");
    }
}
