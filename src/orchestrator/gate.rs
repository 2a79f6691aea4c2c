use serde::{Deserialize, Serialize};

/// Confidence at or above which a result may be applied as-is.
pub const GATE_CONFIRM_THRESHOLD: f64 = 0.9;
/// Floor for the EDIT tier; a caller threshold can only raise it.
pub const GATE_EDIT_THRESHOLD: f64 = 0.7;
/// Confidence at or above which an agent picks between options.
pub const GATE_DECIDE_THRESHOLD: f64 = 0.5;

/// How much human oversight an analysis needs, from least to most.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Gate {
    /// High confidence, safe to auto-apply.
    Confirm,
    /// Good confidence, minor review.
    Edit,
    /// Medium confidence, agent decides.
    Decide,
    /// Low confidence or failed run; needs teaching input.
    Teach,
}

impl Gate {
    /// Map a self-reported confidence to a gate.
    ///
    /// Monotonic in `confidence`. `threshold` only ever tightens EDIT, never
    /// below [`GATE_EDIT_THRESHOLD`].
    pub fn from_confidence(confidence: f64, threshold: f64) -> Self {
        if confidence >= GATE_CONFIRM_THRESHOLD {
            Gate::Confirm
        } else if confidence >= threshold.max(GATE_EDIT_THRESHOLD) {
            Gate::Edit
        } else if confidence >= GATE_DECIDE_THRESHOLD {
            Gate::Decide
        } else {
            Gate::Teach
        }
    }

    /// Get the gate name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Gate::Confirm => "CONFIRM",
            Gate::Edit => "EDIT",
            Gate::Decide => "DECIDE",
            Gate::Teach => "TEACH",
        }
    }

    /// Oversight rank, 0 (CONFIRM) to 3 (TEACH).
    pub fn oversight_level(&self) -> u8 {
        match self {
            Gate::Confirm => 0,
            Gate::Edit => 1,
            Gate::Decide => 2,
            Gate::Teach => 3,
        }
    }
}

impl std::fmt::Display for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Gate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "CONFIRM" => Ok(Gate::Confirm),
            "EDIT" => Ok(Gate::Edit),
            "DECIDE" => Ok(Gate::Decide),
            "TEACH" => Ok(Gate::Teach),
            _ => Err(format!("Unknown gate: {}", s)),
        }
    }
}
