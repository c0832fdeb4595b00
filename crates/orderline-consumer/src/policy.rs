//! Settlement rules for failed deliveries.

use std::str::FromStr;

/// Default ceiling on deliveries of a message whose handler keeps failing.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// What happens to a message whose body cannot be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseFailureAction {
    /// Negatively acknowledge without requeue. The message is gone.
    #[default]
    Drop,
    /// Move the message to dead-letter storage for inspection.
    DeadLetter,
}

impl FromStr for ParseFailureAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drop" => Ok(Self::Drop),
            "dead_letter" | "dead-letter" => Ok(Self::DeadLetter),
            other => Err(format!(
                "unknown parse failure action `{other}`, expected `drop` or `dead_letter`"
            )),
        }
    }
}

/// How a consumer settles deliveries that could not be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryPolicy {
    /// Deliveries after which a failing message is dead-lettered instead of
    /// requeued. `None` requeues forever.
    pub max_attempts: Option<u32>,
    /// Disposal of undecodable messages.
    pub on_parse_failure: ParseFailureAction,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Some(DEFAULT_MAX_ATTEMPTS),
            on_parse_failure: ParseFailureAction::default(),
        }
    }
}

impl DeliveryPolicy {
    /// Builds a policy from an attempt ceiling where `0` means unbounded.
    #[must_use]
    pub fn new(max_attempts: u32, on_parse_failure: ParseFailureAction) -> Self {
        Self {
            max_attempts: (max_attempts > 0).then_some(max_attempts),
            on_parse_failure,
        }
    }

    /// Requeue forever and drop undecodable messages.
    #[must_use]
    pub fn unbounded() -> Self {
        Self::new(0, ParseFailureAction::Drop)
    }

    /// Whether a message that failed on its `delivery_count`-th delivery has
    /// used up its attempts.
    #[must_use]
    pub fn exhausted(&self, delivery_count: u32) -> bool {
        self.max_attempts
            .is_some_and(|max| delivery_count >= max)
    }
}
