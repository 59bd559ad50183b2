//! Aggregated validation errors.

/// Every problem found while validating a declared resource.
///
/// Validation collects all violations instead of stopping at the first, so
/// one run reports everything that needs fixing.
#[derive(Debug, Clone, Default, PartialEq, Eq, thiserror::Error)]
#[error("{}", render(.0))]
pub struct Violations(Vec<String>);

fn render(messages: &[String]) -> String {
    messages
        .iter()
        .map(|message| format!("- {message}"))
        .collect::<Vec<_>>()
        .join("\n")
}

impl Violations {
    /// Create an empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a violation
    pub fn push(&mut self, message: impl Into<String>) {
        self.0.push(message.into());
    }

    /// Record every violation of another collection
    pub fn extend(&mut self, other: Self) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Messages in the order they were recorded
    pub fn messages(&self) -> &[String] {
        &self.0
    }

    /// `Ok(())` if nothing was recorded, `Err(self)` otherwise
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl From<Vec<String>> for Violations {
    fn from(messages: Vec<String>) -> Self {
        Self(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_ok() {
        assert!(Violations::new().into_result().is_ok());
    }

    #[test]
    fn test_display_lists_every_violation() {
        let mut violations = Violations::new();
        violations.push("first");
        violations.extend(Violations::from(vec!["second".to_string()]));
        assert_eq!(violations.len(), 2);
        assert_eq!(violations.to_string(), "- first\n- second");
        assert!(violations.into_result().is_err());
    }
}
