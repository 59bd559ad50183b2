//! Provider error taxonomy.
//!
//! Lifecycle operations return `anyhow::Result`; the errors they raise are
//! these variants, so callers can recover them with `downcast_ref`.

use std::fmt;
use std::time::Duration;

use declarative::Violations;
use segment_api::NameError;

/// Errors raised by the reconcilers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A remote call failed with something other than not-found.
    #[error("{kind} {key}: remote call failed")]
    Remote {
        kind: &'static str,
        key: String,
        #[source]
        source: segment_api::Error,
    },

    /// Declared attributes failed structural validation.
    #[error("invalid {kind} {key}:\n{violations}")]
    Validation {
        kind: &'static str,
        key: String,
        violations: Violations,
    },

    /// A schema config change did not show up in time.
    #[error(
        "timeout after waiting {}s for source schema {slug:?} to be modified",
        .waited.as_secs()
    )]
    Timeout { slug: String, waited: Duration },

    /// The caller cancelled a wait.
    #[error("{kind} {key}: cancelled")]
    Cancelled { kind: &'static str, key: String },

    /// A resource name did not have the expected shape.
    #[error(transparent)]
    InvalidName(#[from] NameError),

    /// A tracking plan rule is not valid JSON of the expected shape.
    #[error("invalid {category:?} rules: {message}")]
    InvalidRule {
        category: &'static str,
        message: String,
    },

    /// The tracking plan was removed out of band before an update.
    #[error("tracking plan {id:?} no longer exists")]
    TrackingPlanGone { id: String },

    /// A user-supplied import identifier has the wrong shape.
    #[error("invalid {kind} import id {id:?}: expected {expected}")]
    ImportId {
        kind: &'static str,
        id: String,
        expected: &'static str,
    },
}

impl Error {
    /// Wrap a failed remote call with the resource kind and its key.
    pub fn remote(kind: &'static str, key: impl fmt::Display, source: segment_api::Error) -> Self {
        Self::Remote {
            kind,
            key: key.to_string(),
            source,
        }
    }

    /// Wrap validation failures with the resource kind and its key.
    pub fn validation(kind: &'static str, key: impl fmt::Display, violations: Violations) -> Self {
        Self::Validation {
            kind,
            key: key.to_string(),
            violations,
        }
    }
}

/// `map_err` adapter for remote calls.
pub fn remote(
    kind: &'static str,
    key: impl fmt::Display,
) -> impl FnOnce(segment_api::Error) -> Error {
    move |source| Error::remote(kind, key, source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use segment_api::ApiError;
    use std::error::Error as _;

    #[test]
    fn test_remote_error_names_kind_and_key() {
        let err = remote("segment_source", "ios")(ApiError::new(500, "boom").into());
        assert_eq!(err.to_string(), "segment_source ios: remote call failed");
        assert!(err.source().unwrap().to_string().contains("boom"));
    }

    #[test]
    fn test_validation_lists_violations() {
        let violations = Violations::from(vec!["first".to_string(), "second".to_string()]);
        let err = Error::validation("segment_destination_filter", "df_1", violations);
        let text = err.to_string();
        assert!(text.contains("segment_destination_filter df_1"));
        assert!(text.contains("- first\n- second"));
    }

    #[test]
    fn test_timeout_message() {
        let err = Error::Timeout {
            slug: "ios".into(),
            waited: Duration::from_secs(60),
        };
        assert_eq!(
            err.to_string(),
            "timeout after waiting 60s for source schema \"ios\" to be modified"
        );
    }

    #[test]
    fn test_downcast_through_anyhow() {
        let err: anyhow::Error = Error::TrackingPlanGone { id: "rs_1".into() }.into();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::TrackingPlanGone { .. })
        ));
    }
}
