use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, TrackError>;

/// Faults raised by the tracking layer.
///
/// All of these are programming errors: nothing here is retried, and the
/// operations that can fail are synchronous.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackError {
    /// A root [`Tracking`](crate::Tracking) that was never bound to a live
    /// `Rc` instance, or whose instance has been dropped.
    #[error("`{type_name}` is not attached to a live instance; build it with `Rc::new_cyclic` and `Tracking::new`")]
    Detached {
        /// Type of the root instance.
        type_name: &'static str,
    },

    /// A delegate asked for its store while it currently has no owner.
    #[error("`{type_name}` delegates to an owner but none is set")]
    Unowned {
        /// Type of the delegate.
        type_name: &'static str,
    },
}

impl TrackError {
    /// Name of the type the fault was raised for.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Detached { type_name }
            | Self::Unowned { type_name } => type_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_type() {
        let err = TrackError::Detached {
            type_name: "Counter",
        };
        assert!(err.to_string().starts_with("`Counter` is not attached"));
        assert_eq!(err.type_name(), "Counter");

        let err = TrackError::Unowned { type_name: "Nested" };
        assert_eq!(err.to_string(), "`Nested` delegates to an owner but none is set");
        assert_eq!(err.type_name(), "Nested");
    }
}
