//! Three-way result of a control request

use crate::control::ControlError;

/// Result of a get/set exchange
///
/// `Rejected` means the device answered with an error message (for example
/// a lock held by someone else); `Failure` means no valid answer arrived at
/// all. Callers frequently branch on the difference.
#[derive(Debug)]
pub enum Outcome<T> {
    Ok(T),
    Rejected(String),
    Failure(ControlError),
}

impl<T> Outcome<T> {
    /// Numeric form: 1 ok, 0 rejected, -1 failure
    pub fn code(&self) -> i32 {
        match self {
            Outcome::Ok(_) => 1,
            Outcome::Rejected(_) => 0,
            Outcome::Failure(_) => -1,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Ok(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Outcome::Rejected(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure(_))
    }

    /// The value, discarding the reason for a non-ok outcome
    pub fn ok(self) -> Option<T> {
        match self {
            Outcome::Ok(value) => Some(value),
            _ => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Outcome::Ok(value) => Outcome::Ok(f(value)),
            Outcome::Rejected(msg) => Outcome::Rejected(msg),
            Outcome::Failure(e) => Outcome::Failure(e),
        }
    }

    pub fn and_then<U, F: FnOnce(T) -> Outcome<U>>(self, f: F) -> Outcome<U> {
        match self {
            Outcome::Ok(value) => f(value),
            Outcome::Rejected(msg) => Outcome::Rejected(msg),
            Outcome::Failure(e) => Outcome::Failure(e),
        }
    }
}

impl<T> From<ControlError> for Outcome<T> {
    fn from(e: ControlError) -> Self {
        Outcome::Failure(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(Outcome::Ok(()).code(), 1);
        assert_eq!(Outcome::<()>::Rejected("ERROR: lock".into()).code(), 0);
        assert_eq!(Outcome::<()>::Failure(ControlError::NoDevice).code(), -1);
    }

    #[test]
    fn test_map_preserves_kind() {
        let ok = Outcome::Ok("42".to_string()).map(|s| s.len());
        assert!(matches!(ok, Outcome::Ok(2)));

        let rejected = Outcome::<String>::Rejected("no".into()).map(|s| s.len());
        assert!(rejected.is_rejected());

        let failed = Outcome::<String>::Failure(ControlError::NoDevice).map(|s| s.len());
        assert!(failed.is_failure());
    }

    #[test]
    fn test_and_then_chains() {
        let chained = Outcome::Ok(1).and_then(|v| Outcome::Ok(v + 1));
        assert_eq!(chained.ok(), Some(2));

        let stopped: Outcome<i32> =
            Outcome::<i32>::Rejected("busy".into()).and_then(|_| panic!("not reached"));
        assert!(stopped.is_rejected());

        let from_error: Outcome<()> = ControlError::NoDevice.into();
        assert!(!from_error.is_ok());
    }
}
