//! Destroy verification results
//!
//! After a destroy, every reference that was tracked must read back as
//! absent. Anything else, including a failed read, is a failure: a transport
//! error says nothing about whether the object is gone.

use std::fmt;

use crate::model::ObjectRef;

/// Why a reference failed verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationCondition {
    /// The object still exists on the authority
    StillPresent,
    /// The read did not complete, so absence could not be confirmed
    ReadFailed(String),
}

impl fmt::Display for VerificationCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationCondition::StillPresent => f.write_str("object remains"),
            VerificationCondition::ReadFailed(e) => write!(f, "read failed: {}", e),
        }
    }
}

/// One reference that failed verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationFailure {
    pub reference: ObjectRef,
    pub condition: VerificationCondition,
}

/// Outcome of checking a set of references for absence
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationReport {
    /// Number of references checked
    pub checked: usize,
    /// References that did not resolve to absent
    pub failures: Vec<VerificationFailure>,
}

impl VerificationReport {
    /// True when every checked reference is absent
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Convert into an error when any reference failed
    pub fn into_result(self) -> crate::Result<Self> {
        if self.is_clean() {
            Ok(self)
        } else {
            Err(crate::Error::VerificationFailed(self.to_string()))
        }
    }

    pub(crate) fn record(&mut self, reference: &ObjectRef, condition: VerificationCondition) {
        self.failures.push(VerificationFailure {
            reference: reference.clone(),
            condition,
        });
    }
}

impl fmt::Display for VerificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_clean() {
            return write!(f, "{} object(s) verified absent", self.checked);
        }
        write!(
            f,
            "{} of {} object(s) not absent:",
            self.failures.len(),
            self.checked
        )?;
        for failure in &self.failures {
            write!(f, " object with ID '{}': {};", failure.reference, failure.condition)?;
        }
        Ok(())
    }
}
