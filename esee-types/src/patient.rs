//! Patient request and refraction result structures

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Patient details supplied by the caller for one exchange.
///
/// Only `id` is transmitted to the device; the descriptive fields are
/// accepted so callers can post their full patient record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientRequest {
    /// Patient identifier sent to the device as raw ASCII
    pub id: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub age: Option<u32>,

    #[serde(default)]
    pub gender: Option<String>,
}

impl PatientRequest {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Check that the identifier can be sent to the device.
    ///
    /// The device protocol carries the id as plain ASCII with no framing, so
    /// an empty id or one with non-ASCII characters is rejected up front.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::Validation("patient id must not be empty".into()));
        }
        if !self.id.is_ascii() {
            return Err(Error::Validation(format!(
                "patient id must be ASCII: {:?}",
                self.id
            )));
        }
        Ok(())
    }

    /// Bytes written to the device
    pub fn wire_id(&self) -> &[u8] {
        self.id.as_bytes()
    }
}

/// One refraction test as printed by the device.
///
/// All values are kept exactly as the device formatted them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub test_number: String,
    pub sphere: String,
    pub cylinder: String,
    pub axis: String,
    pub spherical_equivalent: String,
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} SPH {} CYL {} AX {} SE {}",
            self.test_number, self.sphere, self.cylinder, self.axis, self.spherical_equivalent
        )
    }
}

/// Structured form of a device report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientResult {
    /// Patient id echoed by the device
    pub patient_id: Option<String>,

    /// Diagnosis date/time printed on the report
    pub diag_date: Option<NaiveDateTime>,

    /// Right eye (OD) tests in report order
    pub right_eye_results: Vec<TestResult>,

    /// Left eye (OS) tests in report order
    pub left_eye_results: Vec<TestResult>,

    pub device_name: Option<String>,

    pub device_serial_number: Option<String>,
}

impl PatientResult {
    /// True when the report yielded no field at all
    pub fn is_empty(&self) -> bool {
        self.patient_id.is_none()
            && self.diag_date.is_none()
            && self.right_eye_results.is_empty()
            && self.left_eye_results.is_empty()
            && self.device_name.is_none()
            && self.device_serial_number.is_none()
    }
}

impl fmt::Display for PatientResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Result[ID: {}, OD: {} tests, OS: {} tests]",
            self.patient_id.as_deref().unwrap_or("-"),
            self.right_eye_results.len(),
            self.left_eye_results.len()
        )
    }
}
