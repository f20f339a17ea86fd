// Keepsake
// Copyright (c) 2024 The Project Keepsake Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Anomalies, limitations, and the severity scale used to judge them.
//!
//! Every format family publishes a static table of the [`SevereElement`]s its parser may record.
//! Parsers attach elements to an [`Anomalies`] collection as they find them and never decide what
//! the elements mean for the file. That decision is made afterwards by
//! [`PreservationLevel::evaluate`], which consults a [`SeverityLookup`].

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use log::debug;
use serde::{Deserialize, Serialize};

/// The severity of an anomaly or limitation, from least to most severe.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// The severity has not been determined. It never downgrades a file.
    Unknown,
    /// Worth noting, but does not affect how the file is preserved.
    Note,
    /// Must be reported to the depositor, but does not affect how the file is preserved.
    Report,
    /// The file may only be preserved at the bit level.
    Bit,
    /// The file must be rejected.
    Reject,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match *self {
            Severity::Unknown => "unknown",
            Severity::Note => "note",
            Severity::Report => "report",
            Severity::Bit => "bit",
            Severity::Reject => "reject",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "unknown" => Ok(Severity::Unknown),
            "note" => Ok(Severity::Note),
            "report" => Ok(Severity::Report),
            "bit" => Ok(Severity::Bit),
            "reject" => Ok(Severity::Reject),
            _ => Err("unrecognized severity"),
        }
    }
}

/// Distinguishes structural problems from recognized-but-unsupported variants.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    /// A structural deviation from the format's grammar.
    Anomaly,
    /// A recognized variant that cannot be fully characterized.
    Limitation,
}

/// An entry in a format family's catalog.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct SevereElement {
    pub code: &'static str,
    pub kind: ElementKind,
    pub severity: Severity,
    pub description: &'static str,
}

impl SevereElement {
    pub const fn anomaly(code: &'static str, severity: Severity, description: &'static str) -> Self {
        SevereElement { code, kind: ElementKind::Anomaly, severity, description }
    }

    pub const fn limitation(
        code: &'static str,
        severity: Severity,
        description: &'static str,
    ) -> Self {
        SevereElement { code, kind: ElementKind::Limitation, severity, description }
    }
}

impl fmt::Display for SevereElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.code, self.severity, self.description)
    }
}

/// Checks that a catalog never reuses a code. Returns the first duplicated code.
pub fn find_duplicate_code(catalog: &[SevereElement]) -> Option<&'static str> {
    catalog
        .iter()
        .enumerate()
        .find(|(i, el)| catalog[..*i].iter().any(|prev| prev.code == el.code))
        .map(|(_, el)| el.code)
}

/// A code to severity vocabulary.
pub trait SeverityLookup {
    /// Returns the severity the archive assigns to `element`.
    fn severity_of(&self, element: &SevereElement) -> Severity;
}

/// Uses the severity each catalog entry was declared with.
#[derive(Copy, Clone, Debug, Default)]
pub struct CatalogSeverity;

impl SeverityLookup for CatalogSeverity {
    fn severity_of(&self, element: &SevereElement) -> Severity {
        element.severity
    }
}

/// Severities configured by the archive, layered over the catalog's own.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct SeverityOverrides {
    overrides: HashMap<String, Severity>,
}

impl SeverityOverrides {
    pub fn new() -> Self {
        Default::default()
    }

    /// Overrides the severity of the element with the given code.
    pub fn insert(&mut self, code: &str, severity: Severity) {
        self.overrides.insert(code.to_string(), severity);
    }

    pub fn len(&self) -> usize {
        self.overrides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }
}

impl SeverityLookup for SeverityOverrides {
    fn severity_of(&self, element: &SevereElement) -> Severity {
        self.overrides.get(element.code).copied().unwrap_or(element.severity)
    }
}

/// The ordered set of anomalies and limitations recorded while parsing one file.
///
/// Each code is recorded at most once, in the order it was first seen.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Anomalies {
    anomalies: Vec<SevereElement>,
    limitations: Vec<SevereElement>,
}

impl Anomalies {
    pub fn new() -> Self {
        Default::default()
    }

    /// Records an element. Returns `false` if it had already been recorded.
    pub fn add(&mut self, element: SevereElement) -> bool {
        let list = match element.kind {
            ElementKind::Anomaly => &mut self.anomalies,
            ElementKind::Limitation => &mut self.limitations,
        };

        if list.iter().any(|el| el.code == element.code) {
            return false;
        }

        debug!("recorded {}", element);
        list.push(element);
        true
    }

    pub fn anomalies(&self) -> &[SevereElement] {
        &self.anomalies
    }

    pub fn limitations(&self) -> &[SevereElement] {
        &self.limitations
    }

    /// Returns `true` if an element with `code` was recorded.
    pub fn contains(&self, code: &str) -> bool {
        self.iter().any(|el| el.code == code)
    }

    /// Iterates over the anomalies followed by the limitations.
    pub fn iter(&self) -> impl Iterator<Item = &SevereElement> {
        self.anomalies.iter().chain(self.limitations.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.anomalies.is_empty() && self.limitations.is_empty()
    }

    /// Returns the worst severity recorded, if anything was recorded.
    pub fn worst(&self, lookup: &dyn SeverityLookup) -> Option<Severity> {
        self.iter().map(|el| lookup.severity_of(el)).max()
    }
}

/// The fidelity at which a file can be preserved.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PreservationLevel {
    /// Full technical metadata is trusted.
    Full,
    /// Only the bits are preserved.
    Bit,
    /// The file is rejected.
    Reject,
}

impl PreservationLevel {
    /// Reduces the recorded anomalies and limitations to a preservation level.
    ///
    /// The worst severity decides: `reject` rejects the file and `bit` downgrades it. Any recorded
    /// limitation downgrades the file to bit-level preservation at least.
    pub fn evaluate(anomalies: &Anomalies, lookup: &dyn SeverityLookup) -> PreservationLevel {
        let level = match anomalies.worst(lookup) {
            Some(Severity::Reject) => PreservationLevel::Reject,
            Some(Severity::Bit) => PreservationLevel::Bit,
            _ => PreservationLevel::Full,
        };

        if anomalies.limitations().is_empty() {
            level
        }
        else {
            level.max(PreservationLevel::Bit)
        }
    }
}

impl fmt::Display for PreservationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            PreservationLevel::Full => f.write_str("full"),
            PreservationLevel::Bit => f.write_str("bit"),
            PreservationLevel::Reject => f.write_str("reject"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOTE: SevereElement = SevereElement::anomaly("A_TEST_NOTE", Severity::Note, "note");
    const REPORT: SevereElement = SevereElement::anomaly("A_TEST_REPORT", Severity::Report, "report");
    const LIMIT: SevereElement =
        SevereElement::limitation("L_TEST_UNSUPPORTED", Severity::Bit, "unsupported");

    #[test]
    fn verify_severity_order() {
        assert!(Severity::Note < Severity::Report);
        assert!(Severity::Report < Severity::Bit);
        assert!(Severity::Bit < Severity::Reject);
        assert!(Severity::Unknown < Severity::Note);
        assert_eq!("REJECT".parse::<Severity>(), Ok(Severity::Reject));
        assert!("fatal".parse::<Severity>().is_err());
    }

    #[test]
    fn verify_ordered_and_deduplicated() {
        let mut anomalies = Anomalies::new();
        assert!(anomalies.add(REPORT));
        assert!(anomalies.add(NOTE));
        assert!(!anomalies.add(REPORT));
        assert!(anomalies.add(LIMIT));

        let codes: Vec<_> = anomalies.anomalies().iter().map(|el| el.code).collect();
        assert_eq!(codes, ["A_TEST_REPORT", "A_TEST_NOTE"]);
        assert_eq!(anomalies.limitations().len(), 1);
        assert!(anomalies.contains("L_TEST_UNSUPPORTED"));
    }

    #[test]
    fn verify_preservation_level() {
        let mut anomalies = Anomalies::new();
        assert_eq!(PreservationLevel::evaluate(&anomalies, &CatalogSeverity), PreservationLevel::Full);

        anomalies.add(NOTE);
        anomalies.add(REPORT);
        assert_eq!(PreservationLevel::evaluate(&anomalies, &CatalogSeverity), PreservationLevel::Full);

        let mut overrides = SeverityOverrides::new();
        overrides.insert("A_TEST_NOTE", Severity::Reject);
        assert_eq!(PreservationLevel::evaluate(&anomalies, &overrides), PreservationLevel::Reject);

        anomalies.add(LIMIT);
        assert_eq!(PreservationLevel::evaluate(&anomalies, &CatalogSeverity), PreservationLevel::Bit);

        // A limitation overridden down to a note still downgrades.
        let mut overrides = SeverityOverrides::new();
        overrides.insert("L_TEST_UNSUPPORTED", Severity::Note);
        assert_eq!(PreservationLevel::evaluate(&anomalies, &overrides), PreservationLevel::Bit);
    }

    #[test]
    fn verify_overrides_from_json() {
        let overrides: SeverityOverrides =
            serde_json::from_str(r#"{ "A_TEST_REPORT": "bit" }"#).unwrap();
        assert_eq!(overrides.severity_of(&REPORT), Severity::Bit);
        assert_eq!(overrides.severity_of(&NOTE), Severity::Note);
    }

    #[test]
    fn verify_duplicate_detection() {
        assert_eq!(find_duplicate_code(&[NOTE, REPORT, LIMIT]), None);
        assert_eq!(find_duplicate_code(&[NOTE, REPORT, NOTE]), Some("A_TEST_NOTE"));
    }
}
