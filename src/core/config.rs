use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings a processor is constructed with.
///
/// `time_out` is in milliseconds. A positive value bounds the wall-clock time
/// a conversion may spend rendering; zero or a negative value disables the
/// bound.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorSettings {
    #[serde(rename = "TimeOut", alias = "time_out", default)]
    pub time_out: i64,
}

impl ProcessorSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_time_out(mut self, time_out_ms: i64) -> Self {
        self.time_out = time_out_ms;
        self
    }

    /// The enforced render bound, if any.
    pub fn timeout(&self) -> Option<Duration> {
        u64::try_from(self.time_out)
            .ok()
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    pub fn from_json(content: &str) -> serde_json::Result<Self> {
        serde_json::from_str(content)
    }
}

/// Input formats a processor can be bound to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DataType {
    #[serde(rename = "Hl7v2")]
    Hl7v2,
    #[serde(rename = "Ccda")]
    Ccda,
}

impl DataType {
    /// Conventional name of the template directory for this format.
    pub fn template_directory_name(&self) -> &'static str {
        match self {
            DataType::Hl7v2 => "Hl7v2",
            DataType::Ccda => "Ccda",
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataType::Hl7v2 => write!(f, "HL7v2"),
            DataType::Ccda => write!(f, "C-CDA"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_only_for_positive_values() {
        assert_eq!(ProcessorSettings::default().timeout(), None);
        assert_eq!(ProcessorSettings::new().with_time_out(0).timeout(), None);
        assert_eq!(ProcessorSettings::new().with_time_out(-1).timeout(), None);
        assert_eq!(
            ProcessorSettings::new().with_time_out(1500).timeout(),
            Some(Duration::from_millis(1500))
        );
    }

    #[test]
    fn test_settings_from_json() {
        let settings = ProcessorSettings::from_json(r#"{"TimeOut": 250}"#).unwrap();
        assert_eq!(settings.time_out, 250);

        let settings = ProcessorSettings::from_json(r#"{"time_out": -5}"#).unwrap();
        assert_eq!(settings.timeout(), None);

        let settings = ProcessorSettings::from_json("{}").unwrap();
        assert_eq!(settings, ProcessorSettings::default());
    }
}
