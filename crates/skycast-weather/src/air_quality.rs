//! Air quality analysis from raw pollutant concentrations.
//!
//! The provider normally reports its own AQI; when it does not, the index is
//! derived from the per-pollutant thresholds below.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::types::PollutionReading;

/// Concentration thresholds in µg/m³. NO and NH3 have none and never raise
/// the index.
pub const THRESHOLDS: [(&str, f64); 6] = [
    ("co", 9400.0),
    ("no2", 150.0),
    ("o3", 140.0),
    ("so2", 250.0),
    ("pm2_5", 50.0),
    ("pm10", 100.0),
];

/// Above `threshold * SEVERE_FACTOR` a pollutant alone means AQI 5
const SEVERE_FACTOR: f64 = 1.5;

pub fn threshold_for(component: &str) -> Option<f64> {
    THRESHOLDS
        .iter()
        .find(|(code, _)| *code == component)
        .map(|(_, limit)| *limit)
}

/// The threshold table as a map, for presentation layers.
pub fn threshold_table() -> BTreeMap<String, f64> {
    THRESHOLDS
        .iter()
        .map(|(code, limit)| (code.to_string(), *limit))
        .collect()
}

/// Status string for an AQI value
pub fn status_for(aqi: u8) -> &'static str {
    match aqi {
        1 => "Good",
        2 => "Fair",
        3 => "Moderate",
        4 => "Poor",
        5 => "Very Poor",
        _ => "Unknown",
    }
}

/// Longer description of what an AQI value means for people outdoors
pub fn level_name(aqi: u8) -> &'static str {
    match aqi {
        1 => "Air quality is satisfactory",
        2 => "Acceptable for most people",
        3 => "Sensitive groups may be affected",
        4 => "Everyone may experience health effects",
        5 => "Health alert: avoid outdoor activity",
        _ => "Unknown level",
    }
}

/// Highest level triggered by any thresholded pollutant, starting from 1.
pub fn derive_aqi(components: &BTreeMap<String, f64>) -> u8 {
    let mut level = 1;
    for (code, value) in components {
        let Some(limit) = threshold_for(code) else {
            continue;
        };
        if *value > limit * SEVERE_FACTOR {
            level = 5;
        } else if *value > limit {
            level = level.max(4);
        }
    }
    level
}

/// A pollutant above its threshold
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Exceedance {
    pub component: String,
    pub value: f64,
    pub threshold: f64,
    /// `value - threshold`, rounded to 2 decimals
    pub excess: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AirQualityAnalysis {
    pub status: String,
    pub aqi: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level_name: Option<String>,
    /// Present when AQI >= 4
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exceeded_parameters: Option<Vec<Exceedance>>,
    /// Present for extended analyses
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<BTreeMap<String, f64>>,
    /// Present for extended analyses
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thresholds: Option<BTreeMap<String, f64>>,
}

impl AirQualityAnalysis {
    fn no_data() -> Self {
        Self {
            status: "no data".to_string(),
            aqi: None,
            level_name: None,
            exceeded_parameters: None,
            components: None,
            thresholds: None,
        }
    }

    pub fn has_data(&self) -> bool {
        self.aqi.is_some()
    }
}

pub fn analyze(reading: &PollutionReading, extended: bool) -> AirQualityAnalysis {
    if reading.components.is_empty() {
        return AirQualityAnalysis::no_data();
    }

    let aqi = match reading.aqi {
        Some(aqi) => aqi,
        None => {
            let derived = derive_aqi(&reading.components);
            tracing::debug!("Provider sent no AQI, derived {}", derived);
            derived
        }
    };

    let exceeded_parameters = (aqi >= 4).then(|| exceedances(&reading.components));

    AirQualityAnalysis {
        status: status_for(aqi).to_string(),
        aqi: Some(aqi),
        level_name: Some(level_name(aqi).to_string()),
        exceeded_parameters,
        components: extended.then(|| reading.components.clone()),
        thresholds: extended.then(threshold_table),
    }
}

fn exceedances(components: &BTreeMap<String, f64>) -> Vec<Exceedance> {
    components
        .iter()
        .filter_map(|(code, value)| {
            let limit = threshold_for(code)?;
            (*value > limit).then(|| Exceedance {
                component: code.clone(),
                value: *value,
                threshold: limit,
                excess: round2(*value - limit),
            })
        })
        .collect()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Per-pollutant grade against its threshold: up to half is good, up to the
/// threshold fair, up to 1.5x moderate, above that poor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentGrade {
    Good,
    Fair,
    Moderate,
    Poor,
    NoThreshold,
}

impl ComponentGrade {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Fair => "fair",
            Self::Moderate => "moderate",
            Self::Poor => "poor",
            Self::NoThreshold => "no threshold",
        }
    }
}

pub fn grade_component(value: f64, threshold: Option<f64>) -> ComponentGrade {
    let Some(limit) = threshold else {
        return ComponentGrade::NoThreshold;
    };
    if value <= limit * 0.5 {
        ComponentGrade::Good
    } else if value <= limit {
        ComponentGrade::Fair
    } else if value <= limit * SEVERE_FACTOR {
        ComponentGrade::Moderate
    } else {
        ComponentGrade::Poor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(aqi: Option<u8>, components: &[(&str, f64)]) -> PollutionReading {
        PollutionReading {
            aqi,
            components: components
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
        }
    }

    #[test]
    fn test_empty_reading_is_no_data() {
        let analysis = analyze(&PollutionReading::default(), false);
        assert_eq!(
            serde_json::to_value(&analysis).unwrap(),
            serde_json::json!({"status": "no data", "aqi": null})
        );
    }

    #[test]
    fn test_aqi_without_components_is_no_data() {
        let analysis = analyze(&reading(Some(2), &[]), true);
        assert_eq!(analysis.status, "no data");
        assert_eq!(analysis.aqi, None);
    }

    #[test]
    fn test_severe_pm25_derives_level_five() {
        let analysis = analyze(&reading(None, &[("pm2_5", 80.0)]), false);
        assert_eq!(analysis.aqi, Some(5));
        assert_eq!(analysis.status, "Very Poor");
        assert_eq!(
            analysis.exceeded_parameters,
            Some(vec![Exceedance {
                component: "pm2_5".to_string(),
                value: 80.0,
                threshold: 50.0,
                excess: 30.0,
            }])
        );
    }

    #[test]
    fn test_moderate_excess_derives_level_four() {
        let analysis = analyze(&reading(None, &[("no2", 160.0), ("co", 100.0)]), false);
        assert_eq!(analysis.aqi, Some(4));
        assert_eq!(analysis.status, "Poor");
        let exceeded = analysis.exceeded_parameters.unwrap();
        assert_eq!(exceeded.len(), 1);
        assert_eq!(exceeded[0].component, "no2");
    }

    #[test]
    fn test_exactly_at_threshold_does_not_raise() {
        assert_eq!(derive_aqi(&reading(None, &[("pm10", 100.0)]).components), 1);
        assert_eq!(derive_aqi(&reading(None, &[("pm10", 150.0)]).components), 4);
        assert_eq!(derive_aqi(&reading(None, &[("pm10", 150.01)]).components), 5);
    }

    #[test]
    fn test_untracked_pollutants_never_raise() {
        let analysis = analyze(&reading(None, &[("no", 5000.0), ("nh3", 5000.0)]), false);
        assert_eq!(analysis.aqi, Some(1));
        assert_eq!(analysis.status, "Good");
        assert!(analysis.exceeded_parameters.is_none());
    }

    #[test]
    fn test_provider_aqi_takes_precedence() {
        let analysis = analyze(&reading(Some(2), &[("pm2_5", 80.0)]), false);
        assert_eq!(analysis.aqi, Some(2));
        assert_eq!(analysis.status, "Fair");
        assert!(analysis.exceeded_parameters.is_none());
    }

    #[test]
    fn test_out_of_range_aqi_is_unknown() {
        let analysis = analyze(&reading(Some(9), &[("co", 1.0)]), false);
        assert_eq!(analysis.status, "Unknown");
        assert_eq!(analysis.exceeded_parameters, Some(vec![]));
    }

    #[test]
    fn test_excess_rounded_to_two_decimals() {
        let analysis = analyze(&reading(None, &[("o3", 150.12345)]), false);
        let exceeded = analysis.exceeded_parameters.unwrap();
        assert_eq!(exceeded[0].excess, 10.12);
    }

    #[test]
    fn test_extended_exposes_components_and_thresholds() {
        let basic = analyze(&reading(Some(1), &[("co", 200.0)]), false);
        assert!(basic.components.is_none());
        assert!(basic.thresholds.is_none());

        let extended = analyze(&reading(Some(1), &[("co", 200.0)]), true);
        assert_eq!(extended.components.unwrap().get("co"), Some(&200.0));
        let thresholds = extended.thresholds.unwrap();
        assert_eq!(thresholds.len(), 6);
        assert_eq!(thresholds.get("pm2_5"), Some(&50.0));
        assert_eq!(thresholds.get("co"), Some(&9400.0));
        assert!(thresholds.get("nh3").is_none());
    }

    #[test]
    fn test_grade_component_bands() {
        let limit = Some(50.0);
        assert_eq!(grade_component(25.0, limit), ComponentGrade::Good);
        assert_eq!(grade_component(50.0, limit), ComponentGrade::Fair);
        assert_eq!(grade_component(75.0, limit), ComponentGrade::Moderate);
        assert_eq!(grade_component(75.5, limit), ComponentGrade::Poor);
        assert_eq!(grade_component(1.0, None), ComponentGrade::NoThreshold);
    }
}
