//! Prediction inputs: the raw request shape and the validated value object.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use alutrack_core::ValueObject;

use crate::model::FeatureVector;
use crate::result::EstimationError;

/// Reaction time (hours) assumed when a request leaves it out.
pub const DEFAULT_REACTION_TIME: f64 = 1.0;

/// Prediction request as it arrives from a form or JSON client.
///
/// Numbers may be sent as JSON numbers or numeric strings. Nothing here is
/// trusted; convert with `PredictionInput::try_from` before estimating.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    /// Submitting operator, used to attach the prediction to an agent.
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub bauxite_mass: Option<JsonValue>,
    #[serde(default)]
    pub caustic_soda_conc: Option<JsonValue>,
    #[serde(default)]
    pub temperature: Option<JsonValue>,
    #[serde(default)]
    pub pressure: Option<JsonValue>,
    #[serde(default, alias = "ore_quality")]
    pub purity: Option<JsonValue>,
    #[serde(default)]
    pub reaction_time: Option<JsonValue>,
}

/// Validated process parameters for one extraction run.
///
/// Every field is finite and non-negative. Feature order for the model is
/// fixed: bauxite mass, caustic soda concentration, temperature, pressure,
/// ore quality, reaction time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PredictionRequest")]
pub struct PredictionInput {
    bauxite_mass: f64,
    caustic_soda_conc: f64,
    temperature: f64,
    pressure: f64,
    ore_quality: f64,
    reaction_time: f64,
}

impl PredictionInput {
    pub fn new(
        bauxite_mass: f64,
        caustic_soda_conc: f64,
        temperature: f64,
        pressure: f64,
        ore_quality: f64,
        reaction_time: f64,
    ) -> Result<Self, EstimationError> {
        Ok(Self {
            bauxite_mass: check("bauxite_mass", bauxite_mass)?,
            caustic_soda_conc: check("caustic_soda_conc", caustic_soda_conc)?,
            temperature: check("temperature", temperature)?,
            pressure: check("pressure", pressure)?,
            ore_quality: check("purity", ore_quality)?,
            reaction_time: check("reaction_time", reaction_time)?,
        })
    }

    pub fn bauxite_mass(&self) -> f64 {
        self.bauxite_mass
    }

    pub fn caustic_soda_conc(&self) -> f64 {
        self.caustic_soda_conc
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn pressure(&self) -> f64 {
        self.pressure
    }

    pub fn ore_quality(&self) -> f64 {
        self.ore_quality
    }

    pub fn reaction_time(&self) -> f64 {
        self.reaction_time
    }

    /// Model features in their fixed order.
    pub fn features(&self) -> FeatureVector {
        [
            self.bauxite_mass,
            self.caustic_soda_conc,
            self.temperature,
            self.pressure,
            self.ore_quality,
            self.reaction_time,
        ]
    }
}

impl ValueObject for PredictionInput {}

impl TryFrom<PredictionRequest> for PredictionInput {
    type Error = EstimationError;

    fn try_from(req: PredictionRequest) -> Result<Self, Self::Error> {
        let reaction_time = match req.reaction_time.as_ref() {
            None | Some(JsonValue::Null) => DEFAULT_REACTION_TIME,
            Some(v) => coerce("reaction_time", v)?,
        };

        Self::new(
            required("bauxite_mass", req.bauxite_mass.as_ref())?,
            required("caustic_soda_conc", req.caustic_soda_conc.as_ref())?,
            required("temperature", req.temperature.as_ref())?,
            required("pressure", req.pressure.as_ref())?,
            required("purity", req.purity.as_ref())?,
            reaction_time,
        )
    }
}

fn required(field: &'static str, value: Option<&JsonValue>) -> Result<f64, EstimationError> {
    match value {
        None | Some(JsonValue::Null) => Err(EstimationError::InvalidInput(format!(
            "missing field `{field}`"
        ))),
        Some(v) => coerce(field, v),
    }
}

fn coerce(field: &'static str, value: &JsonValue) -> Result<f64, EstimationError> {
    let parsed = match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    parsed.ok_or_else(|| {
        EstimationError::InvalidInput(format!("field `{field}` is not a number: {value}"))
    })
}

fn check(field: &'static str, value: f64) -> Result<f64, EstimationError> {
    if !value.is_finite() {
        return Err(EstimationError::InvalidInput(format!(
            "field `{field}` must be finite"
        )));
    }
    if value < 0.0 {
        return Err(EstimationError::InvalidInput(format!(
            "field `{field}` must be non-negative (got {value})"
        )));
    }
    Ok(value)
}
