//! Per-bike routing weights and speed tables.
//!
//! Every table is a struct with one field per enum variant, so a lookup is an
//! exhaustive `match` and a configuration file that leaves a surface or
//! fitness level out is rejected while parsing, long before routing starts.

use std::{collections::HashMap, fs::File, io::Read, path::Path};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use shared::{BikeType, FitnessLevel, RoadSurfaceType};

use crate::error::ConfigError;

static BUILTIN_MODEL: Lazy<RoadCostModel> = Lazy::new(builtin_model);

/// One value per road surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SurfaceTable {
    pub primary: f64,
    pub secondary: f64,
    pub paved: f64,
    pub unpaved: f64,
    pub unknown_surface: f64,
    pub cycleway: f64,
}

impl SurfaceTable {
    pub fn get(&self, surface: RoadSurfaceType) -> f64 {
        match surface {
            RoadSurfaceType::Primary => self.primary,
            RoadSurfaceType::Secondary => self.secondary,
            RoadSurfaceType::Paved => self.paved,
            RoadSurfaceType::Unpaved => self.unpaved,
            RoadSurfaceType::UnknownSurface => self.unknown_surface,
            RoadSurfaceType::Cycleway => self.cycleway,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (RoadSurfaceType, f64)> + '_ {
        RoadSurfaceType::ALL
            .into_iter()
            .map(|surface| (surface, self.get(surface)))
    }
}

/// One value per fitness level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FitnessTable {
    pub low: f64,
    pub medium: f64,
    pub good: f64,
    pub very_good: f64,
    pub excellent: f64,
}

impl FitnessTable {
    pub fn get(&self, fitness: FitnessLevel) -> f64 {
        match fitness {
            FitnessLevel::Low => self.low,
            FitnessLevel::Medium => self.medium,
            FitnessLevel::Good => self.good,
            FitnessLevel::VeryGood => self.very_good,
            FitnessLevel::Excellent => self.excellent,
        }
    }
}

/// Per-surface cost factors applied to edge lengths (lower = preferred).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CostWeights(pub SurfaceTable);

impl CostWeights {
    pub fn weight(&self, surface: RoadSurfaceType) -> f64 {
        self.0.get(surface)
    }

    /// Smallest factor of the table; scales an admissible distance heuristic.
    pub fn min_weight(&self) -> f64 {
        self.0.iter().map(|(_, w)| w).fold(f64::INFINITY, f64::min)
    }

    pub fn iter(&self) -> impl Iterator<Item = (RoadSurfaceType, f64)> + '_ {
        self.0.iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedModel {
    pub base_speed_kph: FitnessTable,
    pub multipliers: SurfaceTable,
}

impl SpeedModel {
    pub fn speed_kph(&self, surface: RoadSurfaceType, fitness: FitnessLevel) -> f64 {
        self.base_speed_kph.get(fitness) * self.multipliers.get(surface)
    }
}

/// Configuration entry for one bike type, shaped like the cost-model file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BikeProfile {
    pub speed: FitnessTable,
    pub routing_weights: CostWeights,
    pub speed_multipliers: SurfaceTable,
}

/// Validated cost and speed tables for every bike type.
#[derive(Debug, Clone, PartialEq)]
pub struct RoadCostModel {
    profiles: [BikeProfile; 5],
}

impl RoadCostModel {
    /// Tables used when no cost-model file is configured.
    pub fn builtin() -> &'static RoadCostModel {
        &BUILTIN_MODEL
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader(reader: impl Read) -> Result<Self, ConfigError> {
        let profiles: HashMap<BikeType, BikeProfile> = serde_json::from_reader(reader)?;
        Self::from_profiles(profiles)
    }

    pub fn from_profiles(mut profiles: HashMap<BikeType, BikeProfile>) -> Result<Self, ConfigError> {
        let mut take = |bike: BikeType| -> Result<BikeProfile, ConfigError> {
            let profile = profiles.remove(&bike).ok_or(ConfigError::MissingBike(bike))?;
            validate_profile(bike, &profile)?;
            Ok(profile)
        };

        Ok(Self {
            profiles: [
                take(BikeType::Road)?,
                take(BikeType::Gravel)?,
                take(BikeType::Trekking)?,
                take(BikeType::Mountain)?,
                take(BikeType::EBike)?,
            ],
        })
    }

    pub fn profile(&self, bike: BikeType) -> &BikeProfile {
        let slot = match bike {
            BikeType::Road => 0,
            BikeType::Gravel => 1,
            BikeType::Trekking => 2,
            BikeType::Mountain => 3,
            BikeType::EBike => 4,
        };
        &self.profiles[slot]
    }

    pub fn weights_for(&self, bike: BikeType) -> &CostWeights {
        &self.profile(bike).routing_weights
    }

    pub fn speed_model_for(&self, bike: BikeType) -> SpeedModel {
        let profile = self.profile(bike);
        SpeedModel {
            base_speed_kph: profile.speed,
            multipliers: profile.speed_multipliers,
        }
    }

    pub fn estimate_speed_kph(
        &self,
        bike: BikeType,
        surface: RoadSurfaceType,
        fitness: FitnessLevel,
    ) -> f64 {
        self.speed_model_for(bike).speed_kph(surface, fitness)
    }

    pub fn estimate_time_seconds(
        &self,
        distance_m: f64,
        bike: BikeType,
        surface: RoadSurfaceType,
        fitness: FitnessLevel,
    ) -> u64 {
        estimate_time_needed_s(distance_m, self.estimate_speed_kph(bike, surface, fitness))
    }
}

impl Default for RoadCostModel {
    fn default() -> Self {
        BUILTIN_MODEL.clone()
    }
}

/// Seconds needed to ride `distance_m` at `speed_kph`, rounded to the nearest second.
pub fn estimate_time_needed_s(distance_m: f64, speed_kph: f64) -> u64 {
    if speed_kph.is_nan() || speed_kph <= 0.0 || !distance_m.is_finite() || distance_m <= 0.0 {
        return 0;
    }
    (distance_m / (speed_kph / 3.6)).round() as u64
}

fn validate_profile(bike: BikeType, profile: &BikeProfile) -> Result<(), ConfigError> {
    for (surface, value) in profile.routing_weights.iter() {
        if !is_positive(value) {
            return Err(ConfigError::InvalidWeight { bike, surface, value });
        }
    }
    for (surface, value) in profile.speed_multipliers.iter() {
        if !is_positive(value) {
            return Err(ConfigError::InvalidMultiplier { bike, surface, value });
        }
    }
    for fitness in FitnessLevel::ALL {
        let value = profile.speed.get(fitness);
        if !is_positive(value) {
            return Err(ConfigError::InvalidSpeed { bike, fitness, value });
        }
    }
    Ok(())
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn surfaces(
    primary: f64,
    secondary: f64,
    paved: f64,
    unpaved: f64,
    unknown_surface: f64,
    cycleway: f64,
) -> SurfaceTable {
    SurfaceTable {
        primary,
        secondary,
        paved,
        unpaved,
        unknown_surface,
        cycleway,
    }
}

fn speeds(low: f64, medium: f64, good: f64, very_good: f64, excellent: f64) -> FitnessTable {
    FitnessTable {
        low,
        medium,
        good,
        very_good,
        excellent,
    }
}

fn builtin_model() -> RoadCostModel {
    RoadCostModel {
        profiles: [
            BikeProfile {
                speed: speeds(20.0, 24.0, 28.0, 30.0, 32.0),
                routing_weights: CostWeights(surfaces(1.7, 1.3, 1.0, 3.0, 3.0, 0.8)),
                speed_multipliers: surfaces(1.0, 1.0, 1.0, 0.5, 0.6, 1.0),
            },
            BikeProfile {
                speed: speeds(18.0, 22.0, 26.0, 28.0, 30.0),
                routing_weights: CostWeights(surfaces(2.0, 1.6, 1.0, 1.2, 1.2, 0.8)),
                speed_multipliers: surfaces(1.0, 1.0, 1.0, 0.8, 0.8, 1.0),
            },
            BikeProfile {
                speed: speeds(13.0, 16.0, 19.0, 22.0, 25.0),
                routing_weights: CostWeights(surfaces(3.0, 3.0, 1.0, 1.2, 1.2, 0.8)),
                speed_multipliers: surfaces(1.0, 1.0, 1.0, 0.8, 0.8, 1.0),
            },
            BikeProfile {
                speed: speeds(13.0, 16.0, 19.0, 22.0, 25.0),
                routing_weights: CostWeights(surfaces(3.0, 3.0, 1.0, 0.7, 0.7, 1.0)),
                speed_multipliers: surfaces(1.0, 1.0, 1.0, 0.9, 0.9, 1.0),
            },
            BikeProfile {
                speed: speeds(21.0, 22.0, 23.0, 24.0, 25.0),
                routing_weights: CostWeights(surfaces(3.0, 3.0, 1.0, 1.2, 1.2, 0.8)),
                speed_multipliers: surfaces(1.0, 1.0, 1.0, 0.9, 0.9, 1.0),
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn builtin_profiles() -> HashMap<BikeType, BikeProfile> {
        let model = RoadCostModel::builtin();
        BikeType::ALL
            .into_iter()
            .map(|bike| (bike, *model.profile(bike)))
            .collect()
    }

    #[test]
    fn road_bike_on_unpaved_at_good_fitness() {
        let model = RoadCostModel::builtin();
        let speed = model.estimate_speed_kph(BikeType::Road, RoadSurfaceType::Unpaved, FitnessLevel::Good);
        assert_eq!(speed, 14.0);
    }

    #[test]
    fn time_estimate_rounds_to_nearest_second() {
        assert_eq!(estimate_time_needed_s(10_000.0, 14.0), 2571);
        let model = RoadCostModel::builtin();
        let seconds = model.estimate_time_seconds(
            10_000.0,
            BikeType::Road,
            RoadSurfaceType::Unpaved,
            FitnessLevel::Good,
        );
        assert_eq!(seconds, 2571);
    }

    #[test]
    fn time_estimate_of_nothing_is_zero() {
        assert_eq!(estimate_time_needed_s(0.0, 20.0), 0);
        assert_eq!(estimate_time_needed_s(-5.0, 20.0), 0);
        assert_eq!(estimate_time_needed_s(1000.0, 0.0), 0);
    }

    #[test]
    fn every_bike_resolves_every_surface() {
        let model = RoadCostModel::builtin();
        for bike in BikeType::ALL {
            let weights = model.weights_for(bike);
            for surface in RoadSurfaceType::ALL {
                assert!(weights.weight(surface) > 0.0, "{bike:?}/{surface:?}");
                for fitness in FitnessLevel::ALL {
                    assert!(model.estimate_speed_kph(bike, surface, fitness) > 0.0);
                }
            }
        }
    }

    #[test]
    fn mountain_bikes_prefer_unpaved_roads() {
        let model = RoadCostModel::builtin();
        let weights = model.weights_for(BikeType::Mountain);
        assert!(weights.weight(RoadSurfaceType::Unpaved) < weights.weight(RoadSurfaceType::Paved));
        assert_eq!(weights.min_weight(), 0.7);
    }

    #[test]
    fn base_speed_grows_with_fitness() {
        let model = RoadCostModel::builtin();
        for bike in BikeType::ALL {
            let speeds: Vec<f64> = FitnessLevel::ALL
                .into_iter()
                .map(|fitness| model.speed_model_for(bike).base_speed_kph.get(fitness))
                .collect();
            assert!(speeds.windows(2).all(|w| w[0] <= w[1]), "{bike:?}: {speeds:?}");
        }
    }

    #[test]
    fn missing_bike_is_a_config_error() {
        let mut profiles = builtin_profiles();
        profiles.remove(&BikeType::Gravel);
        let err = RoadCostModel::from_profiles(profiles).unwrap_err();
        assert!(matches!(err, ConfigError::MissingBike(BikeType::Gravel)));
    }

    #[test]
    fn non_positive_weight_is_rejected() {
        let mut profiles = builtin_profiles();
        profiles.get_mut(&BikeType::Road).unwrap().routing_weights.0.cycleway = 0.0;
        let err = RoadCostModel::from_profiles(profiles).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidWeight {
                bike: BikeType::Road,
                surface: RoadSurfaceType::Cycleway,
                ..
            }
        ));
    }

    #[test]
    fn file_missing_a_surface_fails_to_parse() {
        let json = r#"{
            "road": {
                "speed": {"low": 20, "medium": 24, "good": 28, "very_good": 30, "excellent": 32},
                "routing_weights": {"primary": 1.7, "secondary": 1.3, "paved": 1.0, "unpaved": 3.0, "unknown_surface": 3.0},
                "speed_multipliers": {"primary": 1, "secondary": 1, "paved": 1, "unpaved": 0.5, "unknown_surface": 0.6, "cycleway": 1}
            }
        }"#;
        let err = RoadCostModel::from_reader(json.as_bytes()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)), "{err}");
    }

    #[test]
    fn loads_complete_model_from_file() {
        let profiles = builtin_profiles();
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        serde_json::to_writer(&mut file, &profiles).expect("serialize profiles");
        file.flush().expect("flush");

        let model = RoadCostModel::from_file(file.path()).expect("model from file");
        assert_eq!(&model, RoadCostModel::builtin());
    }
}
