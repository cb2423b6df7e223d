//! Custom dimension descriptions.
//!
//! A [`DimensionConfigData`] is handed across the bridge by value when the host
//! loads its worlds. It owns no live resources; the host materializes it through
//! a [`DimensionSink`] after [`DimensionRegistrar`] has validated it.

use serde::{Deserialize, Serialize};

use crate::bridge::Bridge;

/// Highest block y (exclusive) a dimension may reach.
pub const MAX_BUILD_Y: i32 = 2032;

/// Lowest block y a dimension may start at.
pub const MIN_BUILD_Y: i32 = -2032;

// ─────────────────────────────────────────────────────────────────────────────
// Config Types
// ─────────────────────────────────────────────────────────────────────────────

/// Physical and visual properties of a dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DimensionTypeConfig {
    /// Time of day locked in ticks (None = day cycle runs)
    pub fixed_time: Option<i64>,
    pub has_skylight: bool,
    pub has_ceiling: bool,
    pub ultrawarm: bool,
    pub natural: bool,
    /// Horizontal scale relative to the overworld (default: 1.0)
    pub coordinate_scale: f64,
    pub bed_works: bool,
    pub respawn_anchor_works: bool,
    /// Lowest block y (default: -64)
    pub min_y: i32,
    /// Total build height (default: 384)
    pub height: i32,
    /// Height portals and chorus fruit may reach (default: 384)
    pub logical_height: i32,
    pub ambient_light: f32,
    pub infiniburn: String,
    pub effects: String,
}

impl Default for DimensionTypeConfig {
    fn default() -> Self {
        Self {
            fixed_time: None,
            has_skylight: true,
            has_ceiling: false,
            ultrawarm: false,
            natural: true,
            coordinate_scale: 1.0,
            bed_works: true,
            respawn_anchor_works: false,
            min_y: -64,
            height: 384,
            logical_height: 384,
            ambient_light: 0.0,
            infiniburn: "#minecraft:infiniburn_overworld".to_string(),
            effects: "minecraft:overworld".to_string(),
        }
    }
}

impl DimensionTypeConfig {
    /// Validate height bounds and scale.
    pub fn validate(&self) -> Result<(), DimensionError> {
        if self.height < 16 {
            return Err(DimensionError::invalid("height", "must be at least 16"));
        }
        if self.height % 16 != 0 {
            return Err(DimensionError::invalid("height", "must be a multiple of 16"));
        }
        if self.min_y % 16 != 0 {
            return Err(DimensionError::invalid("min_y", "must be a multiple of 16"));
        }
        if self.min_y < MIN_BUILD_Y {
            return Err(DimensionError::invalid(
                "min_y",
                format!("must be at least {}", MIN_BUILD_Y),
            ));
        }
        if self.min_y + self.height > MAX_BUILD_Y {
            return Err(DimensionError::invalid(
                "height",
                format!("min_y + height must not exceed {}", MAX_BUILD_Y),
            ));
        }
        if self.logical_height > self.height {
            return Err(DimensionError::invalid(
                "logical_height",
                "must not exceed height",
            ));
        }
        if !(self.coordinate_scale > 0.0) {
            return Err(DimensionError::invalid(
                "coordinate_scale",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Everything needed to materialize a new generation context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionConfigData {
    /// Namespaced id, e.g. `mypack:caverns`
    pub id: String,

    #[serde(default)]
    pub dimension_type: DimensionTypeConfig,

    /// Generator kind (default: "noise")
    #[serde(default = "default_generator_type")]
    pub generator_type: String,

    /// Seed override (None = world seed)
    #[serde(default)]
    pub seed: Option<i64>,

    /// Biome source id
    #[serde(default)]
    pub biome_source: Option<String>,

    /// Noise settings id
    #[serde(default)]
    pub settings: Option<String>,
}

fn default_generator_type() -> String {
    "noise".to_string()
}

impl DimensionConfigData {
    /// Create a config with default type settings.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            dimension_type: DimensionTypeConfig::default(),
            generator_type: default_generator_type(),
            seed: None,
            biome_source: None,
            settings: None,
        }
    }

    pub fn with_type(mut self, dimension_type: DimensionTypeConfig) -> Self {
        self.dimension_type = dimension_type;
        self
    }

    pub fn with_generator(mut self, generator_type: impl Into<String>) -> Self {
        self.generator_type = generator_type.into();
        self
    }

    pub fn with_seed(mut self, seed: i64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_biome_source(mut self, biome_source: impl Into<String>) -> Self {
        self.biome_source = Some(biome_source.into());
        self
    }

    /// Namespace part of the id.
    pub fn namespace(&self) -> Option<&str> {
        self.id.split_once(':').map(|(ns, _)| ns)
    }

    /// Validate the id and the dimension type.
    pub fn validate(&self) -> Result<(), DimensionError> {
        match self.id.split_once(':') {
            Some((ns, path)) if !ns.is_empty() && !path.is_empty() => {}
            _ => return Err(DimensionError::InvalidId(self.id.clone())),
        }
        if self.generator_type.is_empty() {
            return Err(DimensionError::invalid("generator_type", "must not be empty"));
        }
        self.dimension_type.validate()
    }
}

/// Dimension validation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DimensionError {
    #[error("dimension id must be namespaced (namespace:path): {0}")]
    InvalidId(String),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl DimensionError {
    fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Registration
// ─────────────────────────────────────────────────────────────────────────────

/// Host-side receiver that turns a validated config into a live dimension.
pub trait DimensionSink {
    fn create_dimension(&mut self, config: &DimensionConfigData) -> crate::Result<()>;
}

/// Outcome of a registration pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationSummary {
    pub registered: Vec<String>,
    pub rejected: Vec<(String, String)>,
}

impl RegistrationSummary {
    pub fn total(&self) -> usize {
        self.registered.len() + self.rejected.len()
    }
}

/// Pulls custom dimension configs through the bridge at world load.
pub struct DimensionRegistrar;

impl DimensionRegistrar {
    /// Validate and create every config the bridge offers.
    ///
    /// Invalid or failing configs are skipped so one bad dimension cannot
    /// prevent the others from loading.
    pub fn register_all(bridge: &dyn Bridge, sink: &mut dyn DimensionSink) -> RegistrationSummary {
        let mut summary = RegistrationSummary::default();

        for config in bridge.custom_dimension_configs() {
            let outcome = config
                .validate()
                .map_err(crate::Error::from)
                .and_then(|_| sink.create_dimension(&config));

            match outcome {
                Ok(()) => {
                    tracing::debug!(dimension = %config.id, "Registered custom dimension");
                    summary.registered.push(config.id);
                }
                Err(e) => {
                    tracing::warn!(dimension = %config.id, error = %e, "Skipping custom dimension");
                    summary.rejected.push((config.id, e.to_string()));
                }
            }
        }

        if summary.total() > 0 {
            tracing::info!(
                registered = summary.registered.len(),
                total = summary.total(),
                "Registered {}/{} custom dimensions",
                summary.registered.len(),
                summary.total()
            );
        }

        summary
    }
}
