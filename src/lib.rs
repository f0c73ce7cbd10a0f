pub mod biome;
pub mod climate;
pub mod config;
pub mod generator;
pub mod heightmap;
pub mod noise;
pub mod rivers;

pub use config::{
    BiomeSettings, ClimateSettings, ConfigError, GenerationParams, NoiseSettings, RiverSettings,
};
pub use generator::{GeneratedWorld, generate};
pub use heightmap::{Heightmap, generate_heightmap};
