// src/generator.rs
//! Конвейер генерации: высоты → климат → биомы → реки.

use log::info;

use crate::biome::{BiomeMap, classify_biomes};
use crate::climate::{ClimateMaps, generate_climate};
use crate::config::{ConfigError, GenerationParams};
use crate::heightmap::{Heightmap, generate_heightmap};
use crate::noise::NoiseOffsets;
use crate::rivers::{RiverPath, generate_rivers};

/// Результат одного запуска генерации.
///
/// Все карты принадлежат этому результату; повторный запуск строит
/// новый набор с нуля.
#[derive(Debug, Clone)]
pub struct GeneratedWorld {
    pub heightmap: Heightmap,
    pub climate: ClimateMaps,
    pub biomes: BiomeMap,
    pub rivers: Vec<RiverPath>,
}

/// Выполняет полный конвейер генерации уровня.
///
/// Конфигурация проверяется до начала работы: ни одна карта не строится
/// по недопустимым параметрам. Все изменения карты высот (сглаживание,
/// эрозия) завершаются до климата и классификации, поэтому водные клетки
/// определяются однократно.
pub fn generate(params: &GenerationParams) -> Result<GeneratedWorld, ConfigError> {
    params.validate()?;

    let offsets = NoiseOffsets::from_seed(params.seed, params.noise.standard_noise_offset);

    info!(
        "карта высот {}×{}, сид {}",
        params.width, params.height, params.seed
    );
    let mut heightmap = generate_heightmap(params, &offsets);
    if params.smooth_radius > 0 {
        heightmap.smooth(params.smooth_radius);
    }
    heightmap.apply_hydraulic_erosion(params.seed, &params.climate, &params.erosion);

    info!("климатические карты");
    let climate = generate_climate(params, &offsets, &heightmap);

    info!("классификация биомов ({} слоёв)", params.biomes.len() + 1);
    let biomes = classify_biomes(params, &heightmap, &climate);

    let rivers = generate_rivers(params, &heightmap);
    if params.river.enabled {
        info!("рек проложено: {}", rivers.len());
    }

    Ok(GeneratedWorld {
        heightmap,
        climate,
        biomes,
        rivers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ErosionSettings, RiverSettings};

    fn quick_params() -> GenerationParams {
        GenerationParams {
            width: 24,
            height: 24,
            erosion: ErosionSettings {
                enabled: false,
                ..ErosionSettings::default()
            },
            river: RiverSettings {
                enabled: true,
                river_count: 1,
                ..RiverSettings::default()
            },
            ..GenerationParams::default()
        }
    }

    #[test]
    fn full_pipeline_produces_consistent_grids() {
        let params = quick_params();
        let world = generate(&params).unwrap();
        let total = (params.width * params.height) as usize;
        assert_eq!(world.heightmap.data.len(), total);
        assert_eq!(world.climate.temperature.len(), total);
        assert_eq!(world.climate.humidity.len(), total);
        assert_eq!(world.biomes.index.len(), total);
        assert_eq!(world.biomes.weight_layers.len(), params.biomes.len() + 1);
    }

    #[test]
    fn invalid_config_is_rejected_before_generation() {
        let params = GenerationParams {
            biomes: Vec::new(),
            ..quick_params()
        };
        assert!(generate(&params).is_err());
    }

    #[test]
    fn pipeline_is_deterministic_per_seed() {
        let params = quick_params();
        let a = generate(&params).unwrap();
        let b = generate(&params).unwrap();
        assert_eq!(a.heightmap.data, b.heightmap.data);
        assert_eq!(a.climate.temperature, b.climate.temperature);
        assert_eq!(a.biomes.index, b.biomes.index);
        assert_eq!(a.rivers.len(), b.rivers.len());
    }
}
