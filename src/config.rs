// src/config.rs
//! Конфигурация генерации уровня
//!
//! Этот модуль определяет все параметры, управляющие процедурной генерацией:
//! - Разрешение карты, сид и масштаб ландшафта
//! - Настройки шума (октавы, лакунарность, затухание)
//! - Климатические настройки (высоты, уровень моря, температуры, влажность)
//! - Настройки острова, эрозии и рек
//! - Описания биомов, включая выделенный водный биом
//!
//! Все структуры поддерживают сериализацию в TOML/JSON для удобной настройки через конфигурационные файлы.

use serde::{Deserialize, Serialize};
use std::fs;
use thiserror::Error;

/// Ошибки валидации параметров генерации.
///
/// Все варианты означают недопустимый ввод: генерация не начинается,
/// пока конфигурация не исправлена.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("недопустимое разрешение карты: {0}×{1}")]
    InvalidResolution(u32, u32),
    #[error("не задан ни один биом помимо водного")]
    NoBiomes,
    #[error("имя биома `{0}` повторяется")]
    DuplicateBiomeName(String),
    #[error("min_height ({0}) должен быть меньше max_height ({1})")]
    InvalidHeightRange(f32, f32),
    #[error("min_temp ({0}) должен быть меньше max_temp ({1})")]
    InvalidTempRange(f32, f32),
    #[error("sea_level должен лежать в [0, 1], получено {0}")]
    InvalidSeaLevel(f32),
    #[error("octaves должно быть не меньше 1")]
    InvalidOctaves,
    #[error("lacunarity должна быть положительной, получено {0}")]
    InvalidLacunarity(f32),
    #[error("persistence должна лежать в [0, 1], получено {0}")]
    InvalidPersistence(f32),
    #[error("redistribution_factor должен быть не меньше 1, получено {0}")]
    InvalidRedistributionFactor(f32),
    #[error("moisture_falloff_rate не может быть отрицательным")]
    NegativeMoistureFalloff,
    #[error("simplify_epsilon не может быть отрицательным")]
    NegativeSimplifyEpsilon,
}

/// Настройки когерентного шума
///
/// Управляют частотами полей шума и формой фрактальной суммы октав.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoiseSettings {
    /// Частота континентального шума (крупные формы рельефа)
    #[serde(default = "default_continent_noise_scale")]
    pub continent_noise_scale: f32,

    /// Частота детального шума рельефа
    #[serde(default = "default_terrain_noise_scale")]
    pub terrain_noise_scale: f32,

    /// Частота температурного шума (очень крупные тёплые/холодные области)
    #[serde(default = "default_temperature_noise_scale")]
    pub temperature_noise_scale: f32,

    /// Степень влияния континентального значения на амплитуду деталей:
    /// чем выше значение континента, тем больше деталей пропускается.
    #[serde(default = "default_continent_influence")]
    pub continent_influence: f32,

    /// Количество октав фрактальной суммы (больше — больше деталей)
    #[serde(default = "default_octaves")]
    pub octaves: u32,

    /// Множитель частоты между октавами
    #[serde(default = "default_lacunarity")]
    pub lacunarity: f32,

    /// Множитель амплитуды между октавами
    #[serde(default = "default_persistence")]
    pub persistence: f32,

    /// Половина диапазона случайных смещений доменов шума.
    /// Смещения выводятся из сида и разводят поля шума друг от друга.
    #[serde(default = "default_standard_noise_offset")]
    pub standard_noise_offset: f32,
}

fn default_continent_noise_scale() -> f32 {
    0.003
}
fn default_terrain_noise_scale() -> f32 {
    0.01
}
fn default_temperature_noise_scale() -> f32 {
    0.002
}
fn default_continent_influence() -> f32 {
    1.0
}
fn default_octaves() -> u32 {
    3
}
fn default_lacunarity() -> f32 {
    2.0
}
fn default_persistence() -> f32 {
    0.5
}
fn default_standard_noise_offset() -> f32 {
    10000.0
}

impl Default for NoiseSettings {
    fn default() -> Self {
        Self {
            continent_noise_scale: 0.003,
            terrain_noise_scale: 0.01,
            temperature_noise_scale: 0.002,
            continent_influence: 1.0,
            octaves: 3,
            lacunarity: 2.0,
            persistence: 0.5,
            standard_noise_offset: 10000.0,
        }
    }
}

/// Климатические настройки
///
/// Задают диапазон мировых высот, уровень моря, диапазон температур и
/// параметры влажности. Мировые высоты измеряются в условных единицах,
/// температура — в градусах Цельсия.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClimateSettings {
    /// Минимальная мировая высота ландшафта
    #[serde(default = "default_min_height")]
    pub min_height: f32,

    /// Максимальная мировая высота ландшафта
    #[serde(default = "default_max_height")]
    pub max_height: f32,

    /// Уровень моря: 0 = минимальная высота, 1 = максимальная
    #[serde(default = "default_sea_level")]
    pub sea_level: f32,

    /// Минимальная базовая температура
    #[serde(default = "default_min_temp")]
    pub min_temp: f32,

    /// Максимальная базовая температура
    #[serde(default = "default_max_temp")]
    pub max_temp: f32,

    /// Падение температуры на 1000 единиц высоты над уровнем моря.
    /// Ниже уровня моря температура по той же ставке растёт.
    #[serde(default = "default_temp_drop")]
    pub temp_drop_per_1000_units: f32,

    /// Скорость экспоненциального спада влажности с расстоянием до воды
    #[serde(default = "default_moisture_falloff_rate")]
    pub moisture_falloff_rate: f32,

    /// Насколько сильно температура сушит воздух (0 = не влияет)
    #[serde(default = "default_temperature_influence")]
    pub temperature_influence_on_humidity: f32,

    /// Коэффициент перераспределения `x^k / (x^k + (1-x)^k)`:
    /// - `1.0` — выключено,
    /// - `>1.0` — контраст усиливается (резче береговые линии и пики).
    #[serde(default = "default_redistribution_factor")]
    pub redistribution_factor: f32,
}

fn default_min_height() -> f32 {
    -15000.0
}
fn default_max_height() -> f32 {
    20000.0
}
fn default_sea_level() -> f32 {
    0.4
}
fn default_min_temp() -> f32 {
    -30.0
}
fn default_max_temp() -> f32 {
    80.0
}
fn default_temp_drop() -> f32 {
    0.1
}
fn default_moisture_falloff_rate() -> f32 {
    0.0005
}
fn default_temperature_influence() -> f32 {
    0.7
}
fn default_redistribution_factor() -> f32 {
    2.5
}

impl ClimateSettings {
    /// Мировая высота уровня моря.
    #[must_use]
    pub fn sea_world_height(&self) -> f32 {
        self.min_height + self.sea_level * (self.max_height - self.min_height)
    }
}

impl Default for ClimateSettings {
    fn default() -> Self {
        Self {
            min_height: -15000.0,
            max_height: 20000.0,
            sea_level: 0.4,
            min_temp: -30.0,
            max_temp: 80.0,
            temp_drop_per_1000_units: 0.1,
            moisture_falloff_rate: 0.0005,
            temperature_influence_on_humidity: 0.7,
            redistribution_factor: 2.5,
        }
    }
}

/// Настройки маски острова
///
/// Радиальная маска опускает края карты в океан, превращая ландшафт в остров.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IslandSettings {
    /// Включает маску острова
    #[serde(default = "default_island_enabled")]
    pub enabled: bool,

    /// Резкость края острова (больше — круче береговой обрыв)
    #[serde(default = "default_island_falloff_exponent")]
    pub falloff_exponent: f32,

    /// Частота шума, искажающего форму берега
    #[serde(default = "default_island_shape_noise_scale")]
    pub shape_noise_scale: f32,

    /// Сила искажения расстояния до центра
    #[serde(default = "default_island_shape_noise_strength")]
    pub shape_noise_strength: f32,
}

fn default_island_enabled() -> bool {
    true
}
fn default_island_falloff_exponent() -> f32 {
    2.0
}
fn default_island_shape_noise_scale() -> f32 {
    0.0025
}
fn default_island_shape_noise_strength() -> f32 {
    0.5
}

impl Default for IslandSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            falloff_exponent: 2.0,
            shape_noise_scale: 0.0025,
            shape_noise_strength: 0.5,
        }
    }
}

/// Настройки капельной гидрологической эрозии
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErosionSettings {
    /// Включает проход эрозии
    #[serde(default = "default_erosion_enabled")]
    pub enabled: bool,

    /// Количество симулируемых капель
    #[serde(default = "default_erosion_iterations")]
    pub num_iterations: u32,

    /// Инерция капли: ближе к 1 — прямолинейное движение,
    /// ближе к 0 — движение строго по градиенту
    #[serde(default = "default_droplet_inertia")]
    pub droplet_inertia: f32,

    /// Коэффициент ёмкости переносимого осадка
    #[serde(default = "default_sediment_capacity_factor")]
    pub sediment_capacity_factor: f32,

    /// Минимальная ёмкость осадка
    #[serde(default = "default_min_sediment_capacity")]
    pub min_sediment_capacity: f32,

    /// Скорость размыва
    #[serde(default = "default_erode_speed")]
    pub erode_speed: f32,

    /// Скорость отложения
    #[serde(default = "default_deposit_speed")]
    pub deposit_speed: f32,

    /// Скорость испарения воды капли
    #[serde(default = "default_evaporate_speed")]
    pub evaporate_speed: f32,

    /// Ускорение капли на склонах
    #[serde(default = "default_gravity")]
    pub gravity: f32,

    /// Максимальная длина пути капли в шагах
    #[serde(default = "default_max_droplet_lifetime")]
    pub max_droplet_lifetime: u32,

    /// Начальный объём воды капли
    #[serde(default = "default_initial_water_volume")]
    pub initial_water_volume: f32,

    /// Начальная скорость капли
    #[serde(default = "default_initial_speed")]
    pub initial_speed: f32,
}

fn default_erosion_enabled() -> bool {
    true
}
fn default_erosion_iterations() -> u32 {
    100_000
}
fn default_droplet_inertia() -> f32 {
    0.25
}
fn default_sediment_capacity_factor() -> f32 {
    10.0
}
fn default_min_sediment_capacity() -> f32 {
    0.01
}
fn default_erode_speed() -> f32 {
    0.3
}
fn default_deposit_speed() -> f32 {
    0.3
}
fn default_evaporate_speed() -> f32 {
    0.01
}
fn default_gravity() -> f32 {
    9.8
}
fn default_max_droplet_lifetime() -> u32 {
    50
}
fn default_initial_water_volume() -> f32 {
    0.5
}
fn default_initial_speed() -> f32 {
    2.0
}

impl Default for ErosionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            num_iterations: 100_000,
            droplet_inertia: 0.25,
            sediment_capacity_factor: 10.0,
            min_sediment_capacity: 0.01,
            erode_speed: 0.3,
            deposit_speed: 0.3,
            evaporate_speed: 0.01,
            gravity: 9.8,
            max_droplet_lifetime: 50,
            initial_water_volume: 0.5,
            initial_speed: 2.0,
        }
    }
}

/// Настройки генерации рек
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiverSettings {
    /// Включает генерацию рек
    #[serde(default)]
    pub enabled: bool,

    /// Количество рек за один запуск генерации
    #[serde(default = "default_river_count")]
    pub river_count: u32,

    /// Порог высоты истока: 1.0 — исток на самых высоких точках,
    /// 0.5 — начиная со средней высоты над уровнем моря
    #[serde(default = "default_start_point_threshold")]
    pub start_point_threshold_multiplier: f32,

    /// Допуск упрощения русла (алгоритм Рамера—Дугласа—Пекера),
    /// в мировых единицах
    #[serde(default = "default_simplify_epsilon")]
    pub simplify_epsilon: f32,

    /// Необязательный список заранее выбранных клеток-истоков `[x, y]`.
    /// Если список не пуст, поиск высоких точек по карте не выполняется.
    #[serde(default)]
    pub start_candidates: Vec<[u32; 2]>,
}

fn default_river_count() -> u32 {
    1
}
fn default_start_point_threshold() -> f32 {
    0.8
}
fn default_simplify_epsilon() -> f32 {
    200.0
}

impl Default for RiverSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            river_count: 1,
            start_point_threshold_multiplier: 0.8,
            simplify_epsilon: 200.0,
            start_candidates: Vec::new(),
        }
    }
}

/// Описание одного биома
///
/// Биом задаётся опорной точкой в пространстве температура/влажность;
/// клетки приписываются ближайшему биому.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiomeSettings {
    /// Уникальное имя биома (и имя его весового слоя)
    pub name: String,

    /// Опорная температура биома (градусы Цельсия)
    pub temperature: f32,

    /// Опорная влажность биома (0..1)
    pub humidity: f32,

    /// Цвет для визуализации карты биомов
    #[serde(default = "default_biome_color")]
    pub color: [u8; 3],
}

fn default_biome_color() -> [u8; 3] {
    [128, 128, 128]
}

fn default_water_biome() -> BiomeSettings {
    BiomeSettings {
        name: "Water".to_string(),
        temperature: 0.0,
        humidity: 1.0,
        color: [0, 64, 128],
    }
}

fn default_biomes() -> Vec<BiomeSettings> {
    vec![
        BiomeSettings {
            name: "Tundra".to_string(),
            temperature: -20.0,
            humidity: 0.3,
            color: [200, 220, 180],
        },
        BiomeSettings {
            name: "Taiga".to_string(),
            temperature: -5.0,
            humidity: 0.5,
            color: [100, 150, 100],
        },
        BiomeSettings {
            name: "Plains".to_string(),
            temperature: 12.0,
            humidity: 0.4,
            color: [150, 200, 100],
        },
        BiomeSettings {
            name: "Forest".to_string(),
            temperature: 18.0,
            humidity: 0.65,
            color: [60, 120, 60],
        },
        BiomeSettings {
            name: "Jungle".to_string(),
            temperature: 30.0,
            humidity: 0.85,
            color: [30, 100, 30],
        },
        BiomeSettings {
            name: "Desert".to_string(),
            temperature: 40.0,
            humidity: 0.1,
            color: [200, 180, 120],
        },
    ]
}

/// Основные параметры генерации уровня
///
/// Полная конфигурация одного запуска генерации. Поддерживает загрузку из TOML-файлов.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Сид генератора случайных чисел (детерминированная генерация)
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Ширина карты в клетках
    #[serde(default = "default_width")]
    pub width: u32,

    /// Высота карты в клетках
    #[serde(default = "default_height")]
    pub height: u32,

    /// Масштаб ландшафта: размер клетки в мировых единицах = 100 × масштаб
    #[serde(default = "default_landscape_scale")]
    pub landscape_scale: f32,

    /// Радиус сглаживания карты высот (0 = без сглаживания)
    #[serde(default)]
    pub smooth_radius: usize,

    /// Радиус размытия весовых слоёв биомов
    #[serde(default = "default_biome_blend_radius")]
    pub biome_blend_radius: usize,

    /// Радиус размытия весового слоя воды
    #[serde(default = "default_water_blend_radius")]
    pub water_blend_radius: usize,

    /// Настройки шума
    #[serde(default)]
    pub noise: NoiseSettings,

    /// Климатические настройки
    #[serde(default)]
    pub climate: ClimateSettings,

    /// Настройки маски острова
    #[serde(default)]
    pub island: IslandSettings,

    /// Настройки эрозии
    #[serde(default)]
    pub erosion: ErosionSettings,

    /// Настройки рек
    #[serde(default)]
    pub river: RiverSettings,

    /// Упорядоченный список биомов суши.
    /// Порядок объявления определяет разрешение ничьих при классификации.
    #[serde(default = "default_biomes")]
    pub biomes: Vec<BiomeSettings>,

    /// Выделенный водный биом: клетки на уровне моря и ниже приписываются
    /// ему без поиска ближайшего биома
    #[serde(default = "default_water_biome")]
    pub water_biome: BiomeSettings,
}

fn default_seed() -> u64 {
    1337
}
fn default_width() -> u32 {
    1009
}
fn default_height() -> u32 {
    1009
}
fn default_landscape_scale() -> f32 {
    1.0
}
fn default_biome_blend_radius() -> usize {
    10
}
fn default_water_blend_radius() -> usize {
    10
}

impl GenerationParams {
    /// Загружает параметры из TOML-файла
    ///
    /// # Ошибки
    /// Возвращает ошибку, если файл не найден или содержит недопустимый формат.
    pub fn from_toml_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)?;
        let params: Self = toml::from_str(&contents)?;
        Ok(params)
    }

    /// Проверяет параметры перед генерацией.
    ///
    /// Вызывается первой в конвейере: ни одна карта не строится
    /// по недопустимой конфигурации.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width < 1 || self.height < 1 {
            return Err(ConfigError::InvalidResolution(self.width, self.height));
        }
        if self.biomes.is_empty() {
            return Err(ConfigError::NoBiomes);
        }
        let mut seen = std::collections::HashSet::new();
        for biome in &self.biomes {
            if !seen.insert(biome.name.as_str()) {
                return Err(ConfigError::DuplicateBiomeName(biome.name.clone()));
            }
        }
        if self.climate.min_height >= self.climate.max_height {
            return Err(ConfigError::InvalidHeightRange(
                self.climate.min_height,
                self.climate.max_height,
            ));
        }
        if self.climate.min_temp >= self.climate.max_temp {
            return Err(ConfigError::InvalidTempRange(
                self.climate.min_temp,
                self.climate.max_temp,
            ));
        }
        if !(0.0..=1.0).contains(&self.climate.sea_level) {
            return Err(ConfigError::InvalidSeaLevel(self.climate.sea_level));
        }
        if self.noise.octaves < 1 {
            return Err(ConfigError::InvalidOctaves);
        }
        if self.noise.lacunarity <= 0.0 {
            return Err(ConfigError::InvalidLacunarity(self.noise.lacunarity));
        }
        if !(0.0..=1.0).contains(&self.noise.persistence) {
            return Err(ConfigError::InvalidPersistence(self.noise.persistence));
        }
        if self.climate.redistribution_factor < 1.0 {
            return Err(ConfigError::InvalidRedistributionFactor(
                self.climate.redistribution_factor,
            ));
        }
        if self.climate.moisture_falloff_rate < 0.0 {
            return Err(ConfigError::NegativeMoistureFalloff);
        }
        if self.river.simplify_epsilon < 0.0 {
            return Err(ConfigError::NegativeSimplifyEpsilon);
        }
        Ok(())
    }
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            seed: 1337,
            width: 1009,
            height: 1009,
            landscape_scale: 1.0,
            smooth_radius: 0,
            biome_blend_radius: 10,
            water_blend_radius: 10,
            noise: NoiseSettings::default(),
            climate: ClimateSettings::default(),
            island: IslandSettings::default(),
            erosion: ErosionSettings::default(),
            river: RiverSettings::default(),
            biomes: default_biomes(),
            water_biome: default_water_biome(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params_are_valid() {
        let params = GenerationParams::default();
        assert!(params.validate().is_ok());
    }

    #[test]
    fn zero_resolution_rejected() {
        let params = GenerationParams {
            width: 0,
            ..GenerationParams::default()
        };
        assert!(matches!(
            params.validate(),
            Err(ConfigError::InvalidResolution(0, _))
        ));
    }

    #[test]
    fn empty_biomes_rejected() {
        let params = GenerationParams {
            biomes: Vec::new(),
            ..GenerationParams::default()
        };
        assert!(matches!(params.validate(), Err(ConfigError::NoBiomes)));
    }

    #[test]
    fn duplicate_biome_names_rejected() {
        let mut params = GenerationParams::default();
        let copy = params.biomes[0].clone();
        params.biomes.push(copy);
        assert!(matches!(
            params.validate(),
            Err(ConfigError::DuplicateBiomeName(_))
        ));
    }

    #[test]
    fn sea_world_height_interpolates_range() {
        let climate = ClimateSettings {
            min_height: -100.0,
            max_height: 100.0,
            sea_level: 0.5,
            ..ClimateSettings::default()
        };
        assert!((climate.sea_world_height() - 0.0).abs() < f32::EPSILON);
    }

    #[test]
    fn params_roundtrip_through_toml() {
        let params = GenerationParams::default();
        let text = toml::to_string(&params).unwrap();
        let parsed: GenerationParams = toml::from_str(&text).unwrap();
        assert_eq!(parsed.seed, params.seed);
        assert_eq!(parsed.biomes.len(), params.biomes.len());
    }
}
