//! Карты температуры и влажности.
//!
//! Температура складывается из низкочастотного шума и высотной поправки,
//! влажность — из расстояния до ближайшей воды (многоисточниковый BFS)
//! и температурного осушения.

use std::collections::VecDeque;

use image::{ImageBuffer, Luma};
use log::debug;

use crate::config::GenerationParams;
use crate::heightmap::{Heightmap, decode_world_height, redistribute};
use crate::noise::{NoiseField, NoiseOffsets};

/// Расстояние «не достигнуто» в трансформации расстояний до воды.
pub const UNREACHED: u32 = u32::MAX;

/// Климатические карты одного запуска генерации.
///
/// Значения хранятся нормированными в u16; глобальные минимумы и максимумы
/// обоих полей возвращаются явно — они нужны для обратной денормализации
/// при классификации биомов.
#[derive(Debug, Clone)]
pub struct ClimateMaps {
    pub width: u32,
    pub height: u32,
    pub temperature: Vec<u16>,
    pub humidity: Vec<u16>,
    /// Наблюдённый минимум температуры (соответствует хранимому 0)
    pub min_temp: f32,
    /// Наблюдённый максимум температуры (соответствует хранимому 65535)
    pub max_temp: f32,
    /// Наблюдённый минимум влажности
    pub min_humidity: f32,
    /// Наблюдённый максимум влажности
    pub max_humidity: f32,
}

impl ClimateMaps {
    /// Температура клетки в градусах (денормализация через глобальный диапазон).
    #[must_use]
    pub fn temperature_at(&self, index: usize) -> f32 {
        let alpha = f32::from(self.temperature[index]) / 65535.0;
        self.min_temp + alpha * (self.max_temp - self.min_temp)
    }

    /// Влажность клетки в диапазоне наблюдённых значений.
    #[must_use]
    pub fn humidity_at(&self, index: usize) -> f32 {
        let alpha = f32::from(self.humidity[index]) / 65535.0;
        self.min_humidity + alpha * (self.max_humidity - self.min_humidity)
    }

    pub fn save_temperature_png(&self, path: &str) -> Result<(), Box<dyn std::error::Error>> {
        save_u16_map(self.width, self.height, &self.temperature, path)
    }

    pub fn save_humidity_png(&self, path: &str) -> Result<(), Box<dyn std::error::Error>> {
        save_u16_map(self.width, self.height, &self.humidity, path)
    }
}

fn save_u16_map(
    width: u32,
    height: u32,
    data: &[u16],
    path: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let img: ImageBuffer<Luma<u16>, Vec<u16>> =
        ImageBuffer::from_raw(width, height, data.to_vec())
            .ok_or("Failed to create image buffer")?;
    img.save(path)?;
    Ok(())
}

/// Генерирует обе климатические карты по готовой карте высот.
#[must_use]
pub fn generate_climate(
    params: &GenerationParams,
    offsets: &NoiseOffsets,
    heightmap: &Heightmap,
) -> ClimateMaps {
    let (temperature, min_temp, max_temp) = generate_temperature(params, offsets, heightmap);
    let (humidity, min_humidity, max_humidity) = generate_humidity(params, heightmap, &temperature);
    ClimateMaps {
        width: heightmap.width,
        height: heightmap.height,
        temperature,
        humidity,
        min_temp,
        max_temp,
        min_humidity,
        max_humidity,
    }
}

/// Карта температуры: шумовая база плюс высотная поправка.
///
/// Возвращает нормированную карту и наблюдённый диапазон (минимум, максимум).
fn generate_temperature(
    params: &GenerationParams,
    offsets: &NoiseOffsets,
    heightmap: &Heightmap,
) -> (Vec<u16>, f32, f32) {
    let climate = &params.climate;
    let width = heightmap.width as usize;
    let height = heightmap.height as usize;
    let total = width * height;

    let field = NoiseField::new(
        params.seed.wrapping_add(500) as i32,
        params.noise.temperature_noise_scale,
        offsets.temperature,
    );

    let sea_world = climate.sea_world_height();
    let temp_range = climate.max_temp - climate.min_temp;

    let mut float_map = vec![0.0_f32; total];
    let mut global_min = f32::MAX;
    let mut global_max = f32::MIN;

    for y in 0..height {
        for x in 0..width {
            let index = y * width + x;

            // === 1. Базовая температура из очень низкочастотного шума ===
            let alpha = field.sample_normalized(x as f32, y as f32);
            let mut temp = climate.min_temp + alpha * temp_range;

            // === 2. Высотная поправка относительно уровня моря ===
            // Выше уровня моря температура падает, ниже — растёт
            let world = decode_world_height(heightmap.data[index]);
            temp -= ((world - sea_world) / 1000.0) * climate.temp_drop_per_1000_units;

            // === 3. Перераспределение нормированной температуры ===
            let mut normalized = (temp - climate.min_temp) / temp_range;
            normalized = redistribute(normalized, climate.redistribution_factor);
            temp = climate.min_temp + normalized * temp_range;
            temp = temp.clamp(climate.min_temp, climate.max_temp);

            float_map[index] = temp;
            global_min = global_min.min(temp);
            global_max = global_max.max(temp);
        }
    }

    debug!("температура: наблюдённый диапазон [{global_min}, {global_max}]");

    // === 4. Перевод float-карты в u16 по наблюдённому диапазону ===
    let range = guard_range(global_max - global_min);
    let map = float_map
        .iter()
        .map(|&t| (((t - global_min) / range) * 65535.0).round() as u16)
        .collect();

    (map, global_min, global_max)
}

/// Карта влажности по расстоянию до воды и температуре.
fn generate_humidity(
    params: &GenerationParams,
    heightmap: &Heightmap,
    temperature: &[u16],
) -> (Vec<u16>, f32, f32) {
    let climate = &params.climate;
    let total = heightmap.data.len();

    // === Проход 1: расстояние до ближайшей воды ===
    let distance = distance_to_water(heightmap, climate.sea_world_height());

    // === Проход 2: влажность из расстояния и температуры ===
    let mut float_map = vec![0.0_f32; total];
    let mut global_min = f32::MAX;
    let mut global_max = f32::MIN;

    for i in 0..total {
        let final_humidity = if distance[i] == 0 {
            // Водная клетка: влажность максимальна независимо от температуры
            1.0
        } else {
            let dist = if distance[i] == UNREACHED {
                // Воды на карте нет: влажность уходит к полу спада
                f32::INFINITY
            } else {
                distance[i] as f32
            };
            let humidity_from_distance = (-dist * climate.moisture_falloff_rate).exp();
            let normalized_temp = f32::from(temperature[i]) / 65535.0;
            let humidity = humidity_from_distance
                * (1.0 - normalized_temp * climate.temperature_influence_on_humidity);
            redistribute(humidity.clamp(0.0, 1.0), climate.redistribution_factor)
        };

        float_map[i] = final_humidity;
        global_min = global_min.min(final_humidity);
        global_max = global_max.max(final_humidity);
    }

    debug!("влажность: наблюдённый диапазон [{global_min}, {global_max}]");

    let range = guard_range(global_max - global_min);
    let map = float_map
        .iter()
        .map(|&h| (((h - global_min) / range) * 65535.0).round() as u16)
        .collect();

    (map, global_min, global_max)
}

/// Целочисленное геодезическое расстояние каждой клетки до ближайшей воды.
///
/// Многоисточниковый поиск в ширину: все клетки на уровне моря и ниже —
/// источники с расстоянием 0, очередь FIFO, 4-связные соседи, расстояние
/// записывается один раз (первым достигшим). Клетки, до которых вода не
/// дотягивается (карта без воды), остаются со значением [`UNREACHED`].
#[must_use]
pub fn distance_to_water(heightmap: &Heightmap, sea_world_height: f32) -> Vec<u32> {
    let width = heightmap.width as i32;
    let height = heightmap.height as i32;
    let mut distance = vec![UNREACHED; heightmap.data.len()];
    let mut frontier = VecDeque::new();

    for y in 0..height {
        for x in 0..width {
            let index = (y * width + x) as usize;
            if decode_world_height(heightmap.data[index]) <= sea_world_height {
                distance[index] = 0;
                frontier.push_back((x, y));
            }
        }
    }

    const NEIGHBORS: [(i32, i32); 4] = [(0, 1), (0, -1), (1, 0), (-1, 0)];

    while let Some((x, y)) = frontier.pop_front() {
        let current = distance[(y * width + x) as usize];
        for (dx, dy) in NEIGHBORS {
            let nx = x + dx;
            let ny = y + dy;
            if nx >= 0 && nx < width && ny >= 0 && ny < height {
                let neighbor_index = (ny * width + nx) as usize;
                if distance[neighbor_index] == UNREACHED {
                    distance[neighbor_index] = current + 1;
                    frontier.push_back((nx, ny));
                }
            }
        }
    }

    distance
}

/// Пол диапазона для защиты от деления на ноль при вырожденном поле.
fn guard_range(range: f32) -> f32 {
    if range < 1e-6 { 1.0 } else { range }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClimateSettings, ErosionSettings, GenerationParams};
    use crate::heightmap::generate_heightmap;

    /// Плоская карта 5×5: ряд 0 — вода (20000), остальное — суша (30000).
    fn scenario_heightmap() -> Heightmap {
        let mut map = Heightmap {
            width: 5,
            height: 5,
            data: vec![30000; 25],
        };
        for x in 0..5 {
            map.set(x, 0, 20000);
        }
        map
    }

    /// Климат, при котором 20000 декодируется ниже уровня моря, а 30000 — выше.
    fn scenario_climate() -> ClimateSettings {
        // sea_world = -15000 + 0.4 × 35000 = -1000;
        // вода: 20000 − 32768 = −12768 ≤ −1000; суша: 30000 − 32768 = −2768 > −1000
        ClimateSettings {
            sea_level: 0.4,
            // Быстрый спад, чтобы суша была заметно суше воды
            moisture_falloff_rate: 0.5,
            ..ClimateSettings::default()
        }
    }

    fn scenario_params() -> GenerationParams {
        GenerationParams {
            width: 5,
            height: 5,
            climate: scenario_climate(),
            ..GenerationParams::default()
        }
    }

    #[test]
    fn bfs_distances_grow_by_rows() {
        let map = scenario_heightmap();
        let distance = distance_to_water(&map, scenario_climate().sea_world_height());
        for x in 0..5_usize {
            assert_eq!(distance[x], 0, "ряд 0 — источники воды");
            for y in 1..5_usize {
                assert_eq!(distance[y * 5 + x], y as u32);
            }
        }
    }

    #[test]
    fn bfs_zero_distance_only_at_water() {
        let map = scenario_heightmap();
        let sea = scenario_climate().sea_world_height();
        let distance = distance_to_water(&map, sea);
        for y in 0..5_u32 {
            for x in 0..5_u32 {
                let is_water = decode_world_height(map.get(x, y)) <= sea;
                assert_eq!(distance[(y * 5 + x) as usize] == 0, is_water);
            }
        }
    }

    #[test]
    fn map_without_water_stays_unreached() {
        let map = Heightmap {
            width: 4,
            height: 4,
            data: vec![40000; 16],
        };
        let distance = distance_to_water(&map, scenario_climate().sea_world_height());
        assert!(distance.iter().all(|&d| d == UNREACHED));
    }

    #[test]
    fn water_cells_have_max_humidity() {
        let params = scenario_params();
        let map = scenario_heightmap();
        let offsets =
            crate::noise::NoiseOffsets::from_seed(params.seed, params.noise.standard_noise_offset);
        let climate = generate_climate(&params, &offsets, &map);
        for x in 0..5_usize {
            assert_eq!(climate.humidity[x], 65535, "вода в ({x}, 0)");
        }
        // Суша строго суше воды
        for y in 1..5_usize {
            for x in 0..5_usize {
                assert!(climate.humidity[y * 5 + x] < 65535);
            }
        }
    }

    #[test]
    fn decoded_temperatures_stay_in_observed_range() {
        let params = GenerationParams {
            width: 12,
            height: 12,
            erosion: ErosionSettings {
                enabled: false,
                ..ErosionSettings::default()
            },
            ..GenerationParams::default()
        };
        let offsets =
            crate::noise::NoiseOffsets::from_seed(params.seed, params.noise.standard_noise_offset);
        let map = generate_heightmap(&params, &offsets);
        let climate = generate_climate(&params, &offsets, &map);
        assert!(climate.min_temp <= climate.max_temp);
        for i in 0..climate.temperature.len() {
            let t = climate.temperature_at(i);
            assert!(t >= climate.min_temp - 1e-3 && t <= climate.max_temp + 1e-3);
        }
    }

    #[test]
    fn climate_is_deterministic() {
        let params = scenario_params();
        let map = scenario_heightmap();
        let offsets =
            crate::noise::NoiseOffsets::from_seed(params.seed, params.noise.standard_noise_offset);
        let a = generate_climate(&params, &offsets, &map);
        let b = generate_climate(&params, &offsets, &map);
        assert_eq!(a.temperature, b.temperature);
        assert_eq!(a.humidity, b.humidity);
    }
}
