use image::{ImageBuffer, Luma, Rgba};

use crate::climate::ClimateMaps;
use crate::config::GenerationParams;
use crate::heightmap::{Heightmap, decode_world_height};

/// Индекс весового слоя воды.
pub const WATER_LAYER: usize = 0;

/// Карта биомов: жёсткая классификация плюс сглаженные весовые слои
///
/// Слой 0 всегда принадлежит водному биому, слои 1..=N — биомам суши
/// в порядке их объявления в конфигурации.
#[derive(Debug, Clone)]
pub struct BiomeMap {
    pub width: u32,
    pub height: u32,
    /// Индекс слоя, которому приписана клетка
    pub index: Vec<u16>,
    /// Имена слоёв (совпадают с именами биомов)
    pub layer_names: Vec<String>,
    /// Весовые слои, по одному на биом
    pub weight_layers: Vec<Vec<u8>>,
    /// Цвет биома на клетку (для визуализации)
    pub colors: Vec<[u8; 3]>,
}

/// Назначает биомы по высоте, температуре и влажности
///
/// Клетки на уровне моря и ниже безусловно уходят в водный биом, без
/// поиска ближайшего центроида. Клетки суши приписываются биому с
/// минимальным расстоянием в плоскости температура/влажность; при равных
/// расстояниях побеждает биом, объявленный раньше (строгое `<`).
#[must_use]
pub fn classify_biomes(
    params: &GenerationParams,
    heightmap: &Heightmap,
    climate: &ClimateMaps,
) -> BiomeMap {
    let width = heightmap.width;
    let height = heightmap.height;
    let total = (width * height) as usize;
    let layer_count = params.biomes.len() + 1;

    let mut layer_names = Vec::with_capacity(layer_count);
    layer_names.push(params.water_biome.name.clone());
    layer_names.extend(params.biomes.iter().map(|b| b.name.clone()));

    let mut map = BiomeMap {
        width,
        height,
        index: vec![0; total],
        layer_names,
        weight_layers: vec![vec![0; total]; layer_count],
        colors: vec![[0, 0, 0]; total],
    };

    let sea_world = params.climate.sea_world_height();
    // Влажность приводится к масштабу температуры, чтобы обе оси имели
    // сопоставимый вес в метрике расстояния
    let temp_range = params.climate.max_temp - params.climate.min_temp;

    for i in 0..total {
        let world = decode_world_height(heightmap.data[i]);

        let layer = if world <= sea_world {
            WATER_LAYER
        } else {
            let cell_temp = climate.temperature_at(i);
            let cell_humidity = climate.humidity_at(i);

            let mut best = 0;
            let mut min_dist = f32::MAX;
            for (bi, biome) in params.biomes.iter().enumerate() {
                let temp_diff = (biome.temperature - cell_temp).abs();
                let humidity_diff = (biome.humidity - cell_humidity).abs() * temp_range;
                let dist = (temp_diff * temp_diff + humidity_diff * humidity_diff).sqrt();
                if dist < min_dist {
                    min_dist = dist;
                    best = bi;
                }
            }
            best + 1
        };

        map.index[i] = layer as u16;
        map.weight_layers[layer][i] = 255;
        map.colors[i] = if layer == WATER_LAYER {
            params.water_biome.color
        } else {
            params.biomes[layer - 1].color
        };
    }

    blend_weights(&mut map, params);
    map
}

/// Сглаживает жёсткие весовые слои и нормирует суммы весов
///
/// Каждый слой размывается раздельным box-блюром с зажимом краёв; слой воды
/// использует собственный радиус. После размытия веса каждой клетки
/// масштабируются так, чтобы их сумма была равна 255; из-за округления
/// сумма может отличаться на пару единиц — это принято.
fn blend_weights(map: &mut BiomeMap, params: &GenerationParams) {
    let width = map.width as usize;
    let height = map.height as usize;

    for (layer_index, layer) in map.weight_layers.iter_mut().enumerate() {
        let radius = if layer_index == WATER_LAYER {
            params.water_blend_radius
        } else {
            params.biome_blend_radius
        };
        if radius > 0 {
            *layer = blur_layer(layer, width, height, radius);
        }
    }

    // Коррекция: сумма размытых весов каждой клетки приводится к 255
    let total_cells = width * height;
    for i in 0..total_cells {
        let total: f32 = map
            .weight_layers
            .iter()
            .map(|layer| f32::from(layer[i]))
            .sum();
        if total > 0.0 {
            let factor = 255.0 / total;
            for layer in &mut map.weight_layers {
                layer[i] = (f32::from(layer[i]) * factor).round() as u8;
            }
        }
    }
}

/// Box-блюр одного весового слоя: горизонтальные суммы скользящим окном,
/// затем вертикальный проход с делением на площадь окна и округлением.
fn blur_layer(layer: &[u8], width: usize, height: usize, radius: usize) -> Vec<u8> {
    let r = radius as i32;

    // Горизонтальный проход: сырые суммы окна
    let mut horizontal = vec![0.0_f32; layer.len()];
    for y in 0..height {
        let row = y * width;
        let mut sum = 0.0;
        for i in -r..=r {
            let x = i.clamp(0, width as i32 - 1) as usize;
            sum += f32::from(layer[row + x]);
        }
        horizontal[row] = sum;
        for x in 1..width {
            let old = (x as i32 - r - 1).clamp(0, width as i32 - 1) as usize;
            let new = (x as i32 + r).clamp(0, width as i32 - 1) as usize;
            sum += f32::from(layer[row + new]) - f32::from(layer[row + old]);
            horizontal[row + x] = sum;
        }
    }

    // Вертикальный проход: среднее по окну (2R+1)²
    let blend_factor = 1.0 / ((2 * radius + 1) * (2 * radius + 1)) as f32;
    let mut out = vec![0_u8; layer.len()];
    for x in 0..width {
        let mut sum = 0.0;
        for i in -r..=r {
            let y = i.clamp(0, height as i32 - 1) as usize;
            sum += horizontal[y * width + x];
        }
        out[x] = (sum * blend_factor).round() as u8;
        for y in 1..height {
            let old = (y as i32 - r - 1).clamp(0, height as i32 - 1) as usize;
            let new = (y as i32 + r).clamp(0, height as i32 - 1) as usize;
            sum += horizontal[new * width + x] - horizontal[old * width + x];
            out[y * width + x] = (sum * blend_factor).round() as u8;
        }
    }

    out
}

impl BiomeMap {
    pub fn to_rgba_image(&self) -> Vec<u8> {
        self.colors
            .iter()
            .flat_map(|rgb| [rgb[0], rgb[1], rgb[2], 255])
            .collect()
    }

    pub fn save_as_png(&self, path: &str) -> Result<(), Box<dyn std::error::Error>> {
        let img: ImageBuffer<Rgba<u8>, Vec<u8>> =
            ImageBuffer::from_raw(self.width, self.height, self.to_rgba_image())
                .ok_or("Failed to create image buffer")?;
        img.save(path)?;
        Ok(())
    }

    /// Сохраняет один весовой слой как 8-битную серую карту.
    pub fn save_weight_layer_png(
        &self,
        layer: usize,
        path: &str,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let img: ImageBuffer<Luma<u8>, Vec<u8>> =
            ImageBuffer::from_raw(self.width, self.height, self.weight_layers[layer].clone())
                .ok_or("Failed to create image buffer")?;
        img.save(path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BiomeSettings, ClimateSettings, GenerationParams};

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

    fn scenario_climate_maps() -> ClimateMaps {
        ClimateMaps {
            width: 5,
            height: 5,
            temperature: vec![32768; 25],
            humidity: vec![20000; 25],
            min_temp: -5.0,
            max_temp: 25.0,
            min_humidity: 0.0,
            max_humidity: 1.0,
        }
    }

    fn scenario_params(biomes: Vec<BiomeSettings>) -> GenerationParams {
        GenerationParams {
            width: 5,
            height: 5,
            climate: ClimateSettings {
                sea_level: 0.4,
                ..ClimateSettings::default()
            },
            biome_blend_radius: 0,
            water_blend_radius: 0,
            biomes,
            ..GenerationParams::default()
        }
    }

    fn plains() -> BiomeSettings {
        BiomeSettings {
            name: "Plains".to_string(),
            temperature: 12.0,
            humidity: 0.4,
            color: [150, 200, 100],
        }
    }

    #[test]
    fn water_row_and_plains_rest() {
        let params = scenario_params(vec![plains()]);
        let map = classify_biomes(&params, &scenario_heightmap(), &scenario_climate_maps());
        for x in 0..5_usize {
            assert_eq!(map.index[x], 0, "ряд 0 — вода");
        }
        for i in 5..25_usize {
            assert_eq!(map.index[i], 1, "суша — Plains");
        }
    }

    #[test]
    fn hard_weights_without_blur() {
        let params = scenario_params(vec![plains()]);
        let map = classify_biomes(&params, &scenario_heightmap(), &scenario_climate_maps());
        for i in 0..25_usize {
            let water = map.weight_layers[WATER_LAYER][i];
            let land = map.weight_layers[1][i];
            assert_eq!(u16::from(water) + u16::from(land), 255);
        }
    }

    #[test]
    fn first_biome_wins_ties() {
        // Два биома с одинаковыми центроидами: побеждает объявленный раньше
        let mut twin = plains();
        twin.name = "Steppe".to_string();
        let params = scenario_params(vec![plains(), twin]);
        let map = classify_biomes(&params, &scenario_heightmap(), &scenario_climate_maps());
        for i in 5..25_usize {
            assert_eq!(map.index[i], 1);
        }
    }

    #[test]
    fn blended_weights_sum_close_to_255() {
        let params = GenerationParams {
            biome_blend_radius: 2,
            water_blend_radius: 2,
            ..scenario_params(vec![plains()])
        };
        let map = classify_biomes(&params, &scenario_heightmap(), &scenario_climate_maps());
        for i in 0..25_usize {
            let total: u32 = map
                .weight_layers
                .iter()
                .map(|layer| u32::from(layer[i]))
                .sum();
            assert!(
                (253..=255).contains(&total),
                "сумма весов {total} в клетке {i}"
            );
        }
    }

    #[test]
    fn layer_names_follow_declaration_order() {
        let params = scenario_params(vec![plains()]);
        let map = classify_biomes(&params, &scenario_heightmap(), &scenario_climate_maps());
        assert_eq!(map.layer_names[WATER_LAYER], "Water");
        assert_eq!(map.layer_names[1], "Plains");
    }
}
