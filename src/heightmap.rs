use crate::config::{ClimateSettings, ErosionSettings, GenerationParams};
use crate::noise::{NoiseField, NoiseOffsets};
use image::{ImageBuffer, Luma};
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

/// Смещение 16-битной кодировки высоты: 32768 соответствует мировой высоте 0.
pub const HEIGHT_BIAS: f32 = 32768.0;

/// Декодирует мировую высоту из хранимого значения.
#[must_use]
pub fn decode_world_height(value: u16) -> f32 {
    f32::from(value) - HEIGHT_BIAS
}

/// Кодирует мировую высоту в 16-битное значение со смещением.
#[must_use]
pub fn encode_world_height(world: f32) -> u16 {
    (world + HEIGHT_BIAS).round().clamp(0.0, 65535.0) as u16
}

/// Перераспределение значений: `x^k / (x^k + (1-x)^k)`.
///
/// Сигмоидное усиление контраста: середина диапазона растягивается к краям,
/// береговые линии и пики становятся резче. При `factor <= 1` и на границах
/// диапазона значение не меняется.
#[must_use]
pub fn redistribute(value: f32, factor: f32) -> f32 {
    if factor > 1.0 && value > 0.0 && value < 1.0 {
        let pow_x = value.powf(factor);
        let pow_inv = (1.0 - value).powf(factor);
        pow_x / (pow_x + pow_inv)
    } else {
        value
    }
}

/// Двумерная карта высот в 16-битной кодировке со смещением
#[derive(Debug, Clone)]
pub struct Heightmap {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u16>,
}

impl Heightmap {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; (width * height) as usize],
        }
    }

    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> u16 {
        self.data[(y * self.width + x) as usize]
    }

    pub fn set(&mut self, x: u32, y: u32, value: u16) {
        self.data[(y * self.width + x) as usize] = value;
    }

    /// Мировая высота клетки.
    #[must_use]
    pub fn world_height_at(&self, x: u32, y: u32) -> f32 {
        decode_world_height(self.get(x, y))
    }

    pub fn save_as_png(&self, path: &str) -> Result<(), Box<dyn std::error::Error>> {
        let img: ImageBuffer<Luma<u16>, Vec<u16>> =
            ImageBuffer::from_raw(self.width, self.height, self.data.clone())
                .ok_or("Failed to create image buffer")?;
        img.save(path)?;
        Ok(())
    }

    /// Сглаживает карту высот раздельным box-блюром с зажимом краёв.
    pub fn smooth(&mut self, radius: usize) {
        if radius == 0 {
            return;
        }
        let mut float_data: Vec<f32> = self.data.iter().map(|&v| f32::from(v)).collect();
        box_blur(
            &mut float_data,
            self.width as usize,
            self.height as usize,
            radius,
        );
        for (dst, src) in self.data.iter_mut().zip(&float_data) {
            *dst = src.round().clamp(0.0, 65535.0) as u16;
        }
    }

    /// Применяет капельную гидрологическую эрозию.
    ///
    /// Капли стартуют в случайных точках (отдельный поток ChaCha8 от сида),
    /// скатываются по градиенту с инерцией, размывают склоны и откладывают
    /// осадок. После прохода высота нигде не поднимается выше исходной, а
    /// клетки, стоявшие на уровне моря и выше, не опускаются под него.
    pub fn apply_hydraulic_erosion(
        &mut self,
        seed: u64,
        climate: &ClimateSettings,
        cfg: &ErosionSettings,
    ) {
        if !cfg.enabled || cfg.num_iterations == 0 {
            return;
        }
        let width = self.width as usize;
        let height = self.height as usize;
        // Капле нужна хотя бы одна внутренняя клетка
        if width < 3 || height < 3 {
            return;
        }

        let mut heights: Vec<f32> = self.data.iter().map(|&v| decode_world_height(v)).collect();
        let sea_height = climate.sea_world_height();
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(seed.wrapping_add(77));

        for _ in 0..cfg.num_iterations {
            let mut pos_x = rng.gen_range(1.0..(width - 1) as f32);
            let mut pos_y = rng.gen_range(1.0..(height - 1) as f32);
            let (mut dir_x, mut dir_y) = (0.0_f32, 0.0_f32);
            let mut speed = cfg.initial_speed;
            let mut water = cfg.initial_water_volume;
            let mut sediment = 0.0_f32;

            for _ in 0..cfg.max_droplet_lifetime {
                let node_x = pos_x as usize;
                let node_y = pos_y as usize;
                if node_x >= width - 1 || node_y >= height - 1 {
                    break;
                }
                let droplet_index = node_y * width + node_x;

                let (current_height, gradient) = height_and_gradient(&heights, width, pos_x, pos_y);

                // Инерция против градиента
                dir_x = dir_x * cfg.droplet_inertia - gradient.0 * (1.0 - cfg.droplet_inertia);
                dir_y = dir_y * cfg.droplet_inertia - gradient.1 * (1.0 - cfg.droplet_inertia);
                let len = (dir_x * dir_x + dir_y * dir_y).sqrt();
                if len > 1e-6 {
                    dir_x /= len;
                    dir_y /= len;
                }

                pos_x += dir_x;
                pos_y += dir_y;
                if pos_x <= 0.0
                    || pos_x >= (width - 1) as f32
                    || pos_y <= 0.0
                    || pos_y >= (height - 1) as f32
                {
                    break;
                }

                let (new_height, _) = height_and_gradient(&heights, width, pos_x, pos_y);
                if new_height <= sea_height {
                    break;
                }
                let height_difference = new_height - current_height;

                let sediment_capacity = (-height_difference
                    * speed
                    * water
                    * cfg.sediment_capacity_factor)
                    .max(cfg.min_sediment_capacity);

                if sediment > sediment_capacity || height_difference > 0.0 {
                    // Отложение: движение в гору или перегруз осадком
                    let amount_to_deposit = if height_difference > 0.0 {
                        sediment.min(height_difference)
                    } else {
                        (sediment - sediment_capacity) * cfg.deposit_speed
                    };
                    sediment -= amount_to_deposit;
                    heights[droplet_index] += amount_to_deposit;
                } else {
                    let amount_to_erode =
                        (sediment_capacity - sediment).min(-height_difference) * cfg.erode_speed;
                    heights[droplet_index] -= amount_to_erode;
                    sediment += amount_to_erode;
                }

                speed = (speed * speed - height_difference * cfg.gravity)
                    .max(0.0)
                    .sqrt();
                water *= 1.0 - cfg.evaporate_speed;
            }
        }

        let sea_encoded = encode_world_height(sea_height);
        for (stored, &eroded) in self.data.iter_mut().zip(&heights) {
            // Осадок не поднимает рельеф выше исходного
            let mut new_height = encode_world_height(eroded).min(*stored);
            // Суша не уходит под уровень моря
            if *stored >= sea_encoded {
                new_height = new_height.max(sea_encoded);
            }
            *stored = new_height;
        }
    }
}

/// Высота и градиент в дробной точке карты (билинейная интерполяция).
fn height_and_gradient(heights: &[f32], width: usize, pos_x: f32, pos_y: f32) -> (f32, (f32, f32)) {
    let coord_x = pos_x as usize;
    let coord_y = pos_y as usize;
    let x = pos_x - coord_x as f32;
    let y = pos_y - coord_y as f32;

    let index_00 = coord_y * width + coord_x;
    let h00 = heights[index_00];
    let h10 = heights[index_00 + 1];
    let h01 = heights[index_00 + width];
    let h11 = heights[index_00 + width + 1];

    let gradient_x = (h10 - h00) * (1.0 - y) + (h11 - h01) * y;
    let gradient_y = (h01 - h00) * (1.0 - x) + (h11 - h10) * x;
    let height_value =
        h00 * (1.0 - x) * (1.0 - y) + h10 * x * (1.0 - y) + h01 * (1.0 - x) * y + h11 * x * y;

    (height_value, (gradient_x, gradient_y))
}

/// Генерирует карту высот из континентального и детального шума
///
/// Континентальное значение управляет амплитудой деталей, перераспределение
/// усиливает контраст, необязательная маска острова опускает края карты.
#[must_use]
pub fn generate_heightmap(params: &GenerationParams, offsets: &NoiseOffsets) -> Heightmap {
    let width = params.width;
    let height = params.height;
    let width_f = width as f32;
    let height_f = height as f32;

    let continent_field = NoiseField::new(
        params.seed as i32,
        params.noise.continent_noise_scale,
        offsets.continent,
    );
    let detail_field = NoiseField::new(
        params.seed.wrapping_add(1000) as i32,
        params.noise.terrain_noise_scale,
        offsets.detail,
    );
    let island_field = NoiseField::new(
        params.seed.wrapping_add(2_000_000) as i32,
        params.island.shape_noise_scale,
        offsets.island,
    );

    let climate = &params.climate;
    let height_range = climate.max_height - climate.min_height;

    let data: Vec<u16> = (0..(width as usize * height as usize))
        .into_par_iter()
        .map(|i| {
            let x = (i % width as usize) as f32;
            let y = (i / width as usize) as f32;

            // === 1. Континентальный шум (одна октава, низкая частота) ===
            let continent = continent_field.sample_normalized(x, y);

            // === 2. Детальный рельеф (fBm, нормирован в [-1, 1]) ===
            let terrain = detail_field.fractal(x, y, &params.noise);

            // === 3. Континент управляет амплитудой деталей ===
            let combined = terrain * continent.powf(params.noise.continent_influence);
            let mut normalized = (combined * 0.5 + 0.5).clamp(0.0, 1.0);

            // === 4. Перераспределение ===
            normalized = redistribute(normalized, climate.redistribution_factor);

            // === 5. Маска острова ===
            if params.island.enabled {
                let nx = (x / width_f) * 2.0 - 1.0;
                let ny = (y / height_f) * 2.0 - 1.0;
                let distance = (nx * nx + ny * ny).sqrt();
                let distorted =
                    distance + island_field.sample(x, y) * params.island.shape_noise_strength;
                let mut mask = ((1.0 - distorted) * 3.0).clamp(0.0, 1.0);
                mask = mask.powf(params.island.falloff_exponent).clamp(0.0, 1.0);
                normalized = (normalized * mask).clamp(0.0, 1.0);
            }

            // === 6. Мировая высота и кодирование ===
            let world = climate.min_height + normalized * height_range;
            encode_world_height(world)
        })
        .collect();

    Heightmap {
        width,
        height,
        data,
    }
}

/// Раздельный box-блюр: горизонтальный и вертикальный проходы скользящим окном.
///
/// Координаты на краях зажимаются к допустимому диапазону (без заворачивания),
/// поэтому краевые значения дублируются — лёгкая асимметрия у границ принята.
pub fn box_blur(data: &mut [f32], width: usize, height: usize, radius: usize) {
    if radius == 0 || width == 0 || height == 0 {
        return;
    }
    let r = radius as i32;
    let window = (2 * radius + 1) as f32;

    // 1. Горизонтальный проход
    let mut temp = vec![0.0_f32; data.len()];
    for y in 0..height {
        let row = y * width;
        let mut sum = 0.0;
        for i in -r..=r {
            let x = i.clamp(0, width as i32 - 1) as usize;
            sum += data[row + x];
        }
        temp[row] = sum / window;
        for x in 1..width {
            let old = (x as i32 - r - 1).clamp(0, width as i32 - 1) as usize;
            let new = (x as i32 + r).clamp(0, width as i32 - 1) as usize;
            sum += data[row + new] - data[row + old];
            temp[row + x] = sum / window;
        }
    }

    // 2. Вертикальный проход
    for x in 0..width {
        let mut sum = 0.0;
        for i in -r..=r {
            let y = i.clamp(0, height as i32 - 1) as usize;
            sum += temp[y * width + x];
        }
        data[x] = sum / window;
        for y in 1..height {
            let old = (y as i32 - r - 1).clamp(0, height as i32 - 1) as usize;
            let new = (y as i32 + r).clamp(0, height as i32 - 1) as usize;
            sum += temp[new * width + x] - temp[old * width + x];
            data[y * width + x] = sum / window;
        }
    }
}
