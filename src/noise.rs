//! Детерминированный 2D когерентный шум с фрактальной суммой октав.

use fastnoise_lite::{FastNoiseLite, NoiseType};
use rand::{Rng, SeedableRng};

use crate::config::NoiseSettings;

/// Смещения доменов шума, выведенные из сида.
///
/// Каждое поле шума получает собственное смещение, чтобы континент, детали,
/// остров и температура не повторяли друг друга при одном сиде.
#[derive(Debug, Clone, Copy)]
pub struct NoiseOffsets {
    pub continent: (f32, f32),
    pub detail: (f32, f32),
    pub island: (f32, f32),
    pub temperature: (f32, f32),
}

impl NoiseOffsets {
    /// Выводит смещения из сида через отдельный поток ChaCha8.
    ///
    /// Порядок выборки фиксирован: он является частью контракта
    /// детерминированности (один сид — одна карта).
    #[must_use]
    pub fn from_seed(seed: u64, standard_offset: f32) -> Self {
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(seed);
        let next = |rng: &mut rand_chacha::ChaCha8Rng| {
            if standard_offset > 0.0 {
                (
                    rng.gen_range(-standard_offset..=standard_offset),
                    rng.gen_range(-standard_offset..=standard_offset),
                )
            } else {
                (0.0, 0.0)
            }
        };
        Self {
            continent: next(&mut rng),
            detail: next(&mut rng),
            island: next(&mut rng),
            temperature: next(&mut rng),
        }
    }
}

/// Поле когерентного шума Перлина с фиксированной частотой и смещением домена.
///
/// Никакого глобального состояния: значение зависит только от сида,
/// координат и конфигурации.
pub struct NoiseField {
    noise: FastNoiseLite,
    scale: f32,
    offset: (f32, f32),
}

impl NoiseField {
    #[must_use]
    pub fn new(seed: i32, scale: f32, offset: (f32, f32)) -> Self {
        let mut noise = FastNoiseLite::new();
        noise.set_seed(Some(seed));
        noise.set_noise_type(Some(NoiseType::Perlin));
        // Частота 1.0: масштаб применяется к координатам вручную,
        // чтобы октавная сумма управляла частотой сама
        noise.set_frequency(Some(1.0));
        Self {
            noise,
            scale,
            offset,
        }
    }

    /// Значение шума в диапазоне [-1, 1].
    #[must_use]
    pub fn sample(&self, x: f32, y: f32) -> f32 {
        self.noise.get_noise_2d(
            x * self.scale + self.offset.0,
            y * self.scale + self.offset.1,
        )
    }

    /// Значение шума, приведённое к диапазону [0, 1].
    #[must_use]
    pub fn sample_normalized(&self, x: f32, y: f32) -> f32 {
        self.sample(x, y) * 0.5 + 0.5
    }

    /// Фрактальная сумма октав (fBm).
    ///
    /// Амплитуда стартует с 1 и умножается на `persistence`, частота — на
    /// `lacunarity`. Результат делится на фактически накопленную сумму
    /// амплитуд, а не на константу геометрического ряда, и лежит в [-1, 1].
    #[must_use]
    pub fn fractal(&self, x: f32, y: f32, settings: &NoiseSettings) -> f32 {
        let mut amplitude = 1.0_f32;
        let mut frequency = 1.0_f32;
        let mut total = 0.0_f32;
        let mut amplitude_sum = 0.0_f32;

        for _ in 0..settings.octaves {
            let nx = x * self.scale * frequency + self.offset.0;
            let ny = y * self.scale * frequency + self.offset.1;
            total += self.noise.get_noise_2d(nx, ny) * amplitude;
            amplitude_sum += amplitude;
            amplitude *= settings.persistence;
            frequency *= settings.lacunarity;
        }

        total / amplitude_sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_samples() {
        let a = NoiseField::new(42, 0.01, (100.0, -250.0));
        let b = NoiseField::new(42, 0.01, (100.0, -250.0));
        for i in 0..32 {
            let (x, y) = (i as f32 * 3.7, i as f32 * -1.3);
            assert_eq!(a.sample(x, y), b.sample(x, y));
        }
    }

    #[test]
    fn different_seeds_differ() {
        let a = NoiseField::new(1, 0.01, (0.0, 0.0));
        let b = NoiseField::new(2, 0.01, (0.0, 0.0));
        let differs = (0..32).any(|i| {
            let (x, y) = (i as f32 * 5.1, i as f32 * 2.9);
            a.sample(x, y) != b.sample(x, y)
        });
        assert!(differs);
    }

    #[test]
    fn sample_stays_in_range() {
        let field = NoiseField::new(7, 0.013, (500.0, 500.0));
        for i in 0..256 {
            let (x, y) = (i as f32 * 1.7, i as f32 * 0.6);
            let v = field.sample(x, y);
            assert!((-1.0..=1.0).contains(&v), "значение {v} вне [-1, 1]");
            let n = field.sample_normalized(x, y);
            assert!((0.0..=1.0).contains(&n));
        }
    }

    #[test]
    fn fractal_normalized_by_amplitude_sum() {
        let settings = NoiseSettings {
            octaves: 5,
            ..NoiseSettings::default()
        };
        let field = NoiseField::new(9, 0.02, (0.0, 0.0));
        for i in 0..128 {
            let v = field.fractal(i as f32 * 2.3, i as f32 * 4.1, &settings);
            assert!((-1.0..=1.0).contains(&v), "фрактальная сумма {v} вне [-1, 1]");
        }
    }

    #[test]
    fn offsets_derived_deterministically() {
        let a = NoiseOffsets::from_seed(1337, 10000.0);
        let b = NoiseOffsets::from_seed(1337, 10000.0);
        assert_eq!(a.continent, b.continent);
        assert_eq!(a.detail, b.detail);
        assert_eq!(a.island, b.island);
        assert_eq!(a.temperature, b.temperature);
    }

    #[test]
    fn zero_offset_range_gives_zero_offsets() {
        let offsets = NoiseOffsets::from_seed(5, 0.0);
        assert_eq!(offsets.continent, (0.0, 0.0));
        assert_eq!(offsets.temperature, (0.0, 0.0));
    }
}
