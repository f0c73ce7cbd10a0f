//! Прокладка русел рек: поиск пути наименьшей стоимости от высокой точки
//! до уровня моря и упрощение полученной ломаной.

use std::collections::{HashMap, HashSet};

use image::{ImageBuffer, Luma};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};
use log::{info, warn};
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::config::GenerationParams;
use crate::heightmap::{Heightmap, decode_world_height};

/// Точка русла в мировых координатах.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct WorldPoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Русло одной реки: упорядоченная ломаная от истока к морю.
#[derive(Debug, Clone, Serialize)]
pub struct RiverPath {
    pub points: Vec<WorldPoint>,
}

/// Генерирует реки по готовой карте высот
///
/// Каждая река прокладывается независимо; результаты предыдущих запусков не
/// сохраняются. Река, не нашедшая пути к морю, пропускается без ошибки —
/// остальные карты от этого не страдают.
#[must_use]
pub fn generate_rivers(params: &GenerationParams, heightmap: &Heightmap) -> Vec<RiverPath> {
    if !params.river.enabled || params.river.river_count == 0 {
        return Vec::new();
    }

    let sea_world = params.climate.sea_world_height();
    let start_points = cache_start_points(params, heightmap, sea_world);
    let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(params.seed.wrapping_add(9001));
    let cell_size = 100.0 * params.landscape_scale;

    let mut rivers = Vec::new();
    for _ in 0..params.river.river_count {
        let start = if start_points.is_empty() {
            // Кандидатов нет — стартуем из центра карты
            (params.width as i32 / 2, params.height as i32 / 2)
        } else {
            start_points[rng.gen_range(0..start_points.len())]
        };

        match find_river_path(heightmap, start, sea_world) {
            Some(cells) => {
                let points: Vec<WorldPoint> = cells
                    .iter()
                    .map(|&(x, y)| WorldPoint {
                        x: x as f32 * cell_size,
                        y: y as f32 * cell_size,
                        z: decode_world_height(heightmap.get(x as u32, y as u32)),
                    })
                    .collect();
                let simplified = simplify_rdp(&points, params.river.simplify_epsilon);
                info!(
                    "река из ({}, {}): {} точек, после упрощения {}",
                    start.0,
                    start.1,
                    points.len(),
                    simplified.len()
                );
                rivers.push(RiverPath { points: simplified });
            }
            None => {
                warn!(
                    "река из ({}, {}) не нашла пути к уровню моря",
                    start.0, start.1
                );
            }
        }
    }

    rivers
}

/// Собирает клетки-кандидаты для истоков рек.
///
/// Кандидаты из конфигурации имеют приоритет; иначе берутся все клетки с
/// мировой высотой не ниже порога `sea + (max − sea) × multiplier`.
fn cache_start_points(
    params: &GenerationParams,
    heightmap: &Heightmap,
    sea_world: f32,
) -> Vec<(i32, i32)> {
    if !params.river.start_candidates.is_empty() {
        return params
            .river
            .start_candidates
            .iter()
            .filter(|p| p[0] < params.width && p[1] < params.height)
            .map(|p| (p[0] as i32, p[1] as i32))
            .collect();
    }

    let multiplier = params
        .river
        .start_point_threshold_multiplier
        .clamp(0.0, 1.0);
    let high_threshold = sea_world + (params.climate.max_height - sea_world) * multiplier;

    let mut points = Vec::new();
    for y in 0..heightmap.height {
        for x in 0..heightmap.width {
            if heightmap.world_height_at(x, y) >= high_threshold {
                points.push((x as i32, y as i32));
            }
        }
    }
    points
}

/// Поиск пути от истока до первой клетки на уровне моря или ниже.
///
/// Открытый список хранит пары (клетка, приоритет), минимум извлекается
/// линейным проходом — на таких размерах сетки куча не нужна. Эвристика
/// вычитает мировую высоту моря из сырого 16-битного значения высоты:
/// единицы намеренно смешаны, поиск от этого лишь жаднее к низкому
/// рельефу, а проверка завершения выполняется в декодированных единицах.
/// Клетка, уже финализированная при извлечении, повторно не обрабатывается.
fn find_river_path(
    heightmap: &Heightmap,
    start: (i32, i32),
    sea_world: f32,
) -> Option<Vec<(i32, i32)>> {
    let width = heightmap.width as i32;
    let height = heightmap.height as i32;

    let mut frontier: Vec<((i32, i32), f32)> = vec![(start, 0.0)];
    let mut came_from: HashMap<(i32, i32), (i32, i32)> = HashMap::from([(start, start)]);
    let mut cost_so_far: HashMap<(i32, i32), f32> = HashMap::from([(start, 0.0)]);
    let mut closed: HashSet<(i32, i32)> = HashSet::new();

    let mut goal = None;

    while !frontier.is_empty() {
        let mut best = 0;
        for i in 1..frontier.len() {
            if frontier[i].1 < frontier[best].1 {
                best = i;
            }
        }
        let (current, _) = frontier.swap_remove(best);

        // Устаревшие дубликаты в открытом списке отбрасываются
        if !closed.insert(current) {
            continue;
        }

        let stored = heightmap.get(current.0 as u32, current.1 as u32);
        if decode_world_height(stored) <= sea_world {
            goal = Some(current);
            break;
        }

        for dx in -1..=1 {
            for dy in -1..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let neighbor = (current.0 + dx, current.1 + dy);
                if neighbor.0 < 0 || neighbor.0 >= width || neighbor.1 < 0 || neighbor.1 >= height {
                    continue;
                }

                let new_cost = cost_so_far[&current] + 1.0;
                if cost_so_far
                    .get(&neighbor)
                    .is_none_or(|&existing| new_cost < existing)
                {
                    cost_so_far.insert(neighbor, new_cost);
                    let neighbor_stored =
                        heightmap.get(neighbor.0 as u32, neighbor.1 as u32);
                    let heuristic = f32::from(neighbor_stored) - sea_world;
                    frontier.push((neighbor, new_cost + heuristic));
                    came_from.insert(neighbor, current);
                }
            }
        }
    }

    goal.map(|goal_point| {
        let mut path = Vec::new();
        let mut current = goal_point;
        while current != start {
            path.push(current);
            current = came_from[&current];
        }
        path.push(start);
        path.reverse();
        path
    })
}

/// Упрощение ломаной алгоритмом Рамера—Дугласа—Пекера.
///
/// Сохраняются первая и последняя точки и точки, отклоняющиеся от хорды
/// больше чем на `epsilon`. Вход короче трёх точек возвращается как есть.
#[must_use]
pub fn simplify_rdp(points: &[WorldPoint], epsilon: f32) -> Vec<WorldPoint> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let end = points.len() - 1;
    let mut index = 0;
    let mut dmax = 0.0_f32;
    for (i, point) in points.iter().enumerate().take(end).skip(1) {
        let d = point_to_segment_distance(point, &points[0], &points[end]);
        if d > dmax {
            index = i;
            dmax = d;
        }
    }

    if dmax > epsilon {
        let mut left = simplify_rdp(&points[..=index], epsilon);
        let right = simplify_rdp(&points[index..], epsilon);
        // Точка разбиения входит в обе половины
        left.pop();
        left.extend(right);
        left
    } else {
        vec![points[0], points[end]]
    }
}

/// Расстояние от точки до отрезка (с зажимом на концы отрезка).
fn point_to_segment_distance(p: &WorldPoint, a: &WorldPoint, b: &WorldPoint) -> f32 {
    let ab = (b.x - a.x, b.y - a.y, b.z - a.z);
    let ap = (p.x - a.x, p.y - a.y, p.z - a.z);
    let len_sq = ab.0 * ab.0 + ab.1 * ab.1 + ab.2 * ab.2;
    let t = if len_sq <= f32::EPSILON {
        0.0
    } else {
        ((ap.0 * ab.0 + ap.1 * ab.1 + ap.2 * ab.2) / len_sq).clamp(0.0, 1.0)
    };
    let closest = (a.x + ab.0 * t, a.y + ab.1 * t, a.z + ab.2 * t);
    let d = (p.x - closest.0, p.y - closest.1, p.z - closest.2);
    (d.0 * d.0 + d.1 * d.1 + d.2 * d.2).sqrt()
}

/// Сохраняет превью русел поверх тёмного фона.
pub fn save_rivers_png(
    rivers: &[RiverPath],
    width: u32,
    height: u32,
    landscape_scale: f32,
    path: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let cell_size = 100.0 * landscape_scale;
    let mut img: ImageBuffer<Luma<u8>, Vec<u8>> = ImageBuffer::from_pixel(width, height, Luma([0]));

    for river in rivers {
        for pair in river.points.windows(2) {
            draw_line_segment_mut(
                &mut img,
                (pair[0].x / cell_size, pair[0].y / cell_size),
                (pair[1].x / cell_size, pair[1].y / cell_size),
                Luma([255_u8]),
            );
        }
        for point in &river.points {
            draw_filled_circle_mut(
                &mut img,
                ((point.x / cell_size) as i32, (point.y / cell_size) as i32),
                1,
                Luma([255_u8]),
            );
        }
    }

    img.save(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClimateSettings, GenerationParams, RiverSettings};

    /// Плоская карта: ряд 0 — вода (20000), остальное — суша (30000).
    fn flat_heightmap(width: u32, height: u32) -> Heightmap {
        let mut map = Heightmap {
            width,
            height,
            data: vec![30000; (width * height) as usize],
        };
        for x in 0..width {
            map.set(x, 0, 20000);
        }
        map
    }

    fn river_params(width: u32, height: u32) -> GenerationParams {
        GenerationParams {
            width,
            height,
            climate: ClimateSettings {
                sea_level: 0.4,
                ..ClimateSettings::default()
            },
            river: RiverSettings {
                enabled: true,
                river_count: 1,
                simplify_epsilon: 0.0,
                start_candidates: vec![[4, 8]],
                ..RiverSettings::default()
            },
            ..GenerationParams::default()
        }
    }

    fn point(x: f32, y: f32, z: f32) -> WorldPoint {
        WorldPoint { x, y, z }
    }

    #[test]
    fn path_reaches_sea_level() {
        let params = river_params(9, 9);
        let map = flat_heightmap(9, 9);
        let sea_world = params.climate.sea_world_height();
        let path = find_river_path(&map, (4, 8), sea_world).expect("путь должен существовать");

        assert_eq!(path[0], (4, 8));
        let (gx, gy) = *path.last().unwrap();
        assert!(decode_world_height(map.get(gx as u32, gy as u32)) <= sea_world);
        // Каждый шаг — на соседнюю клетку (8-связность), стоимость не убывает
        for pair in path.windows(2) {
            let (ax, ay) = pair[0];
            let (bx, by) = pair[1];
            assert!((ax - bx).abs() <= 1 && (ay - by).abs() <= 1);
            assert_ne!(pair[0], pair[1]);
        }
    }

    #[test]
    fn no_water_means_no_river() {
        let params = GenerationParams {
            river: RiverSettings {
                enabled: true,
                river_count: 2,
                start_candidates: vec![[2, 2]],
                ..RiverSettings::default()
            },
            ..river_params(4, 4)
        };
        let map = Heightmap {
            width: 4,
            height: 4,
            data: vec![40000; 16],
        };
        let rivers = generate_rivers(&params, &map);
        assert!(rivers.is_empty());
    }

    #[test]
    fn disabled_rivers_produce_nothing() {
        let mut params = river_params(9, 9);
        params.river.enabled = false;
        assert!(generate_rivers(&params, &flat_heightmap(9, 9)).is_empty());
    }

    #[test]
    fn rivers_are_deterministic() {
        let mut params = river_params(9, 9);
        params.river.start_candidates.clear();
        params.river.river_count = 2;
        let map = flat_heightmap(9, 9);
        let a = generate_rivers(&params, &map);
        let b = generate_rivers(&params, &map);
        assert_eq!(a.len(), b.len());
        for (ra, rb) in a.iter().zip(&b) {
            assert_eq!(ra.points.len(), rb.points.len());
            for (pa, pb) in ra.points.iter().zip(&rb.points) {
                assert_eq!((pa.x, pa.y, pa.z), (pb.x, pb.y, pb.z));
            }
        }
    }

    #[test]
    fn rdp_keeps_short_input() {
        let points = vec![point(0.0, 0.0, 0.0), point(1.0, 1.0, 0.0)];
        let out = simplify_rdp(&points, 10.0);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn rdp_collapses_collinear_points() {
        let points: Vec<WorldPoint> = (0..10).map(|i| point(i as f32, 0.0, 0.0)).collect();
        // Даже при epsilon = 0 коллинеарные точки схлопываются: отклонение ровно 0
        let out = simplify_rdp(&points, 0.0);
        assert_eq!(out.len(), 2);
        assert_eq!((out[0].x, out[1].x), (0.0, 9.0));
    }

    #[test]
    fn rdp_keeps_deviating_point() {
        let points = vec![
            point(0.0, 0.0, 0.0),
            point(5.0, 3.0, 0.0),
            point(10.0, 0.0, 0.0),
        ];
        let out = simplify_rdp(&points, 1.0);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn rdp_large_epsilon_leaves_endpoints() {
        let points: Vec<WorldPoint> = (0..20)
            .map(|i| point(i as f32, (i as f32 * 0.7).sin() * 3.0, 0.0))
            .collect();
        let out = simplify_rdp(&points, 1.0e9);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].x, points[0].x);
        assert_eq!(out[1].x, points[19].x);
    }

    #[test]
    fn rdp_output_is_subsequence() {
        let points: Vec<WorldPoint> = (0..30)
            .map(|i| point(i as f32, (i as f32 * 1.3).cos() * 5.0, 0.0))
            .collect();
        let out = simplify_rdp(&points, 2.0);
        // Каждая точка результата присутствует во входе, порядок сохранён
        let mut cursor = 0;
        for p in &out {
            let found = points[cursor..]
                .iter()
                .position(|q| q.x == p.x && q.y == p.y && q.z == p.z);
            assert!(found.is_some(), "точка не из входа или порядок нарушен");
            cursor += found.unwrap() + 1;
        }
    }
}
