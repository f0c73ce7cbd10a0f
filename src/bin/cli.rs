use clap::Parser;
use levelgen::{GenerationParams, generate, rivers};
use std::fs;
use std::path::PathBuf;

/// Генератор ландшафта уровня
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Путь к конфигурационному файлу в формате TOML
    /// (без него используются параметры по умолчанию)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Каталог для сохранения карт
    #[arg(short, long, default_value = ".")]
    output: PathBuf,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let params = match &cli.config {
        Some(path) => {
            println!("🔍 Загрузка конфигурации...");
            GenerationParams::from_toml_file(path.to_str().unwrap())?
        }
        None => GenerationParams::default(),
    };

    println!(
        "Генерация уровня (размер: {}×{}, сид: {})...",
        params.width, params.height, params.seed
    );
    let world = generate(&params)?;

    fs::create_dir_all(&cli.output)?;
    let out = |name: &str| cli.output.join(name).to_string_lossy().into_owned();

    println!("Сохранение карт в {:?}", cli.output);
    world.heightmap.save_as_png(&out("height.png"))?;
    world.climate.save_temperature_png(&out("temperature.png"))?;
    world.climate.save_humidity_png(&out("humidity.png"))?;
    world.biomes.save_as_png(&out("biomes.png"))?;
    for (i, name) in world.biomes.layer_names.iter().enumerate() {
        world
            .biomes
            .save_weight_layer_png(i, &out(&format!("weight_{name}.png")))?;
    }

    if !world.rivers.is_empty() {
        rivers::save_rivers_png(
            &world.rivers,
            params.width,
            params.height,
            params.landscape_scale,
            &out("rivers.png"),
        )?;
        fs::write(
            cli.output.join("rivers.json"),
            serde_json::to_string_pretty(&world.rivers)?,
        )?;
    }

    println!("\nГотово! Карты сохранены.");
    Ok(())
}
