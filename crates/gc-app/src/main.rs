use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use gc_app::cli::{Cli, ExportFormat};
use gc_app::pipeline::{AnimationPipeline, JobOutcome};
use gc_ascii::{Converter, markup, text};
use gc_core::config::ConverterConfig;
use gc_export::rasterizer::{Rasterizer, find_system_font};
use gc_export::{OutputFormat, png};
use gc_source::open_source;

fn main() -> Result<()> {
    // 1. Parser CLI
    let cli = Cli::parse();

    // 2. Initialiser le logging
    env_logger::Builder::new()
        .filter_level(cli.log_level.parse().unwrap_or(log::LevelFilter::Warn))
        .init();

    // 3. Résoudre config et format
    let config = cli.resolve_config()?;
    let format = cli.resolve_format()?;
    anyhow::ensure!(
        cli.input.exists(),
        "Fichier source introuvable : {}",
        cli.input.display()
    );

    match format {
        ExportFormat::Text | ExportFormat::Html => run_text(&cli, &config, format),
        ExportFormat::Png => run_png(&cli, &config),
        ExportFormat::Gif => run_animation(&cli, config, OutputFormat::Gif, ExportFormat::Gif),
        ExportFormat::Mp4 => run_animation(&cli, config, OutputFormat::Mp4, ExportFormat::Mp4),
    }
}

/// Première frame de la source, convertie en grille.
fn first_grid(cli: &Cli, config: &ConverterConfig) -> Result<gc_core::grid::GlyphGrid> {
    let mut source = open_source(&cli.input, config.frame_rate)?;
    let frame = source
        .next_frame()?
        .context("La source n'a produit aucune frame")?;
    let converter = Converter::new(config)?;
    Ok(converter.convert(&frame.buffer))
}

fn run_text(cli: &Cli, config: &ConverterConfig, format: ExportFormat) -> Result<()> {
    let grid = first_grid(cli, config)?;
    let rendered = match format {
        ExportFormat::Html => markup::to_colored_markup(&grid, config, !cli.bare),
        _ => text::to_text(&grid),
    };
    match cli.output {
        Some(ref path) => {
            std::fs::write(path, rendered)
                .with_context(|| format!("Écriture impossible : {}", path.display()))?;
            log::info!("écrit : {}", path.display());
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

fn run_png(cli: &Cli, config: &ConverterConfig) -> Result<()> {
    let grid = first_grid(cli, config)?;
    let font = load_font(cli)?;
    let rasterizer = Rasterizer::new(&font, config)?;
    let bytes = png::grid_to_png(&grid, &rasterizer, config.background)?;
    let path = output_path(cli, ExportFormat::Png);
    std::fs::write(&path, bytes)
        .with_context(|| format!("Écriture impossible : {}", path.display()))?;
    println!("PNG écrit : {}", path.display());
    Ok(())
}

fn run_animation(
    cli: &Cli,
    config: ConverterConfig,
    format: OutputFormat,
    export: ExportFormat,
) -> Result<()> {
    let font = load_font(cli)?;
    let rasterizer = Arc::new(Rasterizer::new(&font, &config)?);
    let source = open_source(&cli.input, config.frame_rate)?;

    let mut pipeline = AnimationPipeline::new();
    let handle = pipeline.start(
        &cli.input.display().to_string(),
        source,
        config,
        format,
        rasterizer,
        cli.repeat.unwrap_or(0),
    )?;

    for event in handle.progress().iter() {
        log::info!(
            "{:?} : {:.0} %",
            event.phase,
            f64::from(event.fraction) * 100.0
        );
    }

    match handle.wait()? {
        JobOutcome::Finished(bytes) => {
            let path = output_path(cli, export);
            std::fs::write(&path, bytes)
                .with_context(|| format!("Écriture impossible : {}", path.display()))?;
            println!("Écrit : {}", path.display());
        }
        JobOutcome::Cancelled => println!("Encodage annulé."),
    }
    Ok(())
}

/// Charge la police demandée, sinon une police système.
fn load_font(cli: &Cli) -> Result<Vec<u8>> {
    let path = match cli.font {
        Some(ref p) => p.clone(),
        None => find_system_font()
            .context("Aucune police système trouvée ; utilisez --font <fichier.ttf>")?,
    };
    std::fs::read(&path).with_context(|| format!("Police illisible : {}", path.display()))
}

/// Chemin de sortie : --output, sinon un nom horodaté.
fn output_path(cli: &Cli, format: ExportFormat) -> PathBuf {
    cli.output.clone().unwrap_or_else(|| {
        let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        PathBuf::from(format!("glyphcast-{stamp}.{}", format.extension()))
    })
}
