//! # 图片切分工具 — 命令行入口
//!
//! 本文件仅负责参数解析、日志初始化与结果输出。
//! 业务逻辑分布在各子模块中，详见 `lib.rs` 架构文档。

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use image::ImageFormat;
use image_splitter::error::AppError;
use image_splitter::splitter::{DegeneratePolicy, ImageSource, ImageSplitter, SplitConfig, TileSpec};
use image_splitter::{export, settings};

/// 把一张图片切成 n 行 x m 列的小图并逐块保存为 PNG。
#[derive(Parser, Debug)]
#[command(name = "image-splitter", version, about)]
struct Args {
    /// 输入：本地文件路径、Data URL、http(s) 地址或 HTML 片段
    input: String,

    /// 行数
    #[arg(short = 'r', long, default_value_t = 1)]
    rows: u32,

    /// 列数
    #[arg(short = 'c', long, default_value_t = 1)]
    columns: u32,

    /// 分块宽度（像素），设置后覆盖列数
    #[arg(long, value_name = "PX")]
    tile_width: Option<u32>,

    /// 分块高度（像素），设置后覆盖行数
    #[arg(long, value_name = "PX")]
    tile_height: Option<u32>,

    /// 输出目录
    #[arg(short = 'o', long, default_value = ".")]
    output: PathBuf,

    /// 文件名前缀，留空使用默认值
    #[arg(short = 'n', long)]
    name: Option<String>,

    /// JSON 设置文件
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// 将 INPUT 视为包含 HTML 片段的文件
    #[arg(long)]
    markup: bool,

    /// 分块尺寸为 0 时的策略：fail（报错）或 clamp（收缩行列数）
    #[arg(long, value_name = "POLICY")]
    policy: Option<DegeneratePolicy>,

    /// 将合并后的设置写入 JSON 文件
    #[arg(long, value_name = "FILE")]
    save_config: Option<PathBuf>,

    /// 额外保存一份整图预览
    #[arg(long, value_name = "FILE")]
    preview: Option<PathBuf>,

    /// 在标准输出打印每个分块的 Data URL
    #[arg(long)]
    print_data_urls: bool,

    /// 允许从内网 / 本机地址下载
    #[arg(long)]
    allow_private_network: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("❌ 处理失败 [{}]: {}", err.code(), err);
            eprintln!("{}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), AppError> {
    let config = build_config(&args)?;
    let spec = TileSpec {
        rows: args.rows,
        columns: args.columns,
        tile_width_px: args.tile_width,
        tile_height_px: args.tile_height,
    };

    let splitter = ImageSplitter::default();
    splitter.set_config(config.clone())?;

    if let Some(path) = &args.save_config {
        settings::save_settings(path, &config)?;
        log::info!("⚙️ 已保存设置：{}", path.display());
    }

    let source = read_input(&args)?;

    let bitmap = splitter.decode(source).await?;
    if let Some(preview) = &args.preview {
        fs::write(preview, bitmap.encode_png()?)?;
        log::info!("🖼️ 已保存整图预览：{}", preview.display());
    }

    let grid = splitter.compute_tiles(&bitmap, &spec)?;
    let written = export::save_grid(&grid, &args.output, args.name.as_deref(), &config)?;

    for (piece, path) in grid.iter().zip(&written) {
        let rect = piece.rect();
        println!(
            "{}\t({}, {}) {}x{}",
            path.display(),
            rect.x,
            rect.y,
            rect.width,
            rect.height
        );
        if args.print_data_urls {
            println!("{}", piece.to_data_url());
        }
    }

    let info = export::export_info(&args.output, &written);
    println!(
        "{} 行 x {} 列，共 {} 块，{} 字节 -> {}",
        grid.layout().rows,
        grid.layout().columns,
        info.file_count,
        info.total_size,
        info.path
    );

    Ok(())
}

/// 合并默认值、设置文件与命令行参数；取值校验在 `set_config` 中完成。
fn build_config(args: &Args) -> Result<SplitConfig, AppError> {
    let mut config = match &args.config {
        Some(path) => settings::load_settings(path)?.ok_or_else(|| {
            AppError::Settings(format!("设置文件不存在: {}", path.display()))
        })?,
        None => SplitConfig::default(),
    };

    if let Some(policy) = args.policy {
        config.degenerate_policy = policy;
    }
    if args.allow_private_network {
        config.allow_private_network = true;
    }

    Ok(config)
}

/// 将命令行输入转为图片来源。
///
/// 已存在的文件按“上传文件”处理：MIME 先看文件签名，再看扩展名。
fn read_input(args: &Args) -> Result<ImageSource, AppError> {
    let path = Path::new(&args.input);

    if args.markup {
        let markup = fs::read_to_string(path)?;
        return Ok(ImageSource::Reference(markup));
    }

    if !path.is_file() {
        return Ok(ImageSource::Reference(args.input.clone()));
    }

    let size = fs::metadata(path)?.len();
    let bytes = fs::read(path)?;
    let mime = infer::get(&bytes)
        .map(|kind| kind.mime_type().to_string())
        .or_else(|| {
            ImageFormat::from_path(path)
                .ok()
                .map(|format| format.to_mime_type().to_string())
        });

    log::debug!("📁 读取输入文件 - {} bytes, MIME: {:?}", size, mime);

    Ok(ImageSource::Payload {
        bytes,
        mime,
        size: Some(size),
    })
}
