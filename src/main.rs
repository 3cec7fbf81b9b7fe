//! # 图片文字叠加编辑器 — 命令行入口
//!
//! 本文件仅负责参数解析、日志初始化与单次会话的驱动。
//! 业务逻辑分布在各子模块中，详见 `lib.rs` 架构文档。

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use image_overlay_editor::error::AppError;
use image_overlay_editor::overlay::{OverlayServiceState, SessionSnapshot};
use image_overlay_editor::settings::{ENDPOINT_ENV, OverlaySettings};

/// 缩小图片后连同叠加文字提交到处理服务，并保存返回的图片
#[derive(Parser, Debug)]
#[command(name = "overlay-editor", version)]
struct Args {
    /// 要上传的图片
    image: PathBuf,

    /// 叠加到图片上的文字
    #[arg(short, long)]
    text: String,

    /// 文字大小（正整数）
    #[arg(short, long, allow_hyphen_values = true)]
    size: String,

    /// 处理结果保存位置（文件或目录，默认当前目录）
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// 额外导出降采样后的 JPEG
    #[arg(long)]
    preview: Option<PathBuf>,

    /// 处理服务地址
    #[arg(long, env = ENDPOINT_ENV)]
    endpoint: Option<String>,

    /// JSON 设置文件
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    max_width: Option<u32>,

    #[arg(long)]
    max_height: Option<u32>,

    /// JPEG 质量（1~100）
    #[arg(long)]
    quality: Option<u8>,

    /// 缩放档位：quality / balanced / speed
    #[arg(long)]
    profile: Option<String>,

    /// 以 JSON 输出会话快照
    #[arg(long)]
    json: bool,
}

#[derive(serde::Serialize)]
struct RunReport {
    session: SessionSnapshot,
    saved: Option<PathBuf>,
    preview_saved: Option<PathBuf>,
}

#[derive(serde::Serialize)]
struct ErrorReport<'a> {
    code: &'static str,
    error: &'a AppError,
}

fn load_settings(args: &Args) -> Result<OverlaySettings, AppError> {
    let from_file = match &args.config {
        Some(path) => OverlaySettings::load(path)?,
        None => OverlaySettings::default(),
    };

    let from_cli = OverlaySettings {
        endpoint: args.endpoint.clone(),
        max_width: args.max_width,
        max_height: args.max_height,
        jpeg_quality: args.quality,
        profile: args.profile.clone(),
        max_file_size_mb: None,
    };

    Ok(from_file.merge(OverlaySettings::from_env()).merge(from_cli))
}

async fn run(args: &Args) -> Result<RunReport, AppError> {
    let config = load_settings(args)?.into_config()?;
    if config.endpoint.is_none() {
        return Err(AppError::Settings(format!(
            "未配置处理服务地址，请设置 {} 或使用 --endpoint",
            ENDPOINT_ENV
        )));
    }

    let service = OverlayServiceState::with_config(config)?;
    log::info!("setup: overlay service ready");

    service.select_image(&args.image).await?;

    let preview_saved = match &args.preview {
        Some(target) => Some(service.save_preview(target)?),
        None => None,
    };

    service.set_text(args.text.clone())?;
    service.set_size(args.size.clone())?;
    service.submit().await?;

    let saved = service.save_processed(&args.output)?;

    Ok(RunReport {
        session: service.snapshot()?,
        saved: Some(saved),
        preview_saved,
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    match run(&args).await {
        Ok(report) => {
            if args.json {
                match serde_json::to_string_pretty(&report) {
                    Ok(json) => println!("{}", json),
                    Err(err) => log::warn!("序列化输出失败: {err}"),
                }
            } else if let Some(path) = &report.saved {
                println!("{}", path.display());
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            log::error!("处理失败（{}）: {err}", err.code());
            if args.json {
                let report = ErrorReport {
                    code: err.code(),
                    error: &err,
                };
                if let Ok(json) = serde_json::to_string_pretty(&report) {
                    println!("{}", json);
                }
            }
            ExitCode::FAILURE
        }
    }
}
