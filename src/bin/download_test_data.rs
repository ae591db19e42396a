//! 下载测试图片到 input/ 目录
//!
//! 已存在的文件会跳过

use std::{fs, path::Path};

use log::info;

const BASE_URL: &str =
    "https://huggingface.co/mit-han-lab/nunchaku-artifacts/resolve/main/ComfyUI-nunchaku/test_data";

const INPUT_DIR: &str = "input";

const FILENAMES: [&str; 4] = ["logo.png", "robot.png", "strawberry.png", "mushroom_depth.webp"];

fn main() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .try_init();

    let input_dir = Path::new(INPUT_DIR);
    fs::create_dir_all(input_dir)?;

    let client = reqwest::blocking::Client::new();
    for (index, filename) in FILENAMES.iter().enumerate() {
        let output = input_dir.join(filename);
        if output.exists() {
            info!("File {filename} already exists, skipping download.");
            continue;
        }

        let url = format!("{BASE_URL}/{filename}");
        info!("[{}/{}] downloading {url}", index + 1, FILENAMES.len());

        let bytes = client.get(&url).send()?.error_for_status()?.bytes()?;
        // 先写临时文件, 避免中断后留下不完整的文件
        let partial = output.with_extension("part");
        fs::write(&partial, &bytes)?;
        fs::rename(&partial, &output)?;
    }

    Ok(())
}
