// ==========================================
// 农业作业管理系统 - 库存台账主入口
// ==========================================
// 协议: stdin 每行一个 JSON 命令，stdout 每行一个 JSON 响应
// 日志: 统一写 stderr
// ==========================================

use agrotic_ledger::app::{get_default_db_path, handle_line, AppState};
use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志系统
    agrotic_ledger::logging::init();

    tracing::info!("==================================================");
    tracing::info!("{}", agrotic_ledger::APP_NAME);
    tracing::info!("系统版本: {}", agrotic_ledger::VERSION);
    tracing::info!("==================================================");

    // 获取数据库路径
    let db_path = get_default_db_path();
    tracing::info!("使用数据库: {}", db_path);

    let state = AppState::new(db_path)
        .map_err(anyhow::Error::msg)
        .context("无法初始化AppState")?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut handled: u64 = 0;

    while let Some(line) = lines.next_line().await.context("读取 stdin 失败")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = handle_line(&state, line).await;
        stdout.write_all(response.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
        handled += 1;
    }

    tracing::info!(handled = handled, "stdin 已关闭，退出");
    Ok(())
}
