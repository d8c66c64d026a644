use anyhow::Result;

use jwxt_auto_login::app::App;
use jwxt_auto_login::config::Config;
use jwxt_auto_login::utils::logging;

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::from_env();

    // 初始化日志
    logging::init(config.verbose_logging);

    // 初始化并运行应用
    App::initialize(config)?.run().await?;

    Ok(())
}
