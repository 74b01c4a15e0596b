//! RIS分配服务主程序

mod config;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use ris_assignment::Engine;
use ris_core::{Result, RisError};
use ris_database::{DatabasePool, PostgresStore, RosterCache, RulesCache};
use ris_web::{AppState, WebServer};
use tracing::{info, warn};

use crate::config::AppConfig;

/// RIS服务器命令行参数
#[derive(Parser, Debug)]
#[command(name = "ris-server")]
#[command(about = "RIS 放射检查自动分配服务器")]
struct Args {
    /// 配置文件路径
    #[arg(short, long)]
    config: Option<String>,

    /// 服务器端口（覆盖配置文件）
    #[arg(short, long)]
    port: Option<u16>,

    /// 日志级别
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(&args.log_level)
        .init();

    info!("启动RIS分配服务器...");

    let mut app_config = AppConfig::load(args.config.as_deref())?;
    if let Some(port) = args.port {
        app_config.server.port = port;
    }

    info!("RIS服务器配置:");
    info!(
        "  监听地址: {}:{}",
        app_config.server.host, app_config.server.port
    );
    info!("  数据库最大连接数: {}", app_config.database.max_connections);
    info!("  缓存刷新间隔: {}s", app_config.engine.cache_refresh_secs);

    // 数据库连接与建表
    let pool = Arc::new(
        DatabasePool::new(
            &app_config.database.url,
            app_config.database.max_connections,
        )
        .await?,
    );
    pool.health_check().await?;

    let store = Arc::new(PostgresStore::new(pool.pool().clone()));
    store.create_tables().await?;

    // 缓存预热
    let roster_cache = Arc::new(RosterCache::new());
    let rules_cache = Arc::new(RulesCache::new());
    roster_cache.refresh(pool.pool()).await?;
    rules_cache.refresh(pool.pool()).await?;

    // 排班与规则带外周期刷新
    spawn_cache_refresh(
        roster_cache.clone(),
        rules_cache.clone(),
        pool.clone(),
        Duration::from_secs(app_config.engine.cache_refresh_secs),
    );

    // 组装分配引擎
    let engine = Arc::new(Engine::new(
        store,
        roster_cache.clone(),
        rules_cache.clone(),
    ));
    let state = AppState {
        engine,
        rules: rules_cache,
    };

    let addr: SocketAddr = format!("{}:{}", app_config.server.host, app_config.server.port)
        .parse()
        .map_err(|e| RisError::Config(format!("无效监听地址: {}", e)))?;

    WebServer::new(addr, state).run().await
}

/// 启动缓存刷新后台任务
fn spawn_cache_refresh(
    roster: Arc<RosterCache>,
    rules: Arc<RulesCache>,
    pool: Arc<DatabasePool>,
    period: Duration,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // interval的首个tick立即到期，预热已完成，跳过
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = roster.refresh(pool.pool()).await {
                warn!("roster cache refresh failed: {}", e);
            }
            if let Err(e) = rules.refresh(pool.pool()).await {
                warn!("rules cache refresh failed: {}", e);
            }
        }
    });
}
