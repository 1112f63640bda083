use std::error::Error;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use blog_backend::{
    AppState, Backends,
    cache::{KeyValueStore, MemoryStore, RedisStore},
    config::Config,
    database::{PgPostStore, PgUserStore},
    mail::ResendMailer,
    router::build_router,
    storage::SupabaseStorage,
};
use sqlx::Executor;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;

    #[cfg(debug_assertions)]
    tracing::info!("Running in debug mode with CORS enabled");

    #[cfg(not(debug_assertions))]
    tracing::info!("Running in production mode with CORS disabled");

    // 设置数据库连接池，语句超时与获取连接超时一致
    let statement_timeout = format!("SET statement_timeout = {};", config.db_timeout_ms);
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(config.db_timeout())
        .after_connect(move |conn, _meta| {
            let statement_timeout = statement_timeout.clone();
            Box::pin(async move {
                conn.execute("SET application_name = 'blog_backend';").await?;
                conn.execute(statement_timeout.as_str()).await?;
                Ok(())
            })
        })
        .connect(&config.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    // 未配置 Redis 时退回进程内缓存
    let kv: Arc<dyn KeyValueStore> = match &config.redis_url {
        Some(url) => {
            let redis_client = redis::Client::open(url.as_str())?;
            Arc::new(RedisStore::new(Arc::new(redis_client), config.cache_timeout()))
        }
        None => {
            tracing::warn!("REDIS_URL not set, using in-process cache");
            Arc::new(MemoryStore::new())
        }
    };

    let images = SupabaseStorage::new(
        &config.supabase_url,
        &config.supabase_service_key,
        &config.storage_bucket,
        config.http_timeout(),
    )?;
    let mailer = ResendMailer::new(&config.resend_api_key, &config.mail_from, config.http_timeout())?;

    let addr = SocketAddr::new(
        config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        config.server_port,
    );

    // 设置应用状态
    let state = AppState::new(
        config,
        Backends {
            posts: Arc::new(PgPostStore::new(pool.clone())),
            users: Arc::new(PgUserStore::new(pool)),
            kv,
            images: Arc::new(images),
            mailer: Arc::new(mailer),
        },
    );

    let router = build_router(state);

    // 根据编译模式决定是否添加CORS
    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(tower_http::cors::CorsLayer::permissive())
    };

    // 启动服务器
    tracing::info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
