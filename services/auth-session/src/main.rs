//! Auth Session Service - 会话服务入口

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use auth_session::api::http::{
    CookieSessionResolver, HeaderTokenSessionResolver, RefreshExchange, SessionCookieConfig,
    SessionMiddleware, SessionResolver, refresh_routes, session_routes,
};
use auth_session::application::{RequestContextSettings, SessionProvider};
use auth_session::infrastructure::persistence::{
    PostgresUserStore, RedisAccessEventStore, RedisSessionStore,
};
use auth_session::infrastructure::registry::InMemoryClientRegistry;
use authgate_adapter_postgres::{PostgresConfig, TransactionManager, create_pool};
use authgate_adapter_redis::{RedisConfig, create_connection_manager};
use authgate_errors::AppResult;
use authgate_common::SystemClock;
use authgate_config::AppConfig;
use axum::Router;
use axum::extract::State;
use axum::http::HeaderName;
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use redis::aio::ConnectionManager;
use sqlx::PgPool;
use secrecy::ExposeSecret;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. 加载配置
    dotenvy::dotenv().ok();
    let config = AppConfig::load("config")?;

    // 2. 初始化日志与指标
    authgate_telemetry::init(&config.telemetry.log_level, config.telemetry.json || config.is_production());
    let prometheus = authgate_telemetry::init_metrics()?;

    info!(
        app_name = %config.app_name,
        app_env = %config.app_env,
        clients = config.clients.len(),
        "Starting auth session service"
    );

    // 3. 基础设施
    let pg_config = PostgresConfig::new(config.database.url.expose_secret().as_str())
        .with_max_connections(config.database.max_connections);
    let pool = create_pool(&pg_config).await?;

    let mut redis_config = RedisConfig::new(config.redis.url.expose_secret().as_str());
    if let Some(prefix) = &config.redis.key_prefix {
        redis_config = redis_config.with_key_prefix(prefix.clone());
    }
    let redis = create_connection_manager(&redis_config).await?;

    // 4. 组装会话提供者
    let provider = Arc::new(SessionProvider::new(
        Arc::new(RedisSessionStore::new(redis.clone(), redis_config.clone())),
        Arc::new(RedisAccessEventStore::new(redis.clone(), redis_config)),
        Arc::new(InMemoryClientRegistry::from_config(&config.clients)),
        Arc::new(SystemClock),
    ));

    // 5. 组装解析器，Cookie 优先
    let access_token_header = HeaderName::try_from(config.session.access_token_header.as_str())?;
    let ops = OpsState {
        pool: pool.clone(),
        redis: redis.clone(),
        prometheus,
    };

    let resolvers: Vec<Arc<dyn SessionResolver>> = vec![
        Arc::new(CookieSessionResolver::new(
            provider.clone(),
            SessionCookieConfig::from_config(&config.session),
        )),
        Arc::new(HeaderTokenSessionResolver::with_header(
            provider.clone(),
            access_token_header,
        )),
    ];

    let settings = RequestContextSettings::from_config(&config.session)?;
    let refresh = Arc::new(RefreshExchange::new(
        provider.clone(),
        SessionCookieConfig::from_config(&config.session),
        settings.clone(),
    ));

    let middleware = Arc::new(SessionMiddleware::new(
        resolvers,
        provider,
        Arc::new(PostgresUserStore::new(TransactionManager::new(pool))),
        settings,
    ));

    // 6. 路由
    let app = session_routes(middleware)
        .merge(refresh_routes(refresh))
        .merge(ops_routes(ops))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )));

    // 7. 启动服务器
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!(%addr, "HTTP server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Auth session service stopped");
    Ok(())
}

#[derive(Clone)]
struct OpsState {
    pool: PgPool,
    redis: ConnectionManager,
    prometheus: PrometheusHandle,
}

fn ops_routes(state: OpsState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// 两个后端都可达才算健康
async fn health(State(mut state): State<OpsState>) -> AppResult<&'static str> {
    authgate_adapter_postgres::check_connection(&state.pool).await?;
    authgate_adapter_redis::check_connection(&mut state.redis).await?;
    Ok("OK")
}

async fn metrics(State(state): State<OpsState>) -> String {
    state.prometheus.render()
}

/// 等待关闭信号
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
