//! tracing の初期化

use tracing_subscriber::EnvFilter;

/// stderr へのログ出力を初期化する
///
/// `RUST_LOG` が未設定なら `info`。二回目以降の呼び出しは何もしない。
///
/// ```
/// cloudplane_controlplane::init_tracing();
/// tracing::info!("control plane starting");
/// ```
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_err()
    {
        tracing::debug!("Tracing subscriber already installed");
    }
}
