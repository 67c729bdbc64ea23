use tracing_subscriber::EnvFilter;

/// ログ出力を初期化する。RUST_LOG があればそちらを優先。
/// 二度目以降の呼び出し（テストなど）は何もしない。
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 設定を読む前の処理を一時的なログ出力つきで実行する。
/// 本来のログレベルは設定ファイルで決まるため、終わったら `init` を呼ぶ。
pub fn with_startup_logging<T>(f: impl FnOnce() -> T) -> T {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("info"))
        .with_target(false)
        .finish();
    tracing::subscriber::with_default(subscriber, f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        init("debug");
        init("warn");
        tracing::info!("still alive");
    }

    #[test]
    fn test_startup_logging_returns_value() {
        let loaded = with_startup_logging(|| {
            tracing::warn!("before config");
            42
        });
        assert_eq!(loaded, 42);
    }
}
