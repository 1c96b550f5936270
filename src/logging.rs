//! tracing サブスクライバの初期化
//!
//! `RUST_LOG` があればそれを優先し、なければ `--verbose` で debug、通常は warn。
//! 出力は stderr（stdout は `--json` 出力用に空けておく）。

use tracing_subscriber::EnvFilter;

pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));

    // テストなどで二重に初期化された場合は無視
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn default_directives(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "warn" };
    // reqwest/hyper の内部ログは warn 以上のみ
    format!("{level},hyper=warn,reqwest=warn")
}
