use anyhow::{anyhow, Context};
use clap::Parser;
use indicatif::ProgressBar;
use pathfinder_common::{ResultHandoff, ResultView};
use pathfinder_diagnose::{cli, config, logging, report, service, workflow, ImageAsset};
use cli::{Backend, Cli, Commands};
use config::Config;
use service::{
    DiagnosisService, HttpDiagnosisService, MockConfig, MockDiagnosisService, SessionRequest,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use workflow::{Phase, WorkflowDriver};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    let config = Config::load().context("設定の読み込みに失敗")?;

    match cli.command {
        Commands::Diagnose { image, backend, threshold, output, json } => {
            let threshold = threshold.unwrap_or(config.review_threshold);
            config::validate_threshold(threshold)?;

            if !json {
                println!("🔬 pathfinder - 画像診断\n");
                println!("[1/3] 画像を読み込み中...");
            }
            let asset = ImageAsset::from_path(&image)
                .with_context(|| format!("read {}", image.display()))?;
            if !json {
                println!("✔ {} ({}, {})\n", asset.name(), asset.media_type(), asset.display_size());
            }

            let service: Arc<dyn DiagnosisService> = match backend {
                Backend::Mock => Arc::new(MockDiagnosisService::new(MockConfig::default())),
                Backend::Http => Arc::new(HttpDiagnosisService::new(config.http_options())?),
            };
            let mut driver = WorkflowDriver::new(service);
            if let Err(err) = driver.select_file(asset) {
                if let Some(kind) = driver.workflow().last_error() {
                    eprintln!("✖ {}", kind.user_message());
                }
                return Err(err.into());
            }

            if !json {
                println!("[2/3] AI解析中...");
            }
            let spinner = if json { ProgressBar::hidden() } else { ProgressBar::new_spinner() };
            spinner.enable_steady_tick(Duration::from_millis(120));
            spinner.set_message("Uploading image...");

            driver.start_analysis()?;
            while let Some(event) = driver.next_event().await {
                match event {
                    Ok(Phase::Analyzing) => spinner.set_message("Analyzing image..."),
                    Ok(phase) if phase.is_terminal() => break,
                    Ok(_) => {}
                    Err(err) => debug!(error = %err, "event discarded"),
                }
            }
            spinner.finish_and_clear();

            let Some(handoff) = driver.workflow().handoff().cloned() else {
                let wf = driver.workflow();
                if let Some(kind) = wf.last_error() {
                    eprintln!("✖ {}", kind.user_message());
                }
                return Err(match wf.last_failure() {
                    Some(err) => anyhow!(err.clone()),
                    None => anyhow!("解析が完了しませんでした"),
                });
            };

            if let Some(path) = &output {
                let content = serde_json::to_string_pretty(&handoff)?;
                std::fs::write(path, content)
                    .with_context(|| format!("write {}", path.display()))?;
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&handoff)?);
            } else {
                println!("✔ 解析完了\n");
                println!("[3/3] 結果\n");
                print!("{}", report::render(&ResultView::derive(Some(&handoff), threshold)));
                println!(
                    "\n生成日時: {}",
                    chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
                );
                if let Some(path) = &output {
                    println!("✔ 結果を保存: {}", path.display());
                }
            }
        }

        Commands::Results { input, threshold } => {
            let threshold = threshold.unwrap_or(config.review_threshold);
            config::validate_threshold(threshold)?;

            let handoff = match input {
                Some(path) if path.exists() => {
                    let content = std::fs::read_to_string(&path)
                        .with_context(|| format!("read {}", path.display()))?;
                    let handoff: ResultHandoff = serde_json::from_str(&content)
                        .with_context(|| format!("parse {}", path.display()))?;
                    Some(handoff)
                }
                _ => None,
            };
            print!("{}", report::render(&ResultView::derive(handoff.as_ref(), threshold)));
        }

        Commands::Config {
            set_api_url,
            set_session,
            create_session,
            disease_type,
            set_task_type,
            set_threshold,
            show,
        } => {
            let mut config = config;

            if let Some(url) = set_api_url {
                config.set_api_url(url)?;
                println!("✔ バックエンドURLを設定しました");
            }

            if let Some(session) = set_session {
                config.set_session_id(session)?;
                println!("✔ セッションIDを設定しました");
            }

            if let Some(patient_id) = create_session {
                let request = SessionRequest {
                    patient_id,
                    disease_type: disease_type.unwrap_or_default().as_str().to_string(),
                };
                let session_id = HttpDiagnosisService::create_session(&config.api_url, &request).await?;
                config.set_session_id(session_id.clone())?;
                println!("✔ 診断セッションを作成しました: {}", session_id);
            }

            if let Some(task_type) = set_task_type {
                config.set_task_type(task_type)?;
                println!("✔ タスク種別を設定しました");
            }

            if let Some(threshold) = set_threshold {
                config.set_review_threshold(threshold)?;
                println!("✔ レビュー閾値を設定しました");
            }

            if show {
                println!("設定:");
                println!("  バックエンドURL: {}", config.api_url);
                println!("  セッションID: {}", config.session_id.as_deref().unwrap_or("未設定"));
                println!("  タスク種別: {}", config.task_type.as_str());
                println!("  レビュー閾値: {}", config.review_threshold);
                println!("  最大アップロードサイズ: {} bytes", config.max_upload_bytes);
                println!("  ポーリング間隔: {}ms", config.poll_interval_ms);
                println!("  タイムアウト: {}秒", config.timeout_seconds);
                println!("  リトライ回数: {}", config.retry.max_attempts);
            }
        }
    }

    Ok(())
}
