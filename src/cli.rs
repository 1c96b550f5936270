use crate::config::{DiseaseType, TaskType};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pathfinder")]
#[command(about = "顕微鏡画像のAI診断デモ（アップロード→解析→結果表示）", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 画像を送信して診断結果を表示
    Diagnose {
        /// 画像ファイルのパス
        #[arg(required = true)]
        image: PathBuf,

        /// 診断バックエンド (mock/http)
        #[arg(short, long, default_value = "mock")]
        backend: Backend,

        /// レビュー閾値（0.0-1.0、省略時は設定値）
        #[arg(long)]
        threshold: Option<f64>,

        /// 受け渡しデータ（結果+画像参照）をJSONで保存
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// レポートの代わりにJSONを出力
        #[arg(long)]
        json: bool,
    },

    /// 保存済みの結果を表示
    Results {
        /// 受け渡しデータJSON（省略時は「結果なし」表示）
        input: Option<PathBuf>,

        /// レビュー閾値（0.0-1.0、省略時は設定値）
        #[arg(long)]
        threshold: Option<f64>,
    },

    /// 設定を表示/編集
    Config {
        /// バックエンドのURLを設定
        #[arg(long)]
        set_api_url: Option<String>,

        /// 診断セッションIDを設定
        #[arg(long)]
        set_session: Option<String>,

        /// バックエンドで診断セッションを作成し、IDを保存（患者IDを指定）
        #[arg(long, value_name = "PATIENT_ID", conflicts_with = "set_session")]
        create_session: Option<String>,

        /// 作成するセッションの疾患種別（省略時は tuberculosis）
        #[arg(long)]
        disease_type: Option<DiseaseType>,

        /// 解析タスク種別を設定
        #[arg(long)]
        set_task_type: Option<TaskType>,

        /// レビュー閾値を設定
        #[arg(long)]
        set_threshold: Option<f64>,

        /// 設定を表示
        #[arg(long)]
        show: bool,
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// 固定遅延で固定結果を返すモック
    #[default]
    Mock,
    /// 診断バックエンドへのHTTP接続
    Http,
}
