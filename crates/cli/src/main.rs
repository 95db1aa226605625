//! # bsync CLI
//!
//! Gatewayから署名付きURLを取得し、各ターゲットへペイロードを直接アップロードする。
//!
//! ```text
//! bsync-cli upload --api https://gw.example --bucket b1 --key k1 --payload ./data.json
//! bsync-cli upload --api https://abc.execute-api.us-east-1.amazonaws.com/prod \
//!     --sigv4 --region us-east-1 --bucket b1 --key k1 --payload ./data.json
//! ```

mod sigv4;
mod upload;

use clap::{Parser, Subcommand};

use crate::upload::UploadArgs;

#[derive(Parser, Debug)]
#[command(name = "bsync-cli", version, about = "bsync CLI uploader")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 署名付きURLを取得してペイロードをアップロードする
    Upload(UploadArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli.command {
        Command::Upload(args) => {
            let report = upload::run(&args).await?;
            println!("sha256: {}", report.sha256);
            for target in &report.uploaded {
                println!(
                    "uploaded: {}://{}/{}",
                    target.provider, target.bucket, target.key
                );
            }
        }
    }

    Ok(())
}
