use std::io::Write;
use std::process;

use anyhow::Result;
use clap::{Arg, Command};

use orchid_lib::crypto::NodeKey;
use orchid_lib::node::{run_exit, run_source, NodeConfig};
use orchid_lib::util;

#[tokio::main]
async fn main() {
    let matches = Command::new("orchid")
        .version("0.1.0")
        .about("Orchid onion-routing node")
        .arg(
            Arg::new("role")
                .help("node role: source or exit")
                .index(1),
        )
        .get_matches();

    env_logger::Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "{}:{} [{}] {} - {}",
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.level(),
                chrono::Local::now().format("%H:%M:%S.%6f"),
                record.args()
            )
        })
        .filter(None, log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let role = matches.value_of("role").unwrap_or("").to_owned();
    if let Err(err) = run(&role).await {
        log::error!("node exit: {err:#}");
        process::exit(1);
    }
}

async fn run(role: &str) -> Result<()> {
    let dir = util::orchid_dir()?;
    log::debug!("config dir: {}", dir.display());

    let key = NodeKey::load_or_generate(&util::key_file()?)?;
    let cfg = NodeConfig {
        node_pub: Some(key.url_base64()),
        ..NodeConfig::default()
    };

    match role {
        "source" => {
            util::chrome_profile_dir()?;
            run_source(cfg).await?;
        }
        "exit" => {
            run_exit(cfg).await?;
        }
        other => anyhow::bail!("unknown role {other:?}, run as 'orchid source' or 'orchid exit'"),
    }
    Ok(())
}
