use clap::{Parser, Subcommand};
use rfe_lib::commands::{browse, cache, edit, log, ConsoleObserver};
use rfe_lib::config::{default_config_dir, RemoteConfig, RemoteKind};
use rfe_lib::logging::init_logging;
use rfe_lib::AppState;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// 远程文件浏览器
#[derive(Parser)]
#[command(name = "rfe", version, about)]
struct Cli {
    /// 配置目录
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// 覆盖配置中的 REST 服务地址
    #[arg(long, global = true, conflicts_with = "snapshot")]
    base_url: Option<String>,

    /// 使用本地 JSON 快照作为远程存储
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,

    /// 打印每个变更事件
    #[arg(short, long, global = true)]
    watch: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 列出目录内容
    Ls { id: Option<String> },
    /// 显示目录树
    Tree {
        id: Option<String>,
        #[arg(short, long, default_value_t = 3)]
        depth: usize,
    },
    /// 切换当前目录
    Cd { id: String },
    /// 显示当前目录
    Pwd,
    /// 返回上级目录
    Up,
    /// 移动节点，未指定目标时移到当前目录
    Mv {
        #[arg(required = true)]
        ids: Vec<String>,
        #[arg(short, long)]
        to: Option<String>,
    },
    /// 复制节点，未指定目标时复制到当前目录
    Cp {
        #[arg(required = true)]
        ids: Vec<String>,
        #[arg(short, long)]
        to: Option<String>,
    },
    /// 重命名节点
    Rename { id: String, name: String },
    /// 新建目录
    Mkdir {
        name: String,
        #[arg(short, long)]
        parent: Option<String>,
    },
    /// 新建空文件
    Touch {
        name: String,
        #[arg(short, long)]
        parent: Option<String>,
    },
    /// 删除节点
    Rm {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// 从远程重新加载当前目录
    Reload,
    /// 查看或修改日志配置
    Log {
        #[arg(long)]
        enabled: Option<bool>,
        #[arg(long)]
        level: Option<String>,
        #[arg(long)]
        max_files: Option<usize>,
    },
    /// 查看或修改缓存配置
    Cache {
        #[arg(long)]
        skip_leaves: Option<bool>,
        #[arg(long)]
        remember_empty_dirs: Option<bool>,
        #[arg(long)]
        root_label: Option<String>,
    },
}

impl Command {
    /// 只读写配置的命令不需要连接远程
    fn needs_session(&self) -> bool {
        !matches!(self, Command::Log { .. } | Command::Cache { .. })
    }
}

fn remote_config(cli: &Cli, state_dir: &std::path::Path) -> RemoteConfig {
    let mut config = RemoteConfig::load(state_dir);
    if let Some(url) = &cli.base_url {
        config.kind = RemoteKind::Http;
        config.base_url = url.clone();
    }
    if let Some(path) = &cli.snapshot {
        config.kind = RemoteKind::Snapshot;
        config.snapshot = Some(path.clone());
    }
    config
}

async fn run(cli: Cli, state: &AppState) -> anyhow::Result<String> {
    if cli.watch {
        state.store.observe(Arc::new(ConsoleObserver::new()));
    }

    if cli.command.needs_session() {
        state.explorer.restore_session(&state.config_dir).await?;
    }

    match cli.command {
        Command::Ls { id } => browse::list(state, id.as_deref()).await,
        Command::Tree { id, depth } => browse::tree(state, id.as_deref(), depth).await,
        Command::Cd { id } => browse::change_dir(state, &id).await,
        Command::Pwd => browse::current_path(state).await,
        Command::Up => browse::go_up(state).await,
        Command::Reload => browse::reload(state).await,
        Command::Mv { ids, to } => edit::paste(state, &ids, to.as_deref(), false).await,
        Command::Cp { ids, to } => edit::paste(state, &ids, to.as_deref(), true).await,
        Command::Rename { id, name } => edit::rename(state, &id, &name).await,
        Command::Mkdir { name, parent } => edit::mkdir(state, &name, parent.as_deref()).await,
        Command::Touch { name, parent } => edit::touch(state, &name, parent.as_deref()).await,
        Command::Rm { ids } => edit::remove(state, &ids).await,
        Command::Log {
            enabled,
            level,
            max_files,
        } => {
            let config = if enabled.is_none() && level.is_none() && max_files.is_none() {
                log::get_log_config(state)
            } else {
                log::set_log_config(state, enabled, max_files, level)?
            };
            Ok(log::describe(state, &config))
        }
        Command::Cache {
            skip_leaves,
            remember_empty_dirs,
            root_label,
        } => {
            let config =
                if skip_leaves.is_none() && remember_empty_dirs.is_none() && root_label.is_none() {
                    cache::get_cache_config(state)
                } else {
                    cache::set_cache_config(state, skip_leaves, remember_empty_dirs, root_label)?
                };
            Ok(cache::describe(state, &config))
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config_dir = cli.config_dir.clone().unwrap_or_else(default_config_dir);
    if let Err(e) = std::fs::create_dir_all(&config_dir) {
        eprintln!("无法创建配置目录 {}: {}", config_dir.display(), e);
        return ExitCode::FAILURE;
    }
    let _guard = init_logging(&config_dir);

    let remote = remote_config(&cli, &config_dir);
    let state = match AppState::with_remote(config_dir, &remote) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("初始化失败: {}", e);
            eprintln!("初始化失败: {}", e);
            return ExitCode::FAILURE;
        }
    };
    tracing::info!("远程存储: {}", state.store.remote_name());

    let saves_session = cli.command.needs_session();
    let result = run(cli, &state).await;
    if saves_session {
        state.cleanup();
    }

    match result {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("错误: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
